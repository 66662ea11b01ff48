//! Pose recovery (§4.3): RANSAC over a linear pose solve, followed by SVD
//! re-orthonormalization of the fitted rotation block.
use nalgebra as na;

use crate::linalg::matrix::pseudo_inverse;
use crate::linalg::ransac::{RANSACConfig, RANSACResult, RANSAC};
use crate::slam::config::TuningConfig;

/// One 3-D↔2-D correspondence used to recover the current frame's pose.
#[derive(Clone, Copy, Debug)]
pub struct PosePoint {
    pub world: na::Point3<f64>,
    pub pixel: na::Point2<f64>,
}

pub struct PnpResult {
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
    pub inlier_indices: Vec<usize>,
}

struct PnpProblem<'a> {
    k: &'a na::Matrix3<f64>,
    points: &'a [PosePoint],
}

/// Fit the 3x4 matrix `P` minimizing `sum |P * X_i - lambda_i * x_i|^2` by ordinary least
/// squares (ignoring the unknown per-point depth `lambda_i`, as a linear DLT-style pose
/// solve), then strip `K` and re-orthonormalize the rotation block via SVD.
fn solve_pose(k: &na::Matrix3<f64>, points: &[PosePoint]) -> Option<(na::Matrix3<f64>, na::Vector3<f64>)> {
    if points.len() < 6 {
        return None;
    }
    let k_inv = pseudo_inverse(&na::DMatrix::from_row_slice(3, 3, k.transpose().as_slice())).ok()?;
    let k_inv = na::Matrix3::from_fn(|r, c| k_inv[(r, c)]);

    // Build the DLT system `A * p = 0` for the 12 unknowns of the 3x4 pose matrix, using
    // calibrated rays `K^-1 x` in place of raw pixels (removes intrinsics from the fit).
    let mut rows: Vec<f64> = Vec::with_capacity(points.len() * 2 * 12);
    for pp in points {
        let ray = k_inv * na::Vector3::new(pp.pixel.x, pp.pixel.y, 1.0);
        let (x, y, z, w) = (pp.world.x, pp.world.y, pp.world.z, 1.0);
        // row for u-equation: ray.x * (row2 . X) - ray.z * (row0 . X) = 0 (cross-product form)
        rows.extend_from_slice(&[
            -ray.z * x, -ray.z * y, -ray.z * z, -ray.z * w,
            0.0, 0.0, 0.0, 0.0,
            ray.x * x, ray.x * y, ray.x * z, ray.x * w,
        ]);
        rows.extend_from_slice(&[
            0.0, 0.0, 0.0, 0.0,
            -ray.z * x, -ray.z * y, -ray.z * z, -ray.z * w,
            ray.y * x, ray.y * y, ray.y * z, ray.y * w,
        ]);
    }
    let a = na::DMatrix::from_row_slice(points.len() * 2, 12, &rows);
    let p = crate::linalg::matrix::lstsq(&a).ok()?;

    let mut rt = na::Matrix3x4::zeros();
    for r in 0..3 {
        for c in 0..4 {
            rt[(r, c)] = p[r * 4 + c];
        }
    }
    let r_block = rt.fixed_view::<3, 3>(0, 0).into_owned();
    let svd = r_block.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut rotation = u * v_t;
    // Fix reflection and overall sign so the recovered rotation is proper (det = +1) and
    // points project in front of the camera.
    if rotation.determinant() < 0.0 {
        rotation = -rotation;
    }
    let scale = svd.singular_values.sum() / 3.0;
    let translation = rt.fixed_view::<3, 1>(0, 3).into_owned() / scale.max(1e-9);
    Some((rotation, translation))
}

impl<'a> RANSAC<na::DVector<f64>> for PnpProblem<'a> {
    fn estimate_from_random_sample(&self) -> na::DVector<f64> {
        use rand::seq::index::sample;
        let n = self.points.len().min(6);
        let indices: Vec<usize> = sample(&mut rand::thread_rng(), self.points.len(), n.max(6).min(self.points.len()))
            .into_vec();
        let sampled: Vec<PosePoint> = indices.iter().map(|&i| self.points[i]).collect();
        pose_to_vector(solve_pose(self.k, &sampled))
    }

    fn get_inlier_indices(&self, estimated: &na::DVector<f64>, threshold: f64) -> Vec<usize> {
        let (rotation, translation) = match vector_to_pose(estimated) {
            Some(v) => v,
            None => return Vec::new(),
        };
        self.points
            .iter()
            .enumerate()
            .filter(|(_, pp)| {
                let cam = rotation * pp.world.coords + translation;
                if cam.z <= 1e-9 {
                    return false;
                }
                let proj = self.k * cam;
                let predicted = na::Point2::new(proj.x / proj.z, proj.y / proj.z);
                (predicted - pp.pixel).norm() < threshold
            })
            .map(|(i, _)| i)
            .collect()
    }

    fn estimate(&self, inlier_indices: &[usize]) -> na::DVector<f64> {
        let sampled: Vec<PosePoint> = inlier_indices.iter().map(|&i| self.points[i]).collect();
        pose_to_vector(solve_pose(self.k, &sampled))
    }
}

fn pose_to_vector(pose: Option<(na::Matrix3<f64>, na::Vector3<f64>)>) -> na::DVector<f64> {
    match pose {
        Some((r, t)) => na::DVector::from_iterator(12, r.iter().copied().chain(t.iter().copied())),
        None => na::DVector::zeros(12),
    }
}

fn vector_to_pose(v: &na::DVector<f64>) -> Option<(na::Matrix3<f64>, na::Vector3<f64>)> {
    if v.iter().all(|x| *x == 0.0) {
        return None;
    }
    let rotation = na::Matrix3::from_iterator(v.rows(0, 9).iter().copied());
    let translation = na::Vector3::new(v[9], v[10], v[11]);
    Some((rotation, translation))
}

/// Recover the current left frame's pose from a set of 3-D↔2-D correspondences (§4.3).
/// Requires at least `MIN_TRACK_POINTS`; the caller enforces that before calling this.
pub fn recover_pose(k: &na::Matrix3<f64>, points: &[PosePoint], tuning: &TuningConfig) -> Option<PnpResult> {
    let problem = PnpProblem { k, points };
    let config = RANSACConfig {
        max_iter: tuning.pnp_max_iter,
        threshold: usize::MAX,
        inlier_threshold: tuning.max_reprojection_error,
        confidence: 0.99,
    };
    let RANSACResult { model, inlier_indices } = problem.run(&config)?;
    let (rotation, translation) = vector_to_pose(&model)?;
    Some(PnpResult {
        rotation,
        translation,
        inlier_indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_k() -> na::Matrix3<f64> {
        na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0)
    }

    fn project(k: &na::Matrix3<f64>, r: &na::Matrix3<f64>, t: &na::Vector3<f64>, p: &na::Point3<f64>) -> na::Point2<f64> {
        let cam = r * p.coords + t;
        let proj = k * cam;
        na::Point2::new(proj.x / proj.z, proj.y / proj.z)
    }

    #[test]
    fn recovers_pure_translation_from_synthetic_correspondences() {
        let k = identity_k();
        let true_r = na::Matrix3::identity();
        let true_t = na::Vector3::new(0.0, 0.0, 0.3);

        let mut points = Vec::new();
        for i in 0..40 {
            let world = na::Point3::new(
                ((i % 7) as f64 - 3.0) * 0.2,
                ((i / 7) as f64 - 3.0) * 0.2,
                2.0 + (i as f64 % 3.0) * 0.3,
            );
            let pixel = project(&k, &true_r, &true_t, &world);
            points.push(PosePoint { world, pixel });
        }

        let tuning = TuningConfig::default();
        let result = recover_pose(&k, &points, &tuning).expect("pnp should succeed");
        assert!(result.inlier_indices.len() >= 35);
        assert!((result.translation - true_t).norm() < 0.05);
        assert!((result.rotation - true_r).norm() < 0.05);
    }
}

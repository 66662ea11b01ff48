//! Local bundle adjustment (§4.5): windowed Levenberg-Marquardt over keyframe poses and
//! landmark positions, with Huber-robustified reprojection residuals. The outer loop
//! follows the same iteratively-reweighted shape as `optimizer::least_square::iterative_reweight`
//! - recompute weights from the current residual, re-solve, repeat - just with an added
//! damping term since the reprojection residual is nonlinear in both pose and point.
use nalgebra as na;

use crate::linalg::matrix::pseudo_inverse;

const MAX_ITERATION: usize = 10;
const STOP_THRESHOLD: f64 = 1e-7;
const HUBER_DELTA: f64 = 1.0;
const INITIAL_LAMBDA: f64 = 1e-3;
const MAX_INNER_RETRIES: usize = 5;

/// One camera pose in the optimization window. `fixed` poses (the oldest keyframe, §4.5)
/// contribute residuals but no free parameters.
#[derive(Clone, Debug)]
pub struct PoseVar {
    pub rotation: na::Matrix3<f64>,
    pub translation: na::Vector3<f64>,
    pub fixed: bool,
}

/// A single 2-D observation of `point_index` from `pose_index`, through a camera whose
/// rigid offset from that pose is `(offset_rotation, offset_translation)` - identity for
/// the left camera, the rig transform for the right one (§4.3's fixed baseline).
#[derive(Clone, Debug)]
pub struct Observation {
    pub pose_index: usize,
    pub point_index: usize,
    pub k: na::Matrix3<f64>,
    pub offset_rotation: na::Matrix3<f64>,
    pub offset_translation: na::Vector3<f64>,
    pub pixel: na::Point2<f64>,
}

/// Result of one `optimize` call: refined poses and points, in the same order as supplied.
pub struct BundleAdjustmentResult {
    pub poses: Vec<PoseVar>,
    pub points: Vec<na::Point3<f64>>,
}

fn rodrigues(delta: &na::Vector3<f64>) -> na::Matrix3<f64> {
    let angle = delta.norm();
    if angle < 1e-12 {
        return na::Matrix3::identity();
    }
    let axis = delta / angle;
    let skew = na::Matrix3::new(
        0.0, -axis.z, axis.y,
        axis.z, 0.0, -axis.x,
        -axis.y, axis.x, 0.0,
    );
    na::Matrix3::identity() + angle.sin() * skew + (1.0 - angle.cos()) * (skew * skew)
}

fn huber_weight(residual_norm: f64, delta: f64) -> f64 {
    if residual_norm <= delta {
        1.0
    } else {
        (delta / residual_norm).sqrt()
    }
}

struct State {
    poses: Vec<PoseVar>,
    points: Vec<na::Point3<f64>>,
}

fn project(obs: &Observation, pose: &PoseVar, point: &na::Point3<f64>) -> Option<na::Point2<f64>> {
    let cam_rotation = obs.offset_rotation * pose.rotation;
    let cam_translation = obs.offset_rotation * pose.translation + obs.offset_translation;
    let cam = cam_rotation * point.coords + cam_translation;
    if cam.z <= 1e-9 {
        return None;
    }
    let proj = obs.k * cam;
    Some(na::Point2::new(proj.x / proj.z, proj.y / proj.z))
}

fn residuals(state: &State, observations: &[Observation]) -> Vec<na::Vector2<f64>> {
    observations
        .iter()
        .map(|obs| {
            let pose = &state.poses[obs.pose_index];
            let point = &state.points[obs.point_index];
            match project(obs, pose, point) {
                Some(predicted) => predicted - obs.pixel,
                None => na::Vector2::new(1e6, 1e6),
            }
        })
        .collect()
}

fn weighted_residual_norm(residuals: &[na::Vector2<f64>], weights: &[f64]) -> f64 {
    residuals
        .iter()
        .zip(weights)
        .map(|(r, w)| w * w * r.norm_squared())
        .sum::<f64>()
        .sqrt()
}

/// Index into the flat parameter vector of the free (non-fixed) poses, in pose order.
fn free_pose_slots(poses: &[PoseVar]) -> Vec<Option<usize>> {
    let mut next = 0;
    poses
        .iter()
        .map(|p| {
            if p.fixed {
                None
            } else {
                let slot = next;
                next += 1;
                Some(slot)
            }
        })
        .collect()
}

/// Run windowed bundle adjustment to convergence or `MAX_ITERATION` outer steps (§4.5).
/// Returns the refined poses/points; fixed poses are returned unchanged.
pub fn optimize(poses: Vec<PoseVar>, points: Vec<na::Point3<f64>>, observations: Vec<Observation>) -> BundleAdjustmentResult {
    let mut state = State { poses, points };
    if observations.is_empty() {
        return BundleAdjustmentResult {
            poses: state.poses,
            points: state.points,
        };
    }

    let pose_slots = free_pose_slots(&state.poses);
    let n_free_poses = pose_slots.iter().filter(|s| s.is_some()).count();
    let n_params = n_free_poses * 6 + state.points.len() * 3;
    if n_params == 0 {
        return BundleAdjustmentResult {
            poses: state.poses,
            points: state.points,
        };
    }

    let mut lambda = INITIAL_LAMBDA;
    let mut current_residuals = residuals(&state, &observations);
    let mut weights: Vec<f64> = current_residuals.iter().map(|r| huber_weight(r.norm(), HUBER_DELTA)).collect();
    let mut current_cost = weighted_residual_norm(&current_residuals, &weights);

    for _ in 0..MAX_ITERATION {
        let jacobian = numerical_jacobian(&state, &observations, &pose_slots, n_params);
        let r_vec = na::DVector::from_iterator(
            observations.len() * 2,
            current_residuals.iter().flat_map(|r| [r.x, r.y]),
        );
        let w_vec: Vec<f64> = weights.iter().flat_map(|w| [*w * *w, *w * *w]).collect();
        let w_diag = na::DVector::from_vec(w_vec);
        let weight_matrix: na::DMatrix<f64> = na::Matrix::from_diagonal(&w_diag);
        let jt_w = jacobian.transpose() * weight_matrix;
        let jtj = &jt_w * &jacobian;
        let jtr = &jt_w * &r_vec;

        let mut accepted = false;
        for _ in 0..MAX_INNER_RETRIES {
            let damping: na::DMatrix<f64> = na::Matrix::from_diagonal(&na::DVector::from_element(n_params, lambda));
            let damped = &jtj + damping;
            let dx = match pseudo_inverse(&damped) {
                Ok(inv) => -(inv * &jtr),
                Err(_) => break,
            };
            let candidate = apply_step(&state, &pose_slots, &dx);
            let candidate_residuals = residuals(&candidate, &observations);
            let candidate_weights: Vec<f64> =
                candidate_residuals.iter().map(|r| huber_weight(r.norm(), HUBER_DELTA)).collect();
            let candidate_cost = weighted_residual_norm(&candidate_residuals, &candidate_weights);

            if candidate_cost < current_cost {
                let step_norm = dx.norm();
                state = candidate;
                current_residuals = candidate_residuals;
                weights = candidate_weights;
                let improved = current_cost - candidate_cost;
                current_cost = candidate_cost;
                lambda = (lambda * 0.5).max(1e-10);
                accepted = true;
                if step_norm < STOP_THRESHOLD || improved < STOP_THRESHOLD {
                    return BundleAdjustmentResult {
                        poses: state.poses,
                        points: state.points,
                    };
                }
                break;
            } else {
                lambda *= 4.0;
            }
        }
        if !accepted {
            break;
        }
    }

    BundleAdjustmentResult {
        poses: state.poses,
        points: state.points,
    }
}

fn apply_step(state: &State, pose_slots: &[Option<usize>], dx: &na::DVector<f64>) -> State {
    let mut poses = state.poses.clone();
    for (i, slot) in pose_slots.iter().enumerate() {
        if let Some(slot) = slot {
            let base = slot * 6;
            let rot_delta = na::Vector3::new(dx[base], dx[base + 1], dx[base + 2]);
            let trans_delta = na::Vector3::new(dx[base + 3], dx[base + 4], dx[base + 5]);
            poses[i].rotation = rodrigues(&rot_delta) * poses[i].rotation;
            poses[i].translation += trans_delta;
        }
    }
    let pose_param_len = pose_slots.iter().filter(|s| s.is_some()).count() * 6;
    let mut points = state.points.clone();
    for (i, point) in points.iter_mut().enumerate() {
        let base = pose_param_len + i * 3;
        point.coords += na::Vector3::new(dx[base], dx[base + 1], dx[base + 2]);
    }
    State { poses, points }
}

/// Central-difference Jacobian of the (unweighted) residual vector with respect to the
/// free pose and point parameters.
fn numerical_jacobian(
    state: &State,
    observations: &[Observation],
    pose_slots: &[Option<usize>],
    n_params: usize,
) -> na::DMatrix<f64> {
    const EPS: f64 = 1e-6;
    let n_residuals = observations.len() * 2;
    let mut jacobian = na::DMatrix::<f64>::zeros(n_residuals, n_params);

    let pose_param_len = pose_slots.iter().filter(|s| s.is_some()).count() * 6;
    for col in 0..n_params {
        let mut plus = na::DVector::zeros(n_params);
        plus[col] = EPS;
        let mut minus = na::DVector::zeros(n_params);
        minus[col] = -EPS;
        let state_plus = apply_step(state, pose_slots, &plus);
        let state_minus = apply_step(state, pose_slots, &minus);
        let r_plus = residuals(&state_plus, observations);
        let r_minus = residuals(&state_minus, observations);
        for (row, (rp, rm)) in r_plus.iter().zip(r_minus.iter()).enumerate() {
            jacobian[(row * 2, col)] = (rp.x - rm.x) / (2.0 * EPS);
            jacobian[(row * 2 + 1, col)] = (rp.y - rm.y) / (2.0 * EPS);
        }
    }
    let _ = pose_param_len;
    jacobian
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_k() -> na::Matrix3<f64> {
        na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn refines_noisy_point_back_toward_ground_truth() {
        let k = identity_k();
        let pose0 = PoseVar {
            rotation: na::Matrix3::identity(),
            translation: na::Vector3::zeros(),
            fixed: true,
        };
        let pose1 = PoseVar {
            rotation: na::Matrix3::identity(),
            translation: na::Vector3::new(0.2, 0.0, 0.0),
            fixed: true,
        };
        let truth = na::Point3::new(0.05, -0.02, 2.0);
        let noisy = na::Point3::new(0.15, -0.12, 2.3);

        let poses = vec![pose0.clone(), pose1.clone()];
        let observations = vec![
            Observation {
                pose_index: 0,
                point_index: 0,
                k,
                offset_rotation: na::Matrix3::identity(),
                offset_translation: na::Vector3::zeros(),
                pixel: project(&Observation {
                    pose_index: 0,
                    point_index: 0,
                    k,
                    offset_rotation: na::Matrix3::identity(),
                    offset_translation: na::Vector3::zeros(),
                    pixel: na::Point2::origin(),
                }, &pose0, &truth).unwrap(),
            },
            Observation {
                pose_index: 1,
                point_index: 0,
                k,
                offset_rotation: na::Matrix3::identity(),
                offset_translation: na::Vector3::zeros(),
                pixel: project(&Observation {
                    pose_index: 1,
                    point_index: 0,
                    k,
                    offset_rotation: na::Matrix3::identity(),
                    offset_translation: na::Vector3::zeros(),
                    pixel: na::Point2::origin(),
                }, &pose1, &truth).unwrap(),
            },
        ];

        let result = optimize(poses, vec![noisy], observations);
        let refined = result.points[0];
        let before = (noisy - truth).norm();
        let after = (refined - truth).norm();
        assert!(after < before, "expected refinement to reduce error: before={before} after={after}");
    }
}

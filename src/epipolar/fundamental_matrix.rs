//! Fundamental matrix estimation via FNS (Fundamental Numerical Scheme), the same
//! Sampson-error machinery the tracker reuses through `optimal_correction` to pull a
//! stereo or inter-frame match onto the epipolar manifold before triangulation.
use anyhow::Result;
use nalgebra as na;

use crate::optimizer::ObservedData;

/// Observed point correspondences for fitting a fundamental matrix `F` such that
/// `x1^T F x0 = 0` for every matching pair `(x0, x1)`.
///
/// `data` interleaves the two images' points: `[x0_0, x1_0, x0_1, x1_1, ...]`, the same
/// layout `HomographyData` uses. `delta` accumulates the per-point correction found by
/// `update_delta` so `get_data` can hand back points that satisfy the fitted epipolar
/// constraint exactly.
pub struct FundamentalMatrixData<'a> {
    data: &'a [na::Point2<f64>],
    scale: f64,
    delta: Vec<na::Point2<f64>>,
}

impl<'a> FundamentalMatrixData<'a> {
    fn corrected(&self, index: usize) -> na::Point2<f64> {
        self.data[index] + self.delta[index].coords
    }

    /// Gradient of `vector(idx)` with respect to `(x, y, xh, yh)`, as four 9-vectors
    /// ordered the same as `vector`.
    fn gradients(&self, idx: usize) -> [na::DVector<f64>; 4] {
        let p0 = self.corrected(idx * 2);
        let p1 = self.corrected(idx * 2 + 1);
        let f = self.scale;
        let (x, y) = (p0[0], p0[1]);
        let (xh, yh) = (p1[0], p1[1]);

        #[rustfmt::skip]
        let dx = na::DVector::from_vec(vec![xh, 0.0, 0.0, yh, 0.0, 0.0, f, 0.0, 0.0]);
        #[rustfmt::skip]
        let dy = na::DVector::from_vec(vec![0.0, xh, 0.0, 0.0, yh, 0.0, 0.0, f, 0.0]);
        #[rustfmt::skip]
        let dxh = na::DVector::from_vec(vec![x, y, f, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        #[rustfmt::skip]
        let dyh = na::DVector::from_vec(vec![0.0, 0.0, 0.0, x, y, f, 0.0, 0.0, 0.0]);

        [dx, dy, dxh, dyh]
    }
}

impl<'a> ObservedData<'a> for FundamentalMatrixData<'a> {
    fn new(data: &'a [na::Point2<f64>]) -> Self {
        FundamentalMatrixData {
            data,
            scale: 1.0,
            delta: vec![na::Point2::new(0.0, 0.0); data.len()],
        }
    }

    fn len(&self) -> usize {
        self.data.len() / 2
    }

    fn vector(&self, data_index: usize) -> na::DVector<f64> {
        let p0 = self.corrected(data_index * 2);
        let p1 = self.corrected(data_index * 2 + 1);
        let f = self.scale;
        let (x, y) = (p0[0], p0[1]);
        let (xh, yh) = (p1[0], p1[1]);

        na::DVector::from_vec(vec![
            x * xh,
            y * xh,
            f * xh,
            x * yh,
            y * yh,
            f * yh,
            x * f,
            y * f,
            f * f,
        ])
    }

    fn matrix(&self, weight_vector: &[f64]) -> na::DMatrix<f64> {
        (0..self.len())
            .map(|idx| {
                let xi = self.vector(idx);
                weight_vector[idx] * &xi * xi.transpose()
            })
            .sum::<na::DMatrix<f64>>()
            / self.len() as f64
    }

    fn variance(&self, data_index: usize) -> na::DMatrix<f64> {
        self.gradients(data_index)
            .iter()
            .map(|g| g * g.transpose())
            .sum()
    }

    fn weights(&self, params: &na::DVector<f64>) -> Vec<f64> {
        (0..self.len())
            .map(|idx| {
                let v0 = self.variance(idx);
                let denom = params.dot(&(&v0 * params));
                1.0 / denom.max(1e-12)
            })
            .collect()
    }

    fn update_delta(&mut self, params: &na::DVector<f64>) -> f64 {
        let mut total_error = 0.0;
        for idx in 0..self.len() {
            let xi = self.vector(idx);
            let residual = params.dot(&xi);
            let grads = self.gradients(idx);
            let jp = na::Vector4::new(
                grads[0].dot(params),
                grads[1].dot(params),
                grads[2].dot(params),
                grads[3].dot(params),
            );
            let denom = jp.norm_squared().max(1e-12);
            let factor = residual / denom;

            self.delta[idx * 2] -= na::Vector2::new(factor * jp[0], factor * jp[1]);
            self.delta[idx * 2 + 1] -= na::Vector2::new(factor * jp[2], factor * jp[3]);
            total_error += residual * residual / denom;
        }
        total_error / self.len() as f64
    }

    fn get_data(&self) -> Vec<na::Point2<f64>> {
        (0..self.data.len()).map(|idx| self.corrected(idx)).collect()
    }
}

/// Fit a fundamental matrix to `points` (interleaved `[x0_0, x1_0, ...]`) by FNS and return
/// it as a 3x3 matrix, row-major per `FundamentalMatrixData`'s parameter ordering.
pub fn estimate_fundamental_matrix(points: &[na::Point2<f64>]) -> Result<na::DMatrix<f64>> {
    let params = crate::optimizer::fns::fns::<FundamentalMatrixData>(points)?;
    Ok(na::DMatrix::from_row_slice(3, 3, params.as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrintDebug;
    use rand::Rng;

    fn create_random_fundamental_matrix() -> na::DMatrix<f64> {
        let mut rng = rand::thread_rng();
        loop {
            let matrix = na::DMatrix::from_fn(3, 3, |_, _| rng.gen::<f64>() - 0.5);
            if matrix.determinant().abs() < 1e-6 {
                continue;
            }
            // A true fundamental matrix is rank-2: project onto rank-2 by zeroing the
            // smallest singular value.
            let svd = matrix.clone().svd(true, true);
            let mut sv = svd.singular_values.clone();
            let (idx, _) = sv.argmin();
            sv[idx] = 0.0;
            let d = na::DMatrix::from_diagonal(&sv);
            return svd.u.unwrap() * d * svd.v_t.unwrap();
        }
    }

    fn create_matching_points(f_mat: &na::DMatrix<f64>) -> Vec<na::Point2<f64>> {
        let mut rng = rand::thread_rng();
        (0..50)
            .flat_map(|_| {
                let x0 = na::DVector::from_vec(vec![rng.gen::<f64>(), rng.gen::<f64>(), 1.0]);
                // Pick x1 on the epipolar line l = F * x0.
                let l = f_mat * &x0;
                let x = rng.gen::<f64>();
                let y = if l[1].abs() > 1e-9 {
                    -(l[0] * x + l[2]) / l[1]
                } else {
                    0.0
                };
                vec![
                    na::Point2::new(x0[0], x0[1]),
                    na::Point2::new(x, y),
                ]
            })
            .collect()
    }

    #[test]
    fn test_fundamental_matrix_satisfies_epipolar_constraint_on_synthetic_data() {
        let f_mat = create_random_fundamental_matrix();
        let points = create_matching_points(&f_mat);
        let estimated = estimate_fundamental_matrix(&points).unwrap();

        for idx in 0..points.len() / 2 {
            let p0 = points[idx * 2];
            let p1 = points[idx * 2 + 1];
            let v0 = na::DVector::from_vec(vec![p0[0], p0[1], 1.0]);
            let v1 = na::DVector::from_vec(vec![p1[0], p1[1], 1.0]);
            let residual = (v1.transpose() * &estimated * v0)[0];
            assert!(residual.abs() < 1e-2, "residual = {}", residual);
        }
        estimated.print();
    }

    #[test]
    fn test_optimal_correction_reduces_residual() {
        use crate::epipolar::triangulation::optimal_correction;

        let f_mat = create_random_fundamental_matrix();
        let mut rng = rand::thread_rng();
        let x0 = na::Point2::new(rng.gen::<f64>(), rng.gen::<f64>());
        // Perturb a point slightly off of its epipolar line.
        let v0 = na::DVector::from_vec(vec![x0[0], x0[1], 1.0]);
        let l = &f_mat * &v0;
        let on_line_y = if l[1].abs() > 1e-9 {
            -(l[0] * 0.5 + l[2]) / l[1]
        } else {
            0.0
        };
        let x1 = na::Point2::new(0.5 + 0.01, on_line_y + 0.01);

        let points = vec![x0, x1];
        let (c0, c1) = optimal_correction::<FundamentalMatrixData>(&f_mat, &points).unwrap();
        let vc0 = na::DVector::from_vec(vec![c0[0], c0[1], 1.0]);
        let vc1 = na::DVector::from_vec(vec![c1[0], c1[1], 1.0]);
        let corrected_residual = (vc1.transpose() * &f_mat * &vc0)[0].abs();

        let v1 = na::DVector::from_vec(vec![x1[0], x1[1], 1.0]);
        let original_residual = (v1.transpose() * &f_mat * &v0)[0].abs();

        assert!(corrected_residual <= original_residual);
    }
}

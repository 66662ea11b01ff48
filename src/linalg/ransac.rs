//! Generic RANSAC driver, shared by fundamental-matrix fitting and PnP pose recovery.

#[derive(Clone, Copy, Debug)]
pub struct RANSACConfig {
    pub max_iter: u32,
    /// Early-exit once this many inliers have been found.
    pub threshold: usize,
    /// Reprojection / residual threshold used by `get_inliers`.
    pub inlier_threshold: f64,
    pub confidence: f64,
}

impl Default for RANSACConfig {
    fn default() -> Self {
        RANSACConfig {
            max_iter: 100,
            threshold: usize::MAX,
            inlier_threshold: 2.0,
            confidence: 0.99,
        }
    }
}

/// Result of a successful RANSAC run: the refit model plus the indices of the samples
/// that were judged inliers of the refit model.
pub struct RANSACResult<T> {
    pub model: T,
    pub inlier_indices: Vec<usize>,
}

pub trait RANSAC<T> {
    fn run(&self, config: &RANSACConfig) -> Option<RANSACResult<T>> {
        let mut best_estimated = Option::<T>::None;
        let mut best_inliers: Vec<usize> = Vec::new();

        for _ in 0..config.max_iter {
            let estimated = self.estimate_from_random_sample();
            let inliers = self.get_inlier_indices(&estimated, config.inlier_threshold);
            if inliers.len() > best_inliers.len() {
                best_inliers = inliers;
                best_estimated = Some(estimated);
                if best_inliers.len() > config.threshold {
                    break;
                }
            }
        }

        best_estimated.map(|_| {
            let refit = self.estimate(&best_inliers);
            // Re-evaluate inliers against the refit model so the reported set matches
            // what is actually returned.
            let inlier_indices = self.get_inlier_indices(&refit, config.inlier_threshold);
            RANSACResult {
                model: refit,
                inlier_indices,
            }
        })
    }

    /// Estimate a candidate model from a minimal random sample of the data.
    fn estimate_from_random_sample(&self) -> T;

    /// Indices (into the full data set) of the samples that `estimated` explains within
    /// `threshold`.
    fn get_inlier_indices(&self, estimated: &T, threshold: f64) -> Vec<usize>;

    /// Re-estimate a model from the (typically inlier) sample indices given.
    fn estimate(&self, inlier_indices: &[usize]) -> T;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fits `y = a*x` (a single scalar slope) by RANSAC, tolerating outliers.
    struct SlopeFit {
        data: Vec<(f64, f64)>,
    }

    impl RANSAC<f64> for SlopeFit {
        fn estimate_from_random_sample(&self) -> f64 {
            use rand::Rng;
            let idx = rand::thread_rng().gen_range(0..self.data.len());
            let (x, y) = self.data[idx];
            if x.abs() < 1e-12 {
                0.0
            } else {
                y / x
            }
        }

        fn get_inlier_indices(&self, estimated: &f64, threshold: f64) -> Vec<usize> {
            self.data
                .iter()
                .enumerate()
                .filter(|(_, (x, y))| (y - estimated * x).abs() < threshold)
                .map(|(idx, _)| idx)
                .collect()
        }

        fn estimate(&self, inlier_indices: &[usize]) -> f64 {
            let (sum_xy, sum_xx) = inlier_indices.iter().fold((0.0, 0.0), |acc, &idx| {
                let (x, y) = self.data[idx];
                (acc.0 + x * y, acc.1 + x * x)
            });
            if sum_xx.abs() < 1e-12 {
                0.0
            } else {
                sum_xy / sum_xx
            }
        }
    }

    #[test]
    fn test_ransac_rejects_outliers() {
        let mut data: Vec<(f64, f64)> = (1..20).map(|i| (i as f64, 2.0 * i as f64)).collect();
        data.push((1.0, 50.0));
        data.push((2.0, -30.0));
        let fitter = SlopeFit { data };
        let config = RANSACConfig {
            max_iter: 200,
            threshold: usize::MAX,
            inlier_threshold: 0.5,
            confidence: 0.99,
        };
        let result = fitter.run(&config).expect("ransac should find a model");
        assert!((result.model - 2.0).abs() < 1e-6);
        assert_eq!(result.inlier_indices.len(), 19);
    }
}

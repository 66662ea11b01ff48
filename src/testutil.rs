//! Shared test helpers (only built with test code).
#[cfg(test)]
pub mod test_util {
    use nalgebra as na;

    pub fn compare_matrix(expected: &na::DMatrix<f64>, actual: &na::DMatrix<f64>) {
        assert_eq!(expected.nrows(), actual.nrows());
        assert_eq!(expected.ncols(), actual.ncols());
        for r in 0..expected.nrows() {
            for c in 0..expected.ncols() {
                assert!(
                    (expected[(r, c)] - actual[(r, c)]).abs() < 1e-4,
                    "expected[{r},{c}] = {}, actual[{r},{c}] = {}",
                    expected[(r, c)],
                    actual[(r, c)]
                );
            }
        }
    }

    pub fn compare_vector(expected: &na::DVector<f64>, actual: &na::DVector<f64>) {
        assert_eq!(expected.len(), actual.len());
        for i in 0..expected.len() {
            assert!(
                (expected[i] - actual[i]).abs() < 1e-4,
                "expected[{i}] = {}, actual[{i}] = {}",
                expected[i],
                actual[i]
            );
        }
    }
}

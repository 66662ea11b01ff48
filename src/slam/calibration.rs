//! The external stereo-calibration object (§6): the core only reads it, via `serde_yaml`,
//! matching how the rest of this codebase's sibling services persist structured config.
use std::path::Path;

use nalgebra as na;
use serde::{Deserialize, Serialize};

use crate::slam::error::SlamError;
use crate::slam::geometry::{ProjectionMatrix, StereoCameraMatrix};

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// One camera's intrinsic model: 3x3 `K` plus the usual 8-coefficient distortion vector.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CameraIntrinsics {
    pub k: [[f64; 3]; 3],
    pub dist: [f64; 8],
    pub size: Size,
}

impl CameraIntrinsics {
    pub fn k_matrix(&self) -> na::Matrix3<f64> {
        na::Matrix3::from_row_slice(&self.k.iter().flatten().copied().collect::<Vec<_>>())
    }

    fn is_finite(&self) -> bool {
        self.k.iter().flatten().all(|v| v.is_finite()) && self.dist.iter().all(|v| v.is_finite())
    }
}

/// The full stereo calibration document, as produced by the external calibration
/// subsystem and handed to `World::new` (§6's consumed-interface payload).
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Calibration {
    pub left: CameraIntrinsics,
    pub right: CameraIntrinsics,
    /// Rotation of the right camera relative to the left.
    pub r: [[f64; 3]; 3],
    /// Translation of the right camera relative to the left.
    pub t: [f64; 3],
    pub r1: [[f64; 3]; 3],
    pub r2: [[f64; 3]; 3],
    pub p1: [[f64; 4]; 3],
    pub p2: [[f64; 4]; 3],
    pub q: [[f64; 4]; 4],
    pub left_roi: Rect,
    pub right_roi: Rect,
    pub error: f64,
    pub ok: bool,
}

impl Calibration {
    /// Fatal at construction if non-finite or degenerate (§7's `InvalidCalibration`).
    pub fn validate(&self) -> Result<(), SlamError> {
        if !self.ok {
            return Err(SlamError::InvalidCalibration("calibration marked not ok".into()));
        }
        if !self.left.is_finite() || !self.right.is_finite() {
            return Err(SlamError::InvalidCalibration("non-finite intrinsics".into()));
        }
        if self.t.iter().any(|v| !v.is_finite()) || self.r.iter().flatten().any(|v| !v.is_finite()) {
            return Err(SlamError::InvalidCalibration("non-finite extrinsics".into()));
        }
        let baseline = na::Vector3::new(self.t[0], self.t[1], self.t[2]).norm();
        if !(baseline.is_finite() && baseline > 1e-9) {
            return Err(SlamError::InvalidCalibration(format!(
                "degenerate baseline: {baseline}"
            )));
        }
        Ok(())
    }

    /// The starting `StereoCameraMatrix` a freshly opened `Map` uses: left at the world
    /// origin, right offset by the rig's rotation/translation.
    pub fn starting_projection(&self) -> StereoCameraMatrix {
        let left = ProjectionMatrix::new(self.left.k_matrix(), na::Matrix3::identity(), na::Vector3::zeros());
        let r = na::Matrix3::from_row_slice(&self.r.iter().flatten().copied().collect::<Vec<_>>());
        let t = na::Vector3::new(self.t[0], self.t[1], self.t[2]);
        let right = ProjectionMatrix::new(self.right.k_matrix(), r, t);
        StereoCameraMatrix::new(left, right)
    }
}

pub fn load_calibration(path: impl AsRef<Path>) -> Result<Calibration, SlamError> {
    let text = std::fs::read_to_string(path)?;
    let calibration: Calibration = serde_yaml::from_str(&text)?;
    calibration.validate()?;
    Ok(calibration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Calibration {
        let k = [[500.0, 0.0, 320.0], [0.0, 500.0, 240.0], [0.0, 0.0, 1.0]];
        let intr = CameraIntrinsics {
            k,
            dist: [0.0; 8],
            size: Size { width: 640, height: 480 },
        };
        Calibration {
            left: intr.clone(),
            right: intr,
            r: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            t: [-0.1, 0.0, 0.0],
            r1: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            r2: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            p1: [[500.0, 0.0, 320.0, 0.0], [0.0, 500.0, 240.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            p2: [[500.0, 0.0, 320.0, -50.0], [0.0, 500.0, 240.0, 0.0], [0.0, 0.0, 1.0, 0.0]],
            q: [[0.0; 4]; 4],
            left_roi: Rect { x: 0, y: 0, width: 640, height: 480 },
            right_roi: Rect { x: 0, y: 0, width: 640, height: 480 },
            error: 0.2,
            ok: true,
        }
    }

    #[test]
    fn valid_calibration_passes_and_yields_correct_baseline() {
        let cal = sample();
        assert!(cal.validate().is_ok());
        let proj = cal.starting_projection();
        assert!((proj.baseline() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn zero_baseline_is_rejected() {
        let mut cal = sample();
        cal.t = [0.0, 0.0, 0.0];
        assert!(cal.validate().is_err());
    }

    #[test]
    fn not_ok_is_rejected() {
        let mut cal = sample();
        cal.ok = false;
        assert!(cal.validate().is_err());
    }

    #[test]
    fn round_trips_through_yaml() {
        let cal = sample();
        let text = serde_yaml::to_string(&cal).unwrap();
        let parsed: Calibration = serde_yaml::from_str(&text).unwrap();
        assert!(parsed.validate().is_ok());
    }
}

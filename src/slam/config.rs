//! Tuning knobs (§6) as a validated, `serde`-loadable config struct, matching the rest of
//! this codebase's split between code-constructed defaults and YAML/TOML overrides.
use serde::{Deserialize, Serialize};

use crate::slam::error::SlamError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerKind {
    Flow,
    Features,
}

impl Default for TrackerKind {
    fn default() -> Self {
        TrackerKind::Flow
    }
}

/// Tuning constants from spec §6, with the documented defaults.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TuningConfig {
    pub max_reprojection_error: f64,
    pub min_stereo_disparity: f64,
    pub min_adjacent_points_distance: f64,
    pub min_adjacent_camera_multiplier: f64,
    pub min_points_distance: f64,
    pub min_connected_points: u32,
    pub min_track_inliers_ratio: f64,
    pub good_track_inliers_ratio: f64,
    pub ba_window: usize,
    pub ba_max_iter: usize,
    pub pnp_max_iter: u32,
    pub tracker: TrackerKind,
}

pub const MIN_TRACK_POINTS: usize = 30;

impl Default for TuningConfig {
    fn default() -> Self {
        TuningConfig {
            max_reprojection_error: 2.0,
            min_stereo_disparity: 2.0,
            min_adjacent_points_distance: 1.0,
            min_adjacent_camera_multiplier: 0.5,
            min_points_distance: 10.0,
            min_connected_points: 2,
            min_track_inliers_ratio: 0.4,
            good_track_inliers_ratio: 0.8,
            ba_window: 5,
            ba_max_iter: 10,
            pnp_max_iter: 100,
            tracker: TrackerKind::Flow,
        }
    }
}

impl TuningConfig {
    /// Load a `TuningConfig` from a YAML or TOML document, falling back to the default
    /// for any key that is absent (the `#[serde(default)]` struct attribute).
    pub fn from_yaml_str(text: &str) -> Result<Self, SlamError> {
        let config: TuningConfig =
            serde_yaml::from_str(text).map_err(|e| SlamError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SlamError> {
        let positive = [
            ("max_reprojection_error", self.max_reprojection_error),
            ("min_stereo_disparity", self.min_stereo_disparity),
            ("min_adjacent_points_distance", self.min_adjacent_points_distance),
            ("min_adjacent_camera_multiplier", self.min_adjacent_camera_multiplier),
            ("min_points_distance", self.min_points_distance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(SlamError::InvalidConfig(format!("{name} must be positive, got {value}")));
            }
        }
        if !(0.0..=1.0).contains(&self.min_track_inliers_ratio) {
            return Err(SlamError::InvalidConfig("min_track_inliers_ratio must be in [0, 1]".into()));
        }
        if !(0.0..=1.0).contains(&self.good_track_inliers_ratio) {
            return Err(SlamError::InvalidConfig("good_track_inliers_ratio must be in [0, 1]".into()));
        }
        if self.good_track_inliers_ratio < self.min_track_inliers_ratio {
            return Err(SlamError::InvalidConfig(
                "good_track_inliers_ratio must be >= min_track_inliers_ratio".into(),
            ));
        }
        if self.ba_window == 0 || self.ba_max_iter == 0 || self.pnp_max_iter == 0 {
            return Err(SlamError::InvalidConfig("ba_window/ba_max_iter/pnp_max_iter must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(TuningConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_yaml_keeps_defaults_for_missing_keys() {
        let config = TuningConfig::from_yaml_str("max_reprojection_error: 3.0\n").unwrap();
        assert!((config.max_reprojection_error - 3.0).abs() < 1e-12);
        assert!((config.min_stereo_disparity - TuningConfig::default().min_stereo_disparity).abs() < 1e-12);
    }

    #[test]
    fn inverted_inlier_ratios_are_rejected() {
        let mut config = TuningConfig::default();
        config.min_track_inliers_ratio = 0.9;
        config.good_track_inliers_ratio = 0.5;
        assert!(config.validate().is_err());
    }
}

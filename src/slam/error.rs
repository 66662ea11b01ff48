//! Typed, library-facing error/result kinds (§7). Internal numerical plumbing (SVD,
//! least squares, FNS) keeps using `anyhow`, matching `linalg`/`optimizer`/`epipolar`;
//! anything crossing the `World`/`Map` API boundary is one of these concrete types.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SlamError {
    #[error("invalid calibration: {0}")]
    InvalidCalibration(String),
    #[error("invalid tuning config: {0}")]
    InvalidConfig(String),
    #[error("failed to read calibration file: {0}")]
    CalibrationIo(#[from] std::io::Error),
    #[error("failed to parse calibration yaml: {0}")]
    CalibrationParse(#[from] serde_yaml::Error),
}

/// Why a single `World::track` call did not advance the pose (§7).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackFailureReason {
    /// Both images were accepted (for callers that want a named "no failure" variant).
    None,
    ImageMismatch,
    TooFewStereoMatches,
    TooFewPoseCandidates,
    PnpInlierRatioTooLow,
}

/// Result of one `World::track` / `Map::track` call (§6).
#[derive(Clone, Copy, Debug)]
pub struct TrackOutcome {
    pub ok: bool,
    pub inliers_ratio: f64,
    pub inserted_keyframe: bool,
    pub reason: TrackFailureReason,
}

impl TrackOutcome {
    pub fn success(inliers_ratio: f64, inserted_keyframe: bool) -> Self {
        TrackOutcome {
            ok: true,
            inliers_ratio,
            inserted_keyframe,
            reason: TrackFailureReason::None,
        }
    }

    pub fn failure(reason: TrackFailureReason) -> Self {
        TrackOutcome {
            ok: false,
            inliers_ratio: 0.0,
            inserted_keyframe: false,
            reason,
        }
    }
}

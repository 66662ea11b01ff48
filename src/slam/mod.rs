//! Stereo visual SLAM: the tracking + mapping core described in this crate's design
//! document. Leaf modules first, `World` last, the same dependency order the rest of
//! this codebase (`linalg`, `optimizer`, `epipolar`/`feat`) already follows.
pub mod calibration;
pub mod config;
pub mod debug_export;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod graph;
pub mod map;
pub mod pnp;
pub mod tracker;
pub mod world;

pub use calibration::{load_calibration, Calibration};
pub use config::TuningConfig;
pub use error::{SlamError, TrackFailureReason, TrackOutcome};
pub use geometry::{Color, ColorPoint3d, ProjectionMatrix, StereoCameraMatrix};
pub use map::{Map, MapState};
pub use world::{StampedImagePair, World};

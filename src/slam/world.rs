//! `World`: the top-level façade (§5, §6) owning the sequence of `Map`s, the reusable
//! trackers, and the background bundle-adjustment thread.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use image::GrayImage;
use log::{info, warn};
use parking_lot::RwLock;

use crate::slam::calibration::Calibration;
use crate::slam::config::{TrackerKind, TuningConfig};
use crate::slam::error::TrackOutcome;
use crate::slam::frame::StereoFrame;
use crate::slam::geometry::{ColorPoint3d, StereoCameraMatrix};
use crate::slam::map::{Map, MapState};
use crate::slam::tracker::{FeatureTracker, FlowTracker, Tracker};

/// One synchronized stereo image pair from the image source (§6).
pub struct StampedImagePair {
    pub timestamp: f64,
    pub left: GrayImage,
    pub right: GrayImage,
}

fn build_tracker(kind: TrackerKind) -> Box<dyn Tracker + Send + Sync> {
    match kind {
        TrackerKind::Flow => Box::new(FlowTracker::new()),
        TrackerKind::Features => Box::new(FeatureTracker::new()),
    }
}

/// Owns every `Map` ever opened (closed ones retained for reporting, §3's Map lifecycle),
/// the calibration-derived starting projection, and a single long-lived BA thread fed by
/// a bounded `crossbeam-channel` (§5).
pub struct World {
    maps: Arc<RwLock<Vec<Map>>>,
    tracker: Arc<dyn Tracker + Send + Sync>,
    tuning: TuningConfig,
    ba_sender: crossbeam_channel::Sender<BaJob>,
    ba_thread: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

enum BaJob {
    Run,
    Shutdown,
}

impl World {
    pub fn new(calibration: Calibration, tuning: TuningConfig) -> Result<Self, crate::slam::error::SlamError> {
        calibration.validate()?;
        tuning.validate()?;

        let start_projection = calibration.starting_projection();
        let maps = Arc::new(RwLock::new(vec![Map::new(start_projection)]));
        let tracker: Arc<dyn Tracker + Send + Sync> = Arc::from(build_tracker(tuning.tracker));

        let (ba_sender, ba_receiver) = crossbeam_channel::bounded::<BaJob>(4);
        let shutdown = Arc::new(AtomicBool::new(false));

        let ba_thread = {
            let maps = Arc::clone(&maps);
            let shutdown = Arc::clone(&shutdown);
            std::thread::spawn(move || {
                for job in ba_receiver.iter() {
                    if shutdown.load(Ordering::Acquire) {
                        break;
                    }
                    match job {
                        BaJob::Shutdown => break,
                        BaJob::Run => run_ba_cycle(&maps, &tuning, &shutdown),
                    }
                }
            })
        };

        Ok(World {
            maps,
            tracker,
            tuning,
            ba_sender,
            ba_thread: Some(ba_thread),
            shutdown,
        })
    }

    /// Ingest one stereo pair (§6). Runs on the caller's thread (the "ingest thread" of
    /// §5); posts a non-blocking BA job whenever a keyframe is inserted.
    pub fn track(&self, left: GrayImage, right: GrayImage, timestamp: f64) -> TrackOutcome {
        let outcome = {
            let mut maps = self.maps.write();
            let active = maps.last_mut().expect("World always holds at least one map");
            let outcome = active.track(self.tracker.as_ref(), &self.tuning, left, right, timestamp);

            if active.state == MapState::Closed {
                warn!("map closed; opening a new map at the last known pose");
                let reopen_at = active
                    .keyframes
                    .last()
                    .map(|kf| StereoCameraMatrix::new(kf.left.projection.clone(), kf.right.projection.clone()))
                    .unwrap_or_else(|| active.start_projection.clone());
                maps.push(Map::new(reopen_at));
            }
            outcome
        };

        if outcome.inserted_keyframe {
            let _ = self.ba_sender.try_send(BaJob::Run);
        }
        outcome
    }

    /// The ordered poses of every keyframe across every map (§6), oldest first.
    pub fn path(&self) -> Vec<StereoCameraMatrix> {
        let maps = self.maps.read();
        maps.iter().flat_map(|m| m.path()).collect()
    }

    /// All live `MapPoint`s, flattened across maps (§6).
    pub fn sparse_cloud(&self) -> Vec<ColorPoint3d> {
        let maps = self.maps.read();
        maps.iter().flat_map(|m| m.sparse_cloud()).collect()
    }

    /// An iteration-safe snapshot of every keyframe's timestamp and pose, across maps
    /// (§6's `World::frames`, read-locked to avoid exposing live frame internals).
    pub fn frames(&self) -> Vec<(f64, StereoCameraMatrix)> {
        let maps = self.maps.read();
        maps.iter()
            .flat_map(|m| {
                m.keyframes.iter().map(|kf: &StereoFrame| {
                    (
                        kf.timestamp,
                        StereoCameraMatrix::new(kf.left.projection.clone(), kf.right.projection.clone()),
                    )
                })
            })
            .collect()
    }

    /// Number of maps opened so far (closed ones included), a discontinuity in
    /// `World::path()` corresponds to a boundary between two of these (§8's S3).
    pub fn map_count(&self) -> usize {
        self.maps.read().len()
    }
}

fn run_ba_cycle(maps: &Arc<RwLock<Vec<Map>>>, tuning: &TuningConfig, shutdown: &AtomicBool) {
    if shutdown.load(Ordering::Acquire) {
        return;
    }
    let (map_index, snapshot) = {
        let maps = maps.read();
        match maps.last() {
            Some(active) if active.state == MapState::Initialized => {
                match active.snapshot_for_ba(tuning) {
                    Some(snapshot) => (maps.len() - 1, snapshot),
                    None => return,
                }
            }
            _ => return,
        }
    };

    if shutdown.load(Ordering::Acquire) {
        return;
    }
    let result = crate::optimizer::bundle_adjustment::optimize(
        snapshot.poses.clone(),
        snapshot.points.clone(),
        snapshot.observations.clone(),
    );

    if shutdown.load(Ordering::Acquire) {
        return;
    }
    // The ingest thread only ever appends to `maps`, never removes or reorders, so
    // `map_index` still names the same `Map` the snapshot was taken from. But it may
    // since have been closed and left behind while a new map opened on top of it
    // (§8's S3), so still bounds-check inside `apply_ba_result` before writing back.
    let mut maps = maps.write();
    if let Some(active) = maps.get_mut(map_index) {
        active.apply_ba_result(&snapshot, result);
    }
}

impl Drop for World {
    /// Stop and join the BA thread, discarding any in-flight cycle (§5's cancellation
    /// rule: a cancelled BA's partial result is never written back).
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        let _ = self.ba_sender.try_send(BaJob::Shutdown);
        if let Some(handle) = self.ba_thread.take() {
            if handle.join().is_err() {
                warn!("BA thread panicked during shutdown");
            }
        }
        info!("World shut down after {} map(s)", self.maps.read().len());
    }
}

//! The tracker/mapper pipeline (§4.2-§4.4): one ordered sequence of keyframes plus the
//! set of live landmarks, and the per-pair algorithm that grows both.
use std::collections::{HashMap, HashSet};

use image::GrayImage;
use log::{debug, info, trace, warn};
use nalgebra as na;

use crate::optimizer::bundle_adjustment;
use crate::slam::config::{TuningConfig, MIN_TRACK_POINTS};
use crate::slam::error::{TrackFailureReason, TrackOutcome};
use crate::slam::frame::{MonoFrame, StereoFrame};
use crate::slam::geometry::{Color, ColorPoint3d, ProjectionMatrix, StereoCameraMatrix};
use crate::slam::graph::{FramePoint, FramePointKey, MapPoint, MapPointKey, PointGraph};
use crate::slam::pnp::{self, PosePoint};
use crate::slam::tracker::Tracker;

/// State machine of a `Map` (§4.4).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapState {
    Empty,
    Initialized,
    Closed,
}

/// Ordered sequence of keyframes plus the set of live landmarks, opened against one
/// starting stereo projection (§3). Never destroyed once opened; a closed map is kept
/// around for reporting while `World` opens a fresh one.
pub struct Map {
    pub start_projection: StereoCameraMatrix,
    pub keyframes: Vec<StereoFrame>,
    pub graph: PointGraph,
    pub state: MapState,
}

fn sample_color(image: &GrayImage, p: na::Point2<f64>) -> Color {
    let x = (p.x.round() as i64).clamp(0, image.width() as i64 - 1) as u32;
    let y = (p.y.round() as i64).clamp(0, image.height() as i64 - 1) as u32;
    let v = image.get_pixel(x, y).0[0];
    (v, v, v, 255)
}

impl Map {
    pub fn new(start_projection: StereoCameraMatrix) -> Self {
        Map {
            start_projection,
            keyframes: Vec::new(),
            graph: PointGraph::new(),
            state: MapState::Empty,
        }
    }

    pub fn sparse_cloud(&self) -> Vec<ColorPoint3d> {
        self.graph
            .map_point_keys()
            .filter_map(|k| self.graph.map_point(k))
            .map(|mp| ColorPoint3d {
                point: mp.position,
                color: mp.color,
            })
            .collect()
    }

    /// The ordered poses of this map's keyframes (§6's `World::path`).
    pub fn path(&self) -> Vec<StereoCameraMatrix> {
        self.keyframes
            .iter()
            .map(|kf| StereoCameraMatrix::new(kf.left.projection.clone(), kf.right.projection.clone()))
            .collect()
    }

    /// Try to fit and accept a landmark from one correspondence `(key0, key1)` observed
    /// through `(proj0, proj1)` (§4.2's shared acceptance test, used for both within-pair
    /// stereo triangulation and cross-frame triangulation). On success, returns the
    /// landmark's key and whether it was newly created (as opposed to an existing
    /// landmark that just picked up another observation) so the caller can track
    /// newly-spawned landmarks that may need to be unwound (§4.3, §8's pruning intent).
    fn try_triangulate(
        &mut self,
        proj0: &ProjectionMatrix,
        proj1: &ProjectionMatrix,
        key0: FramePointKey,
        pixel0: na::Point2<f64>,
        key1: FramePointKey,
        pixel1: na::Point2<f64>,
        color: Color,
        tuning: &TuningConfig,
    ) -> Option<(MapPointKey, bool)> {
        let p0 = proj0.as_dmatrix();
        let p1 = proj1.as_dmatrix();
        let tri = match crate::epipolar::triangulation::triangulation(&p0, &p1, &pixel0, &pixel1, proj0.fx()) {
            Ok(v) if v.len() >= 3 => v,
            _ => return None,
        };
        let point = na::Point3::new(tri[0], tri[1], tri[2]);

        if proj0.z_in_camera_frame(&point) <= 0.0 || proj1.z_in_camera_frame(&point) <= 0.0 {
            trace!("triangulation rejected: point behind a camera");
            return None;
        }
        let (err0, err1) = match (proj0.reprojection_error(&point, &pixel0), proj1.reprojection_error(&point, &pixel1)) {
            (Some(e0), Some(e1)) => (e0, e1),
            _ => return None,
        };
        if err0 > tuning.max_reprojection_error || err1 > tuning.max_reprojection_error {
            trace!("triangulation rejected: reprojection error {err0}/{err1} exceeds {}", tuning.max_reprojection_error);
            return None;
        }

        let existing_mp = self
            .graph
            .frame_point(key0)
            .and_then(|fp| fp.map_point)
            .filter(|&mp| self.graph.map_point(mp).is_some())
            .or_else(|| {
                self.graph
                    .frame_point(key1)
                    .and_then(|fp| fp.map_point)
                    .filter(|&mp| self.graph.map_point(mp).is_some())
            });

        let (mp_key, newly_created) = match existing_mp {
            Some(mp_key) => {
                if let Some(mp) = self.graph.map_point_mut(mp_key) {
                    mp.position = point;
                    mp.color = color;
                    mp.observation_count += 1;
                }
                (mp_key, false)
            }
            None => (self.graph.insert_map_point(MapPoint::new(point, color)), true),
        };
        self.graph.propagate_map_point(key0, mp_key);
        self.graph.propagate_map_point(key1, mp_key);
        Some((mp_key, newly_created))
    }

    /// After pose recovery, drop any landmark that has fallen below the observation floor
    /// and has no surviving next-frame link (§4.2's pruning step).
    fn prune(&mut self, frame_points: &[FramePointKey], tuning: &TuningConfig) {
        for &key in frame_points {
            let mp_key = match self.graph.frame_point(key).and_then(|fp| fp.map_point) {
                Some(mp) => mp,
                None => continue,
            };
            let has_next = self.graph.frame_point(key).map(|fp| fp.next.is_some()).unwrap_or(false);
            if has_next {
                continue;
            }
            let connected = self.graph.connected_observations(mp_key);
            if connected < tuning.min_connected_points as usize {
                trace!("pruning landmark with {connected} observations");
                self.graph.remove_map_point(mp_key);
            }
        }
    }

    /// A pass-through frame (pose recovered, no keyframe inserted) contributes nothing to
    /// the persisted map; its `FramePoint`s are removed so they stop inflating observation
    /// counts for whatever landmarks they briefly touched (§9's arena model). Any landmark
    /// that this same frame triangulated and newly created is only ever observed through
    /// those `FramePoint`s, so once they're gone it is an orphan with zero connected
    /// observations; `candidate_landmarks` lists those keys so they can be swept here
    /// instead of surviving as permanent pollution in `sparse_cloud()` (§4.3, §8).
    fn discard_transient_frame(
        &mut self,
        left_frame: MonoFrame,
        right_frame: MonoFrame,
        candidate_landmarks: &[MapPointKey],
    ) {
        for key in left_frame.points.into_iter().chain(right_frame.points.into_iter()) {
            self.graph.remove_frame_point(key);
        }
        for &mp_key in candidate_landmarks {
            if self.graph.map_point(mp_key).is_some() && self.graph.connected_observations(mp_key) == 0 {
                trace!("dropping orphaned landmark created by a discarded transient frame");
                self.graph.remove_map_point(mp_key);
            }
        }
    }

    /// Process one stereo pair (§4.4's `Map.track` loop).
    pub fn track(
        &mut self,
        tracker: &dyn Tracker,
        tuning: &TuningConfig,
        left_image: GrayImage,
        right_image: GrayImage,
        timestamp: f64,
    ) -> TrackOutcome {
        if self.state == MapState::Closed {
            warn!("track() called on a closed map");
            return TrackOutcome::failure(TrackFailureReason::ImageMismatch);
        }
        if left_image.dimensions() != right_image.dimensions() {
            warn!("left/right image size mismatch");
            return TrackOutcome::failure(TrackFailureReason::ImageMismatch);
        }

        let is_first = self.keyframes.is_empty();
        let (left_proj, right_proj) = if is_first {
            (self.start_projection.left.clone(), self.start_projection.right.clone())
        } else {
            let last = self.keyframes.last().unwrap();
            (last.left.projection.clone(), last.right.projection.clone())
        };
        let mut left_proj = left_proj;
        let mut right_proj = right_proj;

        let mut left_frame = MonoFrame::new(left_proj.clone(), left_image.clone(), vec![left_image.clone()]);
        let mut right_frame = MonoFrame::new(right_proj.clone(), right_image.clone(), vec![right_image.clone()]);

        // ---- stereo match: correspondence only, triangulation deferred until this
        // frame's own pose is known (identity for the first pair, PnP-recovered otherwise).
        let seed_points = tracker.extract_points(&left_image);
        let stereo_result = tracker.track(&left_image, &seed_points, &right_image, tuning.min_stereo_disparity);
        trace!(
            "stereo match: {} seeds, {} correspondences",
            seed_points.len(),
            stereo_result.correspondences.len()
        );

        let seed_keys: Vec<FramePointKey> = seed_points
            .iter()
            .map(|&p| self.graph.insert_frame_point(FramePoint::new(p, sample_color(&left_image, p))))
            .collect();
        for &k in &seed_keys {
            left_frame.add_point(k);
        }

        let mut new_stereo_pairs = Vec::with_capacity(stereo_result.correspondences.len());
        for corr in &stereo_result.correspondences {
            let left_key = seed_keys[corr.seed_index];
            let right_key = self
                .graph
                .insert_frame_point(FramePoint::new(corr.dst, sample_color(&right_image, corr.dst)));
            right_frame.add_point(right_key);
            self.graph.link_stereo(left_key, right_key);
            new_stereo_pairs.push((left_key, right_key));
        }

        if is_first {
            let mut new_landmarks = 0usize;
            for &(lk, rk) in &new_stereo_pairs {
                let (lpix, rpix) = match (self.graph.frame_point(lk), self.graph.frame_point(rk)) {
                    (Some(l), Some(r)) => (l.pixel, r.pixel),
                    _ => continue,
                };
                let color = sample_color(&left_image, lpix);
                if self.try_triangulate(&left_proj, &right_proj, lk, lpix, rk, rpix, color, tuning).is_some() {
                    new_landmarks += 1;
                }
            }
            debug!("first pair: {new_landmarks} landmarks triangulated");
            if new_landmarks == 0 {
                warn!("first pair produced no triangulated landmarks");
                return TrackOutcome::failure(TrackFailureReason::TooFewStereoMatches);
            }
            self.keyframes.push(StereoFrame::new(left_frame, right_frame, timestamp));
            self.state = MapState::Initialized;
            info!("map initialized with {new_landmarks} landmarks");
            return TrackOutcome::success(1.0, true);
        }

        // ---- temporal match against the last keyframe ----
        let prev_keys: Vec<FramePointKey> = self
            .keyframes
            .last()
            .unwrap()
            .left
            .points
            .iter()
            .copied()
            .filter(|&k| self.graph.frame_point(k).is_some())
            .collect();
        let prev_points: Vec<na::Point2<f64>> = prev_keys
            .iter()
            .map(|&k| self.graph.frame_point(k).unwrap().pixel)
            .collect();
        let prev_image = self
            .keyframes
            .last()
            .unwrap()
            .left
            .image()
            .expect("the last keyframe's image is only released once superseded by a newer keyframe")
            .clone();

        let temporal_result = tracker.track(&prev_image, &prev_points, &left_image, tuning.min_adjacent_points_distance);
        trace!("temporal match: {} correspondences", temporal_result.correspondences.len());

        let mut temporal_keys = Vec::with_capacity(temporal_result.correspondences.len());
        for corr in &temporal_result.correspondences {
            let prev_key = prev_keys[corr.seed_index];
            let curr_key = self
                .graph
                .insert_frame_point(FramePoint::new(corr.dst, sample_color(&left_image, corr.dst)));
            left_frame.add_point(curr_key);
            self.graph.link_temporal(prev_key, curr_key);
            if let Some(mp) = self.graph.frame_point(prev_key).and_then(|fp| fp.map_point) {
                self.graph.propagate_map_point(prev_key, mp);
            }
            temporal_keys.push((prev_key, curr_key));
        }

        // ---- PnP pose recovery (§4.3, left-only) ----
        let mut pose_points = Vec::new();
        let mut pose_point_keys = Vec::new();
        for &(_, curr_key) in &temporal_keys {
            let fp = match self.graph.frame_point(curr_key) {
                Some(fp) => fp,
                None => continue,
            };
            let mp_key = match fp.map_point {
                Some(mp) => mp,
                None => continue,
            };
            let world = match self.graph.map_point(mp_key) {
                Some(mp) => mp.position,
                None => continue,
            };
            pose_points.push(PosePoint { world, pixel: fp.pixel });
            pose_point_keys.push(curr_key);
        }

        if pose_points.len() < MIN_TRACK_POINTS {
            warn!("only {} pose candidates, need {MIN_TRACK_POINTS}", pose_points.len());
            self.state = MapState::Closed;
            return TrackOutcome::failure(TrackFailureReason::TooFewPoseCandidates);
        }

        let pnp_result = match pnp::recover_pose(left_proj.intrinsics(), &pose_points, tuning) {
            Some(r) => r,
            None => {
                warn!("PnP failed to converge on {} candidates", pose_points.len());
                self.state = MapState::Closed;
                return TrackOutcome::failure(TrackFailureReason::TooFewPoseCandidates);
            }
        };

        let inliers_ratio = pnp_result.inlier_indices.len() as f64 / pose_points.len() as f64;
        debug!("PnP: {}/{} inliers, ratio {inliers_ratio:.3}", pnp_result.inlier_indices.len(), pose_points.len());

        if inliers_ratio < tuning.min_track_inliers_ratio {
            warn!("PnP inlier ratio {inliers_ratio:.3} below floor {}", tuning.min_track_inliers_ratio);
            self.state = MapState::Closed;
            return TrackOutcome::failure(TrackFailureReason::PnpInlierRatioTooLow);
        }

        let inlier_set: HashSet<usize> = pnp_result.inlier_indices.iter().copied().collect();
        for (i, &curr_key) in pose_point_keys.iter().enumerate() {
            if !inlier_set.contains(&i) {
                self.graph.unlink_temporal(curr_key);
                self.graph.clear_map_point(curr_key);
            }
        }

        left_proj.set_pose(pnp_result.rotation, pnp_result.translation);
        right_proj = self.start_projection.right_from_left_pose(&pnp_result.rotation, &pnp_result.translation);
        left_frame.projection = left_proj.clone();
        right_frame.projection = right_proj.clone();

        // ---- within-pair triangulation, now that this frame's own pose is known ----
        // Landmarks created here are only observed through this frame's own `FramePoint`s
        // so far; if this frame turns out to be a transient pass-through (no keyframe
        // inserted), they become orphans unless `discard_transient_frame` sweeps them.
        let mut new_landmarks = 0usize;
        let mut newly_created_landmarks: Vec<MapPointKey> = Vec::new();
        for &(lk, rk) in &new_stereo_pairs {
            let (lpix, rpix) = match (self.graph.frame_point(lk), self.graph.frame_point(rk)) {
                (Some(l), Some(r)) => (l.pixel, r.pixel),
                _ => continue,
            };
            let color = sample_color(&left_image, lpix);
            if let Some((mp_key, newly_created)) =
                self.try_triangulate(&left_proj, &right_proj, lk, lpix, rk, rpix, color, tuning)
            {
                new_landmarks += 1;
                if newly_created {
                    newly_created_landmarks.push(mp_key);
                }
            }
        }

        // ---- cross-frame triangulation against the immediate previous keyframe ----
        let prev_proj = self.keyframes.last().unwrap().left.projection.clone();
        let min_camera_distance = tuning.min_adjacent_camera_multiplier * self.start_projection.baseline();
        let mut new_cross_landmarks = 0usize;
        for &(prev_key, curr_key) in &temporal_keys {
            let has_landmark = self.graph.frame_point(curr_key).and_then(|fp| fp.map_point).is_some();
            if has_landmark {
                continue;
            }
            let (prev_pixel, curr_pixel) = match (self.graph.frame_point(prev_key), self.graph.frame_point(curr_key)) {
                (Some(p), Some(c)) => (p.pixel, c.pixel),
                _ => continue,
            };
            if (curr_pixel - prev_pixel).norm() < tuning.min_points_distance {
                continue;
            }
            if (left_proj.translation() - prev_proj.translation()).norm() < min_camera_distance {
                continue;
            }
            let color = sample_color(&left_image, curr_pixel);
            if let Some((mp_key, newly_created)) =
                self.try_triangulate(&prev_proj, &left_proj, prev_key, prev_pixel, curr_key, curr_pixel, color, tuning)
            {
                new_cross_landmarks += 1;
                if newly_created {
                    newly_created_landmarks.push(mp_key);
                }
            }
        }
        debug!("triangulated {new_landmarks} within-pair, {new_cross_landmarks} cross-frame landmarks");

        // ---- pruning (always runs after pose recovery, §4.2) ----
        let prune_targets: Vec<FramePointKey> = temporal_keys.iter().map(|&(_, c)| c).collect();
        self.prune(&prune_targets, tuning);

        let insert_keyframe = inliers_ratio < tuning.good_track_inliers_ratio;
        if insert_keyframe {
            if let Some(prev_kf) = self.keyframes.last_mut() {
                prev_kf.retain_as_keyframe();
            }
            let mut stereo_frame = StereoFrame::new(left_frame, right_frame, timestamp);
            stereo_frame.retained = true;
            self.keyframes.push(stereo_frame);
            info!("inserted keyframe #{} (inlier ratio {inliers_ratio:.3})", self.keyframes.len());
        } else {
            trace!("good track (ratio {inliers_ratio:.3}); no new keyframe");
            self.discard_transient_frame(left_frame, right_frame, &newly_created_landmarks);
        }

        TrackOutcome::success(inliers_ratio, insert_keyframe)
    }

    /// Snapshot the last `tuning.ba_window` keyframes and their observed landmarks for
    /// bundle adjustment (§5): read-only, so the caller can run the LM iterations without
    /// holding any lock on the map, and only re-acquire a write lock for `apply_ba_result`.
    pub fn snapshot_for_ba(&self, tuning: &TuningConfig) -> Option<BaSnapshot> {
        let window = tuning.ba_window.min(self.keyframes.len());
        if window < 2 {
            return None;
        }
        let start = self.keyframes.len() - window;

        let mut point_index: HashMap<MapPointKey, usize> = HashMap::new();
        let mut point_keys: Vec<MapPointKey> = Vec::new();
        for kf in &self.keyframes[start..] {
            for &key in kf.left.points.iter().chain(kf.right.points.iter()) {
                if let Some(mp) = self.graph.frame_point(key).and_then(|fp| fp.map_point) {
                    if self.graph.map_point(mp).is_some() {
                        point_index.entry(mp).or_insert_with(|| {
                            point_keys.push(mp);
                            point_keys.len() - 1
                        });
                    }
                }
            }
        }
        if point_keys.is_empty() {
            trace!("BA window has no triangulated landmarks; skipping");
            return None;
        }

        let poses: Vec<bundle_adjustment::PoseVar> = self.keyframes[start..]
            .iter()
            .enumerate()
            .map(|(i, kf)| bundle_adjustment::PoseVar {
                rotation: kf.left.projection.rotation(),
                translation: kf.left.projection.translation(),
                fixed: i == 0,
            })
            .collect();
        let points: Vec<na::Point3<f64>> =
            point_keys.iter().map(|&k| self.graph.map_point(k).unwrap().position).collect();

        let rig_rotation = self.start_projection.right.rotation() * self.start_projection.left.rotation().transpose();
        let rig_translation = self.start_projection.right.translation() - rig_rotation * self.start_projection.left.translation();

        let mut observations = Vec::new();
        for (pose_index, kf) in self.keyframes[start..].iter().enumerate() {
            for &key in &kf.left.points {
                if let Some(fp) = self.graph.frame_point(key) {
                    if let Some(&point_index) = fp.map_point.and_then(|mp| point_index.get(&mp)) {
                        observations.push(bundle_adjustment::Observation {
                            pose_index,
                            point_index,
                            k: *kf.left.projection.intrinsics(),
                            offset_rotation: na::Matrix3::identity(),
                            offset_translation: na::Vector3::zeros(),
                            pixel: fp.pixel,
                        });
                    }
                }
            }
            for &key in &kf.right.points {
                if let Some(fp) = self.graph.frame_point(key) {
                    if let Some(&point_index) = fp.map_point.and_then(|mp| point_index.get(&mp)) {
                        observations.push(bundle_adjustment::Observation {
                            pose_index,
                            point_index,
                            k: *kf.right.projection.intrinsics(),
                            offset_rotation: rig_rotation,
                            offset_translation: rig_translation,
                            pixel: fp.pixel,
                        });
                    }
                }
            }
        }

        Some(BaSnapshot {
            start,
            point_keys,
            poses,
            points,
            observations,
        })
    }

    /// Write an optimized `BundleAdjustmentResult` back into the keyframes/landmarks named
    /// by `snapshot` (§5's brief write-lock half of the BA cycle). If this map has since
    /// been closed and superseded (the keyframes `snapshot` was taken from are gone), the
    /// window no longer fits and the result is discarded rather than applied against the
    /// wrong keyframes (§5's cancellation rule).
    pub fn apply_ba_result(&mut self, snapshot: &BaSnapshot, result: bundle_adjustment::BundleAdjustmentResult) {
        if snapshot.start > self.keyframes.len() {
            warn!(
                "discarding stale BA result: window started at {} but map now has {} keyframe(s)",
                snapshot.start,
                self.keyframes.len()
            );
            return;
        }

        let rig_rotation = self.start_projection.right.rotation() * self.start_projection.left.rotation().transpose();
        let rig_translation = self.start_projection.right.translation() - rig_rotation * self.start_projection.left.translation();

        for (kf, pose) in self.keyframes[snapshot.start..].iter_mut().zip(result.poses.iter()) {
            kf.left.projection.set_pose(pose.rotation, pose.translation);
            let right_rotation = rig_rotation * pose.rotation;
            let right_translation = rig_rotation * pose.translation + rig_translation;
            kf.right.projection.set_pose(right_rotation, right_translation);
        }
        for (&key, point) in snapshot.point_keys.iter().zip(result.points.iter()) {
            if let Some(mp) = self.graph.map_point_mut(key) {
                mp.position = *point;
            }
        }
        info!(
            "local BA over {} keyframes adjusted {} landmarks",
            self.keyframes.len() - snapshot.start,
            snapshot.point_keys.len()
        );
    }

    /// Local bundle adjustment over the last `tuning.ba_window` keyframes (§4.5), run
    /// synchronously. `World` instead splits this into `snapshot_for_ba`/`apply_ba_result`
    /// around a background optimizer thread; this entry point is for single-threaded use
    /// (tests, the CLI's non-concurrent path).
    pub fn adjust_last(&mut self, tuning: &TuningConfig) {
        let snapshot = match self.snapshot_for_ba(tuning) {
            Some(s) => s,
            None => return,
        };
        let result = bundle_adjustment::optimize(
            snapshot.poses.clone(),
            snapshot.points.clone(),
            snapshot.observations.clone(),
        );
        self.apply_ba_result(&snapshot, result);
    }
}

/// A read-only capture of one BA window, produced by `Map::snapshot_for_ba` and consumed
/// by `bundle_adjustment::optimize` plus `Map::apply_ba_result` (§5).
#[derive(Clone)]
pub struct BaSnapshot {
    start: usize,
    point_keys: Vec<MapPointKey>,
    pub poses: Vec<bundle_adjustment::PoseVar>,
    pub points: Vec<na::Point3<f64>>,
    pub observations: Vec<bundle_adjustment::Observation>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slam::config::TrackerKind;
    use crate::slam::tracker::{FeatureTracker, FlowTracker};

    fn stereo_rig(baseline: f64) -> StereoCameraMatrix {
        let k = na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0);
        let left = ProjectionMatrix::new(k, na::Matrix3::identity(), na::Vector3::zeros());
        let right = ProjectionMatrix::new(k, na::Matrix3::identity(), na::Vector3::new(-baseline, 0.0, 0.0));
        StereoCameraMatrix::new(left, right)
    }

    fn checkerboard(width: u32, height: u32, square: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let v = if (x / square + y / square) % 2 == 0 { 30 } else { 220 };
            image::Luma([v])
        })
    }

    fn tracker_for(kind: TrackerKind) -> Box<dyn Tracker> {
        match kind {
            TrackerKind::Flow => Box::new(FlowTracker::new()),
            TrackerKind::Features => Box::new(FeatureTracker::new()),
        }
    }

    #[test]
    fn first_pair_initializes_map_with_landmarks() {
        let rig = stereo_rig(0.1);
        let mut map = Map::new(rig);
        let tuning = TuningConfig::default();
        let tracker = tracker_for(tuning.tracker);

        let left = checkerboard(160, 160, 8);
        let right = left.clone();

        let outcome = map.track(tracker.as_ref(), &tuning, left, right, 0.0);
        assert!(outcome.ok);
        assert_eq!(map.state, MapState::Initialized);
        assert_eq!(map.keyframes.len(), 1);
    }

    #[test]
    fn mismatched_image_sizes_are_rejected() {
        let rig = stereo_rig(0.1);
        let mut map = Map::new(rig);
        let tuning = TuningConfig::default();
        let tracker = tracker_for(tuning.tracker);

        let left = checkerboard(160, 160, 8);
        let right = checkerboard(100, 100, 8);
        let outcome = map.track(tracker.as_ref(), &tuning, left, right, 0.0);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason, TrackFailureReason::ImageMismatch);
    }
}

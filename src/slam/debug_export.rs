//! Structured per-frame debug export (§6): keypoints, temporal tracks and stereo
//! correspondences as JSON, collecting one record per frame and flushing them in a
//! single batch, rather than rendering pixels, rendering is GUI territory and out of
//! scope here.
use std::fs::{self, File};
use std::io::prelude::*;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use nalgebra as na;

use crate::slam::frame::StereoFrame;
use crate::slam::geometry::StereoCameraMatrix;
use crate::slam::graph::PointGraph;

/// Write one line per keyframe, `timestamp tx ty tz qx qy qz qw`, in the left-camera
/// world frame (§6's persisted trajectory format).
pub fn write_trajectory(frames: &[(f64, StereoCameraMatrix)], path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create trajectory directory")?;
    }
    let mut file = File::create(path)?;
    for (timestamp, pose) in frames {
        let t = pose.left.translation();
        let q = na::UnitQuaternion::from_rotation_matrix(&na::Rotation3::from_matrix_unchecked(pose.left.rotation()));
        writeln!(
            file,
            "{timestamp} {} {} {} {} {} {} {}",
            t.x, t.y, t.z, q.i, q.j, q.k, q.w
        )?;
    }
    Ok(())
}

#[derive(Serialize)]
struct FrameExport {
    timestamp: f64,
    retained: bool,
    left_points: Vec<[f64; 2]>,
    right_points: Vec<[f64; 2]>,
    stereo_correspondences: Vec<[[f64; 2]; 2]>,
    temporal_tracks: Vec<[[f64; 2]; 2]>,
}

/// Collects one `FrameExport` per ingested `StereoFrame` and flushes them as a single
/// JSON array: collect, then write once.
#[derive(Default)]
pub struct DebugExporter {
    frames: Vec<FrameExport>,
}

impl DebugExporter {
    pub fn new() -> Self {
        DebugExporter::default()
    }

    /// Record one frame's keypoints, stereo correspondences and temporal tracks, read
    /// out of the shared `PointGraph` via the frame's own `FramePoint` keys.
    pub fn record(&mut self, frame: &StereoFrame, graph: &PointGraph) {
        let left_points = frame
            .left
            .points
            .iter()
            .filter_map(|&k| graph.frame_point(k))
            .map(|fp| [fp.pixel.x, fp.pixel.y])
            .collect();
        let right_points = frame
            .right
            .points
            .iter()
            .filter_map(|&k| graph.frame_point(k))
            .map(|fp| [fp.pixel.x, fp.pixel.y])
            .collect();

        let stereo_correspondences = frame
            .stereo_points(graph)
            .filter_map(|k| {
                let left = graph.frame_point(k)?;
                let right = graph.frame_point(left.stereo?)?;
                Some([[left.pixel.x, left.pixel.y], [right.pixel.x, right.pixel.y]])
            })
            .collect();

        let temporal_tracks = frame
            .left
            .points
            .iter()
            .filter_map(|&k| {
                let curr = graph.frame_point(k)?;
                let prev = graph.frame_point(curr.prev?)?;
                Some([[prev.pixel.x, prev.pixel.y], [curr.pixel.x, curr.pixel.y]])
            })
            .collect();

        self.frames.push(FrameExport {
            timestamp: frame.timestamp,
            retained: frame.retained,
            left_points,
            right_points,
            stereo_correspondences,
            temporal_tracks,
        });
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.frames)?)
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("failed to create debug export directory")?;
        }
        let mut file = File::create(path)?;
        file.write_all(self.to_json()?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slam::frame::MonoFrame;
    use crate::slam::geometry::ProjectionMatrix;
    use crate::slam::graph::FramePoint;
    use image::GrayImage;
    use nalgebra as na;

    fn blank_projection() -> ProjectionMatrix {
        ProjectionMatrix::new(
            na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0),
            na::Matrix3::identity(),
            na::Vector3::zeros(),
        )
    }

    #[test]
    fn records_stereo_and_temporal_links() {
        let mut graph = PointGraph::new();
        let prev = graph.insert_frame_point(FramePoint::new(na::Point2::new(1.0, 1.0), (0, 0, 0, 255)));
        let l = graph.insert_frame_point(FramePoint::new(na::Point2::new(2.0, 2.0), (0, 0, 0, 255)));
        let r = graph.insert_frame_point(FramePoint::new(na::Point2::new(2.5, 2.0), (0, 0, 0, 255)));
        graph.link_stereo(l, r);
        graph.link_temporal(prev, l);

        let img = GrayImage::new(4, 4);
        let mut left = MonoFrame::new(blank_projection(), img.clone(), vec![img.clone()]);
        let right = MonoFrame::new(blank_projection(), img.clone(), vec![img]);
        left.add_point(l);

        let mut right_with_point = right;
        right_with_point.add_point(r);
        let frame = StereoFrame::new(left, right_with_point, 1.5);

        let mut exporter = DebugExporter::new();
        exporter.record(&frame, &graph);
        let json = exporter.to_json().unwrap();
        assert!(json.contains("\"timestamp\": 1.5"));
        assert_eq!(exporter.frames.len(), 1);
        assert_eq!(exporter.frames[0].stereo_correspondences.len(), 1);
        assert_eq!(exporter.frames[0].temporal_tracks.len(), 1);
    }
}

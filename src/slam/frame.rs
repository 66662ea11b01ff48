//! `MonoFrame` / `StereoFrame`, collapsing the source's processed/keyframe/dense by
//! mono/stereo class hierarchy into concrete structs with a single `retained` flag
//! (§9 REDESIGN FLAGS).
use image::GrayImage;

use crate::slam::geometry::ProjectionMatrix;
use crate::slam::graph::{FramePointKey, PointGraph};

/// One camera's half of a stereo pair: an (optional, released once retained) image and
/// its pyramid, a projection matrix, and the `FramePoint`s it owns.
pub struct MonoFrame {
    pub projection: ProjectionMatrix,
    image: Option<GrayImage>,
    pyramid: Option<Vec<GrayImage>>,
    pub points: Vec<FramePointKey>,
}

impl MonoFrame {
    pub fn new(projection: ProjectionMatrix, image: GrayImage, pyramid: Vec<GrayImage>) -> Self {
        MonoFrame {
            projection,
            image: Some(image),
            pyramid: Some(pyramid),
            points: Vec::new(),
        }
    }

    pub fn image(&self) -> Option<&GrayImage> {
        self.image.as_ref()
    }

    pub fn pyramid(&self) -> Option<&[GrayImage]> {
        self.pyramid.as_deref()
    }

    /// Release raw image buffers and pyramids, done when the frame is promoted to a
    /// keyframe (§4.4 step 1).
    pub fn release_image(&mut self) {
        self.image = None;
        self.pyramid = None;
    }

    pub fn add_point(&mut self, key: FramePointKey) {
        self.points.push(key);
    }
}

/// A stereo pair: two `MonoFrame`s sharing a timestamp. `retained` marks this frame as a
/// keyframe of its `Map` (the source's `KeyFrame` subtype, here just a bool).
pub struct StereoFrame {
    pub left: MonoFrame,
    pub right: MonoFrame,
    pub timestamp: f64,
    pub retained: bool,
}

impl StereoFrame {
    pub fn new(left: MonoFrame, right: MonoFrame, timestamp: f64) -> Self {
        StereoFrame {
            left,
            right,
            timestamp,
            retained: false,
        }
    }

    /// Left-side `FramePoint`s that have a right-side stereo partner (§3).
    pub fn stereo_points<'a>(&'a self, graph: &'a PointGraph) -> impl Iterator<Item = FramePointKey> + 'a {
        self.left.points.iter().copied().filter(move |&k| {
            graph
                .frame_point(k)
                .and_then(|fp| fp.stereo)
                .and_then(|s| graph.frame_point(s))
                .is_some()
        })
    }

    /// Promote this frame to a keyframe: release image buffers, mark retained (§4.4).
    pub fn retain_as_keyframe(&mut self) {
        self.left.release_image();
        self.right.release_image();
        self.retained = true;
    }
}

/// Alias documenting that a retained `StereoFrame` plays the role of the source's
/// `KeyFrame` type; there is no separate struct (§9).
pub type KeyFrame = StereoFrame;

#[cfg(test)]
mod tests {
    use super::*;
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
    fn release_image_drops_buffers() {
        let img = GrayImage::new(4, 4);
        let mut mono = MonoFrame::new(blank_projection(), img.clone(), vec![img]);
        assert!(mono.image().is_some());
        mono.release_image();
        assert!(mono.image().is_none());
        assert!(mono.pyramid().is_none());
    }

    #[test]
    fn stereo_points_only_includes_linked_pairs() {
        let mut graph = PointGraph::new();
        let left_img = GrayImage::new(4, 4);
        let right_img = GrayImage::new(4, 4);
        let mut left = MonoFrame::new(blank_projection(), left_img.clone(), vec![left_img]);
        let right = MonoFrame::new(blank_projection(), right_img.clone(), vec![right_img]);

        let l0 = graph.insert_frame_point(FramePoint::new(na::Point2::new(1.0, 1.0), (0, 0, 0, 255)));
        let l1 = graph.insert_frame_point(FramePoint::new(na::Point2::new(2.0, 2.0), (0, 0, 0, 255)));
        let r0 = graph.insert_frame_point(FramePoint::new(na::Point2::new(1.0, 1.0), (0, 0, 0, 255)));
        graph.link_stereo(l0, r0);
        left.add_point(l0);
        left.add_point(l1);

        let stereo = StereoFrame::new(left, right, 0.0);
        let matched: Vec<_> = stereo.stereo_points(&graph).collect();
        assert_eq!(matched, vec![l0]);
    }
}

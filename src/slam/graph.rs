//! The point graph: `FramePoint` (2-D observation) and `MapPoint` (3-D landmark), linked
//! by stereo/temporal/landmark references.
//!
//! The source models these links as weak pointers that silently read back as absent once
//! their target is destroyed. Here the arena is a `slotmap::SlotMap`: every cross-reference
//! is a generational key, and a key whose slot has since been reused (or left empty)
//! resolves to `None` through `get`/`get_mut` without any bookkeeping on our part. That is
//! the whole of what "weak reference" needed to mean for this crate.
use nalgebra as na;
use slotmap::{new_key_type, SlotMap};

use crate::slam::geometry::Color;

new_key_type! {
    pub struct FramePointKey;
    pub struct MapPointKey;
}

/// A 2-D observation bound to a frame, optionally linked to a landmark.
#[derive(Clone, Debug)]
pub struct FramePoint {
    pub pixel: na::Point2<f64>,
    pub color: Color,
    pub stereo: Option<FramePointKey>,
    pub prev: Option<FramePointKey>,
    pub next: Option<FramePointKey>,
    pub map_point: Option<MapPointKey>,
}

impl FramePoint {
    pub fn new(pixel: na::Point2<f64>, color: Color) -> Self {
        FramePoint {
            pixel,
            color,
            stereo: None,
            prev: None,
            next: None,
            map_point: None,
        }
    }
}

/// A triangulated 3-D landmark.
#[derive(Clone, Debug)]
pub struct MapPoint {
    pub position: na::Point3<f64>,
    pub color: Color,
    pub observation_count: u32,
}

impl MapPoint {
    pub fn new(position: na::Point3<f64>, color: Color) -> Self {
        MapPoint {
            position,
            color,
            observation_count: 1,
        }
    }
}

/// Shared arena of `FramePoint`s and `MapPoint`s for one `Map`. `MonoFrame`s and `Map`
/// itself only ever hold keys into this arena.
#[derive(Default)]
pub struct PointGraph {
    frame_points: SlotMap<FramePointKey, FramePoint>,
    map_points: SlotMap<MapPointKey, MapPoint>,
}

impl PointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_frame_point(&mut self, point: FramePoint) -> FramePointKey {
        self.frame_points.insert(point)
    }

    pub fn insert_map_point(&mut self, point: MapPoint) -> MapPointKey {
        self.map_points.insert(point)
    }

    pub fn frame_point(&self, key: FramePointKey) -> Option<&FramePoint> {
        self.frame_points.get(key)
    }

    pub fn frame_point_mut(&mut self, key: FramePointKey) -> Option<&mut FramePoint> {
        self.frame_points.get_mut(key)
    }

    pub fn map_point(&self, key: MapPointKey) -> Option<&MapPoint> {
        self.map_points.get(key)
    }

    pub fn map_point_mut(&mut self, key: MapPointKey) -> Option<&mut MapPoint> {
        self.map_points.get_mut(key)
    }

    pub fn map_point_keys(&self) -> impl Iterator<Item = MapPointKey> + '_ {
        self.map_points.keys()
    }

    pub fn map_point_count(&self) -> usize {
        self.map_points.len()
    }

    /// Set `a.stereo = b` and `b.stereo = a` (invariant §3.1).
    pub fn link_stereo(&mut self, a: FramePointKey, b: FramePointKey) {
        if let Some(fp) = self.frame_points.get_mut(a) {
            fp.stereo = Some(b);
        }
        if let Some(fp) = self.frame_points.get_mut(b) {
            fp.stereo = Some(a);
        }
        debug_assert_eq!(self.frame_point(a).and_then(|f| f.stereo), Some(b));
        debug_assert_eq!(self.frame_point(b).and_then(|f| f.stereo), Some(a));
    }

    /// Set `prev.next = next` and `next.prev = prev` (invariant §3.2).
    pub fn link_temporal(&mut self, prev: FramePointKey, next: FramePointKey) {
        if let Some(fp) = self.frame_points.get_mut(prev) {
            fp.next = Some(next);
        }
        if let Some(fp) = self.frame_points.get_mut(next) {
            fp.prev = Some(prev);
        }
        debug_assert_eq!(self.frame_point(prev).and_then(|f| f.next), Some(next));
        debug_assert_eq!(self.frame_point(next).and_then(|f| f.prev), Some(prev));
    }

    /// Sever `key`'s temporal links (and the mirror side), leaving it a pure 2-D
    /// observation. Used to drop PnP outliers (§4.3).
    pub fn unlink_temporal(&mut self, key: FramePointKey) {
        let (prev, next) = match self.frame_points.get(key) {
            Some(fp) => (fp.prev, fp.next),
            None => return,
        };
        if let Some(p) = prev {
            if let Some(pp) = self.frame_points.get_mut(p) {
                pp.next = None;
            }
        }
        if let Some(n) = next {
            if let Some(nn) = self.frame_points.get_mut(n) {
                nn.prev = None;
            }
        }
        if let Some(fp) = self.frame_points.get_mut(key) {
            fp.prev = None;
            fp.next = None;
        }
    }

    pub fn clear_map_point(&mut self, key: FramePointKey) {
        if let Some(fp) = self.frame_points.get_mut(key) {
            fp.map_point = None;
        }
    }

    /// Assign `mp` to `key`'s landmark reference, and propagate it to its stereo partner
    /// and the chain of next-observations (§4.2's "copy the reference").
    pub fn propagate_map_point(&mut self, key: FramePointKey, mp: MapPointKey) {
        if let Some(fp) = self.frame_points.get_mut(key) {
            fp.map_point = Some(mp);
        }
        if let Some(stereo) = self.frame_point(key).and_then(|fp| fp.stereo) {
            if let Some(fp) = self.frame_points.get_mut(stereo) {
                fp.map_point = Some(mp);
            }
        }
        let mut cursor = self.frame_point(key).and_then(|fp| fp.next);
        while let Some(k) = cursor {
            let stereo = self.frame_point(k).and_then(|fp| fp.stereo);
            if let Some(fp) = self.frame_points.get_mut(k) {
                fp.map_point = Some(mp);
            }
            if let Some(s) = stereo {
                if let Some(fp) = self.frame_points.get_mut(s) {
                    fp.map_point = Some(mp);
                }
            }
            cursor = self.frame_point(k).and_then(|fp| fp.next);
        }
    }

    /// Remove a landmark from the map. Any `FramePoint::map_point` key still pointing at
    /// it becomes stale and reads back as `None` on the next lookup, no peer bookkeeping
    /// needed, per the module doc comment.
    pub fn remove_map_point(&mut self, key: MapPointKey) -> Option<MapPoint> {
        self.map_points.remove(key)
    }

    /// Number of `FramePoint`s (across the whole arena) currently referencing `mp`.
    pub fn connected_observations(&self, mp: MapPointKey) -> usize {
        self.frame_points
            .values()
            .filter(|fp| fp.map_point == Some(mp))
            .count()
    }

    pub fn remove_frame_point(&mut self, key: FramePointKey) -> Option<FramePoint> {
        self.frame_points.remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_link_is_symmetric() {
        let mut graph = PointGraph::new();
        let a = graph.insert_frame_point(FramePoint::new(na::Point2::new(1.0, 2.0), (0, 0, 0, 255)));
        let b = graph.insert_frame_point(FramePoint::new(na::Point2::new(3.0, 4.0), (0, 0, 0, 255)));
        graph.link_stereo(a, b);
        assert_eq!(graph.frame_point(a).unwrap().stereo, Some(b));
        assert_eq!(graph.frame_point(b).unwrap().stereo, Some(a));
    }

    #[test]
    fn removed_map_point_reads_back_absent() {
        let mut graph = PointGraph::new();
        let a = graph.insert_frame_point(FramePoint::new(na::Point2::new(0.0, 0.0), (0, 0, 0, 255)));
        let mp = graph.insert_map_point(MapPoint::new(na::Point3::new(0.0, 0.0, 1.0), (0, 0, 0, 255)));
        graph.propagate_map_point(a, mp);
        assert_eq!(graph.frame_point(a).unwrap().map_point, Some(mp));

        graph.remove_map_point(mp);
        // the frame point's stored key is now stale; the map no longer resolves it.
        let stale = graph.frame_point(a).unwrap().map_point.unwrap();
        assert!(graph.map_point(stale).is_none());
    }

    #[test]
    fn propagate_map_point_follows_stereo_and_next_chain() {
        let mut graph = PointGraph::new();
        let p0 = graph.insert_frame_point(FramePoint::new(na::Point2::new(0.0, 0.0), (0, 0, 0, 255)));
        let p0_stereo = graph.insert_frame_point(FramePoint::new(na::Point2::new(1.0, 0.0), (0, 0, 0, 255)));
        let p1 = graph.insert_frame_point(FramePoint::new(na::Point2::new(0.1, 0.0), (0, 0, 0, 255)));
        graph.link_stereo(p0, p0_stereo);
        graph.link_temporal(p0, p1);

        let mp = graph.insert_map_point(MapPoint::new(na::Point3::new(0.0, 0.0, 1.0), (0, 0, 0, 255)));
        graph.propagate_map_point(p0, mp);

        assert_eq!(graph.frame_point(p0).unwrap().map_point, Some(mp));
        assert_eq!(graph.frame_point(p0_stereo).unwrap().map_point, Some(mp));
        assert_eq!(graph.frame_point(p1).unwrap().map_point, Some(mp));
    }

    #[test]
    fn unlink_temporal_clears_both_sides() {
        let mut graph = PointGraph::new();
        let prev = graph.insert_frame_point(FramePoint::new(na::Point2::new(0.0, 0.0), (0, 0, 0, 255)));
        let next = graph.insert_frame_point(FramePoint::new(na::Point2::new(1.0, 0.0), (0, 0, 0, 255)));
        graph.link_temporal(prev, next);
        graph.unlink_temporal(next);
        assert!(graph.frame_point(prev).unwrap().next.is_none());
        assert!(graph.frame_point(next).unwrap().prev.is_none());
    }
}

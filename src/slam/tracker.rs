//! The tracker abstraction (§4.1): one interface, two implementations, used for both
//! within-pair (stereo) and across-pair (temporal) matching.
use bitvec::vec::BitVec;
use image::GrayImage;
use nalgebra as na;

use crate::feat::descriptors::steered_brief::SteeredBrief;
use crate::feat::descriptors::{Descriptor, Extractor};
use crate::feat::keypoints::fast::FASTCornerDetector;
use crate::feat::keypoints::KeypointDetector;
use crate::feat::matcher::brute_force::ratio_cross_check_match;
use crate::imgproc;
use crate::linalg::ransac::{RANSACConfig, RANSACResult, RANSAC};

/// A surviving correspondence: the index into the seed/previous point list, and the
/// matched location in the target image.
#[derive(Clone, Copy, Debug)]
pub struct TrackedCorrespondence {
    pub seed_index: usize,
    pub dst: na::Point2<f64>,
}

/// What `Tracker::track` returns: the surviving correspondences plus a RANSAC-fitted
/// fundamental matrix over them (`None` if too few survived to fit one).
pub struct TrackResult {
    pub fundamental_matrix: Option<na::Matrix3<f64>>,
    pub correspondences: Vec<TrackedCorrespondence>,
}

/// Two interchangeable implementations behind one interface (§4.1).
pub trait Tracker {
    /// Populate an initial set of 2-D candidates on a freshly loaded frame.
    fn extract_points(&self, image: &GrayImage) -> Vec<na::Point2<f64>>;

    /// Propagate `src_points` from `src_image` into `dst_image`. Any correspondence whose
    /// 2-D displacement is smaller than `min_displacement` is rejected (shared guard used
    /// both for stereo matching and temporal matching, with different thresholds).
    fn track(
        &self,
        src_image: &GrayImage,
        src_points: &[na::Point2<f64>],
        dst_image: &GrayImage,
        min_displacement: f64,
    ) -> TrackResult;
}

const MIN_FMATRIX_SAMPLE: usize = 8;

/// Fits a fundamental matrix by RANSAC over a set of point correspondences, reusing the
/// generic `linalg::ransac::RANSAC` driver and `epipolar::fundamental_matrix`'s FNS fit.
struct FundamentalRansacProblem {
    pairs: Vec<(na::Point2<f64>, na::Point2<f64>)>,
}

impl FundamentalRansacProblem {
    fn interleaved(&self, indices: &[usize]) -> Vec<na::Point2<f64>> {
        indices.iter().flat_map(|&i| [self.pairs[i].0, self.pairs[i].1]).collect()
    }

    fn sampson_distance(f: &na::Matrix3<f64>, x0: &na::Point2<f64>, x1: &na::Point2<f64>) -> f64 {
        let v0 = na::Vector3::new(x0.x, x0.y, 1.0);
        let v1 = na::Vector3::new(x1.x, x1.y, 1.0);
        let fx0 = f * v0;
        let ftx1 = f.transpose() * v1;
        let numerator = (v1.dot(&fx0)).powi(2);
        let denom = fx0.x.powi(2) + fx0.y.powi(2) + ftx1.x.powi(2) + ftx1.y.powi(2);
        if denom < 1e-12 {
            f64::INFINITY
        } else {
            (numerator / denom).sqrt()
        }
    }
}

impl RANSAC<na::Matrix3<f64>> for FundamentalRansacProblem {
    fn estimate_from_random_sample(&self) -> na::Matrix3<f64> {
        use rand::seq::index::sample;
        let n = self.pairs.len().min(MIN_FMATRIX_SAMPLE.max(1));
        let sample_size = n.max(MIN_FMATRIX_SAMPLE).min(self.pairs.len());
        let indices: Vec<usize> = sample(&mut rand::thread_rng(), self.pairs.len(), sample_size).into_vec();
        let points = self.interleaved(&indices);
        crate::epipolar::fundamental_matrix::estimate_fundamental_matrix(&points)
            .map(|m| na::Matrix3::from_fn(|r, c| m[(r, c)]))
            .unwrap_or_else(|_| na::Matrix3::zeros())
    }

    fn get_inlier_indices(&self, estimated: &na::Matrix3<f64>, threshold: f64) -> Vec<usize> {
        self.pairs
            .iter()
            .enumerate()
            .filter(|(_, (x0, x1))| Self::sampson_distance(estimated, x0, x1) < threshold)
            .map(|(i, _)| i)
            .collect()
    }

    fn estimate(&self, inlier_indices: &[usize]) -> na::Matrix3<f64> {
        if inlier_indices.len() < MIN_FMATRIX_SAMPLE {
            return self.estimate_from_random_sample();
        }
        let points = self.interleaved(inlier_indices);
        crate::epipolar::fundamental_matrix::estimate_fundamental_matrix(&points)
            .map(|m| na::Matrix3::from_fn(|r, c| m[(r, c)]))
            .unwrap_or_else(|_| na::Matrix3::zeros())
    }
}

fn fit_fundamental_matrix(pairs: Vec<(na::Point2<f64>, na::Point2<f64>)>) -> Option<na::Matrix3<f64>> {
    if pairs.len() < MIN_FMATRIX_SAMPLE {
        return None;
    }
    let problem = FundamentalRansacProblem { pairs };
    let config = RANSACConfig {
        max_iter: 200,
        threshold: usize::MAX,
        inlier_threshold: 2.0,
        confidence: 0.99,
    };
    problem.run(&config).map(|RANSACResult { model, .. }| model)
}

fn filter_by_min_displacement(
    pairs: Vec<(usize, na::Point2<f64>, na::Point2<f64>)>,
    min_displacement: f64,
) -> Vec<(usize, na::Point2<f64>, na::Point2<f64>)> {
    pairs
        .into_iter()
        .filter(|(_, src, dst)| (dst - src).norm() >= min_displacement)
        .collect()
}

fn build_track_result(pairs: Vec<(usize, na::Point2<f64>, na::Point2<f64>)>) -> TrackResult {
    let fundamental_matrix = fit_fundamental_matrix(pairs.iter().map(|(_, s, d)| (*s, *d)).collect());
    let correspondences = pairs
        .into_iter()
        .map(|(seed_index, _, dst)| TrackedCorrespondence { seed_index, dst })
        .collect();
    TrackResult {
        fundamental_matrix,
        correspondences,
    }
}

// ---------------------------------------------------------------------------
// Flow tracker: pyramid + iterative Lucas-Kanade-style patch alignment.
// ---------------------------------------------------------------------------

pub struct FlowTracker {
    pyramid_levels: u32,
    half_window: i32,
    lk_iterations: u32,
    fast_threshold: f32,
}

impl FlowTracker {
    pub fn new() -> Self {
        FlowTracker {
            pyramid_levels: 3,
            half_window: 7,
            lk_iterations: 10,
            fast_threshold: 400.0,
        }
    }

    fn build_pyramid(image: &GrayImage, levels: u32) -> Vec<GrayImage> {
        let mut pyramid = vec![image.clone()];
        for _ in 1..levels {
            let prev = pyramid.last().unwrap();
            let (w, h) = (prev.width().max(2) / 2, prev.height().max(2) / 2);
            if w < 8 || h < 8 {
                break;
            }
            let raw = imgproc::resize(prev, w, h);
            pyramid.push(GrayImage::from_raw(w, h, raw).expect("resize preserves buffer size"));
        }
        pyramid
    }

    fn bilinear_sample(image: &GrayImage, x: f64, y: f64) -> Option<f64> {
        let (w, h) = (image.width() as i64, image.height() as i64);
        if x < 0.0 || y < 0.0 || x >= (w - 1) as f64 || y >= (h - 1) as f64 {
            return None;
        }
        let (ix, iy) = (x.floor() as i64, y.floor() as i64);
        let (fx, fy) = (x - ix as f64, y - iy as f64);
        let raw = image.as_raw();
        let at = |xx: i64, yy: i64| raw[(yy * w + xx) as usize] as f64;
        Some(
            (1.0 - fx) * (1.0 - fy) * at(ix, iy)
                + fx * (1.0 - fy) * at(ix + 1, iy)
                + (1.0 - fx) * fy * at(ix, iy + 1)
                + fx * fy * at(ix + 1, iy + 1),
        )
    }

    /// Refine the displacement `init_d` of a patch centered at `p0` in `src` so it aligns
    /// with `dst`, by the classic forward-additive Lucas-Kanade normal equations built
    /// from the (fixed) template gradient.
    fn lk_refine(
        &self,
        src: &GrayImage,
        dst: &GrayImage,
        p0: na::Point2<f64>,
        init_d: na::Vector2<f64>,
    ) -> Option<na::Vector2<f64>> {
        let hw = self.half_window;
        let mut gxx = 0.0;
        let mut gxy = 0.0;
        let mut gyy = 0.0;
        let mut grads = Vec::with_capacity(((2 * hw + 1) * (2 * hw + 1)) as usize);
        for dy in -hw..=hw {
            for dx in -hw..=hw {
                let (x, y) = (p0.x + dx as f64, p0.y + dy as f64);
                let ix = (Self::bilinear_sample(src, x + 1.0, y)? - Self::bilinear_sample(src, x - 1.0, y)?) / 2.0;
                let iy = (Self::bilinear_sample(src, x, y + 1.0)? - Self::bilinear_sample(src, x, y - 1.0)?) / 2.0;
                gxx += ix * ix;
                gxy += ix * iy;
                gyy += iy * iy;
                grads.push((dx, dy, ix, iy, Self::bilinear_sample(src, x, y)?));
            }
        }
        let det = gxx * gyy - gxy * gxy;
        if det.abs() < 1e-6 {
            return None;
        }

        let mut d = init_d;
        for _ in 0..self.lk_iterations {
            let mut bx = 0.0;
            let mut by = 0.0;
            for &(dx, dy, ix, iy, template) in &grads {
                let (x, y) = (p0.x + dx as f64 + d.x, p0.y + dy as f64 + d.y);
                let target = Self::bilinear_sample(dst, x, y)?;
                let err = template - target;
                bx += ix * err;
                by += iy * err;
            }
            let delta_x = (gyy * bx - gxy * by) / det;
            let delta_y = (gxx * by - gxy * bx) / det;
            d += na::Vector2::new(delta_x, delta_y);
            if delta_x.powi(2) + delta_y.powi(2) < 1e-4 {
                break;
            }
        }
        Some(d)
    }

    fn track_one(&self, src_pyramid: &[GrayImage], dst_pyramid: &[GrayImage], p0: na::Point2<f64>) -> Option<na::Point2<f64>> {
        let n_levels = src_pyramid.len().min(dst_pyramid.len());
        let mut d = na::Vector2::new(0.0, 0.0);
        for level in (0..n_levels).rev() {
            let scale = 1.0 / (1u32 << level) as f64;
            let p_level = na::Point2::new(p0.x * scale, p0.y * scale);
            d = self.lk_refine(&src_pyramid[level], &dst_pyramid[level], p_level, d)?;
            if level > 0 {
                d *= 2.0;
            }
        }
        Some(p0 + d)
    }
}

impl Default for FlowTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker for FlowTracker {
    fn extract_points(&self, image: &GrayImage) -> Vec<na::Point2<f64>> {
        let detector = FASTCornerDetector::new(3, self.fast_threshold, 1, true);
        detector
            .detect(image, 0)
            .into_iter()
            .map(|kpt| na::Point2::new(kpt.x() as f64, kpt.y() as f64))
            .collect()
    }

    fn track(
        &self,
        src_image: &GrayImage,
        src_points: &[na::Point2<f64>],
        dst_image: &GrayImage,
        min_displacement: f64,
    ) -> TrackResult {
        let src_pyramid = Self::build_pyramid(src_image, self.pyramid_levels);
        let dst_pyramid = Self::build_pyramid(dst_image, self.pyramid_levels);

        let raw_matches: Vec<(usize, na::Point2<f64>, na::Point2<f64>)> = src_points
            .iter()
            .enumerate()
            .filter_map(|(idx, &p0)| {
                self.track_one(&src_pyramid, &dst_pyramid, p0).map(|dst| (idx, p0, dst))
            })
            .collect();

        build_track_result(filter_by_min_displacement(raw_matches, min_displacement))
    }
}

// ---------------------------------------------------------------------------
// Feature tracker: FAST + steered BRIEF, ratio-test + cross-check matching.
// ---------------------------------------------------------------------------

pub struct FeatureTracker {
    fast_threshold: f32,
    patch_size: u32,
    n_binary_tests: u32,
    n_discrete_orientations: u32,
    ratio_threshold: f32,
    /// Pixel radius within which a descriptor match is attributed back to one of the
    /// caller's seed points (temporal tracking seeds from existing `FramePoint`s).
    seed_association_radius: f64,
}

impl FeatureTracker {
    pub fn new() -> Self {
        FeatureTracker {
            fast_threshold: 400.0,
            patch_size: 31,
            n_binary_tests: 256,
            n_discrete_orientations: 12,
            ratio_threshold: 0.8,
            seed_association_radius: 3.0,
        }
    }

    fn descriptors(&self, image: &GrayImage) -> Vec<Descriptor<BitVec>> {
        let detector = FASTCornerDetector::new(3, self.fast_threshold, 1, true);
        let kpts = detector.detect(image, 0);
        let extractor = SteeredBrief::new(self.patch_size, self.n_binary_tests, self.n_discrete_orientations);
        extractor.compute(image, &kpts)
    }

    fn nearest_seed(src_points: &[na::Point2<f64>], p: na::Point2<f64>, radius: f64) -> Option<usize> {
        src_points
            .iter()
            .enumerate()
            .map(|(i, sp)| (i, (sp - p).norm()))
            .filter(|(_, d)| *d <= radius)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .map(|(i, _)| i)
    }
}

impl Default for FeatureTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Tracker for FeatureTracker {
    fn extract_points(&self, image: &GrayImage) -> Vec<na::Point2<f64>> {
        self.descriptors(image)
            .into_iter()
            .map(|d| na::Point2::new(d.kpt.x() as f64, d.kpt.y() as f64))
            .collect()
    }

    fn track(
        &self,
        src_image: &GrayImage,
        src_points: &[na::Point2<f64>],
        dst_image: &GrayImage,
        min_displacement: f64,
    ) -> TrackResult {
        let src_descs = self.descriptors(src_image);
        let dst_descs = self.descriptors(dst_image);
        let matches = ratio_cross_check_match(&src_descs, &dst_descs, self.ratio_threshold);

        let raw_matches: Vec<(usize, na::Point2<f64>, na::Point2<f64>)> = matches
            .into_iter()
            .filter_map(|(li, ri)| {
                let src_pt = na::Point2::new(src_descs[li].kpt.x() as f64, src_descs[li].kpt.y() as f64);
                let dst_pt = na::Point2::new(dst_descs[ri].kpt.x() as f64, dst_descs[ri].kpt.y() as f64);
                Self::nearest_seed(src_points, src_pt, self.seed_association_radius)
                    .map(|seed_index| (seed_index, src_pt, dst_pt))
            })
            .collect();

        build_track_result(filter_by_min_displacement(raw_matches, min_displacement))
    }
}

//! 2-D affine transforms (points, not images -- see `crate::imgproc::affine_transform`
//! for the image-resampling counterpart of this module's `affine_transform`).
use nalgebra::{Matrix2x3, Point2, Vector2};

fn apply(mat: &Matrix2x3<f32>, x: f32, y: f32) -> (f32, f32) {
    (
        mat[(0, 0)] * x + mat[(0, 1)] * y + mat[(0, 2)],
        mat[(1, 0)] * x + mat[(1, 1)] * y + mat[(1, 2)],
    )
}

/// Apply `mat` to a free vector (used by `imgproc::affine_transform` to resample pixels).
pub fn affine_transform(mat: &Matrix2x3<f32>, pt: &Vector2<f32>) -> Point2<f32> {
    let (x, y) = apply(mat, pt.x, pt.y);
    Point2::new(x, y)
}

/// Apply `mat` to a point (used to rotate BRIEF binary test pairs).
pub fn warp_point(mat: &Matrix2x3<f32>, pt: &Point2<f32>) -> Point2<f32> {
    let (x, y) = apply(mat, pt.x, pt.y);
    Point2::new(x, y)
}

/// Invert an affine transform, assuming the 2x2 linear part is non-singular.
pub fn inv_affine_mat(mat: &Matrix2x3<f32>) -> Matrix2x3<f32> {
    let (a00, a01, a10, a11) = (mat[(0, 0)], mat[(0, 1)], mat[(1, 0)], mat[(1, 1)]);
    let (tx, ty) = (mat[(0, 2)], mat[(1, 2)]);

    let det = a00 * a11 - a01 * a10;
    let inv_det = 1.0 / det;

    let (i00, i01, i10, i11) = (a11 * inv_det, -a01 * inv_det, -a10 * inv_det, a00 * inv_det);
    let itx = -(i00 * tx + i01 * ty);
    let ity = -(i10 * tx + i11 * ty);

    Matrix2x3::new(i00, i01, itx, i10, i11, ity)
}

/// Compose two affine transforms so that `merge(outer, inner)` applied to a point equals
/// applying `inner` then `outer`.
pub fn merge_affine_transforms(outer: &Matrix2x3<f32>, inner: &Matrix2x3<f32>) -> Matrix2x3<f32> {
    let (o00, o01, o10, o11) = (outer[(0, 0)], outer[(0, 1)], outer[(1, 0)], outer[(1, 1)]);
    let (otx, oty) = (outer[(0, 2)], outer[(1, 2)]);
    let (i00, i01, i10, i11) = (inner[(0, 0)], inner[(0, 1)], inner[(1, 0)], inner[(1, 1)]);
    let (itx, ity) = (inner[(0, 2)], inner[(1, 2)]);

    Matrix2x3::new(
        o00 * i00 + o01 * i10,
        o00 * i01 + o01 * i11,
        o00 * itx + o01 * ity + otx,
        o10 * i00 + o11 * i10,
        o10 * i01 + o11 * i11,
        o10 * itx + o11 * ity + oty,
    )
}

/// Build the similarity transform that rotates `angle_deg` degrees and scales by `scale`
/// about `center`, matching the conventional `getRotationMatrix2D` formulation.
pub fn get_rotation_matrix(angle_deg: f32, center: (f32, f32), scale: f32) -> Matrix2x3<f32> {
    let angle_rad = angle_deg.to_radians();
    let alpha = scale * angle_rad.cos();
    let beta = scale * angle_rad.sin();
    let (cx, cy) = center;

    Matrix2x3::new(
        alpha,
        beta,
        (1.0 - alpha) * cx - beta * cy,
        -beta,
        alpha,
        beta * cx + (1.0 - alpha) * cy,
    )
}

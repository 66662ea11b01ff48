//! 3-D points, projection matrices and the rigid stereo rig they come in pairs as.
use nalgebra as na;

/// RGBA color sample taken from a source image at a 2-D observation.
pub type Color = (u8, u8, u8, u8);

/// A 3-D point with a color sample, as exposed by `World::sparse_cloud`.
#[derive(Clone, Copy, Debug)]
pub struct ColorPoint3d {
    pub point: na::Point3<f64>,
    pub color: Color,
}

/// A single camera's 3x4 projection matrix, kept factored as `K * [R | t]` so the
/// rotation/translation block and the intrinsics can be read back independently.
#[derive(Clone, Debug)]
pub struct ProjectionMatrix {
    k: na::Matrix3<f64>,
    rotation: na::Matrix3<f64>,
    translation: na::Vector3<f64>,
}

impl ProjectionMatrix {
    pub fn new(k: na::Matrix3<f64>, rotation: na::Matrix3<f64>, translation: na::Vector3<f64>) -> Self {
        ProjectionMatrix {
            k,
            rotation,
            translation,
        }
    }

    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    pub fn cx(&self) -> f64 {
        self.k[(0, 2)]
    }

    pub fn cy(&self) -> f64 {
        self.k[(1, 2)]
    }

    pub fn intrinsics(&self) -> &na::Matrix3<f64> {
        &self.k
    }

    pub fn rotation(&self) -> na::Matrix3<f64> {
        self.rotation
    }

    pub fn translation(&self) -> na::Vector3<f64> {
        self.translation
    }

    pub fn set_pose(&mut self, rotation: na::Matrix3<f64>, translation: na::Vector3<f64>) {
        self.rotation = rotation;
        self.translation = translation;
    }

    /// Shift the principal point by `(dx, dy)` pixels, in place.
    pub fn shift_principal_point(&mut self, dx: f64, dy: f64) {
        self.k[(0, 2)] += dx;
        self.k[(1, 2)] += dy;
    }

    /// The full 3x4 `K * [R | t]` camera matrix, as used by the linear-triangulation /
    /// least-squares routines in `crate::epipolar` and `crate::linalg`.
    pub fn as_dmatrix(&self) -> na::DMatrix<f64> {
        let rt = na::Matrix3x4::from_columns(&[
            self.rotation.column(0).into_owned(),
            self.rotation.column(1).into_owned(),
            self.rotation.column(2).into_owned(),
            self.translation,
        ]);
        let pm: na::Matrix3x4<f64> = self.k * rt;
        na::DMatrix::from_row_slice(3, 4, pm.transpose().as_slice())
    }

    /// Depth of `point` in this camera's own frame; positive iff in front of the camera.
    pub fn z_in_camera_frame(&self, point: &na::Point3<f64>) -> f64 {
        (self.rotation * point.coords + self.translation).z
    }

    /// Project a 3-D world point into this camera's pixel plane. `None` if the point is
    /// behind the camera or at the optical center (degenerate homogeneous divide).
    pub fn project(&self, point: &na::Point3<f64>) -> Option<na::Point2<f64>> {
        let cam = self.rotation * point.coords + self.translation;
        if cam.z <= 1e-12 {
            return None;
        }
        let pix = self.k * cam;
        Some(na::Point2::new(pix.x / pix.z, pix.y / pix.z))
    }

    pub fn reprojection_error(&self, point: &na::Point3<f64>, observed: &na::Point2<f64>) -> Option<f64> {
        self.project(point).map(|p| (p - observed).norm())
    }
}

/// A calibrated stereo rig's pair of projection matrices, sharing a common world frame.
#[derive(Clone, Debug)]
pub struct StereoCameraMatrix {
    pub left: ProjectionMatrix,
    pub right: ProjectionMatrix,
}

impl StereoCameraMatrix {
    pub fn new(left: ProjectionMatrix, right: ProjectionMatrix) -> Self {
        StereoCameraMatrix { left, right }
    }

    /// Distance between the optical centers of the two cameras.
    pub fn baseline(&self) -> f64 {
        (self.left.translation() - self.right.translation()).norm()
    }

    /// Build the right camera's projection matrix by applying the rigid rig transform
    /// recorded at map-open time to a newly recovered left pose (§4.3): the rig is rigid,
    /// so `right = Rig * left` where `Rig` is the relative pose captured here at construction.
    pub fn right_from_left_pose(
        &self,
        left_rotation: &na::Matrix3<f64>,
        left_translation: &na::Vector3<f64>,
    ) -> ProjectionMatrix {
        let rig_rotation = self.right.rotation() * self.left.rotation().transpose();
        let rig_translation = self.right.translation() - rig_rotation * self.left.translation();

        let right_rotation = rig_rotation * left_rotation;
        let right_translation = rig_rotation * left_translation + rig_translation;
        ProjectionMatrix::new(*self.right.intrinsics(), right_rotation, right_translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_k() -> na::Matrix3<f64> {
        na::Matrix3::new(500.0, 0.0, 320.0, 0.0, 500.0, 240.0, 0.0, 0.0, 1.0)
    }

    #[test]
    fn project_and_reproject_round_trip() {
        let pm = ProjectionMatrix::new(identity_k(), na::Matrix3::identity(), na::Vector3::new(0.0, 0.0, 0.0));
        let point = na::Point3::new(0.1, -0.05, 2.0);
        let pixel = pm.project(&point).unwrap();
        assert!(pm.reprojection_error(&point, &pixel).unwrap() < 1e-9);
    }

    #[test]
    fn behind_camera_has_no_projection() {
        let pm = ProjectionMatrix::new(identity_k(), na::Matrix3::identity(), na::Vector3::new(0.0, 0.0, 0.0));
        let point = na::Point3::new(0.0, 0.0, -1.0);
        assert!(pm.project(&point).is_none());
        assert!(pm.z_in_camera_frame(&point) < 0.0);
    }

    #[test]
    fn baseline_matches_translation_difference() {
        let left = ProjectionMatrix::new(identity_k(), na::Matrix3::identity(), na::Vector3::zeros());
        let right = ProjectionMatrix::new(identity_k(), na::Matrix3::identity(), na::Vector3::new(-0.1, 0.0, 0.0));
        let rig = StereoCameraMatrix::new(left, right);
        assert!((rig.baseline() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn right_from_left_pose_preserves_baseline_after_motion() {
        let left0 = ProjectionMatrix::new(identity_k(), na::Matrix3::identity(), na::Vector3::zeros());
        let right0 = ProjectionMatrix::new(identity_k(), na::Matrix3::identity(), na::Vector3::new(-0.1, 0.0, 0.0));
        let rig = StereoCameraMatrix::new(left0, right0);

        let new_left_rotation = na::Matrix3::identity();
        let new_left_translation = na::Vector3::new(0.0, 0.0, 0.3);
        let new_right = rig.right_from_left_pose(&new_left_rotation, &new_left_translation);
        let new_baseline = (new_left_translation - new_right.translation()).norm();
        assert!((new_baseline - 0.1).abs() < 1e-9);
    }
}

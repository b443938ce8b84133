//! Per-draw transform block

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec4};

/// Transform constants for one drawable, recomputed every frame
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Constants {
    pub model: Mat4,
    pub model_view: Mat4,
    pub model_view_projection: Mat4,
    /// Inverse-transpose of the upper 3x3 of model-view, padded to 4x4
    pub normal_matrix: Mat4,
    /// Inverse-transpose of the upper 3x3 of model, padded to 4x4
    pub world_normal_matrix: Mat4,
    /// x = near, y = far
    pub near_far: Vec4,
}

impl Constants {
    pub fn new(model: Mat4, view: Mat4, projection: Mat4, near: f32, far: f32) -> Self {
        let model_view = view * model;
        Self {
            model,
            model_view,
            model_view_projection: projection * model_view,
            normal_matrix: inverse_transpose_3x3(model_view),
            world_normal_matrix: inverse_transpose_3x3(model),
            near_far: Vec4::new(near, far, 0.0, 0.0),
        }
    }
}

impl Default for Constants {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY, 0.0, 1.0)
    }
}

fn inverse_transpose_3x3(matrix: Mat4) -> Mat4 {
    let upper = Mat3::from_mat4(matrix);
    if upper.determinant().abs() <= f32::EPSILON {
        return Mat4::IDENTITY;
    }
    Mat4::from_mat3(upper.inverse().transpose())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_normal_matrix_undoes_scale() {
        let model = Mat4::from_scale(Vec3::new(2.0, 1.0, 1.0));
        let constants = Constants::new(model, Mat4::IDENTITY, Mat4::IDENTITY, 0.1, 100.0);
        let normal = constants.world_normal_matrix.transform_vector3(Vec3::X);
        assert!(normal.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-6));
        assert_eq!(constants.normal_matrix, constants.world_normal_matrix);
    }

    #[test]
    fn test_block_is_uniform_aligned() {
        assert_eq!(std::mem::size_of::<Constants>() % 16, 0);
        assert_eq!(std::mem::size_of::<Constants>(), 5 * 64 + 16);
    }
}

//! Camera system

use glam::{Mat4, Vec3};

/// Perspective projection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    pub fov_y: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if aspect.is_finite() && aspect > 0.0 {
            self.aspect = aspect;
        }
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3, projection: Projection) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection,
        }
    }

    /// Move the eye; the camera keeps looking at its target
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Update aspect ratio from a surface size
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if height > 0.0 {
            self.projection.set_aspect(width / height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_projects_to_screen_center() {
        let camera = Camera::new(
            Vec3::new(0.0, 0.0, 2.5),
            Vec3::ZERO,
            Projection::perspective(65.0, 1.5, 0.1, 100.0),
        );
        let clip = camera.view_projection_matrix() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-6 && ndc.y.abs() < 1e-6);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn test_degenerate_aspect_is_ignored() {
        let mut camera = Camera::new(
            Vec3::Z,
            Vec3::ZERO,
            Projection::perspective(65.0, 2.0, 0.1, 100.0),
        );
        camera.set_aspect(800.0, 0.0);
        assert_eq!(camera.projection.aspect, 2.0);
        camera.set_aspect(800.0, 400.0);
        assert_eq!(camera.projection.aspect, 2.0);
        camera.set_aspect(400.0, 400.0);
        assert_eq!(camera.projection.aspect, 1.0);
    }
}

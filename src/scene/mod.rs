//! Scene state: simulation clock, camera, orbiting lights and the per-draw
//! constants derived from them.
//!
//! Everything here is plain arithmetic. The renderer reads the derived
//! [`Constants`] and light uniforms after each [`SceneState::update`].

mod camera;
mod constants;
mod input;
mod light;

pub use camera::*;
pub use constants::*;
pub use input::*;
pub use light::*;

use glam::{Mat4, Quat, Vec3};
use std::f32::consts::{FRAC_PI_2, PI};

/// Axis the scene mesh spins around (normalized before use)
pub const OBJECT_ROTATION_AXIS: Vec3 = Vec3::new(0.7, 1.0, 0.0);
/// Radians of mesh rotation per second of scene time
pub const OBJECT_ROTATION_RATE: f32 = 0.5;
/// Shared factor applied to every light's orbit rate
pub const ORBIT_RATE_SCALE: f32 = 0.5;
/// Lights orbit in the plane z = LIGHT_ORBIT_HEIGHT
pub const LIGHT_ORBIT_HEIGHT: f32 = 1.0;

pub const CAMERA_START: Vec3 = Vec3::new(0.0, 0.0, 2.5);
pub const FIELD_OF_VIEW_DEGREES: f32 = 65.0;
pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// A light together with the orbit that places it each frame
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLight {
    pub light: PointLight,
    pub orbit: LightOrbit,
}

impl SceneLight {
    pub fn new(light: PointLight, orbit: LightOrbit) -> Self {
        let mut light = light;
        light.position = orbit.position();
        Self { light, orbit }
    }

    /// Bounding sphere transform: unit sphere scaled to the light radius
    pub fn volume_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.light.position) * Mat4::from_scale(Vec3::splat(self.light.radius))
    }
}

/// The three coloured lights of the demo scene
pub fn default_lights() -> Vec<SceneLight> {
    let attenuation = Attenuation::new(0.1, 1.0, 5.0);
    [
        (Vec3::X, FRAC_PI_2, 1.0),
        (Vec3::Y, 0.0, 1.5),
        (Vec3::Z, PI, 1.3),
    ]
    .into_iter()
    .map(|(color, angle, rate)| {
        SceneLight::new(
            PointLight::new(color, attenuation, 0.1, 0.3),
            LightOrbit {
                angle,
                radius: 2.0,
                rate,
                height: LIGHT_ORBIT_HEIGHT,
            },
        )
    })
    .collect()
}

/// Scene State Updater
#[derive(Debug, Clone)]
pub struct SceneState {
    time: f32,
    pub camera: Camera,
    lights: Vec<SceneLight>,
    mesh_constants: Constants,
    light_constants: Vec<Constants>,
    viewport: (u32, u32),
}

impl SceneState {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_lights(width, height, default_lights())
    }

    pub fn with_lights(width: u32, height: u32, lights: Vec<SceneLight>) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        let camera = Camera::new(
            CAMERA_START,
            Vec3::ZERO,
            Projection::perspective(FIELD_OF_VIEW_DEGREES, aspect, NEAR_PLANE, FAR_PLANE),
        );
        let light_count = lights.len();
        let mut state = Self {
            time: 0.0,
            camera,
            lights,
            mesh_constants: Constants::default(),
            light_constants: vec![Constants::default(); light_count],
            viewport: (width, height),
        };
        state.recompute();
        state
    }

    /// Advance the clock by `dt` seconds and rederive every transform
    pub fn update(&mut self, dt: f32) {
        self.time += dt;
        for entry in &mut self.lights {
            entry.orbit.advance(dt, ORBIT_RATE_SCALE);
            entry.light.position = entry.orbit.position();
        }
        self.recompute();
    }

    /// React to a discrete input event
    pub fn apply_input(&mut self, event: InputEvent) {
        self.camera.translate(event.camera_delta());
        self.recompute();
    }

    /// Track the surface size for the projection and screen-space lookups
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.camera.set_aspect(width as f32, height as f32);
        self.recompute();
    }

    fn recompute(&mut self) {
        let view = self.camera.view_matrix();
        let projection = self.camera.projection_matrix();
        let (near, far) = (self.camera.projection.near, self.camera.projection.far);

        let rotation = Quat::from_axis_angle(
            OBJECT_ROTATION_AXIS.normalize(),
            OBJECT_ROTATION_RATE * self.time,
        );
        self.mesh_constants = Constants::new(Mat4::from_quat(rotation), view, projection, near, far);

        self.light_constants.clear();
        self.light_constants.extend(
            self.lights
                .iter()
                .map(|entry| Constants::new(entry.volume_matrix(), view, projection, near, far)),
        );
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn lights(&self) -> &[SceneLight] {
        &self.lights
    }

    pub fn mesh_constants(&self) -> &Constants {
        &self.mesh_constants
    }

    pub fn light_constants(&self) -> &[Constants] {
        &self.light_constants
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn screen_uniform(&self) -> ScreenUniform {
        ScreenUniform::new(self.viewport.0, self.viewport.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_step_keeps_matrices() {
        let mut scene = SceneState::new(800, 600);
        scene.update(0.25);
        let before = (scene.mesh_constants, scene.light_constants.clone());
        scene.update(0.0);
        assert_eq!(before.0, scene.mesh_constants);
        assert_eq!(before.1, scene.light_constants);
    }

    #[test]
    fn test_light_starts_on_orbit() {
        let scene = SceneState::new(800, 600);
        let first = scene.lights()[0].light.position;
        assert!(first.abs_diff_eq(Vec3::new(0.0, 2.0, 1.0), 1e-6));
    }

    #[test]
    fn test_input_moves_camera_only() {
        let mut scene = SceneState::new(800, 600);
        let lights = scene.lights().to_vec();
        scene.apply_input(InputEvent::MoveForward);
        scene.apply_input(InputEvent::MoveLeft);
        assert!(scene
            .camera
            .position
            .abs_diff_eq(CAMERA_START + Vec3::new(-CAMERA_SPEED, 0.0, -CAMERA_SPEED), 1e-6));
        assert_eq!(scene.lights(), &lights[..]);
    }

    #[test]
    fn test_viewport_changes_projection() {
        let mut scene = SceneState::new(800, 600);
        let before = scene.mesh_constants().model_view_projection;
        scene.set_viewport_size(1200, 600);
        assert_eq!(scene.viewport(), (1200, 600));
        assert_ne!(before, scene.mesh_constants().model_view_projection);
        assert_eq!(scene.screen_uniform().size, glam::Vec2::new(1200.0, 600.0));
    }

    #[test]
    fn test_light_volume_is_scaled_sphere() {
        let scene = SceneState::new(800, 600);
        let entry = &scene.lights()[1];
        let surface = entry.volume_matrix().transform_point3(Vec3::X);
        assert!((surface.distance(entry.light.position) - entry.light.radius).abs() < 1e-5);
    }
}

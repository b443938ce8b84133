//! Per-pixel CPU model of the deferred pipeline
//!
//! Follows one pixel through the stencil and light accumulation passes using
//! the same depth/stencil states the GPU pipelines are built from, with the
//! light volumes treated as ideal spheres. Useful for checking what a frame
//! should contain without a GPU.

use crate::backend::types::*;
use crate::pipeline::light_pass::{light_depth_stencil, LIGHT_STENCIL_REFERENCE};
use crate::pipeline::stencil_pass::{volume_depth_stencil, VOLUME_STENCIL_REFERENCE};
use crate::scene::{PointLight, SceneLight, SceneState};
use glam::{Mat4, Vec3};

/// What the G-buffer holds for one pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSample {
    pub position: Vec3,
    pub normal: Vec3,
    pub albedo: Vec3,
}

/// Order in which the two faces of one light volume reach a pixel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceOrder {
    BackFirst,
    FrontFirst,
}

/// New stencil value after one fragment, honouring the read and write masks
pub fn stencil_after_fragment(
    ds: &DepthStencilState,
    facing: Facing,
    depth_passed: bool,
    stored: u8,
    reference: u8,
) -> u8 {
    let state = ds.stencil;
    let (read_mask, write_mask) = (state.read_mask as u8, state.write_mask as u8);
    let face = state.face(facing);
    let op = if !face.compare.passes(reference & read_mask, stored & read_mask) {
        face.fail_op
    } else if !depth_passed {
        face.depth_fail_op
    } else {
        face.pass_op
    };
    (stored & !write_mask) | (op.apply(stored, reference) & write_mask)
}

/// What a light's fragment shader returns for a G-buffer sample
pub fn light_fragment(light: &PointLight, sample: &SurfaceSample) -> Vec3 {
    let distance = light.position.distance(sample.position);
    if distance > light.radius || sample.normal.length_squared() == 0.0 {
        return Vec3::ZERO;
    }
    light.shade(sample.albedo, sample.normal.normalize(), sample.position)
}

/// A frozen view of the scene for evaluating single pixels
#[derive(Debug, Clone)]
pub struct ReferenceModel {
    camera: Vec3,
    view_projection: Mat4,
    lights: Vec<SceneLight>,
    face_order: FaceOrder,
}

impl ReferenceModel {
    pub fn new(scene: &SceneState, face_order: FaceOrder) -> Self {
        Self {
            camera: scene.camera.position,
            view_projection: scene.camera.view_projection_matrix(),
            lights: scene.lights().to_vec(),
            face_order,
        }
    }

    /// Depth a point would be written with, if it survives clipping
    pub fn depth(&self, point: Vec3) -> Option<f32> {
        let clip = self.view_projection * point.extend(1.0);
        if clip.w <= 0.0 {
            return None;
        }
        let z = clip.z / clip.w;
        (0.0..=1.0).contains(&z).then_some(z)
    }

    /// Where the pixel's ray enters and leaves a light's sphere, in that order
    fn crossings(&self, light: &PointLight, surface: Vec3) -> (Option<Vec3>, Option<Vec3>) {
        let direction = (surface - self.camera).normalize_or_zero();
        if direction == Vec3::ZERO {
            return (None, None);
        }
        let to_camera = self.camera - light.position;
        let b = to_camera.dot(direction);
        let c = to_camera.length_squared() - light.radius * light.radius;
        let discriminant = b * b - c;
        if discriminant <= 0.0 {
            return (None, None);
        }
        let root = discriminant.sqrt();
        let visible = |t: f32| {
            let point = self.camera + direction * t;
            (t > 0.0 && self.depth(point).is_some()).then_some(point)
        };
        (visible(-b - root), visible(-b + root))
    }

    /// Stencil value left behind by the volume pass for a pixel showing `surface`
    pub fn stencil(&self, surface: Vec3) -> u8 {
        let ds = volume_depth_stencil();
        let reference = VOLUME_STENCIL_REFERENCE as u8;
        let stored_depth = self.depth(surface).unwrap_or(1.0);

        let mut value = 0u8;
        for entry in &self.lights {
            let (front, back) = self.crossings(&entry.light, surface);
            let faces = match self.face_order {
                FaceOrder::BackFirst => [(Facing::Back, back), (Facing::Front, front)],
                FaceOrder::FrontFirst => [(Facing::Front, front), (Facing::Back, back)],
            };
            for (facing, point) in faces {
                let Some(depth) = point.and_then(|p| self.depth(p)) else {
                    continue;
                };
                let depth_passed = ds.depth_compare.passes(depth, stored_depth);
                value = stencil_after_fragment(&ds, facing, depth_passed, value, reference);
            }
        }
        value
    }

    /// Colour the accumulation target ends up with for one pixel
    pub fn shade(&self, sample: &SurfaceSample) -> Vec3 {
        let stencil = self.stencil(sample.position);
        let ds = light_depth_stencil();
        let reference = LIGHT_STENCIL_REFERENCE as u8;
        let face = ds.stencil.face(Facing::Back);
        let read_mask = ds.stencil.read_mask as u8;

        self.lights
            .iter()
            .filter(|entry| self.crossings(&entry.light, sample.position).1.is_some())
            .filter(|_| {
                face.compare
                    .passes(reference & read_mask, stencil & read_mask)
            })
            .map(|entry| light_fragment(&entry.light, sample))
            .fold(Vec3::ZERO, |sum, color| sum + color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Attenuation, LightOrbit};

    fn light_at(position: Vec3, color: Vec3) -> SceneLight {
        // a zero-radius orbit parks the light at (0, 0, height); shift it afterwards
        let mut entry = SceneLight::new(
            PointLight::new(color, Attenuation::new(0.1, 1.0, 5.0), 0.1, 0.3),
            LightOrbit {
                angle: 0.0,
                radius: 0.0,
                rate: 0.0,
                height: 0.0,
            },
        );
        entry.light.position = position;
        entry
    }

    fn model(lights: Vec<SceneLight>, order: FaceOrder) -> ReferenceModel {
        ReferenceModel::new(&SceneState::with_lights(800, 600, lights), order)
    }

    fn sample(position: Vec3) -> SurfaceSample {
        SurfaceSample {
            position,
            normal: Vec3::Z,
            albedo: Vec3::ONE,
        }
    }

    #[test]
    fn test_masks_limit_stencil_updates() {
        let volume = volume_depth_stencil();
        assert_eq!(stencil_after_fragment(&volume, Facing::Back, false, 0, 0), 1);
        assert_eq!(stencil_after_fragment(&volume, Facing::Front, false, 0, 0), 0);

        let light = light_depth_stencil();
        assert_eq!(stencil_after_fragment(&light, Facing::Back, true, 3, 0), 3);

        let mut low_bits = volume.clone();
        low_bits.stencil.write_mask = 0x01;
        assert_eq!(stencil_after_fragment(&low_bits, Facing::Back, false, 0xf1, 0), 0xf0);
    }

    #[test]
    fn test_point_inside_volume_is_lit() {
        let lights = vec![light_at(Vec3::ZERO, Vec3::X)];
        for order in [FaceOrder::BackFirst, FaceOrder::FrontFirst] {
            // the camera starts inside this light's sphere; only the back face is drawn
            let m = model(lights.clone(), order);
            let s = sample(Vec3::new(0.0, 0.0, 1.0));
            assert_eq!(m.stencil(s.position), 1);
            let expected = lights[0].light.shade(s.albedo, s.normal, s.position);
            assert!(m.shade(&s).abs_diff_eq(expected, 1e-6));
            assert!(m.shade(&s).x > 0.0);
        }
    }

    #[test]
    fn test_point_outside_volume_gets_nothing() {
        let m = model(vec![light_at(Vec3::new(10.0, 0.0, 0.0), Vec3::X)], FaceOrder::FrontFirst);
        let s = sample(Vec3::ZERO);
        assert_eq!(m.stencil(s.position), 0);
        assert_eq!(m.shade(&s), Vec3::ZERO);
    }

    #[test]
    fn test_point_behind_volume_is_unmarked() {
        let m = model(vec![light_at(Vec3::ZERO, Vec3::Y)], FaceOrder::FrontFirst);
        assert_eq!(m.stencil(Vec3::new(0.0, 0.0, -6.0)), 0);
    }

    #[test]
    fn test_occluder_in_front_of_volume_stays_dark() {
        let lights = vec![light_at(Vec3::new(0.0, 0.0, -6.0), Vec3::Z)];
        let s = sample(Vec3::ZERO);

        let back_first = model(lights.clone(), FaceOrder::BackFirst);
        assert_eq!(back_first.stencil(s.position), 0);

        // the clamped decrement cannot undo a later increment
        let front_first = model(lights, FaceOrder::FrontFirst);
        assert_eq!(front_first.stencil(s.position), 1);
        assert_eq!(front_first.shade(&s), Vec3::ZERO);
    }

    #[test]
    fn test_overlapping_lights_add_up() {
        let red = light_at(Vec3::new(0.3, 0.0, 0.0), Vec3::X);
        let green = light_at(Vec3::new(-0.3, 0.0, 0.0), Vec3::Y);
        let s = sample(Vec3::new(0.0, 0.0, 0.5));
        let m = model(vec![red.clone(), green.clone()], FaceOrder::BackFirst);

        let expected = light_fragment(&red.light, &s) + light_fragment(&green.light, &s);
        assert!(m.shade(&s).abs_diff_eq(expected, 1e-6));
        assert!(m.shade(&s).x > 0.0 && m.shade(&s).y > 0.0);
    }

    #[test]
    fn test_no_lights_is_black() {
        let m = model(Vec::new(), FaceOrder::BackFirst);
        assert_eq!(m.stencil(Vec3::ZERO), 0);
        assert_eq!(m.shade(&sample(Vec3::ZERO)), Vec3::ZERO);
    }

    #[test]
    fn test_empty_gbuffer_texel_is_not_shaded() {
        let entry = light_at(Vec3::ZERO, Vec3::ONE);
        let background = SurfaceSample {
            position: Vec3::ZERO,
            normal: Vec3::ZERO,
            albedo: Vec3::ZERO,
        };
        assert_eq!(light_fragment(&entry.light, &background), Vec3::ZERO);
    }
}

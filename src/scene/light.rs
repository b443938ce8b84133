//! Point lights and their orbits

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Light contributions below this fraction of the brightest channel are cut off
pub const LIGHT_CUTOFF_SCALE: f32 = 256.0 / 5.0;

/// `intensity = 1 / (constant + linear·d + exponential·d²)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub constant: f32,
    pub linear: f32,
    pub exponential: f32,
}

impl Attenuation {
    pub fn new(constant: f32, linear: f32, exponential: f32) -> Self {
        Self {
            constant,
            linear,
            exponential,
        }
    }

    /// Denominator of the falloff at a distance
    pub fn evaluate(&self, distance: f32) -> f32 {
        self.constant + self.linear * distance + self.exponential * distance * distance
    }
}

/// Distance at which a light stops contributing visibly.
///
/// Positive root of `e·r² + l·r + (c − t) = 0` with `t = LIGHT_CUTOFF_SCALE · max(color)`.
/// Falls back to the linear solution when there is no quadratic term.
pub fn influence_radius(color: Vec3, attenuation: Attenuation) -> f32 {
    let threshold = LIGHT_CUTOFF_SCALE * color.max_element();
    let Attenuation {
        constant: c,
        linear: l,
        exponential: e,
    } = attenuation;

    if e.abs() <= f32::EPSILON {
        return if l > 0.0 { ((threshold - c) / l).max(0.0) } else { 0.0 };
    }

    let discriminant = l * l - 4.0 * e * (c - threshold);
    if discriminant < 0.0 {
        return 0.0;
    }
    ((-l + discriminant.sqrt()) / (2.0 * e)).max(0.0)
}

/// A point light
#[derive(Debug, Clone, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    pub color: Vec3,
    pub attenuation: Attenuation,
    pub ambient_intensity: f32,
    pub diffuse_intensity: f32,
    /// Bounding sphere radius, fixed at creation
    pub radius: f32,
}

impl PointLight {
    pub fn new(
        color: Vec3,
        attenuation: Attenuation,
        ambient_intensity: f32,
        diffuse_intensity: f32,
    ) -> Self {
        Self {
            position: Vec3::ZERO,
            color,
            attenuation,
            ambient_intensity,
            diffuse_intensity,
            radius: influence_radius(color, attenuation),
        }
    }

    /// Shading contribution at a surface point
    pub fn shade(&self, albedo: Vec3, normal: Vec3, position: Vec3) -> Vec3 {
        let to_light = self.position - position;
        let distance = to_light.length();
        let n_dot_l = if distance > 0.0 {
            normal.dot(to_light / distance).max(0.0)
        } else {
            0.0
        };
        let falloff = self.attenuation.evaluate(distance);
        let intensity = self.ambient_intensity + self.diffuse_intensity * n_dot_l;
        albedo * self.color * intensity / falloff
    }

    /// Convert to GPU data format
    pub fn to_uniform(&self) -> PointLightUniform {
        PointLightUniform {
            position_radius: self.position.extend(self.radius),
            color: self.color.extend(1.0),
            attenuation: Vec4::new(
                self.attenuation.constant,
                self.attenuation.linear,
                self.attenuation.exponential,
                0.0,
            ),
            intensity: Vec4::new(self.ambient_intensity, self.diffuse_intensity, 0.0, 0.0),
        }
    }
}

/// Circular orbit in a plane of constant height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightOrbit {
    pub angle: f32,
    pub radius: f32,
    pub rate: f32,
    pub height: f32,
}

impl LightOrbit {
    /// Advance by `dt` seconds; `rate_scale` is shared by all orbits
    pub fn advance(&mut self, dt: f32, rate_scale: f32) {
        self.angle += dt * rate_scale * self.rate;
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(
            self.radius * self.angle.cos(),
            self.radius * self.angle.sin(),
            self.height,
        )
    }
}

/// Per-light data for the light volume shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PointLightUniform {
    pub position_radius: Vec4,
    pub color: Vec4,
    pub attenuation: Vec4,
    /// x = ambient, y = diffuse
    pub intensity: Vec4,
}

/// Screen size for turning fragment coordinates into G-buffer texture coordinates
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ScreenUniform {
    pub size: Vec2,
    pub _padding: Vec2,
}

impl ScreenUniform {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: Vec2::new(width as f32, height as f32),
            _padding: Vec2::ZERO,
        }
    }
}

//! GPU-side scene data shared by the deferred passes
//!
//! Created once at startup. Buffers are rewritten from the [`SceneState`]
//! every frame; nothing here depends on the surface size except the screen
//! uniform's contents.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::resources::{GpuMesh, GpuTexture, Mesh, TextureData};
use crate::scene::{SceneState, ScreenUniform};

/// Tessellation of the light volume sphere
pub const LIGHT_VOLUME_SEGMENTS: u32 = 24;
pub const LIGHT_VOLUME_RINGS: u32 = 16;

/// Tessellation of the textured scene sphere
pub const SCENE_MESH_SEGMENTS: u32 = 48;
pub const SCENE_MESH_RINGS: u32 = 32;

/// The textured scene mesh and the bind group it is drawn with
#[derive(Debug, Clone, Copy)]
pub struct MeshBinding {
    pub mesh: GpuMesh,
    pub layout: BindGroupLayoutHandle,
    pub bind_group: BindGroupHandle,
}

/// The unit sphere drawn once per light, with one bind group per light
#[derive(Debug, Clone)]
pub struct LightVolumes {
    pub mesh: GpuMesh,
    pub layout: BindGroupLayoutHandle,
    pub bind_groups: Vec<BindGroupHandle>,
}

struct LightBuffers {
    constants: BufferHandle,
    light: BufferHandle,
}

pub struct SceneResources {
    pub mesh: MeshBinding,
    pub volumes: LightVolumes,
    /// Screen size for the light pass, rewritten on resize
    pub screen: BufferHandle,
    mesh_constants: BufferHandle,
    lights: Vec<LightBuffers>,
    texture: GpuTexture,
}

fn uniform_buffer<B: GraphicsBackend>(
    backend: &mut B,
    label: String,
    data: &[u8],
) -> BackendResult<BufferHandle> {
    backend.create_buffer_init(
        &BufferDescriptor {
            label: Some(label),
            size: data.len() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        },
        data,
    )
}

impl SceneResources {
    pub fn create<B: GraphicsBackend>(
        backend: &mut B,
        scene: &SceneState,
        texture_data: &TextureData,
    ) -> BackendResult<Self> {
        let texture = GpuTexture::create(backend, texture_data)?;
        let sampler = backend.create_sampler(&SamplerDescriptor::new(
            "Scene Texture Sampler",
            FilterMode::Linear,
            AddressMode::Repeat,
        ))?;

        let mesh_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Texture {
                    sample_type: TextureSampleType::Float { filterable: true },
                },
            },
            BindGroupLayoutEntry {
                binding: 2,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { filtering: true },
            },
        ])?;

        let mesh_constants = uniform_buffer(
            backend,
            "Mesh Constants".into(),
            bytemuck::bytes_of(scene.mesh_constants()),
        )?;
        let mesh_bind_group = backend.create_bind_group(
            mesh_layout,
            &[
                (
                    0,
                    BindGroupEntry::Buffer {
                        buffer: mesh_constants,
                        offset: 0,
                        size: None,
                    },
                ),
                (1, BindGroupEntry::Texture(texture.view)),
                (2, BindGroupEntry::Sampler(sampler)),
            ],
        )?;
        let scene_mesh = GpuMesh::upload(
            backend,
            &Mesh::sphere(1.0, SCENE_MESH_SEGMENTS, SCENE_MESH_RINGS),
        )?;

        let light_layout = backend.create_bind_group_layout(&[
            BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStageFlags::VERTEX,
                ty: BindingType::UniformBuffer,
            },
            BindGroupLayoutEntry {
                binding: 1,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ])?;

        let mut lights = Vec::with_capacity(scene.lights().len());
        let mut bind_groups = Vec::with_capacity(scene.lights().len());
        for (index, (entry, constants)) in scene
            .lights()
            .iter()
            .zip(scene.light_constants())
            .enumerate()
        {
            let constants = uniform_buffer(
                backend,
                format!("Light {} Constants", index),
                bytemuck::bytes_of(constants),
            )?;
            let light = uniform_buffer(
                backend,
                format!("Light {}", index),
                bytemuck::bytes_of(&entry.light.to_uniform()),
            )?;
            bind_groups.push(backend.create_bind_group(
                light_layout,
                &[
                    (
                        0,
                        BindGroupEntry::Buffer {
                            buffer: constants,
                            offset: 0,
                            size: None,
                        },
                    ),
                    (
                        1,
                        BindGroupEntry::Buffer {
                            buffer: light,
                            offset: 0,
                            size: None,
                        },
                    ),
                ],
            )?);
            lights.push(LightBuffers { constants, light });
        }

        let volume_mesh = GpuMesh::upload(
            backend,
            &Mesh::sphere(1.0, LIGHT_VOLUME_SEGMENTS, LIGHT_VOLUME_RINGS),
        )?;
        let screen = uniform_buffer(
            backend,
            "Screen Size".into(),
            bytemuck::bytes_of(&scene.screen_uniform()),
        )?;

        Ok(Self {
            mesh: MeshBinding {
                mesh: scene_mesh,
                layout: mesh_layout,
                bind_group: mesh_bind_group,
            },
            volumes: LightVolumes {
                mesh: volume_mesh,
                layout: light_layout,
                bind_groups,
            },
            screen,
            mesh_constants,
            lights,
            texture,
        })
    }

    /// Upload this frame's transforms and light parameters
    pub fn write<B: GraphicsBackend>(&self, backend: &mut B, scene: &SceneState) {
        backend.write_buffer(self.mesh_constants, 0, bytemuck::bytes_of(scene.mesh_constants()));
        for ((buffers, entry), constants) in self
            .lights
            .iter()
            .zip(scene.lights())
            .zip(scene.light_constants())
        {
            backend.write_buffer(buffers.constants, 0, bytemuck::bytes_of(constants));
            backend.write_buffer(buffers.light, 0, bytemuck::bytes_of(&entry.light.to_uniform()));
        }
        self.write_screen(backend, scene.screen_uniform());
    }

    pub fn write_screen<B: GraphicsBackend>(&self, backend: &mut B, screen: ScreenUniform) {
        backend.write_buffer(self.screen, 0, bytemuck::bytes_of(&screen));
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn destroy<B: GraphicsBackend>(&self, backend: &mut B) {
        self.mesh.mesh.destroy(backend);
        self.volumes.mesh.destroy(backend);
        backend.destroy_bind_group(self.mesh.bind_group);
        for bind_group in &self.volumes.bind_groups {
            backend.destroy_bind_group(*bind_group);
        }
        for buffers in &self.lights {
            backend.destroy_buffer(buffers.constants);
            backend.destroy_buffer(buffers.light);
        }
        backend.destroy_buffer(self.mesh_constants);
        backend.destroy_buffer(self.screen);
        self.texture.destroy(backend);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};
    use crate::scene::{Constants, PointLightUniform};

    #[test]
    fn test_one_bind_group_per_light() {
        let mut backend = RecordingBackend::new(320, 240);
        let scene = SceneState::new(320, 240);
        let texture = TextureData::checkerboard(8, 2, [255; 4], [0, 0, 0, 255]);
        let resources = SceneResources::create(&mut backend, &scene, &texture).unwrap();

        assert_eq!(resources.light_count(), 3);
        assert_eq!(resources.volumes.bind_groups.len(), 3);
        assert_eq!(resources.volumes.mesh.index_count, LIGHT_VOLUME_SEGMENTS * LIGHT_VOLUME_RINGS * 6);
    }

    #[test]
    fn test_frame_write_covers_every_buffer() {
        let mut backend = RecordingBackend::new(320, 240);
        let scene = SceneState::new(320, 240);
        let texture = TextureData::checkerboard(8, 2, [255; 4], [0, 0, 0, 255]);
        let resources = SceneResources::create(&mut backend, &scene, &texture).unwrap();

        resources.write(&mut backend, &scene);
        let writes: Vec<_> = backend
            .take_calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::WriteBuffer(_, len) => Some(len),
                _ => None,
            })
            .collect();
        // mesh constants, two buffers per light, screen size
        assert_eq!(writes.len(), 1 + 2 * 3 + 1);
        assert_eq!(writes[0], std::mem::size_of::<Constants>());
        assert_eq!(writes[2], std::mem::size_of::<PointLightUniform>());
    }
}

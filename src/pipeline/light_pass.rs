//! Light accumulation pass
//!
//! Draws each light's bounding sphere again, this time shading the pixels the
//! stencil pass marked. Only back faces are rasterized so the sphere covers
//! its pixels even when the camera is inside it, and depth is not tested.
//! Contributions of all lights add up in the accumulation target.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::scene_resources::LightVolumes;
use crate::pipeline::{DeferredTargets, DEPTH_STENCIL_FORMAT};
use crate::render_graph::*;

pub const LIGHT_SHADER: &str = r#"
struct Constants {
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    model_view_projection: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    world_normal_matrix: mat4x4<f32>,
    near_far: vec4<f32>,
}

struct PointLight {
    position_radius: vec4<f32>,
    color: vec4<f32>,
    attenuation: vec4<f32>,
    intensity: vec4<f32>,
}

struct Screen {
    size: vec2<f32>,
    padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> constants: Constants;
@group(0) @binding(1) var<uniform> light: PointLight;

@group(1) @binding(0) var albedo_texture: texture_2d<f32>;
@group(1) @binding(1) var normal_texture: texture_2d<f32>;
@group(1) @binding(2) var position_texture: texture_2d<f32>;
@group(1) @binding(3) var gbuffer_sampler: sampler;
@group(1) @binding(4) var<uniform> screen: Screen;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return constants.model_view_projection * vec4<f32>(position, 1.0);
}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    let uv = frag_coord.xy / screen.size;
    let albedo = textureSample(albedo_texture, gbuffer_sampler, uv).rgb;
    let stored_normal = textureSample(normal_texture, gbuffer_sampler, uv).xyz;
    let world_position = textureSample(position_texture, gbuffer_sampler, uv).xyz;

    let to_light = light.position_radius.xyz - world_position;
    let distance = length(to_light);
    if (distance > light.position_radius.w || dot(stored_normal, stored_normal) == 0.0) {
        return vec4<f32>(0.0, 0.0, 0.0, 0.0);
    }

    let normal = normalize(stored_normal);
    var n_dot_l = 0.0;
    if (distance > 0.0) {
        n_dot_l = max(dot(normal, to_light / distance), 0.0);
    }
    let falloff = light.attenuation.x
        + light.attenuation.y * distance
        + light.attenuation.z * distance * distance;
    let intensity = light.intensity.x + light.intensity.y * n_dot_l;
    return vec4<f32>(albedo * light.color.rgb * intensity / falloff, 0.0);
}
"#;

/// Stencil reference the marked pixels are compared against
pub const LIGHT_STENCIL_REFERENCE: u32 = 0;

/// Pass where the stored stencil differs from the reference, never write it
pub fn light_stencil_state() -> StencilState {
    let face = StencilFaceState {
        compare: CompareFunction::NotEqual,
        fail_op: StencilOperation::Keep,
        depth_fail_op: StencilOperation::Keep,
        pass_op: StencilOperation::Keep,
    };
    StencilState {
        front: face,
        back: face,
        read_mask: 0xff,
        write_mask: 0x00,
    }
}

pub fn light_depth_stencil() -> DepthStencilState {
    DepthStencilState {
        format: DEPTH_STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: CompareFunction::Always,
        stencil: light_stencil_state(),
    }
}

/// Light accumulation pass
pub struct LightAccumulationPass {
    targets: DeferredTargets,
    volumes: LightVolumes,
    screen: BufferHandle,
    accumulation_format: TextureFormat,

    gbuffer_layout: Option<BindGroupLayoutHandle>,
    gbuffer_sampler: Option<SamplerHandle>,
    /// Rebuilt whenever the G-buffer is reallocated
    gbuffer_bind_group: Option<BindGroupHandle>,
    pipeline: Option<RenderPipelineHandle>,
}

impl LightAccumulationPass {
    pub fn new(
        targets: DeferredTargets,
        volumes: LightVolumes,
        screen: BufferHandle,
        accumulation_format: TextureFormat,
    ) -> Self {
        Self {
            targets,
            volumes,
            screen,
            accumulation_format,
            gbuffer_layout: None,
            gbuffer_sampler: None,
            gbuffer_bind_group: None,
            pipeline: None,
        }
    }

    fn gbuffer_layout_entries() -> Vec<BindGroupLayoutEntry> {
        let texture = |binding| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
            },
        };
        vec![
            texture(0),
            texture(1),
            texture(2),
            BindGroupLayoutEntry {
                binding: 3,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::Sampler { filtering: true },
            },
            BindGroupLayoutEntry {
                binding: 4,
                visibility: ShaderStageFlags::FRAGMENT,
                ty: BindingType::UniformBuffer,
            },
        ]
    }

    pub fn pipeline_descriptor(&self, gbuffer_layout: BindGroupLayoutHandle) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            label: Some("Light Accumulation Pipeline".into()),
            shader: LIGHT_SHADER,
            has_fragment: true,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![self.volumes.layout, gbuffer_layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::Front,
            depth_stencil: Some(light_depth_stencil()),
            color_targets: vec![ColorTargetState {
                format: self.accumulation_format,
                blend: Some(BlendState::additive()),
                write_mask: ColorWrites::ALL,
            }],
        }
    }
}

impl<B: GraphicsBackend> RenderPass<B> for LightAccumulationPass {
    fn name(&self) -> &str {
        "Light Accumulation Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        let targets = self.targets;
        ctx.read(targets.albedo, ResourceUsage::TextureRead);
        ctx.read(targets.normal, ResourceUsage::TextureRead);
        ctx.read(targets.position, ResourceUsage::TextureRead);
        ctx.read(targets.depth_stencil, ResourceUsage::DepthStencilRead);
        ctx.write(targets.accumulation, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext<B>) -> GraphResult<()> {
        let layout = match self.gbuffer_layout {
            Some(layout) => layout,
            None => {
                let layout = ctx
                    .backend
                    .create_bind_group_layout(&Self::gbuffer_layout_entries())?;
                self.gbuffer_layout = Some(layout);
                layout
            }
        };
        let sampler = match self.gbuffer_sampler {
            Some(sampler) => sampler,
            None => {
                let sampler = ctx.backend.create_sampler(&SamplerDescriptor::new(
                    "G-Buffer Sampler",
                    FilterMode::Nearest,
                    AddressMode::ClampToEdge,
                ))?;
                self.gbuffer_sampler = Some(sampler);
                sampler
            }
        };

        if let Some(old) = self.gbuffer_bind_group.take() {
            ctx.backend.destroy_bind_group(old);
        }
        let resources = ctx.resources;
        self.gbuffer_bind_group = Some(ctx.backend.create_bind_group(
            layout,
            &[
                (0, BindGroupEntry::Texture(resources.view(self.targets.albedo)?)),
                (1, BindGroupEntry::Texture(resources.view(self.targets.normal)?)),
                (2, BindGroupEntry::Texture(resources.view(self.targets.position)?)),
                (3, BindGroupEntry::Sampler(sampler)),
                (
                    4,
                    BindGroupEntry::Buffer {
                        buffer: self.screen,
                        offset: 0,
                        size: None,
                    },
                ),
            ],
        )?);

        if self.pipeline.is_none() {
            self.pipeline = Some(ctx.backend.create_render_pipeline(&self.pipeline_descriptor(layout))?);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassExecuteContext<B>) -> GraphResult<()> {
        let (Some(pipeline), Some(gbuffer)) = (self.pipeline, self.gbuffer_bind_group) else {
            return Err(GraphError::NotPrepared("Light Accumulation Pass".into()));
        };

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Light Accumulation Pass".into()),
            color_attachments: vec![ColorAttachment {
                view: ctx.resources.view(self.targets.accumulation)?,
                load_op: LoadOp::Load,
                store_op: StoreOp::Store,
            }],
            depth_stencil_attachment: Some(DepthStencilAttachment::load(
                ctx.resources.view(self.targets.depth_stencil)?,
            )),
        });

        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_stencil_reference(LIGHT_STENCIL_REFERENCE);
        ctx.backend.set_bind_group(1, gbuffer);
        for bind_group in &self.volumes.bind_groups {
            ctx.backend.set_bind_group(0, *bind_group);
            self.volumes.mesh.draw(ctx.backend);
        }

        ctx.backend.end_render_pass();
        Ok(())
    }
}

//! Geometry pass for deferred rendering
//!
//! Renders the textured scene mesh to multiple render targets (MRT):
//! - Albedo (texture colour)
//! - World-space normal
//! - World-space position
//! - Depth, with the stencil cleared to zero for the light volume pass
//!
//! The light accumulation target is cleared here as well, so that it starts
//! every frame black.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::scene_resources::MeshBinding;
use crate::pipeline::{DeferredTargets, ALBEDO_FORMAT, DEPTH_STENCIL_FORMAT, NORMAL_FORMAT, POSITION_FORMAT};
use crate::render_graph::*;

/// Clear colour of every colour target written by the geometry pass
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

pub const GEOMETRY_SHADER: &str = r#"
struct Constants {
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    model_view_projection: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    world_normal_matrix: mat4x4<f32>,
    near_far: vec4<f32>,
}

@group(0) @binding(0) var<uniform> constants: Constants;
@group(0) @binding(1) var albedo_texture: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct GBufferOutput {
    @location(0) albedo: vec4<f32>,
    @location(1) normal: vec4<f32>,
    @location(2) position: vec4<f32>,
    @location(3) accumulation: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    output.clip_position = constants.model_view_projection * vec4<f32>(input.position, 1.0);
    output.world_position = (constants.model * vec4<f32>(input.position, 1.0)).xyz;
    output.world_normal = (constants.world_normal_matrix * vec4<f32>(input.normal, 0.0)).xyz;
    output.uv = input.uv;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> GBufferOutput {
    var output: GBufferOutput;
    output.albedo = vec4<f32>(textureSample(albedo_texture, albedo_sampler, input.uv).rgb, 1.0);
    output.normal = vec4<f32>(normalize(input.world_normal), 0.0);
    output.position = vec4<f32>(input.world_position, 1.0);
    output.accumulation = vec4<f32>(0.0, 0.0, 0.0, 1.0);
    return output;
}
"#;

/// G-buffer generation pass
pub struct GeometryPass {
    targets: DeferredTargets,
    mesh: MeshBinding,
    accumulation_format: TextureFormat,
    pipeline: Option<RenderPipelineHandle>,
}

impl GeometryPass {
    pub fn new(targets: DeferredTargets, mesh: MeshBinding, accumulation_format: TextureFormat) -> Self {
        Self {
            targets,
            mesh,
            accumulation_format,
            pipeline: None,
        }
    }

    pub fn pipeline_descriptor(&self) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            label: Some("Geometry Pipeline".into()),
            shader: GEOMETRY_SHADER,
            has_fragment: true,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![self.mesh.layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::Back,
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_STENCIL_FORMAT,
                depth_write_enabled: true,
                depth_compare: CompareFunction::LessEqual,
                stencil: StencilState::default(),
            }),
            color_targets: vec![
                ColorTargetState::replace(ALBEDO_FORMAT),
                ColorTargetState::replace(NORMAL_FORMAT),
                ColorTargetState::replace(POSITION_FORMAT),
                ColorTargetState::replace(self.accumulation_format),
            ],
        }
    }
}

impl<B: GraphicsBackend> RenderPass<B> for GeometryPass {
    fn name(&self) -> &str {
        "Geometry Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        let targets = self.targets;
        ctx.write(targets.albedo, ResourceUsage::RenderTarget);
        ctx.write(targets.normal, ResourceUsage::RenderTarget);
        ctx.write(targets.position, ResourceUsage::RenderTarget);
        ctx.write(targets.depth_stencil, ResourceUsage::DepthStencilWrite);
        ctx.write(targets.accumulation, ResourceUsage::RenderTarget);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext<B>) -> GraphResult<()> {
        if self.pipeline.is_none() {
            self.pipeline = Some(ctx.backend.create_render_pipeline(&self.pipeline_descriptor())?);
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassExecuteContext<B>) -> GraphResult<()> {
        let pipeline = self
            .pipeline
            .ok_or_else(|| GraphError::NotPrepared("Geometry Pass".into()))?;
        let targets = self.targets;

        let clear = |view| ColorAttachment {
            view,
            load_op: LoadOp::Clear(CLEAR_COLOR),
            store_op: StoreOp::Store,
        };
        let color_attachments = vec![
            clear(ctx.resources.view(targets.albedo)?),
            clear(ctx.resources.view(targets.normal)?),
            clear(ctx.resources.view(targets.position)?),
            clear(ctx.resources.view(targets.accumulation)?),
        ];

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Geometry Pass".into()),
            color_attachments,
            depth_stencil_attachment: Some(DepthStencilAttachment {
                view: ctx.resources.view(targets.depth_stencil)?,
                depth_load_op: LoadOp::Clear([0.0; 4]),
                depth_store_op: StoreOp::Store,
                depth_clear_value: 1.0,
                stencil_load_op: LoadOp::Clear([0.0; 4]),
                stencil_store_op: StoreOp::Store,
                stencil_clear_value: 0,
            }),
        });

        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_bind_group(0, self.mesh.bind_group);
        self.mesh.mesh.draw(ctx.backend);

        ctx.backend.end_render_pass();
        Ok(())
    }
}

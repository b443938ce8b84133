//! Light volume stencil pass
//!
//! Rasterizes every light's bounding sphere against the depth written by the
//! geometry pass, with both faces visible and no colour output. For a surface
//! inside a sphere the front face passes the depth test and the back face
//! fails it, bumping the stencil. A surface behind the sphere lets both faces
//! pass. A surface in front of it makes both fail, which cancels out when the
//! back face lands first; with the clamped decrement the other order leaves a
//! mark, and the light shader cuts off anything beyond the radius.
//!
//! The stencil is cleared once per frame by the geometry pass, so after this
//! pass a non-zero value marks a pixel touched by at least one light volume.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::scene_resources::LightVolumes;
use crate::pipeline::DEPTH_STENCIL_FORMAT;
use crate::render_graph::*;

/// Vertex-only: positions the light volume, nothing is shaded
pub const STENCIL_SHADER: &str = r#"
struct Constants {
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    model_view_projection: mat4x4<f32>,
    normal_matrix: mat4x4<f32>,
    world_normal_matrix: mat4x4<f32>,
    near_far: vec4<f32>,
}

@group(0) @binding(0) var<uniform> constants: Constants;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return constants.model_view_projection * vec4<f32>(position, 1.0);
}
"#;

/// Stencil reference used while marking volumes
pub const VOLUME_STENCIL_REFERENCE: u32 = 0;

/// Front faces decrement on depth fail, back faces increment, nothing else changes
pub fn volume_stencil_state() -> StencilState {
    StencilState {
        front: StencilFaceState {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::DecrementClamp,
            pass_op: StencilOperation::Keep,
        },
        back: StencilFaceState {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::IncrementClamp,
            pass_op: StencilOperation::Keep,
        },
        read_mask: 0xff,
        write_mask: 0xff,
    }
}

/// Depth is tested against the scene but never written
pub fn volume_depth_stencil() -> DepthStencilState {
    DepthStencilState {
        format: DEPTH_STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: CompareFunction::LessEqual,
        stencil: volume_stencil_state(),
    }
}

pub struct StencilPass {
    depth_stencil: ResourceId,
    volumes: LightVolumes,
    pipeline: Option<RenderPipelineHandle>,
}

impl StencilPass {
    pub fn new(depth_stencil: ResourceId, volumes: LightVolumes) -> Self {
        Self {
            depth_stencil,
            volumes,
            pipeline: None,
        }
    }

    pub fn pipeline_descriptor(&self) -> RenderPipelineDescriptor {
        RenderPipelineDescriptor {
            label: Some("Light Volume Stencil Pipeline".into()),
            shader: STENCIL_SHADER,
            has_fragment: false,
            vertex_layouts: vec![Vertex::layout()],
            bind_group_layouts: vec![self.volumes.layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: Some(volume_depth_stencil()),
            color_targets: Vec::new(),
        }
    }
}

impl<B: GraphicsBackend> RenderPass<B> for StencilPass {
    fn name(&self) -> &str {
        "Light Volume Stencil Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.depth_stencil, ResourceUsage::DepthStencilRead);
        ctx.write(self.depth_stencil, ResourceUsage::DepthStencilWrite);
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
            .ok_or_else(|| GraphError::NotPrepared("Light Volume Stencil Pass".into()))?;

        ctx.backend.begin_render_pass(&RenderPassDescriptor {
            label: Some("Light Volume Stencil Pass".into()),
            color_attachments: Vec::new(),
            depth_stencil_attachment: Some(DepthStencilAttachment::load(
                ctx.resources.view(self.depth_stencil)?,
            )),
        });

        ctx.backend.set_render_pipeline(pipeline);
        ctx.backend.set_stencil_reference(VOLUME_STENCIL_REFERENCE);
        for bind_group in &self.volumes.bind_groups {
            ctx.backend.set_bind_group(0, *bind_group);
            self.volumes.mesh.draw(ctx.backend);
        }

        ctx.backend.end_render_pass();
        Ok(())
    }
}

//! Present pass
//!
//! Copies the light accumulation target into the swapchain image. Surfaces
//! that cannot be copied into get a fullscreen triangle instead.

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::pipeline::DeferredTargets;
use crate::render_graph::*;

/// Fullscreen triangle that loads the accumulation target texel for texel
pub const COMPOSITE_SHADER: &str = r#"
@group(0) @binding(0) var accumulation_texture: texture_2d<f32>;

@vertex
fn vs_main(@builtin(vertex_index) vertex_index: u32) -> @builtin(position) vec4<f32> {
    let x = f32((vertex_index << 1u) & 2u);
    let y = f32(vertex_index & 2u);
    return vec4<f32>(x * 2.0 - 1.0, y * 2.0 - 1.0, 0.0, 1.0);
}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {
    return textureLoad(accumulation_texture, vec2<i32>(frag_coord.xy), 0);
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentMode {
    Copy,
    Composite,
}

struct Composite {
    layout: BindGroupLayoutHandle,
    pipeline: RenderPipelineHandle,
    bind_group: Option<BindGroupHandle>,
}

pub struct PresentPass {
    targets: DeferredTargets,
    mode: Option<PresentMode>,
    composite: Option<Composite>,
}

impl PresentPass {
    pub fn new(targets: DeferredTargets) -> Self {
        Self {
            targets,
            mode: None,
            composite: None,
        }
    }

    /// How the last preparation decided to present; `None` before the first one
    pub fn mode(&self) -> Option<PresentMode> {
        self.mode
    }

    fn create_composite<B: GraphicsBackend>(backend: &mut B) -> BackendResult<Composite> {
        let layout = backend.create_bind_group_layout(&[BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStageFlags::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: false },
            },
        }])?;
        let pipeline = backend.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Composite Pipeline".into()),
            shader: COMPOSITE_SHADER,
            has_fragment: true,
            vertex_layouts: Vec::new(),
            bind_group_layouts: vec![layout],
            primitive_topology: PrimitiveTopology::TriangleList,
            front_face: FrontFace::Ccw,
            cull_mode: CullMode::None,
            depth_stencil: None,
            color_targets: vec![ColorTargetState::replace(backend.swapchain_format())],
        })?;
        Ok(Composite {
            layout,
            pipeline,
            bind_group: None,
        })
    }
}

impl<B: GraphicsBackend> RenderPass<B> for PresentPass {
    fn name(&self) -> &str {
        "Present Pass"
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        ctx.read(self.targets.accumulation, ResourceUsage::CopySource);
        ctx.write(self.targets.surface, ResourceUsage::CopyDestination);
    }

    fn prepare(&mut self, ctx: &mut PassPrepareContext<B>) -> GraphResult<()> {
        if ctx.backend.supports_surface_copy() {
            self.mode = Some(PresentMode::Copy);
            return Ok(());
        }
        self.mode = Some(PresentMode::Composite);

        if self.composite.is_none() {
            self.composite = Some(Self::create_composite(ctx.backend)?);
        }
        if let Some(composite) = self.composite.as_mut() {
            if let Some(old) = composite.bind_group.take() {
                ctx.backend.destroy_bind_group(old);
            }
            let view = ctx.resources.view(self.targets.accumulation)?;
            composite.bind_group = Some(
                ctx.backend
                    .create_bind_group(composite.layout, &[(0, BindGroupEntry::Texture(view))])?,
            );
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut PassExecuteContext<B>) -> GraphResult<()> {
        match self.mode {
            Some(PresentMode::Copy) => {
                let source = ctx.resources.texture(self.targets.accumulation)?;
                ctx.backend.copy_texture_to_surface(source);
                Ok(())
            }
            Some(PresentMode::Composite) => {
                let Some(Composite {
                    pipeline,
                    bind_group: Some(bind_group),
                    ..
                }) = self.composite.as_ref()
                else {
                    return Err(GraphError::NotPrepared("Present Pass".into()));
                };

                ctx.backend.begin_render_pass(&RenderPassDescriptor {
                    label: Some("Present Pass".into()),
                    color_attachments: vec![ColorAttachment {
                        view: ctx.resources.view(self.targets.surface)?,
                        load_op: LoadOp::Clear([0.0, 0.0, 0.0, 1.0]),
                        store_op: StoreOp::Store,
                    }],
                    depth_stencil_attachment: None,
                });
                ctx.backend.set_render_pipeline(*pipeline);
                ctx.backend.set_bind_group(0, *bind_group);
                ctx.backend.draw(0..3, 0..1);
                ctx.backend.end_render_pass();
                Ok(())
            }
            None => Err(GraphError::NotPrepared("Present Pass".into())),
        }
    }
}

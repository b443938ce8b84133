//! Render graph executor

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::graph::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;

/// Executor for running the compiled render graph
///
/// Owns the backend textures behind the graph's virtual resources. Every
/// allocation is a full one: resizing destroys all graph textures and creates
/// them again at the new size, then lets each pass rebuild its bindings.
pub struct RenderGraphExecutor {
    resources: ResolvedResources,
    descriptors: Vec<(ResourceId, TextureDescriptor)>,
}

impl RenderGraphExecutor {
    pub fn new() -> Self {
        Self {
            resources: ResolvedResources::default(),
            descriptors: Vec::new(),
        }
    }

    /// Set an external texture view (e.g., swapchain image)
    pub fn set_external_view(&mut self, resource: ResourceId, view: TextureViewHandle) {
        self.resources.external_views.insert(resource, view);
    }

    /// Descriptors of the currently allocated textures, in declaration order
    pub fn allocated_descriptors(&self) -> &[(ResourceId, TextureDescriptor)] {
        &self.descriptors
    }

    pub fn resources(&self) -> &ResolvedResources {
        &self.resources
    }

    /// (Re)allocate every texture the compiled graph uses at the given size,
    /// then prepare all passes against the new textures.
    pub fn allocate_resources<B: GraphicsBackend>(
        &mut self,
        graph: &mut RenderGraph<B>,
        compiled: &CompiledGraph,
        backend: &mut B,
        width: u32,
        height: u32,
    ) -> GraphResult<()> {
        self.release_textures(backend);
        self.resources.width = width;
        self.resources.height = height;

        for resource in graph.resources() {
            let VirtualResource::Texture(tex) = resource else {
                // External resources are set via set_external_view
                continue;
            };
            if !compiled.is_used(tex.id) {
                continue;
            }

            let desc = tex.descriptor(width, height);
            let handle = backend.create_texture(&desc)?;
            let view = backend.create_texture_view(handle)?;
            self.resources.textures.insert(tex.id, (handle, view));
            self.descriptors.push((tex.id, desc));
        }

        log::info!(
            "Allocated {} render targets at {}x{}",
            self.descriptors.len(),
            width,
            height
        );

        for &pass_id in &compiled.pass_order {
            if let Some(pass) = graph.pass_mut(pass_id) {
                pass.prepare(&mut PassPrepareContext {
                    backend: &mut *backend,
                    resources: &self.resources,
                })?;
            }
        }

        Ok(())
    }

    /// Execute the render graph, submitting one command batch per pass
    ///
    /// Batches reach the queue in pass order; later passes observe everything
    /// earlier batches wrote.
    pub fn execute<B: GraphicsBackend>(
        &self,
        graph: &mut RenderGraph<B>,
        compiled: &CompiledGraph,
        backend: &mut B,
    ) -> GraphResult<()> {
        for resource in graph.resources() {
            if let VirtualResource::External { id, name } = resource {
                if compiled.is_used(*id) && !self.resources.external_views.contains_key(id) {
                    return Err(GraphError::UnresolvedExternal(name.clone()));
                }
            }
        }

        for &pass_id in &compiled.pass_order {
            if let Some(pass) = graph.pass_mut(pass_id) {
                pass.execute(&mut PassExecuteContext {
                    backend: &mut *backend,
                    resources: &self.resources,
                })?;
                backend.submit();
            }
        }

        Ok(())
    }

    fn release_textures<B: GraphicsBackend>(&mut self, backend: &mut B) {
        for (_, (texture, view)) in self.resources.textures.drain() {
            backend.destroy_texture_view(view);
            backend.destroy_texture(texture);
        }
        self.descriptors.clear();
    }

    /// Clean up allocated resources
    pub fn cleanup<B: GraphicsBackend>(&mut self, backend: &mut B) {
        self.release_textures(backend);
        self.resources.external_views.clear();
    }
}

impl Default for RenderGraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::{Call, RecordingBackend};

    struct Target {
        name: &'static str,
        target: ResourceId,
        prepared_size: Option<(u32, u32)>,
    }

    impl RenderPass<RecordingBackend> for Target {
        fn name(&self) -> &str {
            self.name
        }

        fn setup(&mut self, ctx: &mut PassSetupContext) {
            ctx.write(self.target, ResourceUsage::RenderTarget);
        }

        fn prepare(&mut self, ctx: &mut PassPrepareContext<RecordingBackend>) -> GraphResult<()> {
            self.prepared_size = Some(ctx.resources.size());
            Ok(())
        }

        fn execute(&mut self, ctx: &mut PassExecuteContext<RecordingBackend>) -> GraphResult<()> {
            if self.prepared_size.is_none() {
                return Err(GraphError::NotPrepared(self.name.to_string()));
            }
            let view = ctx.resources.view(self.target)?;
            ctx.backend.begin_render_pass(&RenderPassDescriptor {
                label: Some(self.name.to_string()),
                color_attachments: vec![ColorAttachment {
                    view,
                    load_op: LoadOp::Load,
                    store_op: StoreOp::Store,
                }],
                depth_stencil_attachment: None,
            });
            ctx.backend.end_render_pass();
            Ok(())
        }
    }

    fn single_pass_graph(
        external: bool,
    ) -> (RenderGraph<RecordingBackend>, CompiledGraph, ResourceId) {
        let mut graph = RenderGraph::new();
        let target = if external {
            graph.register_external("swapchain")
        } else {
            graph.create_texture(
                "color",
                TextureSize::FULL,
                TextureFormat::Rgba16Float,
                TextureUsage::RENDER_ATTACHMENT,
            )
        };
        graph
            .add_pass(
                Target {
                    name: "target",
                    target,
                    prepared_size: None,
                },
                PassType::Graphics,
            )
            .unwrap();
        let compiled = graph.compile().unwrap();
        (graph, compiled, target)
    }

    #[test]
    fn test_reallocation_replaces_every_texture() {
        let (mut graph, compiled, _) = single_pass_graph(false);
        let mut backend = RecordingBackend::new(640, 480);
        let mut executor = RenderGraphExecutor::new();

        executor
            .allocate_resources(&mut graph, &compiled, &mut backend, 640, 480)
            .unwrap();
        let first = executor.allocated_descriptors().to_vec();
        executor
            .allocate_resources(&mut graph, &compiled, &mut backend, 640, 480)
            .unwrap();

        assert_eq!(first, executor.allocated_descriptors().to_vec());
        assert_eq!(backend.textures.len(), 2);
        assert_eq!(backend.destroyed_textures, vec![backend.textures[0].0]);
        assert_eq!(backend.live_textures().len(), 1);
        assert_eq!(first[0].1.width, 640);
    }

    #[test]
    fn test_each_pass_is_its_own_batch() {
        let (mut graph, compiled, _) = single_pass_graph(false);
        let mut backend = RecordingBackend::new(64, 64);
        let mut executor = RenderGraphExecutor::new();
        executor
            .allocate_resources(&mut graph, &compiled, &mut backend, 64, 64)
            .unwrap();

        executor.execute(&mut graph, &compiled, &mut backend).unwrap();
        assert_eq!(backend.calls.last(), Some(&Call::Submit));
    }

    #[test]
    fn test_missing_external_view_is_reported() {
        let (mut graph, compiled, target) = single_pass_graph(true);
        let mut backend = RecordingBackend::new(64, 64);
        let mut executor = RenderGraphExecutor::new();
        executor
            .allocate_resources(&mut graph, &compiled, &mut backend, 64, 64)
            .unwrap();

        let err = executor.execute(&mut graph, &compiled, &mut backend).unwrap_err();
        assert!(matches!(err, GraphError::UnresolvedExternal(name) if name == "swapchain"));

        executor.set_external_view(target, TextureViewHandle(7));
        executor.execute(&mut graph, &compiled, &mut backend).unwrap();
    }

    #[test]
    fn test_cleanup_destroys_textures() {
        let (mut graph, compiled, _) = single_pass_graph(false);
        let mut backend = RecordingBackend::new(32, 32);
        let mut executor = RenderGraphExecutor::new();
        executor
            .allocate_resources(&mut graph, &compiled, &mut backend, 32, 32)
            .unwrap();
        executor.cleanup(&mut backend);
        assert!(backend.live_textures().is_empty());
        assert!(executor.allocated_descriptors().is_empty());
    }
}

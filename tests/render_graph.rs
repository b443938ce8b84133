//! Pass ordering for the deferred read/write sets, without a GPU.

use deferred_light_volumes::backend::types::{TextureFormat, TextureUsage};
use deferred_light_volumes::pipeline::DeferredTargets;
use deferred_light_volumes::render_graph::*;
use deferred_light_volumes::WgpuBackend;

/// Declares accesses and records nothing
struct DeclaredPass {
    name: &'static str,
    reads: Vec<(ResourceId, ResourceUsage)>,
    writes: Vec<(ResourceId, ResourceUsage)>,
}

impl DeclaredPass {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            reads: Vec::new(),
            writes: Vec::new(),
        }
    }

    fn reads(mut self, id: ResourceId, usage: ResourceUsage) -> Self {
        self.reads.push((id, usage));
        self
    }

    fn writes(mut self, id: ResourceId, usage: ResourceUsage) -> Self {
        self.writes.push((id, usage));
        self
    }
}

impl RenderPass<WgpuBackend> for DeclaredPass {
    fn name(&self) -> &str {
        self.name
    }

    fn setup(&mut self, ctx: &mut PassSetupContext) {
        for &(id, usage) in &self.reads {
            ctx.read(id, usage);
        }
        for &(id, usage) in &self.writes {
            ctx.write(id, usage);
        }
    }

    fn execute(&mut self, _ctx: &mut PassExecuteContext<WgpuBackend>) -> GraphResult<()> {
        Ok(())
    }
}

fn geometry(t: &DeferredTargets) -> DeclaredPass {
    DeclaredPass::new("geometry")
        .writes(t.albedo, ResourceUsage::RenderTarget)
        .writes(t.normal, ResourceUsage::RenderTarget)
        .writes(t.position, ResourceUsage::RenderTarget)
        .writes(t.depth_stencil, ResourceUsage::DepthStencilWrite)
        .writes(t.accumulation, ResourceUsage::RenderTarget)
}

fn stencil(t: &DeferredTargets) -> DeclaredPass {
    DeclaredPass::new("stencil")
        .reads(t.depth_stencil, ResourceUsage::DepthStencilRead)
        .writes(t.depth_stencil, ResourceUsage::DepthStencilWrite)
}

fn light(t: &DeferredTargets) -> DeclaredPass {
    DeclaredPass::new("light")
        .reads(t.albedo, ResourceUsage::TextureRead)
        .reads(t.normal, ResourceUsage::TextureRead)
        .reads(t.position, ResourceUsage::TextureRead)
        .reads(t.depth_stencil, ResourceUsage::DepthStencilRead)
        .writes(t.accumulation, ResourceUsage::RenderTarget)
}

fn present(t: &DeferredTargets) -> DeclaredPass {
    DeclaredPass::new("present")
        .reads(t.accumulation, ResourceUsage::CopySource)
        .writes(t.surface, ResourceUsage::CopyDestination)
}

fn order(graph: &RenderGraph<WgpuBackend>, compiled: &CompiledGraph) -> Vec<String> {
    compiled
        .pass_order
        .iter()
        .map(|id| graph.get_pass_node(*id).unwrap().name.clone())
        .collect()
}

#[test]
fn deferred_passes_run_in_stage_order_whatever_the_insertion_order() {
    let mut graph = RenderGraph::<WgpuBackend>::new();
    let t = DeferredTargets::declare(&mut graph, TextureFormat::Bgra8Unorm);

    // present and light are declared before the passes they depend on
    graph.add_pass(present(&t), PassType::Transfer).unwrap();
    graph.add_pass(geometry(&t), PassType::Graphics).unwrap();
    graph.add_pass(light(&t), PassType::Graphics).unwrap();
    graph.add_pass(stencil(&t), PassType::Graphics).unwrap();

    let compiled = graph.compile().unwrap();
    // the light pass only reads depth-stencil, so it waits for both writers;
    // geometry and stencil write it in insertion order
    assert_eq!(order(&graph, &compiled), vec!["geometry", "stencil", "light", "present"]);
}

#[test]
fn no_two_deferred_passes_may_overlap() {
    let mut graph = RenderGraph::<WgpuBackend>::new();
    let t = DeferredTargets::declare(&mut graph, TextureFormat::Bgra8Unorm);
    let ids = [
        graph.add_pass(geometry(&t), PassType::Graphics).unwrap(),
        graph.add_pass(stencil(&t), PassType::Graphics).unwrap(),
        graph.add_pass(light(&t), PassType::Graphics).unwrap(),
        graph.add_pass(present(&t), PassType::Transfer).unwrap(),
    ];
    let compiled = graph.compile().unwrap();

    for (i, a) in ids.iter().enumerate() {
        for b in &ids[i + 1..] {
            assert!(!compiled.may_overlap(*a, *b));
        }
    }
}

#[test]
fn every_target_lives_until_its_last_reader() {
    let mut graph = RenderGraph::<WgpuBackend>::new();
    let t = DeferredTargets::declare(&mut graph, TextureFormat::Bgra8Unorm);
    graph.add_pass(geometry(&t), PassType::Graphics).unwrap();
    graph.add_pass(stencil(&t), PassType::Graphics).unwrap();
    graph.add_pass(light(&t), PassType::Graphics).unwrap();
    graph.add_pass(present(&t), PassType::Transfer).unwrap();
    let compiled = graph.compile().unwrap();

    assert!(compiled.is_resource_alive(t.albedo, 2));
    assert!(!compiled.is_resource_alive(t.albedo, 3));
    assert!(compiled.is_resource_alive(t.accumulation, 3));
}

#[test]
fn a_pass_writing_what_it_waits_for_is_a_cycle() {
    let mut graph = RenderGraph::<WgpuBackend>::new();
    let a = graph.create_texture(
        "a",
        TextureSize::FULL,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    );
    let b = graph.create_texture(
        "b",
        TextureSize::FULL,
        TextureFormat::Rgba8Unorm,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    );

    graph
        .add_pass(
            DeclaredPass::new("first")
                .reads(b, ResourceUsage::TextureRead)
                .writes(a, ResourceUsage::RenderTarget),
            PassType::Graphics,
        )
        .unwrap();
    graph
        .add_pass(
            DeclaredPass::new("second")
                .reads(a, ResourceUsage::TextureRead)
                .writes(b, ResourceUsage::RenderTarget),
            PassType::Graphics,
        )
        .unwrap();

    assert!(matches!(graph.compile(), Err(GraphError::Cycle(_))));
}

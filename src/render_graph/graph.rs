//! Render graph definition and compilation

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::render_graph::pass::*;
use crate::render_graph::resource::*;
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

/// Errors raised while building, compiling or running a graph
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Dependency cycle between passes: {}", .0.join(" -> "))]
    Cycle(Vec<String>),
    #[error("Pass `{pass}` accesses unregistered resource {resource}")]
    UnknownResource { pass: String, resource: ResourceId },
    #[error("External resource `{0}` has no view for this frame")]
    UnresolvedExternal(String),
    #[error("Resource {0} is not allocated")]
    NotAllocated(ResourceId),
    #[error("Pass `{0}` was executed before its pipelines were prepared")]
    NotPrepared(String),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// The main render graph structure
///
/// Passes are added in the order they were written; compilation derives the
/// execution order from the declared reads and writes, not from that order.
pub struct RenderGraph<B: GraphicsBackend> {
    passes: Vec<Box<dyn RenderPass<B>>>,
    pass_nodes: Vec<PassNode>,
    resources: Vec<VirtualResource>,
    next_pass_id: u32,
    next_resource_id: u32,
}

impl<B: GraphicsBackend> RenderGraph<B> {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            pass_nodes: Vec::new(),
            resources: Vec::new(),
            next_pass_id: 0,
            next_resource_id: 0,
        }
    }

    fn allocate_id(&mut self) -> ResourceId {
        let id = ResourceId(self.next_resource_id);
        self.next_resource_id += 1;
        id
    }

    /// Declare a texture owned by the graph and sized against the surface
    pub fn create_texture(
        &mut self,
        name: &str,
        size: TextureSize,
        format: TextureFormat,
        usage: TextureUsage,
    ) -> ResourceId {
        let id = self.allocate_id();
        self.resources.push(VirtualResource::Texture(VirtualTexture {
            id,
            name: name.to_string(),
            size,
            format,
            usage,
        }));
        id
    }

    /// Register an external resource (like swapchain image)
    pub fn register_external(&mut self, name: &str) -> ResourceId {
        let id = self.allocate_id();
        self.resources.push(VirtualResource::External {
            id,
            name: name.to_string(),
        });
        id
    }

    /// Add a render pass to the graph
    pub fn add_pass<P: RenderPass<B> + 'static>(
        &mut self,
        mut pass: P,
        pass_type: PassType,
    ) -> GraphResult<PassId> {
        let name = pass.name().to_string();

        let mut inputs = Vec::new();
        let mut outputs = Vec::new();
        pass.setup(&mut PassSetupContext {
            inputs: &mut inputs,
            outputs: &mut outputs,
        });

        if let Some(unknown) = inputs
            .iter()
            .chain(outputs.iter())
            .find(|a| self.resource(a.resource).is_none())
        {
            return Err(GraphError::UnknownResource {
                pass: name,
                resource: unknown.resource,
            });
        }

        let id = PassId(self.next_pass_id);
        self.next_pass_id += 1;

        self.passes.push(Box::new(pass));
        self.pass_nodes.push(PassNode {
            id,
            name,
            pass_type,
            inputs,
            outputs,
        });

        Ok(id)
    }

    /// Dependency edges `before -> after`, as indices into `pass_nodes`.
    ///
    /// Passes writing the same resource keep their insertion order. A pass that
    /// only reads a resource runs after every pass that writes it.
    fn dependency_edges(&self) -> BTreeSet<(usize, usize)> {
        let mut edges = BTreeSet::new();

        for resource in &self.resources {
            let id = resource.id();
            let writers: Vec<usize> = (0..self.pass_nodes.len())
                .filter(|&i| self.pass_nodes[i].writes_resource(id))
                .collect();

            for pair in writers.windows(2) {
                edges.insert((pair[0], pair[1]));
            }

            for (reader, node) in self.pass_nodes.iter().enumerate() {
                if node.only_reads(id) {
                    for &writer in &writers {
                        edges.insert((writer, reader));
                    }
                }
            }
        }

        edges
    }

    /// Compile the graph into a stable execution order
    pub fn compile(&self) -> GraphResult<CompiledGraph> {
        let count = self.pass_nodes.len();
        let edges = self.dependency_edges();

        // Kahn's algorithm; the lowest insertion index wins among ready passes
        let mut in_degree = vec![0usize; count];
        for &(_, after) in &edges {
            in_degree[after] += 1;
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut sorted = Vec::with_capacity(count);

        while let Some(index) = ready.pop_first() {
            sorted.push(index);
            for &(before, after) in edges.range((index, 0)..(index + 1, 0)) {
                debug_assert_eq!(before, index);
                in_degree[after] -= 1;
                if in_degree[after] == 0 {
                    ready.insert(after);
                }
            }
        }

        if sorted.len() != count {
            let stuck = (0..count)
                .filter(|i| !sorted.contains(i))
                .map(|i| self.pass_nodes[i].name.clone())
                .collect();
            return Err(GraphError::Cycle(stuck));
        }

        // reachable[a][b]: b transitively depends on a
        let mut reachable = vec![vec![false; count]; count];
        for &index in sorted.iter().rev() {
            for &(_, after) in edges.range((index, 0)..(index + 1, 0)) {
                reachable[index][after] = true;
                let (row, dependent) = if index < after {
                    let (head, tail) = reachable.split_at_mut(after);
                    (&mut head[index], &tail[0])
                } else {
                    let (head, tail) = reachable.split_at_mut(index);
                    (&mut tail[0], &head[after])
                };
                for (slot, &reach) in row.iter_mut().zip(dependent.iter()) {
                    *slot |= reach;
                }
            }
        }

        let mut resource_lifetimes: HashMap<ResourceId, ResourceLifetime> = HashMap::new();
        for (order, &index) in sorted.iter().enumerate() {
            for access in self.pass_nodes[index].accesses() {
                let lifetime = resource_lifetimes
                    .entry(access.resource)
                    .or_insert(ResourceLifetime {
                        first_use: order,
                        last_use: order,
                    });
                lifetime.last_use = order;
            }
        }

        let pass_order: Vec<PassId> = sorted.iter().map(|&i| self.pass_nodes[i].id).collect();
        log::debug!(
            "Compiled render graph: {}",
            sorted
                .iter()
                .map(|&i| self.pass_nodes[i].name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        Ok(CompiledGraph {
            pass_order,
            reachable,
            resource_lifetimes,
        })
    }

    /// Get pass nodes (metadata)
    pub fn pass_nodes(&self) -> &[PassNode] {
        &self.pass_nodes
    }

    /// Get all resources
    pub fn resources(&self) -> &[VirtualResource] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> Option<&VirtualResource> {
        self.resources.iter().find(|r| r.id() == id)
    }

    /// Get pass node by ID
    pub fn get_pass_node(&self, id: PassId) -> Option<&PassNode> {
        self.pass_nodes.iter().find(|n| n.id == id)
    }

    pub(crate) fn pass_mut(&mut self, id: PassId) -> Option<&mut (dyn RenderPass<B> + 'static)> {
        let index = self.pass_nodes.iter().position(|n| n.id == id)?;
        Some(self.passes[index].as_mut())
    }
}

impl<B: GraphicsBackend> Default for RenderGraph<B> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resource lifetime in terms of pass execution order
#[derive(Debug, Clone, Copy)]
pub struct ResourceLifetime {
    pub first_use: usize,
    pub last_use: usize,
}

/// Compiled render graph with execution order and resource lifetimes
#[derive(Debug)]
pub struct CompiledGraph {
    pub pass_order: Vec<PassId>,
    reachable: Vec<Vec<bool>>,
    pub resource_lifetimes: HashMap<ResourceId, ResourceLifetime>,
}

impl CompiledGraph {
    /// Check if a resource is alive at a given execution step
    pub fn is_resource_alive(&self, resource: ResourceId, step: usize) -> bool {
        if let Some(lifetime) = self.resource_lifetimes.get(&resource) {
            step >= lifetime.first_use && step <= lifetime.last_use
        } else {
            false
        }
    }

    /// Whether any pass touches the resource
    pub fn is_used(&self, resource: ResourceId) -> bool {
        self.resource_lifetimes.contains_key(&resource)
    }

    /// True when neither pass depends on the other, directly or transitively,
    /// so their work could run concurrently without violating a declared hazard.
    pub fn may_overlap(&self, a: PassId, b: PassId) -> bool {
        let (a, b) = (a.0 as usize, b.0 as usize);
        if a == b || a >= self.reachable.len() || b >= self.reachable.len() {
            return false;
        }
        !self.reachable[a][b] && !self.reachable[b][a]
    }

    /// Position of a pass in the execution order
    pub fn position(&self, pass: PassId) -> Option<usize> {
        self.pass_order.iter().position(|&p| p == pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::recording::RecordingBackend;

    struct TestPass {
        name: &'static str,
        reads: Vec<(ResourceId, ResourceUsage)>,
        writes: Vec<(ResourceId, ResourceUsage)>,
    }

    impl TestPass {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                reads: Vec::new(),
                writes: Vec::new(),
            }
        }

        fn reads(mut self, id: ResourceId) -> Self {
            self.reads.push((id, ResourceUsage::TextureRead));
            self
        }

        fn writes(mut self, id: ResourceId) -> Self {
            self.writes.push((id, ResourceUsage::RenderTarget));
            self
        }
    }

    impl RenderPass<RecordingBackend> for TestPass {
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

        fn execute(&mut self, _ctx: &mut PassExecuteContext<RecordingBackend>) -> GraphResult<()> {
            Ok(())
        }
    }

    fn texture(graph: &mut RenderGraph<RecordingBackend>, name: &str) -> ResourceId {
        graph.create_texture(
            name,
            TextureSize::FULL,
            TextureFormat::Rgba8Unorm,
            TextureUsage::RENDER_ATTACHMENT,
        )
    }

    fn names(graph: &RenderGraph<RecordingBackend>, compiled: &CompiledGraph) -> Vec<String> {
        compiled
            .pass_order
            .iter()
            .filter_map(|&id| graph.get_pass_node(id))
            .map(|n| n.name.clone())
            .collect()
    }

    #[test]
    fn test_consumer_declared_first_runs_after_producer() {
        let mut graph = RenderGraph::new();
        let color = texture(&mut graph, "color");
        graph.add_pass(TestPass::new("consume").reads(color), PassType::Graphics).unwrap();
        graph.add_pass(TestPass::new("produce").writes(color), PassType::Graphics).unwrap();

        let compiled = graph.compile().unwrap();
        assert_eq!(names(&graph, &compiled), vec!["produce", "consume"]);
    }

    #[test]
    fn test_independent_passes_keep_insertion_order() {
        let mut graph = RenderGraph::new();
        let a = texture(&mut graph, "a");
        let b = texture(&mut graph, "b");
        let first = graph.add_pass(TestPass::new("first").writes(a), PassType::Graphics).unwrap();
        let second = graph.add_pass(TestPass::new("second").writes(b), PassType::Graphics).unwrap();

        let compiled = graph.compile().unwrap();
        assert_eq!(names(&graph, &compiled), vec!["first", "second"]);
        assert!(compiled.may_overlap(first, second));
    }

    #[test]
    fn test_chained_passes_never_overlap() {
        let mut graph = RenderGraph::new();
        let a = texture(&mut graph, "a");
        let b = texture(&mut graph, "b");
        let p0 = graph.add_pass(TestPass::new("p0").writes(a), PassType::Graphics).unwrap();
        let p1 = graph
            .add_pass(TestPass::new("p1").reads(a).writes(b), PassType::Graphics)
            .unwrap();
        let p2 = graph.add_pass(TestPass::new("p2").reads(b), PassType::Graphics).unwrap();

        let compiled = graph.compile().unwrap();
        assert!(!compiled.may_overlap(p0, p1));
        assert!(!compiled.may_overlap(p1, p2));
        // only through p1
        assert!(!compiled.may_overlap(p0, p2));
        assert!(!compiled.may_overlap(p0, p0));
    }

    #[test]
    fn test_cycle_is_an_error() {
        let mut graph = RenderGraph::new();
        let a = texture(&mut graph, "a");
        let b = texture(&mut graph, "b");
        graph
            .add_pass(TestPass::new("left").reads(a).writes(b), PassType::Graphics)
            .unwrap();
        graph
            .add_pass(TestPass::new("right").reads(b).writes(a), PassType::Graphics)
            .unwrap();

        match graph.compile() {
            Err(GraphError::Cycle(passes)) => {
                assert_eq!(passes, vec!["left".to_string(), "right".to_string()])
            }
            other => panic!("expected a cycle, got {:?}", other.map(|c| c.pass_order)),
        }
    }

    #[test]
    fn test_unknown_resource_is_rejected() {
        let mut graph: RenderGraph<RecordingBackend> = RenderGraph::new();
        let err = graph
            .add_pass(TestPass::new("stray").reads(ResourceId(42)), PassType::Graphics)
            .unwrap_err();
        assert!(matches!(err, GraphError::UnknownResource { resource, .. } if resource == ResourceId(42)));
    }

    #[test]
    fn test_resource_lifetimes_follow_execution_order() {
        let mut graph = RenderGraph::new();
        let a = texture(&mut graph, "a");
        let unused = texture(&mut graph, "unused");
        graph.add_pass(TestPass::new("w").writes(a), PassType::Graphics).unwrap();
        graph.add_pass(TestPass::new("r").reads(a), PassType::Graphics).unwrap();

        let compiled = graph.compile().unwrap();
        assert!(compiled.is_resource_alive(a, 0));
        assert!(compiled.is_resource_alive(a, 1));
        assert!(!compiled.is_resource_alive(a, 2));
        assert!(!compiled.is_used(unused));
    }
}

//! Render pass definitions for the render graph

use crate::backend::traits::*;
use crate::render_graph::graph::{GraphError, GraphResult};
use crate::render_graph::resource::*;
use std::collections::HashMap;

/// Unique identifier for a render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

/// Context for declaring what a pass touches
pub struct PassSetupContext<'a> {
    pub(crate) inputs: &'a mut Vec<ResourceAccess>,
    pub(crate) outputs: &'a mut Vec<ResourceAccess>,
}

impl<'a> PassSetupContext<'a> {
    /// Declare that this pass reads from a resource
    pub fn read(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.inputs.push(ResourceAccess { resource, usage });
    }

    /// Declare that this pass writes to a resource
    pub fn write(&mut self, resource: ResourceId, usage: ResourceUsage) {
        self.outputs.push(ResourceAccess { resource, usage });
    }
}

/// Backend objects behind each graph resource for the current allocation
#[derive(Debug, Default)]
pub struct ResolvedResources {
    pub(crate) textures: HashMap<ResourceId, (TextureHandle, TextureViewHandle)>,
    pub(crate) external_views: HashMap<ResourceId, TextureViewHandle>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl ResolvedResources {
    /// Texture backing a graph-owned resource
    pub fn texture(&self, resource: ResourceId) -> GraphResult<TextureHandle> {
        self.textures
            .get(&resource)
            .map(|(texture, _)| *texture)
            .ok_or(GraphError::NotAllocated(resource))
    }

    /// View of a graph-owned or external resource
    pub fn view(&self, resource: ResourceId) -> GraphResult<TextureViewHandle> {
        self.textures
            .get(&resource)
            .map(|(_, view)| *view)
            .or_else(|| self.external_views.get(&resource).copied())
            .ok_or(GraphError::NotAllocated(resource))
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Context handed to a pass after its targets were (re)allocated
pub struct PassPrepareContext<'a, B: GraphicsBackend> {
    pub backend: &'a mut B,
    pub resources: &'a ResolvedResources,
}

/// Context for executing a render pass
pub struct PassExecuteContext<'a, B: GraphicsBackend> {
    pub backend: &'a mut B,
    pub resources: &'a ResolvedResources,
}

/// Trait for render passes
pub trait RenderPass<B: GraphicsBackend> {
    /// Get the pass name for debugging
    fn name(&self) -> &str;

    /// Setup phase - declare resource reads and writes
    fn setup(&mut self, ctx: &mut PassSetupContext);

    /// Create pipelines and rebuild anything that refers to graph textures.
    /// Runs after every allocation, including the ones triggered by resize.
    fn prepare(&mut self, _ctx: &mut PassPrepareContext<B>) -> GraphResult<()> {
        Ok(())
    }

    /// Execute phase - record commands
    fn execute(&mut self, ctx: &mut PassExecuteContext<B>) -> GraphResult<()>;
}

/// Type of render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassType {
    /// Graphics render pass
    Graphics,
    /// Transfer/copy pass
    Transfer,
}

/// Metadata about a pass in the graph
#[derive(Debug)]
pub struct PassNode {
    pub id: PassId,
    pub name: String,
    pub pass_type: PassType,
    pub inputs: Vec<ResourceAccess>,
    pub outputs: Vec<ResourceAccess>,
}

impl PassNode {
    pub fn reads_resource(&self, resource: ResourceId) -> bool {
        self.inputs.iter().any(|a| a.resource == resource)
    }

    pub fn writes_resource(&self, resource: ResourceId) -> bool {
        self.outputs.iter().any(|a| a.resource == resource)
    }

    /// Reads the resource without modifying it
    pub fn only_reads(&self, resource: ResourceId) -> bool {
        self.reads_resource(resource) && !self.writes_resource(resource)
    }

    pub fn accesses(&self) -> impl Iterator<Item = &ResourceAccess> {
        self.inputs.iter().chain(self.outputs.iter())
    }
}

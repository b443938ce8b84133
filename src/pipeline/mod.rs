//! Deferred point-light pipeline
//!
//! Four passes, ordered by the render graph from their declared accesses:
//! 1. Geometry - fills the G-buffer, depth and stencil, clears the accumulation target
//! 2. Light volume stencil - marks pixels whose surface lies inside a light's sphere
//! 3. Light accumulation - shades marked pixels, adding one light at a time
//! 4. Present - hands the accumulated image to the swapchain

pub mod geometry_pass;
pub mod light_pass;
pub mod present_pass;
pub mod reference;
pub mod scene_resources;
pub mod stencil_pass;

pub use geometry_pass::GeometryPass;
pub use light_pass::LightAccumulationPass;
pub use present_pass::PresentPass;
pub use scene_resources::{LightVolumes, MeshBinding, SceneResources};
pub use stencil_pass::StencilPass;

use crate::backend::traits::GraphicsBackend;
use crate::backend::types::*;
use crate::render_graph::{GraphResult, PassType, RenderGraph, ResourceId, TextureSize};

pub const ALBEDO_FORMAT: TextureFormat = TextureFormat::Rgba8Unorm;
pub const NORMAL_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const POSITION_FORMAT: TextureFormat = TextureFormat::Rgba16Float;
pub const DEPTH_STENCIL_FORMAT: TextureFormat = TextureFormat::Depth32FloatStencil8;

/// Name under which the swapchain image is registered
pub const SURFACE_RESOURCE: &str = "swapchain";

/// Graph resources shared between the deferred passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredTargets {
    pub albedo: ResourceId,
    pub normal: ResourceId,
    pub position: ResourceId,
    pub depth_stencil: ResourceId,
    pub accumulation: ResourceId,
    pub surface: ResourceId,
}

impl DeferredTargets {
    /// Declare every screen-sized target on the graph
    pub fn declare<B: GraphicsBackend>(
        graph: &mut RenderGraph<B>,
        accumulation_format: TextureFormat,
    ) -> Self {
        let gbuffer_usage = TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING;

        Self {
            albedo: graph.create_texture("gbuffer_albedo", TextureSize::FULL, ALBEDO_FORMAT, gbuffer_usage),
            normal: graph.create_texture("gbuffer_normal", TextureSize::FULL, NORMAL_FORMAT, gbuffer_usage),
            position: graph.create_texture(
                "gbuffer_position",
                TextureSize::FULL,
                POSITION_FORMAT,
                gbuffer_usage,
            ),
            depth_stencil: graph.create_texture(
                "depth_stencil",
                TextureSize::FULL,
                DEPTH_STENCIL_FORMAT,
                TextureUsage::RENDER_ATTACHMENT,
            ),
            accumulation: graph.create_texture(
                "light_accumulation",
                TextureSize::FULL,
                accumulation_format,
                TextureUsage::RENDER_ATTACHMENT
                    | TextureUsage::TEXTURE_BINDING
                    | TextureUsage::COPY_SRC,
            ),
            surface: graph.register_external(SURFACE_RESOURCE),
        }
    }
}

/// Build the deferred render graph around already-created scene resources.
///
/// The accumulation target uses the swapchain format so that presenting can
/// be a plain copy.
pub fn build_deferred_graph<B: GraphicsBackend>(
    accumulation_format: TextureFormat,
    scene: &SceneResources,
) -> GraphResult<(RenderGraph<B>, DeferredTargets)> {
    let mut graph = RenderGraph::new();
    let targets = DeferredTargets::declare(&mut graph, accumulation_format);

    graph.add_pass(
        GeometryPass::new(targets, scene.mesh, accumulation_format),
        PassType::Graphics,
    )?;
    graph.add_pass(
        StencilPass::new(targets.depth_stencil, scene.volumes.clone()),
        PassType::Graphics,
    )?;
    graph.add_pass(
        LightAccumulationPass::new(targets, scene.volumes.clone(), scene.screen, accumulation_format),
        PassType::Graphics,
    )?;
    graph.add_pass(PresentPass::new(targets), PassType::Transfer)?;

    Ok((graph, targets))
}

//! wgpu backend implementation

use crate::backend::shader::{validate_wgsl, FRAGMENT_ENTRY, VERTEX_ENTRY};
use crate::backend::traits::*;
use crate::backend::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

/// Buffered render pass command
#[derive(Clone)]
enum RenderCommand {
    SetPipeline(RenderPipelineHandle),
    SetBindGroup { index: u32, bind_group: BindGroupHandle },
    SetVertexBuffer { slot: u32, buffer: BufferHandle, offset: u64 },
    SetIndexBuffer { buffer: BufferHandle, offset: u64, format: IndexFormat },
    SetStencilReference(u32),
    Draw { vertices: std::ops::Range<u32>, instances: std::ops::Range<u32> },
    DrawIndexed { indices: std::ops::Range<u32>, base_vertex: i32, instances: std::ops::Range<u32> },
}

/// Pending render pass with buffered commands
struct PendingRenderPass {
    descriptor: RenderPassDescriptor,
    commands: Vec<RenderCommand>,
}

struct ViewEntry {
    view: wgpu::TextureView,
    format: TextureFormat,
}

/// wgpu backend implementation
pub struct WgpuBackend {
    #[allow(dead_code)]
    instance: wgpu::Instance,
    surface: wgpu::Surface<'static>,
    #[allow(dead_code)]
    adapter: wgpu::Adapter,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    current_texture: Option<wgpu::SurfaceTexture>,
    current_view_id: u64, // ID used to identify the swapchain view handle

    // Resource storage
    buffers: HashMap<u64, wgpu::Buffer>,
    textures: HashMap<u64, wgpu::Texture>,
    texture_views: HashMap<u64, ViewEntry>,
    samplers: HashMap<u64, wgpu::Sampler>,
    bind_group_layouts: HashMap<u64, wgpu::BindGroupLayout>,
    bind_groups: HashMap<u64, wgpu::BindGroup>,
    render_pipelines: HashMap<u64, wgpu::RenderPipeline>,

    // Handle counters
    next_buffer_id: u64,
    next_texture_id: u64,
    next_view_id: u64,
    next_sampler_id: u64,
    next_layout_id: u64,
    next_bind_group_id: u64,
    next_render_pipeline_id: u64,

    // Command encoding
    encoder: Option<wgpu::CommandEncoder>,

    // Commands are buffered here and replayed on end_render_pass
    pending_render_pass: Option<PendingRenderPass>,
}

impl WgpuBackend {
    fn convert_texture_format(format: TextureFormat) -> wgpu::TextureFormat {
        match format {
            TextureFormat::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
            TextureFormat::Rgba8UnormSrgb => wgpu::TextureFormat::Rgba8UnormSrgb,
            TextureFormat::Bgra8Unorm => wgpu::TextureFormat::Bgra8Unorm,
            TextureFormat::Bgra8UnormSrgb => wgpu::TextureFormat::Bgra8UnormSrgb,
            TextureFormat::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            TextureFormat::Depth32FloatStencil8 => wgpu::TextureFormat::Depth32FloatStencil8,
        }
    }

    fn convert_texture_format_back(format: wgpu::TextureFormat) -> Option<TextureFormat> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm => Some(TextureFormat::Rgba8Unorm),
            wgpu::TextureFormat::Rgba8UnormSrgb => Some(TextureFormat::Rgba8UnormSrgb),
            wgpu::TextureFormat::Bgra8Unorm => Some(TextureFormat::Bgra8Unorm),
            wgpu::TextureFormat::Bgra8UnormSrgb => Some(TextureFormat::Bgra8UnormSrgb),
            wgpu::TextureFormat::Rgba16Float => Some(TextureFormat::Rgba16Float),
            _ => None,
        }
    }

    fn convert_buffer_usage(usage: BufferUsage) -> wgpu::BufferUsages {
        let mut result = wgpu::BufferUsages::empty();
        if usage.contains(BufferUsage::COPY_DST) {
            result |= wgpu::BufferUsages::COPY_DST;
        }
        if usage.contains(BufferUsage::INDEX) {
            result |= wgpu::BufferUsages::INDEX;
        }
        if usage.contains(BufferUsage::VERTEX) {
            result |= wgpu::BufferUsages::VERTEX;
        }
        if usage.contains(BufferUsage::UNIFORM) {
            result |= wgpu::BufferUsages::UNIFORM;
        }
        result
    }

    fn convert_texture_usage(usage: TextureUsage) -> wgpu::TextureUsages {
        let mut result = wgpu::TextureUsages::empty();
        if usage.contains(TextureUsage::COPY_SRC) {
            result |= wgpu::TextureUsages::COPY_SRC;
        }
        if usage.contains(TextureUsage::COPY_DST) {
            result |= wgpu::TextureUsages::COPY_DST;
        }
        if usage.contains(TextureUsage::TEXTURE_BINDING) {
            result |= wgpu::TextureUsages::TEXTURE_BINDING;
        }
        if usage.contains(TextureUsage::RENDER_ATTACHMENT) {
            result |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        result
    }

    fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
        match format {
            VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }

    fn convert_compare_function(func: CompareFunction) -> wgpu::CompareFunction {
        match func {
            CompareFunction::Never => wgpu::CompareFunction::Never,
            CompareFunction::Less => wgpu::CompareFunction::Less,
            CompareFunction::Equal => wgpu::CompareFunction::Equal,
            CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
            CompareFunction::Greater => wgpu::CompareFunction::Greater,
            CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
            CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            CompareFunction::Always => wgpu::CompareFunction::Always,
        }
    }

    fn convert_stencil_operation(op: StencilOperation) -> wgpu::StencilOperation {
        match op {
            StencilOperation::Keep => wgpu::StencilOperation::Keep,
            StencilOperation::Zero => wgpu::StencilOperation::Zero,
            StencilOperation::Replace => wgpu::StencilOperation::Replace,
            StencilOperation::Invert => wgpu::StencilOperation::Invert,
            StencilOperation::IncrementClamp => wgpu::StencilOperation::IncrementClamp,
            StencilOperation::DecrementClamp => wgpu::StencilOperation::DecrementClamp,
            StencilOperation::IncrementWrap => wgpu::StencilOperation::IncrementWrap,
            StencilOperation::DecrementWrap => wgpu::StencilOperation::DecrementWrap,
        }
    }

    fn convert_stencil_face(face: &StencilFaceState) -> wgpu::StencilFaceState {
        wgpu::StencilFaceState {
            compare: Self::convert_compare_function(face.compare),
            fail_op: Self::convert_stencil_operation(face.fail_op),
            depth_fail_op: Self::convert_stencil_operation(face.depth_fail_op),
            pass_op: Self::convert_stencil_operation(face.pass_op),
        }
    }

    fn convert_blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
        match factor {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
        }
    }

    fn convert_blend_operation(op: BlendOperation) -> wgpu::BlendOperation {
        match op {
            BlendOperation::Add => wgpu::BlendOperation::Add,
        }
    }

    fn convert_blend_component(component: &BlendComponent) -> wgpu::BlendComponent {
        wgpu::BlendComponent {
            src_factor: Self::convert_blend_factor(component.src_factor),
            dst_factor: Self::convert_blend_factor(component.dst_factor),
            operation: Self::convert_blend_operation(component.operation),
        }
    }

    fn convert_filter_mode(mode: FilterMode) -> wgpu::FilterMode {
        match mode {
            FilterMode::Nearest => wgpu::FilterMode::Nearest,
            FilterMode::Linear => wgpu::FilterMode::Linear,
        }
    }

    fn convert_address_mode(mode: AddressMode) -> wgpu::AddressMode {
        match mode {
            AddressMode::ClampToEdge => wgpu::AddressMode::ClampToEdge,
            AddressMode::Repeat => wgpu::AddressMode::Repeat,
        }
    }

    fn convert_load_op<V>(op: &LoadOp, clear: impl FnOnce([f32; 4]) -> V) -> wgpu::LoadOp<V> {
        match op {
            LoadOp::Clear(value) => wgpu::LoadOp::Clear(clear(*value)),
            LoadOp::Load => wgpu::LoadOp::Load,
        }
    }

    fn convert_store_op(op: StoreOp) -> wgpu::StoreOp {
        match op {
            StoreOp::Store => wgpu::StoreOp::Store,
            StoreOp::Discard => wgpu::StoreOp::Discard,
        }
    }

    /// Scale a requested size down to the device limit, keeping the aspect ratio
    fn clamp_to_limits(&self, width: u32, height: u32) -> (u32, u32) {
        clamp_extent(width, height, self.device.limits().max_texture_dimension_2d)
    }
}

fn clamp_extent(width: u32, height: u32, max_size: u32) -> (u32, u32) {
    if width > max_size || height > max_size {
        let scale = (max_size as f32 / width as f32).min(max_size as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).max(1);
        let new_height = ((height as f32 * scale) as u32).max(1);
        (new_width, new_height)
    } else {
        (width.max(1), height.max(1))
    }
}

impl WgpuBackend {
    /// Create the backend for a window, blocking on adapter and device requests
    pub fn new(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        pollster::block_on(Self::new_async(window, vsync))
    }

    pub async fn new_async(window: Arc<winit::window::Window>, vsync: bool) -> BackendResult<Self> {
        let (instance, surface, adapter, device, queue) = Self::init_native(window.clone()).await?;

        let size = window.inner_size();
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = if surface_caps.formats.contains(&wgpu::TextureFormat::Bgra8Unorm) {
            wgpu::TextureFormat::Bgra8Unorm
        } else {
            let fallback = surface_caps
                .formats
                .iter()
                .copied()
                .find(|f| Self::convert_texture_format_back(*f).is_some())
                .ok_or_else(|| {
                    BackendError::SurfaceCreationFailed(format!(
                        "no supported color format among {:?}",
                        surface_caps.formats
                    ))
                })?;
            log::warn!("Bgra8Unorm surfaces unsupported, using {:?}", fallback);
            fallback
        };

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if surface_caps.usages.contains(wgpu::TextureUsages::COPY_DST) {
            usage |= wgpu::TextureUsages::COPY_DST;
        } else {
            log::warn!("Surface cannot be a copy destination, presenting through a composite draw");
        }

        let present_mode = if vsync {
            wgpu::PresentMode::AutoVsync
        } else {
            wgpu::PresentMode::AutoNoVsync
        };

        let max_size = device.limits().max_texture_dimension_2d;
        let (clamped_width, clamped_height) = clamp_extent(size.width, size.height, max_size);

        let surface_config = wgpu::SurfaceConfiguration {
            usage,
            format: surface_format,
            width: clamped_width,
            height: clamped_height,
            present_mode,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };

        surface.configure(&device, &surface_config);
        log::info!(
            "Surface configured: {}x{} {:?}",
            clamped_width,
            clamped_height,
            surface_format
        );

        Ok(Self {
            instance,
            surface,
            adapter,
            device,
            queue,
            surface_config,
            current_texture: None,
            current_view_id: 0,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            texture_views: HashMap::new(),
            samplers: HashMap::new(),
            bind_group_layouts: HashMap::new(),
            bind_groups: HashMap::new(),
            render_pipelines: HashMap::new(),
            next_buffer_id: 1,
            next_texture_id: 1,
            next_view_id: 1,
            next_sampler_id: 1,
            next_layout_id: 1,
            next_bind_group_id: 1,
            next_render_pipeline_id: 1,
            encoder: None,
            pending_render_pass: None,
        })
    }

    async fn init_native(
        window: Arc<winit::window::Window>,
    ) -> BackendResult<(
        wgpu::Instance,
        wgpu::Surface<'static>,
        wgpu::Adapter,
        wgpu::Device,
        wgpu::Queue,
    )> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window)
            .map_err(|e| BackendError::SurfaceCreationFailed(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| BackendError::InitializationFailed("No suitable adapter found".into()))?;

        let adapter_info = adapter.get_info();
        log::info!(
            "Selected GPU: {} ({:?} backend)",
            adapter_info.name,
            adapter_info.backend
        );

        // Light volumes need 8 stencil bits next to a 32-bit float depth buffer
        let required_features = wgpu::Features::DEPTH32FLOAT_STENCIL8;
        if !adapter.features().contains(required_features) {
            return Err(BackendError::InitializationFailed(format!(
                "{} does not support Depth32FloatStencil8 textures",
                adapter_info.name
            )));
        }

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Deferred Device"),
                    required_features,
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .map_err(|e| BackendError::DeviceCreationFailed(e.to_string()))?;

        Ok((instance, surface, adapter, device, queue))
    }

    fn new_encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn lookup_view<'a>(
        views: &'a HashMap<u64, ViewEntry>,
        swapchain: Option<&'a ViewEntry>,
        current_view_id: u64,
        handle: TextureViewHandle,
    ) -> Option<&'a ViewEntry> {
        if handle.0 == current_view_id {
            swapchain
        } else {
            views.get(&handle.0)
        }
    }
}

impl GraphicsBackend for WgpuBackend {
    fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            let (clamped_width, clamped_height) = self.clamp_to_limits(width, height);
            self.surface_config.width = clamped_width;
            self.surface_config.height = clamped_height;
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        let output = self
            .surface
            .get_current_texture()
            .map_err(|e| match e {
                wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => BackendError::SurfaceLost,
                wgpu::SurfaceError::OutOfMemory => BackendError::OutOfMemory,
                _ => BackendError::AcquireImageFailed(e.to_string()),
            })?;

        // The swapchain view gets a fresh ID each frame and is created on demand
        let view_id = self.next_view_id;
        self.next_view_id += 1;
        self.current_view_id = view_id;

        self.current_texture = Some(output);
        self.encoder = Some(self.new_encoder("Frame Encoder"));

        Ok(FrameContext {
            swapchain_view: TextureViewHandle(view_id),
            width: self.surface_config.width,
            height: self.surface_config.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }

        if let Some(texture) = self.current_texture.take() {
            texture.present();
        }

        Ok(())
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
            self.encoder = Some(self.new_encoder("Frame Encoder"));
        }
    }

    fn swapchain_format(&self) -> TextureFormat {
        // new_async only accepts formats that convert back
        Self::convert_texture_format_back(self.surface_config.format)
            .unwrap_or(TextureFormat::Bgra8Unorm)
    }

    fn supports_surface_copy(&self) -> bool {
        self.surface_config.usage.contains(wgpu::TextureUsages::COPY_DST)
    }

    fn create_buffer(&mut self, desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: desc.label.as_deref(),
            size: desc.size,
            usage: Self::convert_buffer_usage(desc.usage),
            mapped_at_creation: false,
        });

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn create_buffer_init(
        &mut self,
        desc: &BufferDescriptor,
        data: &[u8],
    ) -> BackendResult<BufferHandle> {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: desc.label.as_deref(),
            contents: data,
            usage: Self::convert_buffer_usage(desc.usage),
        });

        let id = self.next_buffer_id;
        self.next_buffer_id += 1;
        self.buffers.insert(id, buffer);

        Ok(BufferHandle(id))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) {
        if let Some(buf) = self.buffers.get(&buffer.0) {
            self.queue.write_buffer(buf, offset, data);
        }
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        if desc.width == 0 || desc.height == 0 {
            return Err(BackendError::TextureCreationFailed(format!(
                "{} has zero extent",
                desc.label.as_deref().unwrap_or("texture")
            )));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: desc.label.as_deref(),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::convert_texture_format(desc.format),
            usage: Self::convert_texture_usage(desc.usage),
            view_formats: &[],
        });

        let id = self.next_texture_id;
        self.next_texture_id += 1;
        self.textures.insert(id, texture);

        Ok(TextureHandle(id))
    }

    fn create_texture_view(&mut self, texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        let tex = self.textures.get(&texture.0).ok_or(BackendError::InvalidHandle {
            kind: "texture",
            id: texture.0,
        })?;

        let view = tex.create_view(&wgpu::TextureViewDescriptor::default());
        let format = match tex.format() {
            wgpu::TextureFormat::Depth32FloatStencil8 => TextureFormat::Depth32FloatStencil8,
            other => Self::convert_texture_format_back(other).unwrap_or(TextureFormat::Rgba8Unorm),
        };

        let id = self.next_view_id;
        self.next_view_id += 1;
        self.texture_views.insert(id, ViewEntry { view, format });

        Ok(TextureViewHandle(id))
    }

    fn write_texture(&mut self, texture: TextureHandle, data: &[u8], width: u32, height: u32) {
        if let Some(tex) = self.textures.get(&texture.0) {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: tex,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                data,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(width * 4),
                    rows_per_image: Some(height),
                },
                wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    fn create_sampler(&mut self, desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        let address_mode = Self::convert_address_mode(desc.address_mode);
        let filter = Self::convert_filter_mode(desc.filter);
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: desc.label.as_deref(),
            address_mode_u: address_mode,
            address_mode_v: address_mode,
            address_mode_w: address_mode,
            mag_filter: filter,
            min_filter: filter,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: f32::MAX,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        });

        let id = self.next_sampler_id;
        self.next_sampler_id += 1;
        self.samplers.insert(id, sampler);

        Ok(SamplerHandle(id))
    }

    fn create_bind_group_layout(
        &mut self,
        entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        let wgpu_entries: Vec<wgpu::BindGroupLayoutEntry> = entries
            .iter()
            .map(|e| {
                let ty = match &e.ty {
                    BindingType::UniformBuffer => wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    BindingType::Texture { sample_type } => wgpu::BindingType::Texture {
                        sample_type: match sample_type {
                            TextureSampleType::Float { filterable } => {
                                wgpu::TextureSampleType::Float { filterable: *filterable }
                            }
                        },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    BindingType::Sampler { filtering } => wgpu::BindingType::Sampler(
                        if *filtering {
                            wgpu::SamplerBindingType::Filtering
                        } else {
                            wgpu::SamplerBindingType::NonFiltering
                        },
                    ),
                };

                let mut visibility = wgpu::ShaderStages::empty();
                if e.visibility.contains(ShaderStageFlags::VERTEX) {
                    visibility |= wgpu::ShaderStages::VERTEX;
                }
                if e.visibility.contains(ShaderStageFlags::FRAGMENT) {
                    visibility |= wgpu::ShaderStages::FRAGMENT;
                }

                wgpu::BindGroupLayoutEntry {
                    binding: e.binding,
                    visibility,
                    ty,
                    count: None,
                }
            })
            .collect();

        let layout = self
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &wgpu_entries,
            });

        let id = self.next_layout_id;
        self.next_layout_id += 1;
        self.bind_group_layouts.insert(id, layout);

        Ok(BindGroupLayoutHandle(id))
    }

    fn create_bind_group(
        &mut self,
        layout: BindGroupLayoutHandle,
        entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        let layout_ref = self.bind_group_layouts.get(&layout.0).ok_or(BackendError::InvalidHandle {
            kind: "bind group layout",
            id: layout.0,
        })?;

        let wgpu_entries = entries
            .iter()
            .map(|(binding, entry)| -> BackendResult<wgpu::BindGroupEntry> {
                let resource = match entry {
                    BindGroupEntry::Buffer { buffer, offset, size } => {
                        let buf = self.buffers.get(&buffer.0).ok_or(BackendError::InvalidHandle {
                            kind: "buffer",
                            id: buffer.0,
                        })?;
                        wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: buf,
                            offset: *offset,
                            size: size.and_then(std::num::NonZeroU64::new),
                        })
                    }
                    BindGroupEntry::Texture(view) => {
                        let v = self.texture_views.get(&view.0).ok_or(BackendError::InvalidHandle {
                            kind: "texture view",
                            id: view.0,
                        })?;
                        wgpu::BindingResource::TextureView(&v.view)
                    }
                    BindGroupEntry::Sampler(sampler) => {
                        let s = self.samplers.get(&sampler.0).ok_or(BackendError::InvalidHandle {
                            kind: "sampler",
                            id: sampler.0,
                        })?;
                        wgpu::BindingResource::Sampler(s)
                    }
                };

                Ok(wgpu::BindGroupEntry {
                    binding: *binding,
                    resource,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: layout_ref,
            entries: &wgpu_entries,
        });

        let id = self.next_bind_group_id;
        self.next_bind_group_id += 1;
        self.bind_groups.insert(id, bind_group);

        Ok(BindGroupHandle(id))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        let label = desc.label.as_deref().unwrap_or("render pipeline");
        validate_wgsl(label, desc.shader, desc.has_fragment)?;

        let layouts = desc
            .bind_group_layouts
            .iter()
            .map(|h| {
                self.bind_group_layouts.get(&h.0).ok_or(BackendError::InvalidHandle {
                    kind: "bind group layout",
                    id: h.0,
                })
            })
            .collect::<BackendResult<Vec<_>>>()?;

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: desc.label.as_deref(),
                source: wgpu::ShaderSource::Wgsl(desc.shader.into()),
            });

        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        // Build vertex buffer layouts with proper lifetimes
        let vertex_attrs: Vec<Vec<wgpu::VertexAttribute>> = desc
            .vertex_layouts
            .iter()
            .map(|layout| {
                layout
                    .attributes
                    .iter()
                    .map(|a| wgpu::VertexAttribute {
                        format: Self::convert_vertex_format(a.format),
                        offset: a.offset,
                        shader_location: a.location,
                    })
                    .collect()
            })
            .collect();

        let vertex_buffers: Vec<wgpu::VertexBufferLayout> = desc
            .vertex_layouts
            .iter()
            .zip(vertex_attrs.iter())
            .map(|(layout, attrs)| wgpu::VertexBufferLayout {
                array_stride: layout.array_stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: attrs,
            })
            .collect();

        let color_targets: Vec<Option<wgpu::ColorTargetState>> = desc
            .color_targets
            .iter()
            .map(|target| {
                Some(wgpu::ColorTargetState {
                    format: Self::convert_texture_format(target.format),
                    blend: target.blend.as_ref().map(|b| wgpu::BlendState {
                        color: Self::convert_blend_component(&b.color),
                        alpha: Self::convert_blend_component(&b.alpha),
                    }),
                    write_mask: wgpu::ColorWrites::from_bits_truncate(target.write_mask.bits()),
                })
            })
            .collect();

        let primitive = wgpu::PrimitiveState {
            topology: match desc.primitive_topology {
                PrimitiveTopology::TriangleList => wgpu::PrimitiveTopology::TriangleList,
            },
            strip_index_format: None,
            front_face: match desc.front_face {
                FrontFace::Ccw => wgpu::FrontFace::Ccw,
                FrontFace::Cw => wgpu::FrontFace::Cw,
            },
            cull_mode: match desc.cull_mode {
                CullMode::None => None,
                CullMode::Front => Some(wgpu::Face::Front),
                CullMode::Back => Some(wgpu::Face::Back),
            },
            ..Default::default()
        };

        let depth_stencil = desc.depth_stencil.as_ref().map(|ds| wgpu::DepthStencilState {
            format: Self::convert_texture_format(ds.format),
            depth_write_enabled: ds.depth_write_enabled,
            depth_compare: Self::convert_compare_function(ds.depth_compare),
            stencil: wgpu::StencilState {
                front: Self::convert_stencil_face(&ds.stencil.front),
                back: Self::convert_stencil_face(&ds.stencil.back),
                read_mask: ds.stencil.read_mask,
                write_mask: ds.stencil.write_mask,
            },
            bias: wgpu::DepthBiasState::default(),
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: desc.label.as_deref(),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: VERTEX_ENTRY,
                    buffers: &vertex_buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: desc.has_fragment.then(|| wgpu::FragmentState {
                    module: &shader,
                    entry_point: FRAGMENT_ENTRY,
                    targets: &color_targets,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive,
                depth_stencil,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(BackendError::PipelineCreationFailed(format!("{}: {}", label, error)));
        }

        let id = self.next_render_pipeline_id;
        self.next_render_pipeline_id += 1;
        self.render_pipelines.insert(id, pipeline);

        Ok(RenderPipelineHandle(id))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.pending_render_pass = Some(PendingRenderPass {
            descriptor: desc.clone(),
            commands: Vec::new(),
        });
    }

    fn end_render_pass(&mut self) {
        let Some(pending) = self.pending_render_pass.take() else {
            return;
        };

        let Some(mut encoder) = self.encoder.take() else {
            return;
        };

        let swapchain_view: Option<ViewEntry> = self.current_texture.as_ref().and_then(|tex| {
            Self::convert_texture_format_back(tex.texture.format()).map(|format| ViewEntry {
                view: tex.texture.create_view(&wgpu::TextureViewDescriptor::default()),
                format,
            })
        });
        let current_view_id = self.current_view_id;

        {
            let color_attachments: Vec<Option<wgpu::RenderPassColorAttachment>> = pending
                .descriptor
                .color_attachments
                .iter()
                .filter_map(|att| {
                    let entry = Self::lookup_view(
                        &self.texture_views,
                        swapchain_view.as_ref(),
                        current_view_id,
                        att.view,
                    )?;
                    Some(Some(wgpu::RenderPassColorAttachment {
                        view: &entry.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: Self::convert_load_op(&att.load_op, |c| wgpu::Color {
                                r: c[0] as f64,
                                g: c[1] as f64,
                                b: c[2] as f64,
                                a: c[3] as f64,
                            }),
                            store: Self::convert_store_op(att.store_op),
                        },
                    }))
                })
                .collect();

            let depth_attachment = pending.descriptor.depth_stencil_attachment.as_ref().and_then(|att| {
                let entry = Self::lookup_view(
                    &self.texture_views,
                    swapchain_view.as_ref(),
                    current_view_id,
                    att.view,
                )?;
                let depth_clear = att.depth_clear_value;
                let stencil_clear = att.stencil_clear_value;
                Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &entry.view,
                    depth_ops: Some(wgpu::Operations {
                        load: Self::convert_load_op(&att.depth_load_op, |_| depth_clear),
                        store: Self::convert_store_op(att.depth_store_op),
                    }),
                    stencil_ops: entry.format.has_stencil().then(|| wgpu::Operations {
                        load: Self::convert_load_op(&att.stencil_load_op, |_| stencil_clear),
                        store: Self::convert_store_op(att.stencil_store_op),
                    }),
                })
            });

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: pending.descriptor.label.as_deref(),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_attachment,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for cmd in &pending.commands {
                match cmd {
                    RenderCommand::SetPipeline(handle) => {
                        if let Some(pipeline) = self.render_pipelines.get(&handle.0) {
                            render_pass.set_pipeline(pipeline);
                        }
                    }
                    RenderCommand::SetBindGroup { index, bind_group } => {
                        if let Some(bg) = self.bind_groups.get(&bind_group.0) {
                            render_pass.set_bind_group(*index, bg, &[]);
                        }
                    }
                    RenderCommand::SetVertexBuffer { slot, buffer, offset } => {
                        if let Some(buf) = self.buffers.get(&buffer.0) {
                            render_pass.set_vertex_buffer(*slot, buf.slice(*offset..));
                        }
                    }
                    RenderCommand::SetIndexBuffer { buffer, offset, format } => {
                        if let Some(buf) = self.buffers.get(&buffer.0) {
                            let wgpu_format = match format {
                                IndexFormat::Uint16 => wgpu::IndexFormat::Uint16,
                                IndexFormat::Uint32 => wgpu::IndexFormat::Uint32,
                            };
                            render_pass.set_index_buffer(buf.slice(*offset..), wgpu_format);
                        }
                    }
                    RenderCommand::SetStencilReference(reference) => {
                        render_pass.set_stencil_reference(*reference);
                    }
                    RenderCommand::Draw { vertices, instances } => {
                        render_pass.draw(vertices.clone(), instances.clone());
                    }
                    RenderCommand::DrawIndexed { indices, base_vertex, instances } => {
                        render_pass.draw_indexed(indices.clone(), *base_vertex, instances.clone());
                    }
                }
            }
        }

        self.encoder = Some(encoder);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::SetPipeline(pipeline));
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::SetBindGroup { index, bind_group });
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: BufferHandle, offset: u64) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::SetVertexBuffer { slot, buffer, offset });
        }
    }

    fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u64, format: IndexFormat) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::SetIndexBuffer { buffer, offset, format });
        }
    }

    fn set_stencil_reference(&mut self, reference: u32) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::SetStencilReference(reference));
        }
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, instances: std::ops::Range<u32>) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::Draw { vertices, instances });
        }
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        base_vertex: i32,
        instances: std::ops::Range<u32>,
    ) {
        if let Some(ref mut pending) = self.pending_render_pass {
            pending.commands.push(RenderCommand::DrawIndexed { indices, base_vertex, instances });
        }
    }

    fn copy_texture_to_surface(&mut self, source: TextureHandle) {
        let (Some(encoder), Some(target), Some(src)) = (
            self.encoder.as_mut(),
            self.current_texture.as_ref(),
            self.textures.get(&source.0),
        ) else {
            return;
        };

        let extent = wgpu::Extent3d {
            width: src.width().min(target.texture.width()),
            height: src.height().min(target.texture.height()),
            depth_or_array_layers: 1,
        };
        encoder.copy_texture_to_texture(
            src.as_image_copy(),
            target.texture.as_image_copy(),
            extent,
        );
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer.0);
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        if let Some(tex) = self.textures.remove(&texture.0) {
            tex.destroy();
        }
    }

    fn destroy_texture_view(&mut self, view: TextureViewHandle) {
        self.texture_views.remove(&view.0);
    }

    fn destroy_bind_group(&mut self, bind_group: BindGroupHandle) {
        self.bind_groups.remove(&bind_group.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_extent_keeps_aspect() {
        assert_eq!(clamp_extent(800, 600, 8192), (800, 600));
        assert_eq!(clamp_extent(16384, 8192, 8192), (8192, 4096));
        assert_eq!(clamp_extent(0, 0, 8192), (1, 1));
    }

    #[test]
    fn test_stencil_state_conversion() {
        let face = StencilFaceState {
            compare: CompareFunction::Always,
            fail_op: StencilOperation::Keep,
            depth_fail_op: StencilOperation::IncrementClamp,
            pass_op: StencilOperation::Keep,
        };
        let converted = WgpuBackend::convert_stencil_face(&face);
        assert_eq!(converted.compare, wgpu::CompareFunction::Always);
        assert_eq!(converted.depth_fail_op, wgpu::StencilOperation::IncrementClamp);
        assert_eq!(converted.pass_op, wgpu::StencilOperation::Keep);
    }

    #[test]
    fn test_surface_formats_round_trip() {
        for format in [TextureFormat::Bgra8Unorm, TextureFormat::Rgba8Unorm, TextureFormat::Rgba16Float] {
            let wgpu_format = WgpuBackend::convert_texture_format(format);
            assert_eq!(WgpuBackend::convert_texture_format_back(wgpu_format), Some(format));
        }
    }

    #[test]
    fn test_srgb_surface_fallbacks_are_accepted() {
        for format in [TextureFormat::Rgba8UnormSrgb, TextureFormat::Bgra8UnormSrgb] {
            let wgpu_format = WgpuBackend::convert_texture_format(format);
            assert_eq!(WgpuBackend::convert_texture_format_back(wgpu_format), Some(format));
        }
        assert_eq!(
            WgpuBackend::convert_texture_format_back(wgpu::TextureFormat::Rgba32Float),
            None
        );
    }
}

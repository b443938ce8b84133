//! Backend that records calls instead of talking to a GPU

use crate::backend::traits::*;
use crate::backend::types::*;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    BeginFrame,
    EndFrame,
    Submit,
    BeginRenderPass {
        label: Option<String>,
        color: Vec<(TextureViewHandle, LoadOp)>,
        depth_stencil: Option<(TextureViewHandle, LoadOp, LoadOp)>,
    },
    EndRenderPass,
    SetPipeline(RenderPipelineHandle),
    SetBindGroup(u32, BindGroupHandle),
    SetStencilReference(u32),
    Draw(u32),
    DrawIndexed(u32),
    CopyToSurface(TextureHandle),
    WriteBuffer(BufferHandle, usize),
    Resize(u32, u32),
}

pub struct RecordingBackend {
    pub calls: Vec<Call>,
    pub textures: Vec<(TextureHandle, TextureDescriptor)>,
    pub destroyed_textures: Vec<TextureHandle>,
    pub pipelines: Vec<RenderPipelineDescriptor>,
    pub surface_copy: bool,
    /// Fail the next `begin_frame` as if the surface went out of date
    pub lose_surface: bool,
    width: u32,
    height: u32,
    next_id: u64,
}

impl RecordingBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            calls: Vec::new(),
            textures: Vec::new(),
            destroyed_textures: Vec::new(),
            pipelines: Vec::new(),
            surface_copy: true,
            lose_surface: false,
            width,
            height,
            next_id: 1,
        }
    }

    fn next(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn live_textures(&self) -> Vec<&TextureDescriptor> {
        self.textures
            .iter()
            .filter(|(h, _)| !self.destroyed_textures.contains(h))
            .map(|(_, d)| d)
            .collect()
    }

    pub fn pipeline(&self, label: &str) -> Option<&RenderPipelineDescriptor> {
        self.pipelines
            .iter()
            .find(|p| p.label.as_deref() == Some(label))
    }

    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }
}

impl GraphicsBackend for RecordingBackend {
    fn resize(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Resize(width, height));
        if width > 0 && height > 0 {
            self.width = width;
            self.height = height;
        }
    }

    fn surface_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn begin_frame(&mut self) -> BackendResult<FrameContext> {
        if std::mem::take(&mut self.lose_surface) {
            return Err(BackendError::SurfaceLost);
        }
        self.calls.push(Call::BeginFrame);
        Ok(FrameContext {
            swapchain_view: TextureViewHandle(0),
            width: self.width,
            height: self.height,
        })
    }

    fn end_frame(&mut self) -> BackendResult<()> {
        self.calls.push(Call::EndFrame);
        Ok(())
    }

    fn submit(&mut self) {
        self.calls.push(Call::Submit);
    }

    fn swapchain_format(&self) -> TextureFormat {
        TextureFormat::Bgra8Unorm
    }

    fn supports_surface_copy(&self) -> bool {
        self.surface_copy
    }

    fn create_buffer(&mut self, _desc: &BufferDescriptor) -> BackendResult<BufferHandle> {
        Ok(BufferHandle(self.next()))
    }

    fn create_buffer_init(
        &mut self,
        _desc: &BufferDescriptor,
        _data: &[u8],
    ) -> BackendResult<BufferHandle> {
        Ok(BufferHandle(self.next()))
    }

    fn write_buffer(&mut self, buffer: BufferHandle, _offset: u64, data: &[u8]) {
        self.calls.push(Call::WriteBuffer(buffer, data.len()));
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> BackendResult<TextureHandle> {
        let handle = TextureHandle(self.next());
        self.textures.push((handle, desc.clone()));
        Ok(handle)
    }

    fn create_texture_view(&mut self, _texture: TextureHandle) -> BackendResult<TextureViewHandle> {
        Ok(TextureViewHandle(self.next()))
    }

    fn write_texture(&mut self, _texture: TextureHandle, _data: &[u8], _width: u32, _height: u32) {}

    fn create_sampler(&mut self, _desc: &SamplerDescriptor) -> BackendResult<SamplerHandle> {
        Ok(SamplerHandle(self.next()))
    }

    fn create_bind_group_layout(
        &mut self,
        _entries: &[BindGroupLayoutEntry],
    ) -> BackendResult<BindGroupLayoutHandle> {
        Ok(BindGroupLayoutHandle(self.next()))
    }

    fn create_bind_group(
        &mut self,
        _layout: BindGroupLayoutHandle,
        _entries: &[(u32, BindGroupEntry)],
    ) -> BackendResult<BindGroupHandle> {
        Ok(BindGroupHandle(self.next()))
    }

    fn create_render_pipeline(
        &mut self,
        desc: &RenderPipelineDescriptor,
    ) -> BackendResult<RenderPipelineHandle> {
        self.pipelines.push(desc.clone());
        Ok(RenderPipelineHandle(self.next()))
    }

    fn begin_render_pass(&mut self, desc: &RenderPassDescriptor) {
        self.calls.push(Call::BeginRenderPass {
            label: desc.label.clone(),
            color: desc
                .color_attachments
                .iter()
                .map(|a| (a.view, a.load_op.clone()))
                .collect(),
            depth_stencil: desc
                .depth_stencil_attachment
                .as_ref()
                .map(|d| (d.view, d.depth_load_op.clone(), d.stencil_load_op.clone())),
        });
    }

    fn end_render_pass(&mut self) {
        self.calls.push(Call::EndRenderPass);
    }

    fn set_render_pipeline(&mut self, pipeline: RenderPipelineHandle) {
        self.calls.push(Call::SetPipeline(pipeline));
    }

    fn set_bind_group(&mut self, index: u32, bind_group: BindGroupHandle) {
        self.calls.push(Call::SetBindGroup(index, bind_group));
    }

    fn set_vertex_buffer(&mut self, _slot: u32, _buffer: BufferHandle, _offset: u64) {}

    fn set_index_buffer(&mut self, _buffer: BufferHandle, _offset: u64, _format: IndexFormat) {}

    fn set_stencil_reference(&mut self, reference: u32) {
        self.calls.push(Call::SetStencilReference(reference));
    }

    fn draw(&mut self, vertices: std::ops::Range<u32>, _instances: std::ops::Range<u32>) {
        self.calls.push(Call::Draw(vertices.len() as u32));
    }

    fn draw_indexed(
        &mut self,
        indices: std::ops::Range<u32>,
        _base_vertex: i32,
        _instances: std::ops::Range<u32>,
    ) {
        self.calls.push(Call::DrawIndexed(indices.len() as u32));
    }

    fn copy_texture_to_surface(&mut self, source: TextureHandle) {
        self.calls.push(Call::CopyToSurface(source));
    }

    fn destroy_buffer(&mut self, _buffer: BufferHandle) {}

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.destroyed_textures.push(texture);
    }

    fn destroy_texture_view(&mut self, _view: TextureViewHandle) {}

    fn destroy_bind_group(&mut self, _bind_group: BindGroupHandle) {}
}

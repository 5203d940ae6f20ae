//! Texture ownership for the overlay renderer.
//!
//! Every texture the UI can reference lives here behind an opaque `u64`
//! handle. Handle 1 is permanently bound to the font atlas; user handles are
//! allocated monotonically from 2 and never reused, so a destroyed handle can
//! never be confused with a later upload.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

/// Handle permanently bound to the font atlas.
pub const FONT_TEXTURE_HANDLE: u64 = 1;

pub type TextureHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    Linear,
    Point,
}

/// Monotonic handle allocation, starting above the font sentinel.
#[derive(Debug)]
pub struct HandleAllocator {
    next: u64,
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self {
            next: FONT_TEXTURE_HANDLE + 1,
        }
    }

    pub fn alloc(&mut self) -> TextureHandle {
        let handle = self.next;
        self.next += 1;
        handle
    }
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TextureRecord {
    texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
    pub width: u32,
    pub height: u32,
    pub sampling: SamplingMode,
}

/// Maps texture handles to GPU resources; sole owner of the underlying
/// textures. Written only by the render thread.
pub struct TextureRegistry {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler_linear: wgpu::Sampler,
    sampler_point: wgpu::Sampler,
    records: HashMap<TextureHandle, TextureRecord>,
    allocator: HandleAllocator,
    /// egui-managed texture id -> registry handle (id 0 is the font atlas).
    managed: HashMap<u64, TextureHandle>,
}

impl TextureRegistry {
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>) -> Self {
        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("overlay_texture_bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let sampler_linear = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_sampler_linear"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let sampler_point = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_sampler_point"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let mut registry = Self {
            device,
            queue,
            bind_group_layout,
            sampler_linear,
            sampler_point,
            records: HashMap::new(),
            allocator: HandleAllocator::new(),
            managed: HashMap::new(),
        };

        // Placeholder font atlas so handle 1 resolves from the first frame;
        // egui's first textures delta replaces it with the real atlas.
        let white = [0xffu8; 4];
        let record = registry.create_record(&white, 1, 1, SamplingMode::Linear);
        registry.records.insert(FONT_TEXTURE_HANDLE, record);
        registry
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Upload a top-left-origin RGBA8 pixel buffer and return a fresh handle.
    pub fn upload(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
        sampling: SamplingMode,
    ) -> TextureHandle {
        let record = self.create_record(pixels, width, height, sampling);
        let handle = self.allocator.alloc();
        self.records.insert(handle, record);
        debug!(handle, width, height, ?sampling, "uploaded texture");
        handle
    }

    /// Release the GPU resource behind `handle`. Handle 0, the font sentinel
    /// and unknown handles are safe no-ops.
    pub fn destroy(&mut self, handle: TextureHandle) {
        if handle == 0 || handle == FONT_TEXTURE_HANDLE {
            return;
        }
        if self.records.remove(&handle).is_some() {
            debug!(handle, "destroyed texture");
        }
    }

    /// Replace the resource bound to the font handle in place. Draw commands
    /// translated later in the same frame resolve to the new atlas.
    pub fn rebuild_font_atlas(&mut self, pixels: &[u8], width: u32, height: u32) {
        let record = self.create_record(pixels, width, height, SamplingMode::Linear);
        self.records.insert(FONT_TEXTURE_HANDLE, record);
        debug!(width, height, "rebuilt font atlas");
    }

    pub fn lookup(&self, handle: TextureHandle) -> Option<&TextureRecord> {
        self.records.get(&handle)
    }

    /// Resolve a handle for drawing. A null or unknown handle falls back to
    /// the font atlas rather than failing the frame.
    pub fn resolve(&self, handle: TextureHandle) -> &TextureRecord {
        self.records.get(&handle).unwrap_or_else(|| {
            self.records
                .get(&FONT_TEXTURE_HANDLE)
                .expect("font atlas record always present")
        })
    }

    /// Map an egui texture id onto a registry handle.
    pub fn resolve_texture_id(&self, id: egui::TextureId) -> TextureHandle {
        map_texture_id(&self.managed, id)
    }

    /// Apply egui's per-frame texture changes. Must run before the frame's
    /// draws are translated so same-frame references see the new resources.
    pub fn apply_textures_delta(&mut self, delta: &egui::TexturesDelta) {
        for (id, image_delta) in &delta.set {
            let (pixels, width, height) = image_bytes(&image_delta.image);
            let sampling = sampling_from_options(&image_delta.options);

            match image_delta.pos {
                Some([x, y]) => {
                    let handle = self.resolve_texture_id(*id);
                    self.write_sub_image(handle, x as u32, y as u32, &pixels, width, height);
                }
                None => match *id {
                    egui::TextureId::Managed(0) => self.rebuild_font_atlas(&pixels, width, height),
                    egui::TextureId::Managed(m) => {
                        let record = self.create_record(&pixels, width, height, sampling);
                        match self.managed.get(&m) {
                            Some(&handle) => {
                                self.records.insert(handle, record);
                            }
                            None => {
                                let handle = self.allocator.alloc();
                                self.records.insert(handle, record);
                                self.managed.insert(m, handle);
                            }
                        }
                    }
                    egui::TextureId::User(_) => {
                        // User textures are registered through `upload`.
                        warn!(?id, "ignoring texture delta for user-managed id");
                    }
                },
            }
        }

        for id in &delta.free {
            match *id {
                egui::TextureId::Managed(m) => {
                    if let Some(handle) = self.managed.remove(&m) {
                        self.destroy(handle);
                    }
                }
                egui::TextureId::User(handle) => self.destroy(handle),
            }
        }
    }

    fn write_sub_image(
        &mut self,
        handle: TextureHandle,
        x: u32,
        y: u32,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) {
        let Some(record) = self.records.get(&handle) else {
            warn!(handle, "positioned texture update for unknown handle");
            return;
        };
        if x + width > record.width || y + height > record.height {
            warn!(handle, "positioned texture update out of bounds");
            return;
        }
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &record.texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: 0 },
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
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

    fn create_record(
        &self,
        pixels: &[u8],
        width: u32,
        height: u32,
        sampling: SamplingMode,
    ) -> TextureRecord {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("overlay_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
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
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = match sampling {
            SamplingMode::Linear => &self.sampler_linear,
            SamplingMode::Point => &self.sampler_point,
        };
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay_texture_bg"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        TextureRecord {
            texture,
            bind_group,
            width,
            height,
            sampling,
        }
    }
}

/// Texture id resolution: egui's managed id 0 is always the font atlas,
/// other managed ids go through the id map (falling back to the atlas when
/// unknown), user ids are registry handles already.
fn map_texture_id(managed: &HashMap<u64, TextureHandle>, id: egui::TextureId) -> TextureHandle {
    match id {
        egui::TextureId::Managed(0) => FONT_TEXTURE_HANDLE,
        egui::TextureId::Managed(m) => managed.get(&m).copied().unwrap_or(FONT_TEXTURE_HANDLE),
        egui::TextureId::User(handle) => handle,
    }
}

/// Flatten an egui image into tightly packed RGBA8 bytes.
fn image_bytes(image: &egui::ImageData) -> (Vec<u8>, u32, u32) {
    match image {
        egui::ImageData::Color(color) => {
            let bytes = color
                .pixels
                .iter()
                .flat_map(|c| c.to_array())
                .collect::<Vec<u8>>();
            (bytes, color.size[0] as u32, color.size[1] as u32)
        }
        egui::ImageData::Font(font) => {
            let bytes = font
                .srgba_pixels(None)
                .flat_map(|c| c.to_array())
                .collect::<Vec<u8>>();
            (bytes, font.size[0] as u32, font.size[1] as u32)
        }
    }
}

fn sampling_from_options(options: &egui::TextureOptions) -> SamplingMode {
    match options.magnification {
        egui::TextureFilter::Nearest => SamplingMode::Point,
        egui::TextureFilter::Linear => SamplingMode::Linear,
    }
}

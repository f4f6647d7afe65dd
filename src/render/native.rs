use std::collections::HashMap;

use anyhow::{Context, Result};
use bytemuck::{Pod, Zeroable};
use log::{debug, warn};
use wgpu::util::DeviceExt;

use super::{GeometryHandle, GpuBackend, MaterialHandle, ResourceCounts, TextureHandle};
use crate::scene_graph::{Geometry, Material, TextureData};

/// GPU backend that keeps every handle backed by real wgpu objects.
///
/// The backend is headless: it owns a device and queue but no surface, so the
/// stage can stay resident on the GPU while presentation lives elsewhere.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_name: String,
    next_id: u64,
    geometries: HashMap<GeometryHandle, MeshBuffers>,
    textures: HashMap<TextureHandle, wgpu::Texture>,
    materials: HashMap<MaterialHandle, wgpu::Buffer>,
}

impl WgpuBackend {
    /// Requests an adapter and device without a compatible surface.
    pub async fn new() -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;
        let adapter_name = adapter.get_info().name;

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("stage-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter
            .request_device(&device_descriptor)
            .await
            .context("failed to create GPU device")?;

        debug!("created wgpu device on {adapter_name}");
        Ok(Self {
            device,
            queue,
            adapter_name,
            next_id: 0,
            geometries: HashMap::new(),
            textures: HashMap::new(),
            materials: HashMap::new(),
        })
    }

    /// Blocking variant of [`WgpuBackend::new`].
    pub fn headless() -> Result<Self> {
        pollster::block_on(Self::new())
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for WgpuBackend {
    fn create_geometry(&mut self, label: &str, geometry: &Geometry) -> GeometryHandle {
        let handle = GeometryHandle(self.allocate());
        let buffers = MeshBuffers::from_geometry(&self.device, geometry, label);
        self.geometries.insert(handle, buffers);
        handle
    }

    fn create_texture(&mut self, label: &str, texture: &TextureData) -> TextureHandle {
        let handle = TextureHandle(self.allocate());
        let upload = TextureUpload::new(texture, self.device.limits().max_texture_dimension_2d);
        let gpu_texture = self.device.create_texture_with_data(
            &self.queue,
            &wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: upload.width,
                    height: upload.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &upload.pixels,
        );
        self.textures.insert(handle, gpu_texture);
        handle
    }

    fn create_material(
        &mut self,
        label: &str,
        material: &Material,
        texture: Option<TextureHandle>,
    ) -> MaterialHandle {
        let handle = MaterialHandle(self.allocate());
        let uniform = MaterialUniform::new(material, texture.is_some());
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{label}-material")),
                contents: bytemuck::bytes_of(&uniform),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        self.materials.insert(handle, buffer);
        handle
    }

    fn release_geometry(&mut self, handle: GeometryHandle) {
        match self.geometries.remove(&handle) {
            Some(buffers) => {
                buffers.vertex.destroy();
                buffers.index.destroy();
            }
            None => warn!("release of unknown geometry {handle:?}"),
        }
    }

    fn release_texture(&mut self, handle: TextureHandle) {
        match self.textures.remove(&handle) {
            Some(texture) => texture.destroy(),
            None => warn!("release of unknown texture {handle:?}"),
        }
    }

    fn release_material(&mut self, handle: MaterialHandle) {
        match self.materials.remove(&handle) {
            Some(buffer) => buffer.destroy(),
            None => warn!("release of unknown material {handle:?}"),
        }
    }

    fn live_resources(&self) -> ResourceCounts {
        ResourceCounts {
            geometries: self.geometries.len(),
            textures: self.textures.len(),
            materials: self.materials.len(),
        }
    }
}

struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
}

impl MeshBuffers {
    fn from_geometry(device: &wgpu::Device, geometry: &Geometry, label: &str) -> Self {
        let vertices = interleave_vertices(geometry);
        // wgpu rejects zero sized buffers with mapped contents
        let indices = if geometry.indices.is_empty() {
            vec![0u32]
        } else {
            geometry.indices.clone()
        };
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertex, index }
    }
}

/// Lays vertices out as `position.xyz` followed by `normal.xyz`.
fn interleave_vertices(geometry: &Geometry) -> Vec<f32> {
    let mut vertices = Vec::with_capacity(geometry.positions.len().max(1) * 6);
    for (i, position) in geometry.positions.iter().enumerate() {
        let normal = geometry.normals.get(i).copied().unwrap_or_default();
        vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z,
        ]);
    }
    if vertices.is_empty() {
        vertices.resize(6, 0.0);
    }
    vertices
}

/// Texel data as it is handed to the device.
///
/// Images larger than the device allows are replaced by a single white texel
/// so the material still renders, untextured.
#[derive(Debug, PartialEq)]
struct TextureUpload {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl TextureUpload {
    fn new(texture: &TextureData, max_dimension: u32) -> Self {
        let width = texture.width.max(1);
        let height = texture.height.max(1);
        if width > max_dimension || height > max_dimension {
            warn!(
                "texture {} is {width}x{height}, over the device limit of {max_dimension}; uploading a blank texel",
                texture.name
            );
            return Self {
                width: 1,
                height: 1,
                pixels: vec![255; 4],
            };
        }
        let mut pixels = texture.rgba.clone();
        pixels.resize(width as usize * height as usize * 4, 255);
        Self {
            width,
            height,
            pixels,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct MaterialUniform {
    base_color: [f32; 4],
    emissive: [f32; 4],
    flags: [u32; 4],
}

impl MaterialUniform {
    const WIREFRAME: u32 = 1;
    const TEXTURED: u32 = 1 << 1;

    fn new(material: &Material, textured: bool) -> Self {
        let mut flags = 0;
        if material.wireframe {
            flags |= Self::WIREFRAME;
        }
        if textured {
            flags |= Self::TEXTURED;
        }
        Self {
            base_color: material.base_color.into(),
            emissive: material.emissive.extend(material.emissive_intensity).into(),
            flags: [flags, 0, 0, 0],
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::{Vec3, Vec4};

    use super::*;

    #[test]
    fn interleaves_positions_and_normals() {
        let geometry = Geometry::new(
            vec![Vec3::new(1.0, 2.0, 3.0)],
            vec![Vec3::new(0.0, 1.0, 0.0)],
            vec![0],
        );
        assert_eq!(
            interleave_vertices(&geometry),
            vec![1.0, 2.0, 3.0, 0.0, 1.0, 0.0]
        );
    }

    #[test]
    fn empty_geometry_still_yields_a_vertex() {
        assert_eq!(interleave_vertices(&Geometry::default()).len(), 6);
    }

    #[test]
    fn texture_upload_pads_short_pixel_data() {
        let texture = TextureData::new("skin", 2, 1, vec![10, 20, 30, 40]);
        let upload = TextureUpload::new(&texture, 8192);
        assert_eq!((upload.width, upload.height), (2, 1));
        assert_eq!(upload.pixels, vec![10, 20, 30, 40, 255, 255, 255, 255]);
    }

    #[test]
    fn oversized_texture_is_replaced_by_a_blank_texel() {
        let texture = TextureData::new("poster", 16384, 4, Vec::new());
        let upload = TextureUpload::new(&texture, 8192);
        assert_eq!((upload.width, upload.height), (1, 1));
        assert_eq!(upload.pixels, vec![255; 4]);

        let tall = TextureData::new("banner", 4, 8193, Vec::new());
        assert_eq!(TextureUpload::new(&tall, 8192).width, 1);

        let at_limit = TextureData::new("edge", 8192, 1, Vec::new());
        assert_eq!(TextureUpload::new(&at_limit, 8192).width, 8192);
    }

    #[test]
    fn material_uniform_packs_flags_and_emissive_intensity() {
        let mut material = Material::new("ghost", Vec4::new(1.0, 0.0, 0.0, 1.0));
        material.wireframe = true;
        material.emissive = Vec3::new(1.0, 0.0, 0.0);
        material.emissive_intensity = 0.5;
        let uniform = MaterialUniform::new(&material, true);
        assert_eq!(uniform.flags[0], MaterialUniform::WIREFRAME | MaterialUniform::TEXTURED);
        assert_eq!(uniform.emissive, [1.0, 0.0, 0.0, 0.5]);
    }
}

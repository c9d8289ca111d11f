use bytemuck::{Pod, Zeroable};
use glam::{EulerRot, Mat4, Vec3};
use palette::{LinSrgb, Srgb};
use wgpu::util::DeviceExt;

use super::texture::GpuTexture;
use super::wood::{WOOD_TEXTURE_SIZE, wood_planks};
use crate::events::Rotation;
use crate::frame::{CameraFit, FrameDimensions, FrameTick, fit_camera};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const KEY_LIGHT_POSITION: [f32; 3] = [1.2, 1.4, 2.5];
const KEY_LIGHT_INTENSITY: f32 = 0.9;
const RIM_LIGHT_POSITION: [f32; 3] = [-1.5, -0.4, -1.0];
const RIM_LIGHT_INTENSITY: f32 = 0.35;
const AMBIENT_INTENSITY: f32 = 0.35;

const SIDE_COLOR: [u8; 3] = [0xd8, 0xc7, 0xa6];
const BACK_COLOR: [u8; 3] = [0xd2, 0xc2, 0xa5];
const RIM_COLOR: [u8; 3] = [0xff, 0xf6, 0xe0];

const SIDE_INDICES: std::ops::Range<u32> = 0..24;
const BACK_INDICES: std::ops::Range<u32> = 30..36;
const PLANE_INDICES: std::ops::Range<u32> = 0..6;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct SceneUniforms {
    view_proj: [[f32; 4]; 4],
    key_dir: [f32; 4],
    key_color: [f32; 4],
    rim_dir: [f32; 4],
    rim_color: [f32; 4],
    ambient: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MaterialUniforms {
    model: [[f32; 4]; 4],
    color: [f32; 4],
    flags: [f32; 4],
}

fn linear(rgb: [u8; 3]) -> [f32; 3] {
    let color: Srgb<f32> = Srgb::new(rgb[0], rgb[1], rgb[2]).into_format();
    let lin: LinSrgb<f32> = color.into_linear();
    [lin.red, lin.green, lin.blue]
}

fn face(center: Vec3, normal: Vec3, u: Vec3, v: Vec3, half_u: f32, half_v: f32) -> [MeshVertex; 4] {
    let corner = |su: f32, sv: f32, uv: [f32; 2]| MeshVertex {
        position: (center + u * (su * half_u) + v * (sv * half_v)).to_array(),
        normal: normal.to_array(),
        uv,
    };
    [
        corner(-1.0, 1.0, [0.0, 0.0]),
        corner(1.0, 1.0, [1.0, 0.0]),
        corner(1.0, -1.0, [1.0, 1.0]),
        corner(-1.0, -1.0, [0.0, 1.0]),
    ]
}

/// Box faces in order +x, -x, +y, -y (wood sides), +z (front), -z (back).
pub fn box_vertices(dims: FrameDimensions) -> Vec<MeshVertex> {
    let (hw, hh, hd) = (dims.width / 2.0, dims.height / 2.0, dims.depth / 2.0);
    let faces = [
        face(Vec3::new(hw, 0.0, 0.0), Vec3::X, Vec3::NEG_Z, Vec3::Y, hd, hh),
        face(Vec3::new(-hw, 0.0, 0.0), Vec3::NEG_X, Vec3::Z, Vec3::Y, hd, hh),
        face(Vec3::new(0.0, hh, 0.0), Vec3::Y, Vec3::X, Vec3::NEG_Z, hw, hd),
        face(Vec3::new(0.0, -hh, 0.0), Vec3::NEG_Y, Vec3::X, Vec3::Z, hw, hd),
        face(Vec3::new(0.0, 0.0, hd), Vec3::Z, Vec3::X, Vec3::Y, hw, hh),
        face(Vec3::new(0.0, 0.0, -hd), Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y, hw, hh),
    ];
    faces.into_iter().flatten().collect()
}

pub fn box_indices() -> Vec<u16> {
    (0..6u16)
        .flat_map(|f| {
            let b = f * 4;
            [b, b + 1, b + 2, b, b + 2, b + 3]
        })
        .collect()
}

/// Index list for a single face-plane quad.
pub fn plane_indices() -> Vec<u16> {
    let mut indices = box_indices();
    indices.truncate(PLANE_INDICES.end as usize);
    indices
}

/// Face-plane quad centred on the origin; placed in front of the box by its model matrix.
pub fn plane_vertices(dims: FrameDimensions) -> Vec<MeshVertex> {
    face(
        Vec3::ZERO,
        Vec3::Z,
        Vec3::X,
        Vec3::Y,
        dims.width / 2.0,
        dims.height / 2.0,
    )
    .to_vec()
}

pub fn group_transform(rotation: Rotation) -> Mat4 {
    Mat4::from_euler(EulerRot::XYZ, rotation.x, rotation.y, 0.0)
}

pub fn view_projection(fov_deg: f32, viewport_aspect: f32, fit: CameraFit) -> Mat4 {
    let proj = Mat4::perspective_rh(fov_deg.to_radians(), viewport_aspect, fit.near, fit.far);
    let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, fit.distance), Vec3::ZERO, Vec3::Y);
    proj * view
}

pub fn effective_anisotropy(requested: u16, supported: bool) -> u16 {
    if supported { requested.clamp(1, 16) } else { 1 }
}

#[derive(Debug, Clone, Copy)]
pub struct SceneSettings {
    pub fov_deg: f32,
    pub fit_margin: f32,
    pub anisotropy: u16,
}

/// Uniform buffer plus bind group for one drawn material.
struct MaterialSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    texture_id: u64,
}

impl MaterialSlot {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        texture: &GpuTexture,
        label: &str,
    ) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<MaterialUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = Self::bind(device, layout, sampler, &buffer, texture);
        Self {
            buffer,
            bind_group,
            texture_id: texture.id(),
        }
    }

    fn bind(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        buffer: &wgpu::Buffer,
        texture: &GpuTexture,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame-material-bind-group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(texture.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn rebind_if_changed(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        texture: &GpuTexture,
    ) {
        if self.texture_id == texture.id() {
            return;
        }
        self.bind_group = Self::bind(device, layout, sampler, &self.buffer, texture);
        self.texture_id = texture.id();
    }

    fn write(&self, queue: &wgpu::Queue, model: Mat4, color: [f32; 4], use_map: bool, lit: bool) {
        let uniforms = MaterialUniforms {
            model: model.to_cols_array_2d(),
            color,
            flags: [
                if use_map { 1.0 } else { 0.0 },
                if lit { 1.0 } else { 0.0 },
                0.0,
                0.0,
            ],
        };
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&uniforms));
    }
}

struct PlaneState {
    slot: MaterialSlot,
    opacity: f32,
    has_map: bool,
}

/// GPU projection of the frame: box mesh, two face planes, camera and lights.
/// Everything here is rebuilt from scratch after a context loss.
pub struct FrameScene {
    settings: SceneSettings,
    lit_pipeline: wgpu::RenderPipeline,
    plane_pipeline: wgpu::RenderPipeline,
    scene_buffer: wgpu::Buffer,
    scene_bind_group: wgpu::BindGroup,
    material_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    box_vertices: wgpu::Buffer,
    box_indices: wgpu::Buffer,
    plane_vertices: wgpu::Buffer,
    plane_indices: wgpu::Buffer,
    placeholder: GpuTexture,
    _wood: GpuTexture,
    sides: MaterialSlot,
    back: MaterialSlot,
    current: PlaneState,
    next: PlaneState,
    depth_view: wgpu::TextureView,
    dimensions: FrameDimensions,
    viewport: (u32, u32),
    camera: CameraFit,
}

impl FrameScene {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        settings: SceneSettings,
        viewport: (u32, u32),
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frame-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("frame.wgsl").into()),
        });

        let scene_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-scene-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("frame-material-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("frame-pipeline-layout"),
            bind_group_layouts: &[&scene_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |label: &str,
                        entry: &str,
                        blend: wgpu::BlendState,
                        depth_write: bool,
                        compare: wgpu::CompareFunction| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some(entry),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    unclipped_depth: false,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    conservative: false,
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: compare,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };
        let lit_pipeline = pipeline(
            "frame-lit-pipeline",
            "fs_lit",
            wgpu::BlendState::REPLACE,
            true,
            wgpu::CompareFunction::Less,
        );
        // Face planes ignore depth and rely on draw order.
        let plane_pipeline = pipeline(
            "frame-plane-pipeline",
            "fs_plane",
            wgpu::BlendState::ALPHA_BLENDING,
            false,
            wgpu::CompareFunction::Always,
        );

        let scene_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame-scene-uniform"),
            size: std::mem::size_of::<SceneUniforms>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let scene_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("frame-scene-bind-group"),
            layout: &scene_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: scene_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("frame-image-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            anisotropy_clamp: settings.anisotropy.max(1),
            ..Default::default()
        });

        let dimensions = FrameDimensions::default();
        let box_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame-box-vertices"),
            contents: bytemuck::cast_slice(&box_vertices(dimensions)),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let box_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame-box-indices"),
            contents: bytemuck::cast_slice(&box_indices()),
            usage: wgpu::BufferUsages::INDEX,
        });
        let plane_vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame-plane-vertices"),
            contents: bytemuck::cast_slice(&plane_vertices(dimensions)),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let plane_index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("frame-plane-indices"),
            contents: bytemuck::cast_slice(&plane_indices()),
            usage: wgpu::BufferUsages::INDEX,
        });

        let placeholder = GpuTexture::placeholder(device, queue);
        let wood_image = wood_planks(WOOD_TEXTURE_SIZE);
        let wood = GpuTexture::from_rgba(
            device,
            queue,
            "frame-wood-planks",
            WOOD_TEXTURE_SIZE,
            WOOD_TEXTURE_SIZE,
            wood_image.as_raw(),
        );

        let slot = |texture: &GpuTexture, label: &str| {
            MaterialSlot::new(device, &material_layout, &sampler, texture, label)
        };
        let sides = slot(&placeholder, "frame-sides-material");
        let back = slot(&wood, "frame-back-material");
        let current = PlaneState {
            slot: slot(&placeholder, "frame-current-plane-material"),
            opacity: 1.0,
            has_map: false,
        };
        let next = PlaneState {
            slot: slot(&placeholder, "frame-next-plane-material"),
            opacity: 0.0,
            has_map: false,
        };

        let viewport = (viewport.0.max(1), viewport.1.max(1));
        let depth_view = create_depth_view(device, viewport);
        let camera = fit_camera(
            settings.fov_deg,
            viewport.0 as f32 / viewport.1 as f32,
            dimensions.width,
            dimensions.height,
            settings.fit_margin,
        );

        Self {
            settings,
            lit_pipeline,
            plane_pipeline,
            scene_buffer,
            scene_bind_group,
            material_layout,
            sampler,
            box_vertices,
            box_indices: box_index_buffer,
            plane_vertices,
            plane_indices: plane_index_buffer,
            placeholder,
            _wood: wood,
            sides,
            back,
            current,
            next,
            depth_view,
            dimensions,
            viewport,
            camera,
        }
    }

    pub fn camera(&self) -> CameraFit {
        self.camera
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        self.depth_view = create_depth_view(device, self.viewport);
        self.refit_camera();
    }

    fn refit_camera(&mut self) {
        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
        self.camera = fit_camera(
            self.settings.fov_deg,
            aspect,
            self.dimensions.width,
            self.dimensions.height,
            self.settings.fit_margin,
        );
    }

    /// Pushes the frame state for this tick into GPU buffers and bind groups.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        dimensions: FrameDimensions,
        current: Option<&GpuTexture>,
        next: Option<&GpuTexture>,
        tick: &FrameTick,
    ) {
        if dimensions != self.dimensions {
            self.dimensions = dimensions;
            queue.write_buffer(
                &self.box_vertices,
                0,
                bytemuck::cast_slice(&box_vertices(dimensions)),
            );
            queue.write_buffer(
                &self.plane_vertices,
                0,
                bytemuck::cast_slice(&plane_vertices(dimensions)),
            );
            self.refit_camera();
        }

        let aspect = self.viewport.0 as f32 / self.viewport.1 as f32;
        let rim = linear(RIM_COLOR);
        let uniforms = SceneUniforms {
            view_proj: view_projection(self.settings.fov_deg, aspect, self.camera)
                .to_cols_array_2d(),
            key_dir: Vec3::from(KEY_LIGHT_POSITION).extend(0.0).to_array(),
            key_color: [KEY_LIGHT_INTENSITY, KEY_LIGHT_INTENSITY, KEY_LIGHT_INTENSITY, 1.0],
            rim_dir: Vec3::from(RIM_LIGHT_POSITION).extend(0.0).to_array(),
            rim_color: [
                rim[0] * RIM_LIGHT_INTENSITY,
                rim[1] * RIM_LIGHT_INTENSITY,
                rim[2] * RIM_LIGHT_INTENSITY,
                1.0,
            ],
            ambient: [AMBIENT_INTENSITY, 0.0, 0.0, 0.0],
        };
        queue.write_buffer(&self.scene_buffer, 0, bytemuck::bytes_of(&uniforms));

        let group = group_transform(tick.rotation);
        let side = linear(SIDE_COLOR);
        let back = linear(BACK_COLOR);
        self.sides
            .write(queue, group, [side[0], side[1], side[2], 1.0], false, true);
        self.back
            .write(queue, group, [back[0], back[1], back[2], 1.0], true, true);

        let planes = [
            (&mut self.current, current, tick.current_opacity, dimensions.current_plane_z()),
            (&mut self.next, next, tick.next_opacity, dimensions.next_plane_z()),
        ];
        for (plane, texture, opacity, z) in planes {
            let bound = texture.unwrap_or(&self.placeholder);
            plane
                .slot
                .rebind_if_changed(device, &self.material_layout, &self.sampler, bound);
            plane.opacity = opacity;
            plane.has_map = texture.is_some();
            let model = group * Mat4::from_translation(Vec3::new(0.0, 0.0, z));
            plane
                .slot
                .write(queue, model, [1.0, 1.0, 1.0, opacity], plane.has_map, false);
        }
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        background: wgpu::Color,
    ) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(background),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        pass.set_bind_group(0, &self.scene_bind_group, &[]);

        pass.set_pipeline(&self.lit_pipeline);
        pass.set_vertex_buffer(0, self.box_vertices.slice(..));
        pass.set_index_buffer(self.box_indices.slice(..), wgpu::IndexFormat::Uint16);
        pass.set_bind_group(1, &self.sides.bind_group, &[]);
        pass.draw_indexed(SIDE_INDICES, 0, 0..1);
        pass.set_bind_group(1, &self.back.bind_group, &[]);
        pass.draw_indexed(BACK_INDICES, 0, 0..1);

        pass.set_pipeline(&self.plane_pipeline);
        pass.set_vertex_buffer(0, self.plane_vertices.slice(..));
        pass.set_index_buffer(self.plane_indices.slice(..), wgpu::IndexFormat::Uint16);
        for plane in [&self.current, &self.next] {
            if !plane.has_map || plane.opacity <= 0.0 {
                continue;
            }
            pass.set_bind_group(1, &plane.slot.bind_group, &[]);
            pass.draw_indexed(PLANE_INDICES, 0, 0..1);
        }
    }
}

fn create_depth_view(device: &wgpu::Device, (width, height): (u32, u32)) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame-depth"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_spans_frame_dimensions() {
        let dims = FrameDimensions::for_aspect(1.5);
        let verts = box_vertices(dims);
        assert_eq!(verts.len(), 24);
        let max = |axis: usize| {
            verts
                .iter()
                .map(|v| v.position[axis])
                .fold(f32::MIN, f32::max)
        };
        assert!((max(0) - dims.width / 2.0).abs() < 1e-6);
        assert!((max(1) - dims.height / 2.0).abs() < 1e-6);
        assert!((max(2) - dims.depth / 2.0).abs() < 1e-6);
    }

    #[test]
    fn index_ranges_cover_expected_faces() {
        let indices = box_indices();
        assert_eq!(indices.len(), 36);
        let verts = box_vertices(FrameDimensions::default());
        let back = &indices[BACK_INDICES.start as usize..BACK_INDICES.end as usize];
        assert!(back.iter().all(|&i| verts[i as usize].normal == [0.0, 0.0, -1.0]));
        let sides = &indices[SIDE_INDICES.start as usize..SIDE_INDICES.end as usize];
        assert!(sides.iter().all(|&i| verts[i as usize].normal[2] == 0.0));
    }

    #[test]
    fn plane_indices_draw_one_quad() {
        let indices = plane_indices();
        assert_eq!(indices.len(), PLANE_INDICES.end as usize);
        let verts = plane_vertices(FrameDimensions::default());
        assert!(indices.iter().all(|&i| (i as usize) < verts.len()));
    }

    #[test]
    fn plane_faces_the_camera() {
        let verts = plane_vertices(FrameDimensions::default());
        assert!(verts.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert!(verts.iter().all(|v| v.position[2] == 0.0));
    }

    #[test]
    fn fitted_frame_lands_inside_clip_space() {
        let dims = FrameDimensions::for_aspect(0.75);
        let fit = fit_camera(24.0, 16.0 / 9.0, dims.width, dims.height, 1.35);
        let vp = view_projection(24.0, 16.0 / 9.0, fit);
        for v in box_vertices(dims) {
            let clip = vp * Vec3::from(v.position).extend(1.0);
            let ndc = clip.truncate() / clip.w;
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0);
            assert!((0.0..=1.0).contains(&ndc.z));
        }
    }

    #[test]
    fn anisotropy_falls_back_without_support() {
        assert_eq!(effective_anisotropy(3, true), 3);
        assert_eq!(effective_anisotropy(64, true), 16);
        assert_eq!(effective_anisotropy(3, false), 1);
    }
}

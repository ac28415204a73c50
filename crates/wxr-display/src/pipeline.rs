//! The per-radar display pipeline: owns the GPU-side resources (texture
//! pairs, vertex/uniform buffers, render pipeline) and splits each frame
//! into `prepare` (buffer writes, outside any render pass) and `draw`
//! (inside the host's pass). Foreground-thread only; the simulation
//! worker never touches any of this.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use wgpu::util::DeviceExt;

use wxr_core::{Radar, SampleGrid};

use crate::geometry::{DrawRect, MeshCache, Projection, ScanVertex};
use crate::upload::ScanTextures;
use crate::TEX_FRESH_INTERVAL;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ScanUniform {
    screen: [f32; 2],
    tex_size: [f32; 2],
    smear: [f32; 2],
    _pad: [f32; 2],
}

/// Per-frame draw parameters from the host.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams {
    /// Instrument rectangle in screen pixels, y up.
    pub rect: DrawRect,
    /// Render-target size in pixels.
    pub screen: Vec2,
}

struct Layer {
    textures: ScanTextures,
    binds: [wgpu::BindGroup; 2],
    bound: usize,
}

impl Layer {
    fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        uniform: &wgpu::Buffer,
        sampler: &wgpu::Sampler,
        res_x: u32,
        res_y: u32,
        label: &str,
    ) -> Self {
        let textures = ScanTextures::new(device, res_x, res_y, TEX_FRESH_INTERVAL, label);
        let bind = |slot: usize| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{label} bind #{slot}")),
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniform.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(textures.view(slot)),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            })
        };
        let binds = [bind(0), bind(1)];
        Self {
            textures,
            binds,
            bound: 0,
        }
    }
}

/// The radar scan display. One instance per radar.
pub struct DisplayPipeline {
    pipeline: wgpu::RenderPipeline,
    uniform: wgpu::Buffer,
    vertices: wgpu::Buffer,
    vertex_count: u32,
    mesh: MeshCache,
    scan: Layer,
    shadow: Layer,
}

impl DisplayPipeline {
    /// Builds the pipeline against the host's render-target format. The
    /// radar's resolution and scan angle fix the texture and worst-case
    /// vertex-buffer sizes up front.
    pub fn new(device: &wgpu::Device, target_fmt: wgpu::TextureFormat, radar: &Radar) -> Self {
        let conf = radar.config();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/scan.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/scan.wgsl").into()),
        });

        let bind_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Scan Bind Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<ScanUniform>() as u64
                        ),
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

        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Scan Uniform"),
            contents: bytemuck::bytes_of(&ScanUniform {
                screen: [1.0, 1.0],
                tex_size: [conf.res_y as f32, conf.res_x as f32],
                smear: [conf.smear.x as f32, conf.smear.y as f32],
                _pad: [0.0, 0.0],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let vertices = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Scan Vertex Buffer"),
            size: (MeshCache::max_vertices(conf.scan_angle)
                * std::mem::size_of::<ScanVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Scan Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scan PipelineLayout"),
            bind_group_layouts: &[&bind_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scan Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<ScanVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            shader_location: 0,
                            offset: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            shader_location: 1,
                            offset: 8,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: target_fmt,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        let scan = Layer::new(
            device, &bind_layout, &uniform, &sampler,
            conf.res_x, conf.res_y, "Scan Texture",
        );
        let shadow = Layer::new(
            device, &bind_layout, &uniform, &sampler,
            conf.res_x, conf.res_y, "Shadow Texture",
        );

        Self {
            pipeline,
            uniform,
            vertices,
            vertex_count: 0,
            mesh: MeshCache::new(),
            scan,
            shadow,
        }
    }

    /// Per-frame update, to be called outside any render pass: runs both
    /// layers' upload clocks against the radar's sample grid, refreshes
    /// the cached mesh and the uniform. Never blocks on the GPU.
    pub fn prepare(
        &mut self,
        queue: &wgpu::Queue,
        radar: &Radar,
        params: FrameParams,
    ) {
        let grid: &SampleGrid = radar.grid();
        self.scan.bound = self
            .scan
            .textures
            .refresh(queue, |staging| grid.snapshot_colors(staging));
        self.shadow.bound = self
            .shadow
            .textures
            .refresh(queue, |staging| grid.snapshot_shadow(staging));

        let conf = radar.config();
        let projection = if radar.vert_mode() || conf.disp_type == wxr_core::DisplayType::Square {
            Projection::Rect
        } else {
            Projection::Arc
        };
        if self.mesh.update(params.rect, projection, conf.scan_angle) {
            queue.write_buffer(&self.vertices, 0, bytemuck::cast_slice(self.mesh.vertices()));
            self.vertex_count = self.mesh.vertices().len() as u32;
        }

        queue.write_buffer(
            &self.uniform,
            0,
            bytemuck::bytes_of(&ScanUniform {
                screen: params.screen.into(),
                tex_size: [conf.res_y as f32, conf.res_x as f32],
                smear: [conf.smear.x as f32, conf.smear.y as f32],
                _pad: [0.0, 0.0],
            }),
        );
    }

    /// Draws the scan image and, on top of it, the terrain-shadow overlay
    /// with the same mesh.
    pub fn draw<'a>(&'a self, rpass: &mut wgpu::RenderPass<'a>) {
        if self.vertex_count == 0 {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_vertex_buffer(0, self.vertices.slice(..));

        rpass.set_bind_group(0, &self.scan.binds[self.scan.bound], &[]);
        rpass.draw(0..self.vertex_count, 0..1);

        rpass.set_bind_group(0, &self.shadow.binds[self.shadow.bound], &[]);
        rpass.draw(0..self.vertex_count, 0..1);
    }
}

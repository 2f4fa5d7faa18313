// crates/vireo-render/src/batch.rs
//
// Fixed-capacity single-material quad batcher for video sprites. One draw
// call per batch; a batch ends when the scene ends, the index budget is
// spent, or the texture slot table fills up.
//
// Slot 0 is permanently a 1x1 white texture. Live video textures occupy
// slots 1..32, keyed by renderer id; a newly decoded frame carries a new id
// and therefore lands in a new slot, which keeps batches one scene long by
// construction.

use std::num::NonZeroU32;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3, Vec4};
use wgpu::util::DeviceExt;

use vireo_core::{Transform, VideoData, VideoRendererComponent};

use crate::gpu::GpuContext;
use crate::playback::{self, PlaybackMode};
use crate::texture::VideoTexture;

pub const MAX_QUADS: u32 = 20_000;
pub const MAX_VERTICES: u32 = MAX_QUADS * 4;
pub const MAX_INDICES: u32 = MAX_QUADS * 6;
pub const MAX_TEXTURE_SLOTS: usize = 32;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct VideoVertex {
    position:      [f32; 3],
    color:         [f32; 4],
    tex_coord:     [f32; 2],
    tiling_factor: [f32; 2],
    tex_index:     f32,
    saturation:    f32,
    entity_id:     i32,
}

const QUAD_POSITIONS: [Vec4; 4] = [
    Vec4::new(-0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, -0.5, 0.0, 1.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
    Vec4::new(-0.5, 0.5, 0.0, 1.0),
];

const TEX_COORDS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

/// Pre-fill the repeating `{0,1,2, 2,3,0}` index pattern over `max_quads`
/// quads.
fn quad_indices(max_quads: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(max_quads as usize * 6);
    for quad in 0..max_quads {
        let offset = quad * 4;
        indices.extend_from_slice(&[
            offset,
            offset + 1,
            offset + 2,
            offset + 2,
            offset + 3,
            offset,
        ]);
    }
    indices
}

/// Occupied slot index for `renderer_id`, ignoring the white slot.
fn find_slot_index(slot_ids: &[u32], renderer_id: u32) -> Option<usize> {
    slot_ids
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, &id)| id == renderer_id)
        .map(|(i, _)| i)
}

/// World position of a billboard quad corner: the quad's local axes are
/// rebuilt from the camera view's right/up rows so it always faces the
/// camera.
fn billboard_corner(camera_view: &Mat4, translation: Vec3, scale: Vec3, corner: Vec2) -> Vec3 {
    let cam_right = Vec3::new(
        camera_view.x_axis.x,
        camera_view.y_axis.x,
        camera_view.z_axis.x,
    );
    let cam_up = Vec3::new(
        camera_view.x_axis.y,
        camera_view.y_axis.y,
        camera_view.z_axis.y,
    );
    translation + cam_right * corner.x * scale.x + cam_up * corner.y * scale.y
}

struct TextureSlot {
    renderer_id: u32,
    view:        Arc<wgpu::TextureView>,
    sampler:     Arc<wgpu::Sampler>,
}

/// Batched video sprite renderer.
///
/// The device must expose `TEXTURE_BINDING_ARRAY` and
/// `SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING`: the
/// fragment shader indexes a 32-entry texture binding array by a per-vertex
/// slot index.
pub struct VideoBatchRenderer {
    pipeline:      wgpu::RenderPipeline,
    vertex_buffer: wgpu::Buffer,
    index_buffer:  wgpu::Buffer,

    camera_buffer:     wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    texture_layout:    wgpu::BindGroupLayout,

    white_view:    Arc<wgpu::TextureView>,
    white_sampler: Arc<wgpu::Sampler>,

    vertices:    Vec<VideoVertex>,
    index_count: u32,
    slots:       Vec<TextureSlot>,

    camera_view: Mat4,
}

impl VideoBatchRenderer {
    pub fn new(ctx: &GpuContext, target_format: wgpu::TextureFormat) -> Self {
        let shader = ctx
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("vireo.video_quad_shader"),
                source: wgpu::ShaderSource::Wgsl(
                    include_str!("shaders/video_quad.wgsl").into(),
                ),
            });

        let camera_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("vireo.camera_bind_group_layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let texture_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("vireo.video_texture_bind_group_layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            multisampled: false,
                            view_dimension: wgpu::TextureViewDimension::D2,
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        },
                        count: NonZeroU32::new(MAX_TEXTURE_SLOTS as u32),
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: NonZeroU32::new(MAX_TEXTURE_SLOTS as u32),
                    },
                ],
            });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("vireo.video_pipeline_layout"),
                bind_group_layouts: &[&camera_layout, &texture_layout],
                push_constant_ranges: &[],
            });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<VideoVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
                wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x4 },
                wgpu::VertexAttribute { offset: 28, shader_location: 2, format: wgpu::VertexFormat::Float32x2 },
                wgpu::VertexAttribute { offset: 36, shader_location: 3, format: wgpu::VertexFormat::Float32x2 },
                wgpu::VertexAttribute { offset: 44, shader_location: 4, format: wgpu::VertexFormat::Float32 },
                wgpu::VertexAttribute { offset: 48, shader_location: 5, format: wgpu::VertexFormat::Float32 },
                wgpu::VertexAttribute { offset: 52, shader_location: 6, format: wgpu::VertexFormat::Sint32 },
            ],
        };

        let pipeline = ctx
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("vireo.video_pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: "vs_main",
                    buffers: &[vertex_layout],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: target_format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

        let vertex_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vireo.video_vertex_buffer"),
            size: MAX_VERTICES as u64 * std::mem::size_of::<VideoVertex>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let indices = quad_indices(MAX_QUADS);
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("vireo.video_index_buffer"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let camera_buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("vireo.camera_uniform_buffer"),
            size: std::mem::size_of::<[f32; 16]>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vireo.camera_bind_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        // Slot 0: permanent 1x1 white texture.
        let white_texture = ctx.device.create_texture_with_data(
            &ctx.queue,
            &wgpu::TextureDescriptor {
                label: Some("vireo.white_texture"),
                size: wgpu::Extent3d { width: 1, height: 1, depth_or_array_layers: 1 },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[0xff, 0xff, 0xff, 0xff],
        );
        let white_view = Arc::new(
            white_texture.create_view(&wgpu::TextureViewDescriptor::default()),
        );
        let white_sampler = Arc::new(ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("vireo.white_sampler"),
            ..Default::default()
        }));

        let mut renderer = Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            camera_buffer,
            camera_bind_group,
            texture_layout,
            white_view,
            white_sampler,
            vertices: Vec::with_capacity(MAX_VERTICES as usize),
            index_count: 0,
            slots: Vec::with_capacity(MAX_TEXTURE_SLOTS),
            camera_view: Mat4::IDENTITY,
        };
        renderer.start_batch();
        renderer
    }

    /// Upload the camera and reset the batch for a new scene.
    pub fn begin_scene(&mut self, ctx: &GpuContext, view_projection: Mat4, camera_view: Mat4) {
        let columns = view_projection.to_cols_array();
        ctx.queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&columns));
        self.camera_view = camera_view;
        self.start_batch();
    }

    /// Flush whatever the scene accumulated.
    pub fn end_scene(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        self.flush(ctx, encoder, target);
    }

    fn start_batch(&mut self) {
        self.vertices.clear();
        self.index_count = 0;
        self.slots.clear();
        self.slots.push(TextureSlot {
            renderer_id: 0,
            view:        Arc::clone(&self.white_view),
            sampler:     Arc::clone(&self.white_sampler),
        });
    }

    fn next_batch(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        self.flush(ctx, encoder, target);
        self.start_batch();
    }

    fn flush(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
    ) {
        if self.index_count == 0 {
            return;
        }

        ctx.queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));

        // The binding arrays are fixed-size; unused slots repeat the white
        // texture.
        let mut views: Vec<&wgpu::TextureView> = Vec::with_capacity(MAX_TEXTURE_SLOTS);
        let mut samplers: Vec<&wgpu::Sampler> = Vec::with_capacity(MAX_TEXTURE_SLOTS);
        for slot in &self.slots {
            views.push(slot.view.as_ref());
            samplers.push(slot.sampler.as_ref());
        }
        while views.len() < MAX_TEXTURE_SLOTS {
            views.push(self.white_view.as_ref());
            samplers.push(self.white_sampler.as_ref());
        }

        let texture_bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("vireo.video_texture_bind_group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureViewArray(&views),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::SamplerArray(&samplers),
                },
            ],
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vireo.video_batch_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        pass.set_bind_group(1, &texture_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..self.index_count, 0, 0..1);
    }

    /// Run the playback controller for one sprite, then batch its quad.
    ///
    /// A controller error skips the quad for this draw; the next draw
    /// retries with the previous frame still on screen.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_video_sprite(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        transform: &Transform,
        src: &VideoRendererComponent,
        data: &mut VideoData,
        texture: &mut VideoTexture,
        entity_id: i32,
    ) {
        let advanced = match playback::mode_for(data) {
            PlaybackMode::Play => playback::advance_play(ctx, texture, data),
            PlaybackMode::Stop => playback::reset_stopped(ctx, texture, data),
            PlaybackMode::Scrub => playback::hold_scrub(ctx, texture, data),
        };
        if let Err(e) = advanced {
            log::warn!("[render] video sprite skipped this draw: {e:#}");
            return;
        }

        if self.index_count >= MAX_INDICES {
            self.next_batch(ctx, encoder, target);
        }

        let tex_index = self.assign_slot(ctx, encoder, target, texture);
        self.push_quad(transform, src, data, tex_index, entity_id);
        self.index_count += 6;
    }

    /// Slot for this texture's current frame, allocating (and flushing when
    /// the table is full) as needed.
    fn assign_slot(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        texture: &VideoTexture,
    ) -> f32 {
        let renderer_id = texture.renderer_id();

        let slot_ids: Vec<u32> = self.slots.iter().map(|s| s.renderer_id).collect();
        if let Some(index) = find_slot_index(&slot_ids, renderer_id) {
            return index as f32;
        }

        if self.slots.len() >= MAX_TEXTURE_SLOTS {
            self.next_batch(ctx, encoder, target);
        }

        self.slots.push(TextureSlot {
            renderer_id,
            view:        Arc::clone(texture.view()),
            sampler:     Arc::clone(texture.sampler()),
        });
        (self.slots.len() - 1) as f32
    }

    fn push_quad(
        &mut self,
        transform: &Transform,
        src: &VideoRendererComponent,
        data: &VideoData,
        tex_index: f32,
        entity_id: i32,
    ) {
        let tiling_factor = [1.0, 1.0];

        if data.use_billboard {
            for (corner, tex_coord) in QUAD_POSITIONS.iter().zip(TEX_COORDS) {
                let position = billboard_corner(
                    &self.camera_view,
                    transform.translation,
                    transform.scale,
                    Vec2::new(corner.x, corner.y),
                );
                self.vertices.push(VideoVertex {
                    position: position.to_array(),
                    color: src.color.to_array(),
                    tex_coord,
                    tiling_factor,
                    tex_index,
                    saturation: src.saturation,
                    entity_id,
                });
            }
        } else {
            let matrix = transform.matrix();
            for (corner, tex_coord) in QUAD_POSITIONS.iter().zip(TEX_COORDS) {
                let position = matrix * *corner;
                self.vertices.push(VideoVertex {
                    position: position.truncate().to_array(),
                    color: src.color.to_array(),
                    tex_coord,
                    tiling_factor,
                    tex_index,
                    saturation: src.saturation,
                    entity_id,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_pattern_repeats_per_quad() {
        let indices = quad_indices(3);
        assert_eq!(indices.len(), 18);
        assert_eq!(&indices[0..6], &[0, 1, 2, 2, 3, 0]);
        assert_eq!(&indices[6..12], &[4, 5, 6, 6, 7, 4]);
        assert_eq!(&indices[12..18], &[8, 9, 10, 10, 11, 8]);
    }

    #[test]
    fn slot_lookup_skips_the_white_slot() {
        // Slot 0 holds renderer id 0; a texture with no live frame must not
        // alias the white texture.
        let slot_ids = [0, 7, 12];
        assert_eq!(find_slot_index(&slot_ids, 0), None);
        assert_eq!(find_slot_index(&slot_ids, 7), Some(1));
        assert_eq!(find_slot_index(&slot_ids, 12), Some(2));
        assert_eq!(find_slot_index(&slot_ids, 99), None);
    }

    #[test]
    fn billboard_corners_follow_camera_axes() {
        let corner = billboard_corner(
            &Mat4::IDENTITY,
            Vec3::new(10.0, 20.0, 30.0),
            Vec3::new(2.0, 4.0, 1.0),
            Vec2::new(-0.5, 0.5),
        );
        assert_eq!(corner, Vec3::new(9.0, 22.0, 30.0));
    }

    #[test]
    fn billboard_uses_view_rows_not_columns() {
        // After a 90 degree yaw the camera's world-space right axis is +Z,
        // which is row 0 of the view matrix (not column 0).
        let view = Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let corner = billboard_corner(&view, Vec3::ZERO, Vec3::ONE, Vec2::new(1.0, 0.0));
        assert!((corner - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-6);
    }

    #[test]
    fn overflowing_the_index_budget_forces_a_flush() {
        // Simulate 20_001 sprite submissions without an end_scene.
        let mut index_count = 0u32;
        let mut flushes = 0;
        for _ in 0..(MAX_QUADS + 1) {
            if index_count >= MAX_INDICES {
                flushes += 1;
                index_count = 0;
            }
            index_count += 6;
        }
        assert_eq!(flushes, 1);
        // The straggler quad is present in the final batch.
        assert_eq!(index_count, 6);
    }

    #[test]
    fn vertex_layout_matches_the_pipeline_stride() {
        assert_eq!(std::mem::size_of::<VideoVertex>(), 56);
    }
}

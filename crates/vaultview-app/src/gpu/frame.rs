//! Video frame presentation: upload RGBA frames and blit them to the
//! surface with letterbox/pillarbox fit.

use bytemuck::{Pod, Zeroable};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, BufferBindingType, ColorTargetState,
    CommandEncoder, Device, FragmentState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PrimitiveState, Queue, RenderPipeline, SamplerBindingType, ShaderStages, TextureFormat,
    TextureSampleType, TextureView, TextureViewDimension, VertexState,
};

/// Fullscreen triangle with UVs; the vertex_index trick needs no buffer.
const FULLSCREEN_TRIANGLE_VS: &str = r#"
struct VertexOutput {
    @builtin(position) position: vec4f,
    @location(0) uv: vec2f,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOutput {
    let x = f32(i32(vi & 1u) * 4) - 1.0;
    let y = f32(i32(vi & 2u) * 2) - 1.0;
    var out: VertexOutput;
    out.position = vec4f(x, y, 0.0, 1.0);
    out.uv = vec2f((x + 1.0) * 0.5, (1.0 - y) * 0.5);
    return out;
}
"#;

/// Samples the frame inside the letterboxed region, black outside.
const FRAME_BLIT_FS: &str = r#"
@group(0) @binding(0) var frame_tex: texture_2d<f32>;
@group(0) @binding(1) var frame_samp: sampler;

struct BlitUniforms {
    scale: vec2f,
    offset: vec2f,
}
@group(0) @binding(2) var<uniform> u: BlitUniforms;

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4f {
    let uv = (in.uv - u.offset) / u.scale;
    let inside = all(uv >= vec2f(0.0)) && all(uv <= vec2f(1.0));
    let color = textureSampleLevel(frame_tex, frame_samp, clamp(uv, vec2f(0.0), vec2f(1.0)), 0.0);
    return select(vec4f(0.0, 0.0, 0.0, 1.0), color, inside);
}
"#;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct BlitUniforms {
    scale: [f32; 2],
    offset: [f32; 2],
}

pub struct FramePresenter {
    frame_texture: wgpu::Texture,
    uniform_buffer: wgpu::Buffer,
    pipeline: RenderPipeline,
    bind_group: BindGroup,
    video_width: u32,
    video_height: u32,
}

impl FramePresenter {
    pub fn new(
        device: &Device,
        queue: &Queue,
        surface_format: TextureFormat,
        video_width: u32,
        video_height: u32,
        surface_width: u32,
        surface_height: u32,
    ) -> Self {
        // sRGB frame texture: raw RGBA bytes convert on sample
        let frame_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("video-frame"),
            size: wgpu::Extent3d {
                width: video_width,
                height: video_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let frame_view = frame_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let frame_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("video-sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let uniforms =
            compute_blit_uniforms(video_width, video_height, surface_width, surface_height);
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("blit-uniforms"),
            size: std::mem::size_of::<BlitUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&uniforms));

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("frame-blit-bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: std::num::NonZeroU64::new(
                            std::mem::size_of::<BlitUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let shader_source = format!("{FULLSCREEN_TRIANGLE_VS}\n{FRAME_BLIT_FS}");
        let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("frame-blit"),
            source: wgpu::ShaderSource::Wgsl(shader_source.into()),
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("frame-blit-layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("frame-blit-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader_module,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader_module,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: PipelineCompilationOptions::default(),
            }),
            primitive: PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame-blit-bg"),
            layout: &bind_group_layout,
            entries: &[
                BindGroupEntry {
                    binding: 0,
                    resource: BindingResource::TextureView(&frame_view),
                },
                BindGroupEntry {
                    binding: 1,
                    resource: BindingResource::Sampler(&frame_sampler),
                },
                BindGroupEntry {
                    binding: 2,
                    resource: uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let presenter = Self {
            frame_texture,
            uniform_buffer,
            pipeline,
            bind_group,
            video_width,
            video_height,
        };
        // Black until the first decoded frame lands
        let black = vec![0u8; (video_width as usize) * (video_height as usize) * 4];
        presenter.upload(queue, &black);
        presenter
    }

    /// Upload one RGBA frame (must be `video_width * video_height * 4` bytes).
    pub fn upload(&self, queue: &Queue, data: &[u8]) {
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &self.frame_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.video_width * 4),
                rows_per_image: Some(self.video_height),
            },
            wgpu::Extent3d {
                width: self.video_width,
                height: self.video_height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Recompute letterbox uniforms for a new surface size.
    pub fn resize(&self, queue: &Queue, surface_width: u32, surface_height: u32) {
        let uniforms = compute_blit_uniforms(
            self.video_width,
            self.video_height,
            surface_width,
            surface_height,
        );
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Blit the current frame to the surface view.
    pub fn render(&self, encoder: &mut CommandEncoder, view: &TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("frame-blit"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

/// Scale and offset that fit the video into the viewport (fit mode).
fn compute_blit_uniforms(
    video_w: u32,
    video_h: u32,
    viewport_w: u32,
    viewport_h: u32,
) -> BlitUniforms {
    let video_aspect = video_w as f32 / video_h.max(1) as f32;
    let viewport_aspect = viewport_w as f32 / viewport_h.max(1) as f32;

    let (scale_x, scale_y) = if video_aspect > viewport_aspect {
        // Video is wider: fit width, letterbox top/bottom
        (1.0, viewport_aspect / video_aspect)
    } else {
        // Video is taller: fit height, pillarbox left/right
        (video_aspect / viewport_aspect, 1.0)
    };

    BlitUniforms {
        scale: [scale_x, scale_y],
        offset: [(1.0 - scale_x) * 0.5, (1.0 - scale_y) * 0.5],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_aspect_fills_viewport() {
        let u = compute_blit_uniforms(1280, 720, 1920, 1080);
        assert_eq!(u.scale, [1.0, 1.0]);
        assert_eq!(u.offset, [0.0, 0.0]);
    }

    #[test]
    fn wide_video_letterboxes_vertically() {
        let u = compute_blit_uniforms(2560, 720, 1280, 720);
        assert_eq!(u.scale[0], 1.0);
        assert!(u.scale[1] < 1.0);
        assert!(u.offset[1] > 0.0);
    }

    #[test]
    fn tall_video_pillarboxes_horizontally() {
        let u = compute_blit_uniforms(720, 1280, 1280, 720);
        assert_eq!(u.scale[1], 1.0);
        assert!(u.scale[0] < 1.0);
        assert!(u.offset[0] > 0.0);
    }
}

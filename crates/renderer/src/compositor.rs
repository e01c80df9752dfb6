//! Intrinsic-image compositor stage.
//!
//! Reads the most recent color outputs of two rasterizer stages — albedo and
//! shading — and writes their per-channel product to the frame target with
//! alpha forced opaque. The stage accepts the uniform `scene`/`camera`
//! arguments every stage receives and ignores them; its inputs are the
//! upstream stage outputs, injected as [`OutputSlot`] handles at
//! construction.

use anyhow::Result;
use tracing::warn;
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;

use crate::compile::{compile_glsl, with_validation};
use crate::gpu::{linear_sampler, sampled_texture_bind_group, sampled_texture_layout, GpuContext};
use crate::stage::{OutputSlot, PipelineStage, StageFrame};

const COMPOSE_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec2 position;
layout(location = 0) out vec2 v_uv;

void main() {
    v_uv = vec2(position.x * 0.5 + 0.5, 0.5 - position.y * 0.5);
    gl_Position = vec4(position, 0.0, 1.0);
}
";

const COMPOSE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D albedo_texture;
layout(set = 0, binding = 1) uniform sampler albedo_sampler;
layout(set = 0, binding = 2) uniform texture2D shading_texture;
layout(set = 0, binding = 3) uniform sampler shading_sampler;

void main() {
    vec4 albedo = texture(sampler2D(albedo_texture, albedo_sampler), v_uv);
    vec4 shading = texture(sampler2D(shading_texture, shading_sampler), v_uv);

    outColor = vec4(albedo.rgb * shading.rgb, 1.0);
}
";

/// Full-surface quad in clip space, triangle-strip order.
const QUAD_VERTICES: [[f32; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [-1.0, 1.0], [1.0, 1.0]];

struct CompositorProgram {
    pipeline: wgpu::RenderPipeline,
    quad_buffer: wgpu::Buffer,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

/// Combines two upstream stage outputs into the final on-surface image.
pub struct CompositorStage {
    label: String,
    albedo: OutputSlot,
    shading: OutputSlot,
    program: Option<CompositorProgram>,
}

impl CompositorStage {
    /// Builds the full-surface quad and the multiply program against the
    /// frame-target format. The two slots designate the albedo and shading
    /// source stages; the textures behind them stay owned by those stages.
    pub fn new(gpu: &GpuContext, albedo: OutputSlot, shading: OutputSlot) -> Result<Self> {
        let device = gpu.device();
        let program = with_validation(device, "compositor program", || {
            let vertex =
                compile_glsl(device, "compose vertex", ShaderStage::Vertex, COMPOSE_VERTEX_GLSL);
            let fragment = compile_glsl(
                device,
                "compose fragment",
                ShaderStage::Fragment,
                COMPOSE_FRAGMENT_GLSL,
            );

            let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("compose quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });

            let source_layout = sampled_texture_layout(device, "compose source layout", 2);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("compose pipeline layout"),
                bind_group_layouts: &[&source_layout],
                push_constant_ranges: &[],
            });

            // Depth testing and blending stay off: the composited result is
            // fully opaque and order-independent.
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("compose pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some("main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        }],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: gpu.target_format(),
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

            CompositorProgram {
                pipeline,
                quad_buffer,
                source_layout,
                sampler: linear_sampler(device, "compose sampler"),
            }
        })?;

        Ok(Self {
            label: "compositor".to_string(),
            albedo,
            shading,
            program: Some(program),
        })
    }
}

impl PipelineStage for CompositorStage {
    fn label(&self) -> &str {
        &self.label
    }

    /// Resolution independent: the quad covers clip space and sampling is
    /// normalized, so there is nothing to reallocate.
    fn resize(&mut self, _gpu: &GpuContext) {}

    fn render(&mut self, gpu: &GpuContext, frame: &mut StageFrame<'_>) {
        let Some(program) = self.program.as_ref() else {
            warn!(stage = %self.label, "render called on a disposed stage; skipping");
            return;
        };

        // Upstream stages must each have produced a frame; until then there
        // is nothing defined to sample, so skip this frame. The next render
        // succeeds once the sources have caught up.
        if !self.albedo.has_rendered() || !self.shading.has_rendered() {
            warn!(stage = %self.label, "source stages have not rendered a scene yet; skipping frame");
            return;
        }
        let (Some(albedo_view), Some(shading_view)) = (self.albedo.view(), self.shading.view())
        else {
            warn!(stage = %self.label, "source outputs are stale after a resize; skipping frame");
            return;
        };

        let source_bind_group = sampled_texture_bind_group(
            gpu.device(),
            "compose bind group",
            &program.source_layout,
            &[&albedo_view, &shading_view],
            &program.sampler,
        );

        let mut pass = frame
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("compose pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        pass.set_pipeline(&program.pipeline);
        pass.set_bind_group(0, &source_bind_group, &[]);
        pass.set_vertex_buffer(0, program.quad_buffer.slice(..));
        pass.draw(0..QUAD_VERTICES.len() as u32, 0..1);
    }

    fn dispose(&mut self) {
        // Only the quad geometry is ours; the sampled textures belong to the
        // source stages.
        if let Some(program) = self.program.take() {
            program.quad_buffer.destroy();
        }
    }
}

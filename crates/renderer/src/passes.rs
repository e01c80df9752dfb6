//! Post-processing passes.
//!
//! A rasterizer stage owns an ordered pass chain and ping-pongs its render
//! target through it after the scene draw. Passes are stateful across frames
//! (the fade pass accumulates progress) and keep that state until the owning
//! stage is recreated.

use std::time::Duration;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu::naga::ShaderStage;

use crate::compile::{compile_glsl, with_validation, FULLSCREEN_VERTEX_GLSL};
use crate::gpu::{
    linear_sampler, sampled_texture_bind_group, sampled_texture_layout, GpuContext, COLOR_FORMAT,
};
use crate::timing::{FadeCurve, FrameTiming};

const FADE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform FadeParams {
    vec4 fade;
} params;

layout(set = 1, binding = 0) uniform texture2D source_texture;
layout(set = 1, binding = 1) uniform sampler source_sampler;

void main() {
    vec4 color = texture(sampler2D(source_texture, source_sampler), v_uv);
    outColor = vec4(color.rgb * params.fade.x, color.a);
}
";

/// One step of a rasterizer stage's pass chain.
///
/// `source` is the previous step's output, `destination` a [`COLOR_FORMAT`]
/// texture view owned by the stage; a pass reads the former and fully
/// overwrites the latter.
pub trait PostPass {
    fn label(&self) -> &str;

    /// Allocates the pass's GPU resources. Invoked once while the owning
    /// stage is constructed, before the stage is first used.
    fn prepare(&mut self, gpu: &GpuContext) -> Result<()>;

    /// Records this pass's draw for the current frame.
    fn apply(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
        timing: &FrameTiming,
    );

    /// Releases the pass's GPU resources; invoked from the owning stage's
    /// dispose hook.
    fn dispose(&mut self) {}
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FadeUniforms {
    fade: [f32; 4],
}

struct FadeResources {
    pipeline: wgpu::RenderPipeline,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

/// Multiplies the image by a fade factor rising from zero to one.
///
/// This is the default pass chain when the orchestrator is constructed
/// without an explicit one. Progress accumulates wall-clock frame deltas and
/// saturates at one; recreating the stage restarts the fade.
pub struct FadeInPass {
    duration: Duration,
    curve: FadeCurve,
    progress: f32,
    resources: Option<FadeResources>,
}

impl FadeInPass {
    pub fn new() -> Self {
        Self {
            duration: Duration::from_millis(1200),
            curve: FadeCurve::default(),
            progress: 0.0,
            resources: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_curve(mut self, curve: FadeCurve) -> Self {
        self.curve = curve;
        self
    }

    /// Raw accumulated progress in `0.0..=1.0`, before easing.
    pub fn progress(&self) -> f32 {
        self.progress
    }
}

impl Default for FadeInPass {
    fn default() -> Self {
        Self::new()
    }
}

impl PostPass for FadeInPass {
    fn label(&self) -> &str {
        "fade-in"
    }

    fn prepare(&mut self, gpu: &GpuContext) -> Result<()> {
        let device = gpu.device();
        let resources = with_validation(device, "fade-in pass program", || {
            let vertex = compile_glsl(device, "fade-in vertex", ShaderStage::Vertex, FULLSCREEN_VERTEX_GLSL);
            let fragment = compile_glsl(device, "fade-in fragment", ShaderStage::Fragment, FADE_FRAGMENT_GLSL);

            let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("fade-in params layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
            let source_layout = sampled_texture_layout(device, "fade-in source layout", 1);

            let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("fade-in params"),
                size: std::mem::size_of::<FadeUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("fade-in params bind group"),
                layout: &params_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                }],
            });

            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("fade-in pipeline layout"),
                bind_group_layouts: &[&params_layout, &source_layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("fade-in pipeline"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

            let sampler = linear_sampler(device, "fade-in sampler");

            FadeResources {
                pipeline,
                params_buffer,
                params_bind_group,
                source_layout,
                sampler,
            }
        })?;

        self.resources = Some(resources);
        Ok(())
    }

    fn apply(
        &mut self,
        gpu: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
        timing: &FrameTiming,
    ) {
        let Some(resources) = self.resources.as_ref() else {
            tracing::warn!(pass = self.label(), "pass applied before prepare; skipping");
            return;
        };

        let duration = self.duration.as_secs_f32();
        if duration > f32::EPSILON {
            self.progress = (self.progress + timing.delta_secs / duration).min(1.0);
        } else {
            self.progress = 1.0;
        }
        let fade = self.curve.sample(self.progress);
        gpu.queue().write_buffer(
            &resources.params_buffer,
            0,
            bytemuck::bytes_of(&FadeUniforms {
                fade: [fade, 0.0, 0.0, 0.0],
            }),
        );

        let source_bind_group = sampled_texture_bind_group(
            gpu.device(),
            "fade-in source bind group",
            &resources.source_layout,
            &[source],
            &resources.sampler,
        );

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("fade-in pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: destination,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_pipeline(&resources.pipeline);
        pass.set_bind_group(0, &resources.params_bind_group, &[]);
        pass.set_bind_group(1, &source_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn dispose(&mut self) {
        if let Some(resources) = self.resources.take() {
            resources.params_buffer.destroy();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fade_progress_starts_at_zero() {
        let pass = FadeInPass::new();
        assert_eq!(pass.progress(), 0.0);
    }

    #[test]
    fn builders_override_duration_and_curve() {
        let pass = FadeInPass::new()
            .with_duration(Duration::from_secs(3))
            .with_curve(FadeCurve::Smoothstep);
        assert_eq!(pass.duration, Duration::from_secs(3));
        assert_eq!(pass.curve, FadeCurve::Smoothstep);
    }
}

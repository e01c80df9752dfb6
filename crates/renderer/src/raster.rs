//! Scene rasterizer stage.
//!
//! Draws a [`Scene`] through a [`Camera`] into a stage-owned color texture,
//! runs the post-processing pass chain over that texture, publishes the
//! result through the stage's [`OutputSlot`], and blits it to the frame
//! target so a single-stage pipeline still reaches the surface.

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::naga::ShaderStage;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::compile::{compile_glsl, with_validation, FULLSCREEN_VERTEX_GLSL};
use crate::gpu::{
    linear_sampler, sampled_texture_bind_group, sampled_texture_layout, GpuContext, COLOR_FORMAT,
};
use crate::passes::PostPass;
use crate::scene::MeshVertex;
use crate::stage::{OutputSlot, PipelineStage, StageFrame};

const SCENE_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) in vec3 position;
layout(location = 1) in vec4 color;
layout(location = 0) out vec4 v_color;

layout(std140, set = 0, binding = 0) uniform CameraParams {
    mat4 view_proj;
} camera;

void main() {
    v_color = color;
    gl_Position = camera.view_proj * vec4(position, 1.0);
}
";

const SCENE_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec4 v_color;
layout(location = 0) out vec4 outColor;

void main() {
    outColor = v_color;
}
";

const BLIT_FRAGMENT_GLSL: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(set = 0, binding = 0) uniform texture2D source_texture;
layout(set = 0, binding = 1) uniform sampler source_sampler;

void main() {
    outColor = texture(sampler2D(source_texture, source_sampler), v_uv);
}
";

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniforms {
    view_proj: [[f32; 4]; 4],
}

struct SceneProgram {
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
}

struct BlitProgram {
    pipeline: wgpu::RenderPipeline,
    source_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
}

struct TargetTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl TargetTexture {
    fn new(device: &wgpu::Device, label: &str, size: PhysicalSize<u32>) -> Self {
        Self::create(
            device,
            label,
            size,
            COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        )
    }

    fn depth(device: &wgpu::Device, label: &str, size: PhysicalSize<u32>) -> Self {
        Self::create(
            device,
            label,
            size,
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        )
    }

    fn create(
        device: &wgpu::Device,
        label: &str,
        size: PhysicalSize<u32>,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.width.max(1),
                height: size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self { texture, view }
    }
}

/// Scene target plus the scratch texture the pass chain ping-pongs through.
struct StageTargets {
    scene: TargetTexture,
    scratch: TargetTexture,
    depth: TargetTexture,
    size: PhysicalSize<u32>,
}

impl StageTargets {
    fn new(device: &wgpu::Device, label: &str, size: PhysicalSize<u32>) -> Self {
        Self {
            scene: TargetTexture::new(device, &format!("{label} scene target"), size),
            scratch: TargetTexture::new(device, &format!("{label} scratch target"), size),
            depth: TargetTexture::depth(device, &format!("{label} depth target"), size),
            size,
        }
    }
}

/// Concrete rasterizer stage.
pub struct SceneStage {
    label: String,
    program: Option<SceneProgram>,
    blit: Option<BlitProgram>,
    targets: Option<StageTargets>,
    passes: Vec<Box<dyn PostPass>>,
    output: OutputSlot,
    has_rendered: bool,
}

impl SceneStage {
    /// Compiles the scene and blit programs, allocates render targets at the
    /// context's current size, and prepares the pass chain. Shader or
    /// pipeline validation failures abort construction.
    pub fn new(
        gpu: &GpuContext,
        label: impl Into<String>,
        mut passes: Vec<Box<dyn PostPass>>,
    ) -> Result<Self> {
        let label = label.into();
        let device = gpu.device();

        let (program, blit) = with_validation(device, "scene stage program", || {
            let vertex = compile_glsl(device, "scene vertex", ShaderStage::Vertex, SCENE_VERTEX_GLSL);
            let fragment =
                compile_glsl(device, "scene fragment", ShaderStage::Fragment, SCENE_FRAGMENT_GLSL);

            let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("camera layout"),
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
            let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("camera uniforms"),
                size: std::mem::size_of::<CameraUniforms>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("camera bind group"),
                layout: &camera_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                }],
            });

            let scene_pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("scene pipeline layout"),
                    bind_group_layouts: &[&camera_layout],
                    push_constant_ranges: &[],
                });
            let scene_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("scene pipeline"),
                layout: Some(&scene_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &vertex,
                    entry_point: Some("main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<MeshVertex>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                offset: 0,
                                shader_location: 0,
                                format: wgpu::VertexFormat::Float32x3,
                            },
                            wgpu::VertexAttribute {
                                offset: 12,
                                shader_location: 1,
                                format: wgpu::VertexFormat::Float32x4,
                            },
                        ],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::LessEqual,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: COLOR_FORMAT,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            });

            let blit_vertex = compile_glsl(
                device,
                "blit vertex",
                ShaderStage::Vertex,
                FULLSCREEN_VERTEX_GLSL,
            );
            let blit_fragment =
                compile_glsl(device, "blit fragment", ShaderStage::Fragment, BLIT_FRAGMENT_GLSL);
            let source_layout = sampled_texture_layout(device, "blit source layout", 1);
            let blit_pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("blit pipeline layout"),
                    bind_group_layouts: &[&source_layout],
                    push_constant_ranges: &[],
                });
            let blit_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("blit pipeline"),
                layout: Some(&blit_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &blit_vertex,
                    entry_point: Some("main"),
                    buffers: &[],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &blit_fragment,
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

            (
                SceneProgram {
                    pipeline: scene_pipeline,
                    camera_buffer,
                    camera_bind_group,
                },
                BlitProgram {
                    pipeline: blit_pipeline,
                    source_layout,
                    sampler: linear_sampler(device, "blit sampler"),
                },
            )
        })?;

        for pass in &mut passes {
            pass.prepare(gpu)?;
        }

        let targets = StageTargets::new(device, &label, gpu.size());

        Ok(Self {
            label,
            program: Some(program),
            blit: Some(blit),
            targets: Some(targets),
            passes,
            output: OutputSlot::new(),
            has_rendered: false,
        })
    }

    /// Handle the compositor uses to read this stage's output.
    pub fn output(&self) -> OutputSlot {
        self.output.clone()
    }

    /// Whether this stage has ever completed a render.
    pub fn has_rendered(&self) -> bool {
        self.has_rendered
    }
}

impl PipelineStage for SceneStage {
    fn label(&self) -> &str {
        &self.label
    }

    fn resize(&mut self, gpu: &GpuContext) {
        if self.program.is_none() {
            return;
        }
        self.targets = Some(StageTargets::new(gpu.device(), &self.label, gpu.size()));
        // The old targets are gone; consumers must wait for the next render.
        self.output.invalidate();
    }

    fn render(&mut self, gpu: &GpuContext, frame: &mut StageFrame<'_>) {
        let (Some(program), Some(blit), Some(targets)) =
            (self.program.as_ref(), self.blit.as_ref(), self.targets.as_ref())
        else {
            tracing::warn!(stage = %self.label, "render called on a disposed stage; skipping");
            return;
        };

        gpu.queue().write_buffer(
            &program.camera_buffer,
            0,
            bytemuck::bytes_of(&CameraUniforms {
                view_proj: frame.camera.view_proj().to_cols_array_2d(),
            }),
        );

        let clear_color = frame
            .scene
            .background
            .map(|color| color.to_wgpu())
            .unwrap_or(frame.clear_color);

        // Fresh vertex data every call; the scene is free to change between
        // frames.
        let vertices = frame.scene.collect_vertices();
        let vertex_buffer = (!vertices.is_empty()).then(|| {
            gpu.device()
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("scene vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                })
        });

        {
            let mut pass = frame
                .encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("scene pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &targets.scene.view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(clear_color),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &targets.depth.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
            if let Some(buffer) = vertex_buffer.as_ref() {
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &program.camera_bind_group, &[]);
                pass.set_vertex_buffer(0, buffer.slice(..));
                pass.draw(0..vertices.len() as u32, 0..1);
            }
        }

        // Ping-pong the pass chain over the scene target.
        let mut result_in_scratch = false;
        for pass in &mut self.passes {
            let (source, destination) = if result_in_scratch {
                (&targets.scratch.view, &targets.scene.view)
            } else {
                (&targets.scene.view, &targets.scratch.view)
            };
            pass.apply(gpu, frame.encoder, source, destination, &frame.timing);
            result_in_scratch = !result_in_scratch;
        }
        let result = if result_in_scratch {
            &targets.scratch.view
        } else {
            &targets.scene.view
        };

        self.output.publish(result.clone(), targets.size);
        if !self.has_rendered {
            debug!(stage = %self.label, "first frame rendered");
        }
        self.has_rendered = true;

        // Present the post-pass result on the frame target.
        let blit_bind_group = sampled_texture_bind_group(
            gpu.device(),
            "blit bind group",
            &blit.source_layout,
            &[result],
            &blit.sampler,
        );
        let mut pass = frame
            .encoder
            .begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("blit pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: frame.target,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(frame.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        pass.set_pipeline(&blit.pipeline);
        pass.set_bind_group(0, &blit_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn dispose(&mut self) {
        for pass in &mut self.passes {
            pass.dispose();
        }
        if let Some(program) = self.program.take() {
            program.camera_buffer.destroy();
        }
        self.blit = None;
        if let Some(targets) = self.targets.take() {
            targets.scene.texture.destroy();
            targets.scratch.texture.destroy();
            targets.depth.texture.destroy();
        }
        self.output.reset();
        self.has_rendered = false;
    }
}

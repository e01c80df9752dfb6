//! GLSL compilation helpers.
//!
//! Stage shaders are fixed GLSL 450 strings compiled through wgpu's naga
//! front end. Compilation and pipeline linking run inside a validation error
//! scope so a broken shader surfaces as a fatal `Err` at stage construction
//! instead of a deferred device error — a compile failure is a packaging
//! defect, not a runtime condition to recover from.

use std::borrow::Cow;

use anyhow::Result;
use wgpu::naga::ShaderStage;

/// Compiles one GLSL shader stage. Syntax errors are deferred into the
/// device error sink; run the surrounding construction through
/// [`with_validation`] to turn them into hard failures.
pub(crate) fn compile_glsl(
    device: &wgpu::Device,
    label: &str,
    stage: ShaderStage,
    source: &'static str,
) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(source),
            stage,
            defines: &[],
        },
    })
}

/// Runs `build` inside a validation error scope and fails if the device
/// reported any validation error — the Rust-side stand-in for checking the
/// GL link status after program creation.
pub(crate) fn with_validation<T>(
    device: &wgpu::Device,
    what: &str,
    build: impl FnOnce() -> T,
) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = build();
    if let Some(error) = pollster::block_on(device.pop_error_scope()) {
        anyhow::bail!("{what} failed validation: {error}");
    }
    Ok(value)
}

/// Buffer-less full-screen triangle used by blit and post-process passes.
///
/// UVs are flipped vertically so sampling a render target reproduces it
/// upright on the destination.
pub(crate) const FULLSCREEN_VERTEX_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = vec2(pos.x * 0.5 + 0.5, 0.5 - pos.y * 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";

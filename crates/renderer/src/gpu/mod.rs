//! GPU plumbing shared by every pipeline stage.
//!
//! - `context` owns the wgpu instance/device wiring plus the frame target
//!   (window swapchain or off-screen texture) and knows how to rebuild it
//!   when the surface resizes.
//! - Stages allocate their own pipelines and textures against the shared
//!   [`GpuContext`]; the context itself is created once per orchestrator and
//!   never recreated.

mod context;

pub use context::{FrameLease, GpuContext};

/// Bind group layout for `pairs` texture+sampler slots, interleaved the way
/// the stage shaders declare them (texture at binding 2n, sampler at 2n+1).
pub(crate) fn sampled_texture_layout(
    device: &wgpu::Device,
    label: &str,
    pairs: u32,
) -> wgpu::BindGroupLayout {
    let mut entries = Vec::with_capacity(pairs as usize * 2);
    for pair in 0..pairs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: pair * 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: pair * 2 + 1,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

/// Bind group pairing each source view with `sampler`, matching
/// [`sampled_texture_layout`].
pub(crate) fn sampled_texture_bind_group(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::BindGroupLayout,
    sources: &[&wgpu::TextureView],
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    let mut entries = Vec::with_capacity(sources.len() * 2);
    for (index, view) in sources.iter().enumerate() {
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2,
            resource: wgpu::BindingResource::TextureView(view),
        });
        entries.push(wgpu::BindGroupEntry {
            binding: (index as u32) * 2 + 1,
            resource: wgpu::BindingResource::Sampler(sampler),
        });
    }
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &entries,
    })
}

/// Clamp-to-edge linear sampler shared by every texture-sampling stage.
pub(crate) fn linear_sampler(device: &wgpu::Device, label: &str) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

/// Color format for every texture a stage renders into off screen.
///
/// Kept linear (non-sRGB) so the compositor's per-channel multiply operates
/// on the same values the rasterizer wrote.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

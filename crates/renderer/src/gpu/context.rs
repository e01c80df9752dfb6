use anyhow::{Context as AnyhowContext, Result};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::surface::SurfaceBinding;

use super::COLOR_FORMAT;

/// Where a frame ends up: a configured window swapchain, or an off-screen
/// color texture for headless operation.
enum FrameTarget {
    Window {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    Offscreen {
        texture: wgpu::Texture,
        view: wgpu::TextureView,
    },
}

/// The single GPU handle shared by the orchestrator and every stage.
///
/// Created once per orchestrator with antialiasing disabled; stages receive
/// it by reference and allocate their own resources against its device.
pub struct GpuContext {
    _instance: wgpu::Instance,
    device: wgpu::Device,
    queue: wgpu::Queue,
    size: PhysicalSize<u32>,
    target_format: wgpu::TextureFormat,
    target: FrameTarget,
}

/// One acquired frame. `present` flips window swapchains and is a no-op for
/// off-screen targets, whose texture persists for readback.
pub struct FrameLease {
    surface_texture: Option<wgpu::SurfaceTexture>,
    view: wgpu::TextureView,
}

impl FrameLease {
    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn present(self) {
        if let Some(surface_texture) = self.surface_texture {
            surface_texture.present();
        }
    }
}

impl GpuContext {
    pub fn new(binding: SurfaceBinding, initial_size: PhysicalSize<u32>) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let surface = match binding {
            SurfaceBinding::Window { display, window } => Some(
                unsafe {
                    instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                        raw_display_handle: display,
                        raw_window_handle: window,
                    })
                }
                .context("failed to create rendering surface")?,
            ),
            SurfaceBinding::Offscreen => None,
        };

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: surface.as_ref(),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        debug!(
            name = %adapter_info.name,
            backend = ?adapter_info.backend,
            device_type = ?adapter_info.device_type,
            "selected GPU adapter"
        );

        let max_dimension = limits.max_texture_dimension_2d;
        let requested_width = initial_size.width.max(1);
        let requested_height = initial_size.height.max(1);
        if requested_width > max_dimension || requested_height > max_dimension {
            anyhow::bail!(
                "GPU max texture dimension is {max_dimension}, requested target is {requested_width}x{requested_height}"
            );
        }

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("pipeline device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let size = PhysicalSize::new(requested_width, requested_height);
        let (target, target_format) = match surface {
            Some(surface) => {
                let caps = surface.get_capabilities(&adapter);
                // Prefer a non-sRGB swapchain so shader output is not
                // re-encoded behind our back.
                let format = caps
                    .formats
                    .iter()
                    .copied()
                    .find(|format| !format.is_srgb())
                    .unwrap_or_else(|| {
                        let fallback = caps.formats[0];
                        warn!(?fallback, "no linear surface format available; falling back");
                        fallback
                    });
                let present_mode = caps
                    .present_modes
                    .iter()
                    .copied()
                    .find(|mode| *mode == wgpu::PresentMode::Fifo)
                    .unwrap_or_else(|| caps.present_modes[0]);
                let config = wgpu::SurfaceConfiguration {
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    format,
                    width: size.width,
                    height: size.height,
                    present_mode,
                    alpha_mode: caps.alpha_modes[0],
                    view_formats: vec![],
                    desired_maximum_frame_latency: 2,
                };
                surface.configure(&device, &config);
                (FrameTarget::Window { surface, config }, format)
            }
            None => {
                let (texture, view) = create_offscreen_target(&device, size);
                (FrameTarget::Offscreen { texture, view }, COLOR_FORMAT)
            }
        };

        Ok(Self {
            _instance: instance,
            device,
            queue,
            size,
            target_format,
            target,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Current frame-target dimensions; always the most recently configured
    /// pixel size.
    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    /// Format of the frame target; stages that draw directly to it must
    /// build their pipelines against this format.
    pub fn target_format(&self) -> wgpu::TextureFormat {
        self.target_format
    }

    /// Reconfigures the frame target for a new pixel size. Zero-sized
    /// requests are ignored (minimised windows report those).
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        match &mut self.target {
            FrameTarget::Window { surface, config } => {
                config.width = new_size.width;
                config.height = new_size.height;
                surface.configure(&self.device, config);
            }
            FrameTarget::Offscreen { texture, view } => {
                let (new_texture, new_view) = create_offscreen_target(&self.device, new_size);
                *texture = new_texture;
                *view = new_view;
            }
        }
    }

    /// Acquires the view every stage renders into this frame.
    pub fn begin_frame(&self) -> Result<FrameLease, wgpu::SurfaceError> {
        match &self.target {
            FrameTarget::Window { surface, .. } => {
                let surface_texture = surface.get_current_texture()?;
                let view = surface_texture
                    .texture
                    .create_view(&wgpu::TextureViewDescriptor::default());
                Ok(FrameLease {
                    surface_texture: Some(surface_texture),
                    view,
                })
            }
            FrameTarget::Offscreen { view, .. } => Ok(FrameLease {
                surface_texture: None,
                view: view.clone(),
            }),
        }
    }

    /// Copies the off-screen frame target back to the CPU as tightly packed
    /// RGBA rows. Only available for off-screen contexts; window swapchains
    /// do not guarantee copy access.
    pub fn read_target_pixels(&self) -> Result<Vec<u8>> {
        let texture = match &self.target {
            FrameTarget::Offscreen { texture, .. } => texture,
            FrameTarget::Window { .. } => {
                anyhow::bail!("pixel readback requires an off-screen frame target")
            }
        };

        let bytes_per_pixel = 4u32;
        let unpadded_bytes_per_row = self.size.width * bytes_per_pixel;
        let padded_bytes_per_row = unpadded_bytes_per_row
            .div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("target readback"),
            size: u64::from(padded_bytes_per_row) * u64::from(self.size.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(self.size.height),
                },
            },
            wgpu::Extent3d {
                width: self.size.width,
                height: self.size.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .context("failed to wait for readback")?;
        receiver
            .recv()
            .context("readback mapping callback dropped")?
            .context("failed to map readback buffer")?;

        let mapped = slice.get_mapped_range();
        let mut pixels =
            Vec::with_capacity((unpadded_bytes_per_row * self.size.height) as usize);
        for row in 0..self.size.height {
            let start = (row * padded_bytes_per_row) as usize;
            pixels.extend_from_slice(&mapped[start..start + unpadded_bytes_per_row as usize]);
        }
        drop(mapped);
        readback.unmap();

        Ok(pixels)
    }
}

fn create_offscreen_target(
    device: &wgpu::Device,
    size: PhysicalSize<u32>,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("offscreen frame target"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

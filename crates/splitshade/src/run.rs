use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Window, WindowBuilder};

use renderer::wgpu::SurfaceError;
use renderer::{
    Color, FadeInPass, PostPass, RenderError, RenderSurface, Renderer, RendererOptions,
    SurfaceBinding,
};

use crate::cli::Cli;
use crate::scenes;

/// Winit-backed drawable surface.
///
/// The displayed size is whatever the window system reports; the backing
/// pixel size tracks what the pipeline last configured, so the orchestrator's
/// `resize` can detect the mismatch after a window resize.
struct WindowSurface {
    window: Arc<Window>,
    pixels: PhysicalSize<u32>,
    background: String,
}

impl WindowSurface {
    fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            pixels: PhysicalSize::new(0, 0),
            background: Color::BLACK.to_hex_string(),
        }
    }
}

impl RenderSurface for WindowSurface {
    fn displayed_size(&self) -> PhysicalSize<u32> {
        self.window.inner_size()
    }

    fn pixel_size(&self) -> PhysicalSize<u32> {
        self.pixels
    }

    fn set_pixel_size(&mut self, size: PhysicalSize<u32>) {
        self.pixels = size;
    }

    fn set_background(&mut self, color: &Color) {
        // Windows have no out-of-frame backdrop to paint; keep the encoding
        // for diagnostics.
        self.background = color.to_hex_string();
        debug!(background = %self.background, "surface background updated");
    }

    fn binding(&self) -> Result<SurfaceBinding> {
        let display = self
            .window
            .display_handle()
            .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;
        let window = self
            .window
            .window_handle()
            .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
        Ok(SurfaceBinding::Window {
            display: display.as_raw(),
            window: window.as_raw(),
        })
    }
}

pub fn run(args: Cli) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let (width, height) = args.size;
    let window = WindowBuilder::new()
        .with_title("splitshade viewer")
        .with_inner_size(PhysicalSize::new(width, height))
        .build(&event_loop)
        .context("failed to create viewer window")?;
    let window = Arc::new(window);

    let passes: Vec<Box<dyn PostPass>> = if args.no_fade {
        vec![]
    } else {
        vec![Box::new(FadeInPass::new().with_curve(args.fade_curve))]
    };
    let options = RendererOptions::new()
        .with_surface(Box::new(WindowSurface::new(window.clone())))
        .with_passes(passes);
    let mut renderer = Renderer::new(options)?;
    renderer.set_background_color(args.background);

    if args.intrinsic {
        let shading_passes: Option<Vec<Box<dyn PostPass>>> = if args.no_fade {
            Some(vec![])
        } else {
            Some(vec![Box::new(FadeInPass::new().with_curve(args.fade_curve))])
        };
        renderer.configure_intrinsic(shading_passes)?;
        info!("intrinsic pipeline enabled");
    }

    let albedo = scenes::albedo_scene();
    let shading = scenes::shading_scene();
    let start = std::time::Instant::now();
    let intrinsic = args.intrinsic;

    window.request_redraw();
    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            renderer.dispose();
                            elwt.exit();
                        }
                        WindowEvent::Resized(_) => {
                            renderer.resize();
                        }
                        WindowEvent::ScaleFactorChanged {
                            mut inner_size_writer,
                            ..
                        } => {
                            // Keep the current logical size when the scale factor changes.
                            let _ = inner_size_writer.request_inner_size(renderer.pixel_size());
                        }
                        WindowEvent::RedrawRequested => {
                            let size = renderer.pixel_size();
                            let aspect =
                                size.width.max(1) as f32 / size.height.max(1) as f32;
                            let camera =
                                scenes::orbit_camera(start.elapsed().as_secs_f32(), aspect);

                            let result = if intrinsic {
                                renderer.render_intrinsic(&albedo, &shading, &camera)
                            } else {
                                renderer.render(&albedo, &camera)
                            };
                            match result {
                                Ok(()) => {}
                                Err(RenderError::Surface(
                                    SurfaceError::Lost | SurfaceError::Outdated,
                                )) => {
                                    let size = renderer.pixel_size();
                                    renderer.set_size(size.width, size.height);
                                }
                                Err(RenderError::Surface(SurfaceError::OutOfMemory)) => {
                                    error!("surface out of memory; exiting");
                                    elwt.exit();
                                }
                                Err(RenderError::Surface(SurfaceError::Timeout)) => {
                                    warn!("surface timeout; retrying next frame");
                                }
                                Err(RenderError::Surface(other)) => {
                                    warn!(?other, "surface error; retrying next frame");
                                }
                                Err(err @ RenderError::IncompletePipeline(_)) => {
                                    error!(%err, "pipeline misconfigured; exiting");
                                    elwt.exit();
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    // Schedule the next frame once winit is about to wait.
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))
}

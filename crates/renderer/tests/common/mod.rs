//! Shared helpers for the GPU-backed integration suites.
//!
//! Each test builds a headless renderer; hosts without a usable adapter skip
//! instead of failing, so the suites stay green on machines with no GPU.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use renderer::{
    Color, GpuContext, HeadlessSurface, PipelineStage, PostPass, RenderSurface, Renderer,
    RendererOptions, StageFrame, SurfaceBinding,
};
use winit::dpi::PhysicalSize;

/// Builds a headless renderer, or `None` when no GPU adapter is available.
pub fn headless_renderer(
    width: u32,
    height: u32,
    passes: Option<Vec<Box<dyn PostPass>>>,
) -> Option<Renderer> {
    let mut options =
        RendererOptions::new().with_surface(Box::new(HeadlessSurface::new(width, height)));
    if let Some(passes) = passes {
        options = options.with_passes(passes);
    }
    match Renderer::new(options) {
        Ok(renderer) => Some(renderer),
        Err(err) => {
            eprintln!("skipping GPU test (no usable adapter?): {err:#}");
            None
        }
    }
}

/// Ordered record of lifecycle hook invocations across stages.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.0.borrow_mut().push(entry);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.borrow_mut())
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Stage that records every lifecycle call and does no GPU work.
pub struct RecordingStage {
    name: &'static str,
    log: CallLog,
}

impl RecordingStage {
    pub fn new(name: &'static str, log: &CallLog) -> Self {
        Self {
            name,
            log: log.clone(),
        }
    }
}

impl PipelineStage for RecordingStage {
    fn label(&self) -> &str {
        self.name
    }

    fn resize(&mut self, _gpu: &GpuContext) {
        self.log.push(format!("{}:resize", self.name));
    }

    fn render(&mut self, _gpu: &GpuContext, _frame: &mut StageFrame<'_>) {
        self.log.push(format!("{}:render", self.name));
    }

    fn dispose(&mut self) {
        self.log.push(format!("{}:dispose", self.name));
    }
}

#[derive(Clone)]
pub struct SurfaceState {
    pub displayed: PhysicalSize<u32>,
    pub pixels: PhysicalSize<u32>,
    pub background: String,
    pub set_pixel_size_calls: u32,
}

/// Off-screen surface whose state stays observable from the test after the
/// renderer takes ownership of the `Box`.
#[derive(Clone)]
pub struct SharedSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl SharedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: Rc::new(RefCell::new(SurfaceState {
                displayed: PhysicalSize::new(width, height),
                pixels: PhysicalSize::new(0, 0),
                background: String::new(),
                set_pixel_size_calls: 0,
            })),
        }
    }

    pub fn state(&self) -> SurfaceState {
        self.state.borrow().clone()
    }

    pub fn set_displayed_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().displayed = PhysicalSize::new(width, height);
    }
}

impl RenderSurface for SharedSurface {
    fn displayed_size(&self) -> PhysicalSize<u32> {
        self.state.borrow().displayed
    }

    fn pixel_size(&self) -> PhysicalSize<u32> {
        self.state.borrow().pixels
    }

    fn set_pixel_size(&mut self, size: PhysicalSize<u32>) {
        let mut state = self.state.borrow_mut();
        state.pixels = size;
        state.set_pixel_size_calls += 1;
    }

    fn set_background(&mut self, color: &Color) {
        self.state.borrow_mut().background = color.to_hex_string();
    }

    fn binding(&self) -> Result<SurfaceBinding> {
        Ok(SurfaceBinding::Offscreen)
    }
}

//! Pipeline orchestrator.
//!
//! [`Renderer`] owns the drawable surface, the GPU context, and the ordered
//! stage list, and exposes the two per-frame entry points: `render` for the
//! single-scene pipeline and `render_intrinsic` for the albedo/shading/
//! compositor configuration.

use anyhow::Result;
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::color::Color;
use crate::compositor::CompositorStage;
use crate::error::{PipelineError, RenderError};
use crate::gpu::GpuContext;
use crate::passes::{FadeInPass, PostPass};
use crate::raster::SceneStage;
use crate::scene::{Camera, Scene};
use crate::stage::{OutputSlot, PipelineStage, StageFrame, StageId, StageSet};
use crate::surface::{HeadlessSurface, RenderSurface};
use crate::timing::FrameClock;

/// Displayed size of the default off-screen surface when the caller does not
/// supply one.
const DEFAULT_SURFACE_SIZE: (u32, u32) = (1920, 1080);

/// Construction-time configuration.
///
/// Both fields distinguish "not provided" from "explicitly empty": a missing
/// surface gets a default off-screen drawable (1920x1080 displayed size),
/// and a missing pass chain gets a single fade-in pass, while `Some(vec![])`
/// disables post-processing entirely.
#[derive(Default)]
pub struct RendererOptions {
    pub surface: Option<Box<dyn RenderSurface>>,
    pub passes: Option<Vec<Box<dyn PostPass>>>,
}

impl RendererOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_surface(mut self, surface: Box<dyn RenderSurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn with_passes(mut self, passes: Vec<Box<dyn PostPass>>) -> Self {
        self.passes = Some(passes);
        self
    }
}

/// Owns the surface, GPU context, and ordered stage pipeline.
///
/// Single-threaded: every lifecycle call runs to completion before the next
/// one begins, and stage order is a correctness dependency (stages mutate
/// shared GPU state without restoring it).
pub struct Renderer {
    surface: Box<dyn RenderSurface>,
    gpu: GpuContext,
    stages: StageSet,
    background: Color,
    clock: FrameClock,
    primary: StageId,
    primary_output: OutputSlot,
    shading_output: Option<OutputSlot>,
    disposed: bool,
}

impl Renderer {
    /// Builds the orchestrator: creates (or adopts) the surface, creates the
    /// GPU context with antialiasing disabled, installs the primary scene
    /// stage with the configured pass chain, and reconciles the backing size
    /// with the surface's displayed size.
    pub fn new(mut options: RendererOptions) -> Result<Self> {
        let surface = options.surface.take().unwrap_or_else(|| {
            let (width, height) = DEFAULT_SURFACE_SIZE;
            Box::new(HeadlessSurface::new(width, height))
        });
        let binding = surface.binding()?;
        let gpu = GpuContext::new(binding, surface.displayed_size())?;

        let passes = options
            .passes
            .take()
            .unwrap_or_else(|| vec![Box::new(FadeInPass::new()) as Box<dyn PostPass>]);
        let scene_stage = SceneStage::new(&gpu, "scene", passes)?;
        let primary_output = scene_stage.output();

        let mut stages = StageSet::new();
        let primary = stages.add(Box::new(scene_stage));

        let mut renderer = Self {
            surface,
            gpu,
            stages,
            background: Color::BLACK,
            clock: FrameClock::new(),
            primary,
            primary_output,
            shading_output: None,
            disposed: false,
        };
        renderer.surface.set_background(&renderer.background);
        renderer.resize();
        Ok(renderer)
    }

    /// Appends the shading rasterizer and a compositor wired to the primary
    /// stage's output, completing the three-stage intrinsic pipeline.
    /// Returns the (shading, compositor) stage ids.
    pub fn configure_intrinsic(
        &mut self,
        passes: Option<Vec<Box<dyn PostPass>>>,
    ) -> Result<(StageId, StageId)> {
        if self.shading_output.is_some() {
            anyhow::bail!("intrinsic pipeline is already configured");
        }
        let passes =
            passes.unwrap_or_else(|| vec![Box::new(FadeInPass::new()) as Box<dyn PostPass>]);
        let shading = SceneStage::new(&self.gpu, "shading scene", passes)?;
        let shading_output = shading.output();
        let compositor = CompositorStage::new(
            &self.gpu,
            self.primary_output.clone(),
            shading_output.clone(),
        )?;

        let shading_id = self.stages.add(Box::new(shading));
        let compositor_id = self.stages.add(Box::new(compositor));
        self.shading_output = Some(shading_output);
        debug!("intrinsic pipeline configured");
        Ok((shading_id, compositor_id))
    }

    /// Appends a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn PipelineStage>) -> StageId {
        let id = self.stages.add(stage);
        debug!(?id, "stage added");
        id
    }

    /// Removes a stage by identity. Callers are responsible for not removing
    /// a stage another stage depends on.
    pub fn remove_stage(
        &mut self,
        id: StageId,
    ) -> Result<Box<dyn PipelineStage>, PipelineError> {
        let stage = self.stages.remove(id)?;
        debug!(?id, "stage removed");
        Ok(stage)
    }

    /// Sets the backing pixel size, reconfigures the frame target to match,
    /// and runs every stage's resize hook in pipeline order.
    pub fn set_size(&mut self, width: u32, height: u32) {
        let size = PhysicalSize::new(width, height);
        self.surface.set_pixel_size(size);
        self.gpu.resize(size);
        debug!(width, height, "pipeline resized");
        for stage in self.stages.iter_mut() {
            stage.resize(&self.gpu);
        }
    }

    /// Reconciles the backing store with the surface's displayed size;
    /// delegates to [`Renderer::set_size`] only when they differ, so
    /// redundant reallocation is avoided.
    pub fn resize(&mut self) {
        let displayed = self.surface.displayed_size();
        if displayed != self.surface.pixel_size() {
            self.set_size(displayed.width, displayed.height);
        }
    }

    /// Renders one frame by invoking every stage in pipeline order with the
    /// same scene and camera.
    pub fn render(&mut self, scene: &Scene, camera: &Camera) -> Result<(), RenderError> {
        let timing = self.clock.tick();
        let lease = self.gpu.begin_frame()?;
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        let clear_color = self.background.to_wgpu();

        for stage in self.stages.iter_mut() {
            let mut frame = StageFrame {
                scene,
                camera,
                encoder: &mut encoder,
                target: lease.view(),
                clear_color,
                timing,
            };
            stage.render(&self.gpu, &mut frame);
        }

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        lease.present();
        Ok(())
    }

    /// Renders one intrinsic frame: the albedo scene through stage 0, the
    /// shading scene through stage 1, then the compositor at stage 2.
    ///
    /// The compositor ignores its scene argument by contract; the albedo
    /// scene is passed only to satisfy the uniform stage call signature.
    pub fn render_intrinsic(
        &mut self,
        albedo_scene: &Scene,
        shading_scene: &Scene,
        camera: &Camera,
    ) -> Result<(), RenderError> {
        if self.stages.len() < 3 {
            return Err(RenderError::IncompletePipeline(self.stages.len()));
        }

        let timing = self.clock.tick();
        let lease = self.gpu.begin_frame()?;
        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("intrinsic frame encoder"),
            });
        let clear_color = self.background.to_wgpu();

        let calls: [(usize, &Scene); 3] =
            [(0, albedo_scene), (1, shading_scene), (2, albedo_scene)];
        for (index, scene) in calls {
            if let Some(stage) = self.stages.get_mut(index) {
                let mut frame = StageFrame {
                    scene,
                    camera,
                    encoder: &mut encoder,
                    target: lease.view(),
                    clear_color,
                    timing,
                };
                stage.render(&self.gpu, &mut frame);
            }
        }

        self.gpu.queue().submit(std::iter::once(encoder.finish()));
        lease.present();
        Ok(())
    }

    /// Runs every stage's dispose hook in pipeline order, exactly once. The
    /// surface and GPU context are left alone; they may be externally owned.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for stage in self.stages.iter_mut() {
            stage.dispose();
        }
        self.disposed = true;
        debug!("pipeline disposed");
    }

    pub fn background_color(&self) -> Color {
        self.background
    }

    /// Updates the orchestrator background; it becomes the surface's textual
    /// background and the clear color rasterizer stages fall back to.
    pub fn set_background_color(&mut self, color: Color) {
        self.background = color;
        self.surface.set_background(&color);
    }

    pub fn gpu(&self) -> &GpuContext {
        &self.gpu
    }

    pub fn surface(&self) -> &dyn RenderSurface {
        self.surface.as_ref()
    }

    /// Backing pixel size last configured through `set_size`.
    pub fn pixel_size(&self) -> PhysicalSize<u32> {
        self.surface.pixel_size()
    }

    /// Id of the always-present primary scene stage.
    pub fn primary_stage_id(&self) -> StageId {
        self.primary
    }

    /// Output handle of the primary (albedo) scene stage.
    pub fn primary_output(&self) -> OutputSlot {
        self.primary_output.clone()
    }

    /// Output handle of the shading stage, present once the intrinsic
    /// pipeline is configured.
    pub fn shading_output(&self) -> Option<OutputSlot> {
        self.shading_output.clone()
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage ids in execution order.
    pub fn stage_ids(&self) -> Vec<StageId> {
        self.stages.ids()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.dispose();
    }
}

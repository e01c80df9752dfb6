//! Intrinsic-image render pipeline.
//!
//! The crate renders a scene through an ordered pipeline of interchangeable
//! stages and supports a compositing mode that recombines independently
//! rendered albedo and shading layers into one frame:
//!
//! ```text
//!   Renderer ──▶ SceneStage (albedo)  ──▶ color texture ─┐
//!       │                                                ├─▶ CompositorStage ──▶ surface
//!       ├─────▶ SceneStage (shading) ──▶ color texture ──┘
//!       │
//!       └─ owns: RenderSurface, GpuContext, StageSet, background color
//! ```
//!
//! Every stage owns one compiled GPU program plus its buffers and textures,
//! created at construction, resized in lockstep with the surface, rendered
//! in pipeline order, and torn down deterministically by `dispose`. The
//! compositor never re-traverses scene data; it samples the two rasterizer
//! stages' published output textures and multiplies them per channel.

mod color;
mod compile;
mod compositor;
mod error;
mod gpu;
mod passes;
mod raster;
mod renderer;
mod scene;
mod stage;
mod surface;
mod timing;

pub use wgpu;

pub use color::Color;
pub use compositor::CompositorStage;
pub use error::{PipelineError, RenderError};
pub use gpu::{FrameLease, GpuContext, COLOR_FORMAT};
pub use passes::{FadeInPass, PostPass};
pub use raster::SceneStage;
pub use renderer::{Renderer, RendererOptions};
pub use scene::{Camera, Mesh, MeshVertex, Scene};
pub use stage::{OutputSlot, PipelineStage, StageFrame, StageId};
pub use surface::{HeadlessSurface, RenderSurface, SurfaceBinding};
pub use timing::{FadeCurve, FrameTiming};

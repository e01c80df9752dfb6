use thiserror::Error;

/// Errors raised by pipeline-list mutation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    /// The stage id does not identify a stage currently in the pipeline.
    #[error("stage not found in pipeline")]
    StageNotFound,
}

/// Errors raised by the per-frame render entry points.
#[derive(Debug, Error)]
pub enum RenderError {
    /// `render_intrinsic` needs the albedo, shading, and compositor stages.
    #[error("intrinsic pipeline requires three stages (albedo, shading, compositor); have {0}")]
    IncompletePipeline(usize),
    /// The window surface could not provide a frame; the caller decides
    /// whether to reconfigure (lost/outdated) or give up (out of memory).
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

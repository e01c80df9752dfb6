//! Pipeline stage abstraction.
//!
//! A stage wraps one compiled GPU program plus whatever buffers and textures
//! that program needs. The orchestrator drives every stage through the same
//! three lifecycle hooks — resize, render, dispose — in pipeline order;
//! heterogeneous behavior lives entirely behind the trait.

use std::cell::RefCell;
use std::rc::Rc;

use winit::dpi::PhysicalSize;

use crate::error::PipelineError;
use crate::gpu::GpuContext;
use crate::scene::{Camera, Scene};
use crate::timing::FrameTiming;

/// Everything a stage may need for one frame, bundled so every stage is
/// invoked with an identical signature.
///
/// `scene` and `camera` are passed to all stages uniformly; variants that
/// source their input elsewhere (the compositor reads upstream stage
/// textures) accept and ignore them.
pub struct StageFrame<'a> {
    pub scene: &'a Scene,
    pub camera: &'a Camera,
    /// Command encoder shared by every stage this frame; passes are recorded
    /// in stage order and submitted once.
    pub encoder: &'a mut wgpu::CommandEncoder,
    /// The frame target view (window swapchain or off-screen texture).
    pub target: &'a wgpu::TextureView,
    /// Orchestrator background, used as the clear color where a scene does
    /// not override it.
    pub clear_color: wgpu::Color,
    pub timing: FrameTiming,
}

/// One entry in the rendering pipeline.
///
/// Construction is the fourth lifecycle hook: a concrete stage's `new`
/// compiles and links its program (failing fatally on validation errors) and
/// allocates every GPU resource it needs before first use. After `dispose`
/// returns, none of those resources remain; rendering a disposed stage is a
/// contract violation.
///
/// Stages mutate shared GPU state (encoder passes, queue writes) without
/// restoring anything, so pipeline order is a correctness dependency.
pub trait PipelineStage {
    /// Diagnostic name used in log lines.
    fn label(&self) -> &str;

    /// Reallocates size-dependent resources after the frame target changed.
    /// Must be safe to call before the first render.
    fn resize(&mut self, gpu: &GpuContext);

    /// Records this stage's draw commands for the current frame.
    fn render(&mut self, gpu: &GpuContext, frame: &mut StageFrame<'_>);

    /// Releases every GPU resource the stage allocated.
    fn dispose(&mut self);
}

#[derive(Default)]
struct OutputState {
    view: Option<wgpu::TextureView>,
    size: PhysicalSize<u32>,
    rendered: bool,
}

/// Shared handle to a rasterizer stage's most recent color output.
///
/// The producing stage publishes into the slot every frame; consumers (the
/// compositor) read the view without taking ownership of the texture.
/// Single-threaded by construction, hence `Rc<RefCell>`.
#[derive(Clone, Default)]
pub struct OutputSlot {
    inner: Rc<RefCell<OutputState>>,
}

impl OutputSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the producing stage has ever completed a render.
    pub fn has_rendered(&self) -> bool {
        self.inner.borrow().rendered
    }

    /// Latest output view, if one is currently valid. Cleared on resize
    /// until the producer renders at the new size.
    pub fn view(&self) -> Option<wgpu::TextureView> {
        self.inner.borrow().view.clone()
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.inner.borrow().size
    }

    pub(crate) fn publish(&self, view: wgpu::TextureView, size: PhysicalSize<u32>) {
        let mut state = self.inner.borrow_mut();
        state.view = Some(view);
        state.size = size;
        state.rendered = true;
    }

    /// Drops the published view; `rendered` survives because it records
    /// history, not current validity.
    pub(crate) fn invalidate(&self) {
        self.inner.borrow_mut().view = None;
    }

    pub(crate) fn reset(&self) {
        let mut state = self.inner.borrow_mut();
        state.view = None;
        state.rendered = false;
    }
}

/// Identity of a stage within one orchestrator's pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StageId(u64);

struct StageEntry {
    id: StageId,
    stage: Box<dyn PipelineStage>,
}

/// Ordered stage list; insertion order is execution order.
pub(crate) struct StageSet {
    entries: Vec<StageEntry>,
    next_id: u64,
}

impl StageSet {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    pub fn add(&mut self, stage: Box<dyn PipelineStage>) -> StageId {
        let id = StageId(self.next_id);
        self.next_id += 1;
        self.entries.push(StageEntry { id, stage });
        id
    }

    /// Removes the stage with the given id, preserving the order of the
    /// rest. The list is untouched when the id is absent.
    pub fn remove(&mut self, id: StageId) -> Result<Box<dyn PipelineStage>, PipelineError> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(PipelineError::StageNotFound)?;
        Ok(self.entries.remove(index).stage)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn ids(&self) -> Vec<StageId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Box<dyn PipelineStage>> {
        self.entries.get_mut(index).map(|entry| &mut entry.stage)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn PipelineStage>> {
        self.entries.iter_mut().map(|entry| &mut entry.stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullStage;

    impl PipelineStage for NullStage {
        fn label(&self) -> &str {
            "null"
        }

        fn resize(&mut self, _gpu: &GpuContext) {}

        fn render(&mut self, _gpu: &GpuContext, _frame: &mut StageFrame<'_>) {}

        fn dispose(&mut self) {}
    }

    #[test]
    fn add_assigns_unique_ids_in_order() {
        let mut set = StageSet::new();
        let first = set.add(Box::new(NullStage));
        let second = set.add(Box::new(NullStage));
        assert_ne!(first, second);
        assert_eq!(set.ids(), vec![first, second]);
    }

    #[test]
    fn remove_missing_stage_fails_and_leaves_list_unmodified() {
        let mut set = StageSet::new();
        let kept = set.add(Box::new(NullStage));
        let removed = set.add(Box::new(NullStage));
        set.remove(removed).expect("stage is present");

        let result = set.remove(removed);
        assert_eq!(result.err(), Some(PipelineError::StageNotFound));
        assert_eq!(set.ids(), vec![kept]);
    }

    #[test]
    fn add_then_remove_restores_previous_list() {
        let mut set = StageSet::new();
        let base = set.add(Box::new(NullStage));
        let before = set.ids();

        let transient = set.add(Box::new(NullStage));
        set.remove(transient).expect("stage is present");

        assert_eq!(set.ids(), before);
        assert_eq!(set.ids(), vec![base]);
    }

    #[test]
    fn removed_ids_are_never_reused() {
        let mut set = StageSet::new();
        let first = set.add(Box::new(NullStage));
        set.remove(first).expect("stage is present");
        let second = set.add(Box::new(NullStage));
        assert_ne!(first, second);
    }

    #[test]
    fn output_slot_reports_publish_and_invalidate() {
        let slot = OutputSlot::new();
        assert!(!slot.has_rendered());
        assert!(slot.view().is_none());

        slot.invalidate();
        assert!(!slot.has_rendered());

        slot.reset();
        assert!(slot.view().is_none());
        assert!(!slot.has_rendered());
    }
}

//! Orchestrator lifecycle behavior: resize propagation, disposal, and
//! pipeline list identity.

mod common;

use common::{headless_renderer, CallLog, RecordingStage, SharedSurface};
use renderer::{Camera, PipelineError, Renderer, RendererOptions, Scene};
use winit::dpi::PhysicalSize;

#[test]
fn default_surface_is_created_and_sized_to_its_displayed_area() {
    let renderer = match Renderer::new(RendererOptions::new()) {
        Ok(renderer) => renderer,
        Err(err) => {
            eprintln!("skipping GPU test (no usable adapter?): {err:#}");
            return;
        }
    };

    // No surface was supplied, so a default off-screen drawable was created
    // and the backing store reconciled with its displayed size.
    assert_eq!(renderer.pixel_size(), renderer.surface().displayed_size());
    assert_eq!(renderer.gpu().size(), renderer.pixel_size());
    assert_eq!(renderer.stage_count(), 1);
}

#[test]
fn construction_sizes_backing_store_to_displayed_size() {
    let surface = SharedSurface::new(320, 240);
    let options = RendererOptions::new().with_surface(Box::new(surface.clone()));
    let renderer = match Renderer::new(options) {
        Ok(renderer) => renderer,
        Err(err) => {
            eprintln!("skipping GPU test (no usable adapter?): {err:#}");
            return;
        }
    };

    let state = surface.state();
    assert_eq!(state.set_pixel_size_calls, 1);
    assert_eq!(state.pixels, PhysicalSize::new(320, 240));
    assert_eq!(renderer.gpu().size(), PhysicalSize::new(320, 240));
    // Construction also pushed the default background to the surface.
    assert_eq!(state.background, "#000000");
}

#[test]
fn resize_reconciles_only_on_mismatch() {
    let surface = SharedSurface::new(320, 240);
    let options = RendererOptions::new().with_surface(Box::new(surface.clone()));
    let Ok(mut renderer) = Renderer::new(options) else {
        eprintln!("skipping GPU test: no usable adapter");
        return;
    };
    assert_eq!(surface.state().set_pixel_size_calls, 1);

    // Displayed size already equals the backing size: no-op.
    renderer.resize();
    assert_eq!(surface.state().set_pixel_size_calls, 1);

    // The window system changes the displayed size out from under us.
    surface.set_displayed_size(200, 100);
    renderer.resize();
    let state = surface.state();
    assert_eq!(state.set_pixel_size_calls, 2);
    assert_eq!(state.pixels, PhysicalSize::new(200, 100));
    assert_eq!(renderer.gpu().size(), PhysicalSize::new(200, 100));
}

#[test]
fn set_size_runs_resize_hooks_in_pipeline_order() {
    let Some(mut renderer) = headless_renderer(64, 64, Some(vec![])) else {
        return;
    };
    let log = CallLog::new();
    renderer.add_stage(Box::new(RecordingStage::new("first", &log)));
    renderer.add_stage(Box::new(RecordingStage::new("second", &log)));
    log.take();

    renderer.set_size(48, 32);
    assert_eq!(log.take(), vec!["first:resize", "second:resize"]);
    assert_eq!(renderer.gpu().size(), PhysicalSize::new(48, 32));
    assert_eq!(renderer.pixel_size(), PhysicalSize::new(48, 32));

    renderer.set_size(96, 96);
    assert_eq!(log.take(), vec!["first:resize", "second:resize"]);
    assert_eq!(renderer.gpu().size(), PhysicalSize::new(96, 96));
}

#[test]
fn render_invokes_every_stage_in_pipeline_order() {
    let Some(mut renderer) = headless_renderer(32, 32, Some(vec![])) else {
        return;
    };
    let log = CallLog::new();
    renderer.add_stage(Box::new(RecordingStage::new("first", &log)));
    renderer.add_stage(Box::new(RecordingStage::new("second", &log)));
    log.take();

    let scene = Scene::new();
    renderer
        .render(&scene, &Camera::identity())
        .expect("frame");
    assert_eq!(log.take(), vec!["first:render", "second:render"]);
}

#[test]
fn dispose_runs_every_hook_exactly_once() {
    let Some(mut renderer) = headless_renderer(32, 32, Some(vec![])) else {
        return;
    };
    let log = CallLog::new();
    renderer.add_stage(Box::new(RecordingStage::new("first", &log)));
    renderer.add_stage(Box::new(RecordingStage::new("second", &log)));
    log.take();

    renderer.dispose();
    assert_eq!(log.take(), vec!["first:dispose", "second:dispose"]);

    // Idempotent: a second dispose does not re-run the hooks.
    renderer.dispose();
    assert_eq!(log.entries(), Vec::<String>::new());
}

#[test]
fn remove_stage_fails_not_found_and_leaves_pipeline_unmodified() {
    let Some(mut renderer) = headless_renderer(32, 32, Some(vec![])) else {
        return;
    };
    let log = CallLog::new();
    let id = renderer.add_stage(Box::new(RecordingStage::new("extra", &log)));
    renderer.remove_stage(id).expect("stage is present");

    let before = renderer.stage_ids();
    let result = renderer.remove_stage(id);
    assert!(matches!(result, Err(PipelineError::StageNotFound)));
    assert_eq!(renderer.stage_ids(), before);
}

#[test]
fn add_then_remove_restores_pipeline_identity_and_order() {
    let Some(mut renderer) = headless_renderer(32, 32, Some(vec![])) else {
        return;
    };
    let log = CallLog::new();
    renderer.add_stage(Box::new(RecordingStage::new("kept", &log)));
    let before = renderer.stage_ids();

    let transient = renderer.add_stage(Box::new(RecordingStage::new("transient", &log)));
    renderer.remove_stage(transient).expect("stage is present");

    assert_eq!(renderer.stage_ids(), before);
}

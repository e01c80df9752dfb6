//! Intrinsic compositing behavior, verified by off-screen readback.

mod common;

use common::headless_renderer;
use renderer::{Camera, Color, CompositorStage, OutputSlot, RenderError, Scene};

/// Expected 8-bit product channel for unorm inputs multiplied in the shader.
fn product_channel(a: u8, b: u8) -> i32 {
    ((a as f32 / 255.0) * (b as f32 / 255.0) * 255.0).round() as i32
}

fn assert_channel(actual: u8, expected: i32, context: &str) {
    let diff = (actual as i32 - expected).abs();
    assert!(
        diff <= 2,
        "{context}: got {actual}, expected {expected} (+/-2)"
    );
}

#[test]
fn compositor_output_is_per_channel_product_with_full_opacity() {
    let Some(mut renderer) = headless_renderer(64, 64, Some(vec![])) else {
        return;
    };
    renderer
        .configure_intrinsic(Some(vec![]))
        .expect("intrinsic configuration");

    let albedo_color = Color::rgb(255, 128, 64);
    let shading_color = Color::rgb(128, 255, 32);
    let albedo = Scene::with_background(albedo_color);
    let shading = Scene::with_background(shading_color);

    renderer
        .render_intrinsic(&albedo, &shading, &Camera::identity())
        .expect("intrinsic frame");

    let pixels = renderer
        .gpu()
        .read_target_pixels()
        .expect("target readback");
    assert_eq!(pixels.len(), 64 * 64 * 4);

    let expected = [
        product_channel(albedo_color.r, shading_color.r),
        product_channel(albedo_color.g, shading_color.g),
        product_channel(albedo_color.b, shading_color.b),
    ];
    for (index, pixel) in pixels.chunks_exact(4).enumerate() {
        assert_channel(pixel[0], expected[0], &format!("pixel {index} red"));
        assert_channel(pixel[1], expected[1], &format!("pixel {index} green"));
        assert_channel(pixel[2], expected[2], &format!("pixel {index} blue"));
        assert_eq!(pixel[3], 255, "pixel {index} alpha must be forced opaque");
    }
}

#[test]
fn compositor_skips_frame_until_sources_have_rendered() {
    let Some(mut renderer) = headless_renderer(32, 32, Some(vec![])) else {
        return;
    };

    // A compositor whose designated sources never rendered: it must skip its
    // draw instead of sampling undefined texture contents.
    let compositor = CompositorStage::new(renderer.gpu(), OutputSlot::new(), OutputSlot::new())
        .expect("compositor construction");
    renderer.add_stage(Box::new(compositor));

    let background = Color::rgb(200, 40, 120);
    let scene = Scene::with_background(background);
    renderer
        .render(&scene, &Camera::identity())
        .expect("frame with skipping compositor");

    // The frame is exactly the rasterizer output; the skipped compositor
    // contributed nothing.
    let pixels = renderer
        .gpu()
        .read_target_pixels()
        .expect("target readback");
    for (index, pixel) in pixels.chunks_exact(4).enumerate() {
        assert_channel(pixel[0], background.r as i32, &format!("pixel {index} red"));
        assert_channel(pixel[1], background.g as i32, &format!("pixel {index} green"));
        assert_channel(pixel[2], background.b as i32, &format!("pixel {index} blue"));
        assert_eq!(pixel[3], 255, "pixel {index} alpha");
    }
}

#[test]
fn render_intrinsic_requires_three_stages() {
    let Some(mut renderer) = headless_renderer(16, 16, Some(vec![])) else {
        return;
    };
    let scene = Scene::with_background(Color::WHITE);

    let err = renderer
        .render_intrinsic(&scene, &scene, &Camera::identity())
        .expect_err("single-stage pipeline cannot render intrinsically");
    assert!(matches!(err, RenderError::IncompletePipeline(1)));
}

#[test]
fn default_fade_pass_starts_the_first_frame_black() {
    let Some(mut renderer) = headless_renderer(16, 16, None) else {
        return;
    };
    let scene = Scene::with_background(Color::WHITE);

    renderer
        .render(&scene, &Camera::identity())
        .expect("first frame");

    // Frame zero has a zero delta, so the fade factor is still zero.
    let pixels = renderer
        .gpu()
        .read_target_pixels()
        .expect("target readback");
    for (index, pixel) in pixels.chunks_exact(4).enumerate() {
        assert_channel(pixel[0], 0, &format!("pixel {index} red"));
        assert_channel(pixel[1], 0, &format!("pixel {index} green"));
        assert_channel(pixel[2], 0, &format!("pixel {index} blue"));
    }
}

#[test]
fn single_scene_render_reaches_the_frame_target() {
    let Some(mut renderer) = headless_renderer(24, 24, Some(vec![])) else {
        return;
    };
    let background = Color::rgb(0, 64, 255);
    let scene = Scene::with_background(background);

    renderer
        .render(&scene, &Camera::identity())
        .expect("frame");

    let pixels = renderer
        .gpu()
        .read_target_pixels()
        .expect("target readback");
    for (index, pixel) in pixels.chunks_exact(4).enumerate() {
        assert_channel(pixel[0], background.r as i32, &format!("pixel {index} red"));
        assert_channel(pixel[1], background.g as i32, &format!("pixel {index} green"));
        assert_channel(pixel[2], background.b as i32, &format!("pixel {index} blue"));
    }
}

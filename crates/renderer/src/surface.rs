//! Drawable-surface abstraction.
//!
//! The orchestrator never talks to a window system directly; it owns a
//! [`RenderSurface`] that reports a displayed (logical) size, carries the
//! backing pixel size, and tells the GPU layer what to bind. Window-backed
//! implementations live with the embedding application (the viewer wraps a
//! winit window); [`HeadlessSurface`] backs off-screen rendering and tests.

use anyhow::Result;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use winit::dpi::PhysicalSize;

use crate::color::Color;

/// What the GPU context should render into.
///
/// `Window` carries raw handles for `wgpu` surface creation; the surface
/// implementation guarantees the underlying window outlives the GPU context.
#[derive(Clone, Copy)]
pub enum SurfaceBinding {
    Window {
        display: RawDisplayHandle,
        window: RawWindowHandle,
    },
    Offscreen,
}

/// The drawable area the orchestrator renders into.
///
/// Displayed size is what the window system currently shows; pixel size is
/// the backing store the pipeline last configured. The orchestrator's
/// `resize` reconciles the two.
pub trait RenderSurface {
    /// Current logical size as reported by the surface provider.
    fn displayed_size(&self) -> PhysicalSize<u32>;

    /// Backing-store size the pipeline last configured via `set_pixel_size`.
    fn pixel_size(&self) -> PhysicalSize<u32>;

    fn set_pixel_size(&mut self, size: PhysicalSize<u32>);

    /// Applies the textual background encoding (`#rrggbb`) to the surface.
    fn set_background(&mut self, color: &Color);

    /// Tells the GPU layer how to bind this surface.
    fn binding(&self) -> Result<SurfaceBinding>;
}

/// Off-screen surface: a plain size record with no window behind it.
///
/// The displayed size is fixed at construction (tests may adjust it to
/// exercise resize reconciliation); the pixel size starts at zero so the
/// orchestrator's construction-time `resize` performs the initial allocation.
pub struct HeadlessSurface {
    displayed: PhysicalSize<u32>,
    pixels: PhysicalSize<u32>,
    background: String,
}

impl HeadlessSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            displayed: PhysicalSize::new(width, height),
            pixels: PhysicalSize::new(0, 0),
            background: Color::BLACK.to_hex_string(),
        }
    }

    /// Changes the displayed size without touching the backing store, the
    /// way a window system resizes a window out from under the renderer.
    pub fn set_displayed_size(&mut self, width: u32, height: u32) {
        self.displayed = PhysicalSize::new(width, height);
    }

    pub fn background(&self) -> &str {
        &self.background
    }
}

impl RenderSurface for HeadlessSurface {
    fn displayed_size(&self) -> PhysicalSize<u32> {
        self.displayed
    }

    fn pixel_size(&self) -> PhysicalSize<u32> {
        self.pixels
    }

    fn set_pixel_size(&mut self, size: PhysicalSize<u32>) {
        self.pixels = size;
    }

    fn set_background(&mut self, color: &Color) {
        self.background = color.to_hex_string();
    }

    fn binding(&self) -> Result<SurfaceBinding> {
        Ok(SurfaceBinding::Offscreen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_surface_tracks_sizes_independently() {
        let mut surface = HeadlessSurface::new(640, 480);
        assert_eq!(surface.displayed_size(), PhysicalSize::new(640, 480));
        assert_eq!(surface.pixel_size(), PhysicalSize::new(0, 0));

        surface.set_pixel_size(PhysicalSize::new(640, 480));
        surface.set_displayed_size(800, 600);
        assert_eq!(surface.pixel_size(), PhysicalSize::new(640, 480));
        assert_eq!(surface.displayed_size(), PhysicalSize::new(800, 600));
    }

    #[test]
    fn headless_surface_records_background_encoding() {
        let mut surface = HeadlessSurface::new(1, 1);
        surface.set_background(&Color::rgb(0x10, 0x20, 0x30));
        assert_eq!(surface.background(), "#102030");
    }
}

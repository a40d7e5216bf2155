//! Drawable creation: on-screen windows and off-screen render targets
//!
//! A drawable is the surface a context draws into. On-screen drawables
//! own a visible native window; off-screen drawables own a framebuffer
//! target plus a minimal hidden window whose only job is to host a device
//! context, because context creation is device-context-scoped on the
//! platform family this models.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{DisplayError, DisplayResult};
use super::format::FormatId;
use super::platform::{DeviceContextKey, DisplaySystem, FramebufferKey, NativeWindowKey};

/// Pixel viewport: position and size in screen pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Left edge in screen coordinates
    pub x: i32,
    /// Top edge in screen coordinates
    pub y: i32,
    /// Width in pixels
    pub w: u32,
    /// Height in pixels
    pub h: u32,
}

impl Viewport {
    /// Create a viewport
    pub const fn new(x: i32, y: i32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Whether the viewport covers any pixels
    pub const fn has_area(&self) -> bool {
        self.w > 0 && self.h > 0
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(0, 0, 800, 600)
    }
}

/// Drawable kind requested in window settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrawableKind {
    /// Visible on-screen window
    Window,
    /// Off-screen framebuffer target
    Fbo,
}

/// The renderable surface owned by exactly one window.
///
/// Created by [`DrawableFactory`] in `config_init`, destroyed through
/// [`DrawableFactory::destroy`] in `config_exit`. The native window and
/// device context are never shared between windows.
#[derive(Debug)]
pub struct Drawable {
    kind: DrawableKind,
    window: NativeWindowKey,
    device: DeviceContextKey,
    framebuffer: Option<FramebufferKey>,
    viewport: Viewport,
}

impl Drawable {
    /// Which kind of surface this is
    pub fn kind(&self) -> DrawableKind {
        self.kind
    }

    /// The native window hosting the surface (hidden for off-screen)
    pub fn window(&self) -> NativeWindowKey {
        self.window
    }

    /// The device context all format/context/swap operations go through
    pub fn device(&self) -> DeviceContextKey {
        self.device
    }

    /// The framebuffer target, for off-screen drawables
    pub fn framebuffer(&self) -> Option<FramebufferKey> {
        self.framebuffer
    }

    /// Current viewport
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Record a viewport change after a resize event
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}

/// Creates drawables and owns the unwind rules for partial failures.
///
/// Any failure mid-construction releases what was already acquired, in
/// reverse acquisition order, before the error propagates; a failed
/// `config_init` leaks nothing.
pub struct DrawableFactory {
    platform: Arc<dyn DisplaySystem>,
}

impl DrawableFactory {
    /// Create a factory building drawables on `platform`
    pub fn new(platform: Arc<dyn DisplaySystem>) -> Self {
        Self { platform }
    }

    /// Create an on-screen window drawable with `format` applied to its
    /// device context
    pub fn create_on_screen(&self, format: FormatId, viewport: Viewport) -> DisplayResult<Drawable> {
        if !viewport.has_area() {
            return Err(DisplayError::Configuration(
                "on-screen drawable needs a non-empty viewport".into(),
            ));
        }

        let window = self.platform.create_window(viewport, true)?;
        let device = match self.platform.acquire_device_context(window) {
            Ok(device) => device,
            Err(err) => {
                self.discard_window(window);
                return Err(err);
            }
        };

        if let Err(err) = self.platform.apply_pixel_format(device, format) {
            self.discard_device(device);
            self.discard_window(window);
            return Err(err);
        }

        log::debug!(
            "created on-screen drawable {:?} ({}x{})",
            window,
            viewport.w,
            viewport.h
        );
        Ok(Drawable {
            kind: DrawableKind::Window,
            window,
            device,
            framebuffer: None,
            viewport,
        })
    }

    /// Create an off-screen drawable: a hidden 1x1 host window for the
    /// device context plus a framebuffer target sized to `viewport`
    pub fn create_off_screen(
        &self,
        format: FormatId,
        viewport: Viewport,
    ) -> DisplayResult<Drawable> {
        if !viewport.has_area() {
            return Err(DisplayError::Configuration(
                "off-screen drawable needs a non-empty viewport".into(),
            ));
        }

        let window = self.platform.create_window(Viewport::new(0, 0, 1, 1), false)?;
        let device = match self.platform.acquire_device_context(window) {
            Ok(device) => device,
            Err(err) => {
                self.discard_window(window);
                return Err(err);
            }
        };

        let prepared = self
            .platform
            .apply_pixel_format(device, format)
            .and_then(|()| self.platform.create_framebuffer(device, viewport));
        let framebuffer = match prepared {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                self.discard_device(device);
                self.discard_window(window);
                return Err(err);
            }
        };

        log::debug!(
            "created off-screen drawable {:?} ({}x{})",
            framebuffer,
            viewport.w,
            viewport.h
        );
        Ok(Drawable {
            kind: DrawableKind::Fbo,
            window,
            device,
            framebuffer: Some(framebuffer),
            viewport,
        })
    }

    /// Destroy a drawable in the mandatory release order: framebuffer,
    /// device context, native window. Failures are logged and the
    /// resource abandoned; teardown never retries.
    pub fn destroy(&self, drawable: Drawable) {
        if let Some(framebuffer) = drawable.framebuffer {
            if let Err(err) = self.platform.destroy_framebuffer(framebuffer) {
                log::error!("leaking framebuffer target: {}", err);
            }
        }
        self.discard_device(drawable.device);
        self.discard_window(drawable.window);
        log::debug!("destroyed drawable {:?}", drawable.window);
    }

    fn discard_device(&self, device: DeviceContextKey) {
        if let Err(err) = self.platform.release_device_context(device) {
            log::error!("leaking device context: {}", err);
        }
    }

    fn discard_window(&self, window: NativeWindowKey) {
        if let Err(err) = self.platform.destroy_window(window) {
            log::error!("leaking native window: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::format::PixelFormatRequest;
    use crate::display::headless::HeadlessDisplay;
    use crate::display::PixelFormatSelector;

    fn format_for(platform: &Arc<HeadlessDisplay>) -> FormatId {
        let selector = PixelFormatSelector::new(platform.clone() as Arc<dyn DisplaySystem>);
        selector.choose(None, &PixelFormatRequest::default()).unwrap()
    }

    #[test]
    fn test_on_screen_create_and_destroy() {
        let platform = Arc::new(HeadlessDisplay::new());
        let format = format_for(&platform);
        let factory = DrawableFactory::new(platform.clone());

        let drawable = factory
            .create_on_screen(format, Viewport::new(0, 0, 640, 480))
            .unwrap();
        assert_eq!(drawable.kind(), DrawableKind::Window);
        assert!(drawable.framebuffer().is_none());
        assert_eq!(platform.live_windows(), 1);
        assert_eq!(platform.live_devices(), 1);

        factory.destroy(drawable);
        assert_eq!(platform.live_windows(), 0);
        assert_eq!(platform.live_devices(), 0);
    }

    #[test]
    fn test_off_screen_hosts_hidden_window_and_framebuffer() {
        let platform = Arc::new(HeadlessDisplay::new());
        let format = format_for(&platform);
        let factory = DrawableFactory::new(platform.clone());

        let drawable = factory
            .create_off_screen(format, Viewport::new(0, 0, 1920, 1080))
            .unwrap();
        assert_eq!(drawable.kind(), DrawableKind::Fbo);
        assert!(drawable.framebuffer().is_some());
        assert_eq!(drawable.viewport(), Viewport::new(0, 0, 1920, 1080));
        assert_eq!(platform.live_framebuffers(), 1);

        factory.destroy(drawable);
        assert_eq!(platform.live_framebuffers(), 0);
        assert_eq!(platform.live_windows(), 0);
        assert_eq!(platform.live_devices(), 0);
    }

    #[test]
    fn test_window_creation_failure_leaks_nothing() {
        let platform = Arc::new(HeadlessDisplay::new());
        let format = format_for(&platform);
        let factory = DrawableFactory::new(platform.clone());

        platform.fail_next_window_creation();
        let outcome = factory.create_on_screen(format, Viewport::new(0, 0, 640, 480));
        assert!(matches!(outcome, Err(DisplayError::WindowCreationFailed(_))));
        assert_eq!(platform.live_windows(), 0);
        assert_eq!(platform.live_devices(), 0);
    }

    #[test]
    fn test_format_application_failure_unwinds() {
        let platform = Arc::new(HeadlessDisplay::new());
        let format = format_for(&platform);
        let factory = DrawableFactory::new(platform.clone());

        platform.fail_format_application();
        let outcome = factory.create_on_screen(format, Viewport::new(0, 0, 640, 480));
        assert!(matches!(
            outcome,
            Err(DisplayError::FormatApplicationFailed(_))
        ));
        assert_eq!(platform.live_windows(), 0);
        assert_eq!(platform.live_devices(), 0);
    }

    #[test]
    fn test_empty_viewport_rejected() {
        let platform = Arc::new(HeadlessDisplay::new());
        let format = format_for(&platform);
        let factory = DrawableFactory::new(platform);

        let outcome = factory.create_on_screen(format, Viewport::new(0, 0, 0, 480));
        assert!(matches!(outcome, Err(DisplayError::Configuration(_))));
    }
}

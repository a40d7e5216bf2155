//! GLFW-backed on-screen window for single-machine nodes
//!
//! The windowing toolkit is an external collaborator: it owns the native
//! window, the message pump and the GL context, and delivers input and
//! resize events. This module wraps GLFW into that role: pixel format
//! attributes become window hints (the toolkit's coarse format
//! selection), and toolkit events are translated into the crate's event
//! types and forwarded through [`EventDispatch`].
//!
//! Cluster-wide frame lockstep still goes through [`crate::sync::Barrier`];
//! call [`GlfwWindow::swap_buffers`] only after the rendezvous released.

use glfw::Context;
use thiserror::Error;

use crate::events::{
    EventDispatch, EventType, KeyEvent, KeyModifiers, PointerButtons, PointerEvent, SizeEvent,
};
use crate::window::WindowSettings;

/// Toolkit window errors
#[derive(Error, Debug)]
pub enum GlfwWindowError {
    /// GLFW initialization failed
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// Window creation failed, typically because no pixel format matches
    /// the requested hints
    #[error("GLFW window creation failed")]
    CreationFailed,
}

/// On-screen GLFW window with a GL context and event translation
pub struct GlfwWindow {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    pointer: (i32, i32),
}

impl GlfwWindow {
    /// Create a visible window configured from `settings`.
    ///
    /// The pixel format request maps onto GLFW window hints; GLFW picks
    /// the closest matching format itself, which is this backend's legacy
    /// format selection.
    pub fn new(settings: &WindowSettings) -> Result<Self, GlfwWindowError> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| GlfwWindowError::InitializationFailed)?;

        let request = &settings.pixel_format;
        let channel = (request.color_bits.saturating_sub(request.alpha_bits)) / 3;
        glfw.window_hint(glfw::WindowHint::RedBits(Some(channel)));
        glfw.window_hint(glfw::WindowHint::GreenBits(Some(channel)));
        glfw.window_hint(glfw::WindowHint::BlueBits(Some(channel)));
        glfw.window_hint(glfw::WindowHint::AlphaBits(Some(request.alpha_bits)));
        glfw.window_hint(glfw::WindowHint::DepthBits(Some(request.depth_bits)));
        glfw.window_hint(glfw::WindowHint::StencilBits(Some(request.stencil_bits)));
        glfw.window_hint(glfw::WindowHint::Samples(if request.samples > 0 {
            Some(request.samples)
        } else {
            None
        }));
        glfw.window_hint(glfw::WindowHint::DoubleBuffer(request.double_buffered));
        glfw.window_hint(glfw::WindowHint::Stereo(request.stereo));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(
                settings.viewport.w,
                settings.viewport.h,
                &settings.name,
                glfw::WindowMode::Windowed,
            )
            .ok_or(GlfwWindowError::CreationFailed)?;

        window.set_pos(settings.viewport.x, settings.viewport.y);
        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_size_polling(true);
        window.set_pos_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_mouse_button_polling(true);
        window.set_scroll_polling(true);
        window.set_refresh_polling(true);

        window.make_current();
        if let Some(interval) = settings.swap_interval {
            glfw.set_swap_interval(glfw::SwapInterval::Sync(interval));
        }

        Ok(Self {
            glfw,
            window,
            events,
            pointer: (0, 0),
        })
    }

    /// Whether the user requested the window to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Bind the window's GL context on the calling thread
    pub fn make_current(&mut self) {
        self.window.make_current();
    }

    /// Present the back buffer
    pub fn swap_buffers(&mut self) {
        self.window.swap_buffers();
    }

    /// Current framebuffer size in pixels
    pub fn framebuffer_size(&self) -> (u32, u32) {
        let (w, h) = self.window.get_framebuffer_size();
        (w.max(0) as u32, h.max(0) as u32)
    }

    /// The native window handle, for outer layers that need it
    pub fn raw_window_handle(&self) -> raw_window_handle::RawWindowHandle {
        use raw_window_handle::HasRawWindowHandle;
        self.window.raw_window_handle()
    }

    /// Pump the toolkit message loop and forward every pending event to
    /// `target`. Returns the number of events consumed by the target.
    pub fn dispatch_events(&mut self, target: &mut dyn EventDispatch) -> usize {
        self.glfw.poll_events();

        let mut consumed = 0;
        let pending: Vec<_> = glfw::flush_messages(&self.events).collect();
        for (_, event) in pending {
            if self.dispatch_one(&event, target) {
                consumed += 1;
            }
        }
        consumed
    }

    fn dispatch_one(&mut self, event: &glfw::WindowEvent, target: &mut dyn EventDispatch) -> bool {
        match *event {
            glfw::WindowEvent::Size(w, h) => {
                let (x, y) = self.window.get_pos();
                let event = SizeEvent {
                    x,
                    y,
                    w: w.max(0) as u32,
                    h: h.max(0) as u32,
                };
                target.process_resize(EventType::WindowResize, &event)
            }
            glfw::WindowEvent::Pos(x, y) => {
                let (w, h) = self.window.get_size();
                let event = SizeEvent {
                    x,
                    y,
                    w: w.max(0) as u32,
                    h: h.max(0) as u32,
                };
                target.process_resize(EventType::WindowMove, &event)
            }
            glfw::WindowEvent::Close => target.process_stateless(EventType::WindowClose),
            glfw::WindowEvent::Refresh => target.process_stateless(EventType::WindowExpose),
            glfw::WindowEvent::CursorPos(x, y) => {
                let position = (x as i32, y as i32);
                let event = PointerEvent {
                    x: position.0,
                    y: position.1,
                    dx: position.0 - self.pointer.0,
                    dy: position.1 - self.pointer.1,
                    buttons: PointerButtons::empty(),
                    modifiers: KeyModifiers::empty(),
                };
                self.pointer = position;
                target.process_pointer(EventType::PointerMotion, &event)
            }
            glfw::WindowEvent::MouseButton(button, action, modifiers) => {
                let kind = match action {
                    glfw::Action::Press | glfw::Action::Repeat => EventType::PointerPress,
                    glfw::Action::Release => EventType::PointerRelease,
                };
                let event = PointerEvent {
                    x: self.pointer.0,
                    y: self.pointer.1,
                    dx: 0,
                    dy: 0,
                    buttons: translate_button(button),
                    modifiers: translate_modifiers(modifiers),
                };
                target.process_pointer(kind, &event)
            }
            glfw::WindowEvent::Scroll(dx, dy) => {
                let event = PointerEvent {
                    x: self.pointer.0,
                    y: self.pointer.1,
                    dx: dx as i32,
                    dy: dy as i32,
                    buttons: PointerButtons::empty(),
                    modifiers: KeyModifiers::empty(),
                };
                target.process_pointer(EventType::PointerWheel, &event)
            }
            glfw::WindowEvent::Key(_, scancode, action, modifiers) => {
                let kind = match action {
                    glfw::Action::Press | glfw::Action::Repeat => EventType::KeyPress,
                    glfw::Action::Release => EventType::KeyRelease,
                };
                let event = KeyEvent {
                    key: scancode.max(0) as u32,
                    modifiers: translate_modifiers(modifiers),
                };
                target.process_key(kind, &event)
            }
            _ => false,
        }
    }
}

fn translate_modifiers(modifiers: glfw::Modifiers) -> KeyModifiers {
    let mut translated = KeyModifiers::empty();
    if modifiers.contains(glfw::Modifiers::Shift) {
        translated |= KeyModifiers::SHIFT;
    }
    if modifiers.contains(glfw::Modifiers::Control) {
        translated |= KeyModifiers::CONTROL;
    }
    if modifiers.contains(glfw::Modifiers::Alt) {
        translated |= KeyModifiers::ALT;
    }
    if modifiers.contains(glfw::Modifiers::Super) {
        translated |= KeyModifiers::SUPER;
    }
    translated
}

fn translate_button(button: glfw::MouseButton) -> PointerButtons {
    match button {
        glfw::MouseButton::Button1 => PointerButtons::LEFT,
        glfw::MouseButton::Button2 => PointerButtons::RIGHT,
        glfw::MouseButton::Button3 => PointerButtons::MIDDLE,
        _ => PointerButtons::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_translation() {
        let translated = translate_modifiers(glfw::Modifiers::Shift | glfw::Modifiers::Control);
        assert!(translated.contains(KeyModifiers::SHIFT));
        assert!(translated.contains(KeyModifiers::CONTROL));
        assert!(!translated.contains(KeyModifiers::ALT));
    }

    #[test]
    fn test_button_translation() {
        assert_eq!(translate_button(glfw::MouseButton::Button1), PointerButtons::LEFT);
        assert_eq!(translate_button(glfw::MouseButton::Button2), PointerButtons::RIGHT);
        assert_eq!(translate_button(glfw::MouseButton::Button3), PointerButtons::MIDDLE);
    }
}

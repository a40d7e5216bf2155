//! Window event types and the capability-based dispatch interface
//!
//! Event delivery follows two rules:
//! - typed payloads, one struct per event class
//! - handlers return bool (true = consumed, stops forwarding)
//!
//! The windowing toolkit produces these events; [`EventDispatch`]
//! implementors consume them. A window is one implementor; applications
//! layer their own in front of it.

use bitflags::bitflags;

/// Event class identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Window client area was resized
    WindowResize,
    /// Window was moved on screen
    WindowMove,
    /// Window close was requested
    WindowClose,
    /// Window contents need repainting
    WindowExpose,
    /// Window was hidden or minimized
    WindowHide,
    /// Window became visible again
    WindowShow,
    /// Pointer moved
    PointerMotion,
    /// Pointer button was pressed
    PointerPress,
    /// Pointer button was released
    PointerRelease,
    /// Pointer wheel turned
    PointerWheel,
    /// Key was pressed
    KeyPress,
    /// Key was released
    KeyRelease,
}

bitflags! {
    /// Keyboard modifier state attached to pointer and key events
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct KeyModifiers: u8 {
        /// Shift key held
        const SHIFT = 1 << 0;
        /// Control key held
        const CONTROL = 1 << 1;
        /// Alt key held
        const ALT = 1 << 2;
        /// Super (windows/command) key held
        const SUPER = 1 << 3;
    }
}

bitflags! {
    /// Pointer button state
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PointerButtons: u8 {
        /// Primary button
        const LEFT = 1 << 0;
        /// Middle button
        const MIDDLE = 1 << 1;
        /// Secondary button
        const RIGHT = 1 << 2;
    }
}

impl Default for KeyModifiers {
    fn default() -> Self {
        Self::empty()
    }
}

impl Default for PointerButtons {
    fn default() -> Self {
        Self::empty()
    }
}

/// Window size or position change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SizeEvent {
    /// New window x position in screen coordinates
    pub x: i32,
    /// New window y position in screen coordinates
    pub y: i32,
    /// New client area width in pixels
    pub w: u32,
    /// New client area height in pixels
    pub h: u32,
}

/// Pointer motion, press, release or wheel movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PointerEvent {
    /// Pointer x position relative to the window
    pub x: i32,
    /// Pointer y position relative to the window
    pub y: i32,
    /// Motion since the previous pointer event
    pub dx: i32,
    /// Motion since the previous pointer event
    pub dy: i32,
    /// Buttons held during the event
    pub buttons: PointerButtons,
    /// Modifier keys held during the event
    pub modifiers: KeyModifiers,
}

/// Key press or release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KeyEvent {
    /// Platform key code
    pub key: u32,
    /// Modifier keys held during the event
    pub modifiers: KeyModifiers,
}

/// Relative motion on one axis of a multi-axis input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AxisEvent {
    /// Axis index on the device
    pub axis: u8,
    /// Signed axis delta
    pub delta: i32,
}

/// Button change on a multi-button input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonEvent {
    /// Device button index
    pub button: u32,
    /// True on press, false on release
    pub pressed: bool,
}

/// Capability interface for window event consumers.
///
/// One method per event class; each returns true when the event was
/// consumed and must not be forwarded further. Default implementations
/// leave every event unhandled, so implementors override only the classes
/// they care about.
pub trait EventDispatch {
    /// Process a window size or move event
    fn process_resize(&mut self, _kind: EventType, _event: &SizeEvent) -> bool {
        false
    }

    /// Process a pointer event
    fn process_pointer(&mut self, _kind: EventType, _event: &PointerEvent) -> bool {
        false
    }

    /// Process a keyboard event
    fn process_key(&mut self, _kind: EventType, _event: &KeyEvent) -> bool {
        false
    }

    /// Process an axis event from a multi-axis device
    fn process_axis(&mut self, _event: &AxisEvent) -> bool {
        false
    }

    /// Process a button event from a multi-button device
    fn process_button(&mut self, _event: &ButtonEvent) -> bool {
        false
    }

    /// Process an event that carries no payload
    fn process_stateless(&mut self, _kind: EventType) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ResizeOnly {
        resizes: Vec<SizeEvent>,
    }

    impl EventDispatch for ResizeOnly {
        fn process_resize(&mut self, kind: EventType, event: &SizeEvent) -> bool {
            assert_eq!(kind, EventType::WindowResize);
            self.resizes.push(*event);
            true
        }
    }

    #[test]
    fn test_defaults_leave_events_unhandled() {
        let mut handler = ResizeOnly { resizes: Vec::new() };
        assert!(!handler.process_key(EventType::KeyPress, &KeyEvent::default()));
        assert!(!handler.process_pointer(EventType::PointerMotion, &PointerEvent::default()));
        assert!(!handler.process_stateless(EventType::WindowClose));
    }

    #[test]
    fn test_overridden_class_consumes() {
        let mut handler = ResizeOnly { resizes: Vec::new() };
        let event = SizeEvent { x: 0, y: 0, w: 640, h: 480 };
        assert!(handler.process_resize(EventType::WindowResize, &event));
        assert_eq!(handler.resizes, vec![event]);
    }

    #[test]
    fn test_modifier_flags_combine() {
        let mods = KeyModifiers::SHIFT | KeyModifiers::CONTROL;
        assert!(mods.contains(KeyModifiers::SHIFT));
        assert!(!mods.contains(KeyModifiers::ALT));
    }
}

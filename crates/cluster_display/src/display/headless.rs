//! In-process simulated display system
//!
//! Drives the full window/context lifecycle without an OS window system:
//! headless render nodes and the test suite run against it. Lifecycle
//! rules are enforced strictly: stale keys are rejected, pixel formats
//! apply once per device context, release ordering is checked, and
//! current-context state is tracked per thread. Misuse fails here the
//! same way it would on a real driver, minus the crash.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use slotmap::SlotMap;

use super::drawable::Viewport;
use super::error::{DisplayError, DisplayResult};
use super::format::{FormatCapabilities, FormatId, PixelFormatDescriptor, PixelFormatRequest};
use super::platform::{
    DeviceContextKey, DisplaySystem, FramebufferKey, NativeWindowKey, RenderContextKey,
};

/// Tunable behavior of a simulated display
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Candidate formats reported by the queries
    pub formats: Vec<PixelFormatDescriptor>,
    /// Whether the extended attribute-list enumeration exists
    pub extended_formats: bool,
    /// Whether the hardware swap-group extension exists
    pub swap_groups: bool,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            formats: default_format_table(),
            extended_formats: true,
            swap_groups: false,
        }
    }
}

/// A small, realistic candidate table: accelerated double-buffered
/// formats first, plus the odd single-buffered and low-depth entries a
/// ranking pass should steer around.
pub fn default_format_table() -> Vec<PixelFormatDescriptor> {
    const DB_ACCEL: FormatCapabilities = FormatCapabilities::DOUBLE_BUFFER
        .union(FormatCapabilities::ACCELERATED);

    vec![
        PixelFormatDescriptor {
            id: FormatId::new(1),
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            samples: 0,
            capabilities: DB_ACCEL,
        },
        PixelFormatDescriptor {
            id: FormatId::new(2),
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            samples: 4,
            capabilities: DB_ACCEL.union(FormatCapabilities::MULTISAMPLE),
        },
        PixelFormatDescriptor {
            id: FormatId::new(3),
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 0,
            samples: 0,
            capabilities: DB_ACCEL,
        },
        PixelFormatDescriptor {
            id: FormatId::new(4),
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 16,
            stencil_bits: 0,
            samples: 0,
            capabilities: DB_ACCEL,
        },
        PixelFormatDescriptor {
            id: FormatId::new(5),
            color_bits: 16,
            alpha_bits: 0,
            depth_bits: 16,
            stencil_bits: 0,
            samples: 0,
            capabilities: FormatCapabilities::DOUBLE_BUFFER,
        },
        PixelFormatDescriptor {
            id: FormatId::new(6),
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            samples: 0,
            capabilities: FormatCapabilities::ACCELERATED,
        },
        PixelFormatDescriptor {
            id: FormatId::new(7),
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 8,
            samples: 0,
            capabilities: DB_ACCEL.union(FormatCapabilities::STEREO),
        },
    ]
}

/// Operation counters, exposed for tests and diagnostics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeadlessStats {
    /// Successful `make_current` calls
    pub bind_calls: usize,
    /// Successful `swap_buffers` calls
    pub swap_calls: usize,
    /// Windows created over the display's lifetime
    pub windows_created: usize,
    /// Contexts created over the display's lifetime
    pub contexts_created: usize,
}

struct WindowRecord {
    #[allow(dead_code)] // recorded for parity with a real backend
    viewport: Viewport,
    #[allow(dead_code)]
    visible: bool,
    device: Option<DeviceContextKey>,
}

struct DeviceRecord {
    window: Option<NativeWindowKey>,
    applied_format: Option<FormatId>,
    swap_interval: Option<u32>,
    swap_group: Option<(u32, u32)>,
    contexts: usize,
    framebuffers: usize,
}

struct ContextRecord {
    device: DeviceContextKey,
}

struct FramebufferRecord {
    device: DeviceContextKey,
}

#[derive(Default)]
struct HeadlessState {
    windows: SlotMap<NativeWindowKey, WindowRecord>,
    devices: SlotMap<DeviceContextKey, DeviceRecord>,
    contexts: SlotMap<RenderContextKey, ContextRecord>,
    framebuffers: SlotMap<FramebufferKey, FramebufferRecord>,
    current: HashMap<ThreadId, (DeviceContextKey, RenderContextKey)>,
    stats: HeadlessStats,
    fail_next_window: bool,
    fail_format_application: bool,
}

/// Simulated display system backing headless nodes and tests
pub struct HeadlessDisplay {
    config: HeadlessConfig,
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDisplay {
    /// Create a display with the default format table and no hardware
    /// swap groups
    pub fn new() -> Self {
        Self::with_config(HeadlessConfig::default())
    }

    /// Create a display with explicit behavior
    pub fn with_config(config: HeadlessConfig) -> Self {
        Self {
            config,
            state: Mutex::new(HeadlessState::default()),
        }
    }

    /// Number of live native windows
    pub fn live_windows(&self) -> usize {
        self.state.lock().unwrap().windows.len()
    }

    /// Number of live device contexts
    pub fn live_devices(&self) -> usize {
        self.state.lock().unwrap().devices.len()
    }

    /// Number of live rendering contexts
    pub fn live_contexts(&self) -> usize {
        self.state.lock().unwrap().contexts.len()
    }

    /// Number of live framebuffer targets
    pub fn live_framebuffers(&self) -> usize {
        self.state.lock().unwrap().framebuffers.len()
    }

    /// Snapshot of the operation counters
    pub fn stats(&self) -> HeadlessStats {
        self.state.lock().unwrap().stats
    }

    /// Make the next window creation fail (failure-path testing)
    pub fn fail_next_window_creation(&self) {
        self.state.lock().unwrap().fail_next_window = true;
    }

    /// Make every subsequent format application fail (failure-path
    /// testing)
    pub fn fail_format_application(&self) {
        self.state.lock().unwrap().fail_format_application = true;
    }

    /// How many device contexts are members of `group`
    pub fn swap_group_members(&self, group: u32) -> usize {
        let state = self.state.lock().unwrap();
        state
            .devices
            .values()
            .filter(|d| d.swap_group.map(|(g, _)| g) == Some(group))
            .count()
    }

    fn format(&self, id: FormatId) -> Option<&PixelFormatDescriptor> {
        self.config.formats.iter().find(|f| f.id == id)
    }
}

impl DisplaySystem for HeadlessDisplay {
    fn create_window(&self, viewport: Viewport, visible: bool) -> DisplayResult<NativeWindowKey> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_window {
            state.fail_next_window = false;
            return Err(DisplayError::WindowCreationFailed("injected failure".into()));
        }
        let key = state.windows.insert(WindowRecord {
            viewport,
            visible,
            device: None,
        });
        state.stats.windows_created += 1;
        Ok(key)
    }

    fn destroy_window(&self, window: NativeWindowKey) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .windows
            .get(window)
            .ok_or(DisplayError::UnknownHandle("window"))?;
        if record.device.is_some() {
            return Err(DisplayError::ReleaseOrdering(
                "window destroyed before its device context was released",
            ));
        }
        state.windows.remove(window);
        Ok(())
    }

    fn acquire_device_context(&self, window: NativeWindowKey) -> DisplayResult<DeviceContextKey> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .windows
            .get(window)
            .ok_or(DisplayError::UnknownHandle("window"))?;
        if record.device.is_some() {
            return Err(DisplayError::DeviceContextUnavailable(
                "window already has a device context".into(),
            ));
        }
        let device = state.devices.insert(DeviceRecord {
            window: Some(window),
            applied_format: None,
            swap_interval: None,
            swap_group: None,
            contexts: 0,
            framebuffers: 0,
        });
        state.windows[window].device = Some(device);
        Ok(device)
    }

    fn acquire_display_device_context(&self, _device: u32) -> DisplayResult<DeviceContextKey> {
        let mut state = self.state.lock().unwrap();
        let device = state.devices.insert(DeviceRecord {
            window: None,
            applied_format: None,
            swap_interval: None,
            swap_group: None,
            contexts: 0,
            framebuffers: 0,
        });
        Ok(device)
    }

    fn release_device_context(&self, device: DeviceContextKey) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .devices
            .get(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        if record.contexts > 0 {
            return Err(DisplayError::ReleaseOrdering(
                "device context released while rendering contexts exist on it",
            ));
        }
        if record.framebuffers > 0 {
            return Err(DisplayError::ReleaseOrdering(
                "device context released while framebuffer targets exist on it",
            ));
        }
        if record.swap_group.is_some() {
            return Err(DisplayError::ReleaseOrdering(
                "device context released while still in a swap group",
            ));
        }
        if state.current.values().any(|(d, _)| *d == device) {
            return Err(DisplayError::ReleaseOrdering(
                "device context released while current on a thread",
            ));
        }
        let window = state.devices.remove(device).and_then(|r| r.window);
        if let Some(window) = window {
            if let Some(record) = state.windows.get_mut(window) {
                record.device = None;
            }
        }
        Ok(())
    }

    fn enumerate_pixel_formats(
        &self,
        device: DeviceContextKey,
    ) -> DisplayResult<Vec<PixelFormatDescriptor>> {
        if !self.config.extended_formats {
            return Err(DisplayError::CapabilityMissing("extended pixel format query"));
        }
        let state = self.state.lock().unwrap();
        if !state.devices.contains_key(device) {
            return Err(DisplayError::UnknownHandle("device context"));
        }
        if !state.current.contains_key(&thread::current().id()) {
            return Err(DisplayError::CapabilityMissing(
                "extended pixel format query needs a current context",
            ));
        }
        Ok(self.config.formats.clone())
    }

    fn choose_basic_format(
        &self,
        device: DeviceContextKey,
        request: &PixelFormatRequest,
    ) -> DisplayResult<FormatId> {
        let state = self.state.lock().unwrap();
        if !state.devices.contains_key(device) {
            return Err(DisplayError::UnknownHandle("device context"));
        }
        // Coarse query: first candidate meeting the mandatory attributes,
        // in format-index order.
        self.config
            .formats
            .iter()
            .filter(|f| f.satisfies_mandatory(request))
            .min_by_key(|f| f.id)
            .map(|f| f.id)
            .ok_or(DisplayError::NoMatchingFormat)
    }

    fn apply_pixel_format(&self, device: DeviceContextKey, format: FormatId) -> DisplayResult<()> {
        if self.format(format).is_none() {
            return Err(DisplayError::FormatApplicationFailed(format!(
                "format {} is not in the platform table",
                format.index()
            )));
        }
        let mut state = self.state.lock().unwrap();
        if state.fail_format_application {
            return Err(DisplayError::FormatApplicationFailed("injected failure".into()));
        }
        let record = state
            .devices
            .get_mut(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        if record.applied_format.is_some() {
            return Err(DisplayError::FormatApplicationFailed(
                "pixel format already applied to this device context".into(),
            ));
        }
        record.applied_format = Some(format);
        Ok(())
    }

    fn create_framebuffer(
        &self,
        device: DeviceContextKey,
        viewport: Viewport,
    ) -> DisplayResult<FramebufferKey> {
        if !viewport.has_area() {
            return Err(DisplayError::FramebufferUnavailable(
                "framebuffer target needs a non-empty viewport".into(),
            ));
        }
        let mut state = self.state.lock().unwrap();
        let record = state
            .devices
            .get_mut(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        if record.applied_format.is_none() {
            return Err(DisplayError::FramebufferUnavailable(
                "device context has no pixel format applied".into(),
            ));
        }
        record.framebuffers += 1;
        Ok(state.framebuffers.insert(FramebufferRecord { device }))
    }

    fn destroy_framebuffer(&self, framebuffer: FramebufferKey) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .framebuffers
            .remove(framebuffer)
            .ok_or(DisplayError::UnknownHandle("framebuffer"))?;
        if let Some(device) = state.devices.get_mut(record.device) {
            device.framebuffers -= 1;
        }
        Ok(())
    }

    fn create_context(
        &self,
        device: DeviceContextKey,
        share_with: Option<RenderContextKey>,
    ) -> DisplayResult<RenderContextKey> {
        let mut state = self.state.lock().unwrap();
        if let Some(share) = share_with {
            if !state.contexts.contains_key(share) {
                return Err(DisplayError::UnknownHandle("share context"));
            }
        }
        let record = state
            .devices
            .get_mut(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        if record.applied_format.is_none() {
            return Err(DisplayError::Configuration(
                "cannot create a context before a pixel format is applied".into(),
            ));
        }
        record.contexts += 1;
        state.stats.contexts_created += 1;
        Ok(state.contexts.insert(ContextRecord { device }))
    }

    fn destroy_context(&self, context: RenderContextKey) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.current.values().any(|(_, c)| *c == context) {
            return Err(DisplayError::ContextStillBound);
        }
        let record = state
            .contexts
            .remove(context)
            .ok_or(DisplayError::UnknownHandle("context"))?;
        if let Some(device) = state.devices.get_mut(record.device) {
            device.contexts -= 1;
        }
        Ok(())
    }

    fn make_current(
        &self,
        device: DeviceContextKey,
        context: RenderContextKey,
    ) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.devices.contains_key(device) {
            return Err(DisplayError::UnknownHandle("device context"));
        }
        let creation_device = state
            .contexts
            .get(context)
            .map(|c| c.device)
            .ok_or(DisplayError::UnknownHandle("context"))?;

        // A context may bind to a different device context only when both
        // carry the same pixel format.
        if creation_device != device {
            let creation_format =
                state.devices.get(creation_device).and_then(|d| d.applied_format);
            let target_format = state.devices[device].applied_format;
            if creation_format != target_format {
                return Err(DisplayError::Configuration(
                    "context bound to a device context with a different pixel format".into(),
                ));
            }
        }

        let caller = thread::current().id();
        let elsewhere = state
            .current
            .iter()
            .any(|(thread, (_, c))| *c == context && *thread != caller);
        if elsewhere {
            return Err(DisplayError::ContextBusy);
        }

        state.current.insert(caller, (device, context));
        state.stats.bind_calls += 1;
        Ok(())
    }

    fn clear_current(&self) {
        let mut state = self.state.lock().unwrap();
        state.current.remove(&thread::current().id());
    }

    fn swap_buffers(&self, device: DeviceContextKey) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.devices.contains_key(device) {
            return Err(DisplayError::UnknownHandle("device context"));
        }
        state.stats.swap_calls += 1;
        Ok(())
    }

    fn set_swap_interval(&self, device: DeviceContextKey, interval: u32) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .devices
            .get_mut(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        record.swap_interval = Some(interval);
        Ok(())
    }

    fn supports_swap_group(&self) -> bool {
        self.config.swap_groups
    }

    fn join_swap_group(
        &self,
        device: DeviceContextKey,
        group: u32,
        barrier: u32,
    ) -> DisplayResult<()> {
        if !self.config.swap_groups {
            return Err(DisplayError::CapabilityMissing("swap group extension"));
        }
        let mut state = self.state.lock().unwrap();
        let record = state
            .devices
            .get_mut(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        record.swap_group = Some((group, barrier));
        Ok(())
    }

    fn leave_swap_group(&self, device: DeviceContextKey) -> DisplayResult<()> {
        let mut state = self.state.lock().unwrap();
        let record = state
            .devices
            .get_mut(device)
            .ok_or(DisplayError::UnknownHandle("device context"))?;
        record.swap_group = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_device(display: &HeadlessDisplay) -> (NativeWindowKey, DeviceContextKey) {
        let window = display
            .create_window(Viewport::new(0, 0, 64, 64), false)
            .unwrap();
        let device = display.acquire_device_context(window).unwrap();
        let format = display
            .choose_basic_format(device, &PixelFormatRequest::default())
            .unwrap();
        display.apply_pixel_format(device, format).unwrap();
        (window, device)
    }

    #[test]
    fn test_format_application_is_one_shot() {
        let display = HeadlessDisplay::new();
        let (_window, device) = ready_device(&display);

        let outcome = display.apply_pixel_format(device, FormatId::new(1));
        assert!(matches!(
            outcome,
            Err(DisplayError::FormatApplicationFailed(_))
        ));
    }

    #[test]
    fn test_stale_keys_are_rejected() {
        let display = HeadlessDisplay::new();
        let window = display
            .create_window(Viewport::new(0, 0, 64, 64), false)
            .unwrap();
        display.destroy_window(window).unwrap();

        assert!(matches!(
            display.acquire_device_context(window),
            Err(DisplayError::UnknownHandle("window"))
        ));
        assert!(matches!(
            display.destroy_window(window),
            Err(DisplayError::UnknownHandle("window"))
        ));
    }

    #[test]
    fn test_release_ordering_enforced() {
        let display = HeadlessDisplay::new();
        let (window, device) = ready_device(&display);
        let context = display.create_context(device, None).unwrap();

        // Window before device context, device context before context:
        // both must be rejected.
        assert!(matches!(
            display.destroy_window(window),
            Err(DisplayError::ReleaseOrdering(_))
        ));
        assert!(matches!(
            display.release_device_context(device),
            Err(DisplayError::ReleaseOrdering(_))
        ));

        display.destroy_context(context).unwrap();
        display.release_device_context(device).unwrap();
        display.destroy_window(window).unwrap();
    }

    #[test]
    fn test_context_requires_applied_format() {
        let display = HeadlessDisplay::new();
        let window = display
            .create_window(Viewport::new(0, 0, 64, 64), false)
            .unwrap();
        let device = display.acquire_device_context(window).unwrap();

        assert!(matches!(
            display.create_context(device, None),
            Err(DisplayError::Configuration(_))
        ));
    }

    #[test]
    fn test_destroy_context_while_current_fails() {
        let display = HeadlessDisplay::new();
        let (_window, device) = ready_device(&display);
        let context = display.create_context(device, None).unwrap();

        display.make_current(device, context).unwrap();
        assert!(matches!(
            display.destroy_context(context),
            Err(DisplayError::ContextStillBound)
        ));
        display.clear_current();
        display.destroy_context(context).unwrap();
    }

    #[test]
    fn test_swap_group_membership_tracked() {
        let display = HeadlessDisplay::with_config(HeadlessConfig {
            swap_groups: true,
            ..HeadlessConfig::default()
        });
        let (_window, device) = ready_device(&display);

        display.join_swap_group(device, 1, 1).unwrap();
        assert_eq!(display.swap_group_members(1), 1);
        display.leave_swap_group(device).unwrap();
        assert_eq!(display.swap_group_members(1), 0);
        // Leaving twice stays a no-op.
        display.leave_swap_group(device).unwrap();
    }
}

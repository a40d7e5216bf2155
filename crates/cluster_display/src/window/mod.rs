//! Window composition root
//!
//! A [`Window`] composes the pixel-format selector, the drawable factory,
//! the context manager and the swap synchronizer into one lifecycle:
//!
//! `config_init` -> [frame loop: `make_current`, draw, `swap_buffers`,
//! `done_current`] -> `config_exit`
//!
//! Failure anywhere in `config_init` unwinds every partially acquired
//! resource before the error propagates; the window is never left
//! half-initialized and usable. All failures also record a descriptive
//! message retrievable via [`Window::last_error`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::display::{
    ContextManager, DeviceContextKey, DisplayError, DisplayResult, DisplaySystem, Drawable,
    DrawableFactory, DrawableKind, FormatId, PixelFormatRequest, PixelFormatSelector,
    RenderContextKey, SwapGroupMembership, SwapSynchronizer, Viewport,
};
use crate::events::{EventDispatch, EventType, SizeEvent};
use crate::foundation::time::FrameTimer;
use crate::sync::Barrier;

/// Hardware swap group and barrier to join at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapGroupSettings {
    /// Swap group identifier (0 = none)
    pub group: u32,
    /// Swap barrier identifier within the group
    pub barrier: u32,
}

/// Per-window configuration, fixed at `config_init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    /// Window name, used in logs and window titles
    pub name: String,
    /// Initial viewport
    pub viewport: Viewport,
    /// On-screen window or off-screen target
    pub drawable: DrawableKind,
    /// Requested drawable capabilities
    pub pixel_format: PixelFormatRequest,
    /// Hardware swap group to join, if any
    pub swap_group: Option<SwapGroupSettings>,
    /// Vertical-sync swap interval, if any
    pub swap_interval: Option<u32>,
    /// GPU device index for affinity, if any
    pub device: Option<u32>,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            name: "window".into(),
            viewport: Viewport::default(),
            drawable: DrawableKind::Window,
            pixel_format: PixelFormatRequest::default(),
            swap_group: None,
            swap_interval: None,
            device: None,
        }
    }
}

/// Cluster node configuration: the windows this node drives plus the
/// party count for the software swap barrier.
///
/// This replaces process-global state (thread counts, shared barrier
/// pointers) with an explicit structure handed to each coordination unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node name, used in logs
    pub name: String,
    /// Number of parties that rendezvous at each frame boundary
    pub parties: usize,
    /// Windows driven by this node
    pub windows: Vec<WindowSettings>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "node".into(),
            parties: 1,
            windows: vec![WindowSettings::default()],
        }
    }
}

impl Config for NodeConfig {}

/// Everything that exists only between `config_init` and `config_exit`
struct ActiveSurface {
    format: FormatId,
    drawable: Drawable,
    context: RenderContextKey,
    swap_sync: SwapSynchronizer,
    affinity_device: Option<DeviceContextKey>,
}

/// One window of a cluster node: a drawable, its rendering context, and
/// the swap synchronization binding it to its peers
pub struct Window {
    platform: Arc<dyn DisplaySystem>,
    contexts: Arc<ContextManager>,
    selector: PixelFormatSelector,
    factory: DrawableFactory,
    settings: WindowSettings,
    surface: Option<ActiveSurface>,
    frame_timer: FrameTimer,
    last_error: Option<String>,
    close_requested: bool,
}

impl Window {
    /// Create an uninitialized window. `contexts` is shared by every
    /// window of the node so contexts can share GPU objects.
    pub fn new(
        platform: Arc<dyn DisplaySystem>,
        contexts: Arc<ContextManager>,
        settings: WindowSettings,
    ) -> Self {
        let selector = PixelFormatSelector::new(platform.clone());
        let factory = DrawableFactory::new(platform.clone());
        Self {
            platform,
            contexts,
            selector,
            factory,
            settings,
            surface: None,
            frame_timer: FrameTimer::new(),
            last_error: None,
            close_requested: false,
        }
    }

    /// The window's configuration
    pub fn settings(&self) -> &WindowSettings {
        &self.settings
    }

    /// Whether `config_init` has completed successfully
    pub fn is_initialized(&self) -> bool {
        self.surface.is_some()
    }

    /// The most recent failure message, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// The window's rendering context, for sharing with other windows
    pub fn context(&self) -> Option<RenderContextKey> {
        self.surface.as_ref().map(|s| s.context)
    }

    /// The chosen pixel format, once initialized
    pub fn pixel_format(&self) -> Option<FormatId> {
        self.surface.as_ref().map(|s| s.format)
    }

    /// Current viewport: the drawable's when initialized, the configured
    /// one otherwise
    pub fn viewport(&self) -> Viewport {
        self.surface
            .as_ref()
            .map_or(self.settings.viewport, |s| s.drawable.viewport())
    }

    /// Whether a close event was delivered
    pub fn close_requested(&self) -> bool {
        self.close_requested
    }

    /// Frames presented since creation
    pub fn frames(&self) -> u64 {
        self.frame_timer.frames()
    }

    /// Average presented frames per second
    pub fn average_fps(&self) -> f64 {
        self.frame_timer.average_fps()
    }

    /// Initialize the window: affinity device -> pixel format ->
    /// drawable -> context -> bind -> swap setup.
    pub fn config_init(&mut self) -> DisplayResult<()> {
        self.config_init_shared(None)
    }

    /// Initialize, sharing GPU objects with `share`'s context.
    ///
    /// `share` must itself be initialized on the same display system.
    pub fn config_init_shared(&mut self, share: Option<&Self>) -> DisplayResult<()> {
        if self.surface.is_some() {
            return self.record(Err(DisplayError::Configuration(
                "window is already initialized".into(),
            )));
        }
        let share_context = share.and_then(Self::context);

        match self.init_surface(share_context) {
            Ok(surface) => {
                log::info!(
                    "window '{}' initialized: format {}, {:?} drawable",
                    self.settings.name,
                    surface.format.index(),
                    self.settings.drawable
                );
                self.surface = Some(surface);
                self.last_error = None;
                Ok(())
            }
            Err(err) => {
                log::error!("window '{}' initialization failed: {}", self.settings.name, err);
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn init_surface(&self, share: Option<RenderContextKey>) -> DisplayResult<ActiveSurface> {
        let affinity_device = match self.settings.device {
            Some(device) => Some(self.platform.acquire_display_device_context(device)?),
            None => None,
        };

        let format = match self.selector.choose(affinity_device, &self.settings.pixel_format) {
            Ok(format) => format,
            Err(err) => {
                self.release_affinity(affinity_device);
                return Err(err);
            }
        };

        let created = match self.settings.drawable {
            DrawableKind::Window => self.factory.create_on_screen(format, self.settings.viewport),
            DrawableKind::Fbo => self.factory.create_off_screen(format, self.settings.viewport),
        };
        let drawable = match created {
            Ok(drawable) => drawable,
            Err(err) => {
                self.release_affinity(affinity_device);
                return Err(err);
            }
        };

        let context = match self.contexts.create(drawable.device(), share) {
            Ok(context) => context,
            Err(err) => {
                self.factory.destroy(drawable);
                self.release_affinity(affinity_device);
                return Err(err);
            }
        };

        if let Err(err) = self.contexts.make_current(context, drawable.device()) {
            self.discard_context(context);
            self.factory.destroy(drawable);
            self.release_affinity(affinity_device);
            return Err(err);
        }

        let mut swap_sync = SwapSynchronizer::new(self.platform.clone(), drawable.device());
        if let Err(err) = self.init_swap(&mut swap_sync) {
            self.discard_bind();
            self.discard_context(context);
            self.factory.destroy(drawable);
            self.release_affinity(affinity_device);
            return Err(err);
        }

        Ok(ActiveSurface {
            format,
            drawable,
            context,
            swap_sync,
            affinity_device,
        })
    }

    fn init_swap(&self, swap_sync: &mut SwapSynchronizer) -> DisplayResult<()> {
        if let Some(interval) = self.settings.swap_interval {
            swap_sync.set_swap_interval(interval)?;
        }
        if let Some(group) = self.settings.swap_group {
            swap_sync.join_group(group.group, group.barrier)?;
        }
        Ok(())
    }

    /// Tear the window down in the mandatory order: swap group ->
    /// unbind -> context -> drawable -> affinity device.
    ///
    /// Teardown failures are logged and the resource abandoned; no retry.
    /// Calling this on an uninitialized window is a no-op.
    pub fn config_exit(&mut self) {
        let Some(mut surface) = self.surface.take() else {
            return;
        };

        if let Err(err) = surface.swap_sync.leave_group() {
            log::error!(
                "window '{}': leaving swap group failed: {}",
                self.settings.name,
                err
            );
        }
        self.discard_bind();
        self.discard_context(surface.context);
        self.factory.destroy(surface.drawable);
        self.release_affinity(surface.affinity_device);
        log::info!("window '{}' torn down", self.settings.name);
    }

    /// Bind the window's context for the calling thread (cached)
    pub fn make_current(&mut self) -> DisplayResult<()> {
        let (context, device) = self.bound_pair()?;
        let outcome = self.contexts.make_current(context, device);
        self.record(outcome)
    }

    /// Bind the window's context, bypassing the bind cache
    pub fn make_current_forced(&mut self) -> DisplayResult<()> {
        let (context, device) = self.bound_pair()?;
        let outcome = self.contexts.make_current_forced(context, device);
        self.record(outcome)
    }

    /// Release the calling thread's current context
    pub fn done_current(&mut self) -> DisplayResult<()> {
        let outcome = self.contexts.done_current();
        self.record(outcome)
    }

    /// Present the frame, synchronized with the window's swap peers
    pub fn swap_buffers(&mut self) -> DisplayResult<()> {
        let outcome = match &self.surface {
            Some(surface) => surface.swap_sync.swap_buffers(),
            None => Err(Self::uninitialized()),
        };
        if outcome.is_ok() {
            self.frame_timer.tick();
        }
        self.record(outcome)
    }

    /// Install the software swap barrier shared with the window's peers.
    /// `parties` counts every window and node in the rendezvous.
    pub fn set_swap_barrier(&mut self, barrier: Arc<Barrier>, parties: usize) -> DisplayResult<()> {
        match &mut self.surface {
            Some(surface) => {
                surface.swap_sync.set_software_barrier(barrier, parties);
                Ok(())
            }
            None => {
                let err = Self::uninitialized();
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Join a hardware swap group after initialization
    pub fn join_swap_group(&mut self, group: u32, barrier: u32) -> DisplayResult<()> {
        let outcome = match &mut self.surface {
            Some(surface) => surface.swap_sync.join_group(group, barrier),
            None => Err(Self::uninitialized()),
        };
        self.record(outcome)
    }

    /// Leave the hardware swap group. Safe when never joined.
    pub fn leave_swap_group(&mut self) -> DisplayResult<()> {
        let outcome = match &mut self.surface {
            Some(surface) => surface.swap_sync.leave_group(),
            None => Err(Self::uninitialized()),
        };
        self.record(outcome)
    }

    /// Current hardware swap membership, if any
    pub fn swap_group_membership(&self) -> Option<SwapGroupMembership> {
        self.surface.as_ref().and_then(|s| s.swap_sync.membership())
    }

    fn bound_pair(&mut self) -> DisplayResult<(RenderContextKey, DeviceContextKey)> {
        match &self.surface {
            Some(surface) => Ok((surface.context, surface.drawable.device())),
            None => {
                let err = Self::uninitialized();
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    fn uninitialized() -> DisplayError {
        DisplayError::Configuration("window is not initialized".into())
    }

    fn record<T>(&mut self, outcome: DisplayResult<T>) -> DisplayResult<T> {
        if let Err(err) = &outcome {
            self.last_error = Some(err.to_string());
        }
        outcome
    }

    fn discard_bind(&self) {
        if let Err(err) = self.contexts.done_current() {
            log::error!("window '{}': unbind failed: {}", self.settings.name, err);
        }
    }

    fn discard_context(&self, context: RenderContextKey) {
        if let Err(err) = self.contexts.destroy(context) {
            log::error!(
                "window '{}': leaking render context: {}",
                self.settings.name,
                err
            );
        }
    }

    fn release_affinity(&self, device: Option<DeviceContextKey>) {
        if let Some(device) = device {
            if let Err(err) = self.platform.release_device_context(device) {
                log::error!(
                    "window '{}': leaking affinity device context: {}",
                    self.settings.name,
                    err
                );
            }
        }
    }
}

impl EventDispatch for Window {
    fn process_resize(&mut self, kind: EventType, event: &SizeEvent) -> bool {
        match kind {
            EventType::WindowResize => {
                let viewport = Viewport::new(event.x, event.y, event.w, event.h);
                self.settings.viewport = viewport;
                if let Some(surface) = &mut self.surface {
                    surface.drawable.set_viewport(viewport);
                }
                true
            }
            EventType::WindowMove => {
                self.settings.viewport.x = event.x;
                self.settings.viewport.y = event.y;
                if let Some(surface) = &mut self.surface {
                    let mut viewport = surface.drawable.viewport();
                    viewport.x = event.x;
                    viewport.y = event.y;
                    surface.drawable.set_viewport(viewport);
                }
                true
            }
            _ => false,
        }
    }

    fn process_stateless(&mut self, kind: EventType) -> bool {
        match kind {
            EventType::WindowClose => {
                self.close_requested = true;
                true
            }
            EventType::WindowExpose => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::headless::HeadlessDisplay;

    fn node(kind: DrawableKind) -> (Arc<HeadlessDisplay>, Window) {
        let platform = Arc::new(HeadlessDisplay::new());
        let contexts = Arc::new(ContextManager::new(
            platform.clone() as Arc<dyn DisplaySystem>
        ));
        let settings = WindowSettings {
            drawable: kind,
            ..WindowSettings::default()
        };
        let window = Window::new(
            platform.clone() as Arc<dyn DisplaySystem>,
            contexts,
            settings,
        );
        (platform, window)
    }

    #[test]
    fn test_config_init_and_exit_leak_free() {
        let (platform, mut window) = node(DrawableKind::Window);

        window.config_init().unwrap();
        assert!(window.is_initialized());
        assert!(window.pixel_format().is_some());
        assert_eq!(platform.live_windows(), 1);
        assert_eq!(platform.live_contexts(), 1);

        window.config_exit();
        assert!(!window.is_initialized());
        assert_eq!(platform.live_windows(), 0);
        assert_eq!(platform.live_devices(), 0);
        assert_eq!(platform.live_contexts(), 0);
    }

    #[test]
    fn test_off_screen_window_lifecycle() {
        let (platform, mut window) = node(DrawableKind::Fbo);

        window.config_init().unwrap();
        assert_eq!(platform.live_framebuffers(), 1);
        window.config_exit();
        assert_eq!(platform.live_framebuffers(), 0);
        assert_eq!(platform.live_windows(), 0);
    }

    #[test]
    fn test_failed_init_sets_error_and_leaks_nothing() {
        let (platform, mut window) = node(DrawableKind::Window);

        platform.fail_next_window_creation();
        let outcome = window.config_init();
        assert!(outcome.is_err());
        assert!(!window.is_initialized());
        assert!(window.last_error().is_some());
        assert_eq!(platform.live_windows(), 0);
        assert_eq!(platform.live_devices(), 0);
        assert_eq!(platform.live_contexts(), 0);
    }

    #[test]
    fn test_affinity_device_lifecycle() {
        let platform = Arc::new(HeadlessDisplay::new());
        let contexts = Arc::new(ContextManager::new(
            platform.clone() as Arc<dyn DisplaySystem>
        ));
        let settings = WindowSettings {
            device: Some(1),
            ..WindowSettings::default()
        };
        let mut window = Window::new(
            platform.clone() as Arc<dyn DisplaySystem>,
            contexts,
            settings,
        );

        window.config_init().unwrap();
        // Drawable device context plus the affinity device context.
        assert_eq!(platform.live_devices(), 2);

        window.config_exit();
        assert_eq!(platform.live_devices(), 0);
        assert_eq!(platform.live_windows(), 0);
    }

    #[test]
    fn test_double_init_rejected() {
        let (_platform, mut window) = node(DrawableKind::Window);
        window.config_init().unwrap();
        assert!(matches!(
            window.config_init(),
            Err(DisplayError::Configuration(_))
        ));
        window.config_exit();
    }

    #[test]
    fn test_frame_ops_require_initialization() {
        let (_platform, mut window) = node(DrawableKind::Window);
        assert!(window.make_current().is_err());
        assert!(window.swap_buffers().is_err());
        assert!(window.last_error().is_some());
    }

    #[test]
    fn test_frame_loop_counts_frames() {
        let (platform, mut window) = node(DrawableKind::Window);
        window.config_init().unwrap();

        for _ in 0..3 {
            window.make_current().unwrap();
            window.swap_buffers().unwrap();
            window.done_current().unwrap();
        }
        assert_eq!(window.frames(), 3);
        assert_eq!(platform.stats().swap_calls, 3);
        window.config_exit();
    }

    #[test]
    fn test_shared_context_init() {
        let platform = Arc::new(HeadlessDisplay::new());
        let contexts = Arc::new(ContextManager::new(
            platform.clone() as Arc<dyn DisplaySystem>
        ));
        let mut first = Window::new(
            platform.clone() as Arc<dyn DisplaySystem>,
            contexts.clone(),
            WindowSettings::default(),
        );
        let mut second = Window::new(
            platform.clone() as Arc<dyn DisplaySystem>,
            contexts,
            WindowSettings {
                name: "shared".into(),
                ..WindowSettings::default()
            },
        );

        first.config_init().unwrap();
        second.config_init_shared(Some(&first)).unwrap();
        assert_ne!(first.context(), second.context());

        second.config_exit();
        first.config_exit();
        assert_eq!(platform.live_contexts(), 0);
    }

    #[test]
    fn test_resize_event_updates_viewport() {
        let (_platform, mut window) = node(DrawableKind::Window);
        window.config_init().unwrap();

        let event = SizeEvent {
            x: 10,
            y: 20,
            w: 1024,
            h: 768,
        };
        assert!(window.process_resize(EventType::WindowResize, &event));
        assert_eq!(window.viewport(), Viewport::new(10, 20, 1024, 768));
        window.config_exit();
    }

    #[test]
    fn test_close_event_consumed() {
        let (_platform, mut window) = node(DrawableKind::Window);
        assert!(!window.close_requested());
        assert!(window.process_stateless(EventType::WindowClose));
        assert!(window.close_requested());
        // Pointer events are not this layer's concern.
        assert!(!window.process_stateless(EventType::PointerMotion));
    }

    #[test]
    fn test_node_config_toml_round_trip() {
        let config = NodeConfig {
            name: "left-wall".into(),
            parties: 4,
            windows: vec![WindowSettings {
                name: "wall-0".into(),
                viewport: Viewport::new(0, 0, 2560, 1440),
                drawable: DrawableKind::Window,
                swap_group: Some(SwapGroupSettings { group: 1, barrier: 1 }),
                swap_interval: Some(1),
                device: Some(0),
                ..WindowSettings::default()
            }],
        };

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_node_config_file_round_trip() {
        let config = NodeConfig::default();
        let path = std::env::temp_dir().join("cluster_display_node_config_test.toml");

        config.save_to_file(&path).unwrap();
        let loaded = NodeConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }
}

//! Rendering context ownership and current-binding enforcement
//!
//! Per-context state machine: Unbound -> Current(thread) -> Unbound ->
//! ... -> Destroyed. The manager detects violations (binding a context
//! that is current on another thread, destroying a context that is still
//! bound) and reports them. It never queues or serializes: one draw
//! thread per context is the caller's contract, and the driver corrupts
//! state when that contract is broken silently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};

use super::error::{DisplayError, DisplayResult};
use super::platform::{DeviceContextKey, DisplaySystem, RenderContextKey};

#[derive(Default)]
struct BindingTable {
    /// Which thread has each context current
    bound: HashMap<RenderContextKey, ThreadId>,
    /// What each thread has current, for bind caching
    current: HashMap<ThreadId, (RenderContextKey, DeviceContextKey)>,
}

/// Owns GPU rendering contexts and the rules for binding them.
///
/// One manager is shared by all windows of a node so contexts can share
/// GPU objects (`share_with`) and so cross-window binding violations are
/// visible in one place.
pub struct ContextManager {
    platform: Arc<dyn DisplaySystem>,
    table: Mutex<BindingTable>,
}

impl ContextManager {
    /// Create a manager for contexts on `platform`
    pub fn new(platform: Arc<dyn DisplaySystem>) -> Self {
        Self {
            platform,
            table: Mutex::new(BindingTable::default()),
        }
    }

    /// Create a rendering context on `device`, optionally sharing GPU
    /// objects with an existing context on the same device
    pub fn create(
        &self,
        device: DeviceContextKey,
        share_with: Option<RenderContextKey>,
    ) -> DisplayResult<RenderContextKey> {
        let context = self.platform.create_context(device, share_with)?;
        log::debug!("created render context {:?}", context);
        Ok(context)
    }

    /// Bind `context` to `device` for the calling thread.
    ///
    /// Cached: when the same context/device pair is already current on
    /// this thread, the platform is not called again. Use
    /// [`Self::make_current_forced`] after external binding changes.
    ///
    /// Fails with [`DisplayError::ContextBusy`] while another thread has
    /// the context current.
    pub fn make_current(
        &self,
        context: RenderContextKey,
        device: DeviceContextKey,
    ) -> DisplayResult<()> {
        self.bind(context, device, false)
    }

    /// Bind even when the cache says the pair is already current
    pub fn make_current_forced(
        &self,
        context: RenderContextKey,
        device: DeviceContextKey,
    ) -> DisplayResult<()> {
        self.bind(context, device, true)
    }

    fn bind(
        &self,
        context: RenderContextKey,
        device: DeviceContextKey,
        force: bool,
    ) -> DisplayResult<()> {
        let mut table = self.table.lock().unwrap();
        let caller = thread::current().id();

        if let Some(&owner) = table.bound.get(&context) {
            if owner != caller {
                return Err(DisplayError::ContextBusy);
            }
            if !force && table.current.get(&caller) == Some(&(context, device)) {
                return Ok(());
            }
        }

        self.platform.make_current(device, context)?;

        // Rebinding implicitly unbinds whatever this thread had current.
        if let Some((previous, _)) = table.current.insert(caller, (context, device)) {
            if previous != context {
                table.bound.remove(&previous);
            }
        }
        table.bound.insert(context, caller);
        Ok(())
    }

    /// Release the calling thread's current context, if any.
    ///
    /// Also invalidates the bind cache for this thread; a later
    /// `make_current` always reaches the platform.
    pub fn done_current(&self) -> DisplayResult<()> {
        let mut table = self.table.lock().unwrap();
        let caller = thread::current().id();

        if let Some((context, _)) = table.current.remove(&caller) {
            table.bound.remove(&context);
            self.platform.clear_current();
        }
        Ok(())
    }

    /// Destroy `context`.
    ///
    /// Fails with [`DisplayError::ContextStillBound`] while any thread
    /// has the context current; callers must unbind first, because the
    /// driver invalidates state unpredictably otherwise.
    pub fn destroy(&self, context: RenderContextKey) -> DisplayResult<()> {
        let mut table = self.table.lock().unwrap();

        if table.bound.contains_key(&context) {
            return Err(DisplayError::ContextStillBound);
        }
        // Cache entries must not outlive the context.
        table.current.retain(|_, entry| entry.0 != context);

        self.platform.destroy_context(context)?;
        log::debug!("destroyed render context {:?}", context);
        Ok(())
    }

    /// Whether any thread currently has `context` bound
    pub fn is_bound(&self, context: RenderContextKey) -> bool {
        self.table.lock().unwrap().bound.contains_key(&context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::drawable::{DrawableFactory, Viewport};
    use crate::display::format::{PixelFormatRequest, PixelFormatSelector};
    use crate::display::headless::HeadlessDisplay;
    use crate::display::Drawable;
    use std::sync::mpsc;

    fn setup() -> (Arc<HeadlessDisplay>, ContextManager, Drawable) {
        let platform = Arc::new(HeadlessDisplay::new());
        let selector = PixelFormatSelector::new(platform.clone() as Arc<dyn DisplaySystem>);
        let format = selector.choose(None, &PixelFormatRequest::default()).unwrap();
        let factory = DrawableFactory::new(platform.clone() as Arc<dyn DisplaySystem>);
        let drawable = factory
            .create_on_screen(format, Viewport::new(0, 0, 320, 240))
            .unwrap();
        let manager = ContextManager::new(platform.clone() as Arc<dyn DisplaySystem>);
        (platform, manager, drawable)
    }

    #[test]
    fn test_bind_unbind_destroy_sequence() {
        let (_platform, manager, drawable) = setup();
        let context = manager.create(drawable.device(), None).unwrap();

        manager.make_current(context, drawable.device()).unwrap();
        assert!(manager.is_bound(context));
        manager.done_current().unwrap();
        assert!(!manager.is_bound(context));
        manager.destroy(context).unwrap();
    }

    #[test]
    fn test_destroy_while_bound_fails() {
        let (_platform, manager, drawable) = setup();
        let context = manager.create(drawable.device(), None).unwrap();

        manager.make_current(context, drawable.device()).unwrap();
        assert!(matches!(
            manager.destroy(context),
            Err(DisplayError::ContextStillBound)
        ));

        manager.done_current().unwrap();
        manager.destroy(context).unwrap();
    }

    #[test]
    fn test_repeat_bind_is_cached() {
        let (platform, manager, drawable) = setup();
        let context = manager.create(drawable.device(), None).unwrap();

        let binds_before = platform.stats().bind_calls;
        manager.make_current(context, drawable.device()).unwrap();
        manager.make_current(context, drawable.device()).unwrap();
        assert_eq!(platform.stats().bind_calls, binds_before + 1);

        manager.make_current_forced(context, drawable.device()).unwrap();
        assert_eq!(platform.stats().bind_calls, binds_before + 2);
    }

    #[test]
    fn test_done_current_invalidates_cache() {
        let (platform, manager, drawable) = setup();
        let context = manager.create(drawable.device(), None).unwrap();

        manager.make_current(context, drawable.device()).unwrap();
        manager.done_current().unwrap();
        manager.make_current(context, drawable.device()).unwrap();
        assert_eq!(platform.stats().bind_calls, 2);
    }

    #[test]
    fn test_context_busy_on_other_thread() {
        let (_platform, manager, drawable) = setup();
        let manager = Arc::new(manager);
        let context = manager.create(drawable.device(), None).unwrap();
        let device = drawable.device();

        let (bound_tx, bound_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let worker = {
            let manager = manager.clone();
            thread::spawn(move || {
                manager.make_current(context, device).unwrap();
                bound_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                manager.done_current().unwrap();
            })
        };

        bound_rx.recv().unwrap();
        assert!(matches!(
            manager.make_current(context, device),
            Err(DisplayError::ContextBusy)
        ));

        release_tx.send(()).unwrap();
        worker.join().unwrap();
        manager.make_current(context, device).unwrap();
        manager.done_current().unwrap();
    }

    #[test]
    fn test_shared_context_creation() {
        let (_platform, manager, drawable) = setup();
        let first = manager.create(drawable.device(), None).unwrap();
        let second = manager.create(drawable.device(), Some(first)).unwrap();
        assert_ne!(first, second);
        manager.destroy(second).unwrap();
        manager.destroy(first).unwrap();
    }
}

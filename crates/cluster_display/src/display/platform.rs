//! The display-system seam and typed platform resource keys
//!
//! Every platform resource is addressed by a strongly-typed slotmap key.
//! Keys are `Copy`, become stale when the resource is released, and a
//! stale key is rejected with [`DisplayError::UnknownHandle`] instead of
//! reaching the driver.
//!
//! [`DisplayError`]: super::error::DisplayError

use slotmap::new_key_type;

use super::drawable::Viewport;
use super::error::DisplayResult;
use super::format::{FormatId, PixelFormatDescriptor, PixelFormatRequest};

new_key_type! {
    /// Native window resource key
    pub struct NativeWindowKey;

    /// Device context resource key
    pub struct DeviceContextKey;

    /// GPU rendering context resource key
    pub struct RenderContextKey;

    /// Off-screen framebuffer target resource key
    pub struct FramebufferKey;
}

/// Interface to the underlying window system and GPU driver.
///
/// Implementations use interior mutability (`&self` methods) because one
/// display system is shared by every window and render thread on the
/// node. Methods that observe "the current context" observe it for the
/// calling thread.
pub trait DisplaySystem: Send + Sync {
    /// Create a native window sized to `viewport`. Hidden windows host
    /// device contexts for off-screen targets and format probes.
    fn create_window(&self, viewport: Viewport, visible: bool) -> DisplayResult<NativeWindowKey>;

    /// Destroy a native window. Its device context must have been
    /// released first.
    fn destroy_window(&self, window: NativeWindowKey) -> DisplayResult<()>;

    /// Acquire the device context of a window
    fn acquire_device_context(&self, window: NativeWindowKey) -> DisplayResult<DeviceContextKey>;

    /// Acquire a device context for a display device (GPU affinity),
    /// independent of any window
    fn acquire_display_device_context(&self, device: u32) -> DisplayResult<DeviceContextKey>;

    /// Release a device context. Contexts and framebuffers created on it
    /// must have been destroyed first.
    fn release_device_context(&self, device: DeviceContextKey) -> DisplayResult<()>;

    /// Enumerate all candidate pixel formats with full attribute detail.
    ///
    /// This is the extended query: it requires a context to be current on
    /// the calling thread and reports `CapabilityMissing` otherwise, or
    /// when the platform has no extended query at all.
    fn enumerate_pixel_formats(
        &self,
        device: DeviceContextKey,
    ) -> DisplayResult<Vec<PixelFormatDescriptor>>;

    /// Choose a format using the coarse legacy query. Works without a
    /// current context; only the basic attributes participate.
    fn choose_basic_format(
        &self,
        device: DeviceContextKey,
        request: &PixelFormatRequest,
    ) -> DisplayResult<FormatId>;

    /// Apply a pixel format to a device context. One-shot: a second
    /// application on the same device context fails.
    fn apply_pixel_format(&self, device: DeviceContextKey, format: FormatId) -> DisplayResult<()>;

    /// Create an off-screen framebuffer target on a device context
    fn create_framebuffer(
        &self,
        device: DeviceContextKey,
        viewport: Viewport,
    ) -> DisplayResult<FramebufferKey>;

    /// Destroy an off-screen framebuffer target
    fn destroy_framebuffer(&self, framebuffer: FramebufferKey) -> DisplayResult<()>;

    /// Create a rendering context on a device context, optionally sharing
    /// GPU objects with an existing context
    fn create_context(
        &self,
        device: DeviceContextKey,
        share_with: Option<RenderContextKey>,
    ) -> DisplayResult<RenderContextKey>;

    /// Destroy a rendering context. Fails while the context is current on
    /// any thread.
    fn destroy_context(&self, context: RenderContextKey) -> DisplayResult<()>;

    /// Bind a context to a device context for the calling thread
    fn make_current(
        &self,
        device: DeviceContextKey,
        context: RenderContextKey,
    ) -> DisplayResult<()>;

    /// Release the calling thread's current context, if any
    fn clear_current(&self);

    /// Present the back buffer of the drawable behind `device`
    fn swap_buffers(&self, device: DeviceContextKey) -> DisplayResult<()>;

    /// Set the vertical-sync swap interval for `device`
    fn set_swap_interval(&self, device: DeviceContextKey, interval: u32) -> DisplayResult<()>;

    /// Whether the hardware swap-group extension is present
    fn supports_swap_group(&self) -> bool;

    /// Bind `device` to a hardware swap group and barrier
    fn join_swap_group(
        &self,
        device: DeviceContextKey,
        group: u32,
        barrier: u32,
    ) -> DisplayResult<()>;

    /// Unbind `device` from its hardware swap group. Must succeed as a
    /// no-op when the device never joined one.
    fn leave_swap_group(&self, device: DeviceContextKey) -> DisplayResult<()>;
}

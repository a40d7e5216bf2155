//! Display-system abstraction: pixel formats, drawables, contexts, swaps
//!
//! The [`DisplaySystem`] trait is the seam to the underlying window system
//! and GPU driver. [`HeadlessDisplay`] is the shipped implementation, an
//! in-process simulated display used by headless render nodes and by the
//! test suite. The lifecycle components ([`PixelFormatSelector`],
//! [`DrawableFactory`], [`ContextManager`], [`SwapSynchronizer`]) are
//! written against the trait and work unchanged on any backend.

pub mod context;
pub mod drawable;
pub mod error;
pub mod format;
#[cfg(feature = "glfw")]
pub mod glfw_window;
pub mod headless;
pub mod platform;
pub mod swap;

pub use context::ContextManager;
pub use drawable::{Drawable, DrawableFactory, DrawableKind, Viewport};
pub use error::{DisplayError, DisplayResult};
pub use format::{
    FormatCapabilities, FormatId, PixelFormatDescriptor, PixelFormatRequest, PixelFormatSelector,
};
pub use headless::{HeadlessConfig, HeadlessDisplay, HeadlessStats};
pub use platform::{
    DeviceContextKey, DisplaySystem, FramebufferKey, NativeWindowKey, RenderContextKey,
};
pub use swap::{SwapGroupMembership, SwapSynchronizer};

#[cfg(feature = "glfw")]
pub use glfw_window::GlfwWindow;

//! Error taxonomy for the display and context layer

use thiserror::Error;

/// Errors surfaced by display-system operations and lifecycle enforcement
#[derive(Error, Debug)]
pub enum DisplayError {
    /// Requested window attributes are invalid or contradictory
    #[error("invalid window configuration: {0}")]
    Configuration(String),

    /// No pixel format satisfies the mandatory request attributes
    #[error("no pixel format matches the requested attributes")]
    NoMatchingFormat,

    /// Native window creation failed
    #[error("window creation failed: {0}")]
    WindowCreationFailed(String),

    /// A device context could not be acquired for a window or display device
    #[error("device context unavailable: {0}")]
    DeviceContextUnavailable(String),

    /// Applying the chosen pixel format to the device context failed.
    ///
    /// Format application is one-shot per device context; a second attempt
    /// is a fatal configuration error, never a retryable condition.
    #[error("pixel format application failed: {0}")]
    FormatApplicationFailed(String),

    /// Off-screen framebuffer target creation failed
    #[error("framebuffer target unavailable: {0}")]
    FramebufferUnavailable(String),

    /// The context is current on another thread
    #[error("context is current on another thread")]
    ContextBusy,

    /// The context is still current somewhere and cannot be destroyed
    #[error("context is still bound; call done_current before destroy")]
    ContextStillBound,

    /// A resource was released while dependent resources were still alive
    #[error("resource release ordering violated: {0}")]
    ReleaseOrdering(&'static str),

    /// A resource key does not refer to a live platform resource
    #[error("unknown or stale {0} handle")]
    UnknownHandle(&'static str),

    /// The platform lacks an optional capability. Callers with a fallback
    /// strategy recover from this locally; it never reaches the user when
    /// a fallback exists.
    #[error("platform capability missing: {0}")]
    CapabilityMissing(&'static str),

    /// Rendezvous failure during a synchronized swap
    #[error(transparent)]
    Sync(#[from] crate::sync::SyncError),
}

/// Result type for display operations
pub type DisplayResult<T> = Result<T, DisplayError>;

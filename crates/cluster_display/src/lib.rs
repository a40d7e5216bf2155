//! # Cluster Display
//!
//! Per-node window/context management and frame-lockstep swap
//! synchronization for distributed rendering clusters.
//!
//! Each cluster node owns one or more drawables (on-screen windows or
//! off-screen render targets) bound to a GPU rendering context. All nodes
//! present their finished frame in lock-step so that displays driven by
//! different GPUs and machines show one tear-free, globally consistent
//! image.
//!
//! ## Features
//!
//! - **Pixel format negotiation**: extended attribute-list queries with a
//!   legacy fallback, deterministic ranking of candidate formats
//! - **Drawable lifecycle**: on-screen windows and off-screen targets with
//!   guaranteed release ordering, including on every failure path
//! - **Context ownership**: single-owner-at-a-time current-binding with
//!   misuse detection (`ContextBusy`, `ContextStillBound`)
//! - **Swap synchronization**: hardware swap-group/barrier membership when
//!   the driver supports it, a software rendezvous [`sync::Barrier`]
//!   otherwise
//! - **Headless operation**: the whole lifecycle runs against an
//!   in-process simulated display system, for render nodes without a
//!   display and for tests
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cluster_display::prelude::*;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let platform: Arc<dyn DisplaySystem> = Arc::new(HeadlessDisplay::new());
//!     let contexts = Arc::new(ContextManager::new(platform.clone()));
//!
//!     let mut window = Window::new(platform, contexts, WindowSettings::default());
//!     window.config_init()?;
//!     loop {
//!         window.make_current()?;
//!         // draw
//!         window.swap_buffers()?;
//!         window.done_current()?;
//!         # break;
//!     }
//!     window.config_exit();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod display;
pub mod events;
pub mod foundation;
pub mod sync;
pub mod window;

pub use display::{DisplayError, DisplayResult, DisplaySystem, HeadlessDisplay};
pub use sync::Barrier;
pub use window::{NodeConfig, Window, WindowSettings};

#[cfg(test)]
mod tests;

/// Common imports for library users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError},
        display::{
            ContextManager, DisplayError, DisplayResult, DisplaySystem, Drawable, DrawableFactory,
            DrawableKind, HeadlessDisplay, PixelFormatRequest, PixelFormatSelector,
            SwapSynchronizer, Viewport,
        },
        events::{EventDispatch, EventType},
        sync::Barrier,
        window::{NodeConfig, SwapGroupSettings, Window, WindowSettings},
    };
}

//! Thread and node rendezvous primitives

pub mod barrier;

pub use barrier::{Barrier, SyncError, SyncResult};

//! Swap-buffer synchronization
//!
//! Two mechanisms, composable: hardware swap groups, where the driver
//! releases all member swaps in the same vertical-sync interval, and a
//! software rendezvous over [`Barrier`] for nodes the hardware cannot
//! span: different machines, or GPUs without the extension. The
//! software barrier runs before the platform swap, so no node presents
//! frame N until every party has finished drawing it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::DisplayResult;
use super::platform::{DeviceContextKey, DisplaySystem};
use crate::sync::Barrier;

/// Hardware swap group and barrier membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapGroupMembership {
    /// Swap group identifier
    pub group: u32,
    /// Swap barrier identifier within the group
    pub barrier: u32,
}

struct SoftwareSwapSync {
    barrier: Arc<Barrier>,
    parties: usize,
}

/// Coordinates buffer swaps of one drawable with its group peers.
///
/// Owned by the window, bound to the drawable's device context for the
/// drawable's lifetime. [`Self::leave_group`] must run before the
/// drawable or context is destroyed (lingering hardware membership on a
/// destroyed drawable is undefined behavior in the driver), and window
/// teardown calls it unconditionally.
pub struct SwapSynchronizer {
    platform: Arc<dyn DisplaySystem>,
    device: DeviceContextKey,
    membership: Option<SwapGroupMembership>,
    software: Option<SoftwareSwapSync>,
}

impl SwapSynchronizer {
    /// Create a synchronizer for the drawable behind `device`
    pub fn new(platform: Arc<dyn DisplaySystem>, device: DeviceContextKey) -> Self {
        Self {
            platform,
            device,
            membership: None,
            software: None,
        }
    }

    /// Join a hardware swap group and barrier. Group 0 leaves instead.
    ///
    /// When the extension is absent this degrades to a logged no-op; the
    /// software barrier remains the synchronization mechanism and the
    /// caller does not see an error.
    pub fn join_group(&mut self, group: u32, barrier: u32) -> DisplayResult<()> {
        if group == 0 {
            return self.leave_group();
        }
        if !self.platform.supports_swap_group() {
            log::warn!(
                "hardware swap group unavailable; swap group {} not joined",
                group
            );
            return Ok(());
        }

        self.platform.join_swap_group(self.device, group, barrier)?;
        self.membership = Some(SwapGroupMembership { group, barrier });
        log::debug!("joined swap group {} barrier {}", group, barrier);
        Ok(())
    }

    /// Leave the hardware swap group.
    ///
    /// Safe when never joined. The platform call is made regardless of
    /// recorded membership, matching the unconditional leave during
    /// window teardown.
    pub fn leave_group(&mut self) -> DisplayResult<()> {
        self.platform.leave_swap_group(self.device)?;
        if self.membership.take().is_some() {
            log::debug!("left swap group");
        }
        Ok(())
    }

    /// Current hardware membership, if any
    pub fn membership(&self) -> Option<SwapGroupMembership> {
        self.membership
    }

    /// Install the software rendezvous used when no hardware group spans
    /// the participants. `parties` counts every window and node that must
    /// finish a frame before any swap proceeds.
    pub fn set_software_barrier(&mut self, barrier: Arc<Barrier>, parties: usize) {
        self.software = Some(SoftwareSwapSync { barrier, parties });
    }

    /// Remove the software rendezvous
    pub fn clear_software_barrier(&mut self) {
        self.software = None;
    }

    /// Forward the vertical-sync swap interval to the platform
    pub fn set_swap_interval(&self, interval: u32) -> DisplayResult<()> {
        self.platform.set_swap_interval(self.device, interval)
    }

    /// Present the frame.
    ///
    /// Blocks on the software barrier first when one is installed, then
    /// performs the platform swap. With hardware membership the driver
    /// additionally gates the swap on the group barrier.
    pub fn swap_buffers(&self) -> DisplayResult<()> {
        if let Some(software) = &self.software {
            software.barrier.enter(software.parties)?;
        }
        self.platform.swap_buffers(self.device)
    }
}

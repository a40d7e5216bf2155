//! Pixel format negotiation
//!
//! Two query strategies, tried in order: the extended attribute-list
//! enumeration (needs a current context, so a throwaway probe context is
//! built first), then the platform's coarse legacy chooser. Ranking of
//! extended candidates happens here, not in the platform, so it is
//! deterministic across backends.

use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::drawable::Viewport;
use super::error::{DisplayError, DisplayResult};
use super::platform::{DeviceContextKey, DisplaySystem, NativeWindowKey, RenderContextKey};

/// Opaque platform pixel-format identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatId(u32);

impl FormatId {
    /// Wrap a platform format index
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// The platform format index
    pub const fn index(self) -> u32 {
        self.0
    }
}

bitflags! {
    /// Capability bits reported for a candidate pixel format
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FormatCapabilities: u8 {
        /// Front and back buffer pair
        const DOUBLE_BUFFER = 1 << 0;
        /// Left and right stereo buffers
        const STEREO = 1 << 1;
        /// sRGB-encoded color buffer
        const SRGB = 1 << 2;
        /// Hardware accelerated
        const ACCELERATED = 1 << 3;
        /// Multisample capable
        const MULTISAMPLE = 1 << 4;
    }
}

/// Requested drawable capabilities, fixed once per window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelFormatRequest {
    /// Total color buffer bits including alpha
    pub color_bits: u32,
    /// Alpha channel bits
    pub alpha_bits: u32,
    /// Depth buffer bits
    pub depth_bits: u32,
    /// Stencil buffer bits
    pub stencil_bits: u32,
    /// Multisample sample count (0 = no multisampling)
    pub samples: u32,
    /// Whether a back buffer is required
    pub double_buffered: bool,
    /// Whether quad-buffered stereo is required
    pub stereo: bool,
}

impl Default for PixelFormatRequest {
    fn default() -> Self {
        Self {
            color_bits: 32,
            alpha_bits: 8,
            depth_bits: 24,
            stencil_bits: 0,
            samples: 0,
            double_buffered: true,
            stereo: false,
        }
    }
}

/// One candidate format as reported by the platform's extended query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormatDescriptor {
    /// Platform format identifier
    pub id: FormatId,
    /// Total color buffer bits including alpha
    pub color_bits: u32,
    /// Alpha channel bits
    pub alpha_bits: u32,
    /// Depth buffer bits
    pub depth_bits: u32,
    /// Stencil buffer bits
    pub stencil_bits: u32,
    /// Multisample sample count
    pub samples: u32,
    /// Capability flags
    pub capabilities: FormatCapabilities,
}

impl PixelFormatDescriptor {
    /// Whether this candidate satisfies the request's mandatory
    /// attributes: color depth, double buffering, and stereo when asked.
    pub fn satisfies_mandatory(&self, request: &PixelFormatRequest) -> bool {
        if self.color_bits < request.color_bits {
            return false;
        }
        if request.double_buffered && !self.capabilities.contains(FormatCapabilities::DOUBLE_BUFFER)
        {
            return false;
        }
        if request.stereo && !self.capabilities.contains(FormatCapabilities::STEREO) {
            return false;
        }
        true
    }
}

/// Throwaway drawable and context hosting an extended format query.
///
/// The extended enumeration needs a current context, but the window being
/// configured has no context yet. The probe breaks the cycle: hidden 1x1
/// window, legacy format, minimal context, made current just long enough
/// to run the query. Dropped in strict release order on every exit path.
struct ProbeContext {
    platform: Arc<dyn DisplaySystem>,
    window: NativeWindowKey,
    device: DeviceContextKey,
    context: RenderContextKey,
}

impl ProbeContext {
    fn create(
        platform: Arc<dyn DisplaySystem>,
        request: &PixelFormatRequest,
    ) -> DisplayResult<Self> {
        let window = platform.create_window(Viewport::new(0, 0, 1, 1), false)?;

        let device = match platform.acquire_device_context(window) {
            Ok(device) => device,
            Err(err) => {
                discard(platform.destroy_window(window), "probe window");
                return Err(err);
            }
        };

        let prepared = platform
            .choose_basic_format(device, request)
            .and_then(|format| platform.apply_pixel_format(device, format))
            .and_then(|()| platform.create_context(device, None));

        let context = match prepared {
            Ok(context) => context,
            Err(err) => {
                discard(platform.release_device_context(device), "probe device context");
                discard(platform.destroy_window(window), "probe window");
                return Err(err);
            }
        };

        if let Err(err) = platform.make_current(device, context) {
            discard(platform.destroy_context(context), "probe context");
            discard(platform.release_device_context(device), "probe device context");
            discard(platform.destroy_window(window), "probe window");
            return Err(err);
        }

        Ok(Self {
            platform,
            window,
            device,
            context,
        })
    }

    fn device(&self) -> DeviceContextKey {
        self.device
    }
}

impl Drop for ProbeContext {
    fn drop(&mut self) {
        self.platform.clear_current();
        discard(self.platform.destroy_context(self.context), "probe context");
        discard(
            self.platform.release_device_context(self.device),
            "probe device context",
        );
        discard(self.platform.destroy_window(self.window), "probe window");
    }
}

fn discard(result: DisplayResult<()>, what: &str) {
    if let Err(err) = result {
        log::error!("leaking {}: {}", what, err);
    }
}

/// Chooses the closest matching pixel format for a request
pub struct PixelFormatSelector {
    platform: Arc<dyn DisplaySystem>,
}

impl PixelFormatSelector {
    /// Create a selector querying through `platform`
    pub fn new(platform: Arc<dyn DisplaySystem>) -> Self {
        Self { platform }
    }

    /// Choose the closest matching format.
    ///
    /// `query_device` is the device context formats are enumerated
    /// against, typically the GPU-affinity device context when the window
    /// has one. When `None`, the probe's own device context is used.
    ///
    /// Fails with [`DisplayError::NoMatchingFormat`] when no candidate
    /// satisfies the mandatory attributes; this is fatal to window
    /// initialization.
    pub fn choose(
        &self,
        query_device: Option<DeviceContextKey>,
        request: &PixelFormatRequest,
    ) -> DisplayResult<FormatId> {
        if request.color_bits == 0 {
            return Err(DisplayError::Configuration(
                "pixel format request needs a color buffer".into(),
            ));
        }

        match self.choose_extended(query_device, request) {
            Err(DisplayError::CapabilityMissing(what)) => {
                log::debug!(
                    "extended pixel format query unavailable ({}); using legacy query",
                    what
                );
                self.choose_legacy(query_device, request)
            }
            outcome => outcome,
        }
    }

    fn choose_extended(
        &self,
        query_device: Option<DeviceContextKey>,
        request: &PixelFormatRequest,
    ) -> DisplayResult<FormatId> {
        let probe = ProbeContext::create(self.platform.clone(), request)?;
        let device = query_device.unwrap_or_else(|| probe.device());
        let candidates = self.platform.enumerate_pixel_formats(device)?;
        drop(probe);

        rank_candidates(&candidates, request).ok_or(DisplayError::NoMatchingFormat)
    }

    fn choose_legacy(
        &self,
        query_device: Option<DeviceContextKey>,
        request: &PixelFormatRequest,
    ) -> DisplayResult<FormatId> {
        if let Some(device) = query_device {
            return self.platform.choose_basic_format(device, request);
        }

        // No affinity device: a short-lived hidden window hosts the query.
        let window = self.platform.create_window(Viewport::new(0, 0, 1, 1), false)?;
        let device = match self.platform.acquire_device_context(window) {
            Ok(device) => device,
            Err(err) => {
                discard(self.platform.destroy_window(window), "format query window");
                return Err(err);
            }
        };

        let chosen = self.platform.choose_basic_format(device, request);
        discard(
            self.platform.release_device_context(device),
            "format query device context",
        );
        discard(self.platform.destroy_window(window), "format query window");
        chosen
    }
}

/// Pick the best-matching candidate: exact bit-depth matches first, then
/// minimal over-allocation, then lowest format id for determinism.
fn rank_candidates(
    candidates: &[PixelFormatDescriptor],
    request: &PixelFormatRequest,
) -> Option<FormatId> {
    let mut best: Option<((u32, u32, u32), FormatId)> = None;

    for candidate in candidates {
        if !candidate.satisfies_mandatory(request) {
            continue;
        }
        let score = candidate_score(candidate, request);
        let entry = (score, candidate.id);
        match best {
            Some(current) if current <= entry => {}
            _ => best = Some(entry),
        }
    }

    best.map(|(_, id)| id)
}

/// Lexicographic score: (attribute shortfall, inexact attribute count,
/// over-allocated bits). Lower is better on every component.
fn candidate_score(candidate: &PixelFormatDescriptor, request: &PixelFormatRequest) -> (u32, u32, u32) {
    let pairs = [
        (candidate.color_bits, request.color_bits),
        (candidate.alpha_bits, request.alpha_bits),
        (candidate.depth_bits, request.depth_bits),
        (candidate.stencil_bits, request.stencil_bits),
        (candidate.samples, request.samples),
    ];

    let mut deficit = 0;
    let mut inexact = 0;
    let mut excess = 0;
    for (have, want) in pairs {
        deficit += want.saturating_sub(have);
        excess += have.saturating_sub(want);
        if have != want {
            inexact += 1;
        }
    }
    if candidate.capabilities.contains(FormatCapabilities::DOUBLE_BUFFER) != request.double_buffered
    {
        inexact += 1;
    }

    (deficit, inexact, excess)
}

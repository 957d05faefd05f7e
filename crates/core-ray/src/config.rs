//! Explicit trace configuration.

use serde::{Deserialize, Serialize};

/// Per-trace limits and modes, passed to the engine and copied into each ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Upper bound on rays a single source may emit per frame.
    pub max_rays_per_source: u32,
    /// A ray at this many bounces terminates with `max_bounces`.
    pub max_bounces: u32,
    /// Rays strictly below this intensity terminate with `low_intensity`.
    pub min_intensity: f64,
    /// White-light sources emit one coincident multi-wavelength beam instead
    /// of one ray per sampled wavelength.
    pub fast_white_light: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            max_rays_per_source: 50,
            max_bounces: 64,
            min_intensity: 1e-3,
            fast_white_light: false,
        }
    }
}

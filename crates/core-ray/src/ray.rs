//! One linear segment of a photon path.

use core_geom::{Rgba, Vec2, wavelength_to_rgb};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::TraceConfig;

/// Two consecutive history points closer than this are merged.
pub const HISTORY_POINT_EPSILON: f64 = 1e-4;

/// Stroke width bounds for the rendering hint.
const MIN_LINE_WIDTH: f64 = 0.75;
const MAX_LINE_WIDTH: f64 = 3.5;

/// Why a segment stopped propagating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerminationReason {
    LowIntensity,
    MaxBounces,
    OutOfBounds,
    AbsorbedScreen,
    AbsorbedDetector,
    Blocked,
    CapturedByFiber,
    TotalInternalReflection,
    SegmentEndAfterInteraction,
    StuckInQueue,
    InteractionError,
    UnimplementedComponent,
}

impl TerminationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LowIntensity => "low_intensity",
            Self::MaxBounces => "max_bounces",
            Self::OutOfBounds => "out_of_bounds",
            Self::AbsorbedScreen => "absorbed_screen",
            Self::AbsorbedDetector => "absorbed_detector",
            Self::Blocked => "blocked",
            Self::CapturedByFiber => "captured_by_fiber",
            Self::TotalInternalReflection => "tir",
            Self::SegmentEndAfterInteraction => "segment_end_after_interaction",
            Self::StuckInQueue => "stuck_in_queue",
            Self::InteractionError => "interaction_error",
            Self::UnimplementedComponent => "unimplemented_component",
        }
    }
}

/// Polarization state carried by a ray.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Polarization {
    Unpolarized,
    Linear { angle_rad: f64 },
    Circular,
}

impl Default for Polarization {
    fn default() -> Self {
        Self::Unpolarized
    }
}

#[derive(Debug, Error)]
pub enum RayError {
    #[error("non-finite {field} in ray constructor")]
    NonFinite { field: &'static str },
    #[error("ray direction has zero magnitude")]
    ZeroDirection,
}

/// Construction parameters for [`Ray::new`]. Sources fill the spec directly;
/// interactions usually go through [`Ray::successor`] instead.
#[derive(Debug, Clone)]
pub struct RaySpec {
    pub origin: Vec2,
    pub direction: Vec2,
    pub wavelength_nm: f64,
    pub intensity: f64,
    pub phase: f64,
    pub bounces_so_far: u32,
    pub medium_refractive_index: f64,
    pub source_id: Option<String>,
    pub polarization: Polarization,
    pub ignore_decay: bool,
    pub beam_width: f64,
    pub history_so_far: Vec<Vec2>,
}

impl RaySpec {
    /// Spec for a fresh source emission in air.
    pub fn emitted(
        origin: Vec2,
        direction: Vec2,
        wavelength_nm: f64,
        intensity: f64,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            origin,
            direction,
            wavelength_nm,
            intensity,
            phase: 0.0,
            bounces_so_far: 0,
            medium_refractive_index: 1.0,
            source_id: Some(source_id.into()),
            polarization: Polarization::Unpolarized,
            ignore_decay: false,
            beam_width: 0.0,
            history_so_far: Vec::new(),
        }
    }
}

/// One straight segment of a photon path.
///
/// Invariants:
/// * `direction` is unit length (within 1e-6).
/// * `history[0] == origin`.
/// * `terminated` implies `end_reason.is_some()`.
#[derive(Debug, Clone)]
pub struct Ray {
    pub origin: Vec2,
    pub direction: Vec2,
    pub wavelength_nm: f64,
    pub intensity: f64,
    /// Intensity this ray's source emitted at, for color dimming.
    pub base_intensity: f64,
    pub phase: f64,
    pub bounces_so_far: u32,
    pub medium_refractive_index: f64,
    pub source_id: Option<String>,
    pub polarization: Polarization,
    pub ignore_decay: bool,
    pub beam_width: f64,
    pub history: Vec<Vec2>,
    pub animate_arrow: bool,
    pub min_intensity_threshold: f64,
    pub max_bounces: u32,
    terminated: bool,
    end_reason: Option<TerminationReason>,
}

impl Ray {
    /// Validates every numeric field is finite and normalizes the direction.
    pub fn new(spec: RaySpec, cfg: &TraceConfig) -> Result<Ray, RayError> {
        if !spec.origin.is_finite() {
            return Err(RayError::NonFinite { field: "origin" });
        }
        if !spec.direction.is_finite() {
            return Err(RayError::NonFinite { field: "direction" });
        }
        for (field, value) in [
            ("wavelength_nm", spec.wavelength_nm),
            ("intensity", spec.intensity),
            ("phase", spec.phase),
            ("medium_refractive_index", spec.medium_refractive_index),
            ("beam_width", spec.beam_width),
        ] {
            if !value.is_finite() {
                return Err(RayError::NonFinite { field });
            }
        }
        let direction = spec.direction.normalize();
        if direction == Vec2::ZERO {
            return Err(RayError::ZeroDirection);
        }
        let mut history = spec.history_so_far;
        if history.last() != Some(&spec.origin) {
            history.push(spec.origin);
        }
        Ok(Ray {
            origin: spec.origin,
            direction,
            wavelength_nm: spec.wavelength_nm,
            intensity: spec.intensity,
            base_intensity: spec.intensity,
            phase: spec.phase,
            bounces_so_far: spec.bounces_so_far,
            medium_refractive_index: spec.medium_refractive_index,
            source_id: spec.source_id,
            polarization: spec.polarization,
            ignore_decay: spec.ignore_decay,
            beam_width: spec.beam_width,
            history,
            animate_arrow: false,
            min_intensity_threshold: cfg.min_intensity,
            max_bounces: cfg.max_bounces,
            terminated: false,
            end_reason: None,
        })
    }

    /// Successor ray produced by an interaction: inherits state and policy
    /// from the parent, bumps the bounce count, starts a fresh history.
    ///
    /// The caller adjusts intensity, phase, polarization, and medium after.
    pub fn successor(&self, origin: Vec2, direction: Vec2) -> Ray {
        Ray {
            origin,
            direction: direction.normalize(),
            wavelength_nm: self.wavelength_nm,
            intensity: self.intensity,
            base_intensity: self.base_intensity,
            phase: self.phase,
            bounces_so_far: self.bounces_so_far + 1,
            medium_refractive_index: self.medium_refractive_index,
            source_id: self.source_id.clone(),
            polarization: self.polarization,
            ignore_decay: self.ignore_decay,
            beam_width: self.beam_width,
            history: vec![origin],
            animate_arrow: false,
            min_intensity_threshold: self.min_intensity_threshold,
            max_bounces: self.max_bounces,
            terminated: false,
            end_reason: None,
        }
    }

    /// Append a path vertex, skipping points that coincide with the previous
    /// one within [`HISTORY_POINT_EPSILON`].
    pub fn add_history_point(&mut self, p: Vec2) {
        if let Some(last) = self.history.last()
            && last.distance_to(p) < HISTORY_POINT_EPSILON
        {
            return;
        }
        self.history.push(p);
    }

    /// Idempotent: the first recorded reason wins.
    pub fn terminate(&mut self, reason: TerminationReason) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.end_reason = Some(reason);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    pub fn end_reason(&self) -> Option<TerminationReason> {
        self.end_reason
    }

    /// True when this ray must not be re-queued. Records the reason itself
    /// (max bounces, low intensity, non-finite state) so callers that only
    /// poll still leave the ray with a diagnosable end state.
    pub fn should_terminate(&mut self) -> bool {
        if self.terminated {
            return true;
        }
        if !self.origin.is_finite() || !self.direction.is_finite() {
            self.terminate(TerminationReason::OutOfBounds);
            return true;
        }
        if self.intensity < self.min_intensity_threshold {
            self.terminate(TerminationReason::LowIntensity);
            return true;
        }
        if self.bounces_so_far >= self.max_bounces {
            self.terminate(TerminationReason::MaxBounces);
            return true;
        }
        false
    }

    /// Stroke color hint: wavelength hue dimmed by the fraction of the source
    /// intensity still carried.
    pub fn get_color(&self) -> Rgba {
        let dim = if self.base_intensity > 0.0 {
            (self.intensity / self.base_intensity).min(1.0)
        } else {
            1.0
        };
        wavelength_to_rgb(self.wavelength_nm).dimmed(dim)
    }

    /// Stroke width hint mapped from intensity, with a mild contribution from
    /// the annotated Gaussian beam width.
    pub fn get_line_width(&self) -> f64 {
        let rel = if self.base_intensity > 0.0 {
            (self.intensity / self.base_intensity).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let width = MIN_LINE_WIDTH + (MAX_LINE_WIDTH - MIN_LINE_WIDTH) * rel;
        width + 0.5 * (self.beam_width / 10.0).min(1.0)
    }
}

//! Transport and modulation components.
//!
//! The optical fiber is the one component with deferred semantics: rays
//! captured at the input facet during frame N re-emerge from the output end
//! as fresh source-like rays at frame N+1.

use core_geom::Vec2;
use core_ray::{Polarization, Ray, RaySpec, TerminationReason, TraceConfig};
use serde::{Deserialize, Serialize};

use crate::geometry::{ElementFrame, HIT_EPSILON, ray_segment_intersection};
use crate::mirrors::planar_intersect;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, bool_arg, number_arg,
};
use crate::{Hit, HitExtra, InteractionError};

/// One ray captured at the fiber input, waiting for the next frame.
#[derive(Debug, Clone)]
pub struct CapturedRay {
    pub wavelength_nm: f64,
    pub intensity: f64,
    pub entry_angle_rad: f64,
    pub polarization: Polarization,
}

/// Two-ended fiber. `angle_rad` is the input axis (light is accepted
/// travelling along it); the input facet spans `facet_width` across that
/// axis. Output rays leave `output_pos` along `output_angle_rad`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpticalFiber {
    pub facet_width: f64,
    pub output_pos: Vec2,
    pub output_angle_rad: f64,
    pub numerical_aperture: f64,
    pub intrinsic_efficiency: f64,
    pub loss_db_per_km: f64,
    pub length_km: f64,
    #[serde(skip)]
    pub captured: Vec<CapturedRay>,
}

impl Default for OpticalFiber {
    fn default() -> Self {
        Self {
            facet_width: 20.0,
            output_pos: Vec2::new(100.0, 0.0),
            output_angle_rad: 0.0,
            numerical_aperture: 0.22,
            intrinsic_efficiency: 0.8,
            loss_db_per_km: 3.5,
            length_km: 0.001,
            captured: Vec::new(),
        }
    }
}

impl OpticalFiber {
    pub fn reset(&mut self) {
        self.captured.clear();
    }

    /// Combined coupling factor for an entry at `entry_angle_rad` off-axis:
    /// NA acceptance rolloff × intrinsic efficiency × propagation loss.
    pub fn coupling_efficiency(&self, entry_angle_rad: f64) -> f64 {
        let na = self.numerical_aperture.clamp(0.0, 1.0);
        if na <= 0.0 {
            return 0.0;
        }
        let sin_entry = entry_angle_rad.sin().abs();
        let acceptance = (1.0 - (sin_entry / na).powi(2)).max(0.0);
        let attenuation = 10f64.powf(-self.loss_db_per_km * self.length_km.max(0.0) / 10.0);
        self.intrinsic_efficiency.clamp(0.0, 1.0) * acceptance * attenuation
    }

    /// Candidate intersection with the input facet. Rays approaching from
    /// behind the facet are not candidates.
    pub fn check_input_coupling(
        &self,
        frame: &ElementFrame,
        origin: Vec2,
        dir: Vec2,
    ) -> Option<Hit> {
        let axis = Vec2::from_angle(frame.angle_rad);
        if dir.dot(axis) <= 0.0 {
            return None;
        }
        let across = axis.perp().scale(self.facet_width / 2.0);
        let (a, b) = (frame.pos.sub(across), frame.pos.add(across));
        let (distance, point) = ray_segment_intersection(origin, dir, a, b)?;
        if distance <= HIT_EPSILON {
            return None;
        }
        Some(Hit {
            distance,
            point,
            normal: -axis,
            surface: 0,
            extra: HitExtra::None,
        })
    }

    /// Record the capture and terminate the parent.
    pub fn handle_input_interaction(&mut self, frame: &ElementFrame, ray: &mut Ray, _hit: &Hit) {
        let axis = Vec2::from_angle(frame.angle_rad);
        let entry_angle_rad = ray.direction.dot(axis).clamp(-1.0, 1.0).acos();
        let efficiency = self.coupling_efficiency(entry_angle_rad);
        let captured = CapturedRay {
            wavelength_nm: ray.wavelength_nm,
            intensity: ray.intensity * efficiency,
            entry_angle_rad,
            polarization: ray.polarization,
        };
        tracing::debug!(
            target: "optics.fiber",
            wavelength_nm = captured.wavelength_nm,
            intensity = captured.intensity,
            entry_angle_rad,
            efficiency,
            "ray captured at fiber input"
        );
        self.captured.push(captured);
        ray.terminate(TerminationReason::CapturedByFiber);
    }

    /// Fresh source-like rays at the output end, one per captured ray. The
    /// caller defers these to the next frame's queue.
    pub fn generate_output_rays(&self, id: &str, cfg: &TraceConfig) -> Vec<Ray> {
        let dir = Vec2::from_angle(self.output_angle_rad);
        self.captured
            .iter()
            .filter_map(|captured| {
                let mut spec = RaySpec::emitted(
                    self.output_pos,
                    dir,
                    captured.wavelength_nm,
                    captured.intensity,
                    id,
                );
                spec.polarization = captured.polarization;
                match Ray::new(spec, cfg) {
                    Ok(mut ray) => {
                        ray.animate_arrow = true;
                        Some(ray)
                    }
                    Err(err) => {
                        tracing::warn!(target: "optics.fiber", %err, "dropping invalid fiber output ray");
                        None
                    }
                }
            })
            .collect()
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "facetWidth",
                PropertyDescriptor::number(self.facet_width).label("Facet width"),
            )
            .push(
                "outputX",
                PropertyDescriptor::number(self.output_pos.x).label("Output x"),
            )
            .push(
                "outputY",
                PropertyDescriptor::number(self.output_pos.y).label("Output y"),
            )
            .push(
                "outputAngleDeg",
                PropertyDescriptor::range(self.output_angle_rad.to_degrees(), -180.0, 180.0, 1.0)
                    .label("Output angle (deg)"),
            )
            .push(
                "numericalAperture",
                PropertyDescriptor::range(self.numerical_aperture, 0.0, 1.0, 0.01)
                    .label("Numerical aperture"),
            )
            .push(
                "couplingEfficiency",
                PropertyDescriptor::range(self.intrinsic_efficiency, 0.0, 1.0, 0.01)
                    .label("Intrinsic coupling efficiency"),
            )
            .push(
                "lossDbPerKm",
                PropertyDescriptor::number(self.loss_db_per_km).label("Loss (dB/km)"),
            )
            .push(
                "lengthKm",
                PropertyDescriptor::number(self.length_km).label("Length (km)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "facetWidth" => self.facet_width = number_arg(name, value)?.max(1.0),
            "outputX" => self.output_pos.x = number_arg(name, value)?,
            "outputY" => self.output_pos.y = number_arg(name, value)?,
            "outputAngleDeg" => self.output_angle_rad = number_arg(name, value)?.to_radians(),
            "numericalAperture" => {
                self.numerical_aperture = number_arg(name, value)?.clamp(0.0, 1.0);
            }
            "couplingEfficiency" => {
                self.intrinsic_efficiency = number_arg(name, value)?.clamp(0.0, 1.0);
            }
            "lossDbPerKm" => self.loss_db_per_km = number_arg(name, value)?.max(0.0),
            "lengthKm" => self.length_km = number_arg(name, value)?.max(0.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Bragg-regime modulator: a first order deflected by twice the Bragg angle
/// carries the diffraction efficiency, the zeroth order carries the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AcoustoOpticModulator {
    pub length: f64,
    pub efficiency: f64,
    pub bragg_angle_deg: f64,
}

impl Default for AcoustoOpticModulator {
    fn default() -> Self {
        Self {
            length: 60.0,
            efficiency: 0.8,
            bragg_angle_deg: 1.0,
        }
    }
}

impl AcoustoOpticModulator {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let eta = self.efficiency.clamp(0.0, 1.0);
        let mut successors = Vec::with_capacity(2);
        if eta > 1e-9 {
            let deflected = ray
                .direction
                .rotate(2.0 * self.bragg_angle_deg.to_radians());
            let mut first = ray.successor(hit.point, deflected);
            first.intensity = ray.intensity * eta;
            successors.push(first);
        }
        if 1.0 - eta > 1e-9 {
            let mut zeroth = ray.successor(hit.point, ray.direction);
            zeroth.intensity = ray.intensity * (1.0 - eta);
            successors.push(zeroth);
        }
        Ok(successors)
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "efficiency",
                PropertyDescriptor::range(self.efficiency, 0.0, 1.0, 0.01)
                    .label("Diffraction efficiency"),
            )
            .push(
                "braggAngleDeg",
                PropertyDescriptor::range(self.bragg_angle_deg, 0.0, 10.0, 0.05)
                    .label("Bragg angle (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "efficiency" => self.efficiency = number_arg(name, value)?.clamp(0.0, 1.0),
            "braggAngleDeg" => self.bragg_angle_deg = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Voltage-controlled phase retarder; geometry and intensity untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ElectroOpticModulator {
    pub length: f64,
    pub phase_shift_rad: f64,
}

impl Default for ElectroOpticModulator {
    fn default() -> Self {
        Self {
            length: 60.0,
            phase_shift_rad: 0.0,
        }
    }
}

impl ElectroOpticModulator {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let mut succ = ray.successor(hit.point, ray.direction);
        succ.phase += self.phase_shift_rad;
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "phaseShiftRad",
                PropertyDescriptor::range(self.phase_shift_rad, 0.0, std::f64::consts::TAU, 0.01)
                    .label("Phase shift (rad)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "phaseShiftRad" => self.phase_shift_rad = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VariableAttenuator {
    pub length: f64,
    pub transmission: f64,
}

impl Default for VariableAttenuator {
    fn default() -> Self {
        Self {
            length: 60.0,
            transmission: 0.5,
        }
    }
}

impl VariableAttenuator {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let t = self.transmission.clamp(0.0, 1.0);
        if t <= 1e-9 {
            ray.terminate(TerminationReason::Blocked);
            return Ok(Vec::new());
        }
        let mut succ = ray.successor(hit.point, ray.direction);
        succ.intensity = ray.intensity * t;
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "transmission",
                PropertyDescriptor::range(self.transmission, 0.0, 1.0, 0.01)
                    .label("Transmission"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "transmission" => self.transmission = number_arg(name, value)?.clamp(0.0, 1.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Static scene model: open passes the duty-cycle-averaged power, closed
/// blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpticalChopper {
    pub length: f64,
    pub open: bool,
    pub duty_cycle: f64,
}

impl Default for OpticalChopper {
    fn default() -> Self {
        Self {
            length: 60.0,
            open: true,
            duty_cycle: 0.5,
        }
    }
}

impl OpticalChopper {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        if !self.open {
            ray.terminate(TerminationReason::Blocked);
            return Ok(Vec::new());
        }
        let mut succ = ray.successor(hit.point, ray.direction);
        succ.intensity = ray.intensity * self.duty_cycle.clamp(0.0, 1.0);
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "open",
                PropertyDescriptor::checkbox(self.open).label("Open"),
            )
            .push(
                "dutyCycle",
                PropertyDescriptor::range(self.duty_cycle, 0.0, 1.0, 0.01).label("Duty cycle"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "open" => self.open = bool_arg(name, value)?,
            "dutyCycle" => self.duty_cycle = number_arg(name, value)?.clamp(0.0, 1.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

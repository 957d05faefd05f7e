//! Polarization-manipulating components.
//!
//! The 2D model carries polarization as a state tag plus a lab-frame angle
//! for linear states. Malus' law governs analyzer transmission; a PBS
//! decomposes against its own surface orientation (p along the surface,
//! s across it).

use core_geom::Vec2;
use core_ray::{Polarization, Ray, TerminationReason};
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};

use crate::geometry::{ElementFrame, reflect};
use crate::mirrors::planar_intersect;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, bool_arg, number_arg,
};
use crate::{Hit, InteractionError, loss};

/// Transmitted fraction and resulting state for an ideal analyzer at
/// `axis_rad`.
fn malus(pol: Polarization, axis_rad: f64) -> (f64, Polarization) {
    let factor = match pol {
        Polarization::Unpolarized | Polarization::Circular => 0.5,
        Polarization::Linear { angle_rad } => (angle_rad - axis_rad).cos().powi(2),
    };
    (factor, Polarization::Linear { angle_rad: axis_rad })
}

/// Fraction of power in the s-component relative to `p_axis_rad`.
fn s_fraction(pol: Polarization, p_axis_rad: f64, unpolarized_reflectivity: f64) -> f64 {
    match pol {
        Polarization::Unpolarized => unpolarized_reflectivity,
        Polarization::Circular => 0.5,
        Polarization::Linear { angle_rad } => (angle_rad - p_axis_rad).sin().powi(2),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Polarizer {
    pub length: f64,
    pub transmission_axis_rad: f64,
}

impl Default for Polarizer {
    fn default() -> Self {
        Self {
            length: 60.0,
            transmission_axis_rad: 0.0,
        }
    }
}

impl Polarizer {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let (factor, pol) = malus(ray.polarization, self.transmission_axis_rad);
        let mut succ = ray.successor(hit.point, ray.direction);
        succ.intensity = ray.intensity * factor;
        succ.polarization = pol;
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "transmissionAxisDeg",
                PropertyDescriptor::range(self.transmission_axis_rad.to_degrees(), -90.0, 90.0, 1.0)
                    .label("Transmission axis (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "transmissionAxisDeg" => {
                self.transmission_axis_rad = number_arg(name, value)?.to_radians();
            }
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Rotates linear polarization to its mirror image across the fast axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HalfWavePlate {
    pub length: f64,
    pub fast_axis_rad: f64,
}

impl Default for HalfWavePlate {
    fn default() -> Self {
        Self {
            length: 60.0,
            fast_axis_rad: 0.0,
        }
    }
}

impl HalfWavePlate {
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
        if let Polarization::Linear { angle_rad } = ray.polarization {
            succ.polarization = Polarization::Linear {
                angle_rad: 2.0 * self.fast_axis_rad - angle_rad,
            };
        }
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "fastAxisDeg",
                PropertyDescriptor::range(self.fast_axis_rad.to_degrees(), -90.0, 90.0, 1.0)
                    .label("Fast axis (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "fastAxisDeg" => self.fast_axis_rad = number_arg(name, value)?.to_radians(),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Quarter-wave retarder, simplified to the canonical state changes: linear
/// light at ±45° to the fast axis becomes circular, circular light leaves
/// linear at +45°; other states pass with a quarter-wave phase offset only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QuarterWavePlate {
    pub length: f64,
    pub fast_axis_rad: f64,
}

impl Default for QuarterWavePlate {
    fn default() -> Self {
        Self {
            length: 60.0,
            fast_axis_rad: 0.0,
        }
    }
}

impl QuarterWavePlate {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        const DIAGONAL_TOLERANCE_RAD: f64 = 1e-6;
        let mut succ = ray.successor(hit.point, ray.direction);
        succ.phase += FRAC_PI_2;
        succ.polarization = match ray.polarization {
            Polarization::Linear { angle_rad } => {
                let rel = (angle_rad - self.fast_axis_rad).rem_euclid(PI);
                if (rel - PI / 4.0).abs() < DIAGONAL_TOLERANCE_RAD
                    || (rel - 3.0 * PI / 4.0).abs() < DIAGONAL_TOLERANCE_RAD
                {
                    Polarization::Circular
                } else {
                    ray.polarization
                }
            }
            Polarization::Circular => Polarization::Linear {
                angle_rad: self.fast_axis_rad + PI / 4.0,
            },
            Polarization::Unpolarized => Polarization::Unpolarized,
        };
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "fastAxisDeg",
                PropertyDescriptor::range(self.fast_axis_rad.to_degrees(), -90.0, 90.0, 1.0)
                    .label("Fast axis (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "fastAxisDeg" => self.fast_axis_rad = number_arg(name, value)?.to_radians(),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Beam splitter, non-polarizing (`split_ratio`) or polarizing (s reflected,
/// p transmitted against the surface orientation).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BeamSplitter {
    pub length: f64,
    pub split_ratio: f64,
    pub polarizing: bool,
    pub pbs_unpolarized_reflectivity: f64,
}

impl Default for BeamSplitter {
    fn default() -> Self {
        Self {
            length: 80.0,
            split_ratio: 0.5,
            polarizing: false,
            pbs_unpolarized_reflectivity: 0.5,
        }
    }
}

impl BeamSplitter {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let reflected_dir = reflect(ray.direction, hit.normal);
        let (r_frac, reflected_pol, transmitted_pol) = if self.polarizing {
            let s = s_fraction(
                ray.polarization,
                frame.angle_rad,
                self.pbs_unpolarized_reflectivity,
            );
            (
                s,
                Polarization::Linear {
                    angle_rad: frame.angle_rad + FRAC_PI_2,
                },
                Polarization::Linear {
                    angle_rad: frame.angle_rad,
                },
            )
        } else {
            (
                self.split_ratio.clamp(0.0, 1.0),
                ray.polarization,
                ray.polarization,
            )
        };
        let mut successors = Vec::with_capacity(2);
        if r_frac > 1e-9 {
            let mut reflected = ray.successor(hit.point, reflected_dir);
            reflected.intensity = ray.intensity * r_frac;
            reflected.phase += PI;
            reflected.polarization = reflected_pol;
            successors.push(reflected);
        }
        if 1.0 - r_frac > 1e-9 {
            let mut transmitted = ray.successor(hit.point, ray.direction);
            transmitted.intensity = ray.intensity * (1.0 - r_frac);
            transmitted.polarization = transmitted_pol;
            successors.push(transmitted);
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
                "splitRatio",
                PropertyDescriptor::range(self.split_ratio, 0.0, 1.0, 0.01)
                    .label("Reflected fraction")
                    .title("Ignored in polarizing mode"),
            )
            .push(
                "polarizing",
                PropertyDescriptor::checkbox(self.polarizing).label("Polarizing (PBS)"),
            )
            .push(
                "pbsUnpolarizedReflectivity",
                PropertyDescriptor::range(self.pbs_unpolarized_reflectivity, 0.0, 1.0, 0.01)
                    .label("PBS unpolarized reflectivity"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "splitRatio" => self.split_ratio = number_arg(name, value)?.clamp(0.0, 1.0),
            "polarizing" => self.polarizing = bool_arg(name, value)?,
            "pbsUnpolarizedReflectivity" => {
                self.pbs_unpolarized_reflectivity = number_arg(name, value)?.clamp(0.0, 1.0);
            }
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Splits incoming light into two orthogonally polarized beams deviated by
/// ±separation/2 about the incoming direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WollastonPrism {
    pub length: f64,
    pub separation_deg: f64,
    pub optic_axis_rad: f64,
}

impl Default for WollastonPrism {
    fn default() -> Self {
        Self {
            length: 60.0,
            separation_deg: 20.0,
            optic_axis_rad: 0.0,
        }
    }
}

impl WollastonPrism {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let half_sep = self.separation_deg.to_radians() / 2.0;
        let (o_frac, _) = malus(ray.polarization, self.optic_axis_rad);
        let e_frac = 1.0 - o_frac;
        let mut successors = Vec::with_capacity(2);
        if o_frac > 1e-9 {
            let mut ordinary = ray.successor(hit.point, ray.direction.rotate(half_sep));
            ordinary.intensity = ray.intensity * o_frac;
            ordinary.polarization = Polarization::Linear {
                angle_rad: self.optic_axis_rad,
            };
            successors.push(ordinary);
        }
        if e_frac > 1e-9 {
            let mut extraordinary = ray.successor(hit.point, ray.direction.rotate(-half_sep));
            extraordinary.intensity = ray.intensity * e_frac;
            extraordinary.polarization = Polarization::Linear {
                angle_rad: self.optic_axis_rad + FRAC_PI_2,
            };
            successors.push(extraordinary);
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
                "separationDeg",
                PropertyDescriptor::range(self.separation_deg, 0.0, 90.0, 0.5)
                    .label("Separation (deg)"),
            )
            .push(
                "opticAxisDeg",
                PropertyDescriptor::range(self.optic_axis_rad.to_degrees(), -90.0, 90.0, 1.0)
                    .label("Optic axis (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "separationDeg" => self.separation_deg = number_arg(name, value)?.clamp(0.0, 180.0),
            "opticAxisDeg" => self.optic_axis_rad = number_arg(name, value)?.to_radians(),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Non-reciprocal rotation: the sign follows the propagation direction along
/// the element's optical axis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaradayRotator {
    pub length: f64,
    pub rotation_deg: f64,
}

impl Default for FaradayRotator {
    fn default() -> Self {
        Self {
            length: 60.0,
            rotation_deg: 45.0,
        }
    }
}

impl FaradayRotator {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let sign = if ray.direction.dot(frame.normal()) >= 0.0 {
            1.0
        } else {
            -1.0
        };
        let mut succ = ray.successor(hit.point, ray.direction);
        if let Polarization::Linear { angle_rad } = ray.polarization {
            succ.polarization = Polarization::Linear {
                angle_rad: angle_rad + sign * self.rotation_deg.to_radians(),
            };
        }
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "rotationDeg",
                PropertyDescriptor::range(self.rotation_deg, -90.0, 90.0, 1.0)
                    .label("Rotation (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "rotationDeg" => self.rotation_deg = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Passes forward propagation with a small insertion loss, blocks backward
/// propagation entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaradayIsolator {
    pub length: f64,
    pub insertion_loss: f64,
}

impl Default for FaradayIsolator {
    fn default() -> Self {
        Self {
            length: 60.0,
            insertion_loss: 0.05,
        }
    }
}

impl FaradayIsolator {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        if ray.direction.dot(frame.normal()) < 0.0 {
            ray.terminate(TerminationReason::Blocked);
            return Ok(Vec::new());
        }
        let mut succ = ray.successor(hit.point, ray.direction);
        succ.intensity *= loss(ray, 1.0 - self.insertion_loss.clamp(0.0, 1.0));
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "insertionLoss",
                PropertyDescriptor::range(self.insertion_loss, 0.0, 1.0, 0.01)
                    .label("Insertion loss"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "insertionLoss" => self.insertion_loss = number_arg(name, value)?.clamp(0.0, 1.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

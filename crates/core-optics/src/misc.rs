//! Cavity, environment, and catch-all components.

use core_geom::Vec2;
use core_ray::{Ray, TerminationReason};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::geometry::{ElementFrame, ray_polygon_hits, rect_corners, reflect};
use crate::mirrors::planar_intersect;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, number_arg,
};
use crate::{Hit, HitExtra, InteractionError};

/// Plane-parallel etalon. Transmission follows the Airy function
/// `T = 1 / (1 + F·sin²(δ/2))` with `F = 4R/(1−R)²` and
/// `δ = 4π·spacing·cosθ / λ`; the remainder reflects.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FabryPerotCavity {
    pub length: f64,
    pub spacing_um: f64,
    pub reflectivity: f64,
}

impl Default for FabryPerotCavity {
    fn default() -> Self {
        Self {
            length: 60.0,
            spacing_um: 10.0,
            reflectivity: 0.9,
        }
    }
}

impl FabryPerotCavity {
    /// Airy transmission at the given wavelength and incidence cosine.
    pub fn transmission(&self, wavelength_nm: f64, cos_theta: f64) -> f64 {
        let r = self.reflectivity.clamp(0.0, 0.999_999);
        let finesse_coeff = 4.0 * r / (1.0 - r).powi(2);
        let spacing_nm = self.spacing_um * 1000.0;
        let delta = 4.0 * PI * spacing_nm * cos_theta.abs() / wavelength_nm;
        1.0 / (1.0 + finesse_coeff * (delta / 2.0).sin().powi(2))
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let cos_theta = ray.direction.dot(hit.normal);
        let t = self.transmission(ray.wavelength_nm, cos_theta);
        let mut successors = Vec::with_capacity(2);
        if t > 1e-9 {
            let mut transmitted = ray.successor(hit.point, ray.direction);
            transmitted.intensity = ray.intensity * t;
            successors.push(transmitted);
        }
        if 1.0 - t > 1e-9 {
            let mut reflected = ray.successor(hit.point, reflect(ray.direction, hit.normal));
            reflected.intensity = ray.intensity * (1.0 - t);
            reflected.phase += PI;
            successors.push(reflected);
        }
        Ok(successors)
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Aperture"),
            )
            .push(
                "spacingUm",
                PropertyDescriptor::number(self.spacing_um).label("Mirror spacing (µm)"),
            )
            .push(
                "reflectivity",
                PropertyDescriptor::range(self.reflectivity, 0.0, 0.999, 0.001)
                    .label("Mirror reflectivity"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "spacingUm" => self.spacing_um = number_arg(name, value)?.max(0.01),
            "reflectivity" => self.reflectivity = number_arg(name, value)?.clamp(0.0, 0.999),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Field environment annotation; no optical surface of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MagneticCoil {
    pub radius: f64,
    pub field_mt: f64,
}

impl Default for MagneticCoil {
    fn default() -> Self {
        Self {
            radius: 40.0,
            field_mt: 10.0,
        }
    }
}

impl MagneticCoil {
    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "radius",
                PropertyDescriptor::number(self.radius).label("Radius"),
            )
            .push(
                "fieldMt",
                PropertyDescriptor::number(self.field_mt).label("Field (mT)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "radius" => self.radius = number_arg(name, value)?.max(1.0),
            "fieldMt" => self.field_mt = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Vapor cell. Absorption-line physics is not modeled; incident rays stop
/// with `unimplemented_component`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AtomicCell {
    pub width: f64,
    pub height: f64,
}

impl Default for AtomicCell {
    fn default() -> Self {
        Self {
            width: 60.0,
            height: 30.0,
        }
    }
}

impl AtomicCell {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        ray_polygon_hits(origin, dir, &rect_corners(frame, self.width, self.height))
            .into_iter()
            .map(|edge| Hit {
                distance: edge.distance,
                point: edge.point,
                normal: if edge.outward_normal.dot(dir) < 0.0 {
                    edge.outward_normal
                } else {
                    -edge.outward_normal
                },
                surface: edge.edge as u32,
                extra: HitExtra::None,
            })
            .collect()
    }

    pub fn interact(&mut self, ray: &mut Ray) -> Result<Vec<Ray>, InteractionError> {
        ray.terminate(TerminationReason::UnimplementedComponent);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "width",
                PropertyDescriptor::number(self.width).label("Width"),
            )
            .push(
                "height",
                PropertyDescriptor::number(self.height).label("Height"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "width" => self.width = number_arg(name, value)?.max(1.0),
            "height" => self.height = number_arg(name, value)?.max(1.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// User-defined black box: attenuation plus an optional fixed deflection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomComponent {
    pub length: f64,
    pub transmission: f64,
    pub deflection_deg: f64,
}

impl Default for CustomComponent {
    fn default() -> Self {
        Self {
            length: 50.0,
            transmission: 1.0,
            deflection_deg: 0.0,
        }
    }
}

impl CustomComponent {
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
        let dir = ray.direction.rotate(self.deflection_deg.to_radians());
        let mut succ = ray.successor(hit.point, dir);
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
            .push(
                "deflectionDeg",
                PropertyDescriptor::range(self.deflection_deg, -90.0, 90.0, 0.5)
                    .label("Deflection (deg)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "transmission" => self.transmission = number_arg(name, value)?.clamp(0.0, 1.0),
            "deflectionDeg" => self.deflection_deg = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core_ray::{RaySpec, TraceConfig};
    use std::f64::consts::FRAC_PI_2;

    fn axial_ray(wavelength_nm: f64) -> Ray {
        Ray::new(
            RaySpec::emitted(
                Vec2::new(-100.0, 0.0),
                Vec2::new(1.0, 0.0),
                wavelength_nm,
                1.0,
                "s",
            ),
            &TraceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn etalon_passes_resonant_wavelength() {
        let cavity = FabryPerotCavity::default();
        // δ = 4π·10000·1/λ; resonance when δ/2 = kπ → λ = 20000/k.
        let resonant = 20_000.0 / 40.0; // 500 nm
        assert_relative_eq!(cavity.transmission(resonant, 1.0), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn etalon_rejects_off_resonance() {
        let cavity = FabryPerotCavity::default();
        // Quarter-period off resonance: δ/2 = kπ + π/2.
        let off = 40_000.0 / 81.0;
        assert!(cavity.transmission(off, 1.0) < 0.01);
    }

    #[test]
    fn etalon_successors_conserve_power() {
        let mut cavity = FabryPerotCavity::default();
        let frame = ElementFrame::new(Vec2::ZERO, FRAC_PI_2);
        let mut ray = axial_ray(510.0);
        let hits = cavity.intersect(&frame, ray.origin, ray.direction);
        let succ = cavity.interact(&frame, &mut ray, &hits[0]).unwrap();
        let total: f64 = succ.iter().map(|r| r.intensity).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn custom_component_deflects_and_attenuates() {
        let mut custom = CustomComponent {
            transmission: 0.5,
            deflection_deg: 10.0,
            ..CustomComponent::default()
        };
        let frame = ElementFrame::new(Vec2::ZERO, FRAC_PI_2);
        let mut ray = axial_ray(632.8);
        let hits = custom.intersect(&frame, ray.origin, ray.direction);
        let succ = custom.interact(&frame, &mut ray, &hits[0]).unwrap();
        assert_relative_eq!(succ[0].intensity, 0.5);
        assert_relative_eq!(succ[0].direction.angle(), 10.0f64.to_radians(), epsilon = 1e-9);
    }

    #[test]
    fn atomic_cell_is_explicitly_unimplemented() {
        let mut cell = AtomicCell::default();
        let mut ray = axial_ray(780.0);
        let succ = cell.interact(&mut ray).unwrap();
        assert!(succ.is_empty());
        assert_eq!(
            ray.end_reason(),
            Some(TerminationReason::UnimplementedComponent)
        );
    }
}

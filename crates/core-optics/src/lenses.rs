//! Lenses.
//!
//! The thin-lens family shares the ideal-lens rule: a ray crossing the lens
//! plane at height `y` changes slope by `−y/f` relative to the optical axis,
//! independent of which side it arrives from. Chromatic aberration scales the
//! effective focal length with wavelength; spherical aberration adds an
//! odd-symmetric term growing with the square of the height.

use core_geom::Vec2;
use core_ray::{Ray, TerminationReason};
use serde::{Deserialize, Serialize};

use crate::geometry::ElementFrame;
use crate::mirrors::planar_intersect;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, bool_arg, number_arg,
};
use crate::serde_util::float_or_inf;
use crate::{Hit, HitExtra, InteractionError, loss};

const COATED_TRANSMISSION: f64 = 0.99;
const UNCOATED_TRANSMISSION: f64 = 0.96;

/// Reference wavelength for chromatic focal shift.
const DESIGN_WAVELENGTH_NM: f64 = 550.0;

/// Ideal-lens refraction shared by the lens variants.
///
/// `spherical_coeff` perturbs the slope by `k·y·|y| / f`; zero keeps the lens
/// aberration-free.
fn lens_successor(
    frame: &ElementFrame,
    ray: &Ray,
    hit: &Hit,
    focal_length: f64,
    transmission: f64,
    spherical_coeff: f64,
) -> Result<Ray, InteractionError> {
    let y = match hit.extra {
        HitExtra::Radial(r) => r,
        _ => frame.signed_offset(hit.point),
    };
    let axis = {
        // Propagation sense of the optical axis for this crossing.
        let n = frame.normal();
        if ray.direction.dot(n) >= 0.0 { n } else { -n }
    };
    let tangent = frame.tangent();
    let axial = ray.direction.dot(axis);
    if axial.abs() < 1e-9 {
        return Err(InteractionError::NonFinite {
            context: "lens crossing parallel to the lens plane",
        });
    }
    let mut slope = ray.direction.dot(tangent) / axial;
    if focal_length.is_finite() && focal_length.abs() > 1e-9 {
        slope -= y / focal_length;
        slope -= spherical_coeff * y * y.abs() / focal_length;
    }
    let new_dir = axis.add(tangent.scale(slope));
    if !new_dir.is_finite() {
        return Err(InteractionError::NonFinite {
            context: "lens successor direction",
        });
    }
    let mut succ = ray.successor(hit.point, new_dir);
    succ.intensity *= loss(ray, transmission);
    Ok(succ)
}

fn effective_focal_length(focal_length: f64, chromatic_coeff: f64, wavelength_nm: f64) -> f64 {
    if chromatic_coeff == 0.0 || !focal_length.is_finite() {
        return focal_length;
    }
    focal_length * (1.0 + chromatic_coeff * (wavelength_nm - DESIGN_WAVELENGTH_NM)
        / DESIGN_WAVELENGTH_NM)
}

/// Ideal thin lens with optional chromatic and spherical aberration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThinLens {
    /// Signed; `null` in scene files denotes an infinite (flat) focal length.
    #[serde(with = "float_or_inf")]
    pub focal_length: f64,
    pub aperture: f64,
    pub coated: bool,
    pub chromatic_coeff: f64,
    pub spherical_coeff: f64,
}

impl Default for ThinLens {
    fn default() -> Self {
        Self {
            focal_length: 100.0,
            aperture: 100.0,
            coated: false,
            chromatic_coeff: 0.0,
            spherical_coeff: 0.0,
        }
    }
}

impl ThinLens {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.aperture, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let f = effective_focal_length(self.focal_length, self.chromatic_coeff, ray.wavelength_nm);
        let transmission = if self.coated {
            COATED_TRANSMISSION
        } else {
            UNCOATED_TRANSMISSION
        };
        let succ = lens_successor(frame, ray, hit, f, transmission, self.spherical_coeff)?;
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "focalLength",
                PropertyDescriptor::number(self.focal_length)
                    .label("Focal length")
                    .title("Signed: negative diverges"),
            )
            .push(
                "aperture",
                PropertyDescriptor::number(self.aperture).label("Aperture"),
            )
            .push(
                "coated",
                PropertyDescriptor::checkbox(self.coated).label("AR coating"),
            )
            .push(
                "chromaticCoeff",
                PropertyDescriptor::range(self.chromatic_coeff, -0.2, 0.2, 0.005)
                    .label("Chromatic coefficient"),
            )
            .push(
                "sphericalCoeff",
                PropertyDescriptor::range(self.spherical_coeff, 0.0, 0.01, 0.0001)
                    .label("Spherical coefficient"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "focalLength" => self.focal_length = number_arg(name, value)?,
            "aperture" => self.aperture = number_arg(name, value)?.max(1.0),
            "coated" => self.coated = bool_arg(name, value)?,
            "chromaticCoeff" => self.chromatic_coeff = number_arg(name, value)?,
            "sphericalCoeff" => self.spherical_coeff = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Focuses only in the simulation plane; within the 2D model it behaves as an
/// aberration-free thin lens, kept distinct for the inspector.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CylindricalLens {
    #[serde(with = "float_or_inf")]
    pub focal_length: f64,
    pub aperture: f64,
    pub coated: bool,
}

impl Default for CylindricalLens {
    fn default() -> Self {
        Self {
            focal_length: 100.0,
            aperture: 100.0,
            coated: false,
        }
    }
}

impl CylindricalLens {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.aperture, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let transmission = if self.coated {
            COATED_TRANSMISSION
        } else {
            UNCOATED_TRANSMISSION
        };
        let succ = lens_successor(frame, ray, hit, self.focal_length, transmission, 0.0)?;
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "focalLength",
                PropertyDescriptor::number(self.focal_length).label("Focal length"),
            )
            .push(
                "aperture",
                PropertyDescriptor::number(self.aperture).label("Aperture"),
            )
            .push(
                "coated",
                PropertyDescriptor::checkbox(self.coated).label("AR coating"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "focalLength" => self.focal_length = number_arg(name, value)?,
            "aperture" => self.aperture = number_arg(name, value)?.max(1.0),
            "coated" => self.coated = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Aspheric surface: ideal focusing with spherical aberration suppressed by
/// design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AsphericLens {
    #[serde(with = "float_or_inf")]
    pub focal_length: f64,
    pub aperture: f64,
    pub coated: bool,
}

impl Default for AsphericLens {
    fn default() -> Self {
        Self {
            focal_length: 100.0,
            aperture: 100.0,
            coated: true,
        }
    }
}

impl AsphericLens {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.aperture, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let transmission = if self.coated {
            COATED_TRANSMISSION
        } else {
            UNCOATED_TRANSMISSION
        };
        let succ = lens_successor(frame, ray, hit, self.focal_length, transmission, 0.0)?;
        Ok(vec![succ])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "focalLength",
                PropertyDescriptor::number(self.focal_length).label("Focal length"),
            )
            .push(
                "aperture",
                PropertyDescriptor::number(self.aperture).label("Aperture"),
            )
            .push(
                "coated",
                PropertyDescriptor::checkbox(self.coated).label("AR coating"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "focalLength" => self.focal_length = number_arg(name, value)?,
            "aperture" => self.aperture = number_arg(name, value)?.max(1.0),
            "coated" => self.coated = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Gradient-index lens. The graded profile is not modeled; incident rays stop
/// with an explicit `unimplemented_component` end state instead of silently
/// passing through.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GrinLens {
    pub aperture: f64,
}

impl Default for GrinLens {
    fn default() -> Self {
        Self { aperture: 60.0 }
    }
}

impl GrinLens {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.aperture, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        _hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        ray.terminate(TerminationReason::UnimplementedComponent);
        Ok(Vec::new())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new().push(
            "aperture",
            PropertyDescriptor::number(self.aperture).label("Aperture"),
        )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "aperture" => self.aperture = number_arg(name, value)?.max(1.0),
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

    fn vertical_lens_frame() -> ElementFrame {
        ElementFrame::new(Vec2::ZERO, FRAC_PI_2)
    }

    fn ray_from(origin: Vec2, dir: Vec2) -> Ray {
        Ray::new(
            RaySpec::emitted(origin, dir, 550.0, 1.0, "s"),
            &TraceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn axial_ray_passes_undeviated() {
        let mut lens = ThinLens::default();
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(-200.0, 0.0), Vec2::new(1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        assert!(succ[0].direction.approx_eq(Vec2::new(1.0, 0.0), 1e-12));
        assert_relative_eq!(succ[0].intensity, 0.96, epsilon = 1e-12);
    }

    #[test]
    fn parallel_ray_crosses_focal_point() {
        let mut lens = ThinLens::default();
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(-200.0, 20.0), Vec2::new(1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        let d = succ[0].direction;
        let t = (100.0 - hits[0].point.x) / d.x;
        let y_at_focus = hits[0].point.y + t * d.y;
        assert!(y_at_focus.abs() < 1e-6);
    }

    #[test]
    fn lens_law_is_side_symmetric() {
        let mut lens = ThinLens::default();
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(200.0, 20.0), Vec2::new(-1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        let d = succ[0].direction;
        let t = (-100.0 - hits[0].point.x) / d.x;
        let y_at_focus = hits[0].point.y + t * d.y;
        assert!(y_at_focus.abs() < 1e-6);
    }

    #[test]
    fn diverging_lens_bends_away_from_axis() {
        let mut lens = ThinLens {
            focal_length: -100.0,
            ..ThinLens::default()
        };
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(-200.0, 20.0), Vec2::new(1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        assert!(succ[0].direction.y > 0.0);
    }

    #[test]
    fn infinite_focal_length_is_flat_glass() {
        let mut lens = ThinLens {
            focal_length: f64::INFINITY,
            ..ThinLens::default()
        };
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(-200.0, 30.0), Vec2::new(1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        assert!(succ[0].direction.approx_eq(Vec2::new(1.0, 0.0), 1e-12));
    }

    #[test]
    fn chromatic_coefficient_shifts_focus_with_wavelength() {
        let f_blue = effective_focal_length(100.0, 0.05, 450.0);
        let f_red = effective_focal_length(100.0, 0.05, 650.0);
        assert!(f_blue < 100.0);
        assert!(f_red > 100.0);
    }

    #[test]
    fn spherical_aberration_bends_marginal_rays_more() {
        let mut lens = ThinLens {
            spherical_coeff: 0.001,
            ..ThinLens::default()
        };
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(-200.0, 40.0), Vec2::new(1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        let d = succ[0].direction;
        let t = -hits[0].point.y / d.y;
        let x_crossing = hits[0].point.x + t * d.x;
        assert!(x_crossing < 100.0, "marginal ray must focus short, got {x_crossing}");
    }

    #[test]
    fn ray_outside_aperture_misses() {
        let lens = ThinLens {
            aperture: 40.0,
            ..ThinLens::default()
        };
        let frame = vertical_lens_frame();
        let hits = lens.intersect(&frame, Vec2::new(-200.0, 30.0), Vec2::new(1.0, 0.0));
        assert!(hits.is_empty());
    }

    #[test]
    fn grin_lens_terminates_with_unimplemented() {
        let mut lens = GrinLens::default();
        let frame = vertical_lens_frame();
        let mut ray = ray_from(Vec2::new(-200.0, 0.0), Vec2::new(1.0, 0.0));
        let hits = lens.intersect(&frame, ray.origin, ray.direction);
        let succ = lens.interact(&frame, &mut ray, &hits[0]).unwrap();
        assert!(succ.is_empty());
        assert_eq!(
            ray.end_reason(),
            Some(TerminationReason::UnimplementedComponent)
        );
    }
}

//! Reflective components.
//!
//! All reflectors share the planar reflection rule `R = I − 2(I·N)N` with a
//! coating-dependent loss and a π phase flip; they differ in the surface the
//! intersection sweep sees.

use core_geom::Vec2;
use core_ray::Ray;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::geometry::{
    ElementFrame, HIT_EPSILON, ray_circle_intersections, ray_segment_intersection,
};
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, bool_arg, number_arg,
};
use crate::{Hit, HitExtra, InteractionError, loss};

const COATED_REFLECTANCE: f64 = 0.995;
const UNCOATED_REFLECTANCE: f64 = 0.99;

/// Single planar-segment intersection with a radial tag.
pub(crate) fn planar_intersect(
    frame: &ElementFrame,
    length: f64,
    origin: Vec2,
    dir: Vec2,
) -> Vec<Hit> {
    let (a, b) = frame.endpoints(length);
    match ray_segment_intersection(origin, dir, a, b) {
        Some((distance, point)) => vec![Hit {
            distance,
            point,
            normal: frame.normal_against(dir),
            surface: 0,
            extra: HitExtra::Radial(frame.signed_offset(point)),
        }],
        None => Vec::new(),
    }
}

/// One mirror-reflected successor with the given reflectance.
pub(crate) fn reflect_successor(ray: &Ray, hit: &Hit, reflectance: f64) -> Ray {
    let reflected = crate::geometry::reflect(ray.direction, hit.normal);
    let mut succ = ray.successor(hit.point, reflected);
    succ.intensity *= loss(ray, reflectance);
    succ.phase += PI;
    succ
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Mirror {
    pub length: f64,
    pub coated: bool,
}

impl Default for Mirror {
    fn default() -> Self {
        Self {
            length: 100.0,
            coated: false,
        }
    }
}

impl Mirror {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let factor = if self.coated {
            COATED_REFLECTANCE
        } else {
            UNCOATED_REFLECTANCE
        };
        Ok(vec![reflect_successor(ray, hit, factor)])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "coated",
                PropertyDescriptor::checkbox(self.coated).label("Dielectric coating"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "coated" => self.coated = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Spherical mirror: an arc with vertex at `pos`, bulging along the surface
/// normal. Positive radius puts the center of curvature on the +normal side
/// (concave for rays arriving from that side).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SphericalMirror {
    pub radius: f64,
    pub aperture: f64,
    pub coated: bool,
}

impl Default for SphericalMirror {
    fn default() -> Self {
        Self {
            radius: 200.0,
            aperture: 100.0,
            coated: false,
        }
    }
}

impl SphericalMirror {
    fn center(&self, frame: &ElementFrame) -> Vec2 {
        frame.pos.add(frame.normal().scale(self.radius))
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        if self.radius.abs() < 1e-9 {
            return Vec::new();
        }
        let center = self.center(frame);
        let r = self.radius.abs();
        let half_angle = ((self.aperture / 2.0) / r).min(1.0).asin();
        let vertex_dir = frame.pos.sub(center).normalize();
        let mut hits = Vec::new();
        for t in ray_circle_intersections(origin, dir, center, r) {
            if t <= HIT_EPSILON || !t.is_finite() {
                continue;
            }
            let point = origin.add(dir.scale(t));
            let radial = point.sub(center).normalize();
            // Central-angle mask keeps only the arc the aperture spans.
            if radial.dot(vertex_dir).clamp(-1.0, 1.0).acos() > half_angle {
                continue;
            }
            let mut normal = radial;
            if normal.dot(dir) > 0.0 {
                normal = -normal;
            }
            hits.push(Hit {
                distance: t,
                point,
                normal,
                surface: 0,
                extra: HitExtra::None,
            });
        }
        hits
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let factor = if self.coated {
            COATED_REFLECTANCE
        } else {
            UNCOATED_REFLECTANCE
        };
        Ok(vec![reflect_successor(ray, hit, factor)])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "radius",
                PropertyDescriptor::number(self.radius)
                    .label("Radius of curvature")
                    .title("Signed: positive bulges toward the surface normal"),
            )
            .push(
                "aperture",
                PropertyDescriptor::number(self.aperture).label("Aperture"),
            )
            .push(
                "coated",
                PropertyDescriptor::checkbox(self.coated).label("Dielectric coating"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "radius" => self.radius = number_arg(name, value)?,
            "aperture" => self.aperture = number_arg(name, value)?.max(1.0),
            "coated" => self.coated = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Parabolic mirror: vertex at `pos`, axis along the surface normal, focus at
/// `pos + normal · f`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParabolicMirror {
    pub focal_length: f64,
    pub width: f64,
    pub coated: bool,
}

impl Default for ParabolicMirror {
    fn default() -> Self {
        Self {
            focal_length: 100.0,
            width: 120.0,
            coated: false,
        }
    }
}

impl ParabolicMirror {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        let f = self.focal_length;
        if f.abs() < 1e-9 {
            return Vec::new();
        }
        let u_axis = frame.tangent();
        let v_axis = frame.normal();
        let rel = origin.sub(frame.pos);
        let (ou, ov) = (rel.dot(u_axis), rel.dot(v_axis));
        let (du, dv) = (dir.dot(u_axis), dir.dot(v_axis));
        // Surface v = u² / 4f in the local frame.
        let a = du * du;
        let b = 2.0 * ou * du - 4.0 * f * dv;
        let c = ou * ou - 4.0 * f * ov;
        let mut roots = Vec::new();
        if a.abs() < 1e-12 {
            if b.abs() > 1e-12 {
                roots.push(-c / b);
            }
        } else {
            let disc = b * b - 4.0 * a * c;
            if disc >= 0.0 {
                let s = disc.sqrt();
                roots.push((-b - s) / (2.0 * a));
                roots.push((-b + s) / (2.0 * a));
            }
        }
        let mut hits = Vec::new();
        for t in roots {
            if t <= HIT_EPSILON || !t.is_finite() {
                continue;
            }
            let u = ou + t * du;
            if u.abs() > self.width / 2.0 {
                continue;
            }
            let point = origin.add(dir.scale(t));
            // Gradient of v − u²/4f.
            let mut normal = v_axis.sub(u_axis.scale(u / (2.0 * f))).normalize();
            if normal.dot(dir) > 0.0 {
                normal = -normal;
            }
            hits.push(Hit {
                distance: t,
                point,
                normal,
                surface: 0,
                extra: HitExtra::Radial(u),
            });
        }
        hits
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let factor = if self.coated {
            COATED_REFLECTANCE
        } else {
            UNCOATED_REFLECTANCE
        };
        Ok(vec![reflect_successor(ray, hit, factor)])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "focalLength",
                PropertyDescriptor::number(self.focal_length).label("Focal length"),
            )
            .push(
                "width",
                PropertyDescriptor::number(self.width).label("Width"),
            )
            .push(
                "coated",
                PropertyDescriptor::checkbox(self.coated).label("Dielectric coating"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "focalLength" => self.focal_length = number_arg(name, value)?,
            "width" => self.width = number_arg(name, value)?.max(1.0),
            "coated" => self.coated = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Wavelength-selective mirror with a linear transition band around the
/// cutoff. Transitional wavelengths split proportionally.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DichroicMirror {
    pub length: f64,
    pub cutoff_nm: f64,
    pub transition_width_nm: f64,
    /// Reflect wavelengths longer than the cutoff (otherwise shorter).
    pub reflect_long: bool,
}

impl Default for DichroicMirror {
    fn default() -> Self {
        Self {
            length: 100.0,
            cutoff_nm: 550.0,
            transition_width_nm: 30.0,
            reflect_long: true,
        }
    }
}

impl DichroicMirror {
    /// Power reflectance at the given wavelength.
    pub fn reflectance(&self, wavelength_nm: f64) -> f64 {
        let w = self.transition_width_nm.max(1e-9);
        let t = ((wavelength_nm - (self.cutoff_nm - w / 2.0)) / w).clamp(0.0, 1.0);
        if self.reflect_long { t } else { 1.0 - t }
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
        let r = self.reflectance(ray.wavelength_nm);
        let mut successors = Vec::with_capacity(2);
        if r > 1e-9 {
            let mut reflected = reflect_successor(ray, hit, 1.0);
            reflected.intensity = ray.intensity * r;
            successors.push(reflected);
        }
        if 1.0 - r > 1e-9 {
            let mut transmitted = ray.successor(hit.point, ray.direction);
            transmitted.intensity = ray.intensity * (1.0 - r);
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
                "cutoffNm",
                PropertyDescriptor::range(self.cutoff_nm, 380.0, 780.0, 1.0)
                    .label("Cutoff (nm)"),
            )
            .push(
                "transitionWidthNm",
                PropertyDescriptor::range(self.transition_width_nm, 0.0, 200.0, 1.0)
                    .label("Transition width (nm)"),
            )
            .push(
                "reflectLong",
                PropertyDescriptor::checkbox(self.reflect_long).label("Reflect long-pass side"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "cutoffNm" => self.cutoff_nm = number_arg(name, value)?,
            "transitionWidthNm" => self.transition_width_nm = number_arg(name, value)?.max(0.0),
            "reflectLong" => self.reflect_long = bool_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetallicMirror {
    pub length: f64,
    pub reflectivity: f64,
}

impl Default for MetallicMirror {
    fn default() -> Self {
        Self {
            length: 100.0,
            reflectivity: 0.90,
        }
    }
}

impl MetallicMirror {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        Ok(vec![reflect_successor(ray, hit, self.reflectivity)])
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "reflectivity",
                PropertyDescriptor::range(self.reflectivity, 0.0, 1.0, 0.01)
                    .label("Reflectivity"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "reflectivity" => self.reflectivity = number_arg(name, value)?.clamp(0.0, 1.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Annular mirror: reflective outside the center hole, transparent through
/// it. Geometry degenerates to a planar strip of length `2·outer_radius`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RingMirror {
    pub outer_radius: f64,
    pub inner_radius: f64,
}

impl Default for RingMirror {
    fn default() -> Self {
        Self {
            outer_radius: 50.0,
            inner_radius: 10.0,
        }
    }
}

impl RingMirror {
    pub fn new(outer_radius: f64, inner_radius: f64) -> Self {
        let mut m = Self {
            outer_radius,
            inner_radius,
        };
        m.clamp_geometry();
        m
    }

    /// Degenerate inputs clamp to a drawable annulus: outer at least 10,
    /// inner leaving at least a 5-wide rim.
    fn clamp_geometry(&mut self) {
        self.outer_radius = self.outer_radius.max(10.0);
        self.inner_radius = self.inner_radius.clamp(0.0, self.outer_radius - 5.0);
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, 2.0 * self.outer_radius, origin, dir)
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let radial = match hit.extra {
            HitExtra::Radial(r) => r,
            _ => 0.0,
        };
        if radial.abs() < self.inner_radius {
            // Through the hole: unchanged.
            Ok(vec![ray.successor(hit.point, ray.direction)])
        } else {
            Ok(vec![reflect_successor(ray, hit, UNCOATED_REFLECTANCE)])
        }
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "outerRadius",
                PropertyDescriptor::number(self.outer_radius).label("Outer radius"),
            )
            .push(
                "innerRadius",
                PropertyDescriptor::number(self.inner_radius)
                    .label("Hole radius")
                    .title("Rays inside the hole pass through unchanged"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "outerRadius" => self.outer_radius = number_arg(name, value)?,
            "innerRadius" => self.inner_radius = number_arg(name, value)?,
            _ => return Err(PropertyError::unknown(name)),
        }
        self.clamp_geometry();
        Ok(())
    }
}

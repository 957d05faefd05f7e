//! Refractive and dispersive components.
//!
//! Dielectrics use Cauchy dispersion `n(λ) = n₀ + B/λ²` (B in nm²) and
//! Fresnel-split successors at every face crossing. Interior absorption is
//! attributed to the exit interaction using the straight-line path from the
//! entry point, so internally reflected stretches carry no extra decay.

use core_geom::Vec2;
use core_ray::{Ray, TerminationReason};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::geometry::{
    ElementFrame, fresnel_reflectance, prism_corners, ray_polygon_hits, rect_corners, refract,
};
use crate::mirrors::planar_intersect;
use crate::properties::{
    PropValue, PropertyDescriptor, PropertyError, PropertyTable, number_arg,
};
use crate::{Hit, HitExtra, InteractionError};

/// Wavelength-dependent index shared by the dielectric variants.
fn refractive_index(n0: f64, dispersion_b_nm2: f64, wavelength_nm: f64) -> f64 {
    n0 + dispersion_b_nm2 / (wavelength_nm * wavelength_nm)
}

/// Polygon-edge intersections tagged entering/exiting.
fn polygon_intersect(origin: Vec2, dir: Vec2, corners: &[Vec2]) -> Vec<Hit> {
    ray_polygon_hits(origin, dir, corners)
        .into_iter()
        .map(|edge| {
            let entering = edge.outward_normal.dot(dir) < 0.0;
            Hit {
                distance: edge.distance,
                point: edge.point,
                normal: if entering {
                    edge.outward_normal
                } else {
                    -edge.outward_normal
                },
                surface: edge.edge as u32,
                extra: HitExtra::Face { entering },
            }
        })
        .collect()
}

/// Snell/Fresnel face crossing. Terminates the parent with `tir` when the
/// transmitted branch is impossible; otherwise emits transmitted + reflected
/// successors with Fresnel-split intensities. `absorption_alpha` attenuates
/// the transmitted branch on exit by the interior path length.
fn face_interact(
    ray: &mut Ray,
    hit: &Hit,
    glass_index: f64,
    absorption_alpha: f64,
) -> Result<Vec<Ray>, InteractionError> {
    let entering = match hit.extra {
        HitExtra::Face { entering } => entering,
        _ => true,
    };
    let n1 = ray.medium_refractive_index;
    let n2 = if entering { glass_index } else { 1.0 };
    if !(n1.is_finite() && n2.is_finite()) || n1 <= 0.0 || n2 <= 0.0 {
        return Err(InteractionError::NonFinite {
            context: "refractive index",
        });
    }
    let cos_i = (-ray.direction.dot(hit.normal)).clamp(-1.0, 1.0);

    let Some(transmitted_dir) = refract(ray.direction, hit.normal, n1 / n2) else {
        // Total internal reflection: one reflected successor, same medium.
        ray.terminate(TerminationReason::TotalInternalReflection);
        let reflected_dir = crate::geometry::reflect(ray.direction, hit.normal);
        let mut reflected = ray.successor(hit.point, reflected_dir);
        reflected.phase += PI;
        return Ok(vec![reflected]);
    };

    let cos_t = (-transmitted_dir.dot(-hit.normal)).abs().clamp(0.0, 1.0);
    let reflectance = fresnel_reflectance(n1, n2, cos_i, cos_t);

    let mut successors = Vec::with_capacity(2);
    let mut transmitted = ray.successor(hit.point, transmitted_dir);
    transmitted.medium_refractive_index = n2;
    transmitted.intensity = ray.intensity * (1.0 - reflectance);
    if !entering && absorption_alpha > 0.0 {
        let path_inside = hit.point.distance_to(ray.origin);
        transmitted.intensity *= (-absorption_alpha * path_inside).exp();
    }
    successors.push(transmitted);

    if reflectance > 1e-9 {
        let reflected_dir = crate::geometry::reflect(ray.direction, hit.normal);
        let mut reflected = ray.successor(hit.point, reflected_dir);
        reflected.intensity = ray.intensity * reflectance;
        if n2 > n1 {
            reflected.phase += PI;
        }
        successors.push(reflected);
    }
    Ok(successors)
}

/// Rectangular slab of dispersive glass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DielectricBlock {
    pub width: f64,
    pub height: f64,
    pub n0: f64,
    pub dispersion_b: f64,
    pub absorption_alpha: f64,
}

impl Default for DielectricBlock {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 200.0,
            n0: 1.5,
            dispersion_b: 0.0,
            absorption_alpha: 0.0,
        }
    }
}

impl DielectricBlock {
    pub fn index_at(&self, wavelength_nm: f64) -> f64 {
        refractive_index(self.n0, self.dispersion_b, wavelength_nm)
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        polygon_intersect(origin, dir, &rect_corners(frame, self.width, self.height))
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        face_interact(
            ray,
            hit,
            self.index_at(ray.wavelength_nm),
            self.absorption_alpha,
        )
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
            .push(
                "n0",
                PropertyDescriptor::range(self.n0, 1.0, 3.0, 0.01).label("Base index n₀"),
            )
            .push(
                "dispersionB",
                PropertyDescriptor::number(self.dispersion_b)
                    .label("Dispersion B (nm²)")
                    .title("n(λ) = n₀ + B/λ²"),
            )
            .push(
                "absorptionAlpha",
                PropertyDescriptor::number(self.absorption_alpha)
                    .label("Absorption α (1/unit)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "width" => self.width = number_arg(name, value)?.max(1.0),
            "height" => self.height = number_arg(name, value)?.max(1.0),
            "n0" => self.n0 = number_arg(name, value)?.max(1.0),
            "dispersionB" => self.dispersion_b = number_arg(name, value)?.max(0.0),
            "absorptionAlpha" => self.absorption_alpha = number_arg(name, value)?.max(0.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Triangular dielectric; the classic dispersive element.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Prism {
    pub side: f64,
    pub apex_deg: f64,
    pub n0: f64,
    pub dispersion_b: f64,
    pub absorption_alpha: f64,
}

impl Default for Prism {
    fn default() -> Self {
        Self {
            side: 150.0,
            apex_deg: 60.0,
            n0: 1.5,
            dispersion_b: 4000.0,
            absorption_alpha: 0.0,
        }
    }
}

impl Prism {
    pub fn index_at(&self, wavelength_nm: f64) -> f64 {
        refractive_index(self.n0, self.dispersion_b, wavelength_nm)
    }

    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        polygon_intersect(origin, dir, &prism_corners(frame, self.side, self.apex_deg))
    }

    pub fn interact(
        &mut self,
        _frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        face_interact(
            ray,
            hit,
            self.index_at(ray.wavelength_nm),
            self.absorption_alpha,
        )
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push("side", PropertyDescriptor::number(self.side).label("Base"))
            .push(
                "apexDeg",
                PropertyDescriptor::range(self.apex_deg, 10.0, 170.0, 1.0)
                    .label("Apex angle (deg)"),
            )
            .push(
                "n0",
                PropertyDescriptor::range(self.n0, 1.0, 3.0, 0.01).label("Base index n₀"),
            )
            .push(
                "dispersionB",
                PropertyDescriptor::number(self.dispersion_b).label("Dispersion B (nm²)"),
            )
            .push(
                "absorptionAlpha",
                PropertyDescriptor::number(self.absorption_alpha)
                    .label("Absorption α (1/unit)"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "side" => self.side = number_arg(name, value)?.max(1.0),
            "apexDeg" => self.apex_deg = number_arg(name, value)?.clamp(1.0, 179.0),
            "n0" => self.n0 = number_arg(name, value)?.max(1.0),
            "dispersionB" => self.dispersion_b = number_arg(name, value)?.max(0.0),
            "absorptionAlpha" => self.absorption_alpha = number_arg(name, value)?.max(0.0),
            _ => return Err(PropertyError::unknown(name)),
        }
        Ok(())
    }
}

/// Transmission grating emitting orders `−m..+m` per `sin θ_m = sin θ_i +
/// m·λ/d`, energy split uniformly across the surviving orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DiffractionGrating {
    pub length: f64,
    pub line_spacing_um: f64,
    pub max_order: u32,
}

impl Default for DiffractionGrating {
    fn default() -> Self {
        Self {
            length: 100.0,
            line_spacing_um: 2.0,
            max_order: 1,
        }
    }
}

impl DiffractionGrating {
    pub fn intersect(&self, frame: &ElementFrame, origin: Vec2, dir: Vec2) -> Vec<Hit> {
        planar_intersect(frame, self.length, origin, dir)
    }

    pub fn interact(
        &mut self,
        frame: &ElementFrame,
        ray: &mut Ray,
        hit: &Hit,
    ) -> Result<Vec<Ray>, InteractionError> {
        let spacing_nm = self.line_spacing_um * 1000.0;
        if spacing_nm <= 0.0 {
            return Err(InteractionError::NonFinite {
                context: "grating line spacing",
            });
        }
        let tangent = frame.tangent();
        let forward = -hit.normal; // transmission side
        let sin_i = ray.direction.dot(tangent);
        let m_max = self.max_order as i32;

        let mut directions = Vec::new();
        for m in -m_max..=m_max {
            let sin_m = sin_i + m as f64 * ray.wavelength_nm / spacing_nm;
            if sin_m.abs() > 1.0 {
                continue; // evanescent order
            }
            let cos_m = (1.0 - sin_m * sin_m).sqrt();
            directions.push(forward.scale(cos_m).add(tangent.scale(sin_m)));
        }
        if directions.is_empty() {
            ray.terminate(TerminationReason::Blocked);
            return Ok(Vec::new());
        }
        let per_order = ray.intensity / directions.len() as f64;
        Ok(directions
            .into_iter()
            .map(|dir| {
                let mut succ = ray.successor(hit.point, dir);
                succ.intensity = per_order;
                succ
            })
            .collect())
    }

    pub fn properties(&self) -> PropertyTable {
        PropertyTable::new()
            .push(
                "length",
                PropertyDescriptor::number(self.length).label("Length"),
            )
            .push(
                "lineSpacingUm",
                PropertyDescriptor::number(self.line_spacing_um).label("Line spacing (µm)"),
            )
            .push(
                "maxOrder",
                PropertyDescriptor::range(self.max_order as f64, 0.0, 5.0, 1.0)
                    .label("Max order"),
            )
    }

    pub fn set_property(&mut self, name: &str, value: &PropValue) -> Result<(), PropertyError> {
        match name {
            "lineSpacingUm" => {
                let v = number_arg(name, value)?;
                if v <= 0.0 {
                    return Err(PropertyError::Invalid {
                        name: name.to_string(),
                        reason: "must be positive".to_string(),
                    });
                }
                self.line_spacing_um = v;
            }
            "length" => self.length = number_arg(name, value)?.max(1.0),
            "maxOrder" => self.max_order = number_arg(name, value)?.clamp(0.0, 10.0) as u32,
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

    fn block_frame() -> ElementFrame {
        ElementFrame::new(Vec2::ZERO, 0.0)
    }

    fn ray(origin: Vec2, dir: Vec2) -> Ray {
        Ray::new(
            RaySpec::emitted(origin, dir, 632.8, 1.0, "s"),
            &TraceConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn normal_incidence_passes_straight_through() {
        let mut block = DielectricBlock::default();
        let frame = block_frame();
        let mut r = ray(Vec2::new(-150.0, 0.0), Vec2::new(1.0, 0.0));
        let hits = block.intersect(&frame, r.origin, r.direction);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].extra, HitExtra::Face { entering: true });
        let succ = block.interact(&frame, &mut r, &hits[0]).unwrap();
        let transmitted = &succ[0];
        assert!(transmitted.direction.approx_eq(Vec2::new(1.0, 0.0), 1e-12));
        assert_relative_eq!(transmitted.medium_refractive_index, 1.5);
        // Normal-incidence Fresnel: R = 0.04 at n = 1.5.
        assert_relative_eq!(transmitted.intensity, 0.96, epsilon = 1e-9);
        assert_relative_eq!(succ[1].intensity, 0.04, epsilon = 1e-9);
    }

    #[test]
    fn snell_holds_at_oblique_entry() {
        let mut block = DielectricBlock::default();
        let frame = block_frame();
        let theta_i: f64 = 0.5;
        let dir = Vec2::new(theta_i.cos(), theta_i.sin());
        let mut r = ray(Vec2::new(-300.0, -40.0), dir);
        let hits = block.intersect(&frame, r.origin, r.direction);
        let entry = hits
            .iter()
            .find(|h| matches!(h.extra, HitExtra::Face { entering: true }))
            .copied()
            .unwrap();
        let succ = block.interact(&frame, &mut r, &entry).unwrap();
        let transmitted = &succ[0];
        let sin_t = transmitted.direction.cross(-entry.normal).abs();
        assert_relative_eq!(1.0 * theta_i.sin(), 1.5 * sin_t, epsilon = 1e-8);
    }

    #[test]
    fn interior_hit_beyond_critical_angle_reflects_with_tir() {
        let mut block = DielectricBlock::default();
        // Interior ray at 45° meeting the right face: sin θ · 1.5 > 1.
        let mut r = ray(Vec2::new(0.0, -20.0), Vec2::new(1.0, 1.0).normalize());
        r.medium_refractive_index = 1.5;
        let frame = block_frame();
        let hits = block.intersect(&frame, r.origin, r.direction);
        let exit = hits
            .iter()
            .find(|h| matches!(h.extra, HitExtra::Face { entering: false }))
            .copied()
            .unwrap();
        let succ = block.interact(&frame, &mut r, &exit).unwrap();
        assert_eq!(succ.len(), 1);
        assert_eq!(
            r.end_reason(),
            Some(TerminationReason::TotalInternalReflection)
        );
        assert_relative_eq!(succ[0].medium_refractive_index, 1.5);
        assert_relative_eq!(succ[0].intensity, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn just_below_critical_angle_still_refracts() {
        let critical = (1.0f64 / 1.5).asin();
        let mut block = DielectricBlock::default();
        let frame = block_frame();
        let theta = critical - 1e-6;
        let mut r = ray(Vec2::ZERO, Vec2::new(theta.cos(), theta.sin()));
        r.medium_refractive_index = 1.5;
        let hits = block.intersect(&frame, r.origin, r.direction);
        let exit = hits
            .iter()
            .find(|h| matches!(h.extra, HitExtra::Face { entering: false }))
            .copied()
            .unwrap();
        let succ = block.interact(&frame, &mut r, &exit).unwrap();
        assert!(succ.len() >= 1);
        assert!(r.end_reason().is_none());
        assert_relative_eq!(succ[0].medium_refractive_index, 1.0);
    }

    #[test]
    fn absorption_applies_on_exit_path_length() {
        let mut block = DielectricBlock {
            absorption_alpha: 0.01,
            ..DielectricBlock::default()
        };
        let frame = block_frame();
        // Interior axial ray entering at the left face.
        let mut r = ray(Vec2::new(-100.0, 0.0), Vec2::new(1.0, 0.0));
        r.medium_refractive_index = 1.5;
        let hits = block.intersect(&frame, r.origin, r.direction);
        let exit = hits
            .iter()
            .find(|h| matches!(h.extra, HitExtra::Face { entering: false }))
            .copied()
            .unwrap();
        let succ = block.interact(&frame, &mut r, &exit).unwrap();
        // 200 units inside at α = 0.01 → e⁻² on top of the Fresnel split.
        let expected = 0.96 * (-2.0f64).exp();
        assert_relative_eq!(succ[0].intensity, expected, epsilon = 1e-6);
    }

    #[test]
    fn dispersion_bends_blue_more_than_red() {
        let block = DielectricBlock {
            dispersion_b: 4000.0,
            ..DielectricBlock::default()
        };
        assert!(block.index_at(450.0) > block.index_at(650.0));
    }

    #[test]
    fn grating_produces_expected_order_angles() {
        let mut grating = DiffractionGrating {
            line_spacing_um: 2.0,
            max_order: 2,
            ..DiffractionGrating::default()
        };
        let frame = ElementFrame::new(Vec2::ZERO, FRAC_PI_2);
        let mut r = Ray::new(
            RaySpec::emitted(Vec2::new(-100.0, 0.0), Vec2::new(1.0, 0.0), 500.0, 1.0, "s"),
            &TraceConfig::default(),
        )
        .unwrap();
        let hits = grating.intersect(&frame, r.origin, r.direction);
        let succ = grating.interact(&frame, &mut r, &hits[0]).unwrap();
        assert_eq!(succ.len(), 5);
        for ray in &succ {
            assert_relative_eq!(ray.intensity, 0.2, epsilon = 1e-12);
        }
        let mut sines: Vec<f64> = succ
            .iter()
            .map(|s| s.direction.dot(frame.tangent()))
            .collect();
        sines.sort_by(|a, b| a.total_cmp(b));
        for (i, expected) in [-0.5, -0.25, 0.0, 0.25, 0.5].iter().enumerate() {
            assert_relative_eq!(sines[i], expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn zero_order_grating_transmits_straight() {
        let mut grating = DiffractionGrating {
            max_order: 0,
            ..DiffractionGrating::default()
        };
        let frame = ElementFrame::new(Vec2::ZERO, FRAC_PI_2);
        let mut r = ray(Vec2::new(-100.0, 0.0), Vec2::new(1.0, 0.0));
        let hits = grating.intersect(&frame, r.origin, r.direction);
        let succ = grating.interact(&frame, &mut r, &hits[0]).unwrap();
        assert_eq!(succ.len(), 1);
        assert!(succ[0].direction.approx_eq(Vec2::new(1.0, 0.0), 1e-12));
        assert_relative_eq!(succ[0].intensity, 1.0);
    }

    #[test]
    fn prism_deviates_toward_base() {
        let mut prism = Prism::default();
        let frame = ElementFrame::new(Vec2::ZERO, 0.0);
        // Horizontal ray crossing the left flank above the base.
        let mut r = ray(Vec2::new(-200.0, 40.0), Vec2::new(1.0, 0.0));
        let hits = prism.intersect(&frame, r.origin, r.direction);
        assert_eq!(hits.len(), 2, "entering and exiting flank crossings");
        let entry = hits[0];
        assert_eq!(entry.extra, HitExtra::Face { entering: true });
        let succ = prism.interact(&frame, &mut r, &entry).unwrap();
        // Refraction at the tilted flank bends the ray toward the base.
        assert!(succ[0].direction.y < 0.0);
    }
}

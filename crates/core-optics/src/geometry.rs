//! Intersection and interface math shared by the component variants.
//!
//! All planar elements use the same frame convention: the element surface
//! extends along `angle_rad` and is centered on `pos`. Polarization and fiber
//! axes are separate component properties, never inferred from the frame.

use core_geom::Vec2;

/// Hits closer than this are discarded to prevent self-intersection.
pub const HIT_EPSILON: f64 = 1e-6;

/// Position + orientation of a planar element.
#[derive(Debug, Clone, Copy)]
pub struct ElementFrame {
    pub pos: Vec2,
    pub angle_rad: f64,
}

impl ElementFrame {
    pub fn new(pos: Vec2, angle_rad: f64) -> Self {
        Self { pos, angle_rad }
    }

    /// Unit vector along the element surface.
    pub fn tangent(&self) -> Vec2 {
        Vec2::from_angle(self.angle_rad)
    }

    /// Unit surface normal, counter-clockwise from the tangent.
    pub fn normal(&self) -> Vec2 {
        self.tangent().perp()
    }

    /// Unit surface normal oriented against `incoming` (the convention every
    /// `Hit` carries).
    pub fn normal_against(&self, incoming: Vec2) -> Vec2 {
        let n = self.normal();
        if n.dot(incoming) > 0.0 { -n } else { n }
    }

    /// Endpoints of a surface segment of the given total length.
    pub fn endpoints(&self, length: f64) -> (Vec2, Vec2) {
        let half = self.tangent().scale(length / 2.0);
        (self.pos.sub(half), self.pos.add(half))
    }

    /// Signed offset of `p` from the element center, measured along the
    /// surface tangent.
    pub fn signed_offset(&self, p: Vec2) -> f64 {
        p.sub(self.pos).dot(self.tangent())
    }
}

/// Ray vs. segment `[a, b]`. Returns `(distance, point)` for hits beyond
/// [`HIT_EPSILON`].
pub fn ray_segment_intersection(
    origin: Vec2,
    dir: Vec2,
    a: Vec2,
    b: Vec2,
) -> Option<(f64, Vec2)> {
    let seg = b.sub(a);
    let denom = dir.cross(seg);
    if denom.abs() < 1e-12 {
        return None; // parallel
    }
    let diff = a.sub(origin);
    let t = diff.cross(seg) / denom;
    let u = diff.cross(dir) / denom;
    if t > HIT_EPSILON && (0.0..=1.0).contains(&u) {
        let point = origin.add(dir.scale(t));
        if t.is_finite() && point.is_finite() {
            return Some((t, point));
        }
    }
    None
}

/// Ray vs. circle, both quadratic roots in ascending order (may be behind the
/// origin; callers filter by [`HIT_EPSILON`]).
pub fn ray_circle_intersections(origin: Vec2, dir: Vec2, center: Vec2, radius: f64) -> Vec<f64> {
    let oc = origin.sub(center);
    let b = 2.0 * oc.dot(dir);
    let c = oc.magnitude_squared() - radius * radius;
    let disc = b * b - 4.0 * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sqrt_disc = disc.sqrt();
    let t0 = (-b - sqrt_disc) / 2.0;
    let t1 = (-b + sqrt_disc) / 2.0;
    if (t1 - t0).abs() < 1e-12 {
        vec![t0]
    } else {
        vec![t0, t1]
    }
}

/// Mirror reflection `R = I − 2(I·N)N`.
pub fn reflect(incident: Vec2, normal: Vec2) -> Vec2 {
    incident.sub(normal.scale(2.0 * incident.dot(normal)))
}

/// Snell refraction of unit `incident` across unit `normal` (oriented against
/// the incident ray). `eta = n1 / n2`. `None` signals total internal
/// reflection.
pub fn refract(incident: Vec2, normal: Vec2, eta: f64) -> Option<Vec2> {
    let cos_i = -incident.dot(normal);
    let sin_t_sq = eta * eta * (1.0 - cos_i * cos_i);
    if sin_t_sq > 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin_t_sq).sqrt();
    Some(
        incident
            .scale(eta)
            .add(normal.scale(eta * cos_i - cos_t))
            .normalize(),
    )
}

/// Unpolarized Fresnel power reflectance at a dielectric interface.
pub fn fresnel_reflectance(n1: f64, n2: f64, cos_i: f64, cos_t: f64) -> f64 {
    let rs = (n1 * cos_i - n2 * cos_t) / (n1 * cos_i + n2 * cos_t);
    let rp = (n2 * cos_i - n1 * cos_t) / (n2 * cos_i + n1 * cos_t);
    ((rs * rs + rp * rp) / 2.0).clamp(0.0, 1.0)
}

/// Corners of a `width × height` rectangle in the element frame,
/// counter-clockwise.
pub fn rect_corners(frame: &ElementFrame, width: f64, height: f64) -> [Vec2; 4] {
    let u = frame.tangent().scale(width / 2.0);
    let v = frame.normal().scale(height / 2.0);
    [
        frame.pos.sub(u).sub(v),
        frame.pos.add(u).sub(v),
        frame.pos.add(u).add(v),
        frame.pos.sub(u).add(v),
    ]
}

/// Isoceles-triangle corners for a prism of the given base and apex angle,
/// apex up in the element frame.
pub fn prism_corners(frame: &ElementFrame, base: f64, apex_deg: f64) -> [Vec2; 3] {
    let half_base = base / 2.0;
    let half_apex = (apex_deg.to_radians() / 2.0).max(1e-3);
    let height = half_base / half_apex.tan();
    let u = frame.tangent();
    let v = frame.normal();
    [
        frame.pos.sub(u.scale(half_base)),
        frame.pos.add(u.scale(half_base)),
        frame.pos.add(v.scale(height)),
    ]
}

/// One polygon-edge crossing: distance, point, outward edge normal, edge
/// index.
#[derive(Debug, Clone, Copy)]
pub struct EdgeHit {
    pub distance: f64,
    pub point: Vec2,
    pub outward_normal: Vec2,
    pub edge: usize,
}

/// All edge crossings of a convex counter-clockwise polygon, nearest first.
/// Non-finite candidates are discarded.
pub fn ray_polygon_hits(origin: Vec2, dir: Vec2, corners: &[Vec2]) -> Vec<EdgeHit> {
    let mut hits = Vec::new();
    for i in 0..corners.len() {
        let a = corners[i];
        let b = corners[(i + 1) % corners.len()];
        if let Some((distance, point)) = ray_segment_intersection(origin, dir, a, b) {
            // CCW winding puts the outward normal clockwise from the edge.
            let outward_normal = b.sub(a).normalize().perp().scale(-1.0);
            if outward_normal.is_finite() {
                hits.push(EdgeHit {
                    distance,
                    point,
                    outward_normal,
                    edge: i,
                });
            }
        }
    }
    hits.sort_by(|l, r| l.distance.total_cmp(&r.distance));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn segment_hit_at_expected_distance() {
        let (t, p) = ray_segment_intersection(
            Vec2::new(-100.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -50.0),
            Vec2::new(0.0, 50.0),
        )
        .unwrap();
        assert_relative_eq!(t, 100.0, epsilon = 1e-9);
        assert!(p.approx_eq(Vec2::ZERO, 1e-9));
    }

    #[test]
    fn segment_miss_beyond_endpoints() {
        assert!(
            ray_segment_intersection(
                Vec2::new(-100.0, 60.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, -50.0),
                Vec2::new(0.0, 50.0),
            )
            .is_none()
        );
    }

    #[test]
    fn behind_origin_is_not_a_hit() {
        assert!(
            ray_segment_intersection(
                Vec2::new(10.0, 0.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, -50.0),
                Vec2::new(0.0, 50.0),
            )
            .is_none()
        );
    }

    #[test]
    fn reflect_preserves_incidence_angle() {
        let n = Vec2::new(-1.0, 0.0);
        let i = Vec2::new(1.0, 0.5).normalize();
        let r = reflect(i, n);
        assert_relative_eq!(i.dot(n).abs(), r.dot(n).abs(), epsilon = 1e-12);
        assert_relative_eq!(r.magnitude(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn refract_obeys_snell() {
        let n = Vec2::new(-1.0, 0.0);
        let theta_i: f64 = 0.5;
        let i = Vec2::new(theta_i.cos(), theta_i.sin());
        let t = refract(i, n, 1.0 / 1.5).unwrap();
        let sin_t = t.cross(-n).abs();
        assert_relative_eq!(sin_t, theta_i.sin() / 1.5, epsilon = 1e-9);
    }

    #[test]
    fn refract_signals_tir() {
        let n = Vec2::new(-1.0, 0.0);
        let theta_i: f64 = 0.9; // beyond the 1.5→1.0 critical angle (~0.7297)
        let i = Vec2::new(theta_i.cos(), theta_i.sin());
        assert!(refract(i, n, 1.5).is_none());
    }

    #[test]
    fn fresnel_normal_incidence_glass() {
        let r = fresnel_reflectance(1.0, 1.5, 1.0, 1.0);
        assert_relative_eq!(r, 0.04, epsilon = 1e-9);
    }

    #[test]
    fn polygon_hits_report_entering_then_exiting() {
        let frame = ElementFrame::new(Vec2::ZERO, 0.0);
        let corners = rect_corners(&frame, 200.0, 200.0);
        let hits = ray_polygon_hits(Vec2::new(-150.0, 0.0), Vec2::new(1.0, 0.0), &corners);
        assert_eq!(hits.len(), 2);
        assert_relative_eq!(hits[0].distance, 50.0, epsilon = 1e-9);
        assert_relative_eq!(hits[1].distance, 250.0, epsilon = 1e-9);
        assert!(hits[0].outward_normal.approx_eq(Vec2::new(-1.0, 0.0), 1e-9));
        assert!(hits[1].outward_normal.approx_eq(Vec2::new(1.0, 0.0), 1e-9));
    }

    #[test]
    fn frame_normal_faces_against_ray() {
        let frame = ElementFrame::new(Vec2::ZERO, FRAC_PI_2);
        let n = frame.normal_against(Vec2::new(1.0, 0.0));
        assert!(n.dot(Vec2::new(1.0, 0.0)) < 0.0);
    }
}

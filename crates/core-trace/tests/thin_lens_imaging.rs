use core_geom::Vec2;
use core_optics::{ComponentKind, FanSource, ThinLens};
use core_scene::Scene;
use core_trace::trace;
use std::f64::consts::FRAC_PI_2;

const VIEWPORT: (f64, f64) = (2000.0, 1600.0);

/// A point source at 2f images onto the axis at 2f on the far side with
/// magnification −1.
#[test]
fn fan_source_at_twice_f_converges_at_twice_f() {
    let mut scene = Scene::new("imaging");
    scene.spawn(
        ComponentKind::FanSource(FanSource {
            ray_count: 5,
            fan_angle_deg: 4.0, // ±2°
            ..FanSource::default()
        }),
        Vec2::new(-200.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::ThinLens(ThinLens {
            focal_length: 100.0,
            aperture: 200.0,
            ..ThinLens::default()
        }),
        Vec2::ZERO,
        FRAC_PI_2,
    );

    let result = trace(&mut scene, VIEWPORT, Vec::new());
    let imaged: Vec<_> = result
        .completed_paths
        .iter()
        .filter(|r| r.bounces_so_far == 1)
        .collect();
    assert_eq!(imaged.len(), 5);

    for ray in imaged {
        // Height of the refracted ray at the image plane x = +200.
        let t = (200.0 - ray.origin.x) / ray.direction.x;
        let y_at_image = ray.origin.y + t * ray.direction.y;
        assert!(
            y_at_image.abs() < 1e-3,
            "ray through lens at y={} crosses image plane at {y_at_image}",
            ray.origin.y
        );
    }
}

/// An off-axis object point at 2f maps to −y at the image plane
/// (magnification −1).
#[test]
fn off_axis_point_inverts() {
    let mut scene = Scene::new("magnification");
    scene.spawn(
        ComponentKind::FanSource(FanSource {
            ray_count: 3,
            fan_angle_deg: 2.0,
            ..FanSource::default()
        }),
        Vec2::new(-200.0, 10.0),
        -2.9f64.to_radians(), // aim roughly at the lens center
    );
    scene.spawn(
        ComponentKind::ThinLens(ThinLens {
            focal_length: 100.0,
            aperture: 200.0,
            ..ThinLens::default()
        }),
        Vec2::ZERO,
        FRAC_PI_2,
    );

    let result = trace(&mut scene, VIEWPORT, Vec::new());
    for ray in result
        .completed_paths
        .iter()
        .filter(|r| r.bounces_so_far == 1)
    {
        let t = (200.0 - ray.origin.x) / ray.direction.x;
        let y_at_image = ray.origin.y + t * ray.direction.y;
        assert!(
            (y_at_image + 10.0).abs() < 1e-3,
            "expected image at y=-10, ray lands at {y_at_image}"
        );
    }
}

use approx::assert_relative_eq;
use core_geom::Vec2;
use core_optics::{BeamSplitter, ComponentKind, LaserSource, Polarizer};
use core_ray::Polarization;
use core_scene::Scene;
use core_trace::trace;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

const VIEWPORT: (f64, f64) = (2000.0, 1600.0);

/// Linearly polarized source at 0° through an aligned polarizer, then a PBS
/// whose surface sits at 45°: both arms carry half the power.
#[test]
fn polarizer_then_pbs_splits_evenly() {
    let mut scene = Scene::new("malus-pbs");
    let mut laser = LaserSource::default();
    laser.polarization = Polarization::Linear { angle_rad: 0.0 };
    scene.spawn(
        ComponentKind::LaserSource(laser),
        Vec2::new(-200.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::Polarizer(Polarizer {
            transmission_axis_rad: 0.0,
            ..Polarizer::default()
        }),
        Vec2::new(-100.0, 0.0),
        FRAC_PI_2,
    );
    scene.spawn(
        ComponentKind::BeamSplitter(BeamSplitter {
            polarizing: true,
            ..BeamSplitter::default()
        }),
        Vec2::ZERO,
        FRAC_PI_4,
    );

    let result = trace(&mut scene, VIEWPORT, Vec::new());

    // After the aligned polarizer the beam is undimmed.
    let after_polarizer = result
        .completed_paths
        .iter()
        .find(|r| r.bounces_so_far == 1)
        .expect("segment between polarizer and PBS");
    assert_relative_eq!(after_polarizer.intensity, 1.0, epsilon = 1e-12);

    // PBS arms: s reflected upward, p transmitted straight, 0.5 each.
    let arms: Vec<_> = result
        .completed_paths
        .iter()
        .filter(|r| r.bounces_so_far == 2)
        .collect();
    assert_eq!(arms.len(), 2);
    let reflected = arms
        .iter()
        .find(|r| r.direction.x.abs() < 1e-9)
        .expect("reflected arm along y");
    let transmitted = arms
        .iter()
        .find(|r| r.direction.approx_eq(Vec2::new(1.0, 0.0), 1e-9))
        .expect("transmitted arm along x");
    assert_relative_eq!(reflected.intensity, 0.5, epsilon = 1e-9);
    assert_relative_eq!(transmitted.intensity, 0.5, epsilon = 1e-9);

    // Arm polarizations are orthogonal linear states.
    match (reflected.polarization, transmitted.polarization) {
        (
            Polarization::Linear { angle_rad: s },
            Polarization::Linear { angle_rad: p },
        ) => {
            assert_relative_eq!((s - p).abs(), FRAC_PI_2, epsilon = 1e-9);
        }
        other => panic!("expected linear arm states, got {other:?}"),
    }
}

/// Crossed polarizers extinguish the beam.
#[test]
fn crossed_polarizers_extinguish() {
    let mut scene = Scene::new("crossed");
    let mut laser = LaserSource::default();
    laser.polarization = Polarization::Linear { angle_rad: 0.0 };
    scene.spawn(
        ComponentKind::LaserSource(laser),
        Vec2::new(-200.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::Polarizer(Polarizer {
            transmission_axis_rad: FRAC_PI_2,
            ..Polarizer::default()
        }),
        Vec2::new(-100.0, 0.0),
        FRAC_PI_2,
    );

    let result = trace(&mut scene, VIEWPORT, Vec::new());
    // cos²(90°) = 0: the successor is born below any sane threshold.
    let extinguished = result
        .completed_paths
        .iter()
        .find(|r| r.bounces_so_far == 1)
        .expect("extinguished successor recorded for drawing");
    assert!(extinguished.intensity < 1e-12);
    assert!(extinguished.is_terminated());
}

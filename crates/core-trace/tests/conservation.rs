use core_geom::Vec2;
use core_optics::{
    BeamSplitter, ComponentKind, DielectricBlock, FanSource, LaserSource, Mirror, Screen,
};
use core_ray::TerminationReason;
use core_scene::Scene;
use core_trace::trace;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

const VIEWPORT: (f64, f64) = (2000.0, 1600.0);

/// Terminal sinks: reasons that end a photon path for good (as opposed to
/// segment boundaries whose energy continues in successors).
fn is_sink(reason: TerminationReason) -> bool {
    !matches!(
        reason,
        TerminationReason::SegmentEndAfterInteraction
            | TerminationReason::TotalInternalReflection
    )
}

fn assert_intensity_not_created(scene: &mut Scene) {
    let cfg = scene.settings.trace_config();
    let emitted: f64 = scene
        .iter()
        .flat_map(|c| c.generate_rays(&cfg))
        .map(|r| r.intensity)
        .sum();
    let result = trace(scene, VIEWPORT, Vec::new());
    let sunk: f64 = result
        .completed_paths
        .iter()
        .filter(|r| r.end_reason().map(is_sink).unwrap_or(false))
        .map(|r| r.intensity)
        .sum();
    assert!(
        sunk <= emitted + 1e-6,
        "sunk {sunk} exceeds emitted {emitted}"
    );
}

#[test]
fn splitter_and_mirror_conserve_power() {
    let mut scene = Scene::new("conservation");
    scene.spawn(
        ComponentKind::LaserSource(LaserSource::default()),
        Vec2::new(-300.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::BeamSplitter(BeamSplitter::default()),
        Vec2::new(-100.0, 0.0),
        FRAC_PI_4,
    );
    scene.spawn(
        ComponentKind::Mirror(Mirror::default()),
        Vec2::new(100.0, 0.0),
        FRAC_PI_2,
    );
    scene.spawn(
        ComponentKind::Screen(Screen::default()),
        Vec2::new(-100.0, 200.0),
        0.0,
    );
    assert_intensity_not_created(&mut scene);
}

#[test]
fn dielectric_cascade_conserves_power() {
    let mut scene = Scene::new("conservation-glass");
    scene.spawn(
        ComponentKind::FanSource(FanSource {
            ray_count: 7,
            fan_angle_deg: 30.0,
            ..FanSource::default()
        }),
        Vec2::new(-400.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::DielectricBlock(DielectricBlock::default()),
        Vec2::ZERO,
        0.3,
    );
    assert_intensity_not_created(&mut scene);
}

#[test]
fn screen_reading_matches_absorbed_power() {
    let mut scene = Scene::new("screen-power");
    scene.spawn(
        ComponentKind::LaserSource(LaserSource::default()),
        Vec2::new(-200.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::Screen(Screen::default()),
        Vec2::ZERO,
        FRAC_PI_2,
    );
    let result = trace(&mut scene, VIEWPORT, Vec::new());
    let absorbed: f64 = result
        .completed_paths
        .iter()
        .filter(|r| r.end_reason() == Some(TerminationReason::AbsorbedScreen))
        .map(|r| r.intensity)
        .sum();
    let binned: f64 = match &scene.components()[1].kind {
        ComponentKind::Screen(s) => s.bins.iter().sum(),
        _ => unreachable!(),
    };
    assert!((absorbed - binned).abs() < 1e-9);
    assert!((absorbed - 1.0).abs() < 1e-9);
}

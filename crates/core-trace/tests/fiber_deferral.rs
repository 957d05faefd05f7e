use approx::assert_relative_eq;
use core_geom::Vec2;
use core_optics::{ComponentKind, LaserSource, OpticalFiber};
use core_ray::TerminationReason;
use core_scene::Scene;
use core_trace::trace;

const VIEWPORT: (f64, f64) = (2000.0, 1600.0);

fn fiber_scene() -> Scene {
    let mut scene = Scene::new("fiber");
    scene.spawn(
        ComponentKind::LaserSource(LaserSource::default()),
        Vec2::new(-200.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::OpticalFiber(OpticalFiber {
            loss_db_per_km: 0.0,
            intrinsic_efficiency: 0.8,
            output_pos: Vec2::new(300.0, 100.0),
            output_angle_rad: 0.0,
            ..OpticalFiber::default()
        }),
        Vec2::ZERO,
        0.0,
    );
    scene
}

#[test]
fn capture_in_frame_n_output_in_frame_n_plus_one() {
    let mut scene = fiber_scene();

    // Frame N: the beam ends at the input facet; no output ray yet.
    let frame_n = trace(&mut scene, VIEWPORT, Vec::new());
    assert_eq!(frame_n.completed_paths.len(), 1);
    let captured = &frame_n.completed_paths[0];
    assert_eq!(
        captured.end_reason(),
        Some(TerminationReason::CapturedByFiber)
    );
    assert!(captured.history.last().unwrap().approx_eq(Vec2::ZERO, 1e-9));
    assert_eq!(frame_n.generated_rays_for_next_frame.len(), 1);

    // Frame N+1: the deferred ray emerges source-like from the output end.
    let deferred = frame_n.generated_rays_for_next_frame;
    let frame_n1 = trace(&mut scene, VIEWPORT, deferred);

    let output_path = frame_n1
        .completed_paths
        .iter()
        .find(|r| r.history[0].approx_eq(Vec2::new(300.0, 100.0), 1e-9))
        .expect("output segment starts at the fiber output endpoint");
    assert_relative_eq!(output_path.intensity, 0.8, epsilon = 1e-9);
    assert_eq!(output_path.bounces_so_far, 0);
    assert_eq!(
        output_path.source_id.as_deref(),
        Some(scene.components()[1].id.as_str())
    );
}

#[test]
fn captures_clear_between_frames() {
    let mut scene = fiber_scene();
    let frame_n = trace(&mut scene, VIEWPORT, Vec::new());
    assert_eq!(frame_n.generated_rays_for_next_frame.len(), 1);

    // The next frame captures again but must not double the deferred list.
    let frame_n1 = trace(&mut scene, VIEWPORT, frame_n.generated_rays_for_next_frame);
    assert_eq!(frame_n1.generated_rays_for_next_frame.len(), 1);
}

use approx::assert_relative_eq;
use core_geom::Vec2;
use core_optics::{ComponentKind, DielectricBlock, LaserSource};
use core_ray::TerminationReason;
use core_scene::Scene;
use core_trace::trace;

const VIEWPORT: (f64, f64) = (2000.0, 1600.0);

fn block_scene(laser_pos: Vec2, laser_angle_rad: f64) -> Scene {
    let mut scene = Scene::new("dielectric");
    scene.spawn(
        ComponentKind::LaserSource(LaserSource::default()),
        laser_pos,
        laser_angle_rad,
    );
    scene.spawn(
        ComponentKind::DielectricBlock(DielectricBlock {
            width: 200.0,
            height: 200.0,
            n0: 1.5,
            ..DielectricBlock::default()
        }),
        Vec2::ZERO,
        0.0,
    );
    scene
}

#[test]
fn normal_incidence_crosses_both_faces_unbent() {
    let mut scene = block_scene(Vec2::new(-150.0, 0.0), 0.0);
    let result = trace(&mut scene, VIEWPORT, Vec::new());

    // The main transmitted path leaves to the right at 0° having paid the
    // Fresnel toll twice.
    let exit = result
        .completed_paths
        .iter()
        .filter(|r| r.end_reason() == Some(TerminationReason::OutOfBounds))
        .filter(|r| r.direction.approx_eq(Vec2::new(1.0, 0.0), 1e-9))
        .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
        .expect("straight-through exit ray");
    assert_relative_eq!(exit.intensity, 0.96 * 0.96, epsilon = 1e-9);
    assert_relative_eq!(exit.medium_refractive_index, 1.0);

    // No total internal reflection anywhere on this path.
    assert!(
        result
            .completed_paths
            .iter()
            .all(|r| r.end_reason() != Some(TerminationReason::TotalInternalReflection))
    );
}

#[test]
fn oblique_entry_reflects_internally() {
    let mut scene = block_scene(Vec2::new(-150.0, 0.0), 45.0f64.to_radians());
    let result = trace(&mut scene, VIEWPORT, Vec::new());

    let tir_parent = result
        .completed_paths
        .iter()
        .find(|r| r.end_reason() == Some(TerminationReason::TotalInternalReflection))
        .expect("an interior segment must end in TIR");
    // TIR happens inside the glass.
    assert_relative_eq!(tir_parent.medium_refractive_index, 1.5, epsilon = 1e-12);

    // Its reflected continuation stays inside the medium.
    let interior_reflection = result
        .completed_paths
        .iter()
        .find(|r| {
            r.bounces_so_far == tir_parent.bounces_so_far + 1
                && r.medium_refractive_index == 1.5
        })
        .expect("reflected interior segment");
    assert!(interior_reflection.intensity > 0.0);
}

#[test]
fn snells_law_holds_at_the_entry_face() {
    let theta_i = 30.0f64.to_radians();
    let mut scene = block_scene(Vec2::new(-150.0, -30.0), theta_i);
    let result = trace(&mut scene, VIEWPORT, Vec::new());

    let inside = result
        .completed_paths
        .iter()
        .find(|r| r.medium_refractive_index == 1.5)
        .expect("a segment inside the glass");
    // Entry face normal is ±x, so sin θ inside is the y-component.
    let sin_t = inside.direction.y.abs();
    assert_relative_eq!(theta_i.sin(), 1.5 * sin_t, epsilon = 1e-8);
}

//! Queue-driven trace engine.
//!
//! One call to [`trace`] processes a single frame: source emissions plus the
//! previous frame's deferred fiber outputs go through a FIFO queue until
//! every segment terminates. FIFO order is an observable contract — when two
//! paths reach a screen in the same frame, bins update in breadth-first
//! insertion order.
//!
//! Failure policy: a component error terminates that one ray with
//! `interaction_error`; the frame always completes. A well-formed scene can
//! cap out (`stuck_in_queue`) but never panic the engine.

use std::collections::VecDeque;

use core_optics::{ArrowClass, Hit};
use core_ray::{Ray, TerminationReason};
use core_scene::Scene;
use tracing::{debug, warn};

/// Safety cap on segments processed per frame; rays still queued beyond it
/// terminate with the diagnosable `stuck_in_queue` reason.
pub const MAX_TOTAL_SEGMENTS_PER_FRAME: usize = 100_000;

/// Both splitter arms animate when each carries at least this fraction of the
/// parent intensity.
pub const BS_SPLIT_ARROW_THRESHOLD: f64 = 0.20;

/// A successor below this fraction of the parent never animates.
pub const MIN_ARROW_INTENSITY_THRESHOLD: f64 = 0.05;

/// One frame's output.
#[derive(Debug, Default)]
pub struct TraceResult {
    pub completed_paths: Vec<Ray>,
    /// Deferred fiber outputs; feed them into the next `trace` call.
    pub generated_rays_for_next_frame: Vec<Ray>,
    pub stats: TraceStats,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TraceStats {
    pub segments_processed: usize,
    pub emitted: usize,
    pub stuck: usize,
    pub interaction_errors: usize,
}

/// Trace one frame against an immutable component layout. The scene is
/// mutable only for accumulators (screen bins, detector counts, fiber
/// captures); no commands may run while a frame is in flight.
pub fn trace(scene: &mut Scene, viewport: (f64, f64), initial_active_rays: Vec<Ray>) -> TraceResult {
    let cfg = scene.settings.trace_config();
    scene.reset_accumulators();

    let mut result = TraceResult::default();
    let mut queue: VecDeque<Ray> = VecDeque::new();

    // Sources first, then prior-frame fiber outputs, in that order.
    for index in 0..scene.len() {
        let rays = scene.components()[index].generate_rays(&cfg);
        for mut ray in rays {
            result.stats.emitted += 1;
            if ray.should_terminate() {
                if ray.end_reason() == Some(TerminationReason::LowIntensity) {
                    ray.animate_arrow = false;
                }
                result.completed_paths.push(ray);
            } else {
                queue.push_back(ray);
            }
        }
    }
    result.stats.emitted += initial_active_rays.len();
    queue.extend(initial_active_rays);

    let oob_reach = 2.0 * viewport.0.max(viewport.1).max(1.0);

    while let Some(mut ray) = queue.pop_front() {
        if result.stats.segments_processed >= MAX_TOTAL_SEGMENTS_PER_FRAME {
            ray.terminate(TerminationReason::StuckInQueue);
            result.stats.stuck += 1;
            result.completed_paths.push(ray);
            continue;
        }
        result.stats.segments_processed += 1;

        if ray.should_terminate() {
            result.completed_paths.push(ray);
            continue;
        }

        let fiber_candidate = closest_fiber_candidate(scene, &ray);
        let component_candidate = closest_component_hit(scene, &ray);

        // Equal-distance tie goes to the component; only a strictly closer
        // facet couples into the fiber.
        let fiber_wins = match (&fiber_candidate, &component_candidate) {
            (Some((_, f)), Some((_, c))) => f.distance < c.distance,
            (Some(_), None) => true,
            _ => false,
        };

        if fiber_wins
            && let Some((index, hit)) = fiber_candidate
        {
            ray.add_history_point(hit.point);
            if let Some(fiber) = scene.component_mut(index) {
                fiber.handle_input_interaction(&mut ray, &hit);
            }
            result.completed_paths.push(ray);
            continue;
        }

        let Some((index, hit)) = component_candidate else {
            // Nothing ahead: draw out of the viewport and stop.
            let end = ray.origin.add(ray.direction.scale(oob_reach));
            ray.add_history_point(end);
            ray.terminate(TerminationReason::OutOfBounds);
            result.completed_paths.push(ray);
            continue;
        };

        ray.add_history_point(hit.point);
        let arrow_class = scene.components()[index].arrow_class();
        let interaction = scene
            .component_mut(index)
            .map(|component| component.interact(&mut ray, &hit))
            .unwrap_or_else(|| Ok(Vec::new()));

        match interaction {
            Ok(mut successors) => {
                arbitrate_animation(&ray, arrow_class, &mut successors);
                for mut successor in successors {
                    if successor.should_terminate() {
                        result.completed_paths.push(successor);
                    } else {
                        queue.push_back(successor);
                    }
                }
                if !ray.is_terminated() {
                    ray.terminate(TerminationReason::SegmentEndAfterInteraction);
                }
                result.completed_paths.push(ray);
            }
            Err(err) => {
                warn!(
                    target: "trace.engine",
                    error = %err,
                    component = scene.components()[index].id.as_str(),
                    "interaction failed; terminating ray"
                );
                result.stats.interaction_errors += 1;
                ray.terminate(TerminationReason::InteractionError);
                result.completed_paths.push(ray);
            }
        }
    }

    for index in 0..scene.len() {
        let outputs = scene.components()[index].generate_output_rays(&cfg);
        result.generated_rays_for_next_frame.extend(outputs);
    }

    scene.needs_retrace = false;
    debug!(
        target: "trace.engine",
        segments = result.stats.segments_processed,
        completed = result.completed_paths.len(),
        deferred = result.generated_rays_for_next_frame.len(),
        stuck = result.stats.stuck,
        errors = result.stats.interaction_errors,
        "frame traced"
    );
    result
}

/// Closest fiber input-facet candidate, if any.
fn closest_fiber_candidate(scene: &Scene, ray: &Ray) -> Option<(usize, Hit)> {
    let mut best: Option<(usize, Hit)> = None;
    for (index, component) in scene.iter().enumerate() {
        if !component.is_fiber() {
            continue;
        }
        if let Some(hit) = component.check_input_coupling(ray.origin, ray.direction)
            && best.as_ref().is_none_or(|(_, b)| hit.distance < b.distance)
        {
            best = Some((index, hit));
        }
    }
    best
}

/// Closest non-fiber hit; ties in distance go to the earlier component in
/// scene order, and a bounce-0 ray never hits its own source.
fn closest_component_hit(scene: &Scene, ray: &Ray) -> Option<(usize, Hit)> {
    let mut best: Option<(usize, Hit)> = None;
    for (index, component) in scene.iter().enumerate() {
        if component.is_fiber() {
            continue;
        }
        if ray.bounces_so_far == 0
            && component.is_source()
            && ray.source_id.as_deref() == Some(component.id.as_str())
        {
            continue;
        }
        for hit in component.intersect(ray.origin, ray.direction) {
            if best.as_ref().is_none_or(|(_, b)| hit.distance < b.distance) {
                best = Some((index, hit));
            }
        }
    }
    best
}

/// Pick which successors carry the animation arrow. Rendering hint only,
/// never physics.
fn arbitrate_animation(parent: &Ray, class: ArrowClass, successors: &mut [Ray]) {
    if !parent.animate_arrow || successors.is_empty() {
        return;
    }
    let brightest = successors
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.intensity.total_cmp(&b.intensity))
        .map(|(i, _)| i)
        .unwrap_or(0);

    match class {
        ArrowClass::BeamSplitter if successors.len() == 2 => {
            let threshold = BS_SPLIT_ARROW_THRESHOLD * parent.intensity;
            if successors[0].intensity >= threshold && successors[1].intensity >= threshold {
                successors[0].animate_arrow = true;
                successors[1].animate_arrow = true;
            } else {
                successors[brightest].animate_arrow = true;
            }
        }
        ArrowClass::Dielectric => {
            if parent.end_reason() == Some(TerminationReason::TotalInternalReflection) {
                successors[0].animate_arrow = true;
            } else if successors.len() == 2 {
                // Dielectric interactions emit the transmitted branch first.
                let threshold = MIN_ARROW_INTENSITY_THRESHOLD * parent.intensity;
                let (transmitted, reflected) =
                    (successors[0].intensity, successors[1].intensity);
                if transmitted >= 0.8 * reflected
                    && transmitted >= threshold
                    && reflected >= threshold
                {
                    successors[0].animate_arrow = true;
                } else {
                    successors[brightest].animate_arrow = true;
                }
            } else {
                successors[brightest].animate_arrow = true;
            }
        }
        _ => {
            let threshold = MIN_ARROW_INTENSITY_THRESHOLD * parent.intensity;
            if successors[brightest].intensity >= threshold {
                successors[brightest].animate_arrow = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_geom::Vec2;
    use core_optics::{Component, ComponentKind, LaserSource, Mirror, OpticalFiber, Screen};
    use core_ray::{RaySpec, TraceConfig};
    use std::f64::consts::FRAC_PI_2;

    const VIEWPORT: (f64, f64) = (1000.0, 800.0);

    fn scene_with_laser() -> Scene {
        let mut scene = Scene::new("test");
        scene.spawn(
            ComponentKind::LaserSource(LaserSource::default()),
            Vec2::new(-100.0, 0.0),
            0.0,
        );
        scene
    }

    #[test]
    fn lone_laser_goes_out_of_bounds() {
        let mut scene = scene_with_laser();
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        assert_eq!(result.completed_paths.len(), 1);
        let ray = &result.completed_paths[0];
        assert_eq!(ray.end_reason(), Some(TerminationReason::OutOfBounds));
        assert_eq!(ray.history.len(), 2);
        assert!(result.generated_rays_for_next_frame.is_empty());
    }

    #[test]
    fn every_completed_path_has_a_reason() {
        let mut scene = scene_with_laser();
        scene.spawn(
            ComponentKind::Mirror(Mirror {
                length: 200.0,
                coated: false,
            }),
            Vec2::ZERO,
            FRAC_PI_2,
        );
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        assert!(!result.completed_paths.is_empty());
        for ray in &result.completed_paths {
            assert!(ray.is_terminated());
            assert!(ray.end_reason().is_some());
        }
    }

    #[test]
    fn disabled_source_emits_nothing() {
        let mut scene = scene_with_laser();
        let id = scene.components()[0].id.clone();
        scene.get_mut_by_id(&id).unwrap().enabled = false;
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        assert!(result.completed_paths.is_empty());
    }

    #[test]
    fn bounce_zero_ray_skips_its_own_source() {
        // The emitted ray starts on its own housing; it must leave the scene
        // instead of being blocked at distance zero.
        let mut scene = scene_with_laser();
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        assert_eq!(
            result.completed_paths[0].end_reason(),
            Some(TerminationReason::OutOfBounds)
        );
    }

    #[test]
    fn equal_distance_tie_prefers_component_over_fiber() {
        let mut scene = scene_with_laser();
        // Screen and fiber facet both at x = 0.
        scene.spawn(
            ComponentKind::Screen(Screen::default()),
            Vec2::ZERO,
            FRAC_PI_2,
        );
        scene.spawn(
            ComponentKind::OpticalFiber(OpticalFiber::default()),
            Vec2::ZERO,
            0.0,
        );
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        assert_eq!(result.completed_paths.len(), 1);
        assert_eq!(
            result.completed_paths[0].end_reason(),
            Some(TerminationReason::AbsorbedScreen)
        );
        assert!(result.generated_rays_for_next_frame.is_empty());
    }

    #[test]
    fn strictly_closer_fiber_captures() {
        let mut scene = scene_with_laser();
        scene.spawn(
            ComponentKind::Screen(Screen::default()),
            Vec2::new(50.0, 0.0),
            FRAC_PI_2,
        );
        scene.spawn(
            ComponentKind::OpticalFiber(OpticalFiber {
                loss_db_per_km: 0.0,
                ..OpticalFiber::default()
            }),
            Vec2::ZERO,
            0.0,
        );
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        assert_eq!(
            result.completed_paths[0].end_reason(),
            Some(TerminationReason::CapturedByFiber)
        );
        assert_eq!(result.generated_rays_for_next_frame.len(), 1);
    }

    #[test]
    fn fifo_processing_is_breadth_first() {
        // Two sources; segments complete in emission order before any
        // second-generation segment.
        let mut scene = scene_with_laser();
        scene.spawn(
            ComponentKind::LaserSource(LaserSource::default()),
            Vec2::new(-100.0, 50.0),
            0.0,
        );
        scene.spawn(
            ComponentKind::Mirror(Mirror {
                length: 400.0,
                coated: false,
            }),
            Vec2::ZERO,
            FRAC_PI_2,
        );
        let result = trace(&mut scene, VIEWPORT, Vec::new());
        let first_two: Vec<_> = result.completed_paths[..2]
            .iter()
            .map(|r| r.source_id.clone().unwrap())
            .collect();
        assert_ne!(first_two[0], first_two[1], "both first-generation segments complete first");
    }

    #[test]
    fn arbitration_defaults_to_brightest_successor() {
        let cfg = TraceConfig::default();
        let mut parent = Ray::new(
            RaySpec::emitted(Vec2::ZERO, Vec2::new(1.0, 0.0), 550.0, 1.0, "s"),
            &cfg,
        )
        .unwrap();
        parent.animate_arrow = true;
        let mut successors = vec![
            parent.successor(Vec2::ZERO, Vec2::new(1.0, 0.0)),
            parent.successor(Vec2::ZERO, Vec2::new(0.0, 1.0)),
        ];
        successors[0].intensity = 0.3;
        successors[1].intensity = 0.6;
        arbitrate_animation(&parent, ArrowClass::Default, &mut successors);
        assert!(!successors[0].animate_arrow);
        assert!(successors[1].animate_arrow);
    }

    #[test]
    fn arbitration_skips_dim_successors() {
        let cfg = TraceConfig::default();
        let mut parent = Ray::new(
            RaySpec::emitted(Vec2::ZERO, Vec2::new(1.0, 0.0), 550.0, 1.0, "s"),
            &cfg,
        )
        .unwrap();
        parent.animate_arrow = true;
        let mut successors = vec![parent.successor(Vec2::ZERO, Vec2::new(1.0, 0.0))];
        successors[0].intensity = 0.01; // below 5% of parent
        arbitrate_animation(&parent, ArrowClass::Default, &mut successors);
        assert!(!successors[0].animate_arrow);
    }

    #[test]
    fn arbitration_animates_both_balanced_splitter_arms() {
        let cfg = TraceConfig::default();
        let mut parent = Ray::new(
            RaySpec::emitted(Vec2::ZERO, Vec2::new(1.0, 0.0), 550.0, 1.0, "s"),
            &cfg,
        )
        .unwrap();
        parent.animate_arrow = true;
        let mut successors = vec![
            parent.successor(Vec2::ZERO, Vec2::new(0.0, 1.0)),
            parent.successor(Vec2::ZERO, Vec2::new(1.0, 0.0)),
        ];
        successors[0].intensity = 0.5;
        successors[1].intensity = 0.5;
        arbitrate_animation(&parent, ArrowClass::BeamSplitter, &mut successors);
        assert!(successors[0].animate_arrow && successors[1].animate_arrow);

        // Lopsided split animates only the bright arm.
        successors[0].intensity = 0.95;
        successors[1].intensity = 0.05;
        successors[0].animate_arrow = false;
        successors[1].animate_arrow = false;
        arbitrate_animation(&parent, ArrowClass::BeamSplitter, &mut successors);
        assert!(successors[0].animate_arrow);
        assert!(!successors[1].animate_arrow);
    }

    #[test]
    fn unanimated_parent_never_animates_successors() {
        let cfg = TraceConfig::default();
        let parent = Ray::new(
            RaySpec::emitted(Vec2::ZERO, Vec2::new(1.0, 0.0), 550.0, 1.0, "s"),
            &cfg,
        )
        .unwrap();
        let mut successors = vec![parent.successor(Vec2::ZERO, Vec2::new(1.0, 0.0))];
        arbitrate_animation(&parent, ArrowClass::Default, &mut successors);
        assert!(!successors[0].animate_arrow);
    }

    #[test]
    fn retrace_flag_clears_after_frame() {
        let mut scene = scene_with_laser();
        assert!(scene.needs_retrace);
        trace(&mut scene, VIEWPORT, Vec::new());
        assert!(!scene.needs_retrace);
    }
}

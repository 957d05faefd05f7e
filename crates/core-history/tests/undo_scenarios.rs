use core_geom::Vec2;
use core_history::{Command, History};
use core_optics::{ComponentKind, LaserSource, Mirror, ThinLens};
use core_scene::{Scene, are_equivalent};

fn populated_scene() -> Scene {
    let mut scene = Scene::new("bench");
    scene.spawn(
        ComponentKind::LaserSource(LaserSource::default()),
        Vec2::new(-200.0, 0.0),
        0.0,
    );
    scene.spawn(
        ComponentKind::ThinLens(ThinLens::default()),
        Vec2::ZERO,
        std::f64::consts::FRAC_PI_2,
    );
    scene.spawn(
        ComponentKind::Mirror(Mirror::default()),
        Vec2::new(150.0, 0.0),
        std::f64::consts::FRAC_PI_2,
    );
    scene
}

#[test]
fn undo_restores_equivalent_scene() {
    let mut scene = populated_scene();
    let before = scene.clone();
    let mut history = History::new();

    let lens_id = scene.components()[1].id.clone();
    history
        .add(
            Command::move_to(&lens_id, Vec2::ZERO, Vec2::new(30.0, -12.0)),
            &mut scene,
        )
        .unwrap();
    assert!(!are_equivalent(&before, &scene));

    assert!(history.undo(&mut scene));
    assert!(are_equivalent(&before, &scene));
}

#[test]
fn redo_reproduces_post_execute_state() {
    let mut scene = populated_scene();
    let mut history = History::new();
    let mirror_id = scene.components()[2].id.clone();

    history
        .add(
            Command::rotate(&mirror_id, std::f64::consts::FRAC_PI_2, 0.3),
            &mut scene,
        )
        .unwrap();
    let after = scene.clone();

    assert!(history.undo(&mut scene));
    assert!(!are_equivalent(&after, &scene));
    assert!(history.redo(&mut scene));
    assert!(are_equivalent(&after, &scene));
}

#[test]
fn composite_delete_of_selection_is_one_slot() {
    let mut scene = populated_scene();
    let before = scene.clone();
    let ids: Vec<String> = scene.iter().map(|c| c.id.clone()).collect();
    scene.set_selection(&ids[1..]);

    let mut history = History::new();
    history
        .add(Command::delete_selection(&scene), &mut scene)
        .unwrap();
    assert_eq!(scene.len(), 1);
    assert_eq!(history.undo_depth(), 1);

    assert!(history.undo(&mut scene));
    assert_eq!(scene.len(), 3);
    assert!(are_equivalent(&before, &scene));
    let order: Vec<String> = scene.iter().map(|c| c.id.clone()).collect();
    assert_eq!(order, ids);
    assert_eq!(history.undo_depth(), 0);
}

#[test]
fn clear_all_round_trips() {
    let mut scene = populated_scene();
    let before = scene.clone();
    let mut history = History::new();

    history.add(Command::clear_all(), &mut scene).unwrap();
    assert!(scene.is_empty());

    assert!(history.undo(&mut scene));
    assert!(are_equivalent(&before, &scene));

    assert!(history.redo(&mut scene));
    assert!(scene.is_empty());
}

#[test]
fn selection_commands_round_trip() {
    let mut scene = populated_scene();
    let ids: Vec<String> = scene.iter().map(|c| c.id.clone()).collect();
    let mut history = History::new();

    history
        .add(
            Command::select(Vec::new(), vec![ids[0].clone(), ids[2].clone()]),
            &mut scene,
        )
        .unwrap();
    assert_eq!(scene.selected_ids(), vec![ids[0].clone(), ids[2].clone()]);

    history.undo(&mut scene);
    assert!(scene.selected_ids().is_empty());
}

#[test]
fn interleaved_add_delete_undo_chain() {
    let mut scene = Scene::new("chain");
    let mut history = History::new();

    let laser_id = scene.spawn(
        ComponentKind::LaserSource(LaserSource::default()),
        Vec2::ZERO,
        0.0,
    );
    let mirror = core_optics::Component::new(
        "mirror-manual",
        Vec2::new(100.0, 0.0),
        0.0,
        ComponentKind::Mirror(Mirror::default()),
    );
    history.add(Command::add(mirror), &mut scene).unwrap();
    assert_eq!(scene.len(), 2);

    history.add(Command::delete(&laser_id), &mut scene).unwrap();
    assert_eq!(scene.len(), 1);

    assert!(history.undo(&mut scene)); // restore laser at index 0
    assert_eq!(scene.components()[0].id, laser_id);
    assert!(history.undo(&mut scene)); // remove the added mirror
    assert_eq!(scene.len(), 1);
    assert!(history.redo(&mut scene)); // re-add mirror at the end
    assert_eq!(scene.components()[1].id, "mirror-manual");
}

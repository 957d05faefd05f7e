//! Canonical scene JSON and version migration.
//!
//! The on-disk format is pretty-printed with two-space indent and a stable
//! key order per section (`version`, `name`, `components`, `settings`,
//! `metadata`). Each component entry carries the canonical `type`/`id`/
//! `x`/`y`/`angle` keys, a flat `properties` view for tooling, and a `_raw`
//! payload holding the component's full serialized state. Infinities encode
//! as JSON `null`; NaN never leaves the core.
//!
//! Older files migrate on read: 1.0 gains defaulted `settings` and
//! `metadata`; 1.1 moves `position {x,y}` / `rotation` to flat
//! `x`/`y`/`angle` and synthesizes `name`. Unknown component types are
//! skipped with a structured warning in the return value, never silently.

use core_geom::Vec2;
use core_optics::{Component, ComponentKind, PropValue};
use core_scene::{Scene, SceneSettings};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::{debug, warn};

pub const CURRENT_VERSION: &str = "2.0.0";

#[derive(Debug, Error)]
pub enum SceneFileError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("scene file root must be an object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("unsupported scene file version `{0}`")]
    UnsupportedVersion(String),
    #[error("`components` must be an array")]
    ComponentsNotArray,
    #[error("component {index} is missing `type`")]
    ComponentMissingType { index: usize },
}

/// Non-fatal findings surfaced to the caller alongside the scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneFileWarning {
    UnknownComponentType { index: usize, type_name: String },
    DuplicateComponentId { index: usize, id: String },
    MalformedComponent { index: usize, detail: String },
    PropertyRejected { id: String, name: String },
}

/// Serialize a scene into the canonical pretty JSON document.
pub fn serialize(scene: &Scene) -> Result<String, SceneFileError> {
    let mut root = Map::new();
    root.insert("version".into(), json!(CURRENT_VERSION));
    root.insert("name".into(), json!(scene.name));

    let mut components = Vec::with_capacity(scene.len());
    for component in scene.iter() {
        let mut entry = Map::new();
        entry.insert("type".into(), json!(component.type_name()));
        entry.insert("id".into(), json!(component.id));
        entry.insert("x".into(), json!(component.pos.x));
        entry.insert("y".into(), json!(component.pos.y));
        entry.insert("angle".into(), json!(component.angle_rad));

        let mut properties = Map::new();
        for (name, descriptor) in component.get_properties().iter() {
            properties.insert(name.to_string(), prop_value_to_json(&descriptor.value));
        }
        entry.insert("properties".into(), Value::Object(properties));
        entry.insert("_raw".into(), serde_json::to_value(component)?);
        components.push(Value::Object(entry));
    }
    root.insert("components".into(), Value::Array(components));
    root.insert("settings".into(), serde_json::to_value(&scene.settings)?);
    root.insert("metadata".into(), Value::Object(scene.metadata.clone()));

    Ok(serde_json::to_string_pretty(&Value::Object(root))?)
}

/// Parse, migrate, and reconstruct a scene. Structural problems error;
/// per-component problems degrade to warnings.
pub fn deserialize(input: &str) -> Result<(Scene, Vec<SceneFileWarning>), SceneFileError> {
    let value: Value = serde_json::from_str(input)?;
    let root = value.as_object().ok_or(SceneFileError::NotAnObject)?;
    let version = root
        .get("version")
        .and_then(Value::as_str)
        .ok_or(SceneFileError::MissingField("version"))?
        .to_string();

    let migrated = migrate_to_current(value, &version)?;
    let root = migrated.as_object().ok_or(SceneFileError::NotAnObject)?;

    let name = root
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("untitled")
        .to_string();
    let components_value = root
        .get("components")
        .ok_or(SceneFileError::MissingField("components"))?
        .as_array()
        .ok_or(SceneFileError::ComponentsNotArray)?;

    let mut scene = Scene::new(name);
    if let Some(settings) = root.get("settings") {
        scene.settings = serde_json::from_value::<SceneSettings>(settings.clone())
            .unwrap_or_else(|err| {
                warn!(target: "serialize", error = %err, "settings malformed; using defaults");
                SceneSettings::default()
            });
    }
    if let Some(Value::Object(metadata)) = root.get("metadata") {
        scene.metadata = metadata.clone();
    }

    let mut warnings = Vec::new();
    for (index, entry) in components_value.iter().enumerate() {
        let Some(object) = entry.as_object() else {
            warnings.push(SceneFileWarning::MalformedComponent {
                index,
                detail: "component entry is not an object".into(),
            });
            continue;
        };
        let type_name = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(SceneFileError::ComponentMissingType { index })?;

        let Some(mut component) = reconstruct_component(object, type_name, index, &mut warnings)
        else {
            continue;
        };

        if scene.get_by_id(&component.id).is_some() {
            warnings.push(SceneFileWarning::DuplicateComponentId {
                index,
                id: component.id.clone(),
            });
            continue;
        }

        // Canonical keys are authoritative over whatever `_raw` carried.
        if let Some(x) = object.get("x").and_then(Value::as_f64) {
            component.pos.x = x;
        }
        if let Some(y) = object.get("y").and_then(Value::as_f64) {
            component.pos.y = y;
        }
        if let Some(angle) = object.get("angle").and_then(Value::as_f64) {
            component.angle_rad = angle;
        }
        if let Some(id) = object.get("id").and_then(Value::as_str) {
            component.id = id.to_string();
        }
        scene.add(component);
    }

    debug!(
        target: "serialize",
        components = scene.len(),
        warnings = warnings.len(),
        from_version = version.as_str(),
        "scene deserialized"
    );
    Ok((scene, warnings))
}

/// Rebuild a component from `_raw` when possible, else from defaults plus
/// the flat `properties` map. `None` skips the entry (warning recorded).
fn reconstruct_component(
    object: &Map<String, Value>,
    type_name: &str,
    index: usize,
    warnings: &mut Vec<SceneFileWarning>,
) -> Option<Component> {
    if let Some(raw) = object.get("_raw")
        && let Ok(component) = serde_json::from_value::<Component>(raw.clone())
    {
        return Some(component);
    }

    let Some(kind) = ComponentKind::from_type_name(type_name) else {
        warn!(target: "serialize", type_name, index, "unknown component type skipped");
        warnings.push(SceneFileWarning::UnknownComponentType {
            index,
            type_name: type_name.to_string(),
        });
        return None;
    };

    let id = object
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or("component")
        .to_string();
    let mut component = Component::new(id, Vec2::ZERO, 0.0, kind);
    if let Some(Value::Object(properties)) = object.get("properties") {
        for (name, value) in properties {
            let Some(prop) = json_to_prop_value(value) else {
                continue;
            };
            if component.set_property(name, &prop).is_err() {
                warnings.push(SceneFileWarning::PropertyRejected {
                    id: component.id.clone(),
                    name: name.clone(),
                });
            }
        }
    }
    Some(component)
}

/// Stepwise version migration; each hop is pure and idempotent on its own
/// output.
fn migrate_to_current(mut value: Value, version: &str) -> Result<Value, SceneFileError> {
    let mut version = version.to_string();
    loop {
        version = match version.as_str() {
            "1.0" => {
                value = migrate_1_0_to_1_1(value);
                "1.1".to_string()
            }
            "1.1" => {
                value = migrate_1_1_to_2_0(value);
                CURRENT_VERSION.to_string()
            }
            CURRENT_VERSION => return Ok(value),
            other => return Err(SceneFileError::UnsupportedVersion(other.to_string())),
        };
    }
}

/// 1.0 → 1.1: defaulted `settings` and `metadata` blocks appear.
fn migrate_1_0_to_1_1(mut value: Value) -> Value {
    if let Some(root) = value.as_object_mut() {
        root.insert("version".into(), json!("1.1"));
        if !root.contains_key("settings") {
            let settings = serde_json::to_value(SceneSettings::default())
                .unwrap_or_else(|_| Value::Object(Map::new()));
            root.insert("settings".into(), settings);
        }
        root.entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
    }
    value
}

/// 1.1 → 2.0.0: flatten `position {x,y}` / `rotation` into `x`/`y`/`angle`
/// and synthesize a `name`.
fn migrate_1_1_to_2_0(mut value: Value) -> Value {
    if let Some(root) = value.as_object_mut() {
        root.insert("version".into(), json!(CURRENT_VERSION));
        if !root.contains_key("name") {
            root.insert("name".into(), json!("untitled"));
        }
        if let Some(Value::Array(components)) = root.get_mut("components") {
            for entry in components {
                let Some(object) = entry.as_object_mut() else {
                    continue;
                };
                if let Some(position) = object.remove("position") {
                    if let Some(x) = position.get("x").cloned() {
                        object.entry("x").or_insert(x);
                    }
                    if let Some(y) = position.get("y").cloned() {
                        object.entry("y").or_insert(y);
                    }
                }
                if let Some(rotation) = object.remove("rotation") {
                    object.entry("angle").or_insert(rotation);
                }
            }
        }
    }
    value
}

fn prop_value_to_json(value: &PropValue) -> Value {
    match value {
        // json! maps non-finite numbers to null, matching the file contract.
        PropValue::Number(n) => json!(n),
        PropValue::Bool(b) => json!(b),
        PropValue::Text(t) => json!(t),
    }
}

fn json_to_prop_value(value: &Value) -> Option<PropValue> {
    match value {
        Value::Number(n) => n.as_f64().map(PropValue::Number),
        Value::Bool(b) => Some(PropValue::Bool(*b)),
        Value::String(s) => Some(PropValue::Text(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_optics::{LaserSource, Mirror, ThinLens};
    use core_scene::are_equivalent;
    use std::f64::consts::FRAC_PI_2;

    fn sample_scene() -> Scene {
        let mut scene = Scene::new("bench");
        scene.spawn(
            ComponentKind::LaserSource(LaserSource::default()),
            Vec2::new(-200.0, 10.0),
            0.25,
        );
        scene.spawn(
            ComponentKind::Mirror(Mirror {
                length: 140.0,
                coated: true,
            }),
            Vec2::new(0.0, -30.0),
            FRAC_PI_2,
        );
        scene
    }

    #[test]
    fn canonical_key_order_is_stable() {
        let json = serialize(&sample_scene()).unwrap();
        let version_at = json.find("\"version\"").unwrap();
        let name_at = json.find("\"name\"").unwrap();
        let components_at = json.find("\"components\"").unwrap();
        let settings_at = json.find("\"settings\"").unwrap();
        let metadata_at = json.find("\"metadata\"").unwrap();
        assert!(version_at < name_at);
        assert!(name_at < components_at);
        assert!(components_at < settings_at);
        assert!(settings_at < metadata_at);
    }

    #[test]
    fn round_trip_is_equivalent() {
        let scene = sample_scene();
        let json = serialize(&scene).unwrap();
        let (back, warnings) = deserialize(&json).unwrap();
        assert!(warnings.is_empty());
        assert!(are_equivalent(&scene, &back));
        assert_eq!(back.name, "bench");
    }

    #[test]
    fn round_trip_preserves_component_parameters() {
        let mut scene = Scene::new("params");
        scene.spawn(
            ComponentKind::ThinLens(ThinLens {
                focal_length: -75.0,
                aperture: 120.0,
                coated: true,
                chromatic_coeff: 0.02,
                spherical_coeff: 0.0,
            }),
            Vec2::ZERO,
            FRAC_PI_2,
        );
        let json = serialize(&scene).unwrap();
        let (back, _) = deserialize(&json).unwrap();
        match &back.components()[0].kind {
            ComponentKind::ThinLens(lens) => {
                assert_eq!(lens.focal_length, -75.0);
                assert_eq!(lens.aperture, 120.0);
                assert!(lens.coated);
                assert_eq!(lens.chromatic_coeff, 0.02);
            }
            other => panic!("expected thin lens, got {other:?}"),
        }
    }

    #[test]
    fn infinite_focal_length_round_trips_as_null() {
        let mut scene = Scene::new("inf");
        scene.spawn(
            ComponentKind::ThinLens(ThinLens {
                focal_length: f64::INFINITY,
                ..ThinLens::default()
            }),
            Vec2::ZERO,
            FRAC_PI_2,
        );
        let json = serialize(&scene).unwrap();
        assert!(json.contains("\"focalLength\": null"));
        let (back, _) = deserialize(&json).unwrap();
        match &back.components()[0].kind {
            ComponentKind::ThinLens(lens) => assert!(lens.focal_length.is_infinite()),
            other => panic!("expected thin lens, got {other:?}"),
        }
    }

    #[test]
    fn serialization_is_idempotent_byte_for_byte() {
        let json = serialize(&sample_scene()).unwrap();
        let (once, _) = deserialize(&json).unwrap();
        let json_once = serialize(&once).unwrap();
        let (twice, _) = deserialize(&json_once).unwrap();
        let json_twice = serialize(&twice).unwrap();
        assert_eq!(json_once, json_twice);
    }

    #[test]
    fn unknown_component_type_is_skipped_with_warning() {
        let json = r#"{
            "version": "2.0.0",
            "name": "mystery",
            "components": [
                { "type": "FluxCapacitor", "id": "fc-1", "x": 0, "y": 0, "angle": 0 },
                { "type": "Mirror", "id": "mirror-1", "x": 5, "y": 6, "angle": 0.5 }
            ],
            "settings": {},
            "metadata": {}
        }"#;
        let (scene, warnings) = deserialize(json).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(
            warnings,
            vec![SceneFileWarning::UnknownComponentType {
                index: 0,
                type_name: "FluxCapacitor".to_string(),
            }]
        );
    }

    #[test]
    fn missing_version_is_an_error() {
        let err = deserialize(r#"{ "name": "x", "components": [] }"#).unwrap_err();
        assert!(matches!(err, SceneFileError::MissingField("version")));
    }

    #[test]
    fn unsupported_version_is_an_error() {
        let err = deserialize(r#"{ "version": "9.7", "components": [] }"#).unwrap_err();
        assert!(matches!(err, SceneFileError::UnsupportedVersion(v) if v == "9.7"));
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            deserialize("{ not json"),
            Err(SceneFileError::Json(_))
        ));
    }

    #[test]
    fn migrates_1_0_files() {
        let json = r#"{
            "version": "1.0",
            "components": [
                { "type": "Mirror", "id": "m1", "position": { "x": 12.0, "y": -3.0 }, "rotation": 1.25 }
            ]
        }"#;
        let (scene, warnings) = deserialize(json).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(scene.name, "untitled");
        assert_eq!(scene.len(), 1);
        let mirror = &scene.components()[0];
        assert_eq!(mirror.pos, Vec2::new(12.0, -3.0));
        assert_eq!(mirror.angle_rad, 1.25);
        assert_eq!(scene.settings, SceneSettings::default());
    }

    #[test]
    fn migrating_twice_equals_migrating_once() {
        let json = r#"{
            "version": "1.0",
            "components": [
                { "type": "Mirror", "id": "m1", "position": { "x": 1.0, "y": 2.0 }, "rotation": 0.1 }
            ]
        }"#;
        let (once, _) = deserialize(json).unwrap();
        let reserialized = serialize(&once).unwrap();
        let (twice, _) = deserialize(&reserialized).unwrap();
        assert_eq!(serialize(&twice).unwrap(), reserialized);
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let json = r#"{
            "version": "2.0.0",
            "name": "dup",
            "components": [
                { "type": "Mirror", "id": "m-1", "x": 0, "y": 0, "angle": 0 },
                { "type": "Mirror", "id": "m-1", "x": 9, "y": 9, "angle": 0 }
            ],
            "settings": {},
            "metadata": {}
        }"#;
        let (scene, warnings) = deserialize(json).unwrap();
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.components()[0].pos, Vec2::ZERO);
        assert!(matches!(
            warnings[0],
            SceneFileWarning::DuplicateComponentId { index: 1, .. }
        ));
    }

    #[test]
    fn properties_fallback_reconstructs_without_raw() {
        let json = r#"{
            "version": "2.0.0",
            "name": "no-raw",
            "components": [
                { "type": "Mirror", "id": "m-1", "x": 3, "y": 4, "angle": 0.7,
                  "properties": { "length": 220.0, "coated": true } }
            ],
            "settings": {},
            "metadata": {}
        }"#;
        let (scene, warnings) = deserialize(json).unwrap();
        assert!(warnings.is_empty());
        match &scene.components()[0].kind {
            ComponentKind::Mirror(m) => {
                assert_eq!(m.length, 220.0);
                assert!(m.coated);
            }
            other => panic!("expected mirror, got {other:?}"),
        }
        assert_eq!(scene.components()[0].pos, Vec2::new(3.0, 4.0));
    }
}

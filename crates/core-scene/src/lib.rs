//! Scene container: the ordered component list the editor mutates and the
//! trace engine reads.
//!
//! Draw order equals insertion order, ids are unique within a scene, and
//! every mutation flips `needs_retrace` so the consumer knows the cached
//! trace is stale. Commands (core-history) are the only writers in the
//! editor; the trace engine only touches accumulators and fiber captures.

use core_geom::Vec2;
use core_optics::{Component, ComponentKind};
use core_ray::TraceConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Scene-wide settings persisted with the scene file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceMode {
    RayTrace,
    LensImaging,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneSettings {
    pub mode: TraceMode,
    pub max_rays: u32,
    pub max_bounces: u32,
    pub min_intensity: f64,
    pub show_grid: bool,
    pub show_arrows: bool,
    pub arrow_speed: f64,
    pub fast_white_light_mode: bool,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            mode: TraceMode::RayTrace,
            max_rays: 50,
            max_bounces: 64,
            min_intensity: 1e-3,
            show_grid: false,
            show_arrows: true,
            arrow_speed: 1.0,
            fast_white_light_mode: false,
        }
    }
}

impl SceneSettings {
    /// The explicit config handed to the trace engine and copied into rays.
    pub fn trace_config(&self) -> TraceConfig {
        TraceConfig {
            max_rays_per_source: self.max_rays,
            max_bounces: self.max_bounces,
            min_intensity: self.min_intensity,
            fast_white_light: self.fast_white_light_mode,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub name: String,
    components: Vec<Component>,
    pub settings: SceneSettings,
    /// Opaque metadata block carried through (de)serialization; the core
    /// never interprets it beyond passing it along.
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub needs_retrace: bool,
    next_id: u64,
}

impl Scene {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Allocate a unique id with the component-kind stem (`mirror-3`).
    pub fn alloc_id(&mut self, kind_key: &str) -> String {
        loop {
            self.next_id += 1;
            let candidate = format!("{kind_key}-{}", self.next_id);
            if self.get_by_id(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// Construct and add a component in one step, allocating its id.
    pub fn spawn(&mut self, kind: ComponentKind, pos: Vec2, angle_rad: f64) -> String {
        let id = self.alloc_id(kind.key());
        self.add(Component::new(id.clone(), pos, angle_rad, kind));
        id
    }

    pub fn add(&mut self, component: Component) {
        debug!(
            target: "scene",
            id = component.id.as_str(),
            kind = component.type_name(),
            index = self.components.len(),
            "component added"
        );
        self.components.push(component);
        self.needs_retrace = true;
    }

    /// Remove by id, returning the component and its prior index (the delete
    /// command needs both to undo).
    pub fn remove_by_id(&mut self, id: &str) -> Option<(Component, usize)> {
        let index = self.components.iter().position(|c| c.id == id)?;
        let component = self.components.remove(index);
        debug!(target: "scene", id, index, "component removed");
        self.needs_retrace = true;
        Some((component, index))
    }

    /// Re-insert at a prior index (clamped to the current length).
    pub fn insert_at(&mut self, component: Component, index: usize) {
        let index = index.min(self.components.len());
        debug!(
            target: "scene",
            id = component.id.as_str(),
            index,
            "component inserted"
        );
        self.components.insert(index, component);
        self.needs_retrace = true;
    }

    /// Drop every component, returning the previous list.
    pub fn clear(&mut self) -> Vec<Component> {
        debug!(target: "scene", count = self.components.len(), "scene cleared");
        self.needs_retrace = true;
        std::mem::take(&mut self.components)
    }

    /// Restore a component list wholesale (ClearAll undo).
    pub fn restore(&mut self, components: Vec<Component>) {
        self.components = components;
        self.needs_retrace = true;
    }

    /// Clear per-component accumulators ahead of a trace frame.
    pub fn reset_accumulators(&mut self) {
        for component in &mut self.components {
            component.reset_accumulators();
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.iter()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component_mut(&mut self, index: usize) -> Option<&mut Component> {
        self.components.get_mut(index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn get_mut_by_id(&mut self, id: &str) -> Option<&mut Component> {
        self.needs_retrace = true;
        self.components.iter_mut().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn selected_ids(&self) -> Vec<String> {
        self.components
            .iter()
            .filter(|c| c.selected)
            .map(|c| c.id.clone())
            .collect()
    }

    /// Replace the selection set; ids not present are ignored.
    pub fn set_selection(&mut self, ids: &[String]) {
        for component in &mut self.components {
            component.selected = ids.iter().any(|id| *id == component.id);
        }
    }
}

/// Structural equivalence used by round-trip and undo tests: same component
/// count, per-index matching type, position and angle within 1e-3, and the
/// same trace mode. Timestamps and accumulators are ignored.
pub fn are_equivalent(a: &Scene, b: &Scene) -> bool {
    const TOLERANCE: f64 = 1e-3;
    if a.len() != b.len() || a.settings.mode != b.settings.mode {
        return false;
    }
    a.iter().zip(b.iter()).all(|(ca, cb)| {
        ca.type_name() == cb.type_name()
            && ca.pos.approx_eq(cb.pos, TOLERANCE)
            && (ca.angle_rad - cb.angle_rad).abs() <= TOLERANCE
    })
}

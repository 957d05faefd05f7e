//! Undo/redo command history.
//!
//! Every scene mutation flows through a [`Command`] so it can be reversed
//! deterministically. The history keeps two bounded stacks; adding a command
//! executes it, pushes it onto the undo stack, and clears the redo stack.
//! Continuous gestures (slider drags, handle rotations) coalesce through
//! [`PropertyDrag`]: live previews mutate the scene directly and a single
//! command spanning start value → committed value lands in history.

use core_geom::Vec2;
use core_optics::{Component, PropValue, PropertyError};
use core_scene::Scene;
use thiserror::Error;
use tracing::{trace, warn};

/// Maximum number of commands retained in undo history.
pub const HISTORY_MAX: usize = 200;

/// Values closer than this coalesce into "no change".
pub const VALUE_EPSILON: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no component with id `{id}`")]
    UnknownComponent { id: String },
    #[error(transparent)]
    Property(#[from] PropertyError),
}

/// A reversible scene mutation. Each variant carries enough state to execute
/// and undo without consulting anything but the scene.
#[derive(Debug, Clone)]
pub enum Command {
    Add {
        component: Component,
    },
    Delete {
        id: String,
        /// Filled by `execute`; consumed by `undo`.
        removed: Option<(Component, usize)>,
    },
    Move {
        id: String,
        from: Vec2,
        to: Vec2,
    },
    MoveMulti {
        moves: Vec<(String, Vec2, Vec2)>,
    },
    Rotate {
        id: String,
        from_rad: f64,
        to_rad: f64,
    },
    SetProperty {
        id: String,
        name: String,
        old: PropValue,
        new: PropValue,
    },
    ClearAll {
        /// Deep copies captured by `execute`.
        snapshot: Vec<Component>,
    },
    Select {
        prev: Vec<String>,
        next: Vec<String>,
    },
    Composite {
        commands: Vec<Command>,
    },
}

impl Command {
    pub fn add(component: Component) -> Self {
        Self::Add { component }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self::Delete {
            id: id.into(),
            removed: None,
        }
    }

    pub fn move_to(id: impl Into<String>, from: Vec2, to: Vec2) -> Self {
        Self::Move {
            id: id.into(),
            from,
            to,
        }
    }

    pub fn rotate(id: impl Into<String>, from_rad: f64, to_rad: f64) -> Self {
        Self::Rotate {
            id: id.into(),
            from_rad,
            to_rad,
        }
    }

    pub fn set_property(
        id: impl Into<String>,
        name: impl Into<String>,
        old: PropValue,
        new: PropValue,
    ) -> Self {
        Self::SetProperty {
            id: id.into(),
            name: name.into(),
            old,
            new,
        }
    }

    pub fn clear_all() -> Self {
        Self::ClearAll {
            snapshot: Vec::new(),
        }
    }

    pub fn select(prev: Vec<String>, next: Vec<String>) -> Self {
        Self::Select { prev, next }
    }

    pub fn composite(commands: Vec<Command>) -> Self {
        Self::Composite { commands }
    }

    /// Delete every selected component as one undoable unit.
    pub fn delete_selection(scene: &Scene) -> Self {
        Self::composite(
            scene
                .selected_ids()
                .into_iter()
                .map(Command::delete)
                .collect(),
        )
    }

    pub fn execute(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        match self {
            Command::Add { component } => {
                scene.add(component.clone());
                Ok(())
            }
            Command::Delete { id, removed } => {
                *removed = Some(scene.remove_by_id(id).ok_or_else(|| {
                    CommandError::UnknownComponent { id: id.clone() }
                })?);
                Ok(())
            }
            Command::Move { id, to, .. } => {
                let component = scene
                    .get_mut_by_id(id)
                    .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                component.pos = *to;
                Ok(())
            }
            Command::MoveMulti { moves } => {
                for (id, _, to) in moves.iter() {
                    let component = scene
                        .get_mut_by_id(id)
                        .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                    component.pos = *to;
                }
                Ok(())
            }
            Command::Rotate { id, to_rad, .. } => {
                let component = scene
                    .get_mut_by_id(id)
                    .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                component.angle_rad = *to_rad;
                Ok(())
            }
            Command::SetProperty { id, name, new, .. } => {
                let component = scene
                    .get_mut_by_id(id)
                    .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                component.set_property(name, new)?;
                Ok(())
            }
            Command::ClearAll { snapshot } => {
                *snapshot = scene.clear();
                Ok(())
            }
            Command::Select { next, .. } => {
                scene.set_selection(next);
                Ok(())
            }
            Command::Composite { commands } => {
                for command in commands.iter_mut() {
                    command.execute(scene)?;
                }
                Ok(())
            }
        }
    }

    pub fn undo(&mut self, scene: &mut Scene) -> Result<(), CommandError> {
        match self {
            Command::Add { component } => {
                scene.remove_by_id(&component.id).ok_or_else(|| {
                    CommandError::UnknownComponent {
                        id: component.id.clone(),
                    }
                })?;
                Ok(())
            }
            Command::Delete { id, removed } => {
                let (component, index) =
                    removed
                        .take()
                        .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                scene.insert_at(component, index);
                Ok(())
            }
            Command::Move { id, from, .. } => {
                let component = scene
                    .get_mut_by_id(id)
                    .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                component.pos = *from;
                Ok(())
            }
            Command::MoveMulti { moves } => {
                for (id, from, _) in moves.iter() {
                    let component = scene
                        .get_mut_by_id(id)
                        .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                    component.pos = *from;
                }
                Ok(())
            }
            Command::Rotate { id, from_rad, .. } => {
                let component = scene
                    .get_mut_by_id(id)
                    .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                component.angle_rad = *from_rad;
                Ok(())
            }
            Command::SetProperty { id, name, old, .. } => {
                let component = scene
                    .get_mut_by_id(id)
                    .ok_or_else(|| CommandError::UnknownComponent { id: id.clone() })?;
                component.set_property(name, old)?;
                Ok(())
            }
            Command::ClearAll { snapshot } => {
                scene.restore(std::mem::take(snapshot));
                Ok(())
            }
            Command::Select { prev, .. } => {
                scene.set_selection(prev);
                Ok(())
            }
            Command::Composite { commands } => {
                for command in commands.iter_mut().rev() {
                    command.undo(scene)?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct History {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Execute and record. A failed execution leaves both stacks untouched.
    pub fn add(&mut self, mut command: Command, scene: &mut Scene) -> Result<(), CommandError> {
        command.execute(scene)?;
        self.undo_stack.push(command);
        trace!(
            target: "history",
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "command_push"
        );
        if self.undo_stack.len() > HISTORY_MAX {
            self.undo_stack.remove(0);
            trace!(target: "history", "undo_stack_trimmed");
        }
        if !self.redo_stack.is_empty() {
            self.redo_stack.clear();
            trace!(target: "history", "redo_stack_cleared_on_new_command");
        }
        Ok(())
    }

    /// Undo the latest command. Empty stack is a no-op returning `false`.
    pub fn undo(&mut self, scene: &mut Scene) -> bool {
        let Some(mut command) = self.undo_stack.pop() else {
            return false;
        };
        if let Err(err) = command.undo(scene) {
            warn!(target: "history", error = %err, "undo failed; dropping command");
            return false;
        }
        self.redo_stack.push(command);
        trace!(
            target: "history",
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "undo_pop"
        );
        true
    }

    /// Re-apply the most recently undone command.
    pub fn redo(&mut self, scene: &mut Scene) -> bool {
        let Some(mut command) = self.redo_stack.pop() else {
            return false;
        };
        if let Err(err) = command.execute(scene) {
            warn!(target: "history", error = %err, "redo failed; dropping command");
            return false;
        }
        self.undo_stack.push(command);
        trace!(
            target: "history",
            undo_depth = self.undo_stack.len(),
            redo_depth = self.redo_stack.len(),
            "redo_pop"
        );
        true
    }
}

/// Equality under the coalescing epsilon: a drag that lands back on its
/// starting value produces no history entry.
pub fn values_equal(a: &PropValue, b: &PropValue, epsilon: f64) -> bool {
    match (a, b) {
        (PropValue::Number(x), PropValue::Number(y)) => (x - y).abs() <= epsilon,
        (PropValue::Bool(x), PropValue::Bool(y)) => x == y,
        (PropValue::Text(x), PropValue::Text(y)) => x == y,
        _ => false,
    }
}

/// Coalescer for continuous property edits. `begin` records the value before
/// the gesture; previews mutate the scene directly; `commit` emits at most
/// one command spanning the whole gesture.
#[derive(Debug)]
pub struct PropertyDrag {
    id: String,
    name: String,
    start: PropValue,
}

impl PropertyDrag {
    /// Capture the pre-gesture value. `None` when the component or property
    /// does not exist.
    pub fn begin(scene: &Scene, id: &str, name: &str) -> Option<Self> {
        let start = scene.get_by_id(id)?.get_properties().get(name)?.value.clone();
        Some(Self {
            id: id.to_string(),
            name: name.to_string(),
            start,
        })
    }

    /// Live preview during the gesture; no history entry.
    pub fn preview(
        &self,
        scene: &mut Scene,
        value: &PropValue,
    ) -> Result<(), CommandError> {
        let component = scene
            .get_mut_by_id(&self.id)
            .ok_or_else(|| CommandError::UnknownComponent {
                id: self.id.clone(),
            })?;
        component.set_property(&self.name, value)?;
        Ok(())
    }

    /// Commit the gesture: one command with `old` = pre-gesture value and
    /// `new` = the scene's current value. Returns `false` (and records
    /// nothing) when the value did not effectively change.
    pub fn commit(self, scene: &mut Scene, history: &mut History) -> Result<bool, CommandError> {
        let current = scene
            .get_by_id(&self.id)
            .and_then(|c| c.get_properties().get(&self.name).map(|d| d.value.clone()))
            .ok_or_else(|| CommandError::UnknownComponent {
                id: self.id.clone(),
            })?;
        if values_equal(&self.start, &current, VALUE_EPSILON) {
            trace!(target: "history", property = self.name.as_str(), "drag_coalesced_to_noop");
            return Ok(false);
        }
        history.add(
            Command::set_property(self.id, self.name, self.start, current),
            scene,
        )?;
        Ok(true)
    }
}

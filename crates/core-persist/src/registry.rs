//! Recent-projects registry and browser-storage fallback.
//!
//! Both speak through [`KeyValueStore`], the seam the editor backs with its
//! real storage (localStorage in the browser shell, a settings file on
//! desktop). [`MemoryStore`] serves tests and headless runs.

use crate::project::{ProjectConfig, StorageMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

pub const RECENT_PROJECTS_KEY: &str = "opticslab_recent_projects";
pub const RECENT_PROJECTS_CAP: usize = 5;
pub const BROWSER_PROJECTS_KEY: &str = "opticslab_projects";

/// Editor-backed string key-value storage.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory store for tests and headless use.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry payload parse failed: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProjectEntry {
    pub id: String,
    pub name: String,
    pub storage_mode: StorageMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub updated_at: String,
}

/// Ordered most-recent-first list capped at [`RECENT_PROJECTS_CAP`].
pub struct RecentProjects;

impl RecentProjects {
    pub fn load(store: &dyn KeyValueStore) -> Vec<RecentProjectEntry> {
        store
            .get(RECENT_PROJECTS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Move (or insert) an entry to the front, dropping anything beyond the
    /// cap, and persist the new list.
    pub fn touch(
        store: &mut dyn KeyValueStore,
        entry: RecentProjectEntry,
    ) -> Result<Vec<RecentProjectEntry>, RegistryError> {
        let mut entries = Self::load(store);
        entries.retain(|existing| existing.id != entry.id);
        entries.insert(0, entry);
        entries.truncate(RECENT_PROJECTS_CAP);
        store.set(RECENT_PROJECTS_KEY, &serde_json::to_string(&entries)?);
        debug!(target: "persist.recent", count = entries.len(), "recent projects updated");
        Ok(entries)
    }

    pub fn forget(
        store: &mut dyn KeyValueStore,
        id: &str,
    ) -> Result<Vec<RecentProjectEntry>, RegistryError> {
        let mut entries = Self::load(store);
        entries.retain(|existing| existing.id != id);
        store.set(RECENT_PROJECTS_KEY, &serde_json::to_string(&entries)?);
        Ok(entries)
    }
}

/// Storage key for one scene payload in browser mode.
pub fn browser_scene_key(project_id: &str, scene_id: &str) -> String {
    format!("opticslab_project_{project_id}_scene_{scene_id}")
}

/// Project config plus its inline scene directory, as kept under
/// [`BROWSER_PROJECTS_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserProjectRecord {
    #[serde(flatten)]
    pub config: ProjectConfig,
    #[serde(default)]
    pub scenes: Vec<BrowserSceneRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserSceneRef {
    pub id: String,
    pub name: String,
}

/// Browser-storage fallback operations.
pub struct BrowserProjects;

impl BrowserProjects {
    pub fn list(store: &dyn KeyValueStore) -> Vec<BrowserProjectRecord> {
        store
            .get(BROWSER_PROJECTS_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    /// Insert or replace a project record (matched by id).
    pub fn upsert(
        store: &mut dyn KeyValueStore,
        record: BrowserProjectRecord,
    ) -> Result<(), RegistryError> {
        let mut records = Self::list(store);
        records.retain(|existing| existing.config.id != record.config.id);
        records.push(record);
        store.set(BROWSER_PROJECTS_KEY, &serde_json::to_string(&records)?);
        Ok(())
    }

    /// Delete a project and all of its stored scene payloads.
    pub fn delete(store: &mut dyn KeyValueStore, project_id: &str) -> Result<(), RegistryError> {
        let mut records = Self::list(store);
        if let Some(record) = records
            .iter()
            .find(|existing| existing.config.id == project_id)
        {
            for scene in &record.scenes {
                store.remove(&browser_scene_key(project_id, &scene.id));
            }
        }
        records.retain(|existing| existing.config.id != project_id);
        store.set(BROWSER_PROJECTS_KEY, &serde_json::to_string(&records)?);
        Ok(())
    }

    pub fn save_scene_payload(
        store: &mut dyn KeyValueStore,
        project_id: &str,
        scene_id: &str,
        payload: &str,
    ) {
        store.set(&browser_scene_key(project_id, scene_id), payload);
    }

    pub fn load_scene_payload(
        store: &dyn KeyValueStore,
        project_id: &str,
        scene_id: &str,
    ) -> Option<String> {
        store.get(&browser_scene_key(project_id, scene_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, updated_at: &str) -> RecentProjectEntry {
        RecentProjectEntry {
            id: id.to_string(),
            name: format!("project {id}"),
            storage_mode: StorageMode::LocalFolder,
            path: Some(format!("/labs/{id}")),
            updated_at: updated_at.to_string(),
        }
    }

    fn config(id: &str) -> ProjectConfig {
        ProjectConfig {
            id: id.to_string(),
            name: format!("project {id}"),
            storage_mode: StorageMode::Browser,
            created_at: "t0".to_string(),
            updated_at: "t0".to_string(),
            github_url: None,
            sync_command_template: None,
        }
    }

    #[test]
    fn recent_projects_order_most_recent_first() {
        let mut store = MemoryStore::new();
        RecentProjects::touch(&mut store, entry("a", "t1")).unwrap();
        RecentProjects::touch(&mut store, entry("b", "t2")).unwrap();
        let entries = RecentProjects::touch(&mut store, entry("a", "t3")).unwrap();
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(entries[0].updated_at, "t3");
    }

    #[test]
    fn recent_projects_cap_at_five() {
        let mut store = MemoryStore::new();
        for i in 0..8 {
            RecentProjects::touch(&mut store, entry(&format!("p{i}"), "t")).unwrap();
        }
        let entries = RecentProjects::load(&store);
        assert_eq!(entries.len(), RECENT_PROJECTS_CAP);
        assert_eq!(entries[0].id, "p7");
        assert!(entries.iter().all(|e| e.id != "p0"));
    }

    #[test]
    fn forget_removes_entry() {
        let mut store = MemoryStore::new();
        RecentProjects::touch(&mut store, entry("a", "t1")).unwrap();
        RecentProjects::touch(&mut store, entry("b", "t2")).unwrap();
        let entries = RecentProjects::forget(&mut store, "a").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b");
    }

    #[test]
    fn corrupt_registry_payload_degrades_to_empty() {
        let mut store = MemoryStore::new();
        store.set(RECENT_PROJECTS_KEY, "not json at all");
        assert!(RecentProjects::load(&store).is_empty());
    }

    #[test]
    fn browser_projects_round_trip_with_scene_payloads() {
        let mut store = MemoryStore::new();
        let record = BrowserProjectRecord {
            config: config("p1"),
            scenes: vec![BrowserSceneRef {
                id: "s1".to_string(),
                name: "main".to_string(),
            }],
        };
        BrowserProjects::upsert(&mut store, record.clone()).unwrap();
        BrowserProjects::save_scene_payload(&mut store, "p1", "s1", "{\"version\":\"2.0.0\"}");

        assert_eq!(BrowserProjects::list(&store), vec![record]);
        assert_eq!(
            BrowserProjects::load_scene_payload(&store, "p1", "s1").as_deref(),
            Some("{\"version\":\"2.0.0\"}")
        );

        BrowserProjects::delete(&mut store, "p1").unwrap();
        assert!(BrowserProjects::list(&store).is_empty());
        assert!(BrowserProjects::load_scene_payload(&store, "p1", "s1").is_none());
    }

    #[test]
    fn scene_key_format_is_stable() {
        assert_eq!(
            browser_scene_key("proj", "scene"),
            "opticslab_project_proj_scene_scene"
        );
    }
}

//! Project and scene persistence contracts.
//!
//! Three storage surfaces share these types:
//! * a local project directory holding `.opticslab.json` plus
//!   `*.scene.json` siblings (scene name = file stem; subdirectories are an
//!   editor concern and ignored here),
//! * the recent-projects registry, an editor-backed key-value entry capped
//!   at five items,
//! * the browser-storage fallback keeping whole projects inline.
//!
//! The core never reads a clock: timestamps are opaque ISO-8601 strings
//! supplied by the caller.

pub mod project;
pub mod registry;

pub use project::{
    PROJECT_FILE_NAME, ProjectConfig, ProjectError, SCENE_FILE_SUFFIX, StorageMode,
    init_project, list_scene_names, load_project_config, load_scene, save_project_config,
    save_scene, scene_path,
};
pub use registry::{
    BROWSER_PROJECTS_KEY, BrowserProjectRecord, BrowserProjects, BrowserSceneRef, KeyValueStore,
    MemoryStore, RECENT_PROJECTS_CAP, RECENT_PROJECTS_KEY, RecentProjectEntry, RecentProjects,
    RegistryError, browser_scene_key,
};

//! Local-folder project layout.

use core_scene::Scene;
use core_serialize::{SceneFileError, SceneFileWarning};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

pub const PROJECT_FILE_NAME: &str = ".opticslab.json";
pub const SCENE_FILE_SUFFIX: &str = ".scene.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    LocalFolder,
    Browser,
}

/// Contents of `.opticslab.json` at a project directory root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub id: String,
    pub name: String,
    pub storage_mode: StorageMode,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_command_template: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("project config parse failed: {0}")]
    Config(#[from] serde_json::Error),
    #[error(transparent)]
    Scene(#[from] SceneFileError),
    #[error("no {PROJECT_FILE_NAME} in `{dir}`")]
    MissingConfig { dir: PathBuf },
    #[error("scene name `{name}` is not a valid file stem")]
    InvalidSceneName { name: String },
}

/// Create `.opticslab.json` in `dir` (which must exist). Timestamps are the
/// caller's clock.
pub fn init_project(
    dir: &Path,
    name: &str,
    id: &str,
    timestamp: &str,
) -> Result<ProjectConfig, ProjectError> {
    let config = ProjectConfig {
        id: id.to_string(),
        name: name.to_string(),
        storage_mode: StorageMode::LocalFolder,
        created_at: timestamp.to_string(),
        updated_at: timestamp.to_string(),
        github_url: None,
        sync_command_template: None,
    };
    save_project_config(dir, &config)?;
    info!(target: "persist.project", dir = %dir.display(), name, "project initialized");
    Ok(config)
}

pub fn load_project_config(dir: &Path) -> Result<ProjectConfig, ProjectError> {
    let path = dir.join(PROJECT_FILE_NAME);
    if !path.exists() {
        return Err(ProjectError::MissingConfig {
            dir: dir.to_path_buf(),
        });
    }
    let content = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_project_config(dir: &Path, config: &ProjectConfig) -> Result<(), ProjectError> {
    let path = dir.join(PROJECT_FILE_NAME);
    fs::write(&path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}

/// Scene names in this project: file stems of `*.scene.json` entries,
/// sorted. Subdirectories and other files are ignored.
pub fn list_scene_names(dir: &Path) -> Result<Vec<String>, ProjectError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(stem) = file_name.strip_suffix(SCENE_FILE_SUFFIX)
            && !stem.is_empty()
        {
            names.push(stem.to_string());
        }
    }
    names.sort();
    Ok(names)
}

pub fn scene_path(dir: &Path, name: &str) -> Result<PathBuf, ProjectError> {
    if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
        return Err(ProjectError::InvalidSceneName {
            name: name.to_string(),
        });
    }
    Ok(dir.join(format!("{name}{SCENE_FILE_SUFFIX}")))
}

pub fn load_scene(
    dir: &Path,
    name: &str,
) -> Result<(Scene, Vec<SceneFileWarning>), ProjectError> {
    let path = scene_path(dir, name)?;
    let content = fs::read_to_string(&path)?;
    let (mut scene, warnings) = core_serialize::deserialize(&content)?;
    // The file stem names the scene regardless of what the payload claims.
    scene.name = name.to_string();
    debug!(target: "persist.project", scene = name, warnings = warnings.len(), "scene loaded");
    Ok((scene, warnings))
}

pub fn save_scene(dir: &Path, name: &str, scene: &Scene) -> Result<(), ProjectError> {
    let path = scene_path(dir, name)?;
    fs::write(&path, core_serialize::serialize(scene)?)?;
    debug!(target: "persist.project", scene = name, "scene saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_geom::Vec2;
    use core_optics::{ComponentKind, LaserSource};
    use core_scene::are_equivalent;

    #[test]
    fn project_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let config = init_project(
            dir.path(),
            "bench",
            "proj-1",
            "2026-08-01T12:00:00Z",
        )
        .unwrap();
        let loaded = load_project_config(dir.path()).unwrap();
        assert_eq!(config, loaded);
        assert_eq!(loaded.storage_mode, StorageMode::LocalFolder);
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_project_config(dir.path()),
            Err(ProjectError::MissingConfig { .. })
        ));
    }

    #[test]
    fn scene_files_round_trip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = Scene::new("alignment");
        scene.spawn(
            ComponentKind::LaserSource(LaserSource::default()),
            Vec2::new(-50.0, 0.0),
            0.0,
        );
        save_scene(dir.path(), "alignment", &scene).unwrap();
        save_scene(dir.path(), "spares", &Scene::new("spares")).unwrap();
        // Noise the lister must ignore.
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        std::fs::create_dir(dir.path().join("archive")).unwrap();

        assert_eq!(
            list_scene_names(dir.path()).unwrap(),
            vec!["alignment".to_string(), "spares".to_string()]
        );

        let (loaded, warnings) = load_scene(dir.path(), "alignment").unwrap();
        assert!(warnings.is_empty());
        assert!(are_equivalent(&scene, &loaded));
        assert_eq!(loaded.name, "alignment");
    }

    #[test]
    fn scene_names_with_separators_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            save_scene(dir.path(), "../escape", &Scene::new("x")),
            Err(ProjectError::InvalidSceneName { .. })
        ));
        assert!(matches!(
            scene_path(dir.path(), ""),
            Err(ProjectError::InvalidSceneName { .. })
        ));
    }

    #[test]
    fn optional_config_fields_survive() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = init_project(dir.path(), "bench", "p", "t").unwrap();
        config.github_url = Some("https://github.com/lab/bench".to_string());
        save_project_config(dir.path(), &config).unwrap();
        let loaded = load_project_config(dir.path()).unwrap();
        assert_eq!(
            loaded.github_url.as_deref(),
            Some("https://github.com/lab/bench")
        );
        assert!(loaded.sync_command_template.is_none());
    }
}

//! Project discovery and `.trackbook/config.yaml`.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackbookError};
use crate::transfer::{CsvDialect, ImportPolicy};
use crate::workspace::AppKind;

pub const TRACKBOOK_DIR: &str = ".trackbook";
pub const CONFIG_FILE: &str = "config.yaml";
pub const DATA_DIR: &str = "data";

/// Per-project settings. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// App used when `--app` is not given.
    pub app: AppKind,
    pub csv_dialect: CsvDialect,
    /// Overrides the app's own import policy when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_policy: Option<ImportPolicy>,
}

impl Config {
    /// Read the config under `root`. A missing file gives the defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = config_path(root);
        match fs::read_to_string(&path) {
            Ok(raw) if raw.trim().is_empty() => Ok(Self::default()),
            Ok(raw) => serde_yaml::from_str(&raw)
                .map_err(|e| TrackbookError::Config(format!("{}: {}", path.display(), e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        fs::write(config_path(root), serde_yaml::to_string(self)?)?;
        Ok(())
    }
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(TRACKBOOK_DIR).join(CONFIG_FILE)
}

/// Directory holding one JSON file per stored key.
pub fn data_dir(root: &Path) -> PathBuf {
    root.join(TRACKBOOK_DIR).join(DATA_DIR)
}

/// Walk up from `start` to the nearest directory containing `.trackbook/`.
pub fn find_project_root_from(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(TRACKBOOK_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Find the project root from the working directory.
pub fn find_project_root() -> Result<PathBuf> {
    let cwd = env::current_dir()?;
    find_project_root_from(&cwd).ok_or(TrackbookError::NotInitialized)
}

/// Create `.trackbook/` under `root` with a config naming `app`.
pub fn init(root: &Path, app: AppKind) -> Result<Config> {
    if root.join(TRACKBOOK_DIR).exists() {
        return Err(TrackbookError::AlreadyInitialized);
    }
    fs::create_dir_all(data_dir(root))?;
    let config = Config {
        app,
        ..Config::default()
    };
    config.save(root)?;
    tracing::info!(root = %root.display(), app = %app, "initialized project");
    Ok(config)
}

//! Configuration models.
//!
//! Search roots are passed explicitly into the locator and resolver instead
//! of being looked up globally, so tests can point them at temp directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Workspace storage, relative to the editor data directory.
const WORKSPACE_STORAGE_PATH: &str = "User/workspaceStorage";
/// Global storage, relative to the editor data directory.
const GLOBAL_STORAGE_PATH: &str = "User/globalStorage";
/// Cached extension data, relative to the editor data directory.
const CACHED_EXTENSIONS_PATH: &str = "CachedExtensions";
/// Fallback folder, relative to the working directory.
const LOCAL_FALLBACK_PATH: &str = "db";

/// Root directories searched for workspaces and chat stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchPaths {
    /// One subdirectory per workspace, each holding `workspace.json`.
    pub workspace_storage: PathBuf,
    /// Editor-wide extension state.
    pub global_storage: PathBuf,
    /// Cached extension data.
    pub cached_extensions: PathBuf,
    /// Local fallback directory.
    pub local_fallback: PathBuf,
}

impl SearchPaths {
    /// Derives the standard layout below an editor data directory
    /// (e.g. `~/.config/Code`).
    #[must_use]
    pub fn from_data_dir(data_dir: &Path) -> Self {
        Self {
            workspace_storage: data_dir.join(WORKSPACE_STORAGE_PATH),
            global_storage: data_dir.join(GLOBAL_STORAGE_PATH),
            cached_extensions: data_dir.join(CACHED_EXTENSIONS_PATH),
            local_fallback: PathBuf::from(LOCAL_FALLBACK_PATH),
        }
    }
}

/// Path overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Editor data directory (defaults to the platform location).
    #[serde(default)]
    pub editor_data_dir: Option<PathBuf>,

    /// Override for the workspace storage root.
    #[serde(default)]
    pub workspace_storage: Option<PathBuf>,

    /// Override for the global storage root.
    #[serde(default)]
    pub global_storage: Option<PathBuf>,

    /// Override for the cached extensions root.
    #[serde(default)]
    pub cached_extensions: Option<PathBuf>,

    /// Override for the local fallback root.
    #[serde(default)]
    pub local_fallback: Option<PathBuf>,
}

/// Export defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Default output format: json, csv, markdown or table.
    #[serde(default = "default_format")]
    pub format: String,

    /// Directory used by `export-all`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Minimum number of messages for a session to be exported.
    #[serde(default = "default_min_messages")]
    pub min_messages: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            output_dir: default_output_dir(),
            min_messages: default_min_messages(),
        }
    }
}

fn default_format() -> String {
    "json".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

const fn default_min_messages() -> usize {
    1
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Path configuration.
    #[serde(default)]
    pub paths: PathConfig,

    /// Export configuration.
    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".copilot-chat-export")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    /// Builds the search roots, applying any configured overrides on top of
    /// the layout below `editor_data_dir`.
    #[must_use]
    pub fn search_paths(&self, editor_data_dir: &Path) -> SearchPaths {
        let base = SearchPaths::from_data_dir(editor_data_dir);
        let paths = &self.paths;

        SearchPaths {
            workspace_storage: paths
                .workspace_storage
                .clone()
                .unwrap_or(base.workspace_storage),
            global_storage: paths.global_storage.clone().unwrap_or(base.global_storage),
            cached_extensions: paths
                .cached_extensions
                .clone()
                .unwrap_or(base.cached_extensions),
            local_fallback: paths.local_fallback.clone().unwrap_or(base.local_fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.export.format, "json");
        assert_eq!(config.export.min_messages, 1);
        assert!(config.paths.editor_data_dir.is_none());
    }

    #[test]
    fn test_search_paths_layout() {
        let paths = SearchPaths::from_data_dir(Path::new("/home/me/.config/Code"));
        assert_eq!(
            paths.workspace_storage,
            PathBuf::from("/home/me/.config/Code/User/workspaceStorage")
        );
        assert_eq!(
            paths.global_storage,
            PathBuf::from("/home/me/.config/Code/User/globalStorage")
        );
        assert_eq!(
            paths.cached_extensions,
            PathBuf::from("/home/me/.config/Code/CachedExtensions")
        );
        assert_eq!(paths.local_fallback, PathBuf::from("db"));
    }

    #[test]
    fn test_search_path_overrides() {
        let mut config = AppConfig::default();
        config.paths.global_storage = Some(PathBuf::from("/srv/global"));

        let paths = config.search_paths(Path::new("/data"));
        assert_eq!(paths.global_storage, PathBuf::from("/srv/global"));
        assert_eq!(
            paths.workspace_storage,
            PathBuf::from("/data/User/workspaceStorage")
        );
    }
}

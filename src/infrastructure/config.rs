//! Configuration file management.
//!
//! Handles loading and creating the TOML configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Copilot Chat Export Configuration
# Auto-generated - edit as needed

[paths]
# VS Code data directory (defaults to the platform location, e.g. ~/.config/Code)
# editor_data_dir = "/custom/Code"

# Individual search roots (default to the layout below editor_data_dir)
# workspace_storage = "/custom/Code/User/workspaceStorage"
# global_storage = "/custom/Code/User/globalStorage"
# cached_extensions = "/custom/Code/CachedExtensions"
# local_fallback = "db"

[export]
# Default output format: json, csv, markdown or table
format = "json"

# Directory used by export-all
output_dir = "exports"

# Minimum number of messages for a session to be exported
min_messages = 1
"#;

/// Load configuration from `path`, or from the default location.
///
/// An explicitly given file must exist; a missing default file yields the
/// default configuration.
///
/// # Errors
/// Returns error if the file cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config_from_file(path);
    }

    let config_path = AppConfig::default_config_path();
    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read config file: {}", path.display()), e))?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse config file: {e}"),
    })
}

/// Create the default configuration file if it doesn't exist.
///
/// Returns the path of the configuration file.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: Option<&Path>) -> Result<PathBuf> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if !config_path.exists() {
        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::io("Failed to create config directory", e))?;
        }

        fs::write(&config_path, DEFAULT_CONFIG)
            .map_err(|e| AppError::io("Failed to create default config", e))?;

        tracing::info!(path = %config_path.display(), "Created default configuration");
    }

    Ok(config_path)
}

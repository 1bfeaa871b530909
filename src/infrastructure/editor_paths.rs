//! VS Code path discovery.
//!
//! Handles locating the editor's data directory across different platforms.

use std::path::PathBuf;

use crate::domain::{AppError, Result};

/// Data directory names below the platform config dir
/// (`~/.config`, `~/Library/Application Support`, `%APPDATA%`).
const STABLE_DIR: &str = "Code";
const INSIDERS_DIR: &str = "Code - Insiders";

/// Server-side data directories used by remote development, relative to home.
const SERVER_DATA_PATHS: &[&str] = &[".vscode-server/data", ".vscode-server-insiders/data"];

/// Discovers the editor data directory.
///
/// # Errors
/// Returns error if no candidate directory exists.
pub fn find_editor_data_dir(insiders: bool) -> Result<PathBuf> {
    let candidates = candidate_data_dirs(insiders);

    for path in &candidates {
        if path.is_dir() {
            tracing::debug!("Found editor data dir at: {}", path.display());
            return Ok(path.clone());
        }
    }

    Err(AppError::Config {
        message: format!("VS Code data directory not found. Searched: {candidates:?}"),
    })
}

/// All data directories probed, in order.
#[must_use]
pub fn candidate_data_dirs(insiders: bool) -> Vec<PathBuf> {
    let name = if insiders { INSIDERS_DIR } else { STABLE_DIR };
    let mut candidates = Vec::new();

    if let Some(config) = dirs::config_dir() {
        candidates.push(config.join(name));
    }

    if let Some(home) = dirs::home_dir() {
        let server_paths = if insiders {
            &SERVER_DATA_PATHS[1..]
        } else {
            &SERVER_DATA_PATHS[..1]
        };
        candidates.extend(server_paths.iter().map(|p| home.join(p)));
    }

    candidates
}

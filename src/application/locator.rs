//! Chat store location discovery.

use std::path::Path;

use crate::domain::{LocationKind, SearchPaths, StorageLocation};
use crate::infrastructure::has_store_file;

/// Finds directories that actually hold chat stores, in search priority order.
#[derive(Debug, Clone)]
pub struct StoreLocator {
    paths: SearchPaths,
}

impl StoreLocator {
    #[must_use]
    pub const fn new(paths: SearchPaths) -> Self {
        Self { paths }
    }

    /// Lists candidate locations, highest priority first.
    ///
    /// The workspace-specific directory is considered only when `workspace_id`
    /// is given. A directory is kept only if a recognized store file exists
    /// somewhere below it. An empty result means no chat data is available.
    #[must_use]
    pub fn locate(&self, workspace_id: Option<&str>) -> Vec<StorageLocation> {
        let workspace_dir = workspace_id.map(|id| self.paths.workspace_storage.join(id));

        let candidates = [
            (workspace_dir.as_deref(), LocationKind::WorkspaceSpecific),
            (Some(self.paths.global_storage.as_path()), LocationKind::Global),
            (
                Some(self.paths.cached_extensions.as_path()),
                LocationKind::CachedExtension,
            ),
            (Some(self.paths.local_fallback.as_path()), LocationKind::LocalFallback),
        ];

        let locations: Vec<StorageLocation> = candidates
            .into_iter()
            .filter_map(|(dir, kind)| dir.map(|d| (d, kind)))
            .filter(|(dir, kind)| probe(dir, *kind))
            .map(|(dir, kind)| StorageLocation::new(dir.to_path_buf(), kind))
            .collect();

        tracing::info!("Found {} chat store location(s)", locations.len());

        locations
    }
}

fn probe(dir: &Path, kind: LocationKind) -> bool {
    if !dir.is_dir() {
        tracing::debug!("No {} directory at {}", kind.label(), dir.display());
        return false;
    }

    let found = has_store_file(dir);
    if found {
        tracing::debug!("Found {} store at {}", kind.label(), dir.display());
    } else {
        tracing::debug!("No store files in {}", dir.display());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn search_paths(root: &Path) -> SearchPaths {
        SearchPaths {
            workspace_storage: root.join("workspaceStorage"),
            global_storage: root.join("globalStorage"),
            cached_extensions: root.join("CachedExtensions"),
            local_fallback: root.join("db"),
        }
    }

    #[test]
    fn test_locations_in_priority_order() {
        let root = tempdir().unwrap();
        let paths = search_paths(root.path());

        let ws = paths.workspace_storage.join("abc123");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("state.vscdb"), b"SQLite format 3\0rest").unwrap();

        let global = paths.global_storage.join("github.copilot-chat");
        fs::create_dir_all(&global).unwrap();
        fs::write(global.join("sessions.json"), "[]").unwrap();

        let cached = paths.cached_extensions.join("github.copilot-chat-0.20.0");
        fs::create_dir_all(&cached).unwrap();
        fs::write(cached.join("history.json"), r#"{"messages": []}"#).unwrap();

        fs::create_dir_all(&paths.local_fallback).unwrap();
        fs::write(paths.local_fallback.join("chat.json"), "{}").unwrap();

        let locations = StoreLocator::new(paths.clone()).locate(Some("abc123"));
        let kinds: Vec<_> = locations.iter().map(|l| l.kind).collect();
        assert_eq!(
            kinds,
            vec![
                LocationKind::WorkspaceSpecific,
                LocationKind::Global,
                LocationKind::CachedExtension,
                LocationKind::LocalFallback
            ]
        );
        assert!(locations.windows(2).all(|w| w[0].priority < w[1].priority));
        assert_eq!(locations[0].path, ws);
        assert_eq!(locations[2].path, paths.cached_extensions);
    }

    #[test]
    fn test_workspace_skipped_without_id() {
        let root = tempdir().unwrap();
        let paths = search_paths(root.path());
        let ws = paths.workspace_storage.join("abc123");
        fs::create_dir_all(&ws).unwrap();
        fs::write(ws.join("state.vscdb"), b"SQLite format 3\0").unwrap();

        let locator = StoreLocator::new(paths);
        assert!(locator.locate(None).is_empty());
        assert!(locator.locate(Some("missing")).is_empty());
    }

    #[test]
    fn test_directory_without_store_is_excluded() {
        let root = tempdir().unwrap();
        let paths = search_paths(root.path());
        fs::create_dir_all(&paths.global_storage).unwrap();
        fs::write(paths.global_storage.join("README.txt"), "nothing here").unwrap();

        assert!(StoreLocator::new(paths).locate(None).is_empty());
    }
}

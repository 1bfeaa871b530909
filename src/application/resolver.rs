//! Workspace resolution.
//!
//! Maps a project folder to the opaque identifier the editor uses for its
//! `workspaceStorage/<id>` directory, by reading each `workspace.json`.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::domain::{path, AppError, Result, WorkspaceDescriptor, WorkspaceEntry};

/// Descriptor file inside each workspace storage directory.
const DESCRIPTOR_FILE: &str = "workspace.json";

#[derive(Debug, Deserialize)]
struct RawDescriptor {
    folder: Option<String>,
    /// Multi-root workspaces record the `.code-workspace` file instead.
    workspace: Option<String>,
}

/// Resolves project folders against a workspace storage root.
#[derive(Debug, Clone)]
pub struct WorkspaceResolver {
    storage_root: PathBuf,
}

impl WorkspaceResolver {
    #[must_use]
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    /// The workspace storage root being searched.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Finds the workspace identifier whose recorded folder matches `target`.
    ///
    /// `target` may be a native path or a URI; relative paths are taken
    /// against the current directory. Returns `None` when nothing matches,
    /// including when the storage root does not exist.
    #[must_use]
    pub fn find_workspace_id(&self, target: &str) -> Option<String> {
        let wanted = absolute_target(target);
        tracing::debug!("Resolving workspace for {}", wanted);

        let found = self
            .list_workspaces()
            .find(|entry| path::paths_match(&entry.folder_uri, &wanted))
            .map(|entry| entry.id);

        match &found {
            Some(id) => tracing::info!("Resolved {} to workspace {}", wanted, id),
            None => tracing::info!("No workspace recorded for {}", wanted),
        }

        found
    }

    /// Lazily lists every workspace with a readable descriptor, by id.
    ///
    /// Directories with a missing or malformed descriptor are skipped.
    pub fn list_workspaces(&self) -> impl Iterator<Item = WorkspaceEntry> + '_ {
        self.workspace_dirs()
            .into_iter()
            .filter_map(move |id| match self.descriptor(&id) {
                Ok(descriptor) => Some(WorkspaceEntry::from_descriptor(descriptor)),
                Err(e) => {
                    tracing::debug!("Skipping workspace {}: {}", id, e);
                    None
                }
            })
    }

    /// Reads the descriptor of one workspace.
    ///
    /// # Errors
    /// Returns [`AppError::MalformedDescriptor`] if the file is missing,
    /// unreadable, not JSON, or records no folder.
    pub fn descriptor(&self, id: &str) -> Result<WorkspaceDescriptor> {
        let path = self.storage_root.join(id).join(DESCRIPTOR_FILE);
        let malformed = |message: String| AppError::MalformedDescriptor {
            path: path.clone(),
            message,
        };

        let content = std::fs::read_to_string(&path).map_err(|e| malformed(e.to_string()))?;
        let raw: RawDescriptor =
            serde_json::from_str(&content).map_err(|e| malformed(e.to_string()))?;

        let folder_uri = raw
            .folder
            .or(raw.workspace)
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| malformed("no folder recorded".into()))?;

        Ok(WorkspaceDescriptor {
            folder_uri,
            storage_dir_name: id.to_string(),
        })
    }

    /// Immediate subdirectory names, sorted.
    fn workspace_dirs(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.storage_root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!(
                    "Cannot read workspace storage {}: {}",
                    self.storage_root.display(),
                    e
                );
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }
}

/// Last path segment of a project folder, used to name exports.
#[must_use]
pub fn project_name(target: &str) -> String {
    absolute_target(target)
        .rsplit('/')
        .find(|s| !s.is_empty() && !s.ends_with(':'))
        .unwrap_or("workspace")
        .to_string()
}

/// Normalized form of `target`, rooted at the current directory if relative.
fn absolute_target(target: &str) -> String {
    let normalized = path::normalize(target);
    if !path::is_relative(&normalized) {
        return normalized;
    }

    match std::env::current_dir() {
        Ok(cwd) => path::normalize(&cwd.join(target).to_string_lossy()),
        Err(e) => {
            tracing::warn!("Cannot determine current directory: {}", e);
            normalized
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn workspace(root: &Path, id: &str, descriptor: &str) {
        let dir = root.join(id);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(DESCRIPTOR_FILE), descriptor).unwrap();
    }

    #[test]
    fn test_find_workspace_id_matches_uri() {
        let root = tempdir().unwrap();
        workspace(root.path(), "abc123", r#"{"folder": "file:///home/u/proj"}"#);
        workspace(root.path(), "def456", r#"{"folder": "file:///home/u/other"}"#);

        let resolver = WorkspaceResolver::new(root.path());
        assert_eq!(
            resolver.find_workspace_id("/home/u/proj"),
            Some("abc123".to_string())
        );
        assert_eq!(
            resolver.find_workspace_id("/home/u/proj/"),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn test_windows_descriptor_matches_native_path() {
        let root = tempdir().unwrap();
        workspace(root.path(), "win1", r#"{"folder": "file:///c%3A/Users/me/Proj"}"#);

        let resolver = WorkspaceResolver::new(root.path());
        assert_eq!(
            resolver.find_workspace_id(r"C:\Users\me\Proj\"),
            Some("win1".to_string())
        );
    }

    #[test]
    fn test_no_match_and_no_prefix_match() {
        let root = tempdir().unwrap();
        workspace(root.path(), "abc123", r#"{"folder": "file:///home/u/proj"}"#);

        let resolver = WorkspaceResolver::new(root.path());
        assert_eq!(resolver.find_workspace_id("/home/u/elsewhere"), None);
        assert_eq!(resolver.find_workspace_id("/home/u"), None);
        assert_eq!(resolver.find_workspace_id("/home/u/proj/sub"), None);
    }

    #[test]
    fn test_corrupt_descriptor_is_skipped() {
        let root = tempdir().unwrap();
        workspace(root.path(), "aaa", "{not json");
        workspace(root.path(), "bbb", r#"{"settings": {}}"#);
        fs::create_dir(root.path().join("ccc")).unwrap();
        workspace(root.path(), "ddd", r#"{"folder": "file:///srv/app"}"#);

        let resolver = WorkspaceResolver::new(root.path());
        assert_eq!(resolver.find_workspace_id("/srv/app"), Some("ddd".to_string()));

        let entries: Vec<_> = resolver.list_workspaces().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "app");

        assert!(matches!(
            resolver.descriptor("aaa"),
            Err(AppError::MalformedDescriptor { .. })
        ));
        assert!(matches!(
            resolver.descriptor("ccc"),
            Err(AppError::MalformedDescriptor { .. })
        ));
    }

    #[test]
    fn test_multi_root_and_remote_descriptors() {
        let root = tempdir().unwrap();
        workspace(
            root.path(),
            "multi",
            r#"{"workspace": "file:///home/u/all.code-workspace"}"#,
        );
        workspace(
            root.path(),
            "wsl",
            r#"{"folder": "vscode-remote://wsl%2Bubuntu/home/u/proj"}"#,
        );

        let resolver = WorkspaceResolver::new(root.path());
        let entries: Vec<_> = resolver.list_workspaces().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "multi");
        assert!(entries[1].folder_path.is_none());
        assert!(!entries[1].exists);

        assert_eq!(
            resolver.find_workspace_id("vscode-remote://wsl+ubuntu/home/u/proj"),
            Some("wsl".to_string())
        );
    }

    #[test]
    fn test_missing_storage_root() {
        let root = tempdir().unwrap();
        let resolver = WorkspaceResolver::new(root.path().join("nope"));
        assert_eq!(resolver.list_workspaces().count(), 0);
        assert_eq!(resolver.find_workspace_id("/anything"), None);
    }

    #[test]
    fn test_project_name() {
        assert_eq!(project_name("/home/u/proj/"), "proj");
        assert_eq!(project_name("file:///c%3A/Users/me/App"), "App");
        assert_eq!(project_name("C:\\"), "workspace");
    }

    #[cfg(unix)]
    #[test]
    fn test_relative_target_uses_current_dir() {
        let root = tempdir().unwrap();
        let cwd = std::env::current_dir().unwrap();
        let uri = format!("file://{}", cwd.join("sub").display());
        workspace(root.path(), "rel", &format!(r#"{{"folder": "{uri}"}}"#));

        let resolver = WorkspaceResolver::new(root.path());
        assert_eq!(resolver.find_workspace_id("./sub"), Some("rel".to_string()));
    }
}

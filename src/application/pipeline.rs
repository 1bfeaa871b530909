//! End-to-end collection: resolve, locate, extract, normalize, filter.

use crate::domain::{ChatSession, ExtractionStats, Result, SearchPaths};

use super::extractor::{ChatDataExtractor, Extraction};
use super::locator::StoreLocator;
use super::normalizer::normalize;
use super::resolver::WorkspaceResolver;

/// Options for chat extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    /// Skip workspace resolution and search only editor-wide locations.
    pub global_only: bool,
    /// Merge every location instead of stopping at the first with data.
    pub all_locations: bool,
    /// Filter to specific session IDs (partial match).
    pub session_ids: Option<Vec<String>>,
    /// Minimum number of messages to include a session.
    pub min_messages: usize,
    /// Include messages with empty text.
    pub include_empty: bool,
}

/// Collects normalized sessions for a project folder.
///
/// Locations are searched in priority order; the first one yielding messages
/// wins unless [`ExtractOptions::all_locations`] is set. Finding nothing is
/// not an error: the result is simply empty.
///
/// # Errors
/// Currently infallible; reserved for failures that must abort the run.
pub fn collect_sessions(
    paths: &SearchPaths,
    target_folder: Option<&str>,
    options: &ExtractOptions,
) -> Result<(Vec<ChatSession>, ExtractionStats)> {
    let mut stats = ExtractionStats::default();

    let workspace_id = match target_folder {
        Some(folder) if !options.global_only => {
            WorkspaceResolver::new(&paths.workspace_storage).find_workspace_id(folder)
        }
        _ => None,
    };
    stats.workspace_id.clone_from(&workspace_id);

    let locations = StoreLocator::new(paths.clone()).locate(workspace_id.as_deref());
    let extractor = ChatDataExtractor::new();
    let mut records = Vec::new();

    for location in &locations {
        stats.locations_scanned += 1;

        let extraction = extractor.extract(location);
        if let Extraction::Failed(reason) = &extraction {
            stats.locations_failed += 1;
            tracing::warn!("Location {} failed: {}", location.path.display(), reason);
        }

        let found = extraction.found();
        records.extend(extraction.records());
        if found && !options.all_locations {
            break;
        }
    }

    let sessions: Vec<ChatSession> = normalize(records)
        .into_iter()
        .filter(|s| matches_filter(&s.session_id, options.session_ids.as_deref()))
        .map(|mut s| {
            if !options.include_empty {
                s.messages.retain(|m| !m.content.trim().is_empty());
            }
            s
        })
        .filter(|s| s.message_count() >= options.min_messages)
        .collect();

    for session in &sessions {
        stats.record_session(session);
    }

    tracing::info!(
        "Extracted {} sessions with {} messages",
        stats.session_count,
        stats.total_messages
    );

    Ok((sessions, stats))
}

/// Checks if an ID matches any of the filter patterns (partial match).
fn matches_filter(id: &str, filters: Option<&[String]>) -> bool {
    filters.map_or(true, |filters| filters.iter().any(|f| id.contains(f.as_str())))
}

//! Application layer - use cases and orchestration.
//!
//! This layer resolves workspaces, locates and extracts chat stores,
//! normalizes their content into sessions and formats the result.

pub mod extractor;
pub mod formatter;
pub mod locator;
pub mod normalizer;
pub mod parser;
pub mod pipeline;
pub mod resolver;

pub use formatter::{
    export_file_name, format_locations, format_session_markdown, format_sessions_table,
    format_stats, format_workspaces_table, render, OutputFormat, QUICK_EXPORT_FORMATS,
};
pub use locator::StoreLocator;
pub use pipeline::{collect_sessions, ExtractOptions};
pub use resolver::{project_name, WorkspaceResolver};

//! Domain layer - core types and pure logic.
//!
//! This layer contains the canonical chat models, configuration models,
//! path normalization and error types, without any database access.

pub mod config;
pub mod error;
pub mod models;
pub mod path;

pub use config::{AppConfig, SearchPaths};
pub use error::{AppError, Result};
pub use models::{
    ChatMessage, ChatSession, ExtractionStats, LocationKind, RawRecord, Role, StorageLocation,
    WorkspaceDescriptor, WorkspaceEntry,
};

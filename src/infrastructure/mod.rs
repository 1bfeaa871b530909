//! Infrastructure layer - external adapters (database, filesystem).
//!
//! This layer handles all I/O operations and external dependencies.

pub mod config;
pub mod editor_paths;
pub mod sniff;
pub mod sqlite_reader;

pub use config::{ensure_config_exists, load_config};
pub use editor_paths::find_editor_data_dir;
pub use sniff::{has_store_file, open_store, store_files, StoreFile, StoreFormat};
pub use sqlite_reader::StateDbReader;

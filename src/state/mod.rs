/// State management module
///
/// This module handles all persisted state:
/// - Upload record database and expiry sweep (library.rs)
/// - Shared data structures (data.rs)

pub mod data;
pub mod library;

pub use data::{ArtifactDirs, ImageRecord, SweepReport};
pub use library::Library;

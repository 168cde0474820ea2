//! Collabnet Common Library
//!
//! Shared code for the Collabnet pipelines including:
//! - Publication, author, and collaborator-table models
//! - Scopus transport abstraction
//! - Error types and handling
//! - Configuration management
//! - Metrics

pub mod config;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod scopus;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::{AppError, Result};
pub use models::{AuthorRecord, CollaboratorRow, Publication, SeedIdentity, UnifiedTable};
pub use scopus::ScopusTransport;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");


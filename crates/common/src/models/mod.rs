//! Data model shared by the harvest and analysis stages

pub mod publication;
pub mod seed;
pub mod table;

pub use publication::{AffiliationIds, AuthorRecord, Publication};
pub use seed::SeedIdentity;
pub use table::{write_records, CollaboratorRow, UnifiedTable};

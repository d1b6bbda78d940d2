//! Session storage backends for Branchloom.

pub mod file_backend;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use file_backend::FileStore;
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use branchloom_core::session::SessionSummary;

/// Most recently updated first; ties broken by id for a stable listing.
pub(crate) fn sort_summaries(summaries: &mut [SessionSummary]) {
    summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.0.cmp(&b.id.0)));
}

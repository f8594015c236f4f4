pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// Merge an incoming upsert with an existing row, preserving the store's
/// invariants: metrics are last-writer-wins, a present summary is never
/// replaced by an absent one, and the saved flag only moves forward through
/// upserts (it is cleared via `mark_saved`).
pub(crate) fn merge_articles(
    existing: &md_core::Article,
    incoming: &md_core::Article,
) -> md_core::Article {
    let mut merged = incoming.clone();
    if merged.summary.is_none() {
        merged.summary = existing.summary.clone();
        merged.digest = existing.digest.clone();
    }
    if merged.raw_text.is_none() {
        merged.raw_text = existing.raw_text.clone();
    }
    merged.saved = existing.saved || incoming.saved;
    merged
}

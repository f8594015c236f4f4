use md_core::{cosine_similarity, IndexFilter, SearchHit, VectorRecord};

pub mod backends;

pub use backends::*;

/// Rank candidate records against a query embedding. The filter is applied
/// before the top-k cut, so `k` always counts post-filter results. Ties on
/// score break by ascending article id for reproducible ordering.
pub(crate) fn rank_records<'a>(
    records: impl Iterator<Item = &'a VectorRecord>,
    embedding: &[f32],
    k: usize,
    filter: Option<&IndexFilter>,
) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = records
        .filter(|r| filter.map_or(true, |f| f.matches(r)))
        .map(|r| SearchHit {
            article_id: r.article_id.clone(),
            score: cosine_similarity(embedding, &r.embedding),
            user_note: r.user_note.clone(),
            user_tags: r.user_tags.clone(),
            created_at: r.created_at,
        })
        .collect();
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.article_id.cmp(&b.article_id))
    });
    hits.truncate(k);
    hits
}

pub mod prelude {
    pub use super::backends::*;
    pub use md_core::{IndexFilter, IndexStats, Result, SearchHit, VectorIndex, VectorRecord};
}

//! Trust-aware reranking.

use crate::models::{RetrievedChunk, TrustLevel};

/// Stable partition of retrieved results by trust level: high-trust chunks
/// first, everything else after, with each group keeping its original
/// relative (similarity) order. High-trust content is therefore always
/// surfaced to generation ahead of lower-trust content regardless of raw
/// similarity rank.
pub fn trust_rerank(results: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    let (mut high, low): (Vec<_>, Vec<_>) = results
        .into_iter()
        .partition(|c| c.trust_level == TrustLevel::High);
    high.extend(low);
    high
}

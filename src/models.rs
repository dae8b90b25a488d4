//! Core data types flowing through the guard pipeline.

/// Coarse trust classification attached to a document at ingestion and
/// propagated to every derived chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustLevel {
    High,
    Low,
}

impl TrustLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::High => "high",
            TrustLevel::Low => "low",
        }
    }

    /// Anything that is not explicitly "high" is treated as low trust.
    pub fn parse(s: &str) -> TrustLevel {
        if s == "high" {
            TrustLevel::High
        } else {
            TrustLevel::Low
        }
    }
}

impl std::fmt::Display for TrustLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw document loaded from the corpus, before chunking.
///
/// Immutable once created; a re-ingestion under the same content hash is
/// always skipped, never re-added.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source identifier (the corpus-relative file name).
    pub source: String,
    pub text: String,
    /// Stable SHA-256 digest of the UTF-8 text; the dedup key.
    pub hash: String,
    pub trust_level: TrustLevel,
}

/// A chunk of a document ready for storage, carrying its parent's full
/// provenance metadata.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub id: String,
    pub doc_hash: String,
    pub source: String,
    pub trust_level: TrustLevel,
    pub chunk_index: i64,
    pub text: String,
}

/// A chunk returned by the vector store for one query. Transient: exists
/// only for the duration of that query.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source: String,
    pub trust_level: TrustLevel,
    pub doc_hash: String,
    pub text: String,
    /// Cosine similarity to the query at retrieval time.
    pub score: f32,
}

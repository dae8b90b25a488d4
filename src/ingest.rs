//! Ingestion gate.
//!
//! Loads the document corpus, binds each document to a trust level,
//! deduplicates by content hash against what the store already holds, and
//! writes chunks-with-provenance plus embeddings. Every decision, added or
//! skipped, lands in the audit ledger. No document is ever stored twice
//! under the same hash, even when the same bytes arrive under two
//! different file names in one batch.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::audit::{AuditKind, AuditLog};
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::{ChunkRecord, Document};
use crate::store::VectorStore;
use crate::trust::{self, TrustClassifier};

/// Stable content hash of a document's UTF-8 text: the dedup key.
pub fn compute_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Load all matching documents from the corpus directory, with trust
/// assigned up front. The corpus-relative path is the source identifier.
pub fn load_corpus(config: &Config, classifier: &dyn TrustClassifier) -> Result<Vec<Document>> {
    let root = &config.corpus.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.corpus.include_globs)?;
    let exclude_set = build_globset(&config.corpus.exclude_globs)?;

    let mut docs = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
            continue;
        }

        let text = std::fs::read_to_string(path)?;
        let hash = compute_hash(&text);
        let trust_level = classifier.classify(&rel_str, &text);

        docs.push(Document {
            source: rel_str,
            text,
            hash,
            trust_level,
        });
    }

    // Sort for deterministic ordering
    docs.sort_by(|a, b| a.source.cmp(&b.source));

    Ok(docs)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[derive(Debug, Default)]
pub struct IngestSummary {
    pub scanned: usize,
    pub added: usize,
    pub skipped: usize,
    pub chunks_written: usize,
}

/// Run the gate over a document batch: dedup, audit, chunk, embed, store.
pub async fn ingest_documents(
    store: &VectorStore,
    audit: &AuditLog,
    embedder: &dyn EmbeddingProvider,
    docs: &[Document],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Result<IngestSummary> {
    let mut stored_hashes = store.existing_hashes().await?;
    let mut summary = IngestSummary {
        scanned: docs.len(),
        ..Default::default()
    };

    for doc in docs {
        if stored_hashes.contains(&doc.hash) {
            audit.record(
                AuditKind::Duplicate,
                Some(doc.source.as_str()),
                Some(doc.hash.as_str()),
                "skipped",
            )?;
            summary.skipped += 1;
            continue;
        }

        audit.record(
            AuditKind::Ingest,
            Some(doc.source.as_str()),
            Some(doc.hash.as_str()),
            "added",
        )?;

        let chunks: Vec<ChunkRecord> = chunk_text(&doc.text, chunk_size, chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(index, text)| ChunkRecord {
                id: Uuid::new_v4().to_string(),
                doc_hash: doc.hash.clone(),
                source: doc.source.clone(),
                trust_level: doc.trust_level,
                chunk_index: index as i64,
                text,
            })
            .collect();

        let mut vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            vectors.push(embedder.embed(&chunk.text).await?);
        }

        store.add_document(doc, &chunks, &vectors).await?;
        stored_hashes.insert(doc.hash.clone());
        summary.added += 1;
        summary.chunks_written += chunks.len();
    }

    Ok(summary)
}

/// Run the ingest command end to end.
pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    let classifier = trust::create_classifier(&config.trust)?;
    let docs = load_corpus(config, classifier.as_ref())?;

    if dry_run {
        let total_chunks: usize = docs
            .iter()
            .map(|d| {
                chunk_text(
                    &d.text,
                    config.chunking.chunk_size,
                    config.chunking.chunk_overlap,
                )
                .len()
            })
            .sum();
        println!("ingest (dry-run)");
        println!("  documents found: {}", docs.len());
        println!("  estimated chunks: {}", total_chunks);
        return Ok(());
    }

    let store = VectorStore::connect(&config.db.path).await?;
    store.migrate().await?;

    let embedder = embedding::create_embedder(&config.embedding)?;
    let audit = AuditLog::new(&config.ledger.path);

    let summary = ingest_documents(
        &store,
        &audit,
        embedder.as_ref(),
        &docs,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )
    .await?;

    println!("ingest");
    println!("  documents scanned: {}", summary.scanned);
    println!("  added: {}", summary.added);
    println!("  duplicates skipped: {}", summary.skipped);
    println!("  chunks written: {}", summary.chunks_written);
    println!("ok");

    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TrustLevel;
    use async_trait::async_trait;

    struct CountingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn doc(source: &str, text: &str, trust: TrustLevel) -> Document {
        Document {
            source: source.to_string(),
            text: text.to_string(),
            hash: compute_hash(text),
            trust_level: trust,
        }
    }

    #[test]
    fn test_compute_hash_is_stable() {
        assert_eq!(compute_hash("abc"), compute_hash("abc"));
        assert_ne!(compute_hash("abc"), compute_hash("abd"));
        // SHA-256 hex digest
        assert_eq!(compute_hash("").len(), 64);
    }

    #[tokio::test]
    async fn test_same_bytes_different_name_deduplicated_in_one_batch() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(&tmp.path().join("store.sqlite"))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        let audit = AuditLog::new(&tmp.path().join("audit.jsonl"));

        let docs = vec![
            doc("original.txt", "identical content", TrustLevel::High),
            doc("copy.txt", "identical content", TrustLevel::High),
        ];

        let summary = ingest_documents(&store, &audit, &CountingEmbedder, &docs, 1200, 200)
            .await
            .unwrap();

        assert_eq!(summary.added, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.count_chunks().await.unwrap(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_reingest_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let store = VectorStore::connect(&tmp.path().join("store.sqlite"))
            .await
            .unwrap();
        store.migrate().await.unwrap();
        let audit = AuditLog::new(&tmp.path().join("audit.jsonl"));

        let docs = vec![doc("a.txt", "some policy text", TrustLevel::High)];

        let first = ingest_documents(&store, &audit, &CountingEmbedder, &docs, 1200, 200)
            .await
            .unwrap();
        assert_eq!(first.added, 1);

        let second = ingest_documents(&store, &audit, &CountingEmbedder, &docs, 1200, 200)
            .await
            .unwrap();
        assert_eq!(second.added, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(store.count_chunks().await.unwrap(), 1);

        // One ingest/added and one duplicate/skipped in the ledger
        let log = std::fs::read_to_string(tmp.path().join("audit.jsonl")).unwrap();
        let events: Vec<serde_json::Value> = log
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(
            events.iter().filter(|e| e["event"] == "ingest").count(),
            1
        );
        assert_eq!(
            events.iter().filter(|e| e["event"] == "duplicate").count(),
            1
        );

        store.close().await;
    }

    #[test]
    fn test_load_corpus_applies_globs_and_trust() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("corpus");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("good_policy.txt"), "official rules").unwrap();
        std::fs::write(root.join("poisoned_policy.txt"), "injected rules").unwrap();
        std::fs::write(root.join("notes.bin"), "ignored").unwrap();

        let config_toml = format!(
            r#"
[db]
path = "{}/store.sqlite"

[corpus]
root = "{}"
"#,
            tmp.path().display(),
            root.display()
        );
        let config: Config = toml::from_str(&config_toml).unwrap();
        let classifier = trust::create_classifier(&config.trust).unwrap();

        let docs = load_corpus(&config, classifier.as_ref()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].source, "good_policy.txt");
        assert_eq!(docs[0].trust_level, TrustLevel::High);
        assert_eq!(docs[1].source, "poisoned_policy.txt");
        assert_eq!(docs[1].trust_level, TrustLevel::Low);
    }
}

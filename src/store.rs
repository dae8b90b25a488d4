//! SQLite-backed vector store.
//!
//! Stores documents, chunks-with-provenance-metadata, and embedding vectors.
//! Retrieval is an exact brute-force cosine scan over all stored vectors.
//! Vectors are stored as little-endian `f32` BLOBs.

use anyhow::{bail, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;

use crate::models::{ChunkRecord, Document, RetrievedChunk, TrustLevel};
use crate::vecmath::cosine_similarity;

/// Provenance metadata for one stored chunk, as returned by [`VectorStore::get_all`].
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub chunk_id: String,
    pub source: String,
    pub trust_level: TrustLevel,
    pub doc_hash: String,
}

/// The full stored collection: texts, metadata, and embeddings, index-aligned.
#[derive(Debug)]
pub struct Collection {
    pub texts: Vec<String>,
    pub metadata: Vec<ChunkMeta>,
    pub embeddings: Vec<Vec<f32>>,
}

pub struct VectorStore {
    pool: SqlitePool,
}

impl VectorStore {
    /// Open (creating if missing) the store database.
    pub async fn connect(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Open the store, failing if it has not been created yet.
    pub async fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            bail!(
                "No vector store found at {} (run: sentinel init && sentinel ingest)",
                db_path.display()
            );
        }
        Self::connect(db_path).await
    }

    /// Create the schema. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                hash TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                trust_level TEXT NOT NULL,
                ingested_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                doc_hash TEXT NOT NULL,
                source TEXT NOT NULL,
                trust_level TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                text TEXT NOT NULL,
                UNIQUE(doc_hash, chunk_index),
                FOREIGN KEY (doc_hash) REFERENCES documents(hash)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS chunk_vectors (
                chunk_id TEXT PRIMARY KEY,
                embedding BLOB NOT NULL,
                FOREIGN KEY (chunk_id) REFERENCES chunks(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_doc_hash ON chunks(doc_hash)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Content hashes of all stored documents: the dedup set.
    pub async fn existing_hashes(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query("SELECT hash FROM documents")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<String, _>("hash")).collect())
    }

    /// Store one document with its chunks and their embedding vectors, in a
    /// single transaction. Chunks and vectors must be index-aligned.
    pub async fn add_document(
        &self,
        doc: &Document,
        chunks: &[ChunkRecord],
        vectors: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != vectors.len() {
            bail!(
                "chunk/vector count mismatch: {} chunks, {} vectors",
                chunks.len(),
                vectors.len()
            );
        }

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO documents (hash, source, trust_level, ingested_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&doc.hash)
        .bind(&doc.source)
        .bind(doc.trust_level.as_str())
        .bind(chrono::Utc::now().timestamp())
        .execute(&mut *tx)
        .await?;

        for (chunk, vector) in chunks.iter().zip(vectors.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunks (id, doc_hash, source, trust_level, chunk_index, text)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.doc_hash)
            .bind(&chunk.source)
            .bind(chunk.trust_level.as_str())
            .bind(chunk.chunk_index)
            .bind(&chunk.text)
            .execute(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO chunk_vectors (chunk_id, embedding) VALUES (?, ?)")
                .bind(&chunk.id)
                .bind(vec_to_blob(vector))
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Nearest-neighbor query: cosine similarity against every stored
    /// vector, top `k` by score (chunk id breaks ties deterministically).
    pub async fn query(&self, query_vec: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source, c.trust_level, c.doc_hash, c.text, v.embedding
            FROM chunks c
            JOIN chunk_vectors v ON v.chunk_id = c.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut results: Vec<RetrievedChunk> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                RetrievedChunk {
                    chunk_id: row.get("id"),
                    source: row.get("source"),
                    trust_level: TrustLevel::parse(&row.get::<String, _>("trust_level")),
                    doc_hash: row.get("doc_hash"),
                    text: row.get("text"),
                    score: cosine_similarity(query_vec, &vector),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        results.truncate(k);

        Ok(results)
    }

    /// Read the whole collection, index-aligned, for batch analysis.
    pub async fn get_all(&self) -> Result<Collection> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.source, c.trust_level, c.doc_hash, c.text, v.embedding
            FROM chunks c
            JOIN chunk_vectors v ON v.chunk_id = c.id
            ORDER BY c.doc_hash, c.chunk_index
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut texts = Vec::with_capacity(rows.len());
        let mut metadata = Vec::with_capacity(rows.len());
        let mut embeddings = Vec::with_capacity(rows.len());

        for row in &rows {
            texts.push(row.get::<String, _>("text"));
            metadata.push(ChunkMeta {
                chunk_id: row.get("id"),
                source: row.get("source"),
                trust_level: TrustLevel::parse(&row.get::<String, _>("trust_level")),
                doc_hash: row.get("doc_hash"),
            });
            let blob: Vec<u8> = row.get("embedding");
            embeddings.push(blob_to_vec(&blob));
        }

        Ok(Collection {
            texts,
            metadata,
            embeddings,
        })
    }

    pub async fn count_chunks(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// Encode a float vector as little-endian `f32` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode little-endian `f32` bytes back into a vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

//! Append-only provenance ledger.
//!
//! Records one self-describing JSON object per line for every ingestion,
//! duplicate, and guard decision. Records are flushed and synced before the
//! call returns, so a crash after an append cannot lose the record. The
//! ledger is write-only from the pipeline's perspective: forensic analysis
//! happens offline with standard JSONL tooling.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Event kinds recorded in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// A new document was ingested and stored.
    Ingest,
    /// A document with an already-stored content hash was skipped.
    Duplicate,
    /// A retrieval-pattern drift alert was surfaced.
    Drift,
    /// A context guard alert was surfaced.
    Guard,
    /// A mutation detector warning was surfaced.
    Mutation,
    /// An embedding outlier scan completed.
    OutlierScan,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Ingest => "ingest",
            AuditKind::Duplicate => "duplicate",
            AuditKind::Drift => "drift",
            AuditKind::Guard => "guard",
            AuditKind::Mutation => "mutation",
            AuditKind::OutlierScan => "outlier_scan",
        }
    }
}

/// Handle to the append-only audit log file.
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Append a single event record. One record per call, never batched,
    /// never reordered. The write is synced to disk before returning.
    pub fn record(
        &self,
        kind: AuditKind,
        source: Option<&str>,
        doc_hash: Option<&str>,
        status: &str,
    ) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            "event": kind.as_str(),
            "source": source,
            "doc_hash": doc_hash,
            "status": status,
        });

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open audit log: {}", self.path.display()))?;

        writeln!(file, "{}", entry)?;
        file.flush()?;
        file.sync_all()?;

        Ok(())
    }
}

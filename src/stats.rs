//! Retrieval statistics tracking and drift detection.
//!
//! Persists per-source retrieval counts across sessions as a JSON mapping
//! and checks two drift signals on every query:
//!
//! 1. **Dominance**: a single source accounting for more than the
//!    configured share of all hits across many distinct queries.
//! 2. **Novelty**: a source appearing in top-k results with zero retrieval
//!    history.
//!
//! Counts are monotonically non-decreasing; the file is rewritten atomically
//! on each update.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A retrieval-pattern drift alert.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftAlert {
    /// One source exceeds the dominance share of all recorded hits.
    Dominance { source: String, ratio: f64 },
    /// A retrieved source has no retrieval history at all.
    NewSource { source: String },
}

impl std::fmt::Display for DriftAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriftAlert::Dominance { source, ratio } => write!(
                f,
                "DRIFT SUSPECTED: '{}' is too dominant ({:.1}% of all retrieval hits)",
                source,
                ratio * 100.0
            ),
            DriftAlert::NewSource { source } => write!(
                f,
                "NEW SOURCE: '{}' has not appeared in retrieval stats before",
                source
            ),
        }
    }
}

/// Per-source cumulative retrieval counts, persisted as a JSON object.
pub struct RetrievalStats {
    path: PathBuf,
    counts: BTreeMap<String, u64>,
}

impl RetrievalStats {
    /// Load stats from disk. A missing or unreadable file yields empty
    /// stats rather than an error.
    pub fn load(path: &Path) -> Self {
        let counts = std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        Self {
            path: path.to_path_buf(),
            counts,
        }
    }

    /// Increment the count for every source in the batch. A source
    /// appearing twice in one retrieval is counted twice.
    pub fn record_retrieval(&mut self, sources: &[String]) {
        for source in sources {
            *self.counts.entry(source.clone()).or_insert(0) += 1;
        }
    }

    /// Persist the full mapping. The write is atomic: a temp file in the
    /// same directory is renamed over the target.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.counts)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write stats file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace stats file: {}", self.path.display()))?;

        Ok(())
    }

    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// Evaluate both drift checks against the current retrieval batch.
    /// Both checks always run; their alerts are concatenated. An empty
    /// result means no drift was detected.
    pub fn detect_drift(&self, current_sources: &[String], dominance_threshold: f64) -> Vec<DriftAlert> {
        if self.counts.is_empty() {
            return Vec::new();
        }

        let total = self.total();
        let mut alerts = Vec::new();

        for (source, count) in &self.counts {
            let ratio = *count as f64 / total as f64;
            if ratio > dominance_threshold {
                alerts.push(DriftAlert::Dominance {
                    source: source.clone(),
                    ratio,
                });
            }
        }

        for source in current_sources {
            if !self.counts.contains_key(source) {
                alerts.push(DriftAlert::NewSource {
                    source: source.clone(),
                });
            }
        }

        alerts
    }
}

/// Print a summary of the persisted retrieval statistics.
pub fn run_stats(config: &crate::config::Config) -> Result<()> {
    let stats = RetrievalStats::load(&config.stats.path);
    let total = stats.total();

    println!("RAG Sentinel — Retrieval Stats");
    println!("==============================");
    println!();
    println!("  Stats file:  {}", config.stats.path.display());
    println!("  Total hits:  {}", total);

    if !stats.counts().is_empty() {
        println!();
        println!("  {:<40} {:>8} {:>8}", "SOURCE", "HITS", "SHARE");
        println!("  {}", "-".repeat(58));
        for (source, count) in stats.counts() {
            let share = if total > 0 {
                *count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            println!("  {:<40} {:>8} {:>7.1}%", source, count, share);
        }
    }

    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let stats = RetrievalStats::load(&tmp.path().join("absent.json"));
        assert!(stats.counts().is_empty());
        assert_eq!(stats.total(), 0);
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stats.json");
        std::fs::write(&path, "{not valid json").unwrap();
        let stats = RetrievalStats::load(&path);
        assert!(stats.counts().is_empty());
    }

    #[test]
    fn test_record_and_save_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("stats.json");

        let mut stats = RetrievalStats::load(&path);
        stats.record_retrieval(&[
            "a.txt".to_string(),
            "b.txt".to_string(),
            "a.txt".to_string(),
        ]);
        stats.save().unwrap();

        let reloaded = RetrievalStats::load(&path);
        assert_eq!(reloaded.counts()["a.txt"], 2);
        assert_eq!(reloaded.counts()["b.txt"], 1);
        assert_eq!(reloaded.total(), 3);
    }

    #[test]
    fn test_counts_are_monotonic_across_batches() {
        let tmp = tempfile::tempdir().unwrap();
        let mut stats = RetrievalStats::load(&tmp.path().join("stats.json"));
        stats.record_retrieval(&["a.txt".to_string()]);
        stats.record_retrieval(&["a.txt".to_string()]);
        assert_eq!(stats.counts()["a.txt"], 2);
    }

    #[test]
    fn test_dominance_alert() {
        let tmp = tempfile::tempdir().unwrap();
        let mut stats = RetrievalStats::load(&tmp.path().join("stats.json"));
        let batch: Vec<String> = std::iter::repeat("a.txt".to_string())
            .take(96)
            .chain(std::iter::repeat("b.txt".to_string()).take(4))
            .collect();
        stats.record_retrieval(&batch);

        let alerts = stats.detect_drift(&[], 0.95);
        assert_eq!(alerts.len(), 1);
        match &alerts[0] {
            DriftAlert::Dominance { source, ratio } => {
                assert_eq!(source, "a.txt");
                assert!((ratio - 0.96).abs() < 1e-9);
            }
            other => panic!("unexpected alert: {:?}", other),
        }
    }

    #[test]
    fn test_novelty_alert() {
        let tmp = tempfile::tempdir().unwrap();
        let mut stats = RetrievalStats::load(&tmp.path().join("stats.json"));
        stats.record_retrieval(&vec!["a.txt".to_string(); 10]);

        let alerts = stats.detect_drift(&["a.txt".to_string(), "c.txt".to_string()], 0.95);
        // a.txt is dominant (100%) and c.txt is new
        assert!(alerts
            .iter()
            .any(|a| matches!(a, DriftAlert::NewSource { source } if source == "c.txt")));
        assert!(!alerts
            .iter()
            .any(|a| matches!(a, DriftAlert::NewSource { source } if source == "a.txt")));
    }

    #[test]
    fn test_no_alerts_on_balanced_history() {
        let tmp = tempfile::tempdir().unwrap();
        let mut stats = RetrievalStats::load(&tmp.path().join("stats.json"));
        stats.record_retrieval(&["a.txt".to_string(), "b.txt".to_string()]);

        let alerts = stats.detect_drift(&["a.txt".to_string(), "b.txt".to_string()], 0.95);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_empty_history_yields_no_alerts() {
        let tmp = tempfile::tempdir().unwrap();
        let stats = RetrievalStats::load(&tmp.path().join("stats.json"));
        assert!(stats.detect_drift(&["x.txt".to_string()], 0.95).is_empty());
    }
}

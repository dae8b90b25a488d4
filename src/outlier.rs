//! Embedding-space outlier detection.
//!
//! Z-score scan over the norms of the full stored embedding collection.
//! Poisoned or adversarially crafted embeddings frequently have anomalous
//! magnitude relative to the legitimate corpus, even when their direction
//! is designed to evade similarity checks. This is a batch operation meant
//! to run periodically over the whole store, not per query.

use anyhow::Result;

use crate::audit::{AuditKind, AuditLog};
use crate::config::Config;
use crate::store::VectorStore;
use crate::vecmath::l2_norm;

/// Guards the z-score denominator when all norms are identical.
const Z_EPSILON: f32 = 1e-8;

/// Result of one outlier scan: flagged indices plus the per-vector norms
/// and z-scores they were derived from, index-aligned with the input.
#[derive(Debug)]
pub struct OutlierReport {
    pub outliers: Vec<usize>,
    pub norms: Vec<f32>,
    pub z_scores: Vec<f32>,
}

/// Flag vectors whose norm deviates from the population mean by more than
/// `threshold` standard deviations (population std, like the reference
/// statistics).
pub fn detect_outliers(vectors: &[Vec<f32>], threshold: f32) -> OutlierReport {
    let norms: Vec<f32> = vectors.iter().map(|v| l2_norm(v)).collect();

    if norms.is_empty() {
        return OutlierReport {
            outliers: Vec::new(),
            norms,
            z_scores: Vec::new(),
        };
    }

    let n = norms.len() as f32;
    let mean = norms.iter().sum::<f32>() / n;
    let variance = norms.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / n;
    let std = variance.sqrt();

    let z_scores: Vec<f32> = norms.iter().map(|x| (x - mean) / (std + Z_EPSILON)).collect();

    let outliers = z_scores
        .iter()
        .enumerate()
        .filter(|(_, z)| z.abs() > threshold)
        .map(|(i, _)| i)
        .collect();

    OutlierReport {
        outliers,
        norms,
        z_scores,
    }
}

/// Run the scan command: read the full collection, report per-chunk norms
/// and z-scores, and list suspicious chunks.
pub async fn run_scan(config: &Config, threshold_override: Option<f32>) -> Result<()> {
    let threshold = threshold_override.unwrap_or(config.guard.outlier_threshold);
    let store = VectorStore::open_existing(&config.db.path).await?;
    let collection = store.get_all().await?;

    if collection.embeddings.is_empty() {
        println!("scan");
        println!("  no stored embeddings (run: sentinel ingest)");
        store.close().await;
        return Ok(());
    }

    let report = detect_outliers(&collection.embeddings, threshold);

    println!("scan");
    println!("  stored chunks: {}", collection.embeddings.len());
    println!("  threshold: {:.1} standard deviations", threshold);
    println!();
    println!("  EMBEDDING ANALYSIS:");
    for (i, meta) in collection.metadata.iter().enumerate() {
        println!(
            "  [{}] {} (trust={})  norm={:.2}  z={:.2}",
            i, meta.source, meta.trust_level, report.norms[i], report.z_scores[i]
        );
    }
    println!();

    let audit = AuditLog::new(&config.ledger.path);

    if report.outliers.is_empty() {
        println!("  no outliers — embedding space looks clean");
        audit.record(AuditKind::OutlierScan, None, None, "clean")?;
    } else {
        println!("  POISONING SUSPICION — outliers detected:");
        for &idx in &report.outliers {
            let meta = &collection.metadata[idx];
            println!(
                "    chunk #{} from '{}' (z={:.2})",
                idx, meta.source, report.z_scores[idx]
            );
            audit.record(
                AuditKind::OutlierScan,
                Some(meta.source.as_str()),
                Some(meta.doc_hash.as_str()),
                &format!("outlier z={:.2}", report.z_scores[idx]),
            )?;
        }
    }

    store.close().await;
    Ok(())
}

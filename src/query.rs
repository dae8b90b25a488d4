//! Guarded query pipeline.
//!
//! Runs one question through the full guard stack:
//! retrieval → trust reranking → retrieval-drift tracking → context guard →
//! mutation detection → answer generation over the reranked context.
//!
//! All guard stages are advisory: alerts are printed and written to the
//! audit ledger, but never abort the pipeline (WARN mode). Only
//! configuration and collaborator failures stop a run.

use anyhow::{bail, Result};

use crate::audit::{AuditKind, AuditLog};
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::generation::{self, GenerationProvider};
use crate::guard::{self, Baseline, GuardAlert};
use crate::models::RetrievedChunk;
use crate::mutation::{self, MutationWarning};
use crate::rerank::trust_rerank;
use crate::stats::{DriftAlert, RetrievalStats};
use crate::store::VectorStore;

/// Everything one guarded query produced, for reporting.
#[derive(Debug)]
pub struct QueryOutcome {
    pub question: String,
    /// Reranked context, exactly as passed to answer generation.
    pub context: Vec<RetrievedChunk>,
    pub drift_alerts: Vec<DriftAlert>,
    pub guard_alert: Option<GuardAlert>,
    pub mutation_warning: Option<MutationWarning>,
    pub answer: String,
}

fn build_answer_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an internal AI Security assistant.

Answer the following question briefly and with a strong security focus,
using ONLY the policy context provided.

[CONTEXT]
{context}

[QUESTION]
{question}

[ANSWER]
"
    )
}

/// Run the full guarded pipeline for one question.
pub async fn answer_query(
    config: &Config,
    store: &VectorStore,
    embedder: &dyn EmbeddingProvider,
    generator: &dyn GenerationProvider,
    audit: &AuditLog,
    question: &str,
    top_k: usize,
) -> Result<QueryOutcome> {
    // Retrieve
    let query_vec = embedder.embed(question).await?;
    let results = store.query(&query_vec, top_k).await?;
    if results.is_empty() {
        bail!("No indexed content to retrieve (run: sentinel ingest)");
    }

    // Trust-aware reranking
    let context = trust_rerank(results);
    let sources: Vec<String> = context.iter().map(|c| c.source.clone()).collect();

    // Drift monitoring. Detection runs against the history as it stood
    // before this batch, so the novelty check can fire; the batch is
    // recorded afterwards.
    let mut stats = RetrievalStats::load(&config.stats.path);
    let drift_alerts = stats.detect_drift(&sources, config.guard.dominance_threshold);
    stats.record_retrieval(&sources);
    stats.save()?;

    for alert in &drift_alerts {
        let source = match alert {
            DriftAlert::Dominance { source, .. } => source,
            DriftAlert::NewSource { source } => source,
        };
        audit.record(AuditKind::Drift, Some(source.as_str()), None, &alert.to_string())?;
    }

    // Context guard (blocklist + baseline drift)
    let baseline = Baseline::load(&config.baseline.path)?;
    let guard_alert = guard::check_context(
        &context,
        embedder,
        baseline.as_ref(),
        &config.guard.blocklist,
        config.guard.drift_floor,
    )
    .await?;

    if let Some(alert) = &guard_alert {
        if !alert.is_config_error() {
            audit.record(AuditKind::Guard, None, None, &alert.to_string())?;
        }
    }

    // Mutation detector
    let mutation_warning =
        mutation::analyze_chunks(&context, generator, &config.guard.red_flags).await?;
    if let Some(warning) = &mutation_warning {
        audit.record(AuditKind::Mutation, None, None, &warning.verdict)?;
    }

    // Answer generation over the reranked context. Alerts above never
    // block this step.
    let combined = context
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    let answer = generator
        .complete(&build_answer_prompt(&combined, question))
        .await?;

    Ok(QueryOutcome {
        question: question.to_string(),
        context,
        drift_alerts,
        guard_alert,
        mutation_warning,
        answer,
    })
}

/// Run the query command and print the report.
pub async fn run_query(config: &Config, question: &str, top_k: Option<usize>) -> Result<()> {
    let store = VectorStore::open_existing(&config.db.path).await?;
    let embedder = embedding::create_embedder(&config.embedding)?;
    let generator = generation::create_generator(&config.generation)?;
    let audit = AuditLog::new(&config.ledger.path);
    let k = top_k.unwrap_or(config.retrieval.top_k);

    let outcome = answer_query(
        config,
        &store,
        embedder.as_ref(),
        generator.as_ref(),
        &audit,
        question,
        k,
    )
    .await?;

    println!("QUESTION:");
    println!("  {}", outcome.question);
    println!();
    println!("RETRIEVED CONTEXT:");
    for chunk in &outcome.context {
        let preview: String = chunk.text.chars().take(120).collect();
        println!(
            "  [{}] trust={} score={:.2}",
            chunk.source, chunk.trust_level, chunk.score
        );
        println!("      {}", preview.replace('\n', " "));
    }
    println!();

    if outcome.drift_alerts.is_empty() {
        println!("no retriever drift detected");
    } else {
        for alert in &outcome.drift_alerts {
            println!("DRIFT ALERT: {}", alert);
        }
    }

    if let Some(alert) = &outcome.guard_alert {
        if alert.is_config_error() {
            eprintln!("configuration: {}", alert);
        } else {
            println!("CONTEXT GUARD: {}", alert);
            println!("context looks suspicious, continuing in WARN mode");
        }
    }

    if let Some(warning) = &outcome.mutation_warning {
        println!("{}", warning);
        println!("generation is not stopped, continuing in WARN mode");
    }

    println!();
    println!("ANSWER:");
    println!("{}", outcome.answer);

    store.close().await;
    Ok(())
}

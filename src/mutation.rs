//! Content mutation detection.
//!
//! Submits the combined retrieved context to the generation backend with a
//! fixed auditor instruction, then applies two independent local rules to
//! the reply: red-flag phrase containment and an `UNSAFE` verdict prefix.
//! The reply is not guaranteed to follow the requested format; the local
//! rules run on it regardless. Either rule firing produces a warning.

use anyhow::Result;

use crate::generation::GenerationProvider;
use crate::models::RetrievedChunk;

/// Warning that the retrieved context reads as a mutated or overly
/// permissive version of expected policy language. Carries the
/// classifier's raw reply.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationWarning {
    pub verdict: String,
}

impl std::fmt::Display for MutationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MUTATION WARNING: {}", self.verdict)
    }
}

/// Fixed classification instruction sent to the generation backend.
fn build_audit_prompt(context: &str) -> String {
    format!(
        "You are an AI Security auditor.

Analyze the following context and determine whether it contains any
policy-violating or overly permissive content related to passwords,
secrets, or security controls.

[CONTEXT]
{context}

Your task:
- If the context is safe, answer exactly:
  SAFE
- If the context is unsafe, answer:
  UNSAFE: <very short explanation>

Do not add any extra commentary."
    )
}

/// Classify the retrieved context. Returns `Ok(None)` when neither the
/// classifier verdict nor the local heuristic flags anything.
pub async fn analyze_chunks(
    chunks: &[RetrievedChunk],
    generator: &dyn GenerationProvider,
    red_flags: &[String],
) -> Result<Option<MutationWarning>> {
    if chunks.is_empty() {
        return Ok(None);
    }

    let combined = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let reply = generator.complete(&build_audit_prompt(&combined)).await?;
    let verdict = reply.trim().to_string();
    let verdict_lower = verdict.to_lowercase();

    // Rule (a): explicit red-flag phrasing anywhere in the reply.
    if red_flags
        .iter()
        .any(|flag| verdict_lower.contains(&flag.to_lowercase()))
    {
        return Ok(Some(MutationWarning { verdict }));
    }

    // Rule (b): the model says UNSAFE, in whatever casing it chose.
    if verdict_lower.starts_with("unsafe") {
        return Ok(Some(MutationWarning { verdict }));
    }

    Ok(None)
}

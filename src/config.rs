use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: ProviderConfig,
    #[serde(default)]
    pub generation: ProviderConfig,
    #[serde(default)]
    pub trust: TrustConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub baseline: BaselineConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.txt".to_string(), "**/*.md".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1200
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

/// Shared configuration shape for the embedding and generation backends.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            model: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ProviderConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_base_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct TrustConfig {
    /// Classifier strategy: `naming-convention`, `allowlist-registry`,
    /// or `signed-manifest`.
    #[serde(default = "default_classifier")]
    pub classifier: String,
    /// Source names containing any of these markers are classified low
    /// (naming-convention only).
    #[serde(default = "default_untrusted_markers")]
    pub untrusted_markers: Vec<String>,
    /// Sources granted high trust (allowlist-registry only).
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// TOML file mapping source name to expected SHA-256 digest
    /// (signed-manifest only).
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            classifier: default_classifier(),
            untrusted_markers: default_untrusted_markers(),
            allowlist: Vec::new(),
            manifest: None,
        }
    }
}

fn default_classifier() -> String {
    "naming-convention".to_string()
}
fn default_untrusted_markers() -> Vec<String> {
    vec!["poisoned".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardConfig {
    /// A source exceeding this share of all retrieval hits is flagged dominant.
    #[serde(default = "default_dominance_threshold")]
    pub dominance_threshold: f64,
    /// Embedding norms more than this many standard deviations from the
    /// population mean are flagged as outliers.
    #[serde(default = "default_outlier_threshold")]
    pub outlier_threshold: f32,
    /// Context similarity to the baseline below this value is flagged as
    /// drift. Deliberately permissive for small corpora.
    #[serde(default = "default_drift_floor")]
    pub drift_floor: f32,
    /// Override/jailbreak phrases scanned for in retrieved context.
    #[serde(default = "default_blocklist")]
    pub blocklist: Vec<String>,
    /// Phrases in a classifier reply that indicate unsafe policy exceptions.
    #[serde(default = "default_red_flags")]
    pub red_flags: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            dominance_threshold: default_dominance_threshold(),
            outlier_threshold: default_outlier_threshold(),
            drift_floor: default_drift_floor(),
            blocklist: default_blocklist(),
            red_flags: default_red_flags(),
        }
    }
}

fn default_dominance_threshold() -> f64 {
    0.95
}
fn default_outlier_threshold() -> f32 {
    2.5
}
fn default_drift_floor() -> f32 {
    -0.40
}

fn default_blocklist() -> Vec<String> {
    [
        "ignore previous",
        "forget previous instructions",
        "system override",
        "developer mode",
        "jailbreak",
        "reset all safety rules",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_red_flags() -> Vec<String> {
    [
        "share your password",
        "password sharing",
        "it is allowed to share",
        "exception to the policy",
        "not strictly forbidden",
        "you may disclose",
        "you may hand over",
        "permitted to share",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("data/audit_log.jsonl")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_path")]
    pub path: PathBuf,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            path: default_stats_path(),
        }
    }
}

fn default_stats_path() -> PathBuf {
    PathBuf::from("data/retriever_stats.json")
}

#[derive(Debug, Deserialize, Clone)]
pub struct BaselineConfig {
    #[serde(default = "default_baseline_path")]
    pub path: PathBuf,
    /// Reference text the baseline embedding is built from.
    #[serde(default)]
    pub source: Option<PathBuf>,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            path: default_baseline_path(),
            source: None,
        }
    }
}

fn default_baseline_path() -> PathBuf {
    PathBuf::from("data/baseline_embedding.json")
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!("chunking.chunk_overlap must be < chunking.chunk_size");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    // Validate guard thresholds
    if !(0.0..=1.0).contains(&config.guard.dominance_threshold) {
        anyhow::bail!("guard.dominance_threshold must be in [0.0, 1.0]");
    }
    if config.guard.outlier_threshold <= 0.0 {
        anyhow::bail!("guard.outlier_threshold must be > 0");
    }
    if !(-1.0..=1.0).contains(&config.guard.drift_floor) {
        anyhow::bail!("guard.drift_floor must be in [-1.0, 1.0]");
    }

    // Validate providers
    for (section, provider) in [
        ("embedding", &config.embedding),
        ("generation", &config.generation),
    ] {
        match provider.provider.as_str() {
            "disabled" | "ollama" => {}
            other => anyhow::bail!(
                "Unknown {} provider: '{}'. Must be disabled or ollama.",
                section,
                other
            ),
        }
        if provider.is_enabled() && provider.model.is_none() {
            anyhow::bail!(
                "{}.model must be specified when provider is '{}'",
                section,
                provider.provider
            );
        }
    }

    // Validate trust classifier
    match config.trust.classifier.as_str() {
        "naming-convention" => {
            if config.trust.untrusted_markers.is_empty() {
                anyhow::bail!("trust.untrusted_markers must not be empty for naming-convention");
            }
        }
        "allowlist-registry" => {
            if config.trust.allowlist.is_empty() {
                anyhow::bail!("trust.allowlist must not be empty for allowlist-registry");
            }
        }
        "signed-manifest" => {
            if config.trust.manifest.is_none() {
                anyhow::bail!("trust.manifest must be specified for signed-manifest");
            }
        }
        other => anyhow::bail!(
            "Unknown trust classifier: '{}'. Must be naming-convention, allowlist-registry, or signed-manifest.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let f = write_config(
            r#"
[db]
path = "data/sentinel.sqlite"

[corpus]
root = "data/corpus"
"#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.chunking.chunk_size, 1200);
        assert_eq!(cfg.chunking.chunk_overlap, 200);
        assert_eq!(cfg.retrieval.top_k, 4);
        assert_eq!(cfg.guard.dominance_threshold, 0.95);
        assert_eq!(cfg.guard.outlier_threshold, 2.5);
        assert_eq!(cfg.guard.drift_floor, -0.40);
        assert!(!cfg.embedding.is_enabled());
        assert_eq!(cfg.trust.classifier, "naming-convention");
        assert!(cfg
            .guard
            .blocklist
            .contains(&"ignore previous".to_string()));
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_size() {
        let f = write_config(
            r#"
[db]
path = "x.sqlite"

[corpus]
root = "corpus"

[chunking]
chunk_size = 100
chunk_overlap = 100
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_rejects_unknown_provider() {
        let f = write_config(
            r#"
[db]
path = "x.sqlite"

[corpus]
root = "corpus"

[embedding]
provider = "openai"
model = "text-embedding-3-small"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_enabled_provider_requires_model() {
        let f = write_config(
            r#"
[db]
path = "x.sqlite"

[corpus]
root = "corpus"

[embedding]
provider = "ollama"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_signed_manifest_requires_manifest_path() {
        let f = write_config(
            r#"
[db]
path = "x.sqlite"

[corpus]
root = "corpus"

[trust]
classifier = "signed-manifest"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}

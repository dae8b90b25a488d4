//! Trust classification strategies.
//!
//! Every document is bound to a [`TrustLevel`] at ingestion time. The
//! strategy is chosen by configuration rather than hardcoded:
//!
//! | `trust.classifier` | Rule |
//! |--------------------|------|
//! | `naming-convention` | source name contains an untrusted marker → low |
//! | `allowlist-registry` | source not on the allowlist → low |
//! | `signed-manifest` | digest missing from or mismatching the manifest → low |
//!
//! The naming convention is a placeholder oracle with no organizational
//! backing; deployments that can produce a manifest or allowlist should
//! prefer those.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

use crate::config::TrustConfig;
use crate::models::TrustLevel;

pub trait TrustClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Classify a document given its source identifier and raw text.
    fn classify(&self, source: &str, text: &str) -> TrustLevel;
}

/// Classifies by source name: any configured marker appearing in the
/// lower-cased name yields low trust.
pub struct NamingConvention {
    markers: Vec<String>,
}

impl NamingConvention {
    pub fn new(markers: Vec<String>) -> Self {
        let markers = markers.into_iter().map(|m| m.to_lowercase()).collect();
        Self { markers }
    }
}

impl TrustClassifier for NamingConvention {
    fn name(&self) -> &str {
        "naming-convention"
    }

    fn classify(&self, source: &str, _text: &str) -> TrustLevel {
        let name = source.to_lowercase();
        if self.markers.iter().any(|m| name.contains(m.as_str())) {
            TrustLevel::Low
        } else {
            TrustLevel::High
        }
    }
}

/// Classifies by membership: only sources on the registry are high trust.
pub struct AllowlistRegistry {
    allowed: HashSet<String>,
}

impl AllowlistRegistry {
    pub fn new(allowed: Vec<String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }
}

impl TrustClassifier for AllowlistRegistry {
    fn name(&self) -> &str {
        "allowlist-registry"
    }

    fn classify(&self, source: &str, _text: &str) -> TrustLevel {
        if self.allowed.contains(source) {
            TrustLevel::High
        } else {
            TrustLevel::Low
        }
    }
}

/// Classifies by content digest: the manifest maps source names to expected
/// SHA-256 digests, and only a present, matching digest is high trust.
pub struct SignedManifest {
    digests: HashMap<String, String>,
}

impl SignedManifest {
    pub fn new(digests: HashMap<String, String>) -> Self {
        Self { digests }
    }

    /// Load a manifest from a flat TOML table of `source = "digest"` pairs.
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trust manifest: {}", path.display()))?;
        let digests: HashMap<String, String> =
            toml::from_str(&content).with_context(|| "Failed to parse trust manifest")?;
        Ok(Self::new(digests))
    }
}

impl TrustClassifier for SignedManifest {
    fn name(&self) -> &str {
        "signed-manifest"
    }

    fn classify(&self, source: &str, text: &str) -> TrustLevel {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let digest = format!("{:x}", hasher.finalize());

        match self.digests.get(source) {
            Some(expected) if *expected == digest => TrustLevel::High,
            _ => TrustLevel::Low,
        }
    }
}

/// Create the configured [`TrustClassifier`].
pub fn create_classifier(config: &TrustConfig) -> Result<Box<dyn TrustClassifier>> {
    match config.classifier.as_str() {
        "naming-convention" => Ok(Box::new(NamingConvention::new(
            config.untrusted_markers.clone(),
        ))),
        "allowlist-registry" => Ok(Box::new(AllowlistRegistry::new(config.allowlist.clone()))),
        "signed-manifest" => {
            let path = config
                .manifest
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("trust.manifest required for signed-manifest"))?;
            Ok(Box::new(SignedManifest::load(path)?))
        }
        other => anyhow::bail!("Unknown trust classifier: {}", other),
    }
}

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

const DEFAULT_DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "odt", "rtf", "ps", "ppt", "pptx", "zip", "gz",
];

const DEFAULT_REGION_KEYWORDS: &[&str] = &[
    "deliverable",
    "deliverables",
    "publication",
    "publications",
    "paper",
    "papers",
    "report",
    "reports",
    "output",
    "outputs",
    "result",
    "results",
    "download",
    "downloads",
    "documents",
    "dokumenty",
    "publikace",
    "výstupy",
    "výsledky",
    "veröffentlichungen",
    "publikationen",
    "ergebnisse",
    "livrables",
    "pubblicazioni",
    "publicaciones",
];

/// Tunable heuristics shared by every harvesting stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_body_bytes: usize,
    pub document_extensions: Vec<String>,
    pub region_keywords: Vec<String>,
    pub region_min_share: f64,
    pub tolerance_ratio: f64,
    pub min_records: usize,
    pub max_container_depth: usize,
    pub max_project_pages: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("rrs-harvest/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            document_extensions: DEFAULT_DOCUMENT_EXTENSIONS
                .iter()
                .map(|value| value.to_string())
                .collect(),
            region_keywords: DEFAULT_REGION_KEYWORDS
                .iter()
                .map(|value| value.to_string())
                .collect(),
            region_min_share: 0.75,
            tolerance_ratio: 0.34,
            min_records: 2,
            max_container_depth: 6,
            max_project_pages: 8,
        }
    }
}

impl HarvestConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let config: HarvestConfig = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;

        info!(path = %path.display(), "loaded harvest config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.region_min_share) || self.region_min_share == 0.0 {
            bail!(
                "region_min_share must be within (0, 1], got {}",
                self.region_min_share
            );
        }
        if !(0.0..1.0).contains(&self.tolerance_ratio) {
            bail!(
                "tolerance_ratio must be within [0, 1), got {}",
                self.tolerance_ratio
            );
        }
        if self.min_records < 2 {
            bail!("min_records must be at least 2, got {}", self.min_records);
        }
        if self.timeout_secs == 0 {
            bail!("timeout_secs must be positive");
        }
        Ok(())
    }

    /// Case-insensitive keyword hit on whole words of `text`.
    pub fn mentions_region_keyword(&self, text: &str) -> bool {
        let lowered = text.to_lowercase();
        lowered
            .split(|ch: char| !ch.is_alphanumeric())
            .filter(|word| !word.is_empty())
            .any(|word| self.region_keywords.iter().any(|keyword| keyword == word))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults_for_missing_fields() {
        let config: HarvestConfig =
            serde_json::from_str(r#"{ "tolerance_ratio": 0.5, "min_records": 3 }"#)
                .expect("partial config should deserialize");

        assert_eq!(config.min_records, 3);
        assert!((config.tolerance_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.timeout_secs, 30);
        assert!(config.document_extensions.iter().any(|ext| ext == "pdf"));
        config.validate().expect("config should validate");
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let config = HarvestConfig {
            region_min_share: 0.0,
            ..HarvestConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HarvestConfig {
            min_records: 1,
            ..HarvestConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn keyword_matching_uses_whole_words() {
        let config = HarvestConfig::default();
        assert!(config.mentions_region_keyword("Project Deliverables"));
        assert!(config.mentions_region_keyword("Veröffentlichungen 2009"));
        assert!(!config.mentions_region_keyword("Reportage on papermaking"));
    }
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Config, CoreError, GroupingPolicy};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub labeler: Option<LabelerConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub models: Option<BTreeMap<String, ModelConfig>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelerConfig {
    pub default_model: Option<String>,
    pub concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub prompt_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub context_window: Option<usize>,
    pub dedup_per_page: Option<bool>,
    pub sort_by_page: Option<bool>,
    /// Fraction of page height treated as running header and skipped.
    pub header_ratio: Option<f32>,
    /// Fraction of page height treated as running footer and skipped.
    pub footer_ratio: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: Option<String>,
    pub model_id: Option<String>,
    pub api_key: Option<String>,
}

impl ConfigFile {
    pub fn default_model(&self) -> Option<&str> {
        self.labeler.as_ref()?.default_model.as_deref()
    }

    pub fn prompt_path(&self) -> Option<&str> {
        self.labeler.as_ref()?.prompt_path.as_deref()
    }

    pub fn header_ratio(&self) -> Option<f32> {
        self.extraction.as_ref()?.header_ratio
    }

    pub fn footer_ratio(&self) -> Option<f32> {
        self.extraction.as_ref()?.footer_ratio
    }

    /// Copy every value set in this file onto `config`.
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(labeler) = &self.labeler {
            if let Some(n) = labeler.concurrency {
                config.concurrency = n.max(1);
            }
            if let Some(secs) = labeler.timeout_secs {
                config.timeout_secs = secs;
            }
        }
        if let Some(extraction) = &self.extraction {
            if let Some(window) = extraction.context_window {
                config.context_window = window;
            }
            if let Some(dedup) = extraction.dedup_per_page {
                config.grouping = if dedup {
                    GroupingPolicy::DedupLastWins
                } else {
                    GroupingPolicy::All
                };
            }
            if let Some(sort) = extraction.sort_by_page {
                config.sort_by_page = sort;
            }
        }
    }
}

/// Platform config directory path: `<config_dir>/numtag/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("numtag").join("config.toml"))
}

/// Load config by cascading CWD `.numtag.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".numtag.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match read_config(path) {
        Ok(config) => Some(config),
        Err(CoreError::Io(_)) => None,
        Err(e) => {
            tracing::warn!("ignoring {}", e);
            None
        }
    }
}

/// Load a config the user asked for explicitly. Missing or malformed files
/// are errors.
pub fn read_config(path: &Path) -> Result<ConfigFile, CoreError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| CoreError::Config {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        labeler: Some(LabelerConfig {
            default_model: overlay
                .labeler
                .as_ref()
                .and_then(|l| l.default_model.clone())
                .or_else(|| base.labeler.as_ref().and_then(|l| l.default_model.clone())),
            concurrency: overlay
                .labeler
                .as_ref()
                .and_then(|l| l.concurrency)
                .or_else(|| base.labeler.as_ref().and_then(|l| l.concurrency)),
            timeout_secs: overlay
                .labeler
                .as_ref()
                .and_then(|l| l.timeout_secs)
                .or_else(|| base.labeler.as_ref().and_then(|l| l.timeout_secs)),
            prompt_path: overlay
                .labeler
                .as_ref()
                .and_then(|l| l.prompt_path.clone())
                .or_else(|| base.labeler.as_ref().and_then(|l| l.prompt_path.clone())),
        }),
        extraction: Some(ExtractionConfig {
            context_window: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.context_window)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.context_window)),
            dedup_per_page: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.dedup_per_page)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.dedup_per_page)),
            sort_by_page: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.sort_by_page)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.sort_by_page)),
            header_ratio: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.header_ratio)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.header_ratio)),
            footer_ratio: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.footer_ratio)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.footer_ratio)),
        }),
        models: merge_models(base.models, overlay.models),
    }
}

fn merge_models(
    base: Option<BTreeMap<String, ModelConfig>>,
    overlay: Option<BTreeMap<String, ModelConfig>>,
) -> Option<BTreeMap<String, ModelConfig>> {
    let (mut merged, overlay) = match (base, overlay) {
        (None, None) => return None,
        (Some(b), None) => return Some(b),
        (None, Some(o)) => return Some(o),
        (Some(b), Some(o)) => (b, o),
    };
    for (name, entry) in overlay {
        let slot = merged.entry(name).or_default();
        slot.base_url = entry.base_url.or(slot.base_url.take());
        slot.model_id = entry.model_id.or(slot.model_id.take());
        slot.api_key = entry.api_key.or(slot.api_key.take());
    }
    Some(merged)
}

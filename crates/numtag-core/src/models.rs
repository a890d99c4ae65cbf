//! Named model deployments the CLI can target.

use std::collections::BTreeMap;

use crate::CoreError;
use crate::config_file::ConfigFile;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Where and how to reach one deployed model.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub base_url: String,
    pub model_id: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ModelEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEndpoint")
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Name → endpoint mapping.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelEndpoint>,
}

impl ModelRegistry {
    /// The models available without any configuration, served from `base_url`.
    pub fn builtin(base_url: &str) -> Self {
        let mut registry = Self::default();
        for (name, model_id) in [
            ("llama3.2", "llama3.2:3b"),
            ("qwen3", "qwen3:8b"),
            ("deepseek-r1", "deepseek-r1:8b"),
        ] {
            registry.insert(
                name,
                ModelEndpoint {
                    base_url: base_url.to_string(),
                    model_id: model_id.to_string(),
                    api_key: None,
                },
            );
        }
        registry
    }

    /// Built-in models overlaid with the `[models.*]` tables of `config`.
    ///
    /// A configured entry replaces the built-in one of the same name field by
    /// field; missing fields fall back to the built-in entry, then to
    /// `base_url` and the entry name.
    pub fn from_config(config: &ConfigFile, base_url: &str) -> Self {
        let mut registry = Self::builtin(base_url);
        for (name, entry) in config.models.iter().flatten() {
            let existing = registry.models.get(name);
            let endpoint = ModelEndpoint {
                base_url: entry
                    .base_url
                    .clone()
                    .or_else(|| existing.map(|e| e.base_url.clone()))
                    .unwrap_or_else(|| base_url.to_string()),
                model_id: entry
                    .model_id
                    .clone()
                    .or_else(|| existing.map(|e| e.model_id.clone()))
                    .unwrap_or_else(|| name.clone()),
                api_key: entry
                    .api_key
                    .clone()
                    .or_else(|| existing.and_then(|e| e.api_key.clone())),
            };
            registry.insert(name, endpoint);
        }
        registry
    }

    pub fn insert(&mut self, name: impl Into<String>, endpoint: ModelEndpoint) {
        self.models.insert(name.into(), endpoint);
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelEndpoint)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn resolve(&self, name: &str) -> Result<&ModelEndpoint, CoreError> {
        self.models.get(name).ok_or_else(|| CoreError::UnknownModel {
            name: name.to_string(),
            available: self.names().collect::<Vec<_>>().join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_file::ModelConfig;

    #[test]
    fn builtin_models_resolve() {
        let registry = ModelRegistry::builtin(DEFAULT_BASE_URL);
        let endpoint = registry.resolve(DEFAULT_MODEL).unwrap();
        assert_eq!(endpoint.model_id, "llama3.2:3b");
        assert_eq!(endpoint.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn unknown_model_lists_available() {
        let registry = ModelRegistry::builtin(DEFAULT_BASE_URL);
        let err = registry.resolve("gpt-17").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gpt-17"));
        assert!(msg.contains("llama3.2"));
        assert!(msg.contains("qwen3"));
        assert!(msg.contains("deepseek-r1"));
    }

    #[test]
    fn config_adds_and_overrides_models() {
        let mut models = BTreeMap::new();
        models.insert(
            "llama3.2".to_string(),
            ModelConfig {
                base_url: Some("http://gpu-box:11434".into()),
                ..Default::default()
            },
        );
        models.insert(
            "mistral".to_string(),
            ModelConfig {
                model_id: Some("mistral:7b-instruct".into()),
                ..Default::default()
            },
        );
        let config = ConfigFile {
            models: Some(models),
            ..Default::default()
        };

        let registry = ModelRegistry::from_config(&config, DEFAULT_BASE_URL);
        let llama = registry.resolve("llama3.2").unwrap();
        assert_eq!(llama.base_url, "http://gpu-box:11434");
        assert_eq!(llama.model_id, "llama3.2:3b");

        let mistral = registry.resolve("mistral").unwrap();
        assert_eq!(mistral.model_id, "mistral:7b-instruct");
        assert_eq!(mistral.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn debug_masks_api_key() {
        let endpoint = ModelEndpoint {
            base_url: "http://x".into(),
            model_id: "m".into(),
            api_key: Some("secret".into()),
        };
        let dbg = format!("{:?}", endpoint);
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("***"));
    }
}

//! JSON configuration file.
//!
//! Keys are upper-case (`TARGET_LANG`, `WORKERS`, ...) and every key is
//! optional. A missing or unreadable file is not fatal: the caller falls back
//! to [`Config::default`] via [`Config::load_or_default`]. Timeouts are
//! whole seconds.

use std::{
    collections::BTreeMap,
    fs,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    flow::FlowConfig,
    pipeline::PipelineConfig,
    protocol::{MessageRegistry, RegistryError},
    translate::{DEFAULT_PROVIDER_WORKERS, ProviderKind, ProviderSpec},
};

/// Path read when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Errors raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One user-supplied translation endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ExternalApi {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_external_timeout")]
    pub timeout: u64,
    /// Requests per second; unlimited when absent.
    #[serde(default)]
    pub rate_limit: Option<usize>,
}

fn default_external_timeout() -> u64 { 6 }

/// Entries that are not objects are ignored rather than failing the file.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExternalEntry {
    Api(ExternalApi),
    #[expect(dead_code, reason = "only matched to skip malformed entries")]
    Other(serde_json::Value),
}

fn lenient_externals<'de, D>(deserializer: D) -> Result<Vec<ExternalApi>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let entries = Vec::<ExternalEntry>::deserialize(deserializer)?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            ExternalEntry::Api(api) => Some(api),
            ExternalEntry::Other(_) => None,
        })
        .collect())
}

/// Contents of `config.json`.
///
/// # Examples
///
/// ```
/// use chatlens::config::Config;
///
/// let config: Config = serde_json::from_str(r#"{"TARGET_LANG": "de"}"#).expect("valid");
/// assert_eq!(config.target_lang, "de");
/// assert_eq!(config.workers, 8);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    pub target_lang: String,
    /// How long the display waits for one translation.
    pub translation_timeout: u64,
    pub google_enabled: bool,
    pub google_timeout: u64,
    pub google_rate_limit: Option<usize>,
    pub openai_api_url: Option<String>,
    pub api_key: Option<String>,
    pub default_model: String,
    pub openai_timeout: u64,
    #[serde(deserialize_with = "lenient_externals")]
    pub external_translation_apis: Vec<ExternalApi>,
    pub workers: usize,
    pub provider_workers: usize,
    pub flow_idle_timeout: u64,
    /// Schema name to message id overrides.
    pub message_ids: BTreeMap<String, u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_lang: "en".to_owned(),
            translation_timeout: 10,
            google_enabled: true,
            google_timeout: 5,
            google_rate_limit: None,
            openai_api_url: None,
            api_key: None,
            default_model: "gpt-4.1-nano".to_owned(),
            openai_timeout: 8,
            external_translation_apis: Vec::new(),
            workers: 8,
            provider_workers: DEFAULT_PROVIDER_WORKERS,
            flow_idle_timeout: 120,
            message_ids: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or is not valid
    /// JSON of the expected shape.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Like [`load`](Self::load), falling back to defaults with a warning.
    #[must_use]
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => {
                debug!(path = %path.display(), "configuration loaded");
                config
            }
            Err(err) => {
                warn!(error = %err, "configuration unavailable; using defaults");
                Self::default()
            }
        }
    }

    /// Settings for the translation router.
    #[must_use]
    pub fn translation(&self) -> TranslationConfig {
        TranslationConfig {
            target_lang: self.target_lang.clone(),
            api_key: self.api_key.clone(),
            model: self.default_model.clone(),
            provider_workers: self.provider_workers,
            google_enabled: self.google_enabled,
            google_timeout: Duration::from_secs(self.google_timeout),
            google_rate_limit: self.google_rate_limit,
            openai_api_url: self.openai_api_url.clone(),
            openai_timeout: Duration::from_secs(self.openai_timeout),
            externals: self.external_translation_apis.clone(),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            job_timeout: Duration::from_secs(self.translation_timeout),
            ..PipelineConfig::default()
        }
    }

    #[must_use]
    pub fn flow(&self) -> FlowConfig {
        FlowConfig {
            idle_timeout: Duration::from_secs(self.flow_idle_timeout),
            ..FlowConfig::default()
        }
    }

    /// The built-in message registry with configured id overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownSchema`] if an override names an
    /// unknown schema.
    pub fn registry(&self) -> Result<MessageRegistry, RegistryError> {
        MessageRegistry::with_overrides(
            self.message_ids
                .iter()
                .map(|(name, id)| (name.as_str(), *id)),
        )
    }
}

/// Provider settings consumed by
/// [`TranslationRouter::from_config`](crate::translate::TranslationRouter::from_config).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationConfig {
    pub target_lang: String,
    pub api_key: Option<String>,
    pub model: String,
    pub provider_workers: usize,
    pub google_enabled: bool,
    pub google_timeout: Duration,
    pub google_rate_limit: Option<usize>,
    pub openai_api_url: Option<String>,
    pub openai_timeout: Duration,
    pub externals: Vec<ExternalApi>,
}

impl TranslationConfig {
    /// Providers in fallback order.
    ///
    /// Google comes first unless disabled, OpenAI only when both its URL and
    /// the API key are set, then every external endpoint with a URL.
    #[must_use]
    pub fn provider_specs(&self) -> Vec<ProviderSpec> {
        let mut specs = Vec::new();
        if self.google_enabled {
            specs.push(
                ProviderSpec::new(ProviderKind::Primary, "google", self.google_timeout)
                    .with_rate_limit(self.google_rate_limit),
            );
        }
        if let (Some(url), Some(_)) = (&self.openai_api_url, &self.api_key) {
            specs.push(
                ProviderSpec::new(ProviderKind::Secondary, "openai", self.openai_timeout)
                    .with_endpoint(url.clone()),
            );
        }
        for api in &self.externals {
            let Some(url) = api.url.as_deref().filter(|url| !url.trim().is_empty()) else {
                continue;
            };
            specs.push(
                ProviderSpec::new(
                    ProviderKind::Custom,
                    format!("external:{url}"),
                    Duration::from_secs(api.timeout),
                )
                .with_endpoint(url)
                .with_rate_limit(api.rate_limit),
            );
        }
        specs
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Write, time::Duration};

    use rstest::rstest;

    use super::{Config, ConfigError};
    use crate::translate::ProviderKind;

    fn parse(json: &str) -> Config { serde_json::from_str(json).expect("valid config") }

    #[test]
    fn empty_object_uses_defaults() {
        assert_eq!(parse("{}"), Config::default());
    }

    #[test]
    fn default_order_is_google_only() {
        let specs = Config::default().translation().provider_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].kind, ProviderKind::Primary);
        assert_eq!(specs[0].timeout, Duration::from_secs(5));
    }

    #[test]
    fn builds_full_provider_order() {
        let config = parse(
            r#"{
                "OPENAI_API_URL": "https://llm.example/v1/chat/completions",
                "API_KEY": "sk-test",
                "OPENAI_TIMEOUT": 3,
                "EXTERNAL_TRANSLATION_APIS": [
                    {"url": "https://a.example/translate"},
                    {"timeout": 2},
                    "not an object",
                    {"url": "https://b.example/translate", "timeout": 9, "rate_limit": 5}
                ]
            }"#,
        );
        let specs = config.translation().provider_specs();
        let kinds: Vec<_> = specs.iter().map(|spec| spec.kind).collect();
        assert_eq!(
            kinds,
            [
                ProviderKind::Primary,
                ProviderKind::Secondary,
                ProviderKind::Custom,
                ProviderKind::Custom
            ]
        );
        assert_eq!(specs[1].timeout, Duration::from_secs(3));
        assert_eq!(specs[2].endpoint.as_deref(), Some("https://a.example/translate"));
        assert_eq!(specs[2].timeout, Duration::from_secs(6));
        assert_eq!(specs[3].timeout, Duration::from_secs(9));
        assert_eq!(specs[3].rate_limit, Some(5));
    }

    #[rstest]
    #[case::url_without_key(r#"{"OPENAI_API_URL": "https://llm.example"}"#)]
    #[case::key_without_url(r#"{"API_KEY": "sk-test"}"#)]
    fn openai_needs_url_and_key(#[case] json: &str) {
        let specs = parse(json).translation().provider_specs();
        assert!(specs.iter().all(|spec| spec.kind != ProviderKind::Secondary));
    }

    #[test]
    fn google_can_be_disabled() {
        let specs = parse(r#"{"GOOGLE_ENABLED": false}"#)
            .translation()
            .provider_specs();
        assert!(specs.is_empty());
    }

    #[test]
    fn runtime_knobs_map_to_component_configs() {
        let config = parse(r#"{"WORKERS": 3, "TRANSLATION_TIMEOUT": 4, "FLOW_IDLE_TIMEOUT": 30}"#);
        assert_eq!(config.pipeline().workers, 3);
        assert_eq!(config.pipeline().job_timeout, Duration::from_secs(4));
        assert_eq!(config.flow().idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn message_id_overrides_reach_the_registry() {
        let config = parse(r#"{"MESSAGE_IDS": {"TeamChatNotify": 77}}"#);
        let registry = config.registry().expect("known schema");
        assert_eq!(registry.resolve(77).map(|s| s.name()), Some("TeamChatNotify"));
        assert!(parse(r#"{"MESSAGE_IDS": {"Nope": 1}}"#).registry().is_err());
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = std::env::temp_dir().join(format!("chatlens-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");

        let missing = dir.join("missing.json");
        assert!(matches!(Config::load(&missing), Err(ConfigError::Io { .. })));
        assert_eq!(Config::load_or_default(&missing), Config::default());

        let malformed = dir.join("malformed.json");
        let mut file = std::fs::File::create(&malformed).expect("create");
        file.write_all(b"{ not json").expect("write");
        assert!(matches!(Config::load(&malformed), Err(ConfigError::Parse { .. })));

        let valid = dir.join("valid.json");
        std::fs::write(&valid, r#"{"TARGET_LANG": "ja"}"#).expect("write");
        assert_eq!(Config::load(&valid).expect("valid").target_lang, "ja");
    }
}

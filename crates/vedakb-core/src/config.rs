//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge defaults + `config.toml` + `config.<env>.toml` +
//! `APP_*` env vars (`__` separates sections, e.g. `APP_RETRIEVAL__TOP_K`).
//! `expand_path` expands `~` and `${VAR}` in user-supplied paths.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
use crate::types::{FanoutMode, NamingStrategy, RankOrder};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate_for_env(&env_name)?;
        Ok(config)
    }

    /// Wraps an already assembled figment; used by tests and embedders of the crate.
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extracts and validates the typed settings sections.
    pub fn settings(&self) -> crate::error::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        match env {
            "prod" | "production" => {
                let settings = self.settings()?;
                if settings.embedding.fake {
                    anyhow::bail!("fake embeddings are not allowed in production");
                }
            }
            _ => {
                self.settings()?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub connection: ConnectionSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub composer: ComposerSettings,
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.connection.backend_url.trim().is_empty() {
            return Err(Error::InvalidConfig("connection.backend_url must not be empty".into()));
        }
        if self.connection.max_retries == 0 {
            return Err(Error::InvalidConfig("connection.max_retries must be at least 1".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::InvalidConfig("retrieval.top_k must be at least 1".into()));
        }
        if matches!(self.connection.backoff, BackoffKind::Exponential) && self.connection.backoff_factor < 1.0 {
            return Err(Error::InvalidConfig("connection.backoff_factor must be >= 1.0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// `http(s)://` selects the Qdrant REST client, anything else is a LanceDB path.
    pub backend_url: String,
    pub connect_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub backoff: BackoffKind,
    pub backoff_factor: f64,
    pub max_retry_delay_ms: u64,
    pub jitter: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:6333".to_string(),
            connect_timeout_ms: 10_000,
            max_retries: 3,
            retry_delay_ms: 5_000,
            backoff: BackoffKind::Fixed,
            backoff_factor: 2.0,
            max_retry_delay_ms: 60_000,
            jitter: false,
        }
    }
}

impl ConnectionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.max_retry_delay_ms)
    }

    /// Backend URL with `~` and `$VAR` expanded when it names a local path.
    pub fn expanded_backend_url(&self) -> String {
        if self.backend_url.contains("://") {
            self.backend_url.clone()
        } else {
            expand_path(&self.backend_url).to_string_lossy().into_owned()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamingKind {
    Verbatim,
    #[default]
    Suffix,
    Prefix,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Logical instance names, given either as a list or a comma-separated string.
    #[serde(deserialize_with = "comma_list")]
    pub instances: Vec<String>,
    pub naming: NamingKind,
    pub collection_affix: String,
    pub top_k: usize,
    pub search_timeout_ms: u64,
    pub embed_timeout_ms: u64,
    pub ordering: RankOrder,
    pub fanout: FanoutMode,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            naming: NamingKind::Suffix,
            collection_affix: "vedas_knowledge_base".to_string(),
            top_k: 5,
            search_timeout_ms: 10_000,
            embed_timeout_ms: 30_000,
            ordering: RankOrder::Score,
            fanout: FanoutMode::Concurrent,
        }
    }
}

impl RetrievalSettings {
    pub fn naming_strategy(&self) -> NamingStrategy {
        match self.naming {
            NamingKind::Verbatim => NamingStrategy::Verbatim,
            NamingKind::Suffix => NamingStrategy::Suffix(self.collection_affix.clone()),
            NamingKind::Prefix => NamingStrategy::Prefix(self.collection_affix.clone()),
        }
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub fake: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerSettings {
    pub url: String,
    pub model: String,
    pub timeout_ms: u64,
}

impl Default for ComposerSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434/api/generate".to_string(),
            model: "llama3.1".to_string(),
            timeout_ms: 60_000,
        }
    }
}

impl ComposerSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// A scalar as it arrives from any provider. The env provider hands `"1"` or
/// `"true"` over already parsed, so numbers and booleans are accepted and
/// turned back into their text form.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Self::Str(s) => s,
            Self::Int(n) => n.to_string(),
            Self::UInt(n) => n.to_string(),
            Self::Float(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
        }
    }
}

fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Scalar),
        Many(Vec<Scalar>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => s.into_text().split(',').map(str::to_string).collect(),
        OneOrMany::Many(v) => v.into_iter().map(Scalar::into_text).collect(),
    })
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

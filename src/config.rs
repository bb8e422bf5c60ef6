use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub azure: AzureConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    /// Full connection URL. When absent, the connection is built from the
    /// PGHOST / PGPORT / PGDATABASE / PGUSER / PGPASSWORD / PGSSLMODE
    /// environment variables.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AzureConfig {
    /// Azure OpenAI resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Deployment name of the embedding model.
    #[serde(default)]
    pub embed_deployment: Option<String>,
    /// Deployment name of the chat model.
    #[serde(default)]
    pub chat_deployment: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "2024-05-01-preview".to_string()
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            embed_deployment: None,
            chat_deployment: None,
            api_version: default_api_version(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// Vector dimensionality of the embedding model (pgvector column width).
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Total request attempts per batch; 429/5xx and network errors retry.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            dims: default_dims(),
            batch_size: 64,
            max_retries: 5,
            timeout_secs: 60,
        }
    }
}

fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    /// Per-section snippet width in the prompt context.
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    /// Total character budget for the prompt context.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
    /// Law abbreviation used when no filter is given.
    #[serde(default = "default_law")]
    pub law: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            snippet_chars: default_snippet_chars(),
            context_chars: default_context_chars(),
            law: default_law(),
        }
    }
}

fn default_top_k() -> i64 {
    8
}
fn default_snippet_chars() -> usize {
    1200
}
fn default_context_chars() -> usize {
    8000
}
fn default_law() -> String {
    "StGB".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

fn default_temperature() -> f64 {
    0.2
}
fn default_max_tokens() -> u32 {
    450
}
fn default_chat_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl AzureConfig {
    /// Endpoint with any trailing slash removed, or an error if unset.
    pub fn endpoint(&self) -> Result<String> {
        let ep = self
            .endpoint
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("azure.endpoint must be set in config"))?;
        Ok(ep.trim_end_matches('/').to_string())
    }

    pub fn embed_deployment(&self) -> Result<&str> {
        self.embed_deployment
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("azure.embed_deployment must be set in config"))
    }

    pub fn chat_deployment(&self) -> Result<&str> {
        self.chat_deployment
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("azure.chat_deployment must be set in config"))
    }

    /// The API key is never read from the config file, only the environment.
    pub fn api_key(&self) -> Result<String> {
        std::env::var("AZURE_OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("AZURE_OPENAI_API_KEY environment variable not set"))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if config.embedding.max_retries == 0 {
        anyhow::bail!("embedding.max_retries must be >= 1");
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.snippet_chars == 0 || config.retrieval.context_chars == 0 {
        anyhow::bail!("retrieval.snippet_chars and retrieval.context_chars must be > 0");
    }

    if !(0.0..=2.0).contains(&config.chat.temperature) {
        anyhow::bail!("chat.temperature must be in [0.0, 2.0]");
    }

    Ok(config)
}

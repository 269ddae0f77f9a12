use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::settings::SizeLimits;

/// Shortest and longest per-call provider timeout we accept.
const MIN_PROVIDER_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_PROVIDER_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
pub struct Config {
    pub fakepost: FakepostConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub content: ContentConfig,
}

#[derive(Debug, Deserialize)]
pub struct FakepostConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_site_url")]
    pub site_url: String,
    #[serde(default)]
    pub admin_token: Option<String>,
}

fn default_version() -> u32 {
    1
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_listen() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_site_url() -> String {
    "http://localhost:8787".to_string()
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "fakepost.db".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_test_timeout")]
    pub test_timeout: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_model: default_model(),
            timeout: default_timeout(),
            test_timeout: default_test_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
pub fn default_model() -> String {
    "gemini-1.5-flash-latest".to_string()
}
fn default_timeout() -> String {
    "45s".to_string()
}
fn default_test_timeout() -> String {
    "30s".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ContentConfig {
    #[serde(default = "default_category")]
    pub default_category: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default = "default_credit_url")]
    pub credit_url: String,
    #[serde(default = "default_max_posts")]
    pub max_posts_per_batch: u32,
    #[serde(default = "default_max_title_words")]
    pub max_title_words: u32,
    #[serde(default = "default_max_content_words")]
    pub max_content_words: u32,
    #[serde(default = "default_max_paragraphs")]
    pub max_paragraphs: u32,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            default_category: default_category(),
            categories: Vec::new(),
            credit_url: default_credit_url(),
            max_posts_per_batch: default_max_posts(),
            max_title_words: default_max_title_words(),
            max_content_words: default_max_content_words(),
            max_paragraphs: default_max_paragraphs(),
        }
    }
}

fn default_category() -> String {
    "Uncategorized".to_string()
}
fn default_credit_url() -> String {
    "https://github.com/chinmoybiswas93/cb-fake-post-ai".to_string()
}
fn default_max_posts() -> u32 {
    50
}
fn default_max_title_words() -> u32 {
    100
}
fn default_max_content_words() -> u32 {
    5000
}
fn default_max_paragraphs() -> u32 {
    100
}

impl Config {
    /// Resolve the database path (relative to data_dir if not absolute).
    pub fn db_path(&self) -> PathBuf {
        let db_path = Path::new(&self.database.path);
        if db_path.is_absolute() {
            db_path.to_path_buf()
        } else {
            self.fakepost.data_dir.join(db_path)
        }
    }

    /// Per-call timeout for content generation requests.
    pub fn provider_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.provider.timeout).context("parsing provider timeout")
    }

    /// Timeout for the one-shot key test request.
    pub fn provider_test_timeout(&self) -> Result<Duration> {
        humantime::parse_duration(&self.provider.test_timeout).context("parsing provider test_timeout")
    }

    pub fn size_limits(&self) -> SizeLimits {
        SizeLimits {
            max_posts: self.content.max_posts_per_batch,
            max_title_words: self.content.max_title_words,
            max_content_words: self.content.max_content_words,
            max_paragraphs: self.content.max_paragraphs,
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .map_err(ConfigError::ReadFile)
        .context("reading config file")?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
    Ok(config)
}

pub fn validate_config(config: &Config) -> Result<()> {
    if config.fakepost.version != 1 {
        return Err(ConfigError::Validation(format!(
            "unsupported config version {} (this binary supports version 1)",
            config.fakepost.version
        ))
        .into());
    }

    if config
        .fakepost
        .admin_token
        .as_deref()
        .is_some_and(|t| t.trim().is_empty())
    {
        return Err(ConfigError::Validation("admin_token must not be empty when set".to_string()).into());
    }

    // Provider endpoint
    let base_url = config.provider.base_url.as_str();
    if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
        return Err(ConfigError::Validation(format!(
            "provider base_url '{base_url}' must start with http:// or https://"
        ))
        .into());
    }
    if config.provider.default_model.trim().is_empty() {
        return Err(ConfigError::Validation("provider default_model must not be empty".to_string()).into());
    }

    for (name, value) in [
        ("timeout", &config.provider.timeout),
        ("test_timeout", &config.provider.test_timeout),
    ] {
        let timeout = humantime::parse_duration(value)
            .map_err(|e| ConfigError::Validation(format!("provider {name} '{value}': {e}")))?;
        if !(MIN_PROVIDER_TIMEOUT..=MAX_PROVIDER_TIMEOUT).contains(&timeout) {
            return Err(ConfigError::Validation(format!(
                "provider {name} '{value}' must be between 1s and 2m"
            ))
            .into());
        }
    }

    // Categories
    if config.content.default_category.trim().is_empty() {
        return Err(ConfigError::Validation("content default_category must not be empty".to_string()).into());
    }
    let mut names = HashSet::new();
    names.insert(config.content.default_category.trim().to_lowercase());
    for name in &config.content.categories {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation("category names must not be empty".to_string()).into());
        }
        if !names.insert(name.trim().to_lowercase()) {
            return Err(ConfigError::Validation(format!("duplicate category name: '{name}'")).into());
        }
    }

    for (name, value) in [
        ("max_posts_per_batch", config.content.max_posts_per_batch),
        ("max_title_words", config.content.max_title_words),
        ("max_content_words", config.content.max_content_words),
        ("max_paragraphs", config.content.max_paragraphs),
    ] {
        if value == 0 {
            return Err(ConfigError::Validation(format!("content {name} must be at least 1")).into());
        }
    }

    Ok(())
}

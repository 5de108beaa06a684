use config::{Config, File};
use serde::Deserialize;

use crate::error::HelpdeskError;

#[derive(Debug, Deserialize, Clone)]
pub struct HelpdeskConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            model: "llama-3.3-70b-versatile".to_string(),
            temperature: 0.3,
            max_tokens: 1024,
        }
    }
}

impl CompletionConfig {
    /// Model name, with `GROQ_MODEL` taking precedence over the file value.
    pub fn resolved_model(&self) -> String {
        std::env::var("GROQ_MODEL")
            .ok()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.model.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContextConfig {
    pub window_size: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            window_size: crate::context::DEFAULT_WINDOW_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocsConfig {
    pub path: String,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            path: "docs.json".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl HelpdeskConfig {
    pub fn load(path: &str) -> Result<Self, HelpdeskError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .build()?;
        Ok(s.try_deserialize()?)
    }

    /// Parse config from an in-memory TOML string.
    pub fn from_toml(raw: &str) -> Result<Self, HelpdeskError> {
        let s = Config::builder()
            .add_source(File::from_str(raw, config::FileFormat::Toml))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}

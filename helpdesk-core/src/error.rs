use thiserror::Error;

#[derive(Error, Debug)]
pub enum HelpdeskError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Missing API key: set {0}")]
    MissingApiKey(&'static str),

    #[error("Documentation error: {0}")]
    Docs(String),
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("feed item is missing <{field}>")]
    MissingField { field: &'static str },

    #[error("{table} already contains {value:?}")]
    DuplicateKey { table: &'static str, value: String },

    #[error("database error: {0}")]
    Database(#[from] tokio_rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, AppError::DuplicateKey { .. })
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

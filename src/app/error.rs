use thiserror::Error;

#[derive(Error, Debug)]
pub enum OctofeedError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid source id: {0}")]
    InvalidSource(String),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Already subscribed to {0}")]
    AlreadySubscribed(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Cycle did not finish within {0:?}")]
    CycleTimeout(std::time::Duration),

    #[error("Another instance is already running (PID {0})")]
    AlreadyRunning(u32),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, OctofeedError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Cookie store error: {0}")]
    Cookies(String),

    #[error("Invalid scraping config at '{path}': {reason}")]
    InvalidConfig { path: String, reason: String },

    #[error("Batch queue is exhausted")]
    QueueExhausted,

    #[error("Failed to build extraction pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ScrapeError {
    pub(crate) fn config(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

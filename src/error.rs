use thiserror::Error;

/// Application error types.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Data fetch failed: {0}")]
    DataFetch(String),

    #[error("Notification failed: {0}")]
    Notify(String),

    #[error("Chart rendering failed: {0}")]
    Render(String),

    #[error("Invalid time: {0}")]
    InvalidTime(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

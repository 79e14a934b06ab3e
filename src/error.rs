use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// A row the deriver refuses to evaluate. The whole batch is rejected.
    #[error("Data quality error in region {region:?}: {reason}")]
    DataQuality { region: String, reason: String },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Never leaves the advisory client; converted into the static fallback reply.
    #[error("Advisory service unavailable: {0}")]
    AdvisoryUnavailable(String),

    #[error("Market feed error: {0}")]
    Feed(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn data_quality(region: &str, reason: impl Into<String>) -> Self {
        AppError::DataQuality {
            region: region.to_string(),
            reason: reason.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::DataQuality { .. }
            | AppError::InsufficientData(_)
            | AppError::InvalidConfig(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Feed(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}

// Infrastructure errors
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("analytics API returned status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

use thiserror::Error;

/// Errors shared by the SoundCharts and ACRCloud clients.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned {status}: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ConnectError {
    pub fn api(provider: &'static str, status: u16, message: impl Into<String>) -> Self {
        ConnectError::Api {
            provider,
            status,
            message: message.into(),
        }
    }
}

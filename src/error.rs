use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("{service_name} Client request failed with status {status_code}: {error_message}")]
    ApiRequestFailed {
        service_name: String,
        status_code: u16,
        error_message: String,
    },

    #[error("Jira Service Management Client is not set up, was load_credentials called?")]
    ClientNotSetUp,

    #[error("Invalid poll timestamp: {0}")]
    InvalidTimestamp(f64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConnectorError {
    /// True for errors caused by calling the connector out of order
    /// rather than by the data or the remote API.
    pub fn is_permission_error(&self) -> bool {
        matches!(self, ConnectorError::ClientNotSetUp)
    }

    /// HTTP status carried by an API failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ConnectorError::ApiRequestFailed { status_code, .. } => Some(*status_code),
            ConnectorError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanvasError {
    #[error("Canvas API error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
        body: Option<String>,
        url: String,
    },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Audit log error: {0}")]
    Audit(#[from] csv::Error),

    #[error("Invalid configuration: {field}='{value}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfig { field: String },
}

impl CanvasError {
    pub fn api(
        message: impl Into<String>,
        status: Option<u16>,
        body: Option<String>,
        url: impl Into<String>,
    ) -> Self {
        CanvasError::Api {
            message: message.into(),
            status,
            body,
            url: url.into(),
        }
    }

    /// HTTP status of the failed call, when one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            CanvasError::Api { status, .. } => *status,
            CanvasError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status() == Some(429)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Single human-readable line distinguishing the categories callers act on.
    pub fn user_message(&self) -> String {
        match self.status() {
            Some(401) => "Authentication failed. Please check your API token.".to_string(),
            Some(403) => {
                "Permission denied. You may not have the necessary permissions for this operation."
                    .to_string()
            }
            Some(404) => "The requested course, section, or user was not found.".to_string(),
            Some(429) => "Rate limit exceeded. Please wait a few minutes and try again.".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CanvasError>;

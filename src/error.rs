use thiserror::Error;

/// Ways a completion request can fail to produce a reply
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("rate limited (reset: {})", reset.as_deref().unwrap_or("unknown"))]
    RateLimited { reset: Option<String> },

    #[error("HTTP {status} - {body}")]
    RequestFailed { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Parse(#[from] serde_json::Error),
}

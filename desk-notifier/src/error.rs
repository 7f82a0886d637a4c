use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("request to the desk failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("desk answered {status} for {path}")]
    Status { status: u16, path: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
#[error("notification sink failed: {0}")]
pub struct SinkError(pub String);

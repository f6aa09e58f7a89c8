use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("invalid backend URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

//! facefind-api: HTTP client for the face backend.
//!
//! Three endpoints: `GET /` (service descriptor), `POST /detect`
//! (multipart image upload) and `POST /recognize` (JSON embedding lookup).

pub mod backend;
pub mod client;
pub mod error;
pub mod wire;

pub use backend::Backend;
pub use client::{BackendClient, ClientOptions};
pub use error::ApiError;
pub use reqwest::StatusCode;
pub use wire::{DetectResponse, RecognizeResponse, RootResponse, ServiceInfo};

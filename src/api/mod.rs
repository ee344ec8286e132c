//! Client for the attendance backend's REST API.
//!
//! The capture loop only talks to [`RecognitionBackend`], so tests can swap
//! the HTTP client for an in-memory fake.

mod client;
mod types;

pub use client::{ApiClient, ApiError};
pub use types::{EndSessionProof, EndSessionResponse, RecognitionResponse};

use async_trait::async_trait;

#[async_trait]
pub trait RecognitionBackend: Send + Sync {
    /// `POST /api/live-recognition` with a `data:` URL frame.
    async fn recognize(&self, image_data_url: &str) -> Result<RecognitionResponse, ApiError>;

    /// `POST /api/end-session/:id`.
    async fn end_session(
        &self,
        session_id: &str,
        proof: &EndSessionProof,
    ) -> Result<EndSessionResponse, ApiError>;

    /// Where the server publishes the annotated still for a match.
    fn temp_image_url(&self, filename: &str) -> String;
}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::models::{AttendanceSession, ClassInfo, Lecturer, Student, TimetableEntry};

use super::types::{
    EndSessionProof, EndSessionResponse, LiveRecognitionRequest, RecognitionResponse,
};
use super::RecognitionBackend;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("request rejected: {0}")]
    Rejected(String),
    #[error("invalid base url '{0}'")]
    InvalidBaseUrl(String),
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|_| ApiError::InvalidBaseUrl(base_url.clone()))?;

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    pub async fn live_recognition(
        &self,
        image_data_url: &str,
    ) -> Result<RecognitionResponse, ApiError> {
        let res = self
            .http
            .post(self.api_url("live-recognition"))
            .json(&LiveRecognitionRequest {
                image: image_data_url,
            })
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if status.is_success() {
            return serde_json::from_str(&body).map_err(|_| ApiError::UnexpectedStatus {
                status,
                body,
            });
        }

        // Recognition failures come back as a 4xx/5xx carrying a regular
        // `{matched: false, error}` body.
        match serde_json::from_str::<RecognitionResponse>(&body) {
            Ok(response) if !response.matched => Ok(response),
            _ => Err(ApiError::UnexpectedStatus { status, body }),
        }
    }

    pub async fn end_session_request(
        &self,
        session_id: &str,
        proof: &EndSessionProof,
    ) -> Result<EndSessionResponse, ApiError> {
        let res = self
            .http
            .post(self.api_url(&format!("end-session/{session_id}")))
            .json(proof)
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        if !status.is_success() {
            return Err(ApiError::UnexpectedStatus { status, body });
        }

        // Some deployments answer with an empty 200.
        let response: EndSessionResponse = if body.trim().is_empty() {
            EndSessionResponse::default()
        } else {
            serde_json::from_str(&body).map_err(|_| ApiError::UnexpectedStatus {
                status,
                body: body.clone(),
            })?
        };

        if response.success == Some(false) {
            let reason = response.reason().unwrap_or("session end refused").to_string();
            return Err(ApiError::Rejected(reason));
        }
        Ok(response)
    }

    pub fn image_url(&self, filename: &str) -> String {
        format!("{}/temp_image/{}", self.base_url, filename)
    }

    async fn get_collection<T>(&self, name: &str) -> Result<Vec<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let res = self.http.get(self.api_url(name)).send().await?;

        if res.status().is_success() {
            Ok(res.json::<Vec<T>>().await?)
        } else {
            let status = res.status();
            let body = res.text().await?;
            Err(ApiError::UnexpectedStatus { status, body })
        }
    }

    pub async fn sessions(&self) -> Result<Vec<AttendanceSession>, ApiError> {
        self.get_collection("sessions").await
    }

    pub async fn students(&self) -> Result<Vec<Student>, ApiError> {
        self.get_collection("students").await
    }

    pub async fn lecturers(&self) -> Result<Vec<Lecturer>, ApiError> {
        self.get_collection("lecturers").await
    }

    pub async fn classes(&self) -> Result<Vec<ClassInfo>, ApiError> {
        self.get_collection("classes").await
    }

    pub async fn timetable(&self) -> Result<Vec<TimetableEntry>, ApiError> {
        self.get_collection("timetable").await
    }
}

#[async_trait]
impl RecognitionBackend for ApiClient {
    async fn recognize(&self, image_data_url: &str) -> Result<RecognitionResponse, ApiError> {
        self.live_recognition(image_data_url).await
    }

    async fn end_session(
        &self,
        session_id: &str,
        proof: &EndSessionProof,
    ) -> Result<EndSessionResponse, ApiError> {
        self.end_session_request(session_id, proof).await
    }

    fn temp_image_url(&self, filename: &str) -> String {
        self.image_url(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalises_base_url() {
        let client = ApiClient::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:5000");
        assert_eq!(
            client.image_url("f1.jpg"),
            "http://localhost:5000/temp_image/f1.jpg"
        );
        assert_eq!(
            client.api_url("end-session/42"),
            "http://localhost:5000/api/end-session/42"
        );
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let err = ApiClient::new("not a url", Duration::from_secs(1))
            .err()
            .expect("base url should be rejected");
        assert!(matches!(err, ApiError::InvalidBaseUrl(_)));
    }
}

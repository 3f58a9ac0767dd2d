//! HTTP client for the answering service.
//!
//! The pipeline talks to a [`Backend`] trait object so every flow can be
//! exercised against an in-memory fake; [`ApiClient`] is the shipped
//! implementation over reqwest.

use crate::error::ApiError;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use std::time::Duration;

/// Payload of a successful `/ask` call.
#[derive(Debug, Clone, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub doc_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SuggestionsResponse {
    suggestions: Vec<String>,
}

/// User-asserted judgment on a specific answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Positive => "positive",
            Polarity::Negative => "negative",
        }
    }
}

/// Transcript download body, split on the declared content-type.
#[derive(Debug)]
pub enum TranscriptPayload {
    /// The server had nothing to export and said so in JSON.
    Report(String),
    /// Opaque binary document to be saved as-is.
    Document(Vec<u8>),
}

/// The answering service endpoints the client depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn ask(&self, question: &str) -> Result<AskResponse, ApiError>;
    async fn reset_session(&self) -> Result<(), ApiError>;
    async fn ask_expert(&self) -> Result<String, ApiError>;
    async fn suggestions(&self) -> Result<Vec<String>, ApiError>;
    async fn feedback(&self, doc_id: &str, polarity: Polarity) -> Result<String, ApiError>;
    async fn download_transcript(&self) -> Result<TranscriptPayload, ApiError>;
}

/// Reqwest-backed [`Backend`] implementation.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Turn a non-success status into a `Server` error, pulling the
    /// structured message out of the body when one is present.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .get("message")
                    .or_else(|| value.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or(body);

        Err(ApiError::server(status.as_u16(), message))
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn ask(&self, question: &str) -> Result<AskResponse, ApiError> {
        let response = self
            .client
            .post(self.url("/ask"))
            .json(&serde_json::json!({ "question": question }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<AskResponse>().await?)
    }

    async fn reset_session(&self) -> Result<(), ApiError> {
        let response = self.client.post(self.url("/reset-session")).send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn ask_expert(&self) -> Result<String, ApiError> {
        let response = self.client.post(self.url("/ask-expert")).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<MessageResponse>().await?.message)
    }

    async fn suggestions(&self) -> Result<Vec<String>, ApiError> {
        let response = self.client.get(self.url("/suggestions")).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json::<SuggestionsResponse>().await?.suggestions)
    }

    async fn feedback(&self, doc_id: &str, polarity: Polarity) -> Result<String, ApiError> {
        let response = self
            .client
            .post(self.url("/feedback"))
            .json(&serde_json::json!({
                "doc_id": doc_id,
                "feedback": polarity.as_str(),
            }))
            .send()
            .await?;
        let response = Self::check(response).await?;
        Ok(response.json::<MessageResponse>().await?.message)
    }

    /// The transcript endpoint answers with JSON when there is nothing to
    /// export and with a binary document otherwise, so the branch happens on
    /// the declared content-type, never by attempting to parse the body.
    async fn download_transcript(&self) -> Result<TranscriptPayload, ApiError> {
        let response = self.client.get(self.url("/download-pdf")).send().await?;
        let response = Self::check(response).await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        if content_type.contains("application/json") {
            let report = response.json::<MessageResponse>().await?;
            Ok(TranscriptPayload::Report(report.message))
        } else if content_type.contains("application/pdf")
            || content_type.contains("application/octet-stream")
        {
            let bytes = response.bytes().await?;
            Ok(TranscriptPayload::Document(bytes.to_vec()))
        } else {
            Err(ApiError::protocol(format!(
                "unexpected transcript content-type: {content_type:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = ApiClient::new("http://localhost:34567/", Duration::from_secs(5));
        assert_eq!(client.url("/ask"), "http://localhost:34567/ask");
    }

    #[test]
    fn polarity_serializes_to_wire_strings() {
        assert_eq!(Polarity::Positive.as_str(), "positive");
        assert_eq!(Polarity::Negative.as_str(), "negative");
    }

    #[test]
    fn ask_response_parses_with_and_without_doc_id() {
        let with: AskResponse =
            serde_json::from_str(r##"{"answer": "# Hi", "doc_id": "d1"}"##).unwrap();
        assert_eq!(with.doc_id.as_deref(), Some("d1"));

        let without: AskResponse = serde_json::from_str(r#"{"answer": "plain"}"#).unwrap();
        assert!(without.doc_id.is_none());
    }
}

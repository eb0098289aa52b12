//! [`HttpOracle`] – verification over an HTTP endpoint.
//!
//! The crop is posted as a multipart form:
//!
//! | Part | Content |
//! |---|---|
//! | `image` | JPEG crop, `image/jpeg` |
//! | `classes` | comma-separated target classes |
//! | `description` | free-text target description |
//!
//! The endpoint answers with JSON such as
//! `{"match_status": "full", "ocr_text": "ABC1234"}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::config::VerifierConfig;
use crate::error::OracleError;
use crate::verify::oracle::{VerificationOracle, VerificationRequest, VerificationResponse};

/// Async client for a verification endpoint. Construct once and share.
pub struct HttpOracle {
    endpoint: String,
    client: reqwest::Client,
    jpeg_quality: u8,
}

impl HttpOracle {
    pub fn new(endpoint: impl Into<String>, timeout: Duration, jpeg_quality: u8) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
            jpeg_quality,
        })
    }

    /// Build from config; `Ok(None)` when no endpoint is configured.
    pub fn from_config(config: &VerifierConfig) -> Result<Option<Self>, OracleError> {
        config
            .endpoint
            .as_deref()
            .map(|endpoint| Self::new(endpoint, config.request_timeout(), config.jpeg_quality))
            .transpose()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Parse a response body.
///
/// # Errors
///
/// Returns [`OracleError::BadResponse`] if the body is not a verdict.
pub fn parse_response(body: &str) -> Result<VerificationResponse, OracleError> {
    serde_json::from_str(body).map_err(|e| OracleError::BadResponse(e.to_string()))
}

#[async_trait]
impl VerificationOracle for HttpOracle {
    async fn verify(&self, request: VerificationRequest) -> Result<VerificationResponse, OracleError> {
        let jpeg = request.image.to_jpeg(self.jpeg_quality)?;
        let image = Part::bytes(jpeg).file_name("crop.jpg").mime_str("image/jpeg")?;
        let form = Form::new()
            .part("image", image)
            .text("classes", request.target_classes.join(","))
            .text("description", request.description);

        let body = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| if e.is_timeout() { OracleError::Timeout } else { e.into() })?
            .error_for_status()?
            .text()
            .await?;

        parse_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verify::oracle::Verdict;

    #[test]
    fn no_endpoint_means_no_oracle() {
        let oracle = HttpOracle::from_config(&VerifierConfig::default()).unwrap();
        assert!(oracle.is_none());
    }

    #[test]
    fn endpoint_from_config() {
        let config = VerifierConfig {
            endpoint: Some("http://localhost:8000/verify".into()),
            ..VerifierConfig::default()
        };
        let oracle = HttpOracle::from_config(&config).unwrap().unwrap();
        assert_eq!(oracle.endpoint(), "http://localhost:8000/verify");
    }

    #[test]
    fn parse_partial_with_description() {
        let resp = parse_response(r#"{"match_status":"partial","description":"blue hatchback"}"#).unwrap();
        assert_eq!(resp.verdict, Verdict::Partial);
        assert_eq!(resp.description.as_deref(), Some("blue hatchback"));
    }

    #[test]
    fn malformed_body_is_bad_response() {
        let err = parse_response("<html>oops</html>").unwrap_err();
        assert!(matches!(err, OracleError::BadResponse(_)));
    }
}

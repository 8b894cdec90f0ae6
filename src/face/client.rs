use crate::face::images::{decode_image, load_reference};
use crate::policy::evidence::face_present;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Verdict from the face-match service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    pub verified: bool,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Compares a stored reference image against a freshly captured one.
#[async_trait]
pub trait FaceMatcher: Send + Sync {
    async fn compare(&self, reference: &[u8], candidate: &[u8]) -> Result<FaceMatch>;
}

#[derive(Debug, Serialize)]
struct CompareRequest {
    reference_image: String,
    image: String,
}

/// Face-match service reached over HTTP
pub struct HttpFaceMatcher {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpFaceMatcher {
    pub fn new(endpoint: String, api_key: String, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl FaceMatcher for HttpFaceMatcher {
    async fn compare(&self, reference: &[u8], candidate: &[u8]) -> Result<FaceMatch> {
        let body = CompareRequest {
            reference_image: STANDARD.encode(reference),
            image: STANDARD.encode(candidate),
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request
            .send()
            .await
            .context("Failed to send request to face-match service")?;

        if !response.status().is_success() {
            bail!("Face-match service returned error status: {}", response.status());
        }

        response
            .json::<FaceMatch>()
            .await
            .context("Failed to parse face-match response")
    }
}

/// Outcome of checking a captured image against a student's reference
#[derive(Debug, Clone, PartialEq)]
pub struct FaceCheck {
    pub verified: bool,
    pub confidence: Option<f64>,
    pub message: String,
}

impl FaceCheck {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            verified: false,
            confidence: None,
            message: message.into(),
        }
    }
}

/// Run a captured image through the matcher. Every failure is a negative result.
pub async fn check_face(
    matcher: &dyn FaceMatcher,
    face_dir: &Path,
    usn: &str,
    image: &str,
) -> FaceCheck {
    let reference = match load_reference(face_dir, usn).await {
        Ok(Some(reference)) => reference,
        Ok(None) => {
            return FaceCheck::failed("No registered face found, register a face first")
        }
        Err(e) => {
            tracing::warn!(usn = %usn, error = %e, "Failed to load reference face");
            return FaceCheck::failed(format!("Verification error: {}", e));
        }
    };

    let candidate = match decode_image(image) {
        Ok(candidate) => candidate,
        Err(e) => return FaceCheck::failed(format!("Verification error: {}", e)),
    };

    match matcher.compare(&reference, &candidate).await {
        Ok(verdict) => {
            tracing::info!(
                usn = %usn,
                verified = verdict.verified,
                confidence = ?verdict.confidence,
                "Face verification completed"
            );
            FaceCheck {
                verified: verdict.verified,
                confidence: verdict.confidence,
                message: if verdict.verified {
                    "Face verified successfully".to_string()
                } else {
                    "Face verification failed".to_string()
                },
            }
        }
        Err(e) => {
            tracing::warn!(usn = %usn, error = %e, "Face-match service failed");
            FaceCheck::failed(format!("Verification error: {}", e))
        }
    }
}

/// Face evidence flag for a QR mark.
///
/// With no matcher configured, a non-empty image is enough.
pub async fn face_evidence(
    matcher: Option<&dyn FaceMatcher>,
    face_dir: &Path,
    usn: &str,
    image: Option<&str>,
) -> bool {
    let image = image.map(str::trim).filter(|s| !s.is_empty());
    let submitted = image.is_some();

    let verdict = match (matcher, image) {
        (Some(matcher), Some(image)) => Some(check_face(matcher, face_dir, usn, image).await.verified),
        (Some(_), None) => Some(false),
        (None, _) => None,
    };

    face_present(submitted, verdict)
}

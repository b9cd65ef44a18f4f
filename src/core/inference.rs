//! Client for the remote inference server.
//!
//! The server accepts a multipart upload with the image in the `f1` field and
//! answers with `{"prediction": [[{"class", "score", "box"}, ...], ...]}`.

use super::error::CoreError;
use crate::utils::paths::{provision_default, RawPath};
use reqwest::blocking::{multipart, Client};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/infer";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const UPLOAD_FIELD: &str = "f1";

/// One detection record as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub class: String,
    pub score: f64,
    #[serde(rename = "box")]
    pub bbox: [i64; 4],
}

/// The parsed response body: a sequence of per-region detection lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    pub prediction: Vec<Vec<Detection>>,
}

impl DetectionResponse {
    /// All detections, flattened, in response order.
    pub fn detections(&self) -> impl Iterator<Item = &Detection> {
        self.prediction.iter().flatten()
    }
}

/// The raw response together with the resolved path that was uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub image_path: PathBuf,
    pub result: DetectionResponse,
}

/// Anything that can turn an image path into an [`AnalysisResult`].
///
/// The scan orchestrator only depends on this trait, so tests can substitute
/// a scripted backend for the HTTP client.
pub trait InferenceBackend: Send + Sync {
    fn analyze(&self, image_path: &Path) -> Result<AnalysisResult, CoreError>;
}

/// Blocking HTTP client for the inference server.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    base_url: String,
    http: Client,
}

impl InferenceClient {
    /// Create a new client posting to `base_url`, with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CoreError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(CoreError::Transport)?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    /// Returns the URL every upload is posted to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Uploads one image and returns the parsed detections.
    ///
    /// Fails with [`CoreError::FileNotFound`] before any network traffic when
    /// the path is not an existing regular file. A non-2xx answer becomes
    /// [`CoreError::Http`] and is not retried.
    pub fn analyze(&self, image_path: impl Into<RawPath>) -> Result<AnalysisResult, CoreError> {
        let image_path = provision_default(image_path)?;
        if !image_path.is_file() {
            return Err(CoreError::FileNotFound(image_path));
        }

        let form = Self::build_form(&image_path)?;
        tracing::debug!("Uploading {} to {}", image_path.display(), self.base_url);

        let response = self
            .http
            .post(&self.base_url)
            .multipart(form)
            .send()
            .map_err(CoreError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CoreError::Http {
                status: status.as_u16(),
                url: self.base_url.clone(),
            });
        }

        let result: DetectionResponse = response.json().map_err(CoreError::InvalidResponse)?;
        tracing::debug!(
            "{} returned {} detection(s)",
            image_path.display(),
            result.detections().count()
        );

        Ok(AnalysisResult { image_path, result })
    }

    fn build_form(image_path: &Path) -> Result<multipart::Form, CoreError> {
        let io_err = |e: std::io::Error| CoreError::Io(e, image_path.to_path_buf());
        let file = File::open(image_path).map_err(io_err)?;
        let length = file.metadata().map_err(io_err)?.len();

        let file_name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_guess::from_path(image_path).first_or_octet_stream();

        let part = multipart::Part::reader_with_length(file, length)
            .file_name(file_name)
            .mime_str(mime.essence_str())
            .map_err(CoreError::Transport)?;

        Ok(multipart::Form::new().part(UPLOAD_FIELD, part))
    }
}

impl InferenceBackend for InferenceClient {
    fn analyze(&self, image_path: &Path) -> Result<AnalysisResult, CoreError> {
        InferenceClient::analyze(self, image_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_helpers::{spawn_inference_responder, write_files};
    use std::net::TcpListener;
    use tempfile::tempdir;

    const BODY: &str = r#"{"prediction": [[{"class": "FACE_MALE", "score": 0.91, "box": [1, 2, 30, 40]}], [{"class": "FEET_EXPOSED", "score": 0.4, "box": [5, 6, 7, 8]}]]}"#;

    #[test]
    fn test_analyze_uploads_file_as_f1_and_parses_response() {
        let dir = tempdir().unwrap();
        let paths = write_files(dir.path(), &[("holiday.jpg", 64)]);
        let responder = spawn_inference_responder(200, BODY, 1);

        let client = InferenceClient::new(responder.url.clone(), Duration::from_secs(5)).unwrap();
        let analysis = client.analyze(&paths[0]).unwrap();

        assert_eq!(analysis.image_path, std::fs::canonicalize(&paths[0]).unwrap());
        let classes: Vec<_> = analysis.result.detections().map(|d| d.class.as_str()).collect();
        assert_eq!(classes, vec!["FACE_MALE", "FEET_EXPOSED"]);
        assert_eq!(analysis.result.prediction[0][0].bbox, [1, 2, 30, 40]);

        let requests = responder.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST "));
        assert!(requests[0].contains("name=\"f1\""));
        assert!(requests[0].contains("filename=\"holiday.jpg\""));
        assert!(requests[0].contains("image/jpeg"));
    }

    #[test]
    fn test_non_success_status_is_http_error() {
        let dir = tempdir().unwrap();
        let paths = write_files(dir.path(), &[("a.png", 8)]);
        let responder = spawn_inference_responder(503, "{}", 1);

        let client = InferenceClient::new(responder.url.clone(), Duration::from_secs(5)).unwrap();
        let err = client.analyze(&paths[0]).unwrap_err();
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_malformed_body_is_invalid_response() {
        let dir = tempdir().unwrap();
        let paths = write_files(dir.path(), &[("a.png", 8)]);
        let responder = spawn_inference_responder(200, "not json", 1);

        let client = InferenceClient::new(responder.url.clone(), Duration::from_secs(5)).unwrap();
        let err = client.analyze(&paths[0]).unwrap_err();
        assert!(matches!(err, CoreError::InvalidResponse(_)));
    }

    #[test]
    fn test_missing_file_fails_before_network() {
        let dir = tempdir().unwrap();
        // Nothing listens on this URL; a network attempt would be a transport error.
        let client = InferenceClient::new("http://127.0.0.1:9/infer", Duration::from_secs(1)).unwrap();
        let err = client.analyze(dir.path().join("missing.png")).unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));

        let err = client.analyze(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::FileNotFound(_)));
    }

    #[test]
    fn test_refused_connection_is_transport_error() {
        let dir = tempdir().unwrap();
        let paths = write_files(dir.path(), &[("a.png", 8)]);
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let client =
            InferenceClient::new(format!("http://127.0.0.1:{port}/infer"), Duration::from_secs(2)).unwrap();
        let err = client.analyze(&paths[0]).unwrap_err();
        assert!(matches!(err, CoreError::Transport(_)));
    }

    #[test]
    fn test_missing_prediction_key_means_no_detections() {
        let response: DetectionResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(response.detections().count(), 0);
    }
}

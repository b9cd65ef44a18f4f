//! Shared fixtures for unit and integration tests.

use crate::core::error::CoreError;
use crate::core::inference::{AnalysisResult, Detection, DetectionResponse, InferenceBackend};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Routes tracing output of the calling thread to the test writer.
///
/// The subscriber is thread-local, so it never competes with the global one
/// installed by `#[traced_test]`. Keep the guard alive for the whole test.
#[must_use]
pub fn setup_test_logging() -> tracing::subscriber::DefaultGuard {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Returns true when the current process runs as root (UID 0).
/// Permission-sensitive tests are skipped in that case.
#[cfg(test)]
#[inline]
pub fn running_as_root() -> bool {
    #[cfg(unix)]
    {
        // SAFETY: libc call has no side effects; used for testing only.
        unsafe { libc::geteuid() == 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}

/// Builds a single detection record as the inference server would return it.
pub fn detection(class: &str, score: f64, bbox: [i64; 4]) -> Detection {
    Detection {
        class: class.to_string(),
        score,
        bbox,
    }
}

/// Writes `(file name, size in bytes)` fixtures into `dir` and returns their paths.
pub fn write_files(dir: &Path, files: &[(&str, usize)]) -> Vec<PathBuf> {
    files
        .iter()
        .map(|(name, size)| {
            let path = dir.join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).expect("Failed to create fixture dir");
            }
            fs::write(&path, vec![0xAB_u8; *size]).expect("Failed to write fixture");
            path
        })
        .collect()
}

/// A scripted [`InferenceBackend`] that never touches the network.
///
/// Every existing file gets the configured detections; file names registered
/// with [`FakeBackend::failing_on`] answer with the given HTTP status instead.
#[derive(Debug, Default)]
pub struct FakeBackend {
    detections: Vec<Detection>,
    failures: HashMap<String, u16>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_detections(mut self, detections: Vec<Detection>) -> Self {
        self.detections = detections;
        self
    }

    pub fn failing_on(mut self, file_name: &str, status: u16) -> Self {
        self.failures.insert(file_name.to_string(), status);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `analyze` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl InferenceBackend for FakeBackend {
    fn analyze(&self, image_path: &Path) -> Result<AnalysisResult, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        let file_name = image_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if let Some(status) = self.failures.get(file_name) {
            return Err(CoreError::Http {
                status: *status,
                url: "fake://infer".to_string(),
            });
        }
        if !image_path.is_file() {
            return Err(CoreError::FileNotFound(image_path.to_path_buf()));
        }

        Ok(AnalysisResult {
            image_path: image_path.to_path_buf(),
            result: DetectionResponse {
                prediction: vec![self.detections.clone()],
            },
        })
    }
}

/// A throwaway HTTP endpoint answering every request with a canned response.
///
/// Serves at most `max_requests` connections, each on its own thread, and
/// records the raw request text for assertions.
pub struct InferenceResponder {
    pub url: String,
    requests: std::sync::Arc<std::sync::Mutex<Vec<String>>>,
}

impl InferenceResponder {
    /// Raw text (lossy UTF-8) of every request served so far.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

pub fn spawn_inference_responder(status: u16, body: &str, max_requests: usize) -> InferenceResponder {
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind responder");
    let url = format!(
        "http://{}/infer",
        listener.local_addr().expect("Responder has no address")
    );
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&requests);
    let body = body.to_string();

    std::thread::spawn(move || {
        for stream in listener.incoming().take(max_requests) {
            let Ok(stream) = stream else { continue };
            let recorded = Arc::clone(&recorded);
            let body = body.clone();
            std::thread::spawn(move || serve_one(stream, status, &body, &recorded));
        }
    });

    InferenceResponder { url, requests }
}

fn serve_one(
    mut stream: std::net::TcpStream,
    status: u16,
    body: &str,
    recorded: &std::sync::Mutex<Vec<String>>,
) {
    use std::io::{Read, Write};

    let mut raw = Vec::new();
    let mut chunk = [0_u8; 4096];
    loop {
        if request_complete(&raw) {
            break;
        }
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => raw.extend_from_slice(&chunk[..n]),
        }
    }

    recorded
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(String::from_utf8_lossy(&raw).into_owned());

    let reason = if (200..300).contains(&status) { "OK" } else { "Error" };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(response.as_bytes()).ok();
    stream.flush().ok();
}

fn request_complete(raw: &[u8]) -> bool {
    let Some(header_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
        return false;
    };
    let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
    let body_len = raw.len() - (header_end + 4);

    let content_length = headers
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok());

    match content_length {
        Some(expected) => body_len >= expected,
        None if headers.contains("transfer-encoding: chunked") => raw.ends_with(b"0\r\n\r\n"),
        None => true,
    }
}

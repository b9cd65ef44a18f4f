//! Integration tests for the pic-scanner browsing controller and scan pipeline.
//!
//! These tests use an async-aware MPSC channel from `tokio::sync` to avoid
//! deadlocks between the test thread and the application's async tasks.

use pic_scanner::app::{self, events::UserEvent, proxy::EventProxy, state::AppState};
use pic_scanner::config::{history, settings, AppConfig};
use pic_scanner::core::{
    AnalysisResult, CoreError, Detection, DetectionResponse, ImageScanner, InferenceBackend,
    InferenceClient, ScanOptions,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Contains the test infrastructure.
mod helpers {
    use super::*;
    use std::fs;

    /// Answers by file name: `nsfw*` files are flagged, `broken*` files fail
    /// with HTTP 500, everything else shows a face.
    pub struct ScriptedBackend;

    impl InferenceBackend for ScriptedBackend {
        fn analyze(&self, image_path: &Path) -> Result<AnalysisResult, CoreError> {
            let name = image_path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if name.starts_with("broken") {
                return Err(CoreError::Http {
                    status: 500,
                    url: "scripted://infer".to_string(),
                });
            }
            let class = if name.starts_with("nsfw") {
                "FEMALE_GENITALIA_EXPOSED"
            } else {
                "FACE_FEMALE"
            };
            Ok(AnalysisResult {
                image_path: image_path.to_path_buf(),
                result: DetectionResponse {
                    prediction: vec![vec![Detection {
                        class: class.to_string(),
                        score: 0.87,
                        bbox: [10, 20, 30, 40],
                    }]],
                },
            })
        }
    }

    /// A test double for the front end's event channel.
    #[derive(Clone)]
    pub struct TestEventProxy {
        pub sender: mpsc::UnboundedSender<UserEvent>,
    }

    impl EventProxy for TestEventProxy {
        fn send_event(&self, event: UserEvent) {
            if let Err(e) = self.sender.send(event) {
                // Panic in a test if the receiver is dropped, as it indicates a test setup error.
                panic!("Test receiver dropped: {:?}", e.0);
            }
        }
    }

    /// `TestHarness` sets up a complete, isolated environment for each test case.
    pub struct TestHarness {
        pub state: Arc<Mutex<AppState>>,
        pub proxy: TestEventProxy,
        pub event_rx: mpsc::UnboundedReceiver<UserEvent>,
        pub root_path: PathBuf,
        pub config_dir: PathBuf,
        pub data_dir: PathBuf,
        pub backup_dir: PathBuf,
        _temp_dir: TempDir,
    }

    impl TestHarness {
        pub fn new() -> Self {
            let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
            let base = fs::canonicalize(temp_dir.path()).expect("Failed to canonicalize temp dir");
            let root_path = base.join("pictures");
            fs::create_dir_all(&root_path).expect("Failed to create picture dir");
            let config_dir = base.join("config");
            let data_dir = base.join("data");
            let backup_dir = base.join("backups");
            let (event_tx, event_rx) = mpsc::unbounded_channel();

            let config = AppConfig {
                backup_directory: Some(backup_dir.clone()),
                ..Default::default()
            };
            let state = AppState::new(config, Arc::new(ScriptedBackend))
                .with_directories(Some(config_dir.clone()), Some(data_dir.clone()));
            // current_path is set by start_scan_on_path, so we leave it empty here.

            Self {
                state: Arc::new(Mutex::new(state)),
                proxy: TestEventProxy { sender: event_tx },
                event_rx,
                root_path,
                config_dir,
                data_dir,
                backup_dir,
                _temp_dir: temp_dir,
            }
        }

        /// Creates a file inside the picture directory.
        pub fn create_file(&self, path: &str, content: &str) {
            let file_path = self.root_path.join(path);
            if let Some(parent) = file_path.parent() {
                fs::create_dir_all(parent).expect("Failed to create parent dir");
            }
            fs::write(file_path, content).expect("Failed to write file");
        }

        /// A folder with two flagged pictures, one harmless picture, one that
        /// the backend rejects and a text file that is not a picture at all.
        pub fn setup_picture_folder(&self) {
            self.create_file("nsfw_1.jpg", "not really a jpeg");
            self.create_file("nsfw_2.png", "not really a png");
            self.create_file("portrait.jpeg", "not really a jpeg either");
            self.create_file("broken.bmp", "garbage");
            self.create_file("notes.txt", "ignored");
        }

        /// Waits until the scan reports completion and the follow-up state update arrives.
        pub async fn wait_for_scan_completion(&mut self) -> (usize, usize) {
            let mut finished = None;
            loop {
                match tokio::time::timeout(Duration::from_secs(10), self.event_rx.recv()).await {
                    Ok(Some(UserEvent::ScanFinished { scanned, failed })) => {
                        finished = Some((scanned, failed));
                    }
                    Ok(Some(UserEvent::StateUpdate(view))) => {
                        if let (Some(counts), false) = (finished, view.is_scanning) {
                            return counts;
                        }
                    }
                    Ok(Some(UserEvent::ShowError(message))) => panic!("Scan failed: {message}"),
                    Ok(Some(_)) => { /* Ignore progress events */ }
                    _ => panic!("Scan did not complete within timeout or channel closed"),
                }
            }
        }

        pub fn drain_events(&mut self) -> Vec<UserEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.event_rx.try_recv() {
                events.push(event);
            }
            events
        }
    }

    /// Serves `requests` canned JSON answers on a local port and returns the upload URL.
    pub fn spawn_responder(body: &'static str, requests: usize) -> String {
        use std::io::{Read, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind responder");
        let url = format!("http://{}/infer", listener.local_addr().unwrap());

        std::thread::spawn(move || {
            for stream in listener.incoming().take(requests) {
                let Ok(mut stream) = stream else { continue };
                std::thread::spawn(move || {
                    let mut raw = Vec::new();
                    let mut chunk = [0_u8; 4096];
                    while !upload_finished(&raw) {
                        match stream.read(&mut chunk) {
                            Ok(0) | Err(_) => break,
                            Ok(n) => raw.extend_from_slice(&chunk[..n]),
                        }
                    }
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    stream.write_all(response.as_bytes()).ok();
                });
            }
        });

        url
    }

    fn upload_finished(raw: &[u8]) -> bool {
        let Some(header_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };
        let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
        let expected = headers
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());
        match expected {
            Some(len) => raw.len() - (header_end + 4) >= len,
            None => raw.ends_with(b"0\r\n\r\n"),
        }
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scan_directory_stores_report_and_history() {
    // --- ARRANGE ---
    let mut harness = helpers::TestHarness::new();
    harness.setup_picture_folder();

    // --- ACT ---
    app::tasks::start_scan_on_path(
        harness.root_path.clone(),
        harness.proxy.clone(),
        harness.state.clone(),
    );
    let (scanned, failed) = harness.wait_for_scan_completion().await;

    // --- ASSERT ---
    assert_eq!((scanned, failed), (3, 1));
    {
        let state = harness.state.lock().unwrap();
        assert!(!state.is_scanning);
        assert_eq!(state.files.len(), 4, "notes.txt is not a picture");

        let report = state.report.as_ref().expect("Report should be stored");
        let failed_names: Vec<_> = report
            .failed_paths()
            .iter()
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .collect();
        assert_eq!(failed_names, vec!["broken.bmp"]);

        let flagged: HashSet<_> = report
            .images
            .iter()
            .filter(|image| state.policy.is_concerning(image))
            .map(|image| image.file_name())
            .collect();
        assert_eq!(
            flagged,
            HashSet::from(["nsfw_1.jpg".to_string(), "nsfw_2.png".to_string()])
        );
    }

    let config = settings::load_config(Some(&harness.config_dir)).unwrap();
    assert_eq!(config.last_directory.as_deref(), Some(harness.root_path.as_path()));

    let entries = history::load_history(Some(&harness.data_dir)).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].root, harness.root_path);
    assert_eq!((entries[0].scanned, entries[0].failed), (3, 1));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_remove_after_scan_backs_up_and_updates_collection() {
    // --- ARRANGE ---
    let mut harness = helpers::TestHarness::new();
    harness.setup_picture_folder();
    app::tasks::start_scan_on_path(
        harness.root_path.clone(),
        harness.proxy.clone(),
        harness.state.clone(),
    );
    harness.wait_for_scan_completion().await;
    harness.drain_events();

    // --- ACT ---
    // Files are sorted by name, so the cursor starts on broken.bmp.
    app::commands::dispatch(
        app::controls::Command::NextImage,
        harness.proxy.clone(),
        harness.state.clone(),
    );
    let target = harness
        .state
        .lock()
        .unwrap()
        .current_image_path()
        .map(Path::to_path_buf)
        .expect("An image should be selected");
    app::commands::dispatch(
        app::controls::Command::RemoveCurrent,
        harness.proxy.clone(),
        harness.state.clone(),
    );

    // --- ASSERT ---
    assert_eq!(target.file_name().unwrap(), "nsfw_1.jpg");
    assert!(!target.exists());

    {
        let state = harness.state.lock().unwrap();
        assert_eq!(state.files.len(), 3);
        assert!(state.files.position(&target).is_none());
    }

    let events = harness.drain_events();
    let backup = events
        .iter()
        .find_map(|e| match e {
            UserEvent::FileRemoved { path, backup } if path == &target => Some(backup.clone()),
            _ => None,
        })
        .expect("FileRemoved should be sent");
    assert_eq!(backup.parent(), Some(harness.backup_dir.as_path()));
    assert_eq!(std::fs::read_to_string(&backup).unwrap(), "not really a jpeg");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_start_scan_on_missing_directory_reports_error() {
    let mut harness = helpers::TestHarness::new();
    let missing = harness.root_path.join("missing").join("photo.jpg");

    app::tasks::start_scan_on_path(missing, harness.proxy.clone(), harness.state.clone());

    match tokio::time::timeout(Duration::from_secs(5), harness.event_rx.recv()).await {
        Ok(Some(UserEvent::ShowError(message))) => assert!(message.contains("not a valid directory")),
        other => panic!("Expected ShowError, got {:?}", other),
    }
    assert!(!harness.state.lock().unwrap().is_scanning);
}

#[test]
fn test_threaded_and_sequential_scans_agree() {
    let harness = helpers::TestHarness::new();
    for i in 0..12 {
        let prefix = if i % 3 == 0 { "nsfw" } else { "pic" };
        harness.create_file(&format!("{prefix}_{i:02}.jpg"), "bytes");
    }
    harness.create_file("broken_01.png", "bytes");

    let files = pic_scanner::core::gather_picture_files(&harness.root_path, false, &[]).unwrap();
    let sequential = ImageScanner::new(Arc::new(helpers::ScriptedBackend), ScanOptions::default())
        .scan(files.clone())
        .unwrap();
    let threaded = ImageScanner::new(
        Arc::new(helpers::ScriptedBackend),
        ScanOptions {
            threaded: true,
            worker_count: 4,
        },
    )
    .scan(files)
    .unwrap();

    let names = |report: &pic_scanner::core::ScanReport| -> HashSet<(String, Vec<&'static str>)> {
        report
            .images
            .iter()
            .map(|image| (image.file_name(), image.concern_names()))
            .collect()
    };
    assert_eq!(sequential.scanned_count(), 12);
    assert_eq!(threaded.scanned_count(), 12);
    assert_eq!(names(&sequential), names(&threaded));
    assert_eq!(sequential.failed_paths(), threaded.failed_paths());
}

#[test]
fn test_http_client_scan_end_to_end() {
    const BODY: &str = r#"{"prediction": [[{"class": "BUTTOCKS_EXPOSED", "score": 0.77, "box": [0, 0, 50, 60]}, {"class": "NOT_A_LABEL", "score": 0.5, "box": [1, 1, 1, 1]}]]}"#;

    let harness = helpers::TestHarness::new();
    harness.create_file("a.jpg", "first upload");
    harness.create_file("b.png", "second upload");
    let url = helpers::spawn_responder(BODY, 2);

    let client = InferenceClient::new(url, Duration::from_secs(10)).unwrap();
    let scanner = ImageScanner::new(
        Arc::new(client),
        ScanOptions {
            threaded: true,
            worker_count: 2,
        },
    );
    let files = pic_scanner::core::gather_picture_files(&harness.root_path, false, &[]).unwrap();
    let report = scanner.scan(files).unwrap();

    assert_eq!(report.failed_count(), 0);
    assert_eq!(report.scanned_count(), 2);
    for image in report.images.iter() {
        assert_eq!(image.concern_names(), vec!["BUTTOCKS_EXPOSED"]);
        assert_eq!(image.concerns()[0].location(), [0, 0, 50, 60]);
    }
}

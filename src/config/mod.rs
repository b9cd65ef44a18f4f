pub mod history;
pub mod settings;

use crate::core::error::CoreError;
use crate::core::inference::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
use crate::core::interest::{InterestLevel, InterestPolicy};
use crate::core::scanner::{ScanOptions, DEFAULT_WORKER_COUNT};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
    pub threaded: bool,
    pub worker_count: usize,
    pub recursive: bool,
    pub exclude_dir_names: Vec<String>,
    pub backup_directory: Option<PathBuf>,
    pub last_directory: Option<PathBuf>,
    pub concerning_labels: Vec<String>,
    pub non_interesting_labels: Vec<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        settings::load_config(None)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            threaded: self.threaded,
            worker_count: self.worker_count,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The interest policy described by the two label lists.
    pub fn interest_policy(&self) -> Result<InterestPolicy, CoreError> {
        InterestPolicy::from_lists(&self.concerning_labels, &self.non_interesting_labels)
    }

    /// Like [`AppConfig::interest_policy`], but invalid label lists fall
    /// back to the recommended policy with a warning.
    pub fn interest_policy_or_recommended(&self) -> InterestPolicy {
        self.interest_policy().unwrap_or_else(|e| {
            tracing::warn!("Ignoring invalid interest labels in config: {}", e);
            InterestPolicy::recommended()
        })
    }

    pub fn set_interest_policy(&mut self, policy: &InterestPolicy) {
        self.concerning_labels = label_list(policy, InterestLevel::Concerning);
        self.non_interesting_labels = label_list(policy, InterestLevel::NonInteresting);
    }
}

fn label_list(policy: &InterestPolicy, level: InterestLevel) -> Vec<String> {
    policy
        .labels_at(level)
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut config = Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            threaded: false,
            worker_count: DEFAULT_WORKER_COUNT,
            recursive: false,
            exclude_dir_names: vec!["backups".to_string()],
            backup_directory: settings::get_data_directory().map(|dir| dir.join("backups")),
            last_directory: None,
            concerning_labels: Vec::new(),
            non_interesting_labels: Vec::new(),
        };
        config.set_interest_policy(&InterestPolicy::recommended());
        config
    }
}

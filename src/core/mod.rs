pub mod concern;
pub mod discovery;
pub mod error;
pub mod file_collection;
pub mod image;
pub mod inference;
pub mod interest;
pub mod labels;
pub mod scanner;
pub mod units;

pub use concern::Concern;
pub use discovery::gather_picture_files;
pub use error::CoreError;
pub use file_collection::{ExtensionStats, FileCollection};
pub use image::{create_scanned_image, ScannedImage, ScannedImageCollection};
pub use inference::{AnalysisResult, Detection, DetectionResponse, InferenceBackend, InferenceClient};
pub use interest::{InterestLevel, InterestPolicy};
pub use scanner::{FailedScan, ImageScanner, ScanOptions, ScanProgress, ScanReport, ScanTargets};
pub use units::{lowest_unit_size, SizeUnit};

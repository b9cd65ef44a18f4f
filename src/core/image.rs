//! Scanned images and the collection a scan produces.

use super::concern::Concern;
use super::error::CoreError;
use super::inference::AnalysisResult;
use super::labels;
use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

const DEFAULT_BACKUP_DIR: &str = "backups";
const BACKUP_SUFFIX: &str = "bak";
const BACKUP_TAG_LEN: usize = 16;

/// An image that went through inference, with the concerns found in it.
#[derive(Debug, Clone)]
pub struct ScannedImage {
    image_path: PathBuf,
    checksum: OnceCell<String>,
    concerns: Vec<Concern>,
}

impl ScannedImage {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            checksum: OnceCell::new(),
            concerns: Vec::new(),
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn add_concern(&mut self, concern: Concern) {
        self.concerns.push(concern);
    }

    pub fn concerns(&self) -> &[Concern] {
        &self.concerns
    }

    pub fn concern_count(&self) -> usize {
        self.concerns.len()
    }

    /// Names of all concerns in detection order, duplicates included.
    pub fn concern_names(&self) -> Vec<&'static str> {
        self.concerns.iter().map(Concern::name).collect()
    }

    /// Concerns whose name matches `name` exactly.
    pub fn concerns_named(&self, name: &str) -> Vec<&Concern> {
        self.concerns.iter().filter(|c| c.name() == name).collect()
    }

    pub fn has_concern(&self, name: &str, case_sensitive: bool) -> bool {
        self.concerns.iter().any(|c| {
            if case_sensitive {
                c.name() == name
            } else {
                c.name().eq_ignore_ascii_case(name)
            }
        })
    }

    /// SHA-256 of the file content as lower-case hex.
    ///
    /// Computed on first access and cached for the lifetime of this value.
    /// Concurrent callers block on the one computation in flight. A failed
    /// read is not cached.
    pub fn checksum(&self) -> Result<&str, CoreError> {
        self.checksum
            .get_or_try_init(|| hash_file(&self.image_path))
            .map(String::as_str)
    }

    /// Where [`ScannedImage::backup`] puts the copy for `backup_dir`.
    ///
    /// The name is `<file name>.<checksum prefix>.bak`, so same-named files
    /// from different directories never share a backup unless their bytes
    /// are identical. Fails when the image cannot be read.
    pub fn backup_path(&self, backup_dir: Option<&Path>) -> Result<PathBuf, CoreError> {
        let dir = match backup_dir {
            Some(dir) => dir.to_path_buf(),
            None => self
                .image_path
                .parent()
                .map(|parent| parent.join(DEFAULT_BACKUP_DIR))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
        };
        let checksum = self.checksum()?;
        let tag = &checksum[..BACKUP_TAG_LEN.min(checksum.len())];
        Ok(dir.join(format!("{}.{}.{}", self.file_name(), tag, BACKUP_SUFFIX)))
    }

    /// Whether a backup of the image's current content exists.
    pub fn is_backed_up(&self, backup_dir: Option<&Path>) -> bool {
        self.backup_path(backup_dir)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Copies the image into `backup_dir`, creating the directory if needed.
    ///
    /// Existing files are never overwritten: when a backup with the same
    /// name exists it already holds these bytes and is returned as is.
    /// Returns the path of the copy.
    pub fn backup(&self, backup_dir: Option<&Path>) -> Result<PathBuf, CoreError> {
        let target = self.backup_path(backup_dir)?;
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir).map_err(|e| CoreError::Io(e, dir.to_path_buf()))?;
        }

        let mut copy = match OpenOptions::new().write(true).create_new(true).open(&target) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!("{} is already backed up at {}", self.image_path.display(), target.display());
                return Ok(target);
            }
            Err(e) => return Err(CoreError::Io(e, target)),
        };
        let mut source = File::open(&self.image_path).map_err(|e| CoreError::Io(e, self.image_path.clone()))?;
        if let Err(e) = io::copy(&mut source, &mut copy) {
            // a partial copy must not pass for a backup later on
            drop(copy);
            fs::remove_file(&target).ok();
            return Err(CoreError::Io(e, self.image_path.clone()));
        }

        tracing::info!(
            "Backed up {} to {}",
            self.image_path.display(),
            target.display()
        );
        Ok(target)
    }

    /// Moves the file into `new_dir`, optionally renaming it, and updates
    /// the stored path. The path only changes after the move succeeded.
    pub fn move_to(&mut self, new_dir: &Path, new_name: Option<&str>) -> Result<&Path, CoreError> {
        fs::create_dir_all(new_dir).map_err(|e| CoreError::Io(e, new_dir.to_path_buf()))?;
        let name = new_name.map(str::to_string).unwrap_or_else(|| self.file_name());
        let target = new_dir.join(name);

        if fs::rename(&self.image_path, &target).is_err() {
            // rename fails across filesystems
            fs::copy(&self.image_path, &target)
                .map_err(|e| CoreError::Io(e, self.image_path.clone()))?;
            fs::remove_file(&self.image_path).map_err(|e| CoreError::Io(e, self.image_path.clone()))?;
        }

        tracing::debug!("Moved {} to {}", self.image_path.display(), target.display());
        self.image_path = target;
        Ok(&self.image_path)
    }
}

fn hash_file(path: &Path) -> Result<String, CoreError> {
    let mut file = File::open(path).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| CoreError::Io(e, path.to_path_buf()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Builds a [`ScannedImage`] from a server response.
///
/// Detections with a class outside of the label table are skipped. A
/// detection with an out-of-range score fails the whole image.
pub fn create_scanned_image(analysis: AnalysisResult) -> Result<ScannedImage, CoreError> {
    let mut image = ScannedImage::new(analysis.image_path);

    for detection in analysis.result.detections() {
        if !labels::is_valid_label(&detection.class) {
            tracing::debug!(
                "Skipping unknown label {} in {}",
                detection.class,
                image.image_path.display()
            );
            continue;
        }
        image.add_concern(Concern::new(
            &detection.class,
            detection.score,
            detection.bbox,
            None,
        )?);
    }

    Ok(image)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum CollectionState {
    #[default]
    Open,
    Closed,
}

/// The ordered result set of one scan.
///
/// Open for appends while the scan runs; [`ScannedImageCollection::finalize`]
/// closes it for good.
#[derive(Debug, Clone, Default)]
pub struct ScannedImageCollection {
    images: Vec<ScannedImage>,
    state: CollectionState,
}

impl ScannedImageCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_image(&mut self, image: ScannedImage) -> Result<(), CoreError> {
        if self.state == CollectionState::Closed {
            return Err(CoreError::CollectionClosed);
        }
        self.images.push(image);
        Ok(())
    }

    pub fn finalize(&mut self) {
        self.state = CollectionState::Closed;
    }

    pub fn is_finalized(&self) -> bool {
        self.state == CollectionState::Closed
    }

    pub fn images(&self) -> &[ScannedImage] {
        &self.images
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ScannedImage> {
        self.images.iter()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn image_count(&self) -> usize {
        self.len()
    }

    pub fn image_paths(&self) -> Vec<&Path> {
        self.images.iter().map(ScannedImage::image_path).collect()
    }

    pub fn get_image(&self, path: &Path) -> Option<&ScannedImage> {
        self.images.iter().find(|image| image.image_path == path)
    }

    /// Mutable lookup; the only way to relocate an image after finalize.
    pub fn get_image_mut(&mut self, path: &Path) -> Option<&mut ScannedImage> {
        self.images.iter_mut().find(|image| image.image_path == path)
    }

    /// Distinct concern names across all images, sorted.
    pub fn concern_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .images
            .iter()
            .flat_map(|image| image.concerns.iter().map(Concern::name))
            .collect();
        names.sort_unstable();
        names.dedup();
        names
    }

    /// Total number of concerns across all images.
    pub fn concern_count(&self) -> usize {
        self.images.iter().map(ScannedImage::concern_count).sum()
    }

    pub fn all_with_concern(&self, name: &str, case_sensitive: bool) -> Vec<&ScannedImage> {
        self.images
            .iter()
            .filter(|image| image.has_concern(name, case_sensitive))
            .collect()
    }

    pub fn concerns_named(&self, name: &str) -> Vec<&Concern> {
        self.images
            .iter()
            .flat_map(|image| image.concerns_named(name))
            .collect()
    }

    /// Every concern scoring at least `score`.
    pub fn concerns_at_least(&self, score: f64) -> Vec<&Concern> {
        self.images
            .iter()
            .flat_map(|image| image.concerns.iter())
            .filter(|concern| concern.score() >= score)
            .collect()
    }
}

impl<'a> IntoIterator for &'a ScannedImageCollection {
    type Item = &'a ScannedImage;
    type IntoIter = std::slice::Iter<'a, ScannedImage>;

    fn into_iter(self) -> Self::IntoIter {
        self.images.iter()
    }
}

//! Bulk archives: a zip with a manifest at its root and an images directory.
//!
//! The archive is unpacked into a scratch directory and then imported exactly
//! like an on-disk manifest, resolving images by file name against the images
//! directory.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, warn};
use zip::ZipArchive;

use crate::client::AssetService;
use crate::config::ManifestSource;
use crate::error::Result;
use crate::ingestion::run_import;
use crate::summary::ImportReport;

pub const DEFAULT_IMAGES_SUBDIR: &str = "images";

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to read archive {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to extract archive: {0}")]
    Extract(#[from] io::Error),

    #[error("no manifest (*.csv) found in archive")]
    ManifestNotFound,

    #[error("invalid manifest search pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("archive {} has no `{}` directory", archive.display(), subdir.display())]
    ImagesDirMissing { archive: PathBuf, subdir: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    /// Directory inside the archive that holds the images.
    pub images_subdir: PathBuf,
}

impl Default for ArchiveLayout {
    fn default() -> Self {
        Self {
            images_subdir: PathBuf::from(DEFAULT_IMAGES_SUBDIR),
        }
    }
}

/// An unpacked archive. The scratch directory is removed on drop.
#[derive(Debug)]
pub struct ExtractedArchive {
    dir: TempDir,
    pub source: ManifestSource,
}

impl ExtractedArchive {
    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// Unpacks into a fresh directory under the system temp location.
pub fn extract_archive(
    archive_path: &Path,
    layout: &ArchiveLayout,
) -> std::result::Result<ExtractedArchive, ArchiveError> {
    extract_archive_in(archive_path, layout, &std::env::temp_dir())
}

/// Unpacks into a fresh directory created inside `scratch_parent`.
pub fn extract_archive_in(
    archive_path: &Path,
    layout: &ArchiveLayout,
    scratch_parent: &Path,
) -> std::result::Result<ExtractedArchive, ArchiveError> {
    let file = File::open(archive_path).map_err(|source| ArchiveError::Open {
        path: archive_path.to_path_buf(),
        source,
    })?;
    let mut archive = ZipArchive::new(file)?;
    let dir = TempDir::new_in(scratch_parent)?;

    let mut extracted = 0usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            warn!(entry = entry.name(), "skipping archive entry outside extraction root");
            continue;
        };

        let target = dir.path().join(&relative);
        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry, &mut out)?;
        extracted += 1;
    }

    let manifest_path = find_manifest(dir.path())?;
    let image_root = dir.path().join(&layout.images_subdir);
    info!(
        files = extracted,
        manifest = %manifest_path.display(),
        "archive extracted"
    );

    Ok(ExtractedArchive {
        dir,
        source: ManifestSource::new(manifest_path, image_root),
    })
}

/// First `*.csv` at the root, otherwise the first one anywhere below it.
/// The root itself is escaped so brackets or wildcards in its path match literally.
fn find_manifest(root: &Path) -> std::result::Result<PathBuf, ArchiveError> {
    let prefix = glob::Pattern::escape(&root.to_string_lossy());
    for pattern in ["*.csv", "**/*.csv"] {
        let full = format!("{prefix}/{pattern}");
        let mut matches: Vec<PathBuf> = glob::glob(&full)?
            .filter_map(|entry| entry.ok())
            .filter(|path| path.is_file())
            .collect();
        matches.sort();
        if let Some(first) = matches.into_iter().next() {
            return Ok(first);
        }
    }
    Err(ArchiveError::ManifestNotFound)
}

/// Unpacks `archive_path` and imports it against `service`.
pub async fn import_archive<S>(
    archive_path: &Path,
    layout: &ArchiveLayout,
    service: &S,
) -> Result<ImportReport>
where
    S: AssetService + ?Sized,
{
    let extracted = extract_archive(archive_path, layout)?;
    if !extracted.source.image_root.is_dir() {
        return Err(ArchiveError::ImagesDirMissing {
            archive: archive_path.to_path_buf(),
            subdir: layout.images_subdir.clone(),
        }
        .into());
    }
    run_import(&extracted.source, service).await
}

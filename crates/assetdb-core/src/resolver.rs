//! Maps a manifest's declared image path onto a file under the image root.
//!
//! Declared paths are authored relative to wherever the manifest was written,
//! so only the final path segment is used. Two rows that share a file name
//! resolve to the same file.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::validate_image_root;
use crate::error::ConfigError;
use crate::manifest::ManifestRow;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    pub file_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionFailure {
    #[error("file not found: {basename} (looked for {})", attempted.display())]
    NotFound {
        reference_name: String,
        basename: String,
        attempted: PathBuf,
    },

    #[error("file not found: declared path `{declared_path}` has no file name")]
    NoFileName {
        reference_name: String,
        declared_path: String,
    },
}

impl ResolutionFailure {
    pub fn reference_name(&self) -> &str {
        match self {
            Self::NotFound { reference_name, .. } | Self::NoFileName { reference_name, .. } => {
                reference_name
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    image_root: PathBuf,
}

impl PathResolver {
    /// Fails once, up front, if `image_root` is not an existing directory.
    pub fn new(image_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let image_root = image_root.into();
        validate_image_root(&image_root)?;
        Ok(Self { image_root })
    }

    pub fn image_root(&self) -> &Path {
        &self.image_root
    }

    pub fn resolve(&self, row: &ManifestRow) -> Result<ResolvedImage, ResolutionFailure> {
        let Some(basename) = basename(&row.declared_path) else {
            return Err(ResolutionFailure::NoFileName {
                reference_name: row.reference_name.clone(),
                declared_path: row.declared_path.clone(),
            });
        };

        let candidate = self.image_root.join(basename);
        if candidate.is_file() {
            Ok(ResolvedImage {
                path: candidate,
                file_name: basename.to_string(),
            })
        } else {
            Err(ResolutionFailure::NotFound {
                reference_name: row.reference_name.clone(),
                basename: basename.to_string(),
                attempted: candidate,
            })
        }
    }
}

/// Final segment of a declared path. Both `/` and `\` count as separators so
/// manifests written on Windows resolve the same way.
pub fn basename(declared_path: &str) -> Option<&str> {
    let name = declared_path
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

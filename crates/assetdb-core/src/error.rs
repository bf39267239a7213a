// crates/assetdb-core/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::archive::ArchiveError;
use crate::client::ClientError;

/// Problems that make every manifest row unprocessable. Checked before the first row.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("manifest file not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    #[error("image root directory not found: {}", .0.display())]
    ImageRootMissing(PathBuf),

    #[error("image root is not a directory: {}", .0.display())]
    ImageRootNotDirectory(PathBuf),

    #[error("invalid asset service URL `{url}`: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to open manifest {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to read manifest header: {0}")]
    Header(#[source] csv::Error),

    #[error("manifest is missing required column(s): {}", .missing.join(", "))]
    MissingColumns { missing: Vec<&'static str> },

    #[error("malformed record at line {line}: {source}")]
    Record {
        line: u64,
        #[source]
        source: csv::Error,
    },
}

/// Fatal errors for a whole import run. Row-level problems never surface here.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("manifest format error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("asset service is unreachable: {0}")]
    ServiceUnreachable(#[source] ClientError),

    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

pub type Result<T> = std::result::Result<T, ImportError>;

//! Bulk import of cataloged image assets.
//!
//! A manifest (CSV) describes images and their categorical tags. Each row is
//! resolved to a file under an image root and uploaded to the asset service,
//! one request per row, and the outcome of every row lands in an
//! [`ImportReport`].

pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod manifest;
pub mod resolver;
pub mod summary;

pub use client::{AssetService, HttpAssetService};
pub use config::{ImportConfig, ManifestSource, ServiceConfig};
pub use error::{ImportError, Result};
pub use ingestion::run_import;
pub use summary::ImportReport;

//! Explicit configuration for an import run.
//!
//! Everything here is built once at startup and handed to the components that
//! need it. Nothing in the library reads process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;

use crate::error::ConfigError;

pub const DEFAULT_MANIFEST_PATH: &str = "resources/csvs/manifest.csv";
pub const DEFAULT_IMAGE_ROOT: &str = "resources/images";
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8001";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the manifest and the images it references live on local disk.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub manifest_path: PathBuf,
    pub image_root: PathBuf,
}

impl ManifestSource {
    pub fn new(manifest_path: impl Into<PathBuf>, image_root: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            image_root: image_root.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.manifest_path.is_file() {
            return Err(ConfigError::ManifestMissing(self.manifest_path.clone()));
        }
        validate_image_root(&self.image_root)
    }
}

pub(crate) fn validate_image_root(image_root: &Path) -> Result<(), ConfigError> {
    if !image_root.exists() {
        return Err(ConfigError::ImageRootMissing(image_root.to_path_buf()));
    }
    if !image_root.is_dir() {
        return Err(ConfigError::ImageRootNotDirectory(image_root.to_path_buf()));
    }
    Ok(())
}

/// How to reach the asset service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    /// Upper bound for each create/search/download call.
    pub request_timeout: Duration,
    /// Upper bound for the pre-flight health check.
    pub health_timeout: Duration,
}

impl ServiceConfig {
    pub fn new(base_url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };

        let parsed = Url::parse(base_url.trim()).map_err(|err| invalid(err.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme `{}`", parsed.scheme())));
        }
        if parsed.host_str().is_none() {
            return Err(invalid("missing host".to_string()));
        }

        Ok(Self {
            base_url: parsed,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    /// Joins `path` onto the base URL, keeping any path prefix the base carries.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub source: ManifestSource,
    pub service: ServiceConfig,
}

impl ImportConfig {
    pub fn new(
        manifest_path: impl Into<PathBuf>,
        image_root: impl Into<PathBuf>,
        api_base_url: &str,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            source: ManifestSource::new(manifest_path, image_root),
            service: ServiceConfig::new(api_base_url)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.source.validate()
    }
}

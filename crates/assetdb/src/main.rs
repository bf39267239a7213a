use std::path::PathBuf;

use anyhow::{Context, Result};
use assetdb_core::config::{DEFAULT_API_BASE_URL, DEFAULT_IMAGE_ROOT, DEFAULT_MANIFEST_PATH};
use assetdb_core::{run_import, HttpAssetService, ImportConfig};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Bulk-import images described by a CSV manifest into the asset service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// CSV manifest describing the images to import
    #[arg(default_value = DEFAULT_MANIFEST_PATH)]
    manifest: PathBuf,

    /// Directory holding the images; only file names from the manifest are used
    #[arg(default_value = DEFAULT_IMAGE_ROOT)]
    images_dir: PathBuf,

    /// Base URL of the asset service
    #[arg(env = "BACKEND_URL", default_value = DEFAULT_API_BASE_URL)]
    api_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    let config = ImportConfig::new(&cli.manifest, &cli.images_dir, &cli.api_url)
        .context("invalid import configuration")?;
    config.validate().context("import configuration check failed")?;

    info!(
        manifest = %config.source.manifest_path.display(),
        images_dir = %config.source.image_root.display(),
        api_url = %config.service.base_url,
        "configuration loaded"
    );

    let service =
        HttpAssetService::new(&config.service).context("failed to build asset service client")?;

    let report = run_import(&config.source, &service)
        .await
        .with_context(|| format!("import against {} aborted", config.service.base_url))?;

    println!("{}", report.render());
    Ok(())
}

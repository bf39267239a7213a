use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::client::{AssetService, AssetUpload, ClientError, CreatedAsset};
use crate::config::ManifestSource;
use crate::error::{ImportError, Result};
use crate::manifest::{ManifestReader, ManifestRow};
use crate::resolver::{PathResolver, ResolutionFailure};
use crate::summary::{ImportReport, ReportBuilder};

/// Why a single manifest row produced no record.
#[derive(Debug, Error)]
pub enum RowFailure {
    #[error(transparent)]
    Resolution(#[from] ResolutionFailure),

    #[error("could not read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("upload failed: {0}")]
    Upload(#[source] ClientError),

    #[error("malformed manifest row: {0}")]
    Malformed(String),
}

#[derive(Debug)]
pub enum RowOutcome {
    Uploaded {
        file_name: String,
        asset: CreatedAsset,
    },
    Failed(RowFailure),
}

/// Runs one import: checks configuration, confirms the service answers, then
/// uploads every manifest row in order.
///
/// Only configuration, manifest-header and reachability problems are returned
/// as errors. Everything that goes wrong for an individual row ends up in the
/// report. Re-running the same manifest creates a second record per row.
pub async fn run_import<S>(source: &ManifestSource, service: &S) -> Result<ImportReport>
where
    S: AssetService + ?Sized,
{
    source.validate()?;
    let resolver = PathResolver::new(&source.image_root)?;
    let reader = ManifestReader::open(&source.manifest_path)?;

    let health = service
        .health()
        .await
        .map_err(ImportError::ServiceUnreachable)?;
    info!(status = %health.status, "asset service is reachable");

    info!(
        manifest = %source.manifest_path.display(),
        image_root = %resolver.image_root().display(),
        "starting import"
    );

    let mut builder = ReportBuilder::new();
    for (index, entry) in reader.enumerate() {
        let row_number = index + 1;
        match entry {
            Ok(row) => {
                let outcome = process_row(service, &resolver, &row).await;
                log_outcome(row_number, &row.reference_name, &outcome);
                builder.record(row_number, &row.reference_name, outcome);
            }
            Err(err) => {
                let reference = format!("row {row_number}");
                let outcome = RowOutcome::Failed(RowFailure::Malformed(err.to_string()));
                log_outcome(row_number, &reference, &outcome);
                builder.record(row_number, &reference, outcome);
            }
        }
    }

    let report = builder.finish();
    info!(
        total = report.total,
        successful = report.successful,
        failed = report.failed,
        "import finished"
    );
    Ok(report)
}

/// Resolves, reads and uploads a single row. Never fails the batch.
pub async fn process_row<S>(service: &S, resolver: &PathResolver, row: &ManifestRow) -> RowOutcome
where
    S: AssetService + ?Sized,
{
    let image = match resolver.resolve(row) {
        Ok(image) => image,
        Err(failure) => return RowOutcome::Failed(failure.into()),
    };

    let contents = match tokio::fs::read(&image.path).await {
        Ok(contents) => contents,
        Err(source) => {
            return RowOutcome::Failed(RowFailure::Read {
                path: image.path,
                source,
            })
        }
    };

    let upload = AssetUpload {
        file_name: image.file_name.clone(),
        contents,
        metadata: row.metadata.clone(),
    };

    match service.create_asset(upload).await {
        Ok(asset) => RowOutcome::Uploaded {
            file_name: image.file_name,
            asset,
        },
        Err(err) => RowOutcome::Failed(RowFailure::Upload(err)),
    }
}

fn log_outcome(row: usize, reference_name: &str, outcome: &RowOutcome) {
    match outcome {
        RowOutcome::Uploaded { file_name, asset } => info!(
            row,
            reference = reference_name,
            file = %file_name,
            asset_id = asset.id,
            "row uploaded"
        ),
        RowOutcome::Failed(failure) => warn!(
            row,
            reference = reference_name,
            reason = %failure,
            "row failed"
        ),
    }
}

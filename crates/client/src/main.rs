//! `labelforge-export` -- dumps a dataset's annotations to a JSON file.
//!
//! Fetches every image of the configured dataset from the backend, converts
//! the stored annotations to the editor shape and writes the export document
//! next to the default class list. Images whose annotations cannot be fetched
//! are exported with an empty list.
//!
//! # Environment variables
//!
//! | Variable               | Required | Default                  |
//! |------------------------|----------|--------------------------|
//! | `LABELFORGE_API_URL`   | no       | `http://localhost:12000` |
//! | `EXPORT_DATASET_ID`    | yes      | --                       |
//! | `EXPORT_PATH`          | no       | `annotations.json`       |
//! | `REQUEST_TIMEOUT_SECS` | no       | `30`                     |

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use labelforge_client::api::BackendClient;
use labelforge_client::config::ClientConfig;
use labelforge_client::session::{AnnotationSession, LoadOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "labelforge_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env().context("invalid configuration")?;
    let dataset_id = config
        .export_dataset_id
        .clone()
        .context("EXPORT_DATASET_ID environment variable is required")?;

    tracing::info!(
        api_url = %config.api_url,
        dataset_id = %dataset_id,
        path = %config.export_path.display(),
        "Starting export"
    );

    let client = Arc::new(BackendClient::new(&config)?);
    let mut session = AnnotationSession::new(client);

    if let LoadOutcome::Fallback { warning } = session
        .open_dataset(&dataset_id)
        .await
        .with_context(|| format!("failed to list images of dataset {dataset_id}"))?
    {
        tracing::warn!(%warning, "First image exported without annotations");
    }

    let stats = session.stats();
    tracing::info!(
        total = stats.total,
        annotated = stats.annotated,
        progress = stats.progress(),
        "Dataset loaded"
    );

    let doc = session
        .write_export(&config.export_path)
        .await
        .with_context(|| format!("failed to write {}", config.export_path.display()))?;

    tracing::info!(
        images = doc.images.len(),
        annotations = doc.annotation_count(),
        path = %config.export_path.display(),
        "Export complete"
    );
    Ok(())
}

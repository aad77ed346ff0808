use tokio_util::sync::CancellationToken;

use crate::config::PipelineConfig;
use crate::delivery::{self, ChatChannel};
use crate::error::PipelineError;
use crate::format::format_all;
use crate::normalize::{normalize, parse_raw_records};
use crate::snapshot::SnapshotStore;
use crate::source::ListingSource;

/// Counts for one run. Always produced, however many items failed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub found: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub normalized: usize,
    pub format_skipped: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Indices into the rendered message sequence.
    pub failed_indices: Vec<usize>,
    pub failed_jobs: Vec<String>,
    pub not_attempted: usize,
    pub source_error: Option<String>,
}

/// Fetch, normalize, format and deliver, strictly in that order.
pub async fn run(
    source: &dyn ListingSource,
    channel: &dyn ChatChannel,
    config: &PipelineConfig,
    cancel: &CancellationToken,
) -> RunSummary {
    let mut summary = RunSummary::default();
    let snapshots = config.snapshot_dir.clone().map(SnapshotStore::new);
    if let Some(store) = &snapshots {
        tracing::debug!(dir = %store.dir().display(), "Writing stage snapshots");
    }

    tracing::info!(
        source = source.name(),
        keywords = ?config.keywords,
        location = %config.location,
        limit = config.limit,
        "Fetching job listings"
    );
    let fetched = tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        result = source.fetch(&config.keywords, &config.location, config.limit) => Some(result),
    };
    let Some(fetched) = fetched else {
        let err = PipelineError::CollaboratorUnavailable {
            collaborator: "listing source",
            reason: "cancelled before fetch completed".to_string(),
        };
        tracing::warn!(error = %err, "Run cancelled while fetching, nothing to deliver");
        summary.source_error = Some(err.to_string());
        return summary;
    };

    let raw = match fetched {
        Ok(raw) => raw,
        Err(e) => {
            let err = PipelineError::CollaboratorUnavailable {
                collaborator: "listing source",
                reason: format!("{:#}", e),
            };
            tracing::error!(error = %err, "Listing source failed, continuing with no jobs");
            summary.source_error = Some(err.to_string());
            Vec::new()
        }
    };
    summary.found = raw.len();
    if raw.is_empty() {
        tracing::info!("No jobs found");
    }

    if let Some(store) = &snapshots {
        save_snapshot("raw", store.save_raw(&raw));
    }

    let (records, shape_errors) = parse_raw_records(raw);
    for err in &shape_errors {
        tracing::warn!(error = %err, "Dropping malformed record");
    }
    summary.malformed = shape_errors.len();

    let parsed = records.len();
    let jobs = normalize(records, &config.normalize);
    summary.duplicates = parsed - jobs.len();
    summary.normalized = jobs.len();
    tracing::info!(normalized = jobs.len(), duplicates = summary.duplicates, "Normalized jobs");

    if let Some(store) = &snapshots {
        save_snapshot("normalized", store.save_normalized(&jobs));
    }

    let (messages, format_errors) = format_all(&jobs, &config.format);
    for err in &format_errors {
        tracing::warn!(error = %err, "Skipping job that cannot be rendered");
    }
    summary.format_skipped = format_errors.len();

    if let Some(store) = &snapshots {
        save_snapshot("messages", store.save_messages(&messages));
    }

    let job_ids: Vec<String> = messages.iter().map(|m| m.job_id.clone()).collect();
    tracing::info!(messages = messages.len(), destination = %config.destination, "Delivering messages");
    let delivery = delivery::deliver(channel, &config.destination, messages, &config.delivery, cancel).await;

    summary.delivered = delivery.delivered;
    summary.failed = delivery.failed;
    summary.failed_jobs = delivery
        .failed_indices
        .iter()
        .filter_map(|&i| job_ids.get(i).cloned())
        .collect();
    summary.failed_indices = delivery.failed_indices;
    summary.not_attempted = delivery.not_attempted;

    summary
}

fn save_snapshot(kind: &str, result: anyhow::Result<std::path::PathBuf>) {
    match result {
        Ok(path) => tracing::debug!(kind, path = %path.display(), "Saved snapshot"),
        Err(e) => tracing::warn!(kind, error = %format!("{:#}", e), "Failed to save snapshot"),
    }
}

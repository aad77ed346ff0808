use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;
use crate::models::RenderedMessage;

/// Discord rejects content over 2000 characters; leave headroom.
pub const DEFAULT_CHANNEL_LIMIT: usize = 1900;
pub const DEFAULT_MIN_GAP: Duration = Duration::from_millis(1500);

/// Anything that can post a chunk of text to a destination.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    async fn send(&self, destination: &str, chunk: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct DeliveryOptions {
    pub channel_limit: usize,
    /// Lower bound between the starts of consecutive items.
    pub min_gap: Duration,
}

impl Default for DeliveryOptions {
    fn default() -> Self {
        Self {
            channel_limit: DEFAULT_CHANNEL_LIMIT,
            min_gap: DEFAULT_MIN_GAP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Pending,
    Delivered,
    Failed,
}

#[derive(Debug, Clone)]
struct DeliveryRecord {
    outcome: DeliveryOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    pub delivered: usize,
    pub failed: usize,
    pub failed_indices: Vec<usize>,
    /// Items never attempted because the run was cancelled.
    pub not_attempted: usize,
}

impl DeliverySummary {
    fn from_records(records: &[DeliveryRecord]) -> Self {
        let mut summary = Self::default();
        for (index, record) in records.iter().enumerate() {
            match record.outcome {
                DeliveryOutcome::Delivered => summary.delivered += 1,
                DeliveryOutcome::Failed => {
                    summary.failed += 1;
                    summary.failed_indices.push(index);
                }
                DeliveryOutcome::Pending => summary.not_attempted += 1,
            }
        }
        summary
    }
}

/// Split on raw character count into maximal chunks of at most `limit` characters.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![text.to_string()];
    }
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}

/// Send messages one at a time, in order, at most one in flight.
///
/// Cancellation is observed before each item and during the pacing wait.
/// An item already being sent is always awaited to a delivered or failed
/// outcome, so the summary matches what the channel actually received.
pub async fn deliver(
    channel: &dyn ChatChannel,
    destination: &str,
    messages: Vec<RenderedMessage>,
    options: &DeliveryOptions,
    cancel: &CancellationToken,
) -> DeliverySummary {
    let mut records = vec![
        DeliveryRecord {
            outcome: DeliveryOutcome::Pending,
        };
        messages.len()
    ];
    let mut last_start: Option<Instant> = None;

    for (index, message) in messages.iter().enumerate() {
        if cancel.is_cancelled() {
            tracing::warn!(index, "Delivery cancelled before item");
            break;
        }

        if let Some(start) = last_start {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::warn!(index, "Delivery cancelled while pacing");
                    break;
                }
                _ = tokio::time::sleep_until(start + options.min_gap) => {}
            }
        }

        if message.char_len() > options.channel_limit {
            tracing::debug!(index, len = message.char_len(), limit = options.channel_limit, "Splitting oversized message");
        }

        last_start = Some(Instant::now());
        records[index].outcome = match send_item(channel, destination, index, message, options.channel_limit).await {
            Ok(chunks) => {
                tracing::info!(index, job_id = %message.job_id, chunks, "Delivered message");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(index, job_id = %message.job_id, error = %e, "Message delivery failed");
                DeliveryOutcome::Failed
            }
        };
    }

    DeliverySummary::from_records(&records)
}

async fn send_item(
    channel: &dyn ChatChannel,
    destination: &str,
    index: usize,
    message: &RenderedMessage,
    channel_limit: usize,
) -> Result<usize, PipelineError> {
    let chunks = split_chunks(&message.text, channel_limit);
    for (chunk_index, chunk) in chunks.iter().enumerate() {
        tracing::debug!(index, chunk = chunk_index, len = chunk.chars().count(), "Sending chunk");
        channel
            .send(destination, chunk)
            .await
            .map_err(|e| PipelineError::Delivery {
                index,
                chunk: chunk_index,
                reason: format!("{:#}", e),
            })?;
    }
    Ok(chunks.len())
}

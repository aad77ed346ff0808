use anyhow::{anyhow, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::delivery::DeliveryOptions;
use crate::format::FormatOptions;
use crate::normalize::NormalizeOptions;

pub const DEFAULT_KEYWORDS: &str = "data scientist, machine learning engineer";
pub const DEFAULT_LIMIT: usize = 10;

/// Everything one pipeline run needs. Secrets are not part of this; they go
/// straight into the channel constructor.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub keywords: Vec<String>,
    pub location: String,
    pub limit: usize,
    /// Where delivered messages go, e.g. a Discord channel id.
    pub destination: String,
    pub normalize: NormalizeOptions,
    pub format: FormatOptions,
    pub delivery: DeliveryOptions,
    /// `None` disables snapshots.
    pub snapshot_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            keywords: parse_keywords(DEFAULT_KEYWORDS),
            location: String::new(),
            limit: DEFAULT_LIMIT,
            destination: String::new(),
            normalize: NormalizeOptions::default(),
            format: FormatOptions::default(),
            delivery: DeliveryOptions::default(),
            snapshot_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_min_gap(mut self, min_gap: Duration) -> Self {
        self.delivery.min_gap = min_gap;
        self
    }

    pub fn with_channel_limit(mut self, channel_limit: usize) -> Self {
        self.delivery.channel_limit = channel_limit;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.limit == 0 {
            return Err(anyhow!("limit must be at least 1"));
        }
        if self.delivery.channel_limit == 0 {
            return Err(anyhow!("channel limit must be at least 1 character"));
        }
        Ok(())
    }
}

/// "data scientist, ML engineer" -> ["data scientist", "ML engineer"]
pub fn parse_keywords(keywords: &str) -> Vec<String> {
    keywords
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::delivery::ChatChannel;

const DISCORD_API_URL: &str = "https://discord.com/api/v10";

#[derive(Debug, Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// Posts to a Discord channel through the REST API with a bot token.
pub struct DiscordChannel {
    token: String,
    channel_id: String,
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(token: &str, channel_id: &str) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            return Err(anyhow!(
                "Discord bot token is empty. Set DISCORD_TOKEN or pass --discord-token."
            ));
        }

        let channel_id = channel_id.trim();
        if channel_id.is_empty() || !channel_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(anyhow!(
                "Invalid Discord channel id '{}': expected a numeric snowflake",
                channel_id
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            token: token.to_string(),
            channel_id: channel_id.to_string(),
            client,
        })
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }
}

impl std::fmt::Debug for DiscordChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordChannel")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

#[async_trait]
impl ChatChannel for DiscordChannel {
    async fn send(&self, destination: &str, chunk: &str) -> Result<()> {
        let url = format!("{}/channels/{}/messages", DISCORD_API_URL, destination);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&CreateMessage { content: chunk })
            .send()
            .await
            .context("Failed to send message to Discord")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "Discord API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        Ok(())
    }
}

/// Prints chunks to stdout instead of posting them.
#[derive(Debug, Default)]
pub struct ConsoleChannel;

#[async_trait]
impl ChatChannel for ConsoleChannel {
    async fn send(&self, destination: &str, chunk: &str) -> Result<()> {
        println!("[DRY RUN] -> #{}\n{}", destination, chunk);
        Ok(())
    }
}

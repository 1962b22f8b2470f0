mod aggregate;
mod classifier;
mod config;
mod llm;
mod report;
mod slack;
mod sweep;

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::classifier::LlmModerator;
use crate::config::Config;
use crate::llm::LlmClient;
use crate::slack::SlackClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slackwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Model: {} ({})", config.llm.model, config.llm.provider);
    info!("  Source channel: {}", config.slack.source_channel_id);
    info!("  Report channel: {}", config.slack.report_channel_id);

    let slack = SlackClient::new(&config.slack);
    let classifier = LlmModerator::new(LlmClient::new(config.llm.clone()), &config.moderation);

    sweep::run(&config, &slack, &classifier).await?;

    Ok(())
}

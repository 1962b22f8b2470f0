use anyhow::Result;
use chrono::{Local, TimeZone};
use tracing::info;

use crate::aggregate::{self, display_name};
use crate::classifier::Classifier;
use crate::config::Config;
use crate::report;
use crate::slack::SlackClient;

const LOOKBACK_SECS: i64 = 24 * 3600;

/// One full moderation pass over the source channel.
///
/// Strictly linear: user directory, 24h history window, classify each
/// message, post alerts, post the summary. There is no checkpointing; a
/// failure aborts the run.
pub async fn run(config: &Config, slack: &SlackClient, classifier: &dyn Classifier) -> Result<()> {
    let users = slack.user_directory().await?;

    let latest = Local::now().timestamp();
    let oldest = latest - LOOKBACK_SECS;
    let messages = slack
        .fetch_window(&config.slack.source_channel_id, oldest, latest)
        .await?;

    info!("Users: {} | Messages: {}", users.len(), messages.len());
    for message in &messages {
        info!(
            "{} | {} | {}",
            format_ts(&message.ts),
            display_name(&users, &message.user),
            message.text
        );
    }

    let outcome = aggregate::scan(
        &messages,
        &users,
        classifier,
        config.moderation.classify_pause(),
    )
    .await;

    report::publish(slack, &config.slack.report_channel_id, &outcome).await?;

    info!("Sweep complete");
    Ok(())
}

fn format_ts(ts: &str) -> String {
    let secs = ts.parse::<f64>().unwrap_or(0.0) as i64;
    match Local.timestamp_opt(secs, 0) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => ts.to_string(),
    }
}

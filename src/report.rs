use anyhow::Result;
use tracing::info;

use crate::aggregate::{AbuseEntry, PraiseTally, ScanOutcome};
use crate::slack::SlackClient;

pub fn format_alert(entry: &AbuseEntry) -> String {
    format!(
        "⚠️ *誹謗中傷検出*\n発言者: {}\n内容: {}",
        entry.author, entry.text
    )
}

/// Single multi-line praise summary, or `None` when nothing was tallied.
pub fn format_summary(tally: &PraiseTally) -> Option<String> {
    if tally.is_empty() {
        return None;
    }
    let mut body = String::from("🎉 *感謝/称賛メッセージ集計 (24h)*");
    for (name, count) in tally.iter() {
        body.push_str(&format!("\n{}: {} 件", name, count));
    }
    Some(body)
}

/// Post one alert per abuse entry, then the summary if any praise was seen.
pub async fn publish(slack: &SlackClient, channel: &str, outcome: &ScanOutcome) -> Result<()> {
    for entry in &outcome.abuse {
        slack.post_message(channel, &format_alert(entry)).await?;
    }

    if let Some(summary) = format_summary(&outcome.praise) {
        slack.post_message(channel, &summary).await?;
    }

    info!(
        "Posted {} abuse alert(s), praise summary {}",
        outcome.abuse.len(),
        if outcome.praise.is_empty() {
            "skipped"
        } else {
            "posted"
        }
    );
    Ok(())
}

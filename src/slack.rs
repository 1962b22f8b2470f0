//! Slack Web API client: rate-limit aware retries, `conversations.history`
//! pagination, and message posting.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::SlackConfig;

const API_BASE: &str = "https://slack.com/api";
const MAX_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_AFTER_SECS: u64 = 30;
const PAGE_LIMIT: u32 = 1000;
const PAGE_PAUSE: Duration = Duration::from_secs(1);

/// One HTTP exchange as seen by the retry loop: the parsed JSON body plus
/// the Retry-After header value when the server sent one.
pub struct ApiReply {
    pub retry_after_secs: Option<u64>,
    pub body: Value,
}

/// Boundary between the retry loop and the actual HTTP stack.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        payload: Option<&Value>,
    ) -> Result<ApiReply>;
}

struct ReqwestTransport {
    client: reqwest::Client,
    token: String,
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(String, String)],
        payload: Option<&Value>,
    ) -> Result<ApiReply> {
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Content-Type", "application/json")
            .query(query);

        if let Some(body) = payload {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send request to {}", url))?;

        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let body = response
            .json()
            .await
            .with_context(|| format!("Failed to parse response body from {}", url))?;

        Ok(ApiReply {
            retry_after_secs,
            body,
        })
    }
}

/// A message from the `conversations.history` response. Slack's `ts` is a
/// decimal-string epoch timestamp that doubles as the message id.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub ts: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
struct UsersListResponse {
    #[serde(default)]
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    id: String,
    #[serde(default)]
    profile: Profile,
}

#[derive(Debug, Default, Deserialize)]
struct Profile {
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    real_name: String,
}

#[derive(Debug, Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    response_metadata: ResponseMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    next_cursor: String,
}

pub struct SlackClient {
    transport: Box<dyn Transport>,
}

impl SlackClient {
    pub fn new(config: &SlackConfig) -> Self {
        Self {
            transport: Box::new(ReqwestTransport {
                client: reqwest::Client::new(),
                token: config.bot_token.clone(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Issue one API call, retrying while Slack reports `ratelimited`.
    ///
    /// A body with `ok: true` is returned unmodified. A throttled reply
    /// waits for the advertised Retry-After (30s when the header is
    /// missing) and retries, up to 5 attempts total; exhausting those is
    /// fatal. Any other reported error is logged and the failed body is
    /// returned as-is, so callers must tolerate missing fields.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(String, String)],
        payload: Option<&Value>,
    ) -> Result<Value> {
        let url = format!("{}/{}", API_BASE, endpoint);

        for attempt in 1..=MAX_ATTEMPTS {
            let reply = self
                .transport
                .execute(method.clone(), &url, query, payload)
                .await?;

            let ok = reply
                .body
                .get("ok")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            if ok {
                return Ok(reply.body);
            }

            let error = reply
                .body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string();

            if error == "ratelimited" {
                let wait = reply.retry_after_secs.unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                warn!(
                    "Rate limited on {}, waiting {}s ({}/{})",
                    endpoint, wait, attempt, MAX_ATTEMPTS
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            warn!("Slack API error on {}: {}", endpoint, error);
            return Ok(reply.body);
        }

        anyhow::bail!(
            "Slack API: retry limit exceeded on {} after {} attempts",
            endpoint,
            MAX_ATTEMPTS
        )
    }

    /// Fetch the workspace user directory: user id to display name, with
    /// real_name and finally the id itself as fallbacks.
    pub async fn user_directory(&self) -> Result<HashMap<String, String>> {
        let body = self.request(Method::GET, "users.list", &[], None).await?;
        let parsed: UsersListResponse =
            serde_json::from_value(body).context("Unexpected users.list response shape")?;

        let mut directory = HashMap::new();
        for member in parsed.members {
            let Member { id, profile } = member;
            let name = if !profile.display_name.is_empty() {
                profile.display_name
            } else if !profile.real_name.is_empty() {
                profile.real_name
            } else {
                id.clone()
            };
            directory.insert(id, name);
        }

        debug!("User directory holds {} entries", directory.len());
        Ok(directory)
    }

    /// Fetch every message in `[oldest, latest]` for a channel, following
    /// the continuation cursor until Slack stops returning one. Pages are
    /// concatenated in the API's native newest-first order.
    pub async fn fetch_window(
        &self,
        channel: &str,
        oldest: i64,
        latest: i64,
    ) -> Result<Vec<Message>> {
        let mut messages = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("channel".to_string(), channel.to_string()),
                ("oldest".to_string(), oldest.to_string()),
                ("latest".to_string(), latest.to_string()),
                ("inclusive".to_string(), "true".to_string()),
                ("limit".to_string(), PAGE_LIMIT.to_string()),
            ];
            if let Some(ref c) = cursor {
                query.push(("cursor".to_string(), c.clone()));
            }

            let body = self
                .request(Method::GET, "conversations.history", &query, None)
                .await?;
            let page: HistoryResponse = serde_json::from_value(body)
                .context("Unexpected conversations.history response shape")?;

            debug!("Fetched page of {} messages", page.messages.len());
            messages.extend(page.messages);

            let next = page.response_metadata.next_cursor;
            if next.is_empty() {
                break;
            }
            cursor = Some(next);

            // Self-imposed pause between pages, separate from the
            // ratelimited backoff above.
            tokio::time::sleep(PAGE_PAUSE).await;
        }

        Ok(messages)
    }

    pub async fn post_message(&self, channel: &str, text: &str) -> Result<()> {
        let payload = serde_json::json!({ "channel": channel, "text": text });
        self.request(Method::POST, "chat.postMessage", &[], Some(&payload))
            .await?;
        Ok(())
    }
}

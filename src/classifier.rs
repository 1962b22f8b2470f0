use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::ModerationConfig;
use crate::llm::LlmClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Abuse,
    Praise,
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Intent::Abuse => write!(f, "abuse"),
            Intent::Praise => write!(f, "praise"),
        }
    }
}

/// Yes/no judgment for one message. `Err` means the call itself failed,
/// which is distinct from a negative verdict; the caller decides how to
/// treat failures.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn judge(&self, author: &str, text: &str, intent: Intent) -> Result<bool>;
}

/// Classifier backed by a chat-completion call. No retry on failure.
pub struct LlmModerator {
    llm: LlmClient,
    affirmative_prefixes: Vec<String>,
}

impl LlmModerator {
    pub fn new(llm: LlmClient, config: &ModerationConfig) -> Self {
        Self {
            llm,
            affirmative_prefixes: config.affirmative_prefixes.clone(),
        }
    }

    fn prompt(author: &str, text: &str, intent: Intent) -> String {
        let question = match intent {
            Intent::Abuse => "次のSlackメッセージが誹謗中傷か判定。「はい」or「いいえ」",
            Intent::Praise => "次のSlackメッセージが感謝または称賛表現か判定。「はい」or「いいえ」",
        };
        format!("{}\n発言者:{}\n内容:{}", question, author, text)
    }

    fn is_affirmative(&self, reply: &str) -> bool {
        let reply = reply.trim().to_lowercase();
        self.affirmative_prefixes
            .iter()
            .any(|prefix| reply.starts_with(&prefix.to_lowercase()))
    }
}

#[async_trait]
impl Classifier for LlmModerator {
    async fn judge(&self, author: &str, text: &str, intent: Intent) -> Result<bool> {
        let reply = self.llm.complete(&Self::prompt(author, text, intent)).await?;
        debug!("{} verdict for {}: {}", intent, author, reply.trim());
        Ok(self.is_affirmative(&reply))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Classifier that answers from fixed text lists and records every
    /// call, for exercising the aggregation pass without a network.
    pub struct RuleClassifier {
        abusive: Vec<String>,
        praising: Vec<String>,
        pub calls: Arc<Mutex<Vec<(String, Intent)>>>,
    }

    impl RuleClassifier {
        pub fn new(abusive: &[&str], praising: &[&str]) -> Self {
            Self {
                abusive: abusive.iter().map(|s| s.to_string()).collect(),
                praising: praising.iter().map(|s| s.to_string()).collect(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Classifier for RuleClassifier {
        async fn judge(&self, _author: &str, text: &str, intent: Intent) -> Result<bool> {
            self.calls.lock().unwrap().push((text.to_string(), intent));
            Ok(match intent {
                Intent::Abuse => self.abusive.iter().any(|t| t == text),
                Intent::Praise => self.praising.iter().any(|t| t == text),
            })
        }
    }

    /// Classifier whose every call fails, for exercising the fail-open
    /// path.
    pub struct FailingClassifier {
        pub calls: Arc<Mutex<Vec<(String, Intent)>>>,
    }

    impl FailingClassifier {
        pub fn new() -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl Classifier for FailingClassifier {
        async fn judge(&self, _author: &str, text: &str, intent: Intent) -> Result<bool> {
            self.calls.lock().unwrap().push((text.to_string(), intent));
            anyhow::bail!("completion API unreachable")
        }
    }
}

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::classifier::{Classifier, Intent};
use crate::slack::Message;

pub const UNKNOWN_AUTHOR: &str = "(不明)";

pub fn display_name<'a>(users: &'a HashMap<String, String>, user_id: &str) -> &'a str {
    users
        .get(user_id)
        .map(String::as_str)
        .unwrap_or(UNKNOWN_AUTHOR)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbuseEntry {
    pub author: String,
    pub text: String,
}

/// Praise counts per display name, kept in first-seen order so the summary
/// reads in the order authors appeared.
#[derive(Debug, Default)]
pub struct PraiseTally {
    entries: Vec<(String, u32)>,
}

impl PraiseTally {
    pub fn bump(&mut self, name: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 += 1;
        } else {
            self.entries.push((name.to_string(), 1));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(name, count)| (name.as_str(), *count))
    }
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub abuse: Vec<AbuseEntry>,
    pub praise: PraiseTally,
}

/// Walk the fetched window and bucket each message.
///
/// History arrives newest-first; the scan iterates in reverse so messages
/// are judged in chronological order. Abuse is tested first and a flagged
/// message is never also tested for praise. A message matching neither
/// contributes to neither output.
pub async fn scan(
    messages: &[Message],
    users: &HashMap<String, String>,
    classifier: &dyn Classifier,
    pause: Duration,
) -> ScanOutcome {
    let mut outcome = ScanOutcome::default();

    for message in messages.iter().rev() {
        let author = display_name(users, &message.user);
        tokio::time::sleep(pause).await;

        if message.text.is_empty() {
            continue;
        }

        if judge(classifier, author, &message.text, Intent::Abuse).await {
            outcome.abuse.push(AbuseEntry {
                author: author.to_string(),
                text: message.text.clone(),
            });
        } else if judge(classifier, author, &message.text, Intent::Praise).await {
            outcome.praise.bump(author);
        }
    }

    outcome
}

// A failed classification call counts as a "no" verdict; the sweep keeps
// going either way.
async fn judge(classifier: &dyn Classifier, author: &str, text: &str, intent: Intent) -> bool {
    match classifier.judge(author, text, intent).await {
        Ok(verdict) => verdict,
        Err(e) => {
            warn!("{} classification failed, counting as no: {:#}", intent, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::testing::{FailingClassifier, RuleClassifier};

    fn message(ts: &str, user: &str, text: &str) -> Message {
        Message {
            ts: ts.to_string(),
            user: user.to_string(),
            text: text.to_string(),
        }
    }

    fn users(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(id, name)| (id.to_string(), name.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn messages_are_scanned_oldest_first() {
        let classifier = RuleClassifier::new(&[], &["a", "b", "c"]);
        let calls = classifier.calls.clone();
        // Newest-first, as fetched.
        let messages = vec![
            message("300.0", "U1", "c"),
            message("200.0", "U1", "b"),
            message("100.0", "U1", "a"),
        ];

        scan(&messages, &users(&[("U1", "Alice")]), &classifier, Duration::ZERO).await;

        let texts: Vec<String> = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, intent)| *intent == Intent::Abuse)
            .map(|(text, _)| text.clone())
            .collect();
        assert_eq!(texts, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn abusive_message_is_never_tested_for_praise() {
        let classifier = RuleClassifier::new(&["You are worthless"], &[]);
        let calls = classifier.calls.clone();
        let messages = vec![message("100.0", "U1", "You are worthless")];

        let outcome = scan(&messages, &users(&[("U1", "Bob")]), &classifier, Duration::ZERO).await;

        assert_eq!(
            outcome.abuse,
            vec![AbuseEntry {
                author: "Bob".to_string(),
                text: "You are worthless".to_string(),
            }]
        );
        assert!(outcome.praise.is_empty());
        let calls = calls.lock().unwrap();
        assert!(!calls
            .iter()
            .any(|(_, intent)| *intent == Intent::Praise));
    }

    #[tokio::test]
    async fn empty_text_is_not_classified() {
        let classifier = RuleClassifier::new(&[], &[]);
        let calls = classifier.calls.clone();
        let messages = vec![message("100.0", "U1", "")];

        let outcome = scan(&messages, &HashMap::new(), &classifier, Duration::ZERO).await;

        assert!(calls.lock().unwrap().is_empty());
        assert!(outcome.abuse.is_empty());
        assert!(outcome.praise.is_empty());
    }

    #[tokio::test]
    async fn praise_is_tallied_per_author() {
        let classifier = RuleClassifier::new(&[], &["thanks!", "great work", "cheers"]);
        let messages = vec![
            message("400.0", "U2", "cheers"),
            message("300.0", "U1", "great work"),
            message("200.0", "U1", "thanks!"),
            message("100.0", "U1", "lunch?"),
        ];
        let users = users(&[("U1", "Alice"), ("U2", "Bob")]);

        let outcome = scan(&messages, &users, &classifier, Duration::ZERO).await;

        let tally: Vec<(&str, u32)> = outcome.praise.iter().collect();
        assert_eq!(tally, vec![("Alice", 2), ("Bob", 1)]);
    }

    #[tokio::test]
    async fn abuse_list_keeps_repeated_identical_entries() {
        let classifier = RuleClassifier::new(&["spam"], &[]);
        let messages = vec![
            message("200.0", "U1", "spam"),
            message("100.0", "U1", "spam"),
        ];

        let outcome = scan(&messages, &users(&[("U1", "Bob")]), &classifier, Duration::ZERO).await;

        assert_eq!(outcome.abuse.len(), 2);
        assert_eq!(outcome.abuse[0], outcome.abuse[1]);
    }

    #[tokio::test]
    async fn unknown_author_falls_back_to_placeholder() {
        let classifier = RuleClassifier::new(&["bad"], &[]);
        let messages = vec![message("100.0", "U404", "bad")];

        let outcome = scan(&messages, &HashMap::new(), &classifier, Duration::ZERO).await;

        assert_eq!(outcome.abuse[0].author, UNKNOWN_AUTHOR);
    }

    #[tokio::test]
    async fn classifier_failure_counts_as_no() {
        let classifier = FailingClassifier::new();
        let calls = classifier.calls.clone();
        let messages = vec![message("100.0", "U1", "anything")];

        let outcome = scan(&messages, &HashMap::new(), &classifier, Duration::ZERO).await;

        assert!(outcome.abuse.is_empty());
        assert!(outcome.praise.is_empty());
        // Abuse failed open, so praise was still attempted.
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, Intent::Abuse);
        assert_eq!(calls[1].1, Intent::Praise);
    }
}

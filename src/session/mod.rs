//! Per-visitor session state
//!
//! A session is a typed `WatcherSession` stored server-side as JSON and
//! addressed by an encrypted cookie. Every field has a default, so a
//! missing or damaged value reads as empty instead of failing the request.

pub mod cookie;
pub mod recents;
pub mod store;

pub use cookie::CookieCodec;
pub use recents::{add_to_recents, get_recents, Recents, ViewPair, MAX_RECENTS};
pub use store::SessionStore;

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Success,
    Warning,
    Danger,
}

/// One-shot notice shown on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub level: MessageLevel,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatcherSession {
    #[serde(default, deserialize_with = "lenient")]
    pub recents: Recents,
    #[serde(default, deserialize_with = "lenient")]
    pub messages: Vec<Message>,
}

impl WatcherSession {
    /// Decode stored session JSON; anything unreadable becomes an empty session
    pub fn decode(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("Discarding unreadable session data: {}", e);
                Self::default()
            }
        }
    }

    pub fn flash(&mut self, text: impl Into<String>, level: MessageLevel) {
        self.messages.push(Message {
            text: text.into(),
            level,
        });
    }

    /// Messages are shown once
    pub fn take_messages(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.messages)
    }
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Ok(parsed),
        Err(e) => {
            tracing::warn!("Ignoring malformed session field: {}", e);
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_recents_read_as_empty() {
        let session = WatcherSession::decode(
            r#"{"recents":"AAPL","messages":[{"text":"hi","level":"success"}]}"#,
        );
        assert!(get_recents(&session).is_empty());
        assert_eq!(session.messages.len(), 1);
    }

    #[test]
    fn test_missing_fields_default() {
        let session = WatcherSession::decode("{}");
        assert_eq!(session, WatcherSession::default());
    }

    #[test]
    fn test_garbage_decodes_to_default() {
        assert_eq!(WatcherSession::decode("not json"), WatcherSession::default());
    }

    #[test]
    fn test_flash_and_take() {
        let mut session = WatcherSession::default();
        session.flash("Ticker not found", MessageLevel::Danger);
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains(r#""level":"danger""#));

        let mut session = WatcherSession::decode(&json);
        assert_eq!(session.take_messages().len(), 1);
        assert!(session.messages.is_empty());
    }
}

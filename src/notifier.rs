//! Notification transport: a line-oriented chat protocol stand-in.
//! The core cares only that a `send_alert(text) -> {ok, message_id?}`
//! primitive exists; the concrete sink (Telegram, Slack, …) is out of scope.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::TransportError;

const MAX_MESSAGE_BYTES: usize = 4096;
const TRUNCATION_SUFFIX: &str = "...";

#[derive(Debug, Clone)]
pub struct SendResult {
    pub ok: bool,
    pub message_id: Option<String>,
}

/// Distinguishes a hard transport failure from a server-enforced rate limit
/// that the alert gate must honour by sleeping the given duration.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Sent(SendResult),
    RateLimited { retry_after: Duration },
    Failed(TransportError),
}

#[async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send_alert(&self, text: &str) -> SendOutcome;
}

/// Truncate to the transport's byte ceiling with an ellipsis, preserving
/// UTF-8 boundaries.
pub fn truncate_for_transport(text: &str) -> String {
    if text.len() <= MAX_MESSAGE_BYTES {
        return text.to_string();
    }
    let budget = MAX_MESSAGE_BYTES - TRUNCATION_SUFFIX.len();
    let mut cut = budget;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{TRUNCATION_SUFFIX}", &text[..cut])
}

/// A logging-only sink used for local runs and tests, matching the shape a
/// real chat-bot transport would have without depending on one.
pub struct LoggingTransport;

#[async_trait]
impl NotificationTransport for LoggingTransport {
    async fn send_alert(&self, text: &str) -> SendOutcome {
        let truncated = truncate_for_transport(text);
        tracing::info!(message = %truncated, "notification dispatched");
        SendOutcome::Sent(SendResult {
            ok: true,
            message_id: Some(uuid::Uuid::new_v4().to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_pass_through_unchanged() {
        assert_eq!(truncate_for_transport("hello"), "hello");
    }

    #[test]
    fn long_messages_are_truncated_with_ellipsis_within_budget() {
        let long = "a".repeat(5000);
        let truncated = truncate_for_transport(&long);
        assert!(truncated.len() <= MAX_MESSAGE_BYTES);
        assert!(truncated.ends_with("..."));
    }

    #[tokio::test]
    async fn logging_transport_always_reports_ok() {
        let transport = LoggingTransport;
        match transport.send_alert("test alert").await {
            SendOutcome::Sent(result) => assert!(result.ok),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}

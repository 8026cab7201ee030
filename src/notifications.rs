//! Customer-facing SMS notifications.
//!
//! Message templating lives here; delivery goes through the
//! [`NotificationDispatcher`] trait so the engine stays independent of any
//! SMS provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::callback::MissedReason;
use crate::error::Result;

/// What a message is about, for dispatcher-side routing and audit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// "We missed your call" notice
    MissedCallNotice,

    /// Final notice after callback attempts were exhausted
    FinalAttemptNotice,
}

/// An outbound SMS ready for delivery
#[derive(Debug, Clone)]
pub struct SmsMessage {
    pub kind: MessageKind,
    pub phone_number: String,
    pub body: String,
}

/// SMS delivery capability
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_message(&self, message: SmsMessage) -> Result<()>;
}

/// Dispatcher that logs messages instead of sending them.
///
/// Default when no SMS provider is wired in.
pub struct NullDispatcher;

#[async_trait]
impl NotificationDispatcher for NullDispatcher {
    async fn send_message(&self, message: SmsMessage) -> Result<()> {
        info!(
            "📱 SMS ({:?}) to {}: {}",
            message.kind, message.phone_number, message.body
        );
        Ok(())
    }
}

/// Missed-call notice sent shortly after the call rang out
pub fn missed_call_sms(
    restaurant_name: &str,
    phone_number: &str,
    reason: MissedReason,
    missed_at: DateTime<Utc>,
) -> SmsMessage {
    let opening = match reason {
        MissedReason::AbandonedAfterWait => {
            "Sorry you had to wait - we missed your call".to_string()
        }
        _ => format!("We missed your call at {}", missed_at.format("%H:%M")),
    };
    SmsMessage {
        kind: MessageKind::MissedCallNotice,
        phone_number: phone_number.to_string(),
        body: format!(
            "Hi! {}. This is {}. We'll call you back shortly, or feel free to call us again.",
            opening, restaurant_name
        ),
    }
}

/// Final notice after the last callback attempt failed
pub fn final_attempt_sms(restaurant_name: &str, phone_number: &str) -> SmsMessage {
    SmsMessage {
        kind: MessageKind::FinalAttemptNotice,
        phone_number: phone_number.to_string(),
        body: format!(
            "Hi, this is {}. We tried calling you back a few times but couldn't reach you. \
             Please call us whenever convenient - we'd love to help!",
            restaurant_name
        ),
    }
}

//! Missed-call record keeping and callback scheduling.
//!
//! Every unanswered or abandoned call becomes a [`MissedCall`] record; the
//! scheduler derives [`CallbackItem`]s from those records and walks them
//! through dial attempts, retries with backoff, and terminal states. The
//! scheduler decides WHEN and WHO to dial; actually placing the call and
//! sending SMS is the engine's job through the injected dialer and
//! notification seams.

pub mod scheduler;

pub use scheduler::{CallbackScheduler, ABANDON_THRESHOLD_SECONDS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a call went unanswered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedReason {
    /// Rang out with nobody picking up
    Unanswered,

    /// Caller hung up after waiting in the routing queue
    AbandonedAfterWait,

    /// Synthetic record injected by test tooling
    Test,
}

impl std::fmt::Display for MissedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissedReason::Unanswered => write!(f, "unanswered"),
            MissedReason::AbandonedAfterWait => write!(f, "abandoned_after_wait"),
            MissedReason::Test => write!(f, "test"),
        }
    }
}

/// Callback urgency class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackPriority {
    Normal,

    /// Priority-listed numbers: fast-path delay, exempt from the
    /// business-hours gate
    High,
}

/// Lifecycle of a missed-call record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissedCallStatus {
    /// No callback attempt has concluded yet
    Pending,

    /// A callback reached the customer
    Resolved,

    /// Last attempt rang out; a retry is (or was) scheduled
    NoAnswer,

    /// Dial-layer failure on the final attempt
    Failed,

    /// Exhausted the attempt allowance without reaching the customer
    MaxAttemptsReached,
}

impl MissedCallStatus {
    /// Terminal records never spawn further callback work
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MissedCallStatus::Resolved
                | MissedCallStatus::Failed
                | MissedCallStatus::MaxAttemptsReached
        )
    }
}

/// One missed or abandoned call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissedCall {
    pub id: String,
    pub phone_number: String,
    pub customer_name: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub reason: MissedReason,
    /// How long the call rang or waited before being missed
    pub duration_seconds: u64,
    pub status: MissedCallStatus,
    /// Total dial attempts charged against this record
    pub attempts: u32,
    pub priority: CallbackPriority,
    pub callback_scheduled: bool,
    pub sms_notification_sent: bool,
}

/// Lifecycle of a callback queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackStatus {
    Scheduled,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

/// One scheduled callback attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackItem {
    pub id: String,
    pub missed_call_id: String,
    pub scheduled_at: DateTime<Utc>,
    /// Attempt count carried from the missed-call record when this item
    /// was scheduled
    pub attempts: u32,
    pub status: CallbackStatus,
}

/// A pending SMS notice tied to a missed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingNotice {
    pub missed_call_id: String,
    pub due_at: DateTime<Utc>,
}

/// Work order to dial a customer back, produced by the scheduler
#[derive(Debug, Clone)]
pub struct DialJob {
    pub missed_call_id: String,
    pub phone_number: String,
    pub customer_name: Option<String>,
    /// Attempt number this dial represents (1-based)
    pub attempt: u32,
}

/// Work order to send a missed-call SMS notice
#[derive(Debug, Clone)]
pub struct NoticeJob {
    pub missed_call_id: String,
    pub phone_number: String,
    pub reason: MissedReason,
    pub missed_at: DateTime<Utc>,
}

/// How a concluded dial attempt moved the record forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackDisposition {
    /// Customer reached; record resolved
    Resolved,

    /// Attempt failed, retry queued for the given time
    RetryScheduled { at: DateTime<Utc> },

    /// Attempt allowance exhausted
    MaxAttemptsReached,

    /// Dial-layer failure on the final attempt
    HardFailed { reason: String },

    /// No in-progress item matched the outcome; nothing changed
    Ignored,
}

/// Callback counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackStats {
    pub total_missed: u64,
    pub todays_missed: u64,
    pub resolved: u64,
    pub pending_callbacks: u64,
}

/// Persisted callback state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallbackSnapshot {
    pub missed_calls: Vec<MissedCall>,
    pub queue: Vec<CallbackItem>,
    pub notices: Vec<PendingNotice>,
}

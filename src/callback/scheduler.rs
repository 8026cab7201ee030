//! Callback scheduling state machine.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{BusinessHoursConfig, CallbackConfig, CustomerConfig};
use crate::dialer::DialOutcome;
use crate::error::{EngineError, Result};

use super::{
    CallbackDisposition, CallbackItem, CallbackPriority, CallbackSnapshot, CallbackStats,
    CallbackStatus, DialJob, MissedCall, MissedCallStatus, MissedReason, NoticeJob, PendingNotice,
};

/// Queue waits at or under this many seconds do not count as abandonment
pub const ABANDON_THRESHOLD_SECONDS: u64 = 30;

/// Tracks missed calls and drives their callback attempts.
///
/// Synchronous by design: all time comes from the injected [`Clock`], all
/// dialing happens outside through [`DialJob`]s, so every transition is
/// deterministic and testable without sleeping.
pub struct CallbackScheduler {
    config: CallbackConfig,
    customers: CustomerConfig,
    open: NaiveTime,
    close: NaiveTime,
    clock: Arc<dyn Clock>,
    missed_calls: Vec<MissedCall>,
    queue: Vec<CallbackItem>,
    notices: Vec<PendingNotice>,
}

impl CallbackScheduler {
    pub fn new(
        config: CallbackConfig,
        business_hours: &BusinessHoursConfig,
        customers: CustomerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let open = business_hours.open_time().map_err(EngineError::config)?;
        let close = business_hours.close_time().map_err(EngineError::config)?;
        Ok(Self {
            config,
            customers,
            open,
            close,
            clock,
            missed_calls: Vec::new(),
            queue: Vec::new(),
            notices: Vec::new(),
        })
    }

    /// Record a missed call and schedule its callback and SMS notice.
    ///
    /// Blacklisted and empty numbers are dropped without a record. Returns
    /// the new missed-call id, or `None` when the call was dropped.
    pub fn record_missed_call(
        &mut self,
        phone_number: &str,
        customer_name: Option<String>,
        duration_seconds: u64,
        reason: MissedReason,
    ) -> Option<String> {
        if phone_number.is_empty() || self.customers.blacklisted_numbers.contains(phone_number) {
            debug!("🚫 Ignoring missed call from blocked number {}", phone_number);
            return None;
        }

        let now = self.clock.now();
        let priority = if self.customers.priority_numbers.contains(phone_number) {
            CallbackPriority::High
        } else {
            CallbackPriority::Normal
        };

        let missed = MissedCall {
            id: format!("missed_{}", Uuid::new_v4()),
            phone_number: phone_number.to_string(),
            customer_name,
            timestamp: now,
            reason,
            duration_seconds,
            status: MissedCallStatus::Pending,
            attempts: 0,
            priority,
            callback_scheduled: false,
            sms_notification_sent: false,
        };
        let id = missed.id.clone();

        info!(
            "📞 Missed call from {} ({}), priority {:?}",
            missed.phone_number, missed.reason, missed.priority
        );
        self.missed_calls.push(missed);
        let idx = self.missed_calls.len() - 1;

        if self.config.auto_callback_enabled {
            self.schedule_callback(idx, now);
        }

        if self.config.sms_notifications_enabled {
            let due_at = now + Duration::minutes(self.config.sms_delay_minutes as i64);
            self.notices.push(PendingNotice {
                missed_call_id: id.clone(),
                due_at,
            });
        }

        Some(id)
    }

    /// Record a queue abandonment. Waits at or under
    /// [`ABANDON_THRESHOLD_SECONDS`] are treated as accidental hangups and
    /// produce no record.
    pub fn record_abandoned_call(
        &mut self,
        phone_number: &str,
        customer_name: Option<String>,
        wait_seconds: u64,
    ) -> Option<String> {
        if wait_seconds <= ABANDON_THRESHOLD_SECONDS {
            debug!(
                "📴 Short abandonment from {} ({}s), no callback",
                phone_number, wait_seconds
            );
            return None;
        }
        self.record_missed_call(
            phone_number,
            customer_name,
            wait_seconds,
            MissedReason::AbandonedAfterWait,
        )
    }

    /// Queue the callback for the missed call at `idx`.
    ///
    /// High-priority numbers inside business hours get the fast-path delay;
    /// everyone else waits the standard delay.
    fn schedule_callback(&mut self, idx: usize, now: DateTime<Utc>) {
        let missed = &self.missed_calls[idx];
        if self.has_open_item(&missed.id) {
            warn!(
                "🔄 Callback already pending for {}, not scheduling another",
                missed.id
            );
            return;
        }

        let delay = if missed.priority == CallbackPriority::High && self.is_business_hours(now) {
            Duration::seconds(self.config.priority_callback_delay_seconds as i64)
        } else {
            Duration::minutes(self.config.callback_delay_minutes as i64)
        };
        let scheduled_at = now + delay;

        info!(
            "⏰ Callback for {} scheduled at {}",
            missed.phone_number, scheduled_at
        );
        let missed_call_id = missed.id.clone();
        self.missed_calls[idx].callback_scheduled = true;
        self.queue.push(CallbackItem {
            id: format!("callback_{}", Uuid::new_v4()),
            missed_call_id,
            scheduled_at,
            attempts: self.missed_calls[idx].attempts,
            status: CallbackStatus::Scheduled,
        });
    }

    /// Drain SMS notices that have come due
    pub fn due_notices(&mut self) -> Vec<NoticeJob> {
        let now = self.clock.now();
        let mut jobs = Vec::new();
        let mut idx = 0;
        while idx < self.notices.len() {
            if self.notices[idx].due_at > now {
                idx += 1;
                continue;
            }
            let notice = self.notices.remove(idx);
            match self
                .missed_calls
                .iter()
                .find(|c| c.id == notice.missed_call_id)
            {
                Some(call) => jobs.push(NoticeJob {
                    missed_call_id: call.id.clone(),
                    phone_number: call.phone_number.clone(),
                    reason: call.reason,
                    missed_at: call.timestamp,
                }),
                None => warn!(
                    "🔍 Dropping notice for unknown missed call {}",
                    notice.missed_call_id
                ),
            }
        }
        jobs
    }

    /// Mark the missed-call SMS as sent
    pub fn mark_sms_sent(&mut self, missed_call_id: &str) {
        if let Some(call) = self
            .missed_calls
            .iter_mut()
            .find(|c| c.id == missed_call_id)
        {
            call.sms_notification_sent = true;
        }
    }

    /// Move due callbacks to in-progress and hand out dial jobs.
    ///
    /// Attempts are charged before the business-hours gate so the retry
    /// backoff keys off the real attempt count. Outside business hours,
    /// non-priority callbacks slide to the next opening time instead of
    /// dialing.
    pub fn begin_due_attempts(&mut self) -> Vec<DialJob> {
        let now = self.clock.now();
        let mut jobs = Vec::new();

        for idx in 0..self.queue.len() {
            if self.queue[idx].status != CallbackStatus::Scheduled
                || self.queue[idx].scheduled_at > now
            {
                continue;
            }
            let missed_call_id = self.queue[idx].missed_call_id.clone();
            let Some(call_idx) = self
                .missed_calls
                .iter()
                .position(|c| c.id == missed_call_id)
            else {
                warn!("🔍 Cancelling callback for unknown missed call {}", missed_call_id);
                self.queue[idx].status = CallbackStatus::Cancelled;
                continue;
            };

            if self.missed_calls[call_idx].status.is_terminal() {
                self.queue[idx].status = CallbackStatus::Cancelled;
                continue;
            }

            self.queue[idx].attempts += 1;
            self.missed_calls[call_idx].attempts += 1;

            if self.missed_calls[call_idx].priority != CallbackPriority::High
                && !self.is_business_hours(now)
            {
                let next = self.next_opening(now);
                info!(
                    "⏰ Outside business hours, deferring callback for {} to {}",
                    self.missed_calls[call_idx].phone_number, next
                );
                self.queue[idx].scheduled_at = next;
                continue;
            }

            self.queue[idx].status = CallbackStatus::InProgress;
            info!(
                "📲 Starting callback attempt {} for {}",
                self.missed_calls[call_idx].attempts, self.missed_calls[call_idx].phone_number
            );
            jobs.push(DialJob {
                missed_call_id,
                phone_number: self.missed_calls[call_idx].phone_number.clone(),
                customer_name: self.missed_calls[call_idx].customer_name.clone(),
                attempt: self.missed_calls[call_idx].attempts,
            });
        }

        jobs
    }

    /// Apply a concluded dial outcome to the in-progress callback
    pub fn record_dial_outcome(
        &mut self,
        missed_call_id: &str,
        outcome: DialOutcome,
    ) -> CallbackDisposition {
        let now = self.clock.now();
        let Some(call_idx) = self
            .missed_calls
            .iter()
            .position(|c| c.id == missed_call_id)
        else {
            warn!("🔍 Dial outcome for unknown missed call {}", missed_call_id);
            return CallbackDisposition::Ignored;
        };
        let Some(item_idx) = self.queue.iter().position(|i| {
            i.missed_call_id == missed_call_id && i.status == CallbackStatus::InProgress
        }) else {
            warn!(
                "🔍 Dial outcome without an in-progress callback for {}",
                missed_call_id
            );
            return CallbackDisposition::Ignored;
        };

        match outcome {
            DialOutcome::Connected => {
                self.queue[item_idx].status = CallbackStatus::Completed;
                self.missed_calls[call_idx].status = MissedCallStatus::Resolved;
                info!(
                    "✅ Callback reached {} on attempt {}",
                    self.missed_calls[call_idx].phone_number, self.missed_calls[call_idx].attempts
                );
                CallbackDisposition::Resolved
            }
            DialOutcome::NoAnswer | DialOutcome::Busy => {
                self.queue[item_idx].status = CallbackStatus::Failed;
                let attempts = self.missed_calls[call_idx].attempts;
                if attempts < self.config.max_callback_attempts {
                    self.missed_calls[call_idx].status = MissedCallStatus::NoAnswer;
                    let at = self.schedule_retry(call_idx, now);
                    CallbackDisposition::RetryScheduled { at }
                } else {
                    self.missed_calls[call_idx].status = MissedCallStatus::MaxAttemptsReached;
                    warn!(
                        "❌ Giving up on {} after {} attempts",
                        self.missed_calls[call_idx].phone_number, attempts
                    );
                    CallbackDisposition::MaxAttemptsReached
                }
            }
            DialOutcome::Failed(reason) => {
                self.queue[item_idx].status = CallbackStatus::Failed;
                warn!(
                    "❌ Callback dial error for {}: {}",
                    self.missed_calls[call_idx].phone_number, reason
                );
                let attempts = self.missed_calls[call_idx].attempts;
                if attempts < self.config.max_callback_attempts {
                    self.missed_calls[call_idx].status = MissedCallStatus::NoAnswer;
                    let at = self.schedule_retry(call_idx, now);
                    CallbackDisposition::RetryScheduled { at }
                } else {
                    self.missed_calls[call_idx].status = MissedCallStatus::Failed;
                    CallbackDisposition::HardFailed { reason }
                }
            }
        }
    }

    /// Queue the next retry with linear backoff keyed on the attempt count
    fn schedule_retry(&mut self, call_idx: usize, now: DateTime<Utc>) -> DateTime<Utc> {
        let attempts = self.missed_calls[call_idx].attempts;
        let delay = Duration::minutes((self.config.retry_backoff_minutes * attempts as u64) as i64);
        let at = now + delay;
        info!(
            "🔄 Retry {} for {} scheduled at {}",
            attempts + 1,
            self.missed_calls[call_idx].phone_number,
            at
        );
        self.queue.push(CallbackItem {
            id: format!("callback_{}", Uuid::new_v4()),
            missed_call_id: self.missed_calls[call_idx].id.clone(),
            scheduled_at: at,
            attempts,
            status: CallbackStatus::Scheduled,
        });
        at
    }

    /// Cancel all pending work for a missed call (booking cancelled, customer
    /// reached through another channel). Returns the number of cancelled
    /// callback items.
    pub fn cancel_for(&mut self, missed_call_id: &str) -> usize {
        let mut cancelled = 0;
        for item in self
            .queue
            .iter_mut()
            .filter(|i| i.missed_call_id == missed_call_id)
        {
            if item.status == CallbackStatus::Scheduled {
                item.status = CallbackStatus::Cancelled;
                cancelled += 1;
            }
        }
        self.notices.retain(|n| n.missed_call_id != missed_call_id);
        if cancelled > 0 {
            info!("🚫 Cancelled {} pending callback(s) for {}", cancelled, missed_call_id);
        }
        cancelled
    }

    /// Mark a missed call resolved out-of-band and drop its pending work
    pub fn resolve(&mut self, missed_call_id: &str) -> bool {
        let Some(call) = self
            .missed_calls
            .iter_mut()
            .find(|c| c.id == missed_call_id)
        else {
            return false;
        };
        call.status = MissedCallStatus::Resolved;
        self.cancel_for(missed_call_id);
        true
    }

    /// Whether `now` falls inside the configured business hours (inclusive)
    pub fn is_business_hours(&self, now: DateTime<Utc>) -> bool {
        let t = now.time();
        t >= self.open && t <= self.close
    }

    /// The next time the restaurant opens at or after `now`
    fn next_opening(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today_open = now.date_naive().and_time(self.open).and_utc();
        if now < today_open {
            today_open
        } else {
            today_open + Duration::days(1)
        }
    }

    pub fn missed_calls(&self) -> &[MissedCall] {
        &self.missed_calls
    }

    pub fn missed_call(&self, id: &str) -> Option<&MissedCall> {
        self.missed_calls.iter().find(|c| c.id == id)
    }

    pub fn queue(&self) -> &[CallbackItem] {
        &self.queue
    }

    fn has_open_item(&self, missed_call_id: &str) -> bool {
        self.queue.iter().any(|i| {
            i.missed_call_id == missed_call_id
                && matches!(
                    i.status,
                    CallbackStatus::Scheduled | CallbackStatus::InProgress
                )
        })
    }

    pub fn stats(&self) -> CallbackStats {
        let today = self.clock.now().date_naive();
        CallbackStats {
            total_missed: self.missed_calls.len() as u64,
            todays_missed: self
                .missed_calls
                .iter()
                .filter(|c| c.timestamp.date_naive() == today)
                .count() as u64,
            resolved: self
                .missed_calls
                .iter()
                .filter(|c| c.status == MissedCallStatus::Resolved)
                .count() as u64,
            pending_callbacks: self
                .queue
                .iter()
                .filter(|i| i.status == CallbackStatus::Scheduled)
                .count() as u64,
        }
    }

    /// State to persist across restarts
    pub fn snapshot(&self) -> CallbackSnapshot {
        CallbackSnapshot {
            missed_calls: self.missed_calls.clone(),
            queue: self.queue.clone(),
            notices: self.notices.clone(),
        }
    }

    /// Restore persisted state. In-progress items become scheduled again so
    /// attempts interrupted by a restart are retried.
    pub fn restore(&mut self, snapshot: CallbackSnapshot) {
        self.missed_calls = snapshot.missed_calls;
        self.queue = snapshot.queue;
        self.notices = snapshot.notices;
        let now = self.clock.now();
        for item in &mut self.queue {
            if item.status == CallbackStatus::InProgress {
                item.status = CallbackStatus::Scheduled;
                item.scheduled_at = now;
            }
        }
    }
}

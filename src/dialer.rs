//! Outbound dial capability.
//!
//! Callback attempts go through the [`Dialer`] trait so the engine never
//! depends on a concrete telephony integration. Production wires in a real
//! dialer; tests inject a deterministic fake.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tracing::debug;

/// Result of one outbound dial attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialOutcome {
    /// The customer picked up
    Connected,

    /// Rang out with no answer
    NoAnswer,

    /// Line busy
    Busy,

    /// Dial-layer failure (network, carrier, ...)
    Failed(String),
}

/// Outbound dialing capability
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Place a call and report how it went. Never blocks queue processing
    /// beyond the one attempt in flight.
    async fn dial(&self, phone_number: &str) -> DialOutcome;
}

/// Stand-in dialer that cycles through the possible outcomes.
///
/// Useful for demos; unlike a randomized table the sequence is predictable.
pub struct SimulatedDialer {
    next: AtomicUsize,
}

impl SimulatedDialer {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }
}

impl Default for SimulatedDialer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Dialer for SimulatedDialer {
    async fn dial(&self, phone_number: &str) -> DialOutcome {
        let outcomes = [
            DialOutcome::Connected,
            DialOutcome::NoAnswer,
            DialOutcome::Busy,
            DialOutcome::Failed("network_error".to_string()),
        ];
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % outcomes.len();
        let outcome = outcomes[idx].clone();
        debug!("☎️ Simulated dial to {}: {:?}", phone_number, outcome);
        outcome
    }
}

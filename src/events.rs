//! Typed domain events.
//!
//! Inbound events ([`DomainEvent`]) arrive from the telephony/presence/booking
//! collaborators; outbound events ([`EngineEvent`]) are published on a
//! broadcast channel for the telephony and UI layers to consume.

use serde::{Deserialize, Serialize};

use crate::callback::MissedReason;
use crate::staff::Availability;

/// Inbound call description carried by [`DomainEvent::CallStarted`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
    pub id: String,
    pub phone_number: String,
    pub transcript: Option<String>,
    /// Recognized returning customer (set by the external recognition system)
    pub returning_customer: bool,
}

impl CallData {
    pub fn new(id: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phone_number: phone_number.into(),
            transcript: None,
            returning_customer: false,
        }
    }

    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }
}

/// Events consumed by the engine
#[derive(Debug, Clone)]
pub enum DomainEvent {
    /// An inbound call is ready for routing
    CallStarted(CallData),

    /// A routed call finished
    CallEnded { id: String },

    /// A caller hung up while waiting in queue
    CallAbandoned {
        id: String,
        phone_number: String,
        customer_name: Option<String>,
        wait_seconds: u64,
    },

    /// A call rang out unanswered
    CallMissed {
        phone_number: String,
        customer_name: Option<String>,
        duration_seconds: u64,
        reason: MissedReason,
    },

    /// Staff presence change from the external presence system
    StaffAvailabilityChanged {
        staff_id: String,
        availability: Availability,
    },

    /// A booking tied to a pending callback was modified
    BookingModified { missed_call_id: String },

    /// A booking tied to a pending callback was cancelled
    BookingCancelled { missed_call_id: String },
}

/// Why a call was handed to the AI assistant instead of staff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AiFallbackReason {
    /// Skills-based routing is disabled in config
    RoutingDisabled,

    /// The request waited past the routing queue timeout
    Timeout,
}

impl std::fmt::Display for AiFallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AiFallbackReason::RoutingDisabled => write!(f, "routing_disabled"),
            AiFallbackReason::Timeout => write!(f, "timeout"),
        }
    }
}

/// Events emitted by the engine
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A call was connected to a staff member
    CallRouted {
        call: CallData,
        staff_id: String,
        staff_name: String,
        inquiry_type: String,
        route_id: String,
    },

    /// A call fell back to the AI assistant
    CallRoutedToAi {
        call: CallData,
        reason: AiFallbackReason,
    },

    /// A customer wait estimate was produced for a queued call
    CallQueued {
        call: CallData,
        estimated_wait_seconds: u64,
    },

    /// A callback attempt reached the customer
    CallbackCompleted {
        missed_call_id: String,
        phone_number: String,
    },

    /// A callback reached a terminal failure state
    CallbackFailed {
        missed_call_id: String,
        phone_number: String,
        reason: String,
    },
}

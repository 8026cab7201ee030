//! Skills-based call routing.
//!
//! The routing engine matches an inbound call against the staff directory,
//! queues it when nobody fits, and times queued requests out to the AI
//! fallback. It exclusively owns the routing queue and the active-route set,
//! and it is the only mutator of staff call counts.

pub mod engine;

pub use engine::{RoutingEngine, MIN_ESTIMATED_WAIT_SECONDS, VIP_SERVICE_SKILL};

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::CallData;
use crate::staff::StaffMember;

/// Caller priority class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerPriority {
    Normal,
    Returning,
    Vip,
}

/// Lifecycle of a routing request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Routed,
    FailedTimeout,
}

/// A pending or resolved request to route one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRequest {
    pub id: String,
    pub call: CallData,
    pub inquiry_type: String,
    pub customer_priority: CustomerPriority,
    pub created_at: DateTime<Utc>,
    pub attempts: u32,
    pub status: RequestStatus,
}

/// Lifecycle of an active route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Active,
    Completed,
}

/// A call currently connected to a staff member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveRoute {
    pub id: String,
    pub call_id: String,
    pub staff_id: String,
    pub inquiry_type: String,
    pub routed_at: DateTime<Utc>,
    pub status: RouteStatus,
}

/// Routing counters, persisted across restarts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingStats {
    pub total_routed: u64,
    pub successful_routes: u64,
    pub failed_routes: u64,
    pub routes_by_type: HashMap<String, u64>,
    pub routes_by_staff: HashMap<String, u64>,
}

impl RoutingStats {
    /// Successful routes as a percentage of all routing outcomes
    pub fn success_rate(&self) -> u32 {
        if self.total_routed == 0 {
            return 0;
        }
        ((self.successful_routes as f64 / self.total_routed as f64) * 100.0).round() as u32
    }
}

/// Persisted routing state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingSnapshot {
    pub stats: RoutingStats,
}

/// A call successfully connected to a staff member
#[derive(Debug, Clone)]
pub struct RoutedCall {
    pub call: CallData,
    pub staff: StaffMember,
    pub inquiry_type: String,
    pub route_id: String,
}

/// Outcome of routing a single inbound call
#[derive(Debug, Clone)]
pub enum RouteDecision {
    /// Connected to a staff member
    Routed(RoutedCall),

    /// Queued with an estimated wait
    Queued {
        request_id: String,
        estimated_wait_seconds: u64,
    },

    /// Handed to the AI assistant (routing disabled)
    SentToAi { call: CallData },

    /// The call already holds an active route; nothing changed
    AlreadyRouted { route_id: String },
}

/// Result of one routing queue reconciliation pass
#[derive(Debug, Default)]
pub struct QueueOutcome {
    /// Requests that found a staff member this pass
    pub routed: Vec<RoutedCall>,

    /// Requests that exceeded the queue timeout and fell back to AI
    pub timed_out: Vec<CallData>,
}

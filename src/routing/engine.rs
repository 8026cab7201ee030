//! Core routing engine and queue reconciliation.

use std::sync::Arc;

use std::collections::HashMap;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::RoutingConfig;
use crate::error::Result;
use crate::events::CallData;
use crate::intent::{InquiryCatalog, InquiryType, IntentClassifier, PriorityTier, GENERAL_INQUIRY};
use crate::staff::{StaffDirectory, StaffMember};

use super::{
    ActiveRoute, CustomerPriority, QueueOutcome, RequestStatus, RouteDecision, RouteStatus,
    RoutedCall, RoutingRequest, RoutingSnapshot, RoutingStats,
};

/// Floor for customer wait estimates (seconds)
pub const MIN_ESTIMATED_WAIT_SECONDS: u64 = 30;

/// Skill that unlocks the VIP scoring bonus
pub const VIP_SERVICE_SKILL: &str = "vip_service";

/// Scoring bonus for VIP callers matched with VIP-capable staff
const VIP_BONUS: i32 = 10;

/// Skills-based routing engine.
///
/// Owns the routing queue and the set of active routes; staff call counts are
/// mutated exclusively through this engine's capacity accounting.
pub struct RoutingEngine {
    config: RoutingConfig,
    catalog: Arc<InquiryCatalog>,
    classifier: IntentClassifier,
    directory: Arc<StaffDirectory>,
    clock: Arc<dyn Clock>,
    queue: Vec<RoutingRequest>,
    active_routes: HashMap<String, ActiveRoute>,
    stats: RoutingStats,
}

impl RoutingEngine {
    pub fn new(
        config: RoutingConfig,
        catalog: Arc<InquiryCatalog>,
        directory: Arc<StaffDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            classifier: IntentClassifier::new(catalog.clone()),
            catalog,
            directory,
            clock,
            queue: Vec::new(),
            active_routes: HashMap::new(),
            stats: RoutingStats::default(),
        }
    }

    /// Route an inbound call.
    ///
    /// Classifies the transcript, tries to match a staff member, and queues
    /// the request when nobody fits. Re-routing a call that already holds an
    /// active route is a logged no-op so staff counts never double-charge.
    pub fn route(&mut self, call: CallData, customer_priority: CustomerPriority) -> RouteDecision {
        if !self.config.enabled {
            info!("🚫 Skills-based routing disabled, falling back to AI");
            self.stats.total_routed += 1;
            self.stats.failed_routes += 1;
            return RouteDecision::SentToAi { call };
        }

        if let Some(route) = self
            .active_routes
            .values()
            .find(|r| r.call_id == call.id && r.status == RouteStatus::Active)
        {
            warn!(
                "📞 Call {} already routed (route {}), ignoring duplicate",
                call.id, route.id
            );
            return RouteDecision::AlreadyRouted {
                route_id: route.id.clone(),
            };
        }

        let transcript = call.transcript.clone().unwrap_or_default();
        let inquiry_id = self.classifier.classify(&transcript);
        let inquiry = self.inquiry_or_general(&inquiry_id);

        let request = RoutingRequest {
            id: format!("route_{}", Uuid::new_v4()),
            call,
            inquiry_type: inquiry.id.clone(),
            customer_priority,
            created_at: self.clock.now(),
            attempts: 0,
            status: RequestStatus::Pending,
        };

        match self.find_best_staff(&inquiry, customer_priority) {
            Some(staff) => match self.finalize_route(&request.call, &inquiry.id, &staff) {
                Ok(route_id) => {
                    let staff = self.directory.get(&staff.id).unwrap_or(staff);
                    RouteDecision::Routed(RoutedCall {
                        call: request.call,
                        staff,
                        inquiry_type: inquiry.id,
                        route_id,
                    })
                }
                Err(e) => {
                    error!("Failed to route call {}: {}", request.call.id, e);
                    self.enqueue(request)
                }
            },
            None => self.enqueue(request),
        }
    }

    fn enqueue(&mut self, request: RoutingRequest) -> RouteDecision {
        let estimated_wait_seconds = self.estimate_wait_seconds();
        info!(
            "⏱️ Call {} added to routing queue ({} waiting, est. wait {}s)",
            request.call.id,
            self.queue.len() + 1,
            estimated_wait_seconds
        );
        let request_id = request.id.clone();
        self.queue.push(request);
        RouteDecision::Queued {
            request_id,
            estimated_wait_seconds,
        }
    }

    /// Reconcile the routing queue against the current time and directory.
    ///
    /// FIFO order within the pass; processed entries are dropped in a single
    /// reverse-index sweep so remaining indices stay valid and untouched
    /// items keep their relative order.
    pub fn process_queue(&mut self) -> QueueOutcome {
        let mut outcome = QueueOutcome::default();
        if self.queue.is_empty() {
            return outcome;
        }

        debug!(
            "🔄 Processing routing queue: {} calls waiting",
            self.queue.len()
        );

        let now = self.clock.now();
        let max_wait = self.config.max_wait_time_seconds as i64;
        let mut processed: Vec<usize> = Vec::new();

        for idx in 0..self.queue.len() {
            if self.queue[idx].status != RequestStatus::Pending {
                processed.push(idx);
                continue;
            }

            let waited = now
                .signed_duration_since(self.queue[idx].created_at)
                .num_seconds();
            if waited > max_wait {
                warn!(
                    "⏰ Call {} exceeded max wait ({}s), routing to AI",
                    self.queue[idx].call.id, waited
                );
                self.queue[idx].status = RequestStatus::FailedTimeout;
                self.stats.total_routed += 1;
                self.stats.failed_routes += 1;
                outcome.timed_out.push(self.queue[idx].call.clone());
                processed.push(idx);
                continue;
            }

            self.queue[idx].attempts += 1;
            let customer_priority = self.queue[idx].customer_priority;
            let inquiry_id = self.queue[idx].inquiry_type.clone();
            let inquiry = self.inquiry_or_general(&inquiry_id);

            if let Some(staff) = self.find_best_staff(&inquiry, customer_priority) {
                let call = self.queue[idx].call.clone();
                match self.finalize_route(&call, &inquiry.id, &staff) {
                    Ok(route_id) => {
                        self.queue[idx].status = RequestStatus::Routed;
                        let staff = self.directory.get(&staff.id).unwrap_or(staff);
                        outcome.routed.push(RoutedCall {
                            call,
                            staff,
                            inquiry_type: inquiry.id,
                            route_id,
                        });
                        processed.push(idx);
                    }
                    Err(e) => error!("Failed to route queued call {}: {}", call.id, e),
                }
            }
        }

        for idx in processed.into_iter().rev() {
            self.queue.remove(idx);
        }

        outcome
    }

    /// Release the staff member for an ended call and reuse the freed
    /// capacity immediately instead of waiting for the next tick.
    pub fn complete_call(&mut self, call_id: &str) -> QueueOutcome {
        let done = self
            .active_routes
            .iter()
            .find(|(_, r)| r.call_id == call_id && r.status == RouteStatus::Active)
            .map(|(id, r)| (id.clone(), r.staff_id.clone(), r.inquiry_type.clone()));

        match done {
            Some((route_id, staff_id, inquiry_type)) => {
                self.directory.end_call(&staff_id);
                self.active_routes.remove(&route_id);
                info!("✅ Routing completed: {} handled {}", staff_id, inquiry_type);
            }
            None => debug!("No active route for ended call {}", call_id),
        }

        self.process_queue()
    }

    /// Best available staff member for an inquiry.
    ///
    /// Candidates must be available and hold every required skill. Highest
    /// score wins; equal scores resolve to the lexicographically smallest
    /// staff id so selection never depends on map iteration order.
    fn find_best_staff(
        &self,
        inquiry: &InquiryType,
        customer_priority: CustomerPriority,
    ) -> Option<StaffMember> {
        let mut candidates = self.directory.candidates(&inquiry.required_skills);
        if candidates.is_empty() {
            debug!("❌ No available staff for skills {:?}", inquiry.required_skills);
            return None;
        }

        candidates.sort_by(|a, b| a.id.cmp(&b.id));

        let mut best: Option<(i32, StaffMember)> = None;
        for staff in candidates {
            let score = Self::staff_score(&staff, inquiry, customer_priority);
            let better = match &best {
                Some((best_score, _)) => score > *best_score,
                None => true,
            };
            if better {
                best = Some((score, staff));
            }
        }

        best.map(|(score, staff)| {
            info!(
                "🎯 Selected {} for '{}' (score {})",
                staff.name, inquiry.name, score
            );
            staff
        })
    }

    fn staff_score(
        staff: &StaffMember,
        inquiry: &InquiryType,
        customer_priority: CustomerPriority,
    ) -> i32 {
        let mut score = staff.priority - staff.current_calls as i32 * 2;

        let matched_skills = inquiry
            .required_skills
            .iter()
            .filter(|skill| staff.skills.contains(*skill))
            .count() as i32;
        score += matched_skills * 3;

        if customer_priority == CustomerPriority::Vip && staff.skills.contains(VIP_SERVICE_SKILL) {
            score += VIP_BONUS;
        }

        score
    }

    /// Customer-facing wait estimate for a queued request
    fn estimate_wait_seconds(&self) -> u64 {
        let queue_len = self.queue.len() as f64;
        let available = self.directory.available_count().max(1) as f64;
        let estimate = (queue_len / available) * self.config.average_call_seconds as f64;
        (estimate.ceil() as u64).max(MIN_ESTIMATED_WAIT_SECONDS)
    }

    fn finalize_route(
        &mut self,
        call: &CallData,
        inquiry_type: &str,
        staff: &StaffMember,
    ) -> Result<String> {
        self.directory.begin_call(&staff.id)?;

        let route = ActiveRoute {
            id: format!("ar_{}", Uuid::new_v4()),
            call_id: call.id.clone(),
            staff_id: staff.id.clone(),
            inquiry_type: inquiry_type.to_string(),
            routed_at: self.clock.now(),
            status: RouteStatus::Active,
        };

        info!(
            "🎯 Routing call {} to {} ({})",
            call.id, staff.name, staff.title
        );

        let route_id = route.id.clone();
        self.active_routes.insert(route_id.clone(), route);

        self.stats.total_routed += 1;
        self.stats.successful_routes += 1;
        *self
            .stats
            .routes_by_type
            .entry(inquiry_type.to_string())
            .or_insert(0) += 1;
        *self.stats.routes_by_staff.entry(staff.id.clone()).or_insert(0) += 1;

        Ok(route_id)
    }

    fn inquiry_or_general(&self, inquiry_id: &str) -> InquiryType {
        match self.catalog.get(inquiry_id) {
            Some(inquiry) => inquiry.clone(),
            None => {
                warn!("Unknown inquiry type '{}', treating as general", inquiry_id);
                InquiryType::new(GENERAL_INQUIRY, "General Inquiry", &[], &[], PriorityTier::Low)
            }
        }
    }

    /// Requests currently waiting in the queue
    pub fn queue(&self) -> &[RoutingRequest] {
        &self.queue
    }

    /// Active routes, in no particular order
    pub fn active_routes(&self) -> Vec<ActiveRoute> {
        self.active_routes.values().cloned().collect()
    }

    /// Routing counters
    pub fn stats(&self) -> &RoutingStats {
        &self.stats
    }

    /// State persisted across restarts
    pub fn snapshot(&self) -> RoutingSnapshot {
        RoutingSnapshot {
            stats: self.stats.clone(),
        }
    }

    /// Restore persisted state
    pub fn restore(&mut self, snapshot: RoutingSnapshot) {
        self.stats = snapshot.stats;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::{Duration, TimeZone, Utc};

    fn setup(
        config: RoutingConfig,
    ) -> (RoutingEngine, Arc<StaffDirectory>, Arc<ManualClock>) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());
        let directory = Arc::new(StaffDirectory::new());
        directory.add(StaffMember::new(
            "specialist_1",
            "Maria Rodriguez",
            "Reservation Specialist",
            &["reservations"],
            1,
            5,
        ));
        directory.add(StaffMember::new(
            "server_1",
            "Emily Davis",
            "Lead Server",
            &["orders", "customer_service"],
            2,
            6,
        ));
        let engine = RoutingEngine::new(
            config,
            Arc::new(InquiryCatalog::restaurant_default()),
            directory.clone(),
            clock.clone(),
        );
        (engine, directory, clock)
    }

    fn reservation_call(id: &str) -> CallData {
        CallData::new(id, "+15550001111")
            .with_transcript("I would like to book a table for dinner")
    }

    #[test]
    fn routes_to_skilled_staff() {
        // Scenario: one skilled member, one without the skill.
        let (mut engine, directory, _clock) = setup(RoutingConfig::default());

        let decision = engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        match decision {
            RouteDecision::Routed(routed) => {
                assert_eq!(routed.staff.id, "specialist_1");
                assert_eq!(routed.inquiry_type, "reservation");
            }
            other => panic!("expected Routed, got {:?}", other),
        }

        assert_eq!(directory.get("specialist_1").unwrap().current_calls, 1);
        assert_eq!(engine.stats().successful_routes, 1);
    }

    #[test]
    fn queues_when_skilled_staff_at_capacity() {
        let (mut engine, directory, _clock) = setup(RoutingConfig::default());

        engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        assert_eq!(directory.get("specialist_1").unwrap().current_calls, 1);

        let decision = engine.route(reservation_call("call-2"), CustomerPriority::Normal);
        match decision {
            RouteDecision::Queued {
                estimated_wait_seconds,
                ..
            } => assert!(estimated_wait_seconds >= MIN_ESTIMATED_WAIT_SECONDS),
            other => panic!("expected Queued, got {:?}", other),
        }

        assert_eq!(engine.queue().len(), 1);
        assert_eq!(engine.queue()[0].status, RequestStatus::Pending);
    }

    #[test]
    fn queued_call_times_out_to_ai_exactly_once() {
        let mut config = RoutingConfig::default();
        config.max_wait_time_seconds = 1;
        let (mut engine, _directory, clock) = setup(config);

        engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        engine.route(reservation_call("call-2"), CustomerPriority::Normal);
        assert_eq!(engine.queue().len(), 1);

        clock.advance(Duration::seconds(2));
        let outcome = engine.process_queue();
        assert_eq!(outcome.timed_out.len(), 1);
        assert_eq!(outcome.timed_out[0].id, "call-2");
        assert!(engine.queue().is_empty());

        // A second pass must not produce the fallback again.
        let outcome = engine.process_queue();
        assert!(outcome.timed_out.is_empty());
    }

    #[test]
    fn completing_a_call_reuses_freed_capacity() {
        let (mut engine, directory, _clock) = setup(RoutingConfig::default());

        engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        engine.route(reservation_call("call-2"), CustomerPriority::Normal);
        assert_eq!(engine.queue().len(), 1);

        let outcome = engine.complete_call("call-1");
        assert_eq!(outcome.routed.len(), 1);
        assert_eq!(outcome.routed[0].call.id, "call-2");
        assert!(engine.queue().is_empty());
        assert_eq!(directory.get("specialist_1").unwrap().current_calls, 1);
    }

    #[test]
    fn routing_is_idempotent_per_call_id() {
        let (mut engine, directory, _clock) = setup(RoutingConfig::default());

        engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        let decision = engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        assert!(matches!(decision, RouteDecision::AlreadyRouted { .. }));
        assert_eq!(directory.get("specialist_1").unwrap().current_calls, 1);
    }

    #[test]
    fn current_calls_never_exceed_capacity() {
        let (mut engine, directory, _clock) = setup(RoutingConfig::default());

        for n in 0..5 {
            engine.route(reservation_call(&format!("call-{}", n)), CustomerPriority::Normal);
        }
        let specialist = directory.get("specialist_1").unwrap();
        assert!(specialist.current_calls <= specialist.max_concurrent_calls);

        for n in 0..5 {
            engine.complete_call(&format!("call-{}", n));
        }
        assert_eq!(directory.get("specialist_1").unwrap().current_calls, 0);
    }

    #[test]
    fn vip_bonus_prefers_vip_capable_staff() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());
        let directory = Arc::new(StaffDirectory::new());
        directory.add(StaffMember::new(
            "host_1",
            "James Wilson",
            "Host",
            &["reservations"],
            2,
            8,
        ));
        directory.add(StaffMember::new(
            "manager_1",
            "Sarah Chen",
            "Restaurant Manager",
            &["reservations", VIP_SERVICE_SKILL],
            2,
            5,
        ));
        let mut engine = RoutingEngine::new(
            RoutingConfig::default(),
            Arc::new(InquiryCatalog::restaurant_default()),
            directory,
            clock,
        );

        // Normal caller: the higher base priority wins.
        match engine.route(reservation_call("call-1"), CustomerPriority::Normal) {
            RouteDecision::Routed(routed) => assert_eq!(routed.staff.id, "host_1"),
            other => panic!("expected Routed, got {:?}", other),
        }

        // VIP caller: the vip_service bonus outweighs it.
        match engine.route(reservation_call("call-2"), CustomerPriority::Vip) {
            RouteDecision::Routed(routed) => assert_eq!(routed.staff.id, "manager_1"),
            other => panic!("expected Routed, got {:?}", other),
        }
    }

    #[test]
    fn score_ties_resolve_to_smallest_staff_id() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap());
        let directory = Arc::new(StaffDirectory::new());
        directory.add(StaffMember::new("b_host", "B", "Host", &["reservations"], 2, 5));
        directory.add(StaffMember::new("a_host", "A", "Host", &["reservations"], 2, 5));
        let mut engine = RoutingEngine::new(
            RoutingConfig::default(),
            Arc::new(InquiryCatalog::restaurant_default()),
            directory,
            clock,
        );

        match engine.route(reservation_call("call-1"), CustomerPriority::Normal) {
            RouteDecision::Routed(routed) => assert_eq!(routed.staff.id, "a_host"),
            other => panic!("expected Routed, got {:?}", other),
        }
    }

    #[test]
    fn disabled_routing_falls_back_to_ai() {
        let mut config = RoutingConfig::default();
        config.enabled = false;
        let (mut engine, _directory, _clock) = setup(config);

        let decision = engine.route(reservation_call("call-1"), CustomerPriority::Normal);
        assert!(matches!(decision, RouteDecision::SentToAi { .. }));
        assert_eq!(engine.stats().failed_routes, 1);
    }
}

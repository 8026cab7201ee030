//! Front desk engine: event entry points and component wiring.
//!
//! The engine owns every component (staff directory, routing engine, callback
//! scheduler, dialer, notification dispatcher, database) and funnels all state
//! mutation through its [`DomainEvent`] entry point and the queue processor's
//! ticks. External layers observe progress on the broadcast event channel.

use std::sync::Arc;

use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::callback::{CallbackDisposition, CallbackScheduler, CallbackStats};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::database::EngineDatabase;
use crate::dialer::{Dialer, SimulatedDialer};
use crate::error::{EngineError, Result};
use crate::events::{AiFallbackReason, CallData, DomainEvent, EngineEvent};
use crate::intent::InquiryCatalog;
use crate::notifications::{
    final_attempt_sms, missed_call_sms, NotificationDispatcher, NullDispatcher,
};
use crate::processor::QueueProcessor;
use crate::routing::{
    CustomerPriority, QueueOutcome, RouteDecision, RoutingEngine, RoutingStats,
};
use crate::staff::{StaffDirectory, StaffStats};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Combined engine statistics
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub staff: StaffStats,
    pub routing: RoutingStats,
    pub callbacks: CallbackStats,
}

/// The front desk engine
pub struct FrontDeskEngine {
    config: EngineConfig,
    directory: Arc<StaffDirectory>,
    routing: RwLock<RoutingEngine>,
    callbacks: RwLock<CallbackScheduler>,
    dialer: Arc<dyn Dialer>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    database: Option<EngineDatabase>,
    events_tx: broadcast::Sender<EngineEvent>,
    wake: Notify,
    shutdown: Notify,
}

impl FrontDeskEngine {
    /// Create an engine with the default roster, wall-clock time, the
    /// simulated dialer, and log-only notifications.
    pub async fn new(config: EngineConfig) -> Result<Arc<Self>> {
        Self::with_parts(
            config,
            Arc::new(SystemClock),
            Arc::new(StaffDirectory::with_default_roster()),
            Arc::new(SimulatedDialer::new()),
            Arc::new(NullDispatcher),
        )
        .await
    }

    /// Create an engine with injected collaborators.
    ///
    /// Validates config, opens the database when one is configured, and
    /// restores persisted state before accepting events.
    pub async fn with_parts(
        config: EngineConfig,
        clock: Arc<dyn Clock>,
        directory: Arc<StaffDirectory>,
        dialer: Arc<dyn Dialer>,
        dispatcher: Arc<dyn NotificationDispatcher>,
    ) -> Result<Arc<Self>> {
        config.validate().map_err(EngineError::config)?;
        info!("🏢 Starting front desk engine for {}", config.general.restaurant_name);

        let catalog = Arc::new(InquiryCatalog::restaurant_default());
        let mut routing = RoutingEngine::new(
            config.routing.clone(),
            catalog,
            directory.clone(),
            clock.clone(),
        );
        let mut callbacks = CallbackScheduler::new(
            config.callbacks.clone(),
            &config.business_hours,
            config.customers.clone(),
            clock.clone(),
        )?;

        let database = match &config.database.path {
            Some(path) => Some(EngineDatabase::open(path, config.database.max_connections).await?),
            None => None,
        };
        if let Some(db) = &database {
            if let Some(snapshot) = db.load_routing_snapshot().await? {
                info!("📥 Restored routing state");
                routing.restore(snapshot);
            }
            if let Some(snapshot) = db.load_callback_snapshot().await? {
                info!("📥 Restored callback state");
                callbacks.restore(snapshot);
            }
        }

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Arc::new(Self {
            config,
            directory,
            routing: RwLock::new(routing),
            callbacks: RwLock::new(callbacks),
            dialer,
            dispatcher,
            database,
            events_tx,
            wake: Notify::new(),
            shutdown: Notify::new(),
        }))
    }

    /// Spawn the queue processor task
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let processor = QueueProcessor::new(self.clone());
        tokio::spawn(async move { processor.run().await })
    }

    /// Subscribe to engine events
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events_tx.subscribe()
    }

    /// Entry point for all consumed domain events
    pub async fn handle_event(&self, event: DomainEvent) {
        match event {
            DomainEvent::CallStarted(call) => {
                self.route_incoming_call(call).await;
            }
            DomainEvent::CallEnded { id } => {
                self.handle_call_ended(&id).await;
            }
            DomainEvent::CallAbandoned {
                phone_number,
                customer_name,
                wait_seconds,
                ..
            } => {
                let recorded = self.callbacks.write().await.record_abandoned_call(
                    &phone_number,
                    customer_name,
                    wait_seconds,
                );
                if recorded.is_some() {
                    self.wake.notify_one();
                }
            }
            DomainEvent::CallMissed {
                phone_number,
                customer_name,
                duration_seconds,
                reason,
            } => {
                let recorded = self.callbacks.write().await.record_missed_call(
                    &phone_number,
                    customer_name,
                    duration_seconds,
                    reason,
                );
                if recorded.is_some() {
                    self.wake.notify_one();
                }
            }
            DomainEvent::StaffAvailabilityChanged {
                staff_id,
                availability,
            } => {
                // Freed staff are used right away rather than on the next tick
                if self.directory.set_availability(&staff_id, availability) {
                    self.process_routing_queue().await;
                }
            }
            DomainEvent::BookingModified { missed_call_id }
            | DomainEvent::BookingCancelled { missed_call_id } => {
                self.callbacks.write().await.cancel_for(&missed_call_id);
            }
        }
    }

    /// Route an inbound call and publish the outcome
    pub async fn route_incoming_call(&self, call: CallData) -> RouteDecision {
        let priority = self.customer_priority(&call);
        let queued_call = call.clone();
        let decision = self.routing.write().await.route(call, priority);

        match &decision {
            RouteDecision::Routed(routed) => {
                self.emit(EngineEvent::CallRouted {
                    call: routed.call.clone(),
                    staff_id: routed.staff.id.clone(),
                    staff_name: routed.staff.name.clone(),
                    inquiry_type: routed.inquiry_type.clone(),
                    route_id: routed.route_id.clone(),
                });
            }
            RouteDecision::Queued {
                estimated_wait_seconds,
                ..
            } => {
                self.emit(EngineEvent::CallQueued {
                    call: queued_call,
                    estimated_wait_seconds: *estimated_wait_seconds,
                });
            }
            RouteDecision::SentToAi { call } => {
                self.emit(EngineEvent::CallRoutedToAi {
                    call: call.clone(),
                    reason: AiFallbackReason::RoutingDisabled,
                });
            }
            RouteDecision::AlreadyRouted { .. } => {}
        }

        decision
    }

    fn customer_priority(&self, call: &CallData) -> CustomerPriority {
        if self.config.customers.priority_numbers.contains(&call.phone_number) {
            CustomerPriority::Vip
        } else if call.returning_customer {
            CustomerPriority::Returning
        } else {
            CustomerPriority::Normal
        }
    }

    async fn handle_call_ended(&self, call_id: &str) {
        let outcome = self.routing.write().await.complete_call(call_id);
        self.publish_queue_outcome(outcome);
    }

    /// Reconcile the routing queue and publish what moved.
    ///
    /// Called from the processor's routing tick; also usable directly when
    /// embedding the engine without the processor task.
    pub async fn process_routing_queue(&self) {
        let outcome = self.routing.write().await.process_queue();
        self.publish_queue_outcome(outcome);
    }

    fn publish_queue_outcome(&self, outcome: QueueOutcome) {
        for routed in outcome.routed {
            self.emit(EngineEvent::CallRouted {
                call: routed.call,
                staff_id: routed.staff.id,
                staff_name: routed.staff.name,
                inquiry_type: routed.inquiry_type,
                route_id: routed.route_id,
            });
        }
        for call in outcome.timed_out {
            self.emit(EngineEvent::CallRoutedToAi {
                call,
                reason: AiFallbackReason::Timeout,
            });
        }
    }

    /// Reconcile the callback queue: send due SMS notices, run due dial
    /// attempts, and publish terminal outcomes.
    pub async fn process_callback_queue(&self) {
        let notices = self.callbacks.write().await.due_notices();
        for notice in notices {
            let message = missed_call_sms(
                &self.config.general.restaurant_name,
                &notice.phone_number,
                notice.reason,
                notice.missed_at,
            );
            match self.dispatcher.send_message(message).await {
                Ok(()) => {
                    self.callbacks
                        .write()
                        .await
                        .mark_sms_sent(&notice.missed_call_id);
                }
                // Delivery failures never roll back scheduler state
                Err(e) => warn!("📱 SMS to {} failed: {}", notice.phone_number, e),
            }
        }

        let jobs = self.callbacks.write().await.begin_due_attempts();
        for job in jobs {
            let outcome = self.dialer.dial(&job.phone_number).await;
            let disposition = self
                .callbacks
                .write()
                .await
                .record_dial_outcome(&job.missed_call_id, outcome);
            match disposition {
                CallbackDisposition::Resolved => {
                    self.emit(EngineEvent::CallbackCompleted {
                        missed_call_id: job.missed_call_id,
                        phone_number: job.phone_number,
                    });
                }
                CallbackDisposition::RetryScheduled { at } => {
                    debug!("🔄 Callback to {} retries at {}", job.phone_number, at);
                }
                CallbackDisposition::MaxAttemptsReached => {
                    self.send_final_notice(&job.phone_number).await;
                    self.emit(EngineEvent::CallbackFailed {
                        missed_call_id: job.missed_call_id,
                        phone_number: job.phone_number,
                        reason: "max_attempts_reached".to_string(),
                    });
                }
                CallbackDisposition::HardFailed { reason } => {
                    self.send_final_notice(&job.phone_number).await;
                    self.emit(EngineEvent::CallbackFailed {
                        missed_call_id: job.missed_call_id,
                        phone_number: job.phone_number,
                        reason,
                    });
                }
                CallbackDisposition::Ignored => {}
            }
        }
    }

    async fn send_final_notice(&self, phone_number: &str) {
        if !self.config.callbacks.sms_notifications_enabled {
            return;
        }
        let message = final_attempt_sms(&self.config.general.restaurant_name, phone_number);
        if let Err(e) = self.dispatcher.send_message(message).await {
            warn!("📱 Final-attempt SMS to {} failed: {}", phone_number, e);
        }
    }

    /// Write both snapshots through the persistence boundary
    pub(crate) async fn persist_state(&self) {
        let Some(db) = &self.database else {
            return;
        };
        let routing = self.routing.read().await.snapshot();
        if let Err(e) = db.save_routing_snapshot(&routing).await {
            warn!("💾 Failed to persist routing state: {}", e);
        }
        let callbacks = self.callbacks.read().await.snapshot();
        if let Err(e) = db.save_callback_snapshot(&callbacks).await {
            warn!("💾 Failed to persist callback state: {}", e);
        }
    }

    /// Persist state and stop the queue processor
    pub async fn shutdown(&self) {
        info!("🛑 Shutting down front desk engine");
        self.persist_state().await;
        self.shutdown.notify_one();
        if let Some(db) = &self.database {
            db.close().await;
        }
    }

    /// Combined statistics across all components
    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            staff: self.directory.stats(),
            routing: self.routing.read().await.stats().clone(),
            callbacks: self.callbacks.read().await.stats(),
        }
    }

    pub fn directory(&self) -> &Arc<StaffDirectory> {
        &self.directory
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Missed-call records, for inspection and admin surfaces
    pub async fn missed_calls(&self) -> Vec<crate::callback::MissedCall> {
        self.callbacks.read().await.missed_calls().to_vec()
    }

    pub(crate) fn waker(&self) -> &Notify {
        &self.wake
    }

    pub(crate) fn shutdown_signal(&self) -> &Notify {
        &self.shutdown
    }

    fn emit(&self, event: EngineEvent) {
        // A send error just means nobody is subscribed right now
        let _ = self.events_tx.send(event);
    }
}

//! End-to-end tests driving the engine through domain events with a manual
//! clock, a scripted dialer, and a recording SMS dispatcher.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use frontdesk_engine::notifications::MessageKind;
use frontdesk_engine::prelude::*;

/// Dialer that replays a scripted list of outcomes and records every number
/// it was asked to dial.
struct ScriptedDialer {
    outcomes: Mutex<VecDeque<DialOutcome>>,
    dialed: Mutex<Vec<String>>,
}

impl ScriptedDialer {
    fn new(outcomes: Vec<DialOutcome>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            dialed: Mutex::new(Vec::new()),
        })
    }

    fn dial_count(&self) -> usize {
        self.dialed.lock().len()
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, phone_number: &str) -> DialOutcome {
        self.dialed.lock().push(phone_number.to_string());
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or(DialOutcome::NoAnswer)
    }
}

/// Dispatcher that records messages instead of sending them
struct RecordingDispatcher {
    messages: Mutex<Vec<SmsMessage>>,
}

impl RecordingDispatcher {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: Mutex::new(Vec::new()),
        })
    }

    fn of_kind(&self, kind: MessageKind) -> Vec<SmsMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send_message(&self, message: SmsMessage) -> Result<()> {
        self.messages.lock().push(message);
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}

fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
}

fn late_night() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 23, 0, 0).unwrap()
}

/// Directory with exactly one reservation-capable member (capacity 1) and
/// one member without the skill, as in the routing scenarios.
fn small_directory() -> Arc<StaffDirectory> {
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
    directory
}

async fn build_engine(
    config: EngineConfig,
    start: DateTime<Utc>,
    directory: Arc<StaffDirectory>,
    dialer: Arc<ScriptedDialer>,
    dispatcher: Arc<RecordingDispatcher>,
) -> (Arc<FrontDeskEngine>, Arc<ManualClock>) {
    init_tracing();
    let clock = ManualClock::new(start);
    let engine = FrontDeskEngine::with_parts(config, clock.clone(), directory, dialer, dispatcher)
        .await
        .expect("engine construction");
    (engine, clock)
}

fn drain(rx: &mut broadcast::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn reservation_call(id: &str, phone: &str) -> CallData {
    CallData::new(id, phone).with_transcript("I'd like to book a table for dinner tonight")
}

#[tokio::test]
async fn reservation_call_routes_to_skilled_staff() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, _clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer,
        dispatcher,
    )
    .await;
    let mut rx = engine.subscribe();

    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-1",
            "+15551230001",
        )))
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        EngineEvent::CallRouted {
            staff_id,
            inquiry_type,
            ..
        } => {
            assert_eq!(staff_id, "specialist_1");
            assert_eq!(inquiry_type, "reservation");
        }
        other => panic!("expected CallRouted, got {:?}", other),
    }
    assert_eq!(
        engine.directory().get("specialist_1").unwrap().current_calls,
        1
    );
}

#[tokio::test]
async fn second_call_queues_and_routes_when_capacity_frees() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, _clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer,
        dispatcher,
    )
    .await;
    let mut rx = engine.subscribe();

    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-1",
            "+15551230001",
        )))
        .await;
    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-2",
            "+15551230002",
        )))
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    match &events[1] {
        EngineEvent::CallQueued {
            call,
            estimated_wait_seconds,
        } => {
            assert_eq!(call.id, "call-2");
            assert!(*estimated_wait_seconds > 0);
        }
        other => panic!("expected CallQueued, got {:?}", other),
    }

    // The first call ends; the freed capacity goes to the queued call
    // without waiting for a tick.
    engine
        .handle_event(DomainEvent::CallEnded {
            id: "call-1".to_string(),
        })
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        EngineEvent::CallRouted { call, staff_id, .. } => {
            assert_eq!(call.id, "call-2");
            assert_eq!(staff_id, "specialist_1");
        }
        other => panic!("expected CallRouted, got {:?}", other),
    }
}

#[tokio::test]
async fn queued_call_times_out_to_ai_exactly_once() {
    let mut config = EngineConfig::default();
    config.routing.max_wait_time_seconds = 1;
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, clock) =
        build_engine(config, noon(), small_directory(), dialer, dispatcher).await;
    let mut rx = engine.subscribe();

    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-1",
            "+15551230001",
        )))
        .await;
    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-2",
            "+15551230002",
        )))
        .await;
    drain(&mut rx);

    clock.advance(Duration::seconds(2));
    engine.process_routing_queue().await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        EngineEvent::CallRoutedToAi { call, reason } => {
            assert_eq!(call.id, "call-2");
            assert_eq!(*reason, AiFallbackReason::Timeout);
        }
        other => panic!("expected CallRoutedToAi, got {:?}", other),
    }

    // Subsequent passes never produce the fallback again
    engine.process_routing_queue().await;
    clock.advance(Duration::seconds(30));
    engine.process_routing_queue().await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn staff_becoming_available_drains_the_queue() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let directory = small_directory();
    directory.set_availability("specialist_1", Availability::Break);
    let (engine, _clock) = build_engine(
        EngineConfig::default(),
        noon(),
        directory,
        dialer,
        dispatcher,
    )
    .await;
    let mut rx = engine.subscribe();

    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-1",
            "+15551230001",
        )))
        .await;
    assert!(matches!(
        drain(&mut rx)[..],
        [EngineEvent::CallQueued { .. }]
    ));

    engine
        .handle_event(DomainEvent::StaffAvailabilityChanged {
            staff_id: "specialist_1".to_string(),
            availability: Availability::Available,
        })
        .await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], EngineEvent::CallRouted { .. }));
}

#[tokio::test]
async fn missed_call_out_of_hours_waits_for_opening() {
    let dialer = ScriptedDialer::new(vec![DialOutcome::Connected]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, clock) = build_engine(
        EngineConfig::default(),
        late_night(),
        small_directory(),
        dialer.clone(),
        dispatcher,
    )
    .await;
    let mut rx = engine.subscribe();

    engine
        .handle_event(DomainEvent::CallMissed {
            phone_number: "+15551239999".to_string(),
            customer_name: Some("Anna".to_string()),
            duration_seconds: 25,
            reason: MissedReason::Unanswered,
        })
        .await;

    // Due at 23:05, but it is outside business hours: no dial happens
    clock.advance(Duration::minutes(5));
    engine.process_callback_queue().await;
    assert_eq!(dialer.dial_count(), 0);

    // At opening time the next morning the callback goes out
    clock.set(Utc.with_ymd_and_hms(2025, 6, 3, 8, 0, 0).unwrap());
    engine.process_callback_queue().await;
    assert_eq!(dialer.dial_count(), 1);

    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::CallbackCompleted { phone_number, .. } if phone_number == "+15551239999")));
}

#[tokio::test]
async fn exhausted_callbacks_send_exactly_one_final_notice() {
    let dialer = ScriptedDialer::new(vec![
        DialOutcome::NoAnswer,
        DialOutcome::Busy,
        DialOutcome::NoAnswer,
    ]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer.clone(),
        dispatcher.clone(),
    )
    .await;
    let mut rx = engine.subscribe();

    engine
        .handle_event(DomainEvent::CallMissed {
            phone_number: "+15551239999".to_string(),
            customer_name: None,
            duration_seconds: 25,
            reason: MissedReason::Unanswered,
        })
        .await;

    // Attempt 1 at +5min, retries at +15 and +30 minutes after each failure
    clock.advance(Duration::minutes(5));
    engine.process_callback_queue().await;
    clock.advance(Duration::minutes(15));
    engine.process_callback_queue().await;
    clock.advance(Duration::minutes(30));
    engine.process_callback_queue().await;

    assert_eq!(dialer.dial_count(), 3);
    let final_notices = dispatcher.of_kind(MessageKind::FinalAttemptNotice);
    assert_eq!(final_notices.len(), 1);
    assert_eq!(final_notices[0].phone_number, "+15551239999");

    let events = drain(&mut rx);
    let failed: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::CallbackFailed { .. }))
        .collect();
    assert_eq!(failed.len(), 1);
    match failed[0] {
        EngineEvent::CallbackFailed { reason, .. } => {
            assert_eq!(reason, "max_attempts_reached")
        }
        _ => unreachable!(),
    }

    let missed = engine.missed_calls().await;
    assert_eq!(missed[0].status, MissedCallStatus::MaxAttemptsReached);
    assert_eq!(missed[0].attempts, 3);

    // Terminal record stays quiet
    clock.advance(Duration::hours(3));
    engine.process_callback_queue().await;
    assert_eq!(dialer.dial_count(), 3);
    assert_eq!(dispatcher.of_kind(MessageKind::FinalAttemptNotice).len(), 1);
}

#[tokio::test]
async fn missed_call_sms_notice_uses_the_restaurant_template() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer,
        dispatcher.clone(),
    )
    .await;

    engine
        .handle_event(DomainEvent::CallMissed {
            phone_number: "+15551239999".to_string(),
            customer_name: None,
            duration_seconds: 25,
            reason: MissedReason::Unanswered,
        })
        .await;

    clock.advance(Duration::minutes(2));
    engine.process_callback_queue().await;

    let notices = dispatcher.of_kind(MessageKind::MissedCallNotice);
    assert_eq!(notices.len(), 1);
    assert!(notices[0].body.contains("Bella Vista Restaurant"));

    let missed = engine.missed_calls().await;
    assert!(missed[0].sms_notification_sent);
}

#[tokio::test]
async fn abandoned_calls_past_the_threshold_get_callbacks() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, _clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer,
        dispatcher,
    )
    .await;

    engine
        .handle_event(DomainEvent::CallAbandoned {
            id: "call-1".to_string(),
            phone_number: "+15551230001".to_string(),
            customer_name: None,
            wait_seconds: 20,
        })
        .await;
    assert!(engine.missed_calls().await.is_empty());

    engine
        .handle_event(DomainEvent::CallAbandoned {
            id: "call-2".to_string(),
            phone_number: "+15551230002".to_string(),
            customer_name: None,
            wait_seconds: 45,
        })
        .await;
    let missed = engine.missed_calls().await;
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].reason, MissedReason::AbandonedAfterWait);
}

#[tokio::test]
async fn blacklisted_numbers_never_get_callbacks_or_sms() {
    let mut config = EngineConfig::default();
    config
        .customers
        .blacklisted_numbers
        .insert("+15550000000".to_string());
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, clock) = build_engine(
        config,
        noon(),
        small_directory(),
        dialer.clone(),
        dispatcher.clone(),
    )
    .await;

    engine
        .handle_event(DomainEvent::CallMissed {
            phone_number: "+15550000000".to_string(),
            customer_name: None,
            duration_seconds: 25,
            reason: MissedReason::Unanswered,
        })
        .await;

    clock.advance(Duration::hours(1));
    engine.process_callback_queue().await;
    assert!(engine.missed_calls().await.is_empty());
    assert_eq!(dialer.dial_count(), 0);
    assert!(dispatcher.messages.lock().is_empty());
}

#[tokio::test]
async fn booking_cancellation_cancels_the_pending_callback() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer.clone(),
        dispatcher,
    )
    .await;

    engine
        .handle_event(DomainEvent::CallMissed {
            phone_number: "+15551239999".to_string(),
            customer_name: None,
            duration_seconds: 25,
            reason: MissedReason::Unanswered,
        })
        .await;
    let missed_call_id = engine.missed_calls().await[0].id.clone();

    engine
        .handle_event(DomainEvent::BookingCancelled { missed_call_id })
        .await;

    clock.advance(Duration::hours(1));
    engine.process_callback_queue().await;
    assert_eq!(dialer.dial_count(), 0);
}

#[tokio::test]
async fn state_survives_an_engine_restart() {
    let db_path = std::env::temp_dir().join(format!(
        "frontdesk-test-{}.db",
        uuid::Uuid::new_v4()
    ));
    let mut config = EngineConfig::default();
    config.database.path = Some(db_path.to_string_lossy().into_owned());

    {
        let dialer = ScriptedDialer::new(vec![]);
        let dispatcher = RecordingDispatcher::new();
        let (engine, _clock) = build_engine(
            config.clone(),
            noon(),
            small_directory(),
            dialer,
            dispatcher,
        )
        .await;

        engine
            .handle_event(DomainEvent::CallStarted(reservation_call(
                "call-1",
                "+15551230001",
            )))
            .await;
        engine
            .handle_event(DomainEvent::CallMissed {
                phone_number: "+15551239999".to_string(),
                customer_name: None,
                duration_seconds: 25,
                reason: MissedReason::Unanswered,
            })
            .await;
        engine.shutdown().await;
    }

    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, _clock) = build_engine(
        config,
        noon() + Duration::minutes(1),
        small_directory(),
        dialer,
        dispatcher,
    )
    .await;

    let stats = engine.stats().await;
    assert_eq!(stats.routing.total_routed, 1);
    assert_eq!(stats.routing.successful_routes, 1);
    let missed = engine.missed_calls().await;
    assert_eq!(missed.len(), 1);
    assert_eq!(missed[0].phone_number, "+15551239999");

    engine.shutdown().await;
    let _ = std::fs::remove_file(&db_path);
}

#[tokio::test(start_paused = true)]
async fn processor_runs_and_stops_on_shutdown() {
    let dialer = ScriptedDialer::new(vec![]);
    let dispatcher = RecordingDispatcher::new();
    let (engine, _clock) = build_engine(
        EngineConfig::default(),
        noon(),
        small_directory(),
        dialer,
        dispatcher,
    )
    .await;

    let handle = engine.start();

    engine
        .handle_event(DomainEvent::CallStarted(reservation_call(
            "call-1",
            "+15551230001",
        )))
        .await;
    // Let a few ticks elapse under paused time
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;

    engine.shutdown().await;
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .expect("processor should stop after shutdown")
        .expect("processor task should not panic");
}

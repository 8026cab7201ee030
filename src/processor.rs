//! Tick-driven queue reconciliation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::FrontDeskEngine;

#[derive(Debug, Clone, Copy)]
enum Tick {
    Routing,
    Callbacks,
    /// Ad-hoc wake: staff freed or new callback work recorded
    Wake,
}

/// Single task that drives the routing queue, the callback queue, and
/// periodic persistence.
///
/// Ticks are guarded by a processing flag: if one fires while another is
/// still running, the late one is dropped rather than queued.
pub struct QueueProcessor {
    engine: Arc<FrontDeskEngine>,
    processing: AtomicBool,
}

impl QueueProcessor {
    pub fn new(engine: Arc<FrontDeskEngine>) -> Self {
        Self {
            engine,
            processing: AtomicBool::new(false),
        }
    }

    /// Run until the engine signals shutdown
    pub async fn run(self) {
        let config = self.engine.config();
        let mut routing_tick = interval(Duration::from_secs(config.routing.tick_seconds));
        let mut callback_tick = interval(Duration::from_secs(config.callbacks.tick_seconds));
        let mut persist_tick =
            interval(Duration::from_secs(config.database.persist_interval_seconds));
        routing_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        callback_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        persist_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "⚙️ Queue processor running (routing {}s, callbacks {}s, persist {}s)",
            config.routing.tick_seconds,
            config.callbacks.tick_seconds,
            config.database.persist_interval_seconds
        );

        loop {
            tokio::select! {
                _ = routing_tick.tick() => self.tick(Tick::Routing).await,
                _ = callback_tick.tick() => self.tick(Tick::Callbacks).await,
                _ = persist_tick.tick() => self.engine.persist_state().await,
                _ = self.engine.waker().notified() => self.tick(Tick::Wake).await,
                _ = self.engine.shutdown_signal().notified() => {
                    info!("⚙️ Queue processor stopping");
                    break;
                }
            }
        }
    }

    async fn tick(&self, kind: Tick) {
        if self
            .processing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("⚙️ Tick {:?} dropped, previous tick still running", kind);
            return;
        }

        match kind {
            Tick::Routing => self.engine.process_routing_queue().await,
            Tick::Callbacks => self.engine.process_callback_queue().await,
            Tick::Wake => {
                self.engine.process_routing_queue().await;
                self.engine.process_callback_queue().await;
            }
        }

        self.processing.store(false, Ordering::SeqCst);
    }
}

//! # Front Desk Engine
//!
//! Call intake routing and missed-call callback automation for a restaurant
//! front desk.
//!
//! Incoming calls are classified from their transcript, matched to the best
//! available staff member by skill and priority, and queued with a wait
//! estimate when nobody is free. Calls that go unanswered enter a callback
//! workflow: an SMS notice, scheduled callback attempts with retry backoff,
//! business-hours gating, and a fast path for priority numbers.
//!
//! ## Architecture
//!
//! The [`engine::FrontDeskEngine`] owns every component and consumes
//! [`events::DomainEvent`]s from the telephony, presence, and booking
//! collaborators; progress is published as [`events::EngineEvent`]s on a
//! broadcast channel. Telephony itself, SMS transport, and the voice/NLP
//! pipeline live behind the [`dialer::Dialer`] and
//! [`notifications::NotificationDispatcher`] traits.
//!
//! ```no_run
//! use frontdesk_engine::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let engine = FrontDeskEngine::new(EngineConfig::default()).await?;
//!     let processor = engine.start();
//!
//!     let call = CallData::new("call-1", "+15551234567")
//!         .with_transcript("I'd like to book a table for four");
//!     engine.handle_event(DomainEvent::CallStarted(call)).await;
//!
//!     engine.shutdown().await;
//!     processor.await.ok();
//!     Ok(())
//! }
//! ```

pub mod callback;
pub mod clock;
pub mod config;
pub mod database;
pub mod dialer;
pub mod engine;
pub mod error;
pub mod events;
pub mod intent;
pub mod notifications;
pub mod processor;
pub mod routing;
pub mod staff;

pub use engine::FrontDeskEngine;
pub use error::{EngineError, Result};

/// Commonly used types
pub mod prelude {
    pub use crate::callback::{
        CallbackItem, CallbackPriority, CallbackScheduler, CallbackStatus, MissedCall,
        MissedCallStatus, MissedReason,
    };
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::EngineConfig;
    pub use crate::dialer::{DialOutcome, Dialer, SimulatedDialer};
    pub use crate::engine::{EngineStats, FrontDeskEngine};
    pub use crate::error::{EngineError, Result};
    pub use crate::events::{AiFallbackReason, CallData, DomainEvent, EngineEvent};
    pub use crate::intent::{InquiryCatalog, InquiryType, IntentClassifier};
    pub use crate::notifications::{NotificationDispatcher, NullDispatcher, SmsMessage};
    pub use crate::routing::{CustomerPriority, RouteDecision, RoutingEngine};
    pub use crate::staff::{Availability, StaffDirectory, StaffMember};
}

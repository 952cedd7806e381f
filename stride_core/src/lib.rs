#![forbid(unsafe_code)]

//! Core domain model and business logic for the Stride training-plan tracker.
//!
//! This crate provides:
//! - Domain types (plans, day logs, activity entries, chat turns)
//! - Calendar and pace utilities
//! - The plan/log document store with batched writes and snapshots
//! - Generation and coach-chat clients for the generative endpoint
//! - The merge engine reconciling proposed days with logged actuals

pub mod types;
pub mod error;
pub mod calendar;
pub mod pace;
pub mod config;
pub mod logging;
pub mod identity;
pub mod store;
pub mod merge;
pub mod endpoint;
pub mod generate;
pub mod chat;
pub mod feedback;
pub mod transcript;
pub mod session;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use calendar::{days_between, month_group, MonthGroup};
pub use config::Config;
pub use identity::Identity;
pub use store::{DaySnapshot, PlanStore, Subscription, WriteBatch, WriteOp};
pub use endpoint::CoachEndpoint;
pub use chat::{CoachChat, TurnOutcome, PLAN_UPDATE_MARKER};
pub use transcript::{JsonlTranscript, TurnSink};
pub use session::{Op, SessionContext};

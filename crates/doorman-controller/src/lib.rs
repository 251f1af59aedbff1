//! Door access controller.
//!
//! Ties the decoder, the classified inputs, the relay and the persisted
//! tables together into one single-owner [`DoorController`], and hosts it on
//! tokio through [`runtime::spawn_controller`].
//!
//! # Modules
//!
//! - [`controller`]: application state and the tick pipeline
//! - [`commands`]: commands shared by all transports, MQTT topic mapping
//! - [`api`]: framework-free HTTP request handler
//! - [`dispatcher`]: first-match-wins rule evaluation
//! - [`schedule`]: periodic `schedule` rule triggers
//! - [`event_log`]: the 50-entry ring log
//! - [`runtime`]: the controller task and its handle
//!
//! # Event flow
//!
//! ```text
//! D0/D1 edges ──► WiegandDecoder ──► Credential ──► AccessTable ──► Relay
//!                                         │
//! door / aux ──► EdgeDetector ───► Event ─┴──► dispatch(rules) ──► Relay / Log / Outbox
//! reset ──────► HoldClassifier ──► SystemRequest
//! ```

pub mod api;
pub mod commands;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod event_log;
pub mod runtime;
pub mod schedule;

pub use api::{ApiRequest, ApiResponse, Method};
pub use commands::{Command, CommandReply, TopicRouter};
pub use controller::{ControllerConfig, DoorController, DoorStatus, Pins, SystemRequest};
pub use dispatcher::{Dispatch, Notification, RuleError, RuleOutcome, dispatch};
pub use error::{ControllerError, Result};
pub use event_log::EventLog;
pub use runtime::{ControllerHandle, spawn_controller};
pub use schedule::Scheduler;

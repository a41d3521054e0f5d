//! Session orchestration for TuneRig.
//!
//! Owns the session lifecycle: [`SessionOrchestrator`] drives the trial loop
//! against a suggestion service and an evaluation target, and [`EventSink`]
//! fans progress out to observers while keeping the bounded in-memory views
//! (trial history, best result, journal).

pub mod errors;
pub mod events;
pub mod orchestrator;

pub use errors::{SessionError, SessionResult};
pub use events::{EventSink, EventSinkConfig, SessionEvent};
pub use orchestrator::SessionOrchestrator;

//! Suggestion engine clients for TuneRig.
//!
//! The orchestrator talks to a suggestion engine through the
//! [`SuggestionService`] trait. [`HttpSuggestClient`] speaks to a real
//! service over HTTP; [`LocalSuggestService`] is a fully in-process
//! backend for sandbox runs and tests.

pub mod client;
pub mod local;
pub mod wire;

pub use client::{
    HttpSuggestClient, RegisterOutcome, SessionId, SuggestError, SuggestResult, Suggestion,
    SuggestionService,
};
pub use local::LocalSuggestService;

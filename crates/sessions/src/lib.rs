//! Session state for the deep-research execution engine.
//!
//! Owns the in-memory `Session` domain objects, the append-only per-session
//! event log, and the subscriber fan-out that backs the event-streaming API.
//! Orchestration itself lives in `dr-engine`; this crate only holds and
//! mutates state on that crate's behalf.

pub mod store;

pub use store::{cancel_key, SessionStore};

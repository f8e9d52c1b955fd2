//! Session execution engine: resolves providers, drives the orchestrator's
//! tool-calling loop, supervises sub-agents, and exposes the whole thing
//! behind one `Engine` façade.

pub mod budget;
pub mod context;
pub mod engine;
pub mod orchestrator;
pub mod report;
pub mod retry;
pub mod sub_agent;
pub mod tools;

pub use context::EngineContext;
pub use engine::{Engine, EngineError, FileBytes, SessionSnapshot};
pub use orchestrator::OrchestratorJob;

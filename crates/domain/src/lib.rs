//! Shared data model, configuration, and error types for the deep-research
//! session execution engine.

pub mod cancel;
pub mod capability;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod stream;
pub mod tool_error;
pub mod trace;

pub use cancel::{CancelMap, CancelToken};
pub use capability::{LlmCapabilities, ModelRole, ToolSupport};
pub use config::Config;
pub use error::{Error, Result};
pub use message::{ContentPart, Message, MessageContent, ProviderToolCall, Role};
pub use model::*;
pub use stream::{BoxStream, StreamEvent, Usage};
pub use tool_error::{ToolError, ToolErrorCode};
pub use trace::TraceEvent;

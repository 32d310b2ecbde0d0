//! # ferrocode core
//!
//! Domain types, traits, and error definitions for the ferrocode
//! coding-agent runtime. Every other crate depends inward on this one.
//!
//! The seams the engine is built around are all traits defined here:
//! - [`ModelTransport`]: the model call
//! - [`ToolRegistry`]: tool execution
//! - [`InteractionSink`]: lifecycle notifications and confirmation
//!
//! Front-ends differ only in what they plug into these seams.

pub mod error;
pub mod event;
pub mod interaction;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{CheckpointError, MessageError, ProviderError, ToolError};
pub use event::{DomainEvent, EventBus};
pub use interaction::{ConfirmDecision, ConfirmationRequest, DiffPreview, InteractionSink};
pub use message::{Message, MessageView, Role};
pub use provider::{
    CallOptions, ModelRequest, ModelResponse, ModelTransport, NativeToolCall, ToolChoice,
    ToolDefinition, Usage,
};
pub use tool::{
    ErrorCategory, PermissionCategory, ProposedWrite, SourceFormat, Tool, ToolDescriptor,
    ToolInvocation, ToolOutput, ToolRegistry, ToolSet,
};

//! The ferrocode agent engine.
//!
//! One turn follows a **model -> tools -> model** cycle:
//!
//! 1. **Append** the user input to the conversation
//! 2. **Call the model** through [`EngineHooks::call_model`]
//! 3. **Parse** tool calls from the response, whatever dialect they use
//! 4. **Dispatch** them through the execution policy: auto calls run
//!    concurrently, confirm calls one at a time, results in issue order
//! 5. **Count** the round and let the checkpoint orchestrator compact the
//!    history when the limit is reached, then loop back to step 2
//!
//! The turn ends when the model answers without tool calls. Both
//! front-ends drive this same loop and differ only in their hooks.

pub mod config;
pub mod engine;
pub mod error;
pub mod hooks;
pub mod state;

pub use config::EngineConfig;
pub use engine::AgentEngine;
pub use error::EngineError;
pub use hooks::{DenyAction, EngineHooks, StandardHooks};
pub use state::EngineState;

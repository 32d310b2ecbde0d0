//! Model transports for ferrocode.
//!
//! All transports implement [`ferrocode_core::ModelTransport`]. The engine
//! never sees HTTP; timeouts and retries are the transport's concern.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatTransport;

use ferrocode_core::{CheckpointError, ProviderError};
use thiserror::Error;

/// Why a `run()` call failed. Tool failures never appear here; they
/// become tool-result messages. Cancellation is not an error either.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model transport failed: {0}")]
    Transport(#[from] ProviderError),

    #[error("Checkpoint failed: {0}")]
    Checkpoint(#[from] CheckpointError),
}

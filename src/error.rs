use thiserror::Error;

/// Engine-level failures. Guest-visible failures are [`crate::api::ApiError`]
/// return codes instead; these are the errors the embedding node sees.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Guest runtime error: {0}")]
    Runtime(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("State commit failed: {0}")]
    Commit(#[from] crate::commit::CommitError),

    #[error("Invalid WASM module: {0}")]
    InvalidWasm(String),

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("File operation failed: {0}")]
    FileError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

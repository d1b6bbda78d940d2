//! Error types for the Branchloom domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Structural failures of the tree API (missing node, illegal reparent,
//! deleting the root) are NOT errors: those operations return `bool` or
//! `Option` and the caller branches on the result.

use thiserror::Error;

/// The top-level error type for all Branchloom operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Collaborator errors ---
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    // --- Store errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure of an external collaborator consumed during context assembly.
///
/// These always propagate to the caller of `build_context`: continuing would
/// hand back a context the caller believes is complete when it is not.
#[derive(Debug, Clone, Error)]
pub enum CollaboratorError {
    #[error("Macro substitution failed: {0}")]
    MacroFailed(String),

    #[error("Summarizer failed: {0}")]
    SummarizerFailed(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Corrupted session {id}: {reason}")]
    Corrupted { id: String, reason: String },

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

//! The error taxonomy shared across the store, lock, mutation, and tool
//! surface layers (see SPEC_FULL.md §7).

use std::fmt;

/// Errors the engine can surface to a caller. Internal helpers that cannot
/// fail in a way a caller needs to distinguish still return `anyhow::Result`,
/// matching the reference stack's mix of a small typed taxonomy for the
/// cases callers branch on and `anyhow` for everything else.
#[derive(Debug)]
pub enum MemoryError {
    /// `add_observations` named an entity that does not exist.
    EntityNotFound { name: String },
    /// The store file lock could not be acquired after all retries.
    LockAcquisitionFailed { path: String },
    /// A read or write against the store file failed.
    StoreIoError { path: String, source: String },
    /// A line in the store file did not parse as a valid record.
    MalformedRecord { line_number: usize, source: String },
    /// The tool surface was asked to dispatch a name it does not know.
    UnknownTool { name: String },
    /// The tool surface received an argument object missing required keys.
    MissingArguments { tool: String, detail: String },
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MemoryError::EntityNotFound { name } => {
                write!(f, "entity not found: {name}")
            }
            MemoryError::LockAcquisitionFailed { path } => {
                write!(f, "failed to acquire store lock for {path}")
            }
            MemoryError::StoreIoError { path, source } => {
                write!(f, "store I/O error on {path}: {source}")
            }
            MemoryError::MalformedRecord {
                line_number,
                source,
            } => {
                write!(f, "malformed record at line {line_number}: {source}")
            }
            MemoryError::UnknownTool { name } => {
                write!(f, "unknown tool: {name}")
            }
            MemoryError::MissingArguments { tool, detail } => {
                write!(f, "invalid arguments for {tool}: {detail}")
            }
        }
    }
}

impl std::error::Error for MemoryError {}

impl MemoryError {
    /// A short machine-readable tag, used by the CLI's stdio loop to fill in
    /// the `{"ok": false, "error": {"kind": ..., "message": ...}}` shape.
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryError::EntityNotFound { .. } => "EntityNotFound",
            MemoryError::LockAcquisitionFailed { .. } => "LockAcquisitionFailed",
            MemoryError::StoreIoError { .. } => "StoreIOError",
            MemoryError::MalformedRecord { .. } => "MalformedRecord",
            MemoryError::UnknownTool { .. } => "UnknownTool",
            MemoryError::MissingArguments { .. } => "MissingArguments",
        }
    }
}

#![forbid(unsafe_code)]

//! Configuration errors: host mistakes that fail fast and are never retried.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// A configuration error surfaced to the host.
///
/// Every variant is a programming error in the hosting code: duplicate
/// wiring, lookups of nodes that were never registered, or lifecycle calls
/// out of order. None of them is recoverable at this layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("node type already registered in this scope: {type_name}")]
    DuplicateNode { type_name: &'static str },

    #[error("node type not found in this scope or any ancestor: {type_name}")]
    NodeNotFound { type_name: &'static str },

    #[error("node type not registered in this scope: {type_name}")]
    NotRegistered { type_name: &'static str },

    #[error("node is already attached to a scope: {type_name}")]
    AlreadyAttached { type_name: &'static str },

    #[error("node is not attached to a scope: {type_name}")]
    NotAttached { type_name: &'static str },

    #[error("node has been disposed: {type_name}")]
    NodeDisposed { type_name: &'static str },
}

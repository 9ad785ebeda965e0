// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the data-plane API.
//!
//! A plain enum, `Display` hand-implemented (grouped with banner
//! comments), implementing `std::error::Error` -- no `thiserror`. Fatal
//! conditions (refcount underflow, an AVL invariant violated under a
//! debug assertion) `panic!` rather than return a variant here: those
//! are bugs in this crate, not input an application can recover from.

/// Errors returned by data-plane operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Argument errors
    // ========================================================================
    /// An argument is outside its valid range or otherwise malformed.
    BadParameter(String),

    // ========================================================================
    // State errors
    // ========================================================================
    /// The operation is not permitted in the entity's current state.
    IllegalOperation(String),
    /// A precondition required by the operation was not met.
    PreconditionNotMet(String),
    /// The target entity has already been deleted.
    AlreadyDeleted,
    /// The entity has not been enabled yet.
    NotEnabled,

    // ========================================================================
    // Resource errors
    // ========================================================================
    /// A configured resource limit (history depth, free-list capacity,
    /// max samples) was reached.
    OutOfResources(String),

    // ========================================================================
    // Data errors
    // ========================================================================
    /// A blocking operation exceeded its configured deadline.
    Timeout,
    /// No data was available to satisfy the request.
    NoData,

    // ========================================================================
    // Other errors
    // ========================================================================
    /// Requested feature or operation is not supported.
    Unsupported,
    /// I/O error from a pcap trace file or XML config file.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // Argument
            Error::BadParameter(msg) => write!(f, "bad parameter: {msg}"),
            // State
            Error::IllegalOperation(msg) => write!(f, "illegal operation: {msg}"),
            Error::PreconditionNotMet(msg) => write!(f, "precondition not met: {msg}"),
            Error::AlreadyDeleted => write!(f, "entity already deleted"),
            Error::NotEnabled => write!(f, "entity not enabled"),
            // Resource
            Error::OutOfResources(msg) => write!(f, "out of resources: {msg}"),
            // Data
            Error::Timeout => write!(f, "operation timed out"),
            Error::NoData => write!(f, "no data available"),
            // Other
            Error::Unsupported => write!(f, "unsupported operation"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

/// Convenient alias for API results using this crate's `Error` type.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_does_not_panic_for_every_variant() {
        let variants = vec![
            Error::BadParameter("depth".into()),
            Error::IllegalOperation("write after dispose".into()),
            Error::PreconditionNotMet("reader not matched".into()),
            Error::AlreadyDeleted,
            Error::NotEnabled,
            Error::OutOfResources("history depth exceeded".into()),
            Error::Timeout,
            Error::NoData,
            Error::Unsupported,
            Error::Io(std::io::Error::other("disk full")),
        ];
        for v in variants {
            let _ = format!("{v}");
        }
    }

    #[test]
    fn io_error_is_the_source() {
        let e: Error = std::io::Error::other("boom").into();
        assert!(std::error::Error::source(&e).is_some());
    }
}

//! Error taxonomy for restmap.
//!
//! Errors fall into five classes with different lifetimes:
//!
//! - `Config` — schema mis-declaration, surfaced once at registry build time
//!   and fatal; request processing never sees one.
//! - `Usage` — a programming/integration mistake (bad option combination),
//!   raised synchronously at call time.
//! - `NotFound` — a select-one (or post-update refetch) matched zero rows;
//!   kept distinct from `Database` so callers can map it to a 404.
//! - `Database` — transport/storage failure wrapped with the underlying
//!   message; never silently swallowed.
//! - `Validation` — a pre-write hook vetoed the mutation before any SQL ran.
//!
//! No error in this taxonomy is retried anywhere in the crate; every failure
//! is terminal for the current request.

use std::fmt;

/// Convenience alias used across all restmap crates.
pub type Result<T> = std::result::Result<T, Error>;

/// The crate-wide error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Schema mis-declaration: missing inverse link, unregistered target
    /// type, duplicate field role. Raised at registry build time.
    Config(String),

    /// Invalid call: bad option combination, undefined predicate value,
    /// double `begin`. Indicates an integration bug, not bad user data.
    Usage(String),

    /// A single-row lookup matched zero rows.
    NotFound {
        /// Entity type the lookup ran against.
        entity: String,
        /// The criterion that failed to match (id or data description).
        detail: String,
    },

    /// Storage/transport failure, carrying the underlying driver message.
    Database(String),

    /// A pre-create/pre-update/pre-delete hook rejected the mutation.
    Validation(String),
}

impl Error {
    /// Build a `Config` error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a `Usage` error.
    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Build a `NotFound` error for `entity` with a human-readable criterion.
    pub fn not_found(entity: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            detail: detail.into(),
        }
    }

    /// Wrap a storage/transport failure.
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Build a `Validation` rejection.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// True if this is the typed "record absent" condition.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "schema configuration error: {msg}"),
            Self::Usage(msg) => write!(f, "usage error: {msg}"),
            Self::NotFound { entity, detail } => {
                write!(f, "record not found: {entity} ({detail})")
            }
            Self::Database(msg) => write!(f, "database error: {msg}"),
            Self::Validation(msg) => write!(f, "validation rejected: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_variants() {
        assert_eq!(
            Error::usage("bad options").to_string(),
            "usage error: bad options"
        );
        assert_eq!(
            Error::not_found("user", "id=9").to_string(),
            "record not found: user (id=9)"
        );
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::not_found("user", "id=1").is_not_found());
        assert!(!Error::database("boom").is_not_found());
    }
}

//! Error type shared by the descriptor cache and the field accessors.

use thiserror::Error;

use crate::shape::Kind;

/// Boxed error returned by validation hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// Input is neither a record, a pointer to a record nor a record type token.
    #[error("value is not a record, record pointer or type token - but \"{kind}\"")]
    InvalidInputKind { kind: Kind },

    /// A descriptor was requested for a type that has no fields to describe.
    #[error("type '{name}' is not a record")]
    NotARecord { name: &'static str },

    #[error("no registered descriptor found for type '{name}' under tag namespace '{namespace}'")]
    NotRegistered {
        name: &'static str,
        namespace: String,
    },

    /// The validation hook rejected a descriptor.
    #[error("validation of '{name}' failed: {source}")]
    ValidationFailed {
        name: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("writer requires a pointer to '{name}'")]
    NotWritable { name: &'static str },

    /// A type token was used where a live value is needed.
    #[error("type token for '{name}' carries no record instance")]
    NotAnInstance { name: &'static str },

    /// Attributes are additive; an existing key is never replaced.
    #[error("attribute '{key}' is already set")]
    AttributeExists { key: String },

    #[error("unable to set field '{field}' ({expected}) to a value of type {found}")]
    FieldTypeMismatch {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

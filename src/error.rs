//! Error type of the crate.
use thiserror::Error;

/// Errors with a meaningful recovery path or message.
///
/// Contract violations (malformed observation shapes, broken frame sizes)
/// are asserted instead and abort the process.
#[derive(Debug, Error)]
pub enum DqnAtariError {
    /// The environment name does not correspond to a supported game.
    #[error("Unknown environment: {0}")]
    UnknownEnv(String),

    /// A record key was not found.
    #[error("Key {0} is not found in the record")]
    RecordKey(String),

    /// A record value has an unexpected type.
    #[error("Record value is not a {0}")]
    RecordValueType(String),
}

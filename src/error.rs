//! Error types for setup and codec failures
//!
//! Nothing here crosses a tick boundary: setup returns [`ConfigurationError`],
//! and the tick path turns every [`ParseError`] into a logged drop.

use thiserror::Error;

use crate::types::JointKind;

/// Fatal setup failures, reported to the operator before the first tick
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("required {kind} device '{name}' not found")]
    MissingDevice { name: String, kind: String },

    #[error("device '{name}' is a {found:?}, expected a {expected:?}")]
    KindMismatch {
        name: String,
        expected: JointKind,
        found: JointKind,
    },

    #[error("installation id '{0}' is already registered")]
    DuplicateInstallation(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Malformed text from storage, the message bus, or the command surface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed vector '{0}'")]
    Vector(String),

    #[error("unknown field '{0}'")]
    Field(String),

    #[error("unknown command '{0}'")]
    Command(String),

    #[error("missing argument for command '{0}'")]
    MissingArgument(String),

    #[error("malformed snapshot payload '{0}'")]
    Snapshot(String),

    #[error("unknown message topic '{0}'")]
    Topic(String),
}

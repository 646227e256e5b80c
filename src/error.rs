//! The error taxonomy for the wire format (see spec §7).
//!
//! Every failure the engine can produce is a variant here; nothing is
//! recovered internally, so callers see the exact cause rather than an
//! opaque "serialization failed".

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of stream")]
    UnexpectedEndOfStream,

    #[error("unexpected payload tag: expected {expected}, got {got}")]
    UnexpectedTag { expected: String, got: String },

    #[error("LEB128 integer exceeded its width limit")]
    OverlongLeb128,

    #[error("unknown type `{0}`")]
    UnknownType(String),

    #[error("archive for `{type_name}` declared version {got}, decoder supports up to {max}")]
    VersionTooNew {
        type_name: String,
        got: u32,
        max: u32,
    },

    #[error("no serializer registered for type `{0}`")]
    NotSerializable(String),

    #[error("dangling back-reference to object id {0}")]
    DanglingBackReference(u32),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("invalid UTF-8 in string payload")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn unexpected_tag(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::UnexpectedTag {
            expected: expected.into(),
            got: got.into(),
        }
    }
}

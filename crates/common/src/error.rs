//! Central error types for the session library (thiserror-based).

use thiserror::Error;

use crate::color::ColorFormat;

/// A configuration override was rejected.
///
/// These are the only two errors the generic parameter parser produces; both
/// occur before any session exists and are always locally recoverable (fix
/// the key or value and retry).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("unknown parameter name: {key:?}")]
    BadName { key: String },

    #[error("invalid value {value:?} for parameter {key:?}")]
    BadValue { key: String, value: String },
}

/// Errors that can occur when loading the native encoder library.
#[derive(Debug, Error)]
pub enum EngineLoadError {
    #[error("encoder library not found (tried {0})")]
    LibraryNotFound(String),

    #[error("required symbol not found: {0}")]
    SymbolNotFound(String),

    #[error("encoder API version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: i32, actual: i32 },

    #[error("encoder library built for {0}-bit depth, need 8-bit")]
    UnsupportedBitDepth(i32),
}

/// Errors surfaced by the encode session and its engine backend.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Session construction precondition: only 4:2:0 input is supported.
    /// Raised before any native resource is allocated.
    #[error("unsupported color format {0:?}: the session only accepts 4:2:0 (I420)")]
    UnsupportedColorFormat(ColorFormat),

    /// Another session currently owns the process-wide engine state.
    #[error("another encode session is already open in this process")]
    SessionActive,

    /// Engine open or configuration mapping failed.
    #[error("session init failed: {0}")]
    SessionInit(String),

    /// `submit_frame` was called after the session drained.
    #[error("session already finalized; no further frames can be submitted")]
    SessionFinished,

    /// The caller-supplied frame buffer cannot back one full 4:2:0 frame.
    /// The session stays viable; retry with a correctly sized buffer.
    #[error("invalid frame data: need {expected} bytes for one 4:2:0 frame, got {got}")]
    InvalidFrameData { expected: usize, got: usize },

    /// The engine reported its unrecoverable-error sentinel. Fatal to the
    /// session: no further encode or drain calls are valid.
    #[error("engine reported an unrecoverable error at frame {frame}")]
    EncodeFailure { frame: u64 },

    /// A sink write failed. Propagated from the triggering call; the session
    /// itself stays usable.
    #[error("output sink write failed: {0}")]
    Sink(#[from] std::io::Error),

    #[error("engine library: {0}")]
    Load(#[from] EngineLoadError),

    #[error("parameter rejected: {0}")]
    Param(#[from] ParamError),
}

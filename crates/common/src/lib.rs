//! `x265-common` -- Shared types, configuration, and errors for the x265
//! session library.
//!
//! This crate is the foundation the encoder crate depends on. It defines the
//! core abstractions:
//!
//! - **Types**: `Resolution`, `Rational` (newtypes for safety)
//! - **Color**: `ColorFormat` (chroma subsampling), `LogLevel`
//! - **Config**: `ParameterSet` -- the validated encoder configuration bag
//! - **Sink**: `OutputSink` -- the order-preserving bitstream consumer
//! - **Errors**: `ParamError`, `EngineLoadError`, `EncodeError`
//!   (thiserror-based)

pub mod color;
pub mod error;
pub mod params;
pub mod sink;
pub mod types;

// Re-export commonly used items at crate root
pub use color::{ColorFormat, LogLevel};
pub use error::{EncodeError, EngineLoadError, ParamError};
pub use params::ParameterSet;
pub use sink::{IoSink, OutputSink};
pub use types::{Rational, Resolution};

//! The engine boundary -- the opaque native encoder the session drives.
//!
//! One `encode_step` call maps to one native encode invocation: with a frame
//! during encoding, with `None` while draining. The native tri-state return
//! (`0` nothing pending, `> 0` units produced, `-1` unrecoverable error)
//! surfaces here as [`EngineStep`] / `Err(EncodeError::EncodeFailure)`.
//! Native output memory is only valid until the next engine call, so a
//! backend copies each unit's payload out before returning.

use x265_common::{EncodeError, ParameterSet};

use crate::frame::FrameView;

/// One discrete chunk of compressed bitstream produced by an encode step.
#[derive(Clone, Debug)]
pub struct OutputUnit {
    /// Native unit type tag (NAL type for the x265 backend).
    pub unit_type: u32,
    /// The unit's bytes, owned -- safe to hold across engine calls.
    pub payload: Vec<u8>,
}

/// Outcome of a single engine step that did not fail.
#[derive(Clone, Debug)]
pub enum EngineStep {
    /// The engine produced output units, in emission order.
    Emitted(Vec<OutputUnit>),
    /// Nothing was produced: input is still buffered (while encoding) or no
    /// more output is pending (while draining).
    Idle,
}

/// An opened encoding engine instance.
///
/// Implementations own whatever native handles the engine needs and release
/// them on drop, in the engine's required order. The session guarantees an
/// engine is never asked to step again after it reported
/// `EncodeError::EncodeFailure`.
pub trait Engine: Send {
    /// Opens the engine with a finalized parameter set.
    ///
    /// The session has already validated the color format and acquired the
    /// process-wide session guard by the time this runs.
    fn open(params: &ParameterSet) -> Result<Self, EncodeError>
    where
        Self: Sized;

    /// Runs one encode step: feed one frame, or `None` to drain buffered
    /// output at end of stream.
    fn encode_step(&mut self, frame: Option<&FrameView<'_>>) -> Result<EngineStep, EncodeError>;
}

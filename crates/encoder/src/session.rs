//! The encode session -- lifecycle and buffer-contract management around the
//! engine.
//!
//! `EncodeSession` owns an opened [`Engine`] and drives the encode/drain
//! state machine: any number of frame submissions, then exactly one drain,
//! then closed. Output units are flushed to the sink in production order
//! before each call returns. The session also enforces the engine's hard
//! precondition that only one instance may be live per process.

use std::fmt;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

use x265_common::{ColorFormat, EncodeError, OutputSink, ParameterSet};

use crate::engine::{Engine, EngineStep, OutputUnit};
use crate::frame::PlaneLayout;

/// Process-wide session slot. The engine keeps global state, so opening a
/// second engine while one is live is undefined; holding this lock for the
/// session's lifetime turns that into an explicit `SessionActive` error.
static SESSION_SLOT: Mutex<()> = Mutex::new(());

#[derive(Debug)]
enum SessionState {
    /// Accepting frame submissions.
    Encoding,
    /// Drain completed; the session is terminal but safe to drop.
    Drained,
    /// The engine reported its unrecoverable sentinel at this frame count.
    /// No further encode or drain calls are valid.
    Poisoned { frame: u64 },
}

/// A live encoding session over an opened engine.
///
/// Single-threaded and fully synchronous: every call completes or fails
/// before returning, and no internal synchronization is provided beyond the
/// process-wide open guard. Dropping the session without calling
/// [`finish`](Self::finish) discards buffered-but-undrained output and still
/// releases every native resource exactly once.
pub struct EncodeSession<E: Engine, S: OutputSink> {
    engine: E,
    sink: S,
    params: ParameterSet,
    layout: PlaneLayout,
    state: SessionState,
    frames_submitted: u64,
    units_written: u64,
    bytes_written: u64,
    _slot: MutexGuard<'static, ()>,
}

impl<E: Engine, S: OutputSink> EncodeSession<E, S> {
    /// Opens a session: validates the parameter set, claims the process-wide
    /// engine slot, freezes a copy of the parameters (with `repeat-headers`
    /// forced on), and opens the engine.
    ///
    /// # Errors
    /// - `UnsupportedColorFormat` for anything but 4:2:0, before any native
    ///   work happens.
    /// - `SessionInit` for an unusable resolution.
    /// - `SessionActive` if another session is currently open.
    /// - Whatever the engine's own open reports.
    pub fn open(params: &ParameterSet, sink: S) -> Result<Self, EncodeError> {
        Self::open_with(params, sink, |frozen| E::open(frozen))
    }

    /// Opens a session around an engine built by `make_engine`. Used by
    /// tests to inject configured engines; `open` is this with `E::open`.
    pub fn open_with(
        params: &ParameterSet,
        sink: S,
        make_engine: impl FnOnce(&ParameterSet) -> Result<E, EncodeError>,
    ) -> Result<Self, EncodeError> {
        // Fail fast before touching anything native.
        if params.color_format() != ColorFormat::I420 {
            return Err(EncodeError::UnsupportedColorFormat(params.color_format()));
        }
        let res = params.resolution();
        if res.width == 0 || res.height == 0 {
            return Err(EncodeError::SessionInit(format!(
                "resolution {res} must be positive"
            )));
        }
        if res.width % 2 != 0 || res.height % 2 != 0 {
            return Err(EncodeError::SessionInit(format!(
                "resolution {res} must have even dimensions for 4:2:0"
            )));
        }

        let slot = SESSION_SLOT.try_lock().ok_or(EncodeError::SessionActive)?;

        // Freeze the configuration: mutations the caller makes afterward
        // have no effect on this session. Every unit must carry its own
        // headers because output is flushed unit by unit, not muxed.
        let mut frozen = params.clone();
        frozen.set_repeat_headers(true);

        let layout = PlaneLayout::for_resolution(res);
        let engine = make_engine(&frozen)?;

        info!(
            width = res.width,
            height = res.height,
            preset = frozen.preset().unwrap_or("default"),
            fps = frozen.fps().map(|f| f.to_string()).as_deref().unwrap_or("unset"),
            "encode session opened"
        );

        Ok(Self {
            engine,
            sink,
            params: frozen,
            layout,
            state: SessionState::Encoding,
            frames_submitted: 0,
            units_written: 0,
            bytes_written: 0,
            _slot: slot,
        })
    }

    /// Submits one raw 4:2:0 frame for encoding.
    ///
    /// `raw` must hold at least `width * height * 3 / 2` bytes laid out
    /// Y then U then V, tightly packed. Any output the engine produces is
    /// written to the sink, in order, before this returns.
    ///
    /// # Errors
    /// - `InvalidFrameData` leaves the session usable; retry with a valid
    ///   buffer.
    /// - `EncodeFailure` is fatal: the session refuses further calls.
    /// - `Sink` propagates a write failure without poisoning the session.
    pub fn submit_frame(&mut self, raw: &[u8]) -> Result<(), EncodeError> {
        match self.state {
            SessionState::Encoding => {}
            SessionState::Drained => return Err(EncodeError::SessionFinished),
            SessionState::Poisoned { frame } => {
                return Err(EncodeError::EncodeFailure { frame })
            }
        }

        let view = self.layout.view(raw)?;
        let step = self.step(Some(&view))?;
        self.frames_submitted += 1;

        match step {
            EngineStep::Emitted(units) => self.flush_units(units),
            EngineStep::Idle => {
                debug!(frame = self.frames_submitted, "frame buffered, no output yet");
                Ok(())
            }
        }
    }

    /// Drains buffered output until the engine reports nothing pending,
    /// flushing every batch to the sink in order.
    ///
    /// Calling `finish` again after a successful drain is a no-op. An engine
    /// failure aborts the drain immediately; output already flushed is not
    /// rolled back.
    pub fn finish(&mut self) -> Result<(), EncodeError> {
        match self.state {
            SessionState::Encoding => {}
            SessionState::Drained => {
                debug!("finish called on an already drained session");
                return Ok(());
            }
            SessionState::Poisoned { frame } => {
                return Err(EncodeError::EncodeFailure { frame })
            }
        }

        loop {
            match self.step(None)? {
                EngineStep::Emitted(units) => self.flush_units(units)?,
                EngineStep::Idle => break,
            }
        }

        self.state = SessionState::Drained;
        info!(
            frames = self.frames_submitted,
            units = self.units_written,
            bytes = self.bytes_written,
            "encode session drained"
        );
        Ok(())
    }

    /// One engine step, poisoning the session on the fatal sentinel.
    fn step(
        &mut self,
        frame: Option<&crate::frame::FrameView<'_>>,
    ) -> Result<EngineStep, EncodeError> {
        match self.engine.encode_step(frame) {
            Ok(step) => Ok(step),
            Err(err) => {
                if let EncodeError::EncodeFailure { frame } = err {
                    warn!(frame, "engine failed; session poisoned");
                    self.state = SessionState::Poisoned { frame };
                }
                Err(err)
            }
        }
    }

    fn flush_units(&mut self, units: Vec<OutputUnit>) -> Result<(), EncodeError> {
        for unit in &units {
            self.sink.write_unit(&unit.payload)?;
            self.units_written += 1;
            self.bytes_written += unit.payload.len() as u64;
        }
        debug!(
            frame = self.frames_submitted,
            units = units.len(),
            total_bytes = self.bytes_written,
            "flushed output units"
        );
        Ok(())
    }

    /// The frozen parameter set this session encodes with.
    pub fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn units_written(&self) -> u64 {
        self.units_written
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }
}

// Manual impl: neither the engine nor the sink is required to be Debug.
impl<E: Engine, S: OutputSink> fmt::Debug for EncodeSession<E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodeSession")
            .field("resolution", &self.layout.resolution())
            .field("state", &self.state)
            .field("frames_submitted", &self.frames_submitted)
            .field("units_written", &self.units_written)
            .field("bytes_written", &self.bytes_written)
            .finish_non_exhaustive()
    }
}

impl<E: Engine, S: OutputSink> Drop for EncodeSession<E, S> {
    fn drop(&mut self) {
        // The engine's own Drop releases native resources in its required
        // order; the slot guard falls afterward, reopening the process slot.
        debug!(
            frames = self.frames_submitted,
            units = self.units_written,
            drained = matches!(self.state, SessionState::Drained),
            "encode session closed"
        );
    }
}

//! End-to-end tests for the encode session driven by a scripted engine.
//!
//! These tests exercise the full path from parameter validation through
//! frame submission, drain, and sink flushing without any native library.
//! The scripted engine models the native contract: it buffers a fixed
//! number of frames before emitting, tags every unit with a sequence
//! number, and can be told to fail at a given frame.
//!
//! The real-library path is covered separately in `x265_integration.rs`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use parking_lot::Mutex;

use x265_common::{ColorFormat, EncodeError, OutputSink, ParameterSet};
use x265_encoder::engine::{Engine, EngineStep, OutputUnit};
use x265_encoder::frame::FrameView;
use x265_encoder::session::EncodeSession;

/// Serializes tests that hold the process-wide session slot.
static TEST_LOCK: Mutex<()> = Mutex::new(());

// ---------------------------------------------------------------------------
// Scripted engine
// ---------------------------------------------------------------------------

/// Models the native engine's pipeline: holds `delay` frames before the
/// first unit comes out, emits one sequence-tagged unit per step after
/// that, and flushes the remainder while draining.
struct ScriptedEngine {
    delay: usize,
    buffered: usize,
    next_seq: u8,
    fail_at_frame: Option<u64>,
    frames_seen: u64,
}

impl ScriptedEngine {
    fn with_delay(delay: usize) -> Self {
        Self {
            delay,
            buffered: 0,
            next_seq: 0,
            fail_at_frame: None,
            frames_seen: 0,
        }
    }

    fn failing_at(frame: u64, delay: usize) -> Self {
        let mut engine = Self::with_delay(delay);
        engine.fail_at_frame = Some(frame);
        engine
    }

    fn emit(&mut self) -> OutputUnit {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.buffered -= 1;
        OutputUnit {
            unit_type: 1,
            payload: vec![seq; 8],
        }
    }
}

impl Engine for ScriptedEngine {
    fn open(_params: &ParameterSet) -> Result<Self, EncodeError> {
        Ok(Self::with_delay(2))
    }

    fn encode_step(&mut self, frame: Option<&FrameView<'_>>) -> Result<EngineStep, EncodeError> {
        if let Some(fail_at) = self.fail_at_frame {
            if self.frames_seen >= fail_at {
                return Err(EncodeError::EncodeFailure {
                    frame: self.frames_seen,
                });
            }
        }
        match frame {
            Some(_) => {
                self.frames_seen += 1;
                self.buffered += 1;
                if self.buffered > self.delay {
                    Ok(EngineStep::Emitted(vec![self.emit()]))
                } else {
                    Ok(EngineStep::Idle)
                }
            }
            None => {
                if self.buffered > 0 {
                    Ok(EngineStep::Emitted(vec![self.emit()]))
                } else {
                    Ok(EngineStep::Idle)
                }
            }
        }
    }
}

/// Counts engine opens, for verifying fail-fast construction.
struct CountingEngine;

static OPEN_CALLS: AtomicUsize = AtomicUsize::new(0);

impl Engine for CountingEngine {
    fn open(_params: &ParameterSet) -> Result<Self, EncodeError> {
        OPEN_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Self)
    }

    fn encode_step(&mut self, _frame: Option<&FrameView<'_>>) -> Result<EngineStep, EncodeError> {
        Ok(EngineStep::Idle)
    }
}

// ---------------------------------------------------------------------------
// Recording / failing sinks
// ---------------------------------------------------------------------------

/// Records each unit separately so ordering can be asserted.
#[derive(Clone, Default)]
struct RecordingSink {
    units: Arc<StdMutex<Vec<Vec<u8>>>>,
}

impl RecordingSink {
    fn units(&self) -> Vec<Vec<u8>> {
        self.units.lock().unwrap().clone()
    }
}

impl OutputSink for RecordingSink {
    fn write_unit(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.units.lock().unwrap().push(payload.to_vec());
        Ok(())
    }
}

/// Fails the first `failures` writes, then succeeds.
struct FlakySink {
    failures: usize,
}

impl OutputSink for FlakySink {
    fn write_unit(&mut self, _payload: &[u8]) -> std::io::Result<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "sink gone",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn params_8x4() -> ParameterSet {
    let mut params = ParameterSet::new();
    params.set_width(8);
    params.set_height(4);
    params
}

fn frame_8x4() -> Vec<u8> {
    vec![0u8; 8 * 4 * 3 / 2]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn output_units_arrive_in_fifo_order_and_drain_terminates() {
    let _serial = TEST_LOCK.lock();
    let sink = RecordingSink::default();
    let mut session =
        EncodeSession::<ScriptedEngine, _>::open(&params_8x4(), sink.clone()).unwrap();

    let frame = frame_8x4();
    for _ in 0..10 {
        session.submit_frame(&frame).unwrap();
    }
    session.finish().unwrap();

    // Every submitted frame eventually produced exactly one unit.
    let units = sink.units();
    assert_eq!(units.len(), 10);
    assert_eq!(session.units_written(), 10);
    assert_eq!(session.frames_submitted(), 10);

    // Emission order is monotonic with submission order.
    for (i, unit) in units.iter().enumerate() {
        assert_eq!(unit[0] as usize, i);
    }
}

#[test]
fn undersized_frame_fails_but_session_stays_usable() {
    let _serial = TEST_LOCK.lock();
    let mut params = ParameterSet::new();
    params.set_width(1080);
    params.set_height(720);
    let mut session =
        EncodeSession::<ScriptedEngine, _>::open(&params, RecordingSink::default()).unwrap();

    let short = vec![0u8; 1_166_399];
    match session.submit_frame(&short) {
        Err(EncodeError::InvalidFrameData { expected, got }) => {
            assert_eq!(expected, 1_166_400);
            assert_eq!(got, 1_166_399);
        }
        other => panic!("expected InvalidFrameData, got {other:?}"),
    }
    assert_eq!(session.frames_submitted(), 0);

    // Retrying with a correctly sized buffer works.
    let full = vec![0u8; 1_166_400];
    session.submit_frame(&full).unwrap();
    session.finish().unwrap();
    assert_eq!(session.units_written(), 1);
}

#[test]
fn second_finish_emits_nothing_more() {
    let _serial = TEST_LOCK.lock();
    let sink = RecordingSink::default();
    let mut session =
        EncodeSession::<ScriptedEngine, _>::open(&params_8x4(), sink.clone()).unwrap();

    let frame = frame_8x4();
    for _ in 0..3 {
        session.submit_frame(&frame).unwrap();
    }
    session.finish().unwrap();
    let after_first = sink.units().len();
    assert_eq!(after_first, 3);

    session.finish().unwrap();
    assert_eq!(sink.units().len(), after_first);
}

#[test]
fn non_i420_construction_opens_no_engine_and_leaves_slot_free() {
    let _serial = TEST_LOCK.lock();
    let before = OPEN_CALLS.load(Ordering::SeqCst);

    let mut params = params_8x4();
    params.set_color_format(ColorFormat::I422);
    let err = EncodeSession::<CountingEngine, _>::open(&params, Vec::<u8>::new()).unwrap_err();
    assert!(matches!(
        err,
        EncodeError::UnsupportedColorFormat(ColorFormat::I422)
    ));
    assert_eq!(OPEN_CALLS.load(Ordering::SeqCst), before);

    // The slot was never claimed: a valid open succeeds right away.
    params.set_color_format(ColorFormat::I420);
    let session = EncodeSession::<CountingEngine, _>::open(&params, Vec::<u8>::new()).unwrap();
    assert_eq!(OPEN_CALLS.load(Ordering::SeqCst), before + 1);
    drop(session);
}

#[test]
fn engine_failure_poisons_the_session() {
    let _serial = TEST_LOCK.lock();
    let mut session = EncodeSession::open_with(&params_8x4(), RecordingSink::default(), |_| {
        Ok(ScriptedEngine::failing_at(2, 0))
    })
    .unwrap();

    let frame = frame_8x4();
    session.submit_frame(&frame).unwrap();
    session.submit_frame(&frame).unwrap();

    assert!(matches!(
        session.submit_frame(&frame),
        Err(EncodeError::EncodeFailure { frame: 2 })
    ));
    // Fatal: every later call reports the same failure, including drain.
    assert!(matches!(
        session.submit_frame(&frame),
        Err(EncodeError::EncodeFailure { .. })
    ));
    assert!(matches!(
        session.finish(),
        Err(EncodeError::EncodeFailure { .. })
    ));
}

#[test]
fn sink_failure_propagates_without_poisoning() {
    let _serial = TEST_LOCK.lock();
    // No pipeline delay: every frame emits immediately.
    let mut session = EncodeSession::open_with(
        &params_8x4(),
        FlakySink { failures: 1 },
        |_| Ok(ScriptedEngine::with_delay(0)),
    )
    .unwrap();

    let frame = frame_8x4();
    assert!(matches!(
        session.submit_frame(&frame),
        Err(EncodeError::Sink(_))
    ));

    // The session is still encoding; the next frame reaches the sink.
    session.submit_frame(&frame).unwrap();
    session.finish().unwrap();
    assert_eq!(session.units_written(), 1);
}

#[test]
fn drain_flushes_everything_the_pipeline_held_back() {
    let _serial = TEST_LOCK.lock();
    let sink = RecordingSink::default();
    let mut session = EncodeSession::open_with(&params_8x4(), sink.clone(), |_| {
        Ok(ScriptedEngine::with_delay(4))
    })
    .unwrap();

    let frame = frame_8x4();
    for _ in 0..3 {
        session.submit_frame(&frame).unwrap();
    }
    // Fewer frames than the pipeline depth: nothing out yet.
    assert_eq!(sink.units().len(), 0);

    session.finish().unwrap();
    assert_eq!(sink.units().len(), 3);
}

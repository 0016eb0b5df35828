//! `x265-encoder` -- Session management around the x265 encoding engine.
//!
//! This crate wraps a single-pass, stateful native encoder in a safe session
//! lifecycle: validate configuration, lay out planar input frames, sequence
//! encode calls, drain trailing output at end of stream, and release native
//! resources in the required order on every exit path.
//!
//! # Architecture
//!
//! - [`engine`] -- the `Engine` trait: the opaque native boundary the session
//!   drives (`open` / `encode_step` / release-on-drop)
//! - [`frame`] -- `PlaneLayout` and `FrameView`: pure offset/stride math over
//!   one caller-owned 4:2:0 buffer, never copied or retained
//! - [`session`] -- `EncodeSession`: the encode/drain state machine, the
//!   process-wide single-session guard, and sink flushing
//! - [`x265`] -- the real backend: runtime-loaded libx265 behind the
//!   `Engine` trait (feature `libx265`, on by default)
//!
//! # Encode pipeline
//!
//! ```text
//! caller's raw 4:2:0 bytes
//!   --> PlaneLayout::view (three borrowed plane sub-ranges)
//!     --> Engine::encode_step
//!       --> zero or more OutputUnits
//!         --> OutputSink::write_unit, in production order
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use x265_common::ParameterSet;
//! use x265_encoder::session::EncodeSession;
//! use x265_encoder::x265::X265Engine;
//!
//! let mut params = ParameterSet::new();
//! params.apply_preset(Some("veryfast"), None)?;
//! params.parse("fps", Some("10"))?;
//! params.set_width(1080);
//! params.set_height(720);
//!
//! let sink = std::fs::File::create("out.265")?;
//! let mut session = EncodeSession::<X265Engine, _>::open(&params, x265_common::IoSink::new(sink))?;
//!
//! for frame in frames {
//!     session.submit_frame(&frame)?;
//! }
//! session.finish()?;
//! ```
//!
//! # Single-instance constraint
//!
//! The underlying engine keeps process-wide global state; at most one session
//! may be open per process. A second `open` while one is live fails with
//! `EncodeError::SessionActive` instead of undefined behavior.

pub mod engine;
pub mod frame;
pub mod session;
#[cfg(feature = "libx265")]
pub mod x265;

pub use engine::{Engine, EngineStep, OutputUnit};
pub use frame::{FrameView, PlaneLayout};
pub use session::EncodeSession;

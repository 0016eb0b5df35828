//! Chroma subsampling formats and engine log levels.
//!
//! The numeric ordinals mirror the native library's `X265_CSP_*` and
//! `X265_LOG_*` constants so they can be passed through unchanged.

use serde::{Deserialize, Serialize};

/// Planar chroma subsampling scheme of the input frames.
///
/// Only [`ColorFormat::I420`] is accepted by the encode session; the other
/// variants exist so a configuration can carry them to the validation point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorFormat {
    /// Monochrome (luma only), 4:0:0.
    I400,
    /// 4:2:0 -- each chroma plane is half width and half height.
    #[default]
    I420,
    /// 4:2:2 -- each chroma plane is half width, full height.
    I422,
    /// 4:4:4 -- full-resolution chroma.
    I444,
}

impl ColorFormat {
    /// Native `X265_CSP_*` ordinal.
    pub const fn native_ordinal(self) -> i32 {
        match self {
            Self::I400 => 0,
            Self::I420 => 1,
            Self::I422 => 2,
            Self::I444 => 3,
        }
    }

    /// Name understood by the engine's `input-csp` parameter.
    pub const fn csp_name(self) -> &'static str {
        match self {
            Self::I400 => "i400",
            Self::I420 => "i420",
            Self::I422 => "i422",
            Self::I444 => "i444",
        }
    }

    pub fn from_csp_name(name: &str) -> Option<Self> {
        match name {
            "i400" | "400" => Some(Self::I400),
            "i420" | "420" => Some(Self::I420),
            "i422" | "422" => Some(Self::I422),
            "i444" | "444" => Some(Self::I444),
            _ => None,
        }
    }
}

/// Engine log verbosity, ordinal-compatible with `X265_LOG_*` (-1..4).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    None,
    Error,
    Warning,
    #[default]
    Info,
    Debug,
    Full,
}

impl LogLevel {
    /// Native `X265_LOG_*` ordinal.
    pub const fn native_ordinal(self) -> i32 {
        match self {
            Self::None => -1,
            Self::Error => 0,
            Self::Warning => 1,
            Self::Info => 2,
            Self::Debug => 3,
            Self::Full => 4,
        }
    }

    /// Name understood by the engine's `log-level` parameter.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Full => "full",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" | "-1" => Some(Self::None),
            "error" | "0" => Some(Self::Error),
            "warning" | "1" => Some(Self::Warning),
            "info" | "2" => Some(Self::Info),
            "debug" | "3" => Some(Self::Debug),
            "full" | "4" => Some(Self::Full),
            _ => None,
        }
    }
}

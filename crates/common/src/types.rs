//! Core value types with newtype-style safety.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Frame dimensions in pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const ZERO: Self = Self::new(0, 0);

    /// 1920x1080.
    pub const HD: Self = Self::new(1920, 1080);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Luma plane size in bytes (8-bit samples).
    pub const fn luma_size(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Single chroma plane size in bytes under 4:2:0 subsampling.
    pub const fn chroma_size_i420(self) -> usize {
        self.luma_size() / 4
    }

    /// Total bytes of one tightly packed planar 4:2:0 frame: `w*h*3/2`.
    pub const fn i420_frame_size(self) -> usize {
        self.luma_size() + 2 * self.chroma_size_i420()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = ();

    /// Parses the `WIDTHxHEIGHT` form used by x265's `input-res` parameter.
    fn from_str(s: &str) -> Result<Self, ()> {
        let (w, h) = s.split_once('x').ok_or(())?;
        let width = w.trim().parse().map_err(|_| ())?;
        let height = h.trim().parse().map_err(|_| ())?;
        Ok(Self { width, height })
    }
}

/// A positive rational, used for frame rates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    pub num: u32,
    pub den: u32,
}

impl Rational {
    pub const FPS_30: Self = Self { num: 30, den: 1 };

    /// # Panics
    /// Panics if `den == 0`.
    pub fn new(num: u32, den: u32) -> Self {
        assert!(den > 0, "Rational denominator must be > 0");
        Self { num, den }
    }

    pub fn as_f64(self) -> f64 {
        self.num as f64 / self.den as f64
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.den == 1 {
            write!(f, "{}", self.num)
        } else {
            write!(f, "{}/{}", self.num, self.den)
        }
    }
}

impl FromStr for Rational {
    type Err = ();

    /// Accepts `30` or `30000/1001`.
    fn from_str(s: &str) -> Result<Self, ()> {
        let s = s.trim();
        let (num, den) = match s.split_once('/') {
            Some((n, d)) => (
                n.parse().map_err(|_| ())?,
                d.parse().map_err(|_| ())?,
            ),
            None => (s.parse().map_err(|_| ())?, 1),
        };
        if den == 0 {
            return Err(());
        }
        Ok(Self { num, den })
    }
}

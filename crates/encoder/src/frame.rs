//! Planar 4:2:0 frame layout -- pure offset/stride math over one
//! caller-owned byte buffer.
//!
//! A frame arrives as a single contiguous allocation: Y plane first, then U,
//! then V, tightly packed. [`PlaneLayout`] is a pure function of the session
//! resolution; [`PlaneLayout::view`] re-derives three non-overlapping
//! borrowed sub-ranges from the caller's buffer on every submission. Nothing
//! is copied and nothing outlives the call.

use x265_common::{EncodeError, Resolution};

/// Byte offsets, lengths, and strides of the three planes of one tightly
/// packed 4:2:0 frame at a fixed resolution.
///
/// For width `w` and height `h`:
/// Y at offset `0` (stride `w`), U at `w*h` (stride `w/2`),
/// V at `w*h*5/4` (stride `w/2`), total size `w*h*3/2`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PlaneLayout {
    resolution: Resolution,
}

impl PlaneLayout {
    /// Layout for a validated session resolution (positive, even dimensions;
    /// the session checks this before constructing one).
    pub const fn for_resolution(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// U plane offset: `width * height`.
    pub const fn u_offset(&self) -> usize {
        self.resolution.luma_size()
    }

    /// V plane offset: `width * height * 5 / 4`.
    pub const fn v_offset(&self) -> usize {
        self.u_offset() + self.resolution.chroma_size_i420()
    }

    /// Minimum caller buffer size: `width * height * 3 / 2`.
    pub const fn frame_size(&self) -> usize {
        self.resolution.i420_frame_size()
    }

    /// Row strides in bytes for Y, U, V: `[w, w/2, w/2]`.
    pub const fn strides(&self) -> [usize; 3] {
        let w = self.resolution.width as usize;
        [w, w / 2, w / 2]
    }

    /// Borrows the three plane sub-ranges out of a caller-supplied buffer.
    ///
    /// An empty or undersized buffer is an error, not a truncation: the
    /// caller keeps the session and may retry with a valid buffer.
    pub fn view<'a>(&self, buf: &'a [u8]) -> Result<FrameView<'a>, EncodeError> {
        let expected = self.frame_size();
        if buf.len() < expected {
            return Err(EncodeError::InvalidFrameData {
                expected,
                got: buf.len(),
            });
        }
        let (y, rest) = buf.split_at(self.u_offset());
        let chroma = self.resolution.chroma_size_i420();
        let (u, rest) = rest.split_at(chroma);
        let v = &rest[..chroma];
        Ok(FrameView {
            y,
            u,
            v,
            strides: self.strides(),
        })
    }
}

/// Borrowed view of one input picture's planes. Valid only for the duration
/// of a single encode call.
#[derive(Copy, Clone, Debug)]
pub struct FrameView<'a> {
    pub y: &'a [u8],
    pub u: &'a [u8],
    pub v: &'a [u8],
    /// Row strides in bytes for Y, U, V.
    pub strides: [usize; 3],
}

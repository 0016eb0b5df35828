//! Raw FFI surface for libx265, loaded dynamically at runtime via
//! `libloading`.
//!
//! x265 exposes a version-stable entry point, `x265_api_query()`, which
//! takes the targeted `X265_BUILD` number and returns a table of function
//! pointers (`x265_api`). Going through the table avoids the build-number
//! suffix x265 appends to `x265_encoder_open`, and lets this crate build
//! and run on machines without the library installed (opening an engine
//! then fails with a load error instead of a link error).
//!
//! Struct declarations below match `x265.h` from x265 3.5 (X265_BUILD 199,
//! X265_MAJOR_VERSION 1). Only the leading members this crate touches are
//! declared; instances are always allocated by the library itself.

use std::ffi::{c_char, c_int, c_void};

use libloading::Library;
use tracing::debug;

use x265_common::{EngineLoadError, ParamError};

/// `X265_BUILD` this table declaration was written against. This is what
/// `x265_api_query` takes as its version argument; it refuses requests
/// older than its compatibility floor.
pub const X265_BUILD: c_int = 199;

/// `x265_api.api_major_version` (`X265_MAJOR_VERSION`) across the 3.x
/// releases.
pub const X265_API_MAJOR: c_int = 1;

/// `x265_param_parse` result: unknown parameter name.
pub const X265_PARAM_BAD_NAME: c_int = -1;
/// `x265_param_parse` result: value failed validation.
pub const X265_PARAM_BAD_VALUE: c_int = -2;

/// Opaque encoder handle (`x265_encoder`).
pub type X265EncoderHandle = c_void;

/// Opaque parameter block (`x265_param`); always allocated and freed by the
/// library, and only ever manipulated through `param_parse`.
#[repr(C)]
pub struct X265Param {
    _opaque: [u8; 0],
}

/// One output unit as produced by the encoder (`x265_nal`).
///
/// The payload pointer targets encoder-owned memory that is only valid
/// until the next encode call; callers copy it out immediately.
#[repr(C)]
#[derive(Copy, Clone)]
pub struct X265Nal {
    pub nal_type: u32,
    pub size_bytes: u32,
    pub payload: *mut u8,
}

/// Leading members of `x265_picture`.
///
/// The full native struct is much larger; instances always come from
/// `picture_alloc` (which sizes them correctly), and this prefix only
/// exists so the plane pointers and strides can be assigned.
#[repr(C)]
pub struct X265Picture {
    pub pts: i64,
    pub dts: i64,
    pub user_data: *mut c_void,
    pub planes: [*mut c_void; 3],
    pub stride: [i32; 3],
    pub bit_depth: c_int,
    // Remaining members (slice type, POC, color space, SEI, analysis data,
    // ...) are owned by the library and never accessed from here.
}

/// The libx265 function table (`x265_api`), as laid out in the 3.x headers.
#[repr(C)]
pub struct X265Api {
    pub api_major_version: c_int,
    pub api_build_number: c_int,
    pub sizeof_param: c_int,
    pub sizeof_picture: c_int,
    pub sizeof_analysis_data: c_int,
    pub sizeof_zone: c_int,
    pub sizeof_stats: c_int,
    pub bit_depth: c_int,
    pub version_str: *const c_char,
    pub build_info_str: *const c_char,

    pub param_alloc: unsafe extern "C" fn() -> *mut X265Param,
    pub param_free: unsafe extern "C" fn(*mut X265Param),
    pub param_default: unsafe extern "C" fn(*mut X265Param),
    pub param_parse:
        unsafe extern "C" fn(*mut X265Param, *const c_char, *const c_char) -> c_int,
    pub param_apply_profile: unsafe extern "C" fn(*mut X265Param, *const c_char) -> c_int,
    pub param_default_preset:
        unsafe extern "C" fn(*mut X265Param, *const c_char, *const c_char) -> c_int,
    pub picture_alloc: unsafe extern "C" fn() -> *mut X265Picture,
    pub picture_free: unsafe extern "C" fn(*mut X265Picture),
    pub picture_init: unsafe extern "C" fn(*mut X265Param, *mut X265Picture),
    pub encoder_open: unsafe extern "C" fn(*mut X265Param) -> *mut X265EncoderHandle,
    pub encoder_parameters: unsafe extern "C" fn(*mut X265EncoderHandle, *mut X265Param),
    pub encoder_reconfig:
        unsafe extern "C" fn(*mut X265EncoderHandle, *mut X265Param) -> c_int,
    pub encoder_reconfig_zone:
        unsafe extern "C" fn(*mut X265EncoderHandle, *mut c_void) -> c_int,
    pub encoder_headers:
        unsafe extern "C" fn(*mut X265EncoderHandle, *mut *mut X265Nal, *mut u32) -> c_int,
    pub encoder_encode: unsafe extern "C" fn(
        *mut X265EncoderHandle,
        *mut *mut X265Nal,
        *mut u32,
        *mut X265Picture,
        *mut X265Picture,
    ) -> c_int,
    pub encoder_get_stats: unsafe extern "C" fn(*mut X265EncoderHandle, *mut c_void, u32),
    pub encoder_log: unsafe extern "C" fn(*mut X265EncoderHandle, c_int, *mut *mut c_char),
    pub encoder_close: unsafe extern "C" fn(*mut X265EncoderHandle),
    /// Process-wide cleanup hook; invoked once after the last encoder using
    /// the library has been closed.
    pub cleanup: unsafe extern "C" fn(),
    pub sizeof_frame_stats: c_int,
    pub encoder_intra_refresh: unsafe extern "C" fn(*mut X265EncoderHandle) -> c_int,
    pub encoder_ctu_info:
        unsafe extern "C" fn(*mut X265EncoderHandle, c_int, *mut *mut c_void) -> c_int,
    // Trailing members (zone parsing, CSV logging, VMAF helpers) are not
    // declared and never accessed.
}

/// `x265_api_query(bitDepth, X265_BUILD, &err)`.
type ApiQueryFn =
    unsafe extern "C" fn(c_int, c_int, *mut c_int) -> *const X265Api;

/// Library file names probed in order.
#[cfg(target_os = "windows")]
const LIBRARY_CANDIDATES: &[&str] = &["libx265.dll", "x265.dll"];
#[cfg(target_os = "macos")]
const LIBRARY_CANDIDATES: &[&str] = &["libx265.dylib"];
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
const LIBRARY_CANDIDATES: &[&str] = &["libx265.so", "libx265.so.199"];

/// A loaded libx265 with its resolved function table.
///
/// The table pointer stays valid for as long as the `Library` is alive, so
/// it is only handed out borrowed from [`api`](Self::api).
pub struct X265Library {
    api: *const X265Api,
    _lib: Library,
}

// SAFETY: the function table is immutable once resolved, and every call
// into it goes through &self from the single thread driving the engine.
unsafe impl Send for X265Library {}

impl X265Library {
    /// Loads libx265 and resolves the 8-bit function table for the targeted
    /// build.
    pub fn load() -> Result<Self, EngineLoadError> {
        let mut last_err = String::new();
        let lib = LIBRARY_CANDIDATES
            .iter()
            .find_map(|name| {
                // SAFETY: loading libx265 runs its initializers, which have
                // no preconditions.
                match unsafe { Library::new(name) } {
                    Ok(lib) => {
                        debug!(library = name, "loaded encoder library");
                        Some(lib)
                    }
                    Err(e) => {
                        last_err = e.to_string();
                        None
                    }
                }
            })
            .ok_or_else(|| {
                EngineLoadError::LibraryNotFound(format!(
                    "{}; last error: {last_err}",
                    LIBRARY_CANDIDATES.join(", ")
                ))
            })?;

        // SAFETY: the symbol type matches the declared C signature.
        let api_query: libloading::Symbol<'_, ApiQueryFn> = unsafe {
            lib.get(b"x265_api_query\0")
                .map_err(|_| EngineLoadError::SymbolNotFound("x265_api_query".to_string()))?
        };

        let mut err: c_int = 0;
        // SAFETY: api_query only reads its arguments and writes err. The
        // version argument is the targeted X265_BUILD number; anything below
        // the library's compatibility floor is refused with a null return.
        let api = unsafe { api_query(8, X265_BUILD, &mut err) };
        if api.is_null() {
            return Err(EngineLoadError::VersionMismatch {
                expected: X265_BUILD,
                actual: err,
            });
        }

        // SAFETY: a non-null return from api_query points at the library's
        // static table, valid for the library's lifetime.
        let table = unsafe { &*api };
        validate_table(table.api_major_version, table.bit_depth)?;

        debug!(
            build = table.api_build_number,
            bit_depth = table.bit_depth,
            "resolved encoder function table"
        );

        Ok(Self { api, _lib: lib })
    }

    pub fn api(&self) -> &X265Api {
        // SAFETY: validated non-null in load(); _lib keeps it alive.
        unsafe { &*self.api }
    }
}

/// Checks a resolved table against what this crate's declarations target:
/// table major version 1 (all 3.x releases) and an 8-bit build.
fn validate_table(api_major: c_int, bit_depth: c_int) -> Result<(), EngineLoadError> {
    if api_major != X265_API_MAJOR {
        return Err(EngineLoadError::VersionMismatch {
            expected: X265_API_MAJOR,
            actual: api_major,
        });
    }
    if bit_depth != 8 {
        return Err(EngineLoadError::UnsupportedBitDepth(bit_depth));
    }
    Ok(())
}

/// Maps a `param_parse` result code onto the two configuration errors.
pub fn check_parse_result(
    ret: c_int,
    key: &str,
    value: Option<&str>,
) -> Result<(), ParamError> {
    match ret {
        0 => Ok(()),
        X265_PARAM_BAD_NAME => Err(ParamError::BadName {
            key: key.to_string(),
        }),
        _ => Err(ParamError::BadValue {
            key: key.to_string(),
            value: value.unwrap_or_default().to_string(),
        }),
    }
}

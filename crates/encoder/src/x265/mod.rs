//! The libx265 backend behind the [`Engine`] trait.
//!
//! # Module structure
//!
//! - [`ffi`] -- raw declarations and the runtime-loaded function table
//! - [`X265Engine`] -- an opened native encoder instance
//!
//! # Resource management
//!
//! The engine owns three native resources plus the process-wide cleanup
//! obligation. They are released exactly once, on every exit path, in the
//! order the library requires: picture descriptor, encoder handle, parameter
//! block, then the global `cleanup()` hook. Releasing the encoder before the
//! picture descriptor is undefined, which is why the order is fixed in
//! `Drop` rather than left to field order.

pub mod ffi;

use std::ffi::{c_void, CString};
use std::ptr;

use tracing::{debug, info};

use x265_common::{EncodeError, ParamError, ParameterSet};

use crate::engine::{Engine, EngineStep, OutputUnit};
use crate::frame::FrameView;

use ffi::{check_parse_result, X265EncoderHandle, X265Library, X265Nal, X265Param, X265Picture};

/// An opened x265 encoder instance.
///
/// The library keeps process-wide global state; the session layer guarantees
/// at most one `X265Engine` is live per process before constructing one.
pub struct X265Engine {
    param: *mut X265Param,
    pic: *mut X265Picture,
    handle: *mut X265EncoderHandle,
    frames_encoded: u64,
    // Declared last: the loaded library must outlive every native pointer
    // above, and Drop releases those explicitly before the library unloads.
    lib: X265Library,
}

// SAFETY: all native pointers are exclusively owned and only dereferenced
// through &mut self. Send but not Sync, like the native API itself.
unsafe impl Send for X265Engine {}

impl X265Engine {
    /// Applies the frozen parameter set to a native parameter block:
    /// preset/tune first (they reset the defaults), then the typed fields,
    /// then the recorded overrides in application order. Every value goes
    /// through the engine's own parser so its validation is authoritative.
    fn apply_params(&self, params: &ParameterSet) -> Result<(), EncodeError> {
        let api = self.lib.api();

        if params.preset().is_some() || params.tune().is_some() {
            let name = params.preset().map(cstring).transpose()?;
            let tune = params.tune().map(cstring).transpose()?;
            // SAFETY: param is a valid block from param_alloc; the name
            // pointers are live CStrings or null.
            let ret = unsafe {
                (api.param_default_preset)(
                    self.param,
                    name.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                    tune.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                )
            };
            if ret != 0 {
                return Err(EncodeError::SessionInit(format!(
                    "engine refused preset {:?} / tune {:?}",
                    params.preset(),
                    params.tune()
                )));
            }
        }

        self.parse_one("input-res", Some(&params.resolution().to_string()))?;
        self.parse_one("input-csp", Some(params.color_format().csp_name()))?;
        self.parse_one("log-level", Some(params.log_level().name()))?;
        if let Some(fps) = params.fps() {
            self.parse_one("fps", Some(&fps.to_string()))?;
        }
        if params.repeat_headers() {
            self.parse_one("repeat-headers", Some("1"))?;
        }
        for (key, value) in params.overrides() {
            self.parse_one(key, Some(value))?;
        }
        Ok(())
    }

    /// One `param_parse` call with the (-1, -2) result codes mapped back to
    /// `BadName` / `BadValue`.
    fn parse_one(&self, key: &str, value: Option<&str>) -> Result<(), ParamError> {
        let api = self.lib.api();
        let ckey = cstring(key)?;
        let cvalue = value.map(cstring).transpose()?;
        // SAFETY: param is valid; key/value pointers are live CStrings.
        let ret = unsafe {
            (api.param_parse)(
                self.param,
                ckey.as_ptr(),
                cvalue.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            )
        };
        check_parse_result(ret, key, value)
    }
}

impl Engine for X265Engine {
    /// Loads the library, maps the parameter set into a native parameter
    /// block, opens the encoder, and prepares the reusable picture
    /// descriptor with 4:2:0 strides.
    ///
    /// Resources acquired before a failure are released by the engine's
    /// `Drop`, so no partial construction leaks.
    fn open(params: &ParameterSet) -> Result<Self, EncodeError> {
        let lib = X265Library::load()?;

        let mut engine = Self {
            param: ptr::null_mut(),
            pic: ptr::null_mut(),
            handle: ptr::null_mut(),
            frames_encoded: 0,
            lib,
        };

        // SAFETY: alloc/default have no preconditions.
        engine.param = unsafe { (engine.lib.api().param_alloc)() };
        if engine.param.is_null() {
            return Err(EncodeError::SessionInit("param_alloc failed".to_string()));
        }
        // SAFETY: param was just allocated.
        unsafe { (engine.lib.api().param_default)(engine.param) };

        engine.apply_params(params)?;

        // SAFETY: param is fully configured; encoder_open copies it.
        engine.handle = unsafe { (engine.lib.api().encoder_open)(engine.param) };
        if engine.handle.is_null() {
            return Err(EncodeError::SessionInit(
                "engine rejected the configuration at open".to_string(),
            ));
        }

        // SAFETY: picture_alloc sizes the native struct itself; picture_init
        // needs the configured param block.
        engine.pic = unsafe { (engine.lib.api().picture_alloc)() };
        if engine.pic.is_null() {
            return Err(EncodeError::SessionInit("picture_alloc failed".to_string()));
        }
        // SAFETY: pic and param are valid; init only writes defaults.
        unsafe {
            (engine.lib.api().picture_init)(engine.param, engine.pic);
            let width = params.width() as i32;
            (*engine.pic).stride = [width, width / 2, width / 2];
        }

        info!(
            resolution = %params.resolution(),
            build = engine.lib.api().api_build_number,
            "x265 engine opened"
        );
        Ok(engine)
    }

    fn encode_step(&mut self, frame: Option<&FrameView<'_>>) -> Result<EngineStep, EncodeError> {
        let api = self.lib.api();

        let pic_in = match frame {
            Some(view) => {
                // Bind the caller's plane views for the duration of this one
                // call; the engine reads, never writes, the input planes.
                // SAFETY: pic is valid; the plane pointers stay live for the
                // whole encoder_encode call because `view` borrows them.
                unsafe {
                    (*self.pic).planes = [
                        view.y.as_ptr() as *mut c_void,
                        view.u.as_ptr() as *mut c_void,
                        view.v.as_ptr() as *mut c_void,
                    ];
                    (*self.pic).pts = self.frames_encoded as i64;
                }
                self.pic
            }
            None => ptr::null_mut(),
        };

        let mut nals: *mut X265Nal = ptr::null_mut();
        let mut count: u32 = 0;
        // SAFETY: handle is a live encoder; nals/count are out-params the
        // encoder fills; a null pic_in is the documented drain form.
        let ret = unsafe {
            (api.encoder_encode)(self.handle, &mut nals, &mut count, pic_in, ptr::null_mut())
        };

        if ret < 0 {
            return Err(EncodeError::EncodeFailure {
                frame: self.frames_encoded,
            });
        }
        if frame.is_some() {
            self.frames_encoded += 1;
        }
        if ret == 0 {
            return Ok(EngineStep::Idle);
        }

        // Copy every unit out now: the nal array points into encoder-owned
        // memory that the next call invalidates.
        let mut units = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            // SAFETY: the encoder reported `count` valid entries at `nals`.
            let nal = unsafe { *nals.add(i) };
            // SAFETY: payload/size_bytes describe a live allocation until
            // the next encoder call; copied immediately.
            let payload = unsafe {
                std::slice::from_raw_parts(nal.payload as *const u8, nal.size_bytes as usize)
            }
            .to_vec();
            units.push(OutputUnit {
                unit_type: nal.nal_type,
                payload,
            });
        }
        debug!(
            frame = self.frames_encoded,
            units = units.len(),
            draining = frame.is_none(),
            "engine emitted output"
        );
        Ok(EngineStep::Emitted(units))
    }
}

impl Drop for X265Engine {
    fn drop(&mut self) {
        let api = self.lib.api();
        // Release order required by the library: picture descriptor first
        // (it may reference encoder-allocated memory), then the encoder
        // handle, then the parameter block, then the process-wide hook.
        unsafe {
            if !self.pic.is_null() {
                (api.picture_free)(self.pic);
                self.pic = ptr::null_mut();
            }
            if !self.handle.is_null() {
                (api.encoder_close)(self.handle);
                self.handle = ptr::null_mut();
            }
            if !self.param.is_null() {
                (api.param_free)(self.param);
                self.param = ptr::null_mut();
            }
            (api.cleanup)();
        }
        debug!(frames = self.frames_encoded, "x265 engine released");
    }
}

fn cstring(s: &str) -> Result<CString, ParamError> {
    CString::new(s).map_err(|_| ParamError::BadValue {
        key: s.to_string(),
        value: s.to_string(),
    })
}

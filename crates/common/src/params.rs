//! `ParameterSet` -- the validated encoder configuration bag.
//!
//! Callers mutate the set through typed setters or through the generic
//! [`ParameterSet::parse`] key/value mechanism, then hand it (read-only) to
//! the encode session. Keys are validated against the engine's parameter
//! table up front, so configuration mistakes surface before any native
//! resource exists; the engine backend replays the recorded overrides
//! through the native parser at open time.

use serde::{Deserialize, Serialize};

use crate::color::{ColorFormat, LogLevel};
use crate::error::ParamError;
use crate::types::{Rational, Resolution};

/// Value grammar for a known parameter name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ParamKind {
    /// Boolean switch. A missing value means "enable"; the `no-` name prefix
    /// means "disable".
    Flag,
    Int,
    Float,
    /// Frame rate: `30` or `30000/1001`.
    Fps,
    /// `WIDTHxHEIGHT` pair.
    Dimensions,
    /// One of a fixed set of names.
    Keyword(&'static [&'static str]),
    /// Free-form text passed through to the engine.
    Text,
}

/// Engine parameter names this library recognizes, with their value grammar.
/// Mirrors the subset of x265's CLI-style option table that is meaningful
/// for a raw-stream encode session.
const KNOWN_PARAMS: &[(&str, ParamKind)] = &[
    // Input description
    ("input-res", ParamKind::Dimensions),
    ("input-csp", ParamKind::Keyword(&["i400", "i420", "i422", "i444"])),
    ("fps", ParamKind::Fps),
    ("interlace", ParamKind::Flag),
    // Logging
    (
        "log-level",
        ParamKind::Keyword(&[
            "none", "error", "warning", "info", "debug", "full", "-1", "0", "1", "2", "3", "4",
        ]),
    ),
    // Bitstream options
    ("repeat-headers", ParamKind::Flag),
    ("annexb", ParamKind::Flag),
    ("aud", ParamKind::Flag),
    ("hrd", ParamKind::Flag),
    // Threading
    ("pools", ParamKind::Text),
    ("frame-threads", ParamKind::Int),
    ("wpp", ParamKind::Flag),
    // GOP structure
    ("keyint", ParamKind::Int),
    ("min-keyint", ParamKind::Int),
    ("scenecut", ParamKind::Int),
    ("open-gop", ParamKind::Flag),
    ("bframes", ParamKind::Int),
    ("b-adapt", ParamKind::Int),
    ("b-pyramid", ParamKind::Flag),
    ("ref", ParamKind::Int),
    ("rc-lookahead", ParamKind::Int),
    ("lookahead-slices", ParamKind::Int),
    // Rate control
    ("bitrate", ParamKind::Int),
    ("crf", ParamKind::Float),
    ("qp", ParamKind::Int),
    ("vbv-bufsize", ParamKind::Int),
    ("vbv-maxrate", ParamKind::Int),
    ("cutree", ParamKind::Flag),
    ("aq-mode", ParamKind::Int),
    ("aq-strength", ParamKind::Float),
    // Analysis
    ("rd", ParamKind::Int),
    ("psy-rd", ParamKind::Float),
    ("psy-rdoq", ParamKind::Float),
    ("me", ParamKind::Keyword(&["dia", "hex", "umh", "star", "sea", "full"])),
    ("merange", ParamKind::Int),
    ("subme", ParamKind::Int),
    ("ctu", ParamKind::Keyword(&["16", "32", "64"])),
    ("max-tu-size", ParamKind::Keyword(&["4", "8", "16", "32"])),
    ("sao", ParamKind::Flag),
    ("strong-intra-smoothing", ParamKind::Flag),
    // Signaling
    ("sar", ParamKind::Text),
    ("range", ParamKind::Keyword(&["limited", "full"])),
    ("colorprim", ParamKind::Text),
    ("transfer", ParamKind::Text),
    ("colormatrix", ParamKind::Text),
];

/// Encoder speed presets, fastest to slowest.
const PRESETS: &[&str] = &[
    "ultrafast", "superfast", "veryfast", "faster", "fast", "medium", "slow", "slower",
    "veryslow", "placebo",
];

/// Tune profiles layered on top of a preset.
const TUNES: &[&str] = &[
    "psnr", "ssim", "grain", "zerolatency", "fastdecode", "animation",
];

/// A validated bag of encoder configuration.
///
/// Resolution, color format, and log level are carried as typed state;
/// everything else parsed through [`ParameterSet::parse`] is recorded in
/// order for replay into the engine at session open. Once a session is
/// constructed from this set, the session works from its own frozen copy --
/// later mutations here do not affect the running session.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterSet {
    width: u32,
    height: u32,
    color_format: ColorFormat,
    log_level: LogLevel,
    fps: Option<Rational>,
    repeat_headers: bool,
    preset: Option<String>,
    tune: Option<String>,
    /// Free-form overrides in application order, normalized `(key, value)`.
    overrides: Vec<(String, String)>,
}

impl ParameterSet {
    /// Engine defaults: no resolution, 4:2:0, `info` logging.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets **everything** to the preset's defaults, then records the
    /// preset and tune names.
    ///
    /// Call this before any other setter or [`parse`](Self::parse):
    /// applying a preset afterward silently discards whatever was set
    /// earlier, because presets redefine the baseline the other options
    /// modify.
    ///
    /// Unknown preset or tune names fail with [`ParamError::BadName`].
    pub fn apply_preset(
        &mut self,
        name: Option<&str>,
        tune: Option<&str>,
    ) -> Result<(), ParamError> {
        if let Some(name) = name {
            if !PRESETS.contains(&name) {
                return Err(ParamError::BadName {
                    key: format!("preset={name}"),
                });
            }
        }
        if let Some(tune) = tune {
            if !TUNES.contains(&tune) {
                return Err(ParamError::BadName {
                    key: format!("tune={tune}"),
                });
            }
        }
        *self = Self::default();
        self.preset = name.map(str::to_owned);
        self.tune = tune.map(str::to_owned);
        Ok(())
    }

    /// Generic key/value override.
    ///
    /// Names use the engine's spelling (underscores are accepted and
    /// normalized to hyphens). Boolean switches accept a missing value as
    /// "enable" and a `no-` name prefix as "disable". Unknown keys fail
    /// with [`ParamError::BadName`]; values that do not fit the key's
    /// grammar fail with [`ParamError::BadValue`]. No other error is
    /// possible here.
    pub fn parse(&mut self, key: &str, value: Option<&str>) -> Result<(), ParamError> {
        let normalized = key.trim().to_ascii_lowercase().replace('_', "-");

        // `no-` prefix disables a boolean switch.
        if let Some(stripped) = normalized.strip_prefix("no-") {
            match lookup(stripped) {
                Some(ParamKind::Flag) => {
                    if value.is_some() {
                        return Err(ParamError::BadValue {
                            key: key.to_string(),
                            value: value.unwrap_or_default().to_string(),
                        });
                    }
                    return self.store(stripped, "0");
                }
                _ => {
                    return Err(ParamError::BadName {
                        key: key.to_string(),
                    })
                }
            }
        }

        let kind = lookup(&normalized).ok_or_else(|| ParamError::BadName {
            key: key.to_string(),
        })?;

        let stored = validate_value(&normalized, kind, value).ok_or_else(|| {
            ParamError::BadValue {
                key: key.to_string(),
                value: value.unwrap_or_default().to_string(),
            }
        })?;

        self.store(&normalized, &stored)
    }

    /// Records a normalized key/value, mirroring typed state where the key
    /// has a typed twin. Values already passed the grammar check, so the
    /// re-parses here cannot fail; the error path exists only to keep this
    /// total.
    fn store(&mut self, key: &str, value: &str) -> Result<(), ParamError> {
        let reject = || ParamError::BadValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "input-res" => {
                let res: Resolution = value.parse().map_err(|_| reject())?;
                self.width = res.width;
                self.height = res.height;
            }
            "input-csp" => {
                self.color_format = ColorFormat::from_csp_name(value).ok_or_else(reject)?;
            }
            "log-level" => {
                self.log_level = LogLevel::from_name(value).ok_or_else(reject)?;
            }
            "fps" => {
                self.fps = Some(value.parse().map_err(|_| reject())?);
            }
            "repeat-headers" => {
                self.repeat_headers = value == "1";
            }
            _ => {
                self.overrides.push((key.to_string(), value.to_string()));
            }
        }
        Ok(())
    }

    /// Effective value of a parameter, whether it lives in typed state or in
    /// the recorded overrides. `None` when nothing has been set.
    pub fn effective(&self, key: &str) -> Option<String> {
        let normalized = key.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "input-res" => (self.width > 0 || self.height > 0)
                .then(|| Resolution::new(self.width, self.height).to_string()),
            "input-csp" => Some(self.color_format.csp_name().to_string()),
            "log-level" => Some(self.log_level.name().to_string()),
            "fps" => self.fps.map(|f| f.to_string()),
            "repeat-headers" => Some(if self.repeat_headers { "1" } else { "0" }.to_string()),
            _ => self
                .overrides
                .iter()
                .rev()
                .find(|(k, _)| *k == normalized)
                .map(|(_, v)| v.clone()),
        }
    }

    // -- Typed accessors --

    /// Stores a positive pixel width. The engine enforces its own upper
    /// bound at open time.
    pub fn set_width(&mut self, px: u32) {
        self.width = px;
    }

    /// Stores a positive pixel height. The engine enforces its own upper
    /// bound at open time.
    pub fn set_height(&mut self, px: u32) {
        self.height = px;
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn set_color_format(&mut self, format: ColorFormat) {
        self.color_format = format;
    }

    pub fn color_format(&self) -> ColorFormat {
        self.color_format
    }

    pub fn set_log_level(&mut self, level: LogLevel) {
        self.log_level = level;
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn fps(&self) -> Option<Rational> {
        self.fps
    }

    /// Forces every independently decodable unit to carry its own parameter
    /// headers. The encode session turns this on unconditionally because its
    /// output units are flushed one by one rather than held for muxing.
    pub fn set_repeat_headers(&mut self, on: bool) {
        self.repeat_headers = on;
    }

    pub fn repeat_headers(&self) -> bool {
        self.repeat_headers
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset.as_deref()
    }

    pub fn tune(&self) -> Option<&str> {
        self.tune.as_deref()
    }

    /// Recorded free-form overrides in application order, for replay into
    /// the engine's own parser.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &str)> {
        self.overrides.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn lookup(key: &str) -> Option<ParamKind> {
    KNOWN_PARAMS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, kind)| *kind)
}

/// Validates `value` against the key's grammar, returning the normalized
/// string to record. `None` means the value is rejected.
fn validate_value(key: &str, kind: ParamKind, value: Option<&str>) -> Option<String> {
    match kind {
        ParamKind::Flag => match value {
            None => Some("1".to_string()),
            Some("1") | Some("true") | Some("yes") | Some("on") => Some("1".to_string()),
            Some("0") | Some("false") | Some("no") | Some("off") => Some("0".to_string()),
            Some(_) => None,
        },
        ParamKind::Int => {
            let v = value?;
            v.trim().parse::<i64>().ok().map(|n| n.to_string())
        }
        ParamKind::Float => {
            let v = value?;
            v.trim().parse::<f64>().ok()?;
            Some(v.trim().to_string())
        }
        ParamKind::Fps => {
            let v = value?;
            v.parse::<Rational>().ok().map(|r| r.to_string())
        }
        ParamKind::Dimensions => {
            let v = value?;
            let res: Resolution = v.parse().ok()?;
            (res.width > 0 && res.height > 0).then(|| res.to_string())
        }
        ParamKind::Keyword(choices) => {
            let v = value?.trim().to_ascii_lowercase();
            choices.contains(&v.as_str()).then(|| normalize_keyword(key, &v))
        }
        ParamKind::Text => {
            let v = value?.trim();
            (!v.is_empty()).then(|| v.to_string())
        }
    }
}

/// Keyword values may have aliases; canonicalize the ones with typed twins.
fn normalize_keyword(key: &str, value: &str) -> String {
    match key {
        "log-level" => LogLevel::from_name(value)
            .map(|l| l.name().to_string())
            .unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_engine_defaults() {
        let params = ParameterSet::new();
        assert_eq!(params.color_format(), ColorFormat::I420);
        assert_eq!(params.log_level(), LogLevel::Info);
        assert_eq!(params.width(), 0);
        assert!(params.fps().is_none());
        assert!(!params.repeat_headers());
    }

    #[test]
    fn fps_override_roundtrip() {
        let mut params = ParameterSet::new();
        params.parse("fps", Some("10")).unwrap();
        assert_eq!(params.effective("fps").as_deref(), Some("10"));
        assert_eq!(params.fps(), Some(Rational::new(10, 1)));

        params.parse("fps", Some("30000/1001")).unwrap();
        assert_eq!(params.fps(), Some(Rational::new(30000, 1001)));
    }

    #[test]
    fn unknown_key_is_bad_name() {
        let mut params = ParameterSet::new();
        let err = params.parse("not-a-real-key", None).unwrap_err();
        assert_eq!(
            err,
            ParamError::BadName {
                key: "not-a-real-key".to_string()
            }
        );
    }

    #[test]
    fn bad_value_reports_key_and_value() {
        let mut params = ParameterSet::new();
        let err = params.parse("bitrate", Some("plenty")).unwrap_err();
        assert_eq!(
            err,
            ParamError::BadValue {
                key: "bitrate".to_string(),
                value: "plenty".to_string()
            }
        );
        // Missing value on a non-flag key is also a value error.
        assert!(matches!(
            params.parse("crf", None),
            Err(ParamError::BadValue { .. })
        ));
    }

    #[test]
    fn flag_forms() {
        let mut params = ParameterSet::new();
        params.parse("open-gop", None).unwrap();
        assert_eq!(params.effective("open-gop").as_deref(), Some("1"));

        params.parse("no-open-gop", None).unwrap();
        assert_eq!(params.effective("open-gop").as_deref(), Some("0"));

        assert!(matches!(
            params.parse("no-open-gop", Some("1")),
            Err(ParamError::BadValue { .. })
        ));
        assert!(matches!(
            params.parse("no-bitrate", None),
            Err(ParamError::BadName { .. })
        ));
    }

    #[test]
    fn underscores_normalize_to_hyphens() {
        let mut params = ParameterSet::new();
        params.parse("rc_lookahead", Some("40")).unwrap();
        assert_eq!(params.effective("rc-lookahead").as_deref(), Some("40"));
    }

    #[test]
    fn typed_mirrors_update_typed_state() {
        let mut params = ParameterSet::new();
        params.parse("input-res", Some("1080x720")).unwrap();
        assert_eq!(params.resolution(), Resolution::new(1080, 720));

        params.parse("input-csp", Some("i422")).unwrap();
        assert_eq!(params.color_format(), ColorFormat::I422);

        params.parse("log-level", Some("3")).unwrap();
        assert_eq!(params.log_level(), LogLevel::Debug);
        assert_eq!(params.effective("log-level").as_deref(), Some("debug"));

        params.parse("repeat-headers", Some("1")).unwrap();
        assert!(params.repeat_headers());
    }

    #[test]
    fn preset_resets_prior_overrides() {
        let mut params = ParameterSet::new();
        params.set_width(1920);
        params.parse("bitrate", Some("5000")).unwrap();

        params.apply_preset(Some("veryfast"), None).unwrap();
        assert_eq!(params.width(), 0);
        assert!(params.effective("bitrate").is_none());
        assert_eq!(params.preset(), Some("veryfast"));
    }

    #[test]
    fn unknown_preset_or_tune_is_bad_name() {
        let mut params = ParameterSet::new();
        assert!(matches!(
            params.apply_preset(Some("warp9"), None),
            Err(ParamError::BadName { .. })
        ));
        assert!(matches!(
            params.apply_preset(Some("medium"), Some("sparkle")),
            Err(ParamError::BadName { .. })
        ));
        // A failed preset application leaves the set untouched.
        params.set_width(640);
        assert!(params.apply_preset(Some("nope"), None).is_err());
        assert_eq!(params.width(), 640);
    }

    #[test]
    fn overrides_replay_in_order() {
        let mut params = ParameterSet::new();
        params.parse("bframes", Some("4")).unwrap();
        params.parse("keyint", Some("250")).unwrap();
        params.parse("bframes", Some("0")).unwrap();

        let replay: Vec<_> = params.overrides().collect();
        assert_eq!(
            replay,
            vec![("bframes", "4"), ("keyint", "250"), ("bframes", "0")]
        );
        // Last application wins for read-back.
        assert_eq!(params.effective("bframes").as_deref(), Some("0"));
    }
}

//! Wire vocabulary of the StormAudio Telnet protocol.
//!
//! Every command and every event is a single newline-terminated line in a
//! dotted `ssp.*` namespace. Parameters travel as bracketed literals, usually
//! a JSON-ish array: `ssp.vol.[-45.0]`, `ssp.input.list.["TV", 8, 0, 23]`.

use crate::error::{Result, StormAudioError};
use serde_json::Value;
use std::borrow::Cow;
use std::fmt;

/// Default Telnet port of StormAudio processors
pub const DEFAULT_PORT: u16 = 23;

/// Lowest value of the absolute (UI) volume scale
pub const MIN_VOLUME: i32 = 0;

/// Highest value of the absolute (UI) volume scale
pub const MAX_VOLUME: i32 = 100;

/// Literal response lines and response prefixes sent by the processor
pub mod response {
    pub const POWER_ON: &str = "ssp.power.on";
    pub const POWER_OFF: &str = "ssp.power.off";
    pub const PROC_STATE_OFF: &str = "ssp.procstate.[0]";
    pub const PROC_STATE_INDETERMINATE: &str = "ssp.procstate.[1]";
    pub const PROC_STATE_ON: &str = "ssp.procstate.[2]";
    pub const MUTE_ON: &str = "ssp.mute.on";
    pub const MUTE_OFF: &str = "ssp.mute.off";
    pub const STORM_XT_ON: &str = "ssp.stormxt.on";
    pub const STORM_XT_OFF: &str = "ssp.stormxt.off";

    /// Prefix of `ssp.vol.[<float>]`
    pub const VOLUME: &str = "ssp.vol.";
    /// What a volume confirmation starts with; excludes `ssp.volume.*`
    pub const VOLUME_VALUE: &str = "ssp.vol.[";

    pub const INPUT_LIST_START: &str = "ssp.input.start";
    pub const INPUT_LIST_ITEM: &str = "ssp.input.list.";
    pub const INPUT_LIST_END: &str = "ssp.input.end";
    pub const INPUT: &str = "ssp.input.";

    pub const PRESET_LIST_START: &str = "ssp.preset.start";
    pub const PRESET_LIST_ITEM: &str = "ssp.preset.list.";
    pub const PRESET_LIST_END: &str = "ssp.preset.end";
    pub const PRESET: &str = "ssp.preset.";
    pub const PRESET_CUSTOM: &str = "ssp.preset.custom.";

    pub const SURROUND_MODE: &str = "ssp.surroundmode.";
    pub const ALLOWED_MODE: &str = "ssp.allowedmode.";
    pub const DOLBY_MODE: &str = "ssp.dolbymode.";
    pub const LOUDNESS: &str = "ssp.loudness.";
    pub const AURO_PRESET: &str = "ssp.auropreset.";
    pub const AURO_STRENGTH: &str = "ssp.aurostrength.";
}

/// Tone and enhancement controls, all expressed as decibel offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneControl {
    Bass,
    Treble,
    Brightness,
    CenterEnhance,
    SurroundEnhance,
    LfeEnhance,
}

impl ToneControl {
    pub const ALL: [ToneControl; 6] = [
        ToneControl::Bass,
        ToneControl::Treble,
        ToneControl::Brightness,
        ToneControl::CenterEnhance,
        ToneControl::SurroundEnhance,
        ToneControl::LfeEnhance,
    ];

    fn keyword(self) -> &'static str {
        match self {
            ToneControl::Bass => "bass",
            ToneControl::Treble => "treble",
            ToneControl::Brightness => "brightness",
            ToneControl::CenterEnhance => "c_en",
            ToneControl::SurroundEnhance => "s_en",
            ToneControl::LfeEnhance => "lfe_en",
        }
    }

    /// Prefix of the value event, e.g. `ssp.bass.`
    pub fn response_prefix(self) -> &'static str {
        match self {
            ToneControl::Bass => "ssp.bass.",
            ToneControl::Treble => "ssp.treble.",
            ToneControl::Brightness => "ssp.brightness.",
            ToneControl::CenterEnhance => "ssp.c_en.",
            ToneControl::SurroundEnhance => "ssp.s_en.",
            ToneControl::LfeEnhance => "ssp.lfe_en.",
        }
    }
}

/// Direction of a tone adjustment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneAction {
    /// +1 dB
    Up,
    /// -1 dB
    Down,
    /// Back to 0 dB
    Reset,
}

/// Menu navigation keys of the processor's on-screen display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Up,
    Down,
    Left,
    Right,
    Ok,
    Back,
}

impl Navigation {
    fn keyword(self) -> &'static str {
        match self {
            Navigation::Up => "up",
            Navigation::Down => "down",
            Navigation::Left => "left",
            Navigation::Right => "right",
            Navigation::Ok => "ok",
            Navigation::Back => "back",
        }
    }
}

/// A command line sent to the processor
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    PowerOn,
    PowerOff,
    PowerToggle,
    /// Ask the processor to report its proc-state
    ProcState,
    MuteOn,
    MuteOff,
    MuteToggle,
    /// Set the volume on the device's relative scale (-100..=0)
    Volume(i32),
    VolumeUp,
    VolumeDown,
    Input(i64),
    SurroundMode(i64),
    PresetNext,
    PresetPrev,
    Preset(i64),
    Loudness(i64),
    Navigate(Navigation),
    Tone(ToneControl, ToneAction),
    DolbyMode(i64),
    StormXtOn,
    StormXtOff,
    StormXtToggle,
    AuroPreset(i64),
    AuroStrength(i64),
    /// Arbitrary command string, passed through untouched
    Raw(String),
}

impl Command {
    /// Render the command as a protocol line (without terminator)
    pub fn to_line(&self) -> Cow<'_, str> {
        let line = match self {
            Command::PowerOn => "ssp.power.on".into(),
            Command::PowerOff => "ssp.power.off".into(),
            Command::PowerToggle => "ssp.power.toggle".into(),
            Command::ProcState => "ssp.procstate".into(),
            Command::MuteOn => "ssp.mute.on".into(),
            Command::MuteOff => "ssp.mute.off".into(),
            Command::MuteToggle => "ssp.mute.toggle".into(),
            Command::Volume(relative) => format!("ssp.vol.[{}]", relative),
            Command::VolumeUp => "ssp.vol.up".into(),
            Command::VolumeDown => "ssp.vol.down".into(),
            Command::Input(id) => format!("ssp.input.[{}]", id),
            Command::SurroundMode(id) => format!("ssp.surroundmode.[{}]", id),
            Command::PresetNext => "ssp.preset.next".into(),
            Command::PresetPrev => "ssp.preset.prev".into(),
            Command::Preset(id) => format!("ssp.preset.[{}]", id),
            Command::Loudness(id) => format!("ssp.loudness.[{}]", id),
            Command::Navigate(nav) => format!("ssp.nav.{}", nav.keyword()),
            Command::Tone(control, ToneAction::Up) => format!("ssp.{}.up", control.keyword()),
            Command::Tone(control, ToneAction::Down) => {
                format!("ssp.{}.down", control.keyword())
            }
            Command::Tone(control, ToneAction::Reset) => {
                format!("ssp.{}.[0]", control.keyword())
            }
            Command::DolbyMode(id) => format!("ssp.dolbymode.[{}]", id),
            Command::StormXtOn => "ssp.stormxt.on".into(),
            Command::StormXtOff => "ssp.stormxt.off".into(),
            Command::StormXtToggle => "ssp.stormxt.toggle".into(),
            Command::AuroPreset(id) => format!("ssp.auropreset.[{}]", id),
            Command::AuroStrength(value) => format!("ssp.aurostrength.[{}]", value),
            Command::Raw(line) => return Cow::Borrowed(line.as_str()),
        };
        Cow::Owned(line)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Shape of an expected response line
///
/// The protocol has no request ids, so responses are recognised purely by
/// what they look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// Line must equal the pattern
    Exact(Cow<'static, str>),
    /// Line must start with the pattern
    Prefix(Cow<'static, str>),
}

impl Matcher {
    pub fn exact(pattern: impl Into<Cow<'static, str>>) -> Self {
        Matcher::Exact(pattern.into())
    }

    pub fn prefix(pattern: impl Into<Cow<'static, str>>) -> Self {
        Matcher::Prefix(pattern.into())
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Exact(pattern) => line == pattern.as_ref(),
            Matcher::Prefix(pattern) => line.starts_with(pattern.as_ref()),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Exact(pattern) => write!(f, "{}", pattern),
            Matcher::Prefix(pattern) => write!(f, "{}*", pattern),
        }
    }
}

/// Clamp a UI volume to 0..=100 and convert it to the device's -100..=0 scale
pub fn absolute_to_relative(volume: i32) -> i32 {
    volume.clamp(MIN_VOLUME, MAX_VOLUME) - MAX_VOLUME
}

/// Convert a device volume (dB below reference) to the UI's 0..=100 scale
///
/// Fractional decibels are truncated toward zero. Values outside the
/// device's -100..=0 range are clamped.
pub fn relative_to_absolute(volume: f64) -> i32 {
    let relative = volume.clamp(f64::from(MIN_VOLUME - MAX_VOLUME), 0.0);
    relative as i32 + MAX_VOLUME
}

/// Escape quote characters that are not array delimiters.
///
/// Firmware emits list items such as `["ARTopt-LW", 247, "["1"]", 0]` whose
/// string fields contain bare quotes. A quote is kept as a delimiter when it
/// sits right after the opening bracket or a `,`/`, ` separator, or right
/// before the closing bracket or a `,`/`, ` separator. Every other quote gets
/// a backslash. Positions are counted in characters.
pub fn fix_json(payload: &str) -> Cow<'_, str> {
    let chars: Vec<char> = payload.chars().collect();
    let len = chars.len();

    let needs_escape = |i: usize| {
        let is_start = i == 1
            || (i > 1 && chars[i - 1] == ' ' && chars[i - 2] == ',')
            || (i > 0 && chars[i - 1] == ',');
        let is_end = (len >= 2 && i == len - 2)
            || (i + 2 < len && chars[i + 1] == ',' && chars[i + 2] == ' ')
            || (i + 1 < len && chars[i + 1] == ',');
        !(is_start || is_end)
    };

    let to_escape: Vec<usize> = (0..len)
        .filter(|&i| chars[i] == '"' && needs_escape(i))
        .collect();
    if to_escape.is_empty() {
        return Cow::Borrowed(payload);
    }

    let mut fixed = String::with_capacity(payload.len() + to_escape.len());
    let mut pending = to_escape.iter().peekable();
    for (i, c) in chars.iter().enumerate() {
        if pending.peek() == Some(&&i) {
            fixed.push('\\');
            pending.next();
        }
        fixed.push(*c);
    }
    Cow::Owned(fixed)
}

/// Parse the bracketed payload that follows `prefix` in `line`.
///
/// Returns `Ok(None)` when the remainder is not bracketed at all (e.g. the
/// echo `ssp.preset.next`), which callers treat as an unrelated line. When
/// `repair` is set, [`fix_json`] runs before parsing.
pub fn parse_payload(line: &str, prefix: &str, repair: bool) -> Result<Option<Vec<Value>>> {
    let Some(payload) = line.strip_prefix(prefix) else {
        return Ok(None);
    };
    if !payload.starts_with('[') {
        return Ok(None);
    }

    let parsed = if repair {
        serde_json::from_str::<Vec<Value>>(&fix_json(payload))
    } else {
        serde_json::from_str::<Vec<Value>>(payload)
    };

    parsed
        .map(Some)
        .map_err(|e| StormAudioError::malformed(line, e.to_string()))
}

/// Read a JSON number as an integer, truncating fractions
pub fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
}

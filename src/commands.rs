//! Entity command dispatch
//!
//! Translates the entity layer's `(entity id, command id, params)` triples
//! into Command API calls and reports a [`CommandStatus`].

use crate::device::StormAudioDevice;
use crate::error::{Result, StormAudioError};
use crate::projection::{Entity, SelectKind};
use crate::protocol::{ToneAction, ToneControl};
use crate::state::{DolbyMode, LoudnessMode};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Command ids used by the entity layer
pub mod cmd {
    pub const ON: &str = "on";
    pub const OFF: &str = "off";
    pub const TOGGLE: &str = "toggle";
    pub const VOLUME: &str = "volume";
    pub const VOLUME_UP: &str = "volume_up";
    pub const VOLUME_DOWN: &str = "volume_down";
    pub const MUTE: &str = "mute";
    pub const UNMUTE: &str = "unmute";
    pub const MUTE_TOGGLE: &str = "mute_toggle";
    pub const CURSOR_UP: &str = "cursor_up";
    pub const CURSOR_DOWN: &str = "cursor_down";
    pub const CURSOR_LEFT: &str = "cursor_left";
    pub const CURSOR_RIGHT: &str = "cursor_right";
    pub const CURSOR_ENTER: &str = "cursor_enter";
    pub const BACK: &str = "back";
    pub const HOME: &str = "home";
    pub const SELECT_SOURCE: &str = "select_source";
    pub const SELECT_SOUND_MODE: &str = "select_sound_mode";
    pub const SEND_CMD: &str = "send_cmd";
    pub const SEND_CMD_SEQUENCE: &str = "send_cmd_sequence";
    pub const SELECT_OPTION: &str = "select_option";
    pub const SELECT_FIRST: &str = "select_first";
    pub const SELECT_LAST: &str = "select_last";
    pub const SELECT_NEXT: &str = "select_next";
    pub const SELECT_PREVIOUS: &str = "select_previous";
}

const PRESET_PREFIX: &str = "PRESET_";
const VOLUME_PREFIX: &str = "VOLUME_";

/// Repeat count when `send_cmd` omits it
const DEFAULT_REPEAT: u64 = 1;
/// Pause after each `send_cmd` repetition when omitted, in milliseconds
const DEFAULT_DELAY_MS: u64 = 100;

/// Result of an entity command, as reported to the entity layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ok,
    NotImplemented,
    BadRequest,
}

/// Button-style commands offered on the media player and remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimpleCommand {
    VolumeUp,
    VolumeDown,
    MuteOn,
    MuteOff,
    MuteToggle,
    CursorUp,
    CursorDown,
    CursorLeft,
    CursorRight,
    CursorEnter,
    Back,
    PresetNext,
    PresetPrev,
    LoudnessOff,
    LoudnessLow,
    LoudnessMedium,
    LoudnessFull,
    BassUp,
    BassDown,
    BassReset,
    TrebleUp,
    TrebleDown,
    TrebleReset,
    BrightnessUp,
    BrightnessDown,
    BrightnessReset,
    CenterEnhanceUp,
    CenterEnhanceDown,
    CenterEnhanceReset,
    SurroundEnhanceUp,
    SurroundEnhanceDown,
    SurroundEnhanceReset,
    LfeEnhanceUp,
    LfeEnhanceDown,
    LfeEnhanceReset,
    DolbyOff,
    DolbyMovie,
    DolbyMusic,
    DolbyNight,
    StormXtOn,
    StormXtOff,
    StormXtToggle,
}

impl SimpleCommand {
    pub const ALL: [SimpleCommand; 42] = [
        SimpleCommand::VolumeUp,
        SimpleCommand::VolumeDown,
        SimpleCommand::MuteOn,
        SimpleCommand::MuteOff,
        SimpleCommand::MuteToggle,
        SimpleCommand::CursorUp,
        SimpleCommand::CursorDown,
        SimpleCommand::CursorLeft,
        SimpleCommand::CursorRight,
        SimpleCommand::CursorEnter,
        SimpleCommand::Back,
        SimpleCommand::PresetNext,
        SimpleCommand::PresetPrev,
        SimpleCommand::LoudnessOff,
        SimpleCommand::LoudnessLow,
        SimpleCommand::LoudnessMedium,
        SimpleCommand::LoudnessFull,
        SimpleCommand::BassUp,
        SimpleCommand::BassDown,
        SimpleCommand::BassReset,
        SimpleCommand::TrebleUp,
        SimpleCommand::TrebleDown,
        SimpleCommand::TrebleReset,
        SimpleCommand::BrightnessUp,
        SimpleCommand::BrightnessDown,
        SimpleCommand::BrightnessReset,
        SimpleCommand::CenterEnhanceUp,
        SimpleCommand::CenterEnhanceDown,
        SimpleCommand::CenterEnhanceReset,
        SimpleCommand::SurroundEnhanceUp,
        SimpleCommand::SurroundEnhanceDown,
        SimpleCommand::SurroundEnhanceReset,
        SimpleCommand::LfeEnhanceUp,
        SimpleCommand::LfeEnhanceDown,
        SimpleCommand::LfeEnhanceReset,
        SimpleCommand::DolbyOff,
        SimpleCommand::DolbyMovie,
        SimpleCommand::DolbyMusic,
        SimpleCommand::DolbyNight,
        SimpleCommand::StormXtOn,
        SimpleCommand::StormXtOff,
        SimpleCommand::StormXtToggle,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SimpleCommand::VolumeUp => "VOLUME_UP",
            SimpleCommand::VolumeDown => "VOLUME_DOWN",
            SimpleCommand::MuteOn => "MUTE_ON",
            SimpleCommand::MuteOff => "MUTE_OFF",
            SimpleCommand::MuteToggle => "MUTE_TOGGLE",
            SimpleCommand::CursorUp => "CURSOR_UP",
            SimpleCommand::CursorDown => "CURSOR_DOWN",
            SimpleCommand::CursorLeft => "CURSOR_LEFT",
            SimpleCommand::CursorRight => "CURSOR_RIGHT",
            SimpleCommand::CursorEnter => "CURSOR_ENTER",
            SimpleCommand::Back => "BACK",
            SimpleCommand::PresetNext => "PRESET_NEXT",
            SimpleCommand::PresetPrev => "PRESET_PREV",
            SimpleCommand::LoudnessOff => "LOUDNESS_OFF",
            SimpleCommand::LoudnessLow => "LOUDNESS_LOW",
            SimpleCommand::LoudnessMedium => "LOUDNESS_MEDIUM",
            SimpleCommand::LoudnessFull => "LOUDNESS_FULL",
            SimpleCommand::BassUp => "BASS_UP",
            SimpleCommand::BassDown => "BASS_DOWN",
            SimpleCommand::BassReset => "BASS_RESET",
            SimpleCommand::TrebleUp => "TREBLE_UP",
            SimpleCommand::TrebleDown => "TREBLE_DOWN",
            SimpleCommand::TrebleReset => "TREBLE_RESET",
            SimpleCommand::BrightnessUp => "BRIGHTNESS_UP",
            SimpleCommand::BrightnessDown => "BRIGHTNESS_DOWN",
            SimpleCommand::BrightnessReset => "BRIGHTNESS_RESET",
            SimpleCommand::CenterEnhanceUp => "CENTER_ENHANCE_UP",
            SimpleCommand::CenterEnhanceDown => "CENTER_ENHANCE_DOWN",
            SimpleCommand::CenterEnhanceReset => "CENTER_ENHANCE_RESET",
            SimpleCommand::SurroundEnhanceUp => "SURROUND_ENHANCE_UP",
            SimpleCommand::SurroundEnhanceDown => "SURROUND_ENHANCE_DOWN",
            SimpleCommand::SurroundEnhanceReset => "SURROUND_ENHANCE_RESET",
            SimpleCommand::LfeEnhanceUp => "LFE_ENHANCE_UP",
            SimpleCommand::LfeEnhanceDown => "LFE_ENHANCE_DOWN",
            SimpleCommand::LfeEnhanceReset => "LFE_ENHANCE_RESET",
            SimpleCommand::DolbyOff => "DOLBY_OFF",
            SimpleCommand::DolbyMovie => "DOLBY_MOVIE",
            SimpleCommand::DolbyMusic => "DOLBY_MUSIC",
            SimpleCommand::DolbyNight => "DOLBY_NIGHT",
            SimpleCommand::StormXtOn => "STORM_XT_ON",
            SimpleCommand::StormXtOff => "STORM_XT_OFF",
            SimpleCommand::StormXtToggle => "STORM_XT_TOGGLE",
        }
    }

    /// Tone control and direction, for the tone commands
    fn tone(self) -> Option<(ToneControl, ToneAction)> {
        use SimpleCommand::*;
        use ToneAction::{Down, Reset, Up};
        use ToneControl::*;

        let tone = match self {
            BassUp => (Bass, Up),
            BassDown => (Bass, Down),
            BassReset => (Bass, Reset),
            TrebleUp => (Treble, Up),
            TrebleDown => (Treble, Down),
            TrebleReset => (Treble, Reset),
            BrightnessUp => (Brightness, Up),
            BrightnessDown => (Brightness, Down),
            BrightnessReset => (Brightness, Reset),
            CenterEnhanceUp => (CenterEnhance, Up),
            CenterEnhanceDown => (CenterEnhance, Down),
            CenterEnhanceReset => (CenterEnhance, Reset),
            SurroundEnhanceUp => (SurroundEnhance, Up),
            SurroundEnhanceDown => (SurroundEnhance, Down),
            SurroundEnhanceReset => (SurroundEnhance, Reset),
            LfeEnhanceUp => (LfeEnhance, Up),
            LfeEnhanceDown => (LfeEnhance, Down),
            LfeEnhanceReset => (LfeEnhance, Reset),
            _ => return None,
        };
        Some(tone)
    }
}

impl fmt::Display for SimpleCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimpleCommand {
    type Err = StormAudioError;

    fn from_str(s: &str) -> Result<Self> {
        SimpleCommand::ALL
            .into_iter()
            .find(|command| command.as_str() == s)
            .ok_or_else(|| {
                StormAudioError::InvalidArgument(format!("unknown simple command {}", s))
            })
    }
}

/// Names of every simple command, for entity registration
pub fn simple_command_names() -> Vec<&'static str> {
    SimpleCommand::ALL.iter().map(|command| command.as_str()).collect()
}

/// Media-player command ids that are plain aliases of a simple command
fn media_player_alias(cmd_id: &str) -> Option<SimpleCommand> {
    let command = match cmd_id {
        cmd::VOLUME_UP => SimpleCommand::VolumeUp,
        cmd::VOLUME_DOWN => SimpleCommand::VolumeDown,
        cmd::MUTE => SimpleCommand::MuteOn,
        cmd::UNMUTE => SimpleCommand::MuteOff,
        cmd::MUTE_TOGGLE => SimpleCommand::MuteToggle,
        cmd::CURSOR_UP => SimpleCommand::CursorUp,
        cmd::CURSOR_DOWN => SimpleCommand::CursorDown,
        cmd::CURSOR_LEFT => SimpleCommand::CursorLeft,
        cmd::CURSOR_RIGHT => SimpleCommand::CursorRight,
        cmd::CURSOR_ENTER => SimpleCommand::CursorEnter,
        cmd::BACK | cmd::HOME => SimpleCommand::Back,
        _ => return None,
    };
    Some(command)
}

fn param<'a>(params: Option<&'a Value>, key: &str) -> Option<&'a Value> {
    params.and_then(|p| p.get(key))
}

fn required_str<'a>(params: Option<&'a Value>, key: &str) -> Result<&'a str> {
    param(params, key)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            StormAudioError::InvalidArgument(format!("missing string parameter {:?}", key))
        })
}

/// Neighbour of `current` in `options`; wraps around only with `cycle`.
/// Without a current option, steps onto the first (forward) or last entry.
fn step(options: &[String], current: Option<&str>, forward: bool, cycle: bool) -> Option<String> {
    if options.is_empty() {
        return None;
    }
    let last = options.len() - 1;
    let index = match current.and_then(|c| options.iter().position(|o| o == c)) {
        None if forward => 0,
        None => last,
        Some(i) if forward && i < last => i + 1,
        Some(_) if forward => {
            if !cycle {
                return None;
            }
            0
        }
        Some(i) if i > 0 => i - 1,
        Some(_) => {
            if !cycle {
                return None;
            }
            last
        }
    };
    options.get(index).cloned()
}

impl StormAudioDevice {
    /// Run one simple command
    pub async fn run_simple_command(&self, command: SimpleCommand) {
        if let Some((control, action)) = command.tone() {
            self.tone(control, action).await;
            return;
        }

        match command {
            SimpleCommand::VolumeUp => self.volume_up().await,
            SimpleCommand::VolumeDown => self.volume_down().await,
            SimpleCommand::MuteOn => self.mute_on().await,
            SimpleCommand::MuteOff => self.mute_off().await,
            SimpleCommand::MuteToggle => self.mute_toggle().await,
            SimpleCommand::CursorUp => self.cursor_up().await,
            SimpleCommand::CursorDown => self.cursor_down().await,
            SimpleCommand::CursorLeft => self.cursor_left().await,
            SimpleCommand::CursorRight => self.cursor_right().await,
            SimpleCommand::CursorEnter => self.cursor_enter().await,
            SimpleCommand::Back => self.back().await,
            SimpleCommand::PresetNext => self.preset_next().await,
            SimpleCommand::PresetPrev => self.preset_prev().await,
            SimpleCommand::LoudnessOff => self.set_loudness(LoudnessMode::Off).await,
            SimpleCommand::LoudnessLow => self.set_loudness(LoudnessMode::Low).await,
            SimpleCommand::LoudnessMedium => self.set_loudness(LoudnessMode::Medium).await,
            SimpleCommand::LoudnessFull => self.set_loudness(LoudnessMode::Full).await,
            SimpleCommand::DolbyOff => self.set_dolby_mode(DolbyMode::Off).await,
            SimpleCommand::DolbyMovie => self.set_dolby_mode(DolbyMode::Movie).await,
            SimpleCommand::DolbyMusic => self.set_dolby_mode(DolbyMode::Music).await,
            SimpleCommand::DolbyNight => self.set_dolby_mode(DolbyMode::Night).await,
            SimpleCommand::StormXtOn => self.storm_xt_on().await,
            SimpleCommand::StormXtOff => self.storm_xt_off().await,
            SimpleCommand::StormXtToggle => self.storm_xt_toggle().await,
            // Tone commands were handled above
            _ => {}
        }
    }

    /// Handle a command addressed to one of this device's entities
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use stormaudio_isp::{CommandStatus, DeviceConfig, StormAudioDevice};
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let device = StormAudioDevice::new(DeviceConfig::new("isp", "Cinema", "192.168.1.50"));
    /// let params = serde_json::json!({ "command": "PRESET_Movie", "repeat": 1 });
    /// let status = device.handle_command("remote.isp", "send_cmd", Some(&params)).await;
    /// assert_eq!(status, CommandStatus::Ok);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn handle_command(
        &self,
        entity_id: &str,
        cmd_id: &str,
        params: Option<&Value>,
    ) -> CommandStatus {
        tracing::info!(
            "[{}] Received command: {} {}",
            entity_id,
            cmd_id,
            params.map(|p| p.to_string()).unwrap_or_default()
        );

        let Some(entity) = Entity::from_id(&self.identifier(), entity_id) else {
            tracing::warn!("[{}] Unknown entity: {}", self.log_id(), entity_id);
            return CommandStatus::NotImplemented;
        };

        let result = match entity {
            Entity::MediaPlayer => self.media_player_command(cmd_id, params).await,
            Entity::Remote => self.remote_command(cmd_id, params).await,
            Entity::Select(kind) => self.select_command(kind, cmd_id, params).await,
            Entity::Sensor(_) => Ok(CommandStatus::NotImplemented),
        };

        match result {
            Ok(CommandStatus::NotImplemented) => {
                tracing::warn!("[{}] Unhandled command: {}", entity_id, cmd_id);
                CommandStatus::NotImplemented
            }
            Ok(status) => status,
            Err(e) => {
                tracing::error!("[{}] Error executing command {}: {}", entity_id, cmd_id, e);
                CommandStatus::BadRequest
            }
        }
    }

    /// Power commands shared by media player and remote
    async fn power_command(&self, cmd_id: &str) -> bool {
        match cmd_id {
            cmd::ON => self.power_on().await,
            cmd::OFF => self.power_off().await,
            cmd::TOGGLE => {
                self.power_toggle().await;
            }
            _ => return false,
        }
        true
    }

    async fn media_player_command(
        &self,
        cmd_id: &str,
        params: Option<&Value>,
    ) -> Result<CommandStatus> {
        match cmd_id {
            cmd::VOLUME => {
                let volume = param(params, "volume")
                    .and_then(Value::as_f64)
                    .ok_or_else(|| StormAudioError::InvalidArgument("missing volume".to_string()))?;
                self.set_volume(volume as i32).await;
            }
            cmd::SELECT_SOURCE => self.select_source(required_str(params, "source")?).await,
            cmd::SELECT_SOUND_MODE => self.select_sound_mode(required_str(params, "mode")?).await,
            other => {
                if self.power_command(other).await {
                    return Ok(CommandStatus::Ok);
                }
                let simple = match media_player_alias(other) {
                    Some(simple) => simple,
                    None => match other.parse::<SimpleCommand>() {
                        Ok(simple) => simple,
                        Err(_) => return Ok(CommandStatus::NotImplemented),
                    },
                };
                self.run_simple_command(simple).await;
            }
        }
        Ok(CommandStatus::Ok)
    }

    async fn remote_command(&self, cmd_id: &str, params: Option<&Value>) -> Result<CommandStatus> {
        match cmd_id {
            cmd::SEND_CMD | cmd::SEND_CMD_SEQUENCE => {
                let params = params.ok_or_else(|| {
                    StormAudioError::InvalidArgument(
                        "Cannot process command without any given parameters".to_string(),
                    )
                })?;
                let repeat = params.get("repeat").and_then(Value::as_u64).unwrap_or(DEFAULT_REPEAT);
                let delay = Duration::from_millis(
                    params.get("delay").and_then(Value::as_u64).unwrap_or(DEFAULT_DELAY_MS),
                );

                if cmd_id == cmd::SEND_CMD {
                    let command = required_str(Some(params), "command")?;
                    self.send_remote_command(command, repeat, delay).await?;
                } else {
                    let sequence = params
                        .get("sequence")
                        .and_then(Value::as_array)
                        .ok_or_else(|| {
                            StormAudioError::InvalidArgument("missing sequence".to_string())
                        })?;
                    for command in sequence {
                        let command = command.as_str().ok_or_else(|| {
                            StormAudioError::InvalidArgument(format!(
                                "sequence entry {} is not a string",
                                command
                            ))
                        })?;
                        self.send_remote_command(command, repeat, delay).await?;
                    }
                }
            }
            other => {
                if self.power_command(other).await {
                    return Ok(CommandStatus::Ok);
                }
                match other.parse::<SimpleCommand>() {
                    Ok(simple) => self.run_simple_command(simple).await,
                    Err(_) => return Ok(CommandStatus::NotImplemented),
                }
            }
        }
        Ok(CommandStatus::Ok)
    }

    /// One `send_cmd` entry: a simple command, `PRESET_<name>`,
    /// `VOLUME_<n>`, or a raw protocol line
    async fn send_remote_command(&self, command: &str, repeat: u64, delay: Duration) -> Result<()> {
        for _ in 0..repeat {
            if self.power_command(command).await {
                // handled
            } else if let Ok(simple) = command.parse::<SimpleCommand>() {
                self.run_simple_command(simple).await;
            } else if let Some(preset) = command.strip_prefix(PRESET_PREFIX) {
                self.select_preset(preset).await;
            } else if let Some(volume) = command.strip_prefix(VOLUME_PREFIX) {
                let volume: i32 = volume.trim().parse().map_err(|_| {
                    StormAudioError::InvalidArgument(format!("invalid volume in {}", command))
                })?;
                self.set_volume(volume).await;
            } else {
                self.send_raw(command).await;
            }

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn select_command(
        &self,
        kind: SelectKind,
        cmd_id: &str,
        params: Option<&Value>,
    ) -> Result<CommandStatus> {
        let attributes = self.attributes();
        let options = kind.options(&attributes);
        let cycle = param(params, "cycle").and_then(Value::as_bool).unwrap_or(false);

        // Preset next/previous are native device commands
        if kind == SelectKind::Preset {
            match cmd_id {
                cmd::SELECT_NEXT => {
                    self.preset_next().await;
                    return Ok(CommandStatus::Ok);
                }
                cmd::SELECT_PREVIOUS => {
                    self.preset_prev().await;
                    return Ok(CommandStatus::Ok);
                }
                _ => {}
            }
        }

        let current = match kind {
            SelectKind::SoundMode => attributes
                .sound_mode()
                .or_else(|| attributes.actual_sound_mode())
                .map(str::to_string),
            _ => kind.current(&attributes),
        };

        let target = match cmd_id {
            cmd::SELECT_OPTION => Some(required_str(params, "option")?.to_string()),
            cmd::SELECT_FIRST => options.first().cloned(),
            cmd::SELECT_LAST => options.last().cloned(),
            cmd::SELECT_NEXT => step(&options, current.as_deref(), true, cycle),
            cmd::SELECT_PREVIOUS => step(&options, current.as_deref(), false, cycle),
            _ => return Ok(CommandStatus::NotImplemented),
        };

        let Some(target) = target else {
            return Ok(CommandStatus::Ok);
        };

        match kind {
            SelectKind::Preset => self.select_preset(&target).await,
            SelectKind::SoundMode => self.select_sound_mode(&target).await,
            SelectKind::AuroPreset => self.set_auro_preset(&target).await,
            SelectKind::AuroStrength => {
                let strength = target.trim().parse::<i64>().map_err(|_| {
                    let reason = format!("invalid Auro-Matic strength {}", target);
                    StormAudioError::InvalidArgument(reason)
                })?;
                self.set_auro_strength(strength).await;
            }
        }
        Ok(CommandStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use rstest::rstest;
    use serde_json::json;

    fn options(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_simple_command_names_round_trip() {
        for command in SimpleCommand::ALL {
            assert_eq!(command.as_str().parse::<SimpleCommand>().unwrap(), command);
        }
        assert!("PRESET_Movie".parse::<SimpleCommand>().is_err());
        assert_eq!(simple_command_names().len(), 42);
    }

    #[test]
    fn test_tone_commands_map_to_controls() {
        assert_eq!(
            SimpleCommand::LfeEnhanceReset.tone(),
            Some((ToneControl::LfeEnhance, ToneAction::Reset))
        );
        assert_eq!(SimpleCommand::DolbyNight.tone(), None);
    }

    #[rstest]
    #[case(Some("b"), true, false, Some("c"))]
    #[case(Some("c"), true, false, None)]
    #[case(Some("c"), true, true, Some("a"))]
    #[case(Some("a"), false, false, None)]
    #[case(Some("a"), false, true, Some("c"))]
    #[case(Some("b"), false, false, Some("a"))]
    #[case(None, true, false, Some("a"))]
    #[case(None, false, false, Some("c"))]
    fn test_step(
        #[case] current: Option<&str>,
        #[case] forward: bool,
        #[case] cycle: bool,
        #[case] expected: Option<&str>,
    ) {
        let list = options(&["a", "b", "c"]);
        assert_eq!(step(&list, current, forward, cycle).as_deref(), expected);
    }

    #[test]
    fn test_step_on_empty_list() {
        assert_eq!(step(&[], Some("a"), true, true), None);
    }

    #[tokio::test]
    async fn test_dispatch_status_codes() {
        let device = StormAudioDevice::new(DeviceConfig::new("isp", "Cinema", "127.0.0.1"));

        // Not connected: commands are dropped but still accepted
        assert_eq!(
            device.handle_command("remote.isp", "STORM_XT_ON", None).await,
            CommandStatus::Ok
        );
        assert_eq!(
            device.handle_command("media_player.isp", "fast_forward", None).await,
            CommandStatus::NotImplemented
        );
        assert_eq!(
            device.handle_command("sensor.isp.mute", "on", None).await,
            CommandStatus::NotImplemented
        );
        assert_eq!(
            device.handle_command("remote.other", "on", None).await,
            CommandStatus::NotImplemented
        );
        assert_eq!(
            device.handle_command("remote.isp", "send_cmd", None).await,
            CommandStatus::BadRequest
        );
        let loud = json!({"command": "VOLUME_loud", "delay": 0});
        assert_eq!(
            device.handle_command("remote.isp", "send_cmd", Some(&loud)).await,
            CommandStatus::BadRequest
        );
        assert_eq!(
            device.handle_command("media_player.isp", "volume", Some(&json!({}))).await,
            CommandStatus::BadRequest
        );
    }

    #[tokio::test]
    async fn test_params_are_logged_with_the_command() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);
        let device = StormAudioDevice::new(DeviceConfig::new("isp", "Cinema", "127.0.0.1"));

        let params = json!({"command": "MUTE_TOGGLE", "delay": 0});
        let status = device.handle_command("remote.isp", "send_cmd", Some(&params)).await;
        assert_eq!(status, CommandStatus::Ok);
        let status = device.handle_command("media_player.isp", "toggle", None).await;
        assert_eq!(status, CommandStatus::Ok);
    }
}

//! Attribute projection - maps session state to per-entity attribute records
//!
//! Every entity a device exposes is a variant of [`Entity`]. Projection is a
//! pure function of [`DeviceAttributes`]; ids that don't resolve project to
//! JSON `null`.

use crate::state::{DeviceAttributes, PowerState};
use serde_json::{json, Map, Value};

/// Flat attribute record handed to the entity layer
pub type Attributes = Map<String, Value>;

/// Attribute keys shared with the entity layer
pub mod attr {
    pub const STATE: &str = "state";
    pub const SOURCE: &str = "source";
    pub const SOURCE_LIST: &str = "source_list";
    pub const SOUND_MODE: &str = "sound_mode";
    pub const SOUND_MODE_LIST: &str = "sound_mode_list";
    pub const VOLUME: &str = "volume";
    pub const MUTED: &str = "muted";
    pub const CURRENT_OPTION: &str = "current_option";
    pub const OPTIONS: &str = "options";
    pub const VALUE: &str = "value";
    pub const UNIT: &str = "unit";
}

/// Read-only sensors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    VolumeDb,
    Mute,
    Preset,
    Source,
    StormXt,
    UpmixerMode,
    Loudness,
    DolbyMode,
    Bass,
    Treble,
    Brightness,
    CenterEnhance,
    SurroundEnhance,
    LfeEnhance,
    AuroPreset,
    AuroStrength,
}

impl SensorKind {
    pub const ALL: [SensorKind; 16] = [
        SensorKind::VolumeDb,
        SensorKind::Mute,
        SensorKind::Preset,
        SensorKind::Source,
        SensorKind::StormXt,
        SensorKind::UpmixerMode,
        SensorKind::Loudness,
        SensorKind::DolbyMode,
        SensorKind::Bass,
        SensorKind::Treble,
        SensorKind::Brightness,
        SensorKind::CenterEnhance,
        SensorKind::SurroundEnhance,
        SensorKind::LfeEnhance,
        SensorKind::AuroPreset,
        SensorKind::AuroStrength,
    ];

    /// Suffix used in the entity id
    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::VolumeDb => "volume_db",
            SensorKind::Mute => "mute",
            SensorKind::Preset => "preset",
            SensorKind::Source => "source",
            SensorKind::StormXt => "storm_xt",
            SensorKind::UpmixerMode => "upmixer",
            SensorKind::Loudness => "loudness",
            SensorKind::DolbyMode => "dolby_mode",
            SensorKind::Bass => "bass_db",
            SensorKind::Treble => "treble_db",
            SensorKind::Brightness => "brightness_db",
            SensorKind::CenterEnhance => "center_enhance_db",
            SensorKind::SurroundEnhance => "surround_enhance_db",
            SensorKind::LfeEnhance => "lfe_enhance_db",
            SensorKind::AuroPreset => "auro_preset",
            SensorKind::AuroStrength => "auro_strength",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SensorKind::VolumeDb => "Volume",
            SensorKind::Mute => "Mute",
            SensorKind::Preset => "Preset",
            SensorKind::Source => "Source",
            SensorKind::StormXt => "StormXT",
            SensorKind::UpmixerMode => "Upmixer",
            SensorKind::Loudness => "Loudness",
            SensorKind::DolbyMode => "Dolby mode",
            SensorKind::Bass => "Bass",
            SensorKind::Treble => "Treble",
            SensorKind::Brightness => "Brightness",
            SensorKind::CenterEnhance => "Center enhance",
            SensorKind::SurroundEnhance => "Surround enhance",
            SensorKind::LfeEnhance => "LFE enhance",
            SensorKind::AuroPreset => "Auro-Matic preset",
            SensorKind::AuroStrength => "Auro-Matic strength",
        }
    }

    /// Unit shown next to the value, if any
    pub fn unit(self) -> Option<&'static str> {
        match self {
            SensorKind::VolumeDb
            | SensorKind::Bass
            | SensorKind::Treble
            | SensorKind::Brightness
            | SensorKind::CenterEnhance
            | SensorKind::SurroundEnhance
            | SensorKind::LfeEnhance => Some("dB"),
            SensorKind::Mute | SensorKind::StormXt => Some("sound"),
            _ => None,
        }
    }

    fn value(self, attrs: &DeviceAttributes) -> Value {
        match self {
            SensorKind::VolumeDb => attrs.volume_db().to_string().into(),
            SensorKind::Mute => on_off(attrs.muted),
            SensorKind::Preset => opt(attrs.preset()),
            SensorKind::Source => opt(attrs.source()),
            SensorKind::StormXt => on_off(attrs.storm_xt_active),
            SensorKind::UpmixerMode => opt(attrs.actual_sound_mode()),
            SensorKind::Loudness => opt(attrs.loudness()),
            SensorKind::DolbyMode => opt(attrs.dolby_mode()),
            SensorKind::Bass => attrs.bass.to_string().into(),
            SensorKind::Treble => attrs.treble.to_string().into(),
            SensorKind::Brightness => attrs.brightness.to_string().into(),
            SensorKind::CenterEnhance => attrs.center_enhance.to_string().into(),
            SensorKind::SurroundEnhance => attrs.surround_enhance.to_string().into(),
            SensorKind::LfeEnhance => attrs.lfe_enhance.to_string().into(),
            SensorKind::AuroPreset => opt(attrs.auro_preset()),
            SensorKind::AuroStrength => opt(attrs.auro_strength.map(|n| n.to_string())),
        }
    }
}

/// Option pickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectKind {
    Preset,
    SoundMode,
    AuroPreset,
    AuroStrength,
}

impl SelectKind {
    pub const ALL: [SelectKind; 4] = [
        SelectKind::Preset,
        SelectKind::SoundMode,
        SelectKind::AuroPreset,
        SelectKind::AuroStrength,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SelectKind::Preset => "preset",
            SelectKind::SoundMode => "sound_mode",
            SelectKind::AuroPreset => "auro_preset",
            SelectKind::AuroStrength => "auro_strength",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SelectKind::Preset => "Preset",
            SelectKind::SoundMode => "Sound mode",
            SelectKind::AuroPreset => "Auro-Matic preset",
            SelectKind::AuroStrength => "Auro-Matic strength",
        }
    }

    /// Currently selected option, if it resolves
    pub fn current(self, attrs: &DeviceAttributes) -> Option<String> {
        match self {
            SelectKind::Preset => attrs.preset().map(str::to_string),
            SelectKind::SoundMode => attrs.actual_sound_mode().map(str::to_string),
            SelectKind::AuroPreset => attrs.auro_preset().map(str::to_string),
            SelectKind::AuroStrength => attrs.auro_strength.map(|n| n.to_string()),
        }
    }

    pub fn options(self, attrs: &DeviceAttributes) -> Vec<String> {
        match self {
            SelectKind::Preset => attrs.preset_list(),
            SelectKind::SoundMode => attrs.sound_mode_list(),
            SelectKind::AuroPreset => attrs.auro_preset_list(),
            SelectKind::AuroStrength => attrs.auro_strength_list(),
        }
    }
}

/// One UI entity backed by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    MediaPlayer,
    Remote,
    Sensor(SensorKind),
    Select(SelectKind),
}

impl Entity {
    /// Every entity of a device, in emission order
    pub fn all() -> impl Iterator<Item = Entity> {
        [Entity::MediaPlayer, Entity::Remote]
            .into_iter()
            .chain(SelectKind::ALL.into_iter().map(Entity::Select))
            .chain(SensorKind::ALL.into_iter().map(Entity::Sensor))
    }

    /// Entity id: `<type>.<device id>[.<sub type>]`
    pub fn id(self, device_id: &str) -> String {
        match self {
            Entity::MediaPlayer => format!("media_player.{}", device_id),
            Entity::Remote => format!("remote.{}", device_id),
            Entity::Sensor(kind) => format!("sensor.{}.{}", device_id, kind.as_str()),
            Entity::Select(kind) => format!("select.{}.{}", device_id, kind.as_str()),
        }
    }

    /// Inverse of [`Entity::id`] for ids of `device_id`
    pub fn from_id(device_id: &str, entity_id: &str) -> Option<Entity> {
        Entity::all().find(|entity| entity.id(device_id) == entity_id)
    }

    /// Display name, prefixed with the device name
    pub fn name(self, device_name: &str) -> String {
        match self {
            Entity::MediaPlayer | Entity::Remote => device_name.to_string(),
            Entity::Sensor(kind) => format!("{} Sensor: {}", device_name, kind.label()),
            Entity::Select(kind) => format!("{} Select: {}", device_name, kind.label()),
        }
    }

    /// Project `attrs` into this entity's attribute record
    pub fn project(self, attrs: &DeviceAttributes) -> Attributes {
        let mut out = Attributes::new();
        match self {
            Entity::MediaPlayer => {
                out.insert(attr::STATE.into(), attrs.state.as_str().into());
                out.insert(attr::SOURCE.into(), opt(attrs.source()));
                out.insert(attr::SOURCE_LIST.into(), json!(attrs.source_list()));
                out.insert(attr::SOUND_MODE.into(), opt(attrs.actual_sound_mode()));
                out.insert(attr::SOUND_MODE_LIST.into(), json!(attrs.sound_mode_list()));
                out.insert(attr::VOLUME.into(), attrs.volume.into());
                out.insert(attr::MUTED.into(), attrs.muted.into());
            }
            Entity::Remote => {
                out.insert(attr::STATE.into(), attrs.state.as_str().into());
            }
            Entity::Select(kind) => {
                out.insert(attr::STATE.into(), secondary_state(attrs.state).into());
                out.insert(attr::CURRENT_OPTION.into(), opt(kind.current(attrs)));
                out.insert(attr::OPTIONS.into(), json!(kind.options(attrs)));
            }
            Entity::Sensor(kind) => {
                out.insert(attr::STATE.into(), secondary_state(attrs.state).into());
                out.insert(attr::VALUE.into(), kind.value(attrs));
                if let Some(unit) = kind.unit() {
                    out.insert(attr::UNIT.into(), unit.into());
                }
            }
        }
        out
    }
}

/// Sensors and selects have nothing to show while the processor is off
fn secondary_state(state: PowerState) -> &'static str {
    match state {
        PowerState::Off => PowerState::Unavailable.as_str(),
        other => other.as_str(),
    }
}

fn on_off(flag: bool) -> Value {
    Value::from(if flag { "on" } else { "off" })
}

fn opt<S: Into<String>>(value: Option<S>) -> Value {
    value.map_or(Value::Null, |v| Value::String(v.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn populated() -> DeviceAttributes {
        DeviceAttributes {
            state: PowerState::On,
            volume: 55,
            muted: true,
            sources: [("BD-Player", 1), ("TV", 8)].into_iter().collect(),
            source_id: Some(8),
            presets: [("Default", 175)].into_iter().collect(),
            preset_id: Some(175),
            upmixer_mode_id: Some(2),
            actual_upmixer_mode_id: Some(0),
            bass: -3,
            ..Default::default()
        }
    }

    #[test]
    fn test_entity_ids() {
        assert_eq!(Entity::MediaPlayer.id("isp"), "media_player.isp");
        assert_eq!(Entity::Remote.id("isp"), "remote.isp");
        assert_eq!(Entity::Sensor(SensorKind::VolumeDb).id("isp"), "sensor.isp.volume_db");
        assert_eq!(Entity::Select(SelectKind::SoundMode).id("isp"), "select.isp.sound_mode");
        assert_eq!(Entity::all().count(), 22);
        assert_eq!(
            Entity::from_id("isp", "sensor.isp.bass_db"),
            Some(Entity::Sensor(SensorKind::Bass))
        );
        assert_eq!(Entity::from_id("isp", "sensor.other.bass_db"), None);
    }

    #[test]
    fn test_media_player_uses_actual_sound_mode() {
        let attrs = Entity::MediaPlayer.project(&populated());

        assert_eq!(attrs["state"], "ON");
        assert_eq!(attrs["source"], "TV");
        assert_eq!(attrs["source_list"], json!(["BD-Player", "TV"]));
        assert_eq!(attrs["sound_mode"], "Native");
        assert_eq!(attrs["volume"], 55);
        assert_eq!(attrs["muted"], true);
    }

    #[test]
    fn test_unresolved_source_projects_null() {
        let attrs = DeviceAttributes {
            source_id: Some(3),
            ..Default::default()
        };
        let projected = Entity::MediaPlayer.project(&attrs);
        assert_eq!(projected["source"], Value::Null);
        assert_eq!(projected["state"], "UNKNOWN");
    }

    #[rstest]
    #[case(SensorKind::VolumeDb, json!("-45"), Some("dB"))]
    #[case(SensorKind::Mute, json!("on"), Some("sound"))]
    #[case(SensorKind::Bass, json!("-3"), Some("dB"))]
    #[case(SensorKind::Source, json!("TV"), None)]
    #[case(SensorKind::Preset, json!("Default"), None)]
    #[case(SensorKind::UpmixerMode, json!("Native"), None)]
    #[case(SensorKind::DolbyMode, Value::Null, None)]
    fn test_sensor_values(
        #[case] kind: SensorKind,
        #[case] value: Value,
        #[case] unit: Option<&str>,
    ) {
        let attrs = Entity::Sensor(kind).project(&populated());
        assert_eq!(attrs["value"], value);
        assert_eq!(attrs.get("unit").and_then(Value::as_str), unit);
    }

    #[rstest]
    #[case(PowerState::On, "ON", "ON")]
    #[case(PowerState::Off, "OFF", "UNAVAILABLE")]
    #[case(PowerState::Unavailable, "UNAVAILABLE", "UNAVAILABLE")]
    #[case(PowerState::Unknown, "UNKNOWN", "UNKNOWN")]
    fn test_state_mapping(
        #[case] state: PowerState,
        #[case] primary: &str,
        #[case] secondary: &str,
    ) {
        let attrs = DeviceAttributes {
            state,
            ..Default::default()
        };
        assert_eq!(Entity::Remote.project(&attrs)["state"], primary);
        assert_eq!(Entity::Sensor(SensorKind::Mute).project(&attrs)["state"], secondary);
        assert_eq!(Entity::Select(SelectKind::Preset).project(&attrs)["state"], secondary);
    }

    #[test]
    fn test_auro_strength_select_offers_fifteen_steps() {
        let attrs = DeviceAttributes {
            auro_strength: Some(7),
            ..Default::default()
        };
        let projected = Entity::Select(SelectKind::AuroStrength).project(&attrs);
        assert_eq!(projected["current_option"], "7");
        assert_eq!(projected["options"].as_array().map(Vec::len), Some(15));
    }
}

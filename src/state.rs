use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Upmixer (surround) modes known to every ISP; not learned from the device
pub const UPMIXER_MODES: [(&str, i64); 5] = [
    ("Native", 0),
    ("Stereo Downmix", 1),
    ("Dolby Surround", 2),
    ("DTS Neural:X", 3),
    ("Auro-Matic", 4),
];

/// Auro-Matic room-size presets
pub const AURO_PRESETS: [(&str, i64); 4] =
    [("Small", 0), ("Medium", 1), ("Large", 2), ("Speech", 3)];

/// Highest Auro-Matic strength the processor accepts (lowest is 0)
pub const MAX_AURO_STRENGTH: i64 = 14;

/// Logical power state exposed upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PowerState {
    /// Nothing heard from the processor yet
    #[default]
    Unknown,
    /// The connection to the processor is gone
    Unavailable,
    /// Off, booting or shutting down
    Off,
    /// Fully operational
    On,
}

impl PowerState {
    /// Collapse a raw proc-state (0 off, 1 indeterminate, 2 on)
    ///
    /// Indeterminate covers both boot and shutdown, neither of which is
    /// operational, so it folds into `Off`.
    pub fn from_proc_state(raw: u8) -> Option<Self> {
        match raw {
            0 | 1 => Some(PowerState::Off),
            2 => Some(PowerState::On),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::Unknown => "UNKNOWN",
            PowerState::Unavailable => "UNAVAILABLE",
            PowerState::Off => "OFF",
            PowerState::On => "ON",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dolby upmixer flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DolbyMode {
    Off,
    Movie,
    Music,
    Night,
}

impl DolbyMode {
    pub const ALL: [DolbyMode; 4] = [
        DolbyMode::Off,
        DolbyMode::Movie,
        DolbyMode::Music,
        DolbyMode::Night,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            DolbyMode::Off => "Off",
            DolbyMode::Movie => "Movie",
            DolbyMode::Music => "Music",
            DolbyMode::Night => "Night",
        }
    }
}

/// Loudness compensation level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoudnessMode {
    Off,
    Low,
    Medium,
    Full,
}

impl LoudnessMode {
    pub const ALL: [LoudnessMode; 4] = [
        LoudnessMode::Off,
        LoudnessMode::Low,
        LoudnessMode::Medium,
        LoudnessMode::Full,
    ];

    pub fn id(self) -> i64 {
        self as i64
    }

    pub fn from_id(id: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.id() == id)
    }

    pub fn label(self) -> &'static str {
        match self {
            LoudnessMode::Off => "Off",
            LoudnessMode::Low => "Low",
            LoudnessMode::Medium => "Medium",
            LoudnessMode::Full => "Full",
        }
    }
}

/// Insertion-ordered name → id map, as pushed by the processor's bulk lists
///
/// Serializes as a JSON object in list order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedIds {
    entries: Vec<(String, i64)>,
}

impl NamedIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`, keeping its original position
    pub fn insert(&mut self, name: impl Into<String>, id: i64) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = id,
            None => self.entries.push((name, id)),
        }
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, id)| *id)
    }

    /// Reverse lookup: first name registered for `id`
    pub fn name_of(&self, id: i64) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, existing)| *existing == id)
            .map(|(name, _)| name.as_str())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.entries.iter().map(|(name, id)| (name.as_str(), *id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for NamedIds {
    fn from_iter<I: IntoIterator<Item = (S, i64)>>(iter: I) -> Self {
        let mut map = NamedIds::new();
        for (name, id) in iter {
            map.insert(name, id);
        }
        map
    }
}

impl Serialize for NamedIds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, id) in &self.entries {
            map.serialize_entry(name, id)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for NamedIds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NamedIdsVisitor;

        impl<'de> Visitor<'de> for NamedIdsVisitor {
            type Value = NamedIds;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of names to integer ids")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<NamedIds, A::Error> {
                let mut map = NamedIds::new();
                while let Some((name, id)) = access.next_entry::<String, i64>()? {
                    map.insert(name, id);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(NamedIdsVisitor)
    }
}

/// Snapshot of everything the driver knows about one processor
///
/// Written only by the read loop's decoder; everyone else reads copies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAttributes {
    pub state: PowerState,
    pub muted: bool,

    /// Absolute 0..=100 scale (device reports -100..=0 dB)
    pub volume: i32,

    pub sources: NamedIds,
    pub source_id: Option<i64>,

    pub presets: NamedIds,
    pub preset_id: Option<i64>,

    /// Mode requested via `ssp.surroundmode`
    pub upmixer_mode_id: Option<i64>,
    /// Mode the processor actually runs (`ssp.allowedmode`)
    pub actual_upmixer_mode_id: Option<i64>,

    // Tone controls, dB offsets
    pub bass: i64,
    pub treble: i64,
    pub brightness: i64,
    pub center_enhance: i64,
    pub surround_enhance: i64,
    pub lfe_enhance: i64,

    pub dolby_mode_id: Option<i64>,
    pub loudness_mode_id: Option<i64>,
    pub storm_xt_active: bool,

    pub auro_preset_id: Option<i64>,
    pub auro_strength: Option<i64>,
}

impl DeviceAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the current source; `None` while the source list lacks it
    pub fn source(&self) -> Option<&str> {
        self.source_id.and_then(|id| self.sources.name_of(id))
    }

    pub fn source_list(&self) -> Vec<String> {
        self.sources.names()
    }

    pub fn preset(&self) -> Option<&str> {
        self.preset_id.and_then(|id| self.presets.name_of(id))
    }

    pub fn preset_list(&self) -> Vec<String> {
        self.presets.names()
    }

    pub fn sound_mode(&self) -> Option<&'static str> {
        self.upmixer_mode_id.and_then(upmixer_mode_name)
    }

    pub fn actual_sound_mode(&self) -> Option<&'static str> {
        self.actual_upmixer_mode_id.and_then(upmixer_mode_name)
    }

    pub fn sound_mode_list(&self) -> Vec<String> {
        UPMIXER_MODES.iter().map(|(name, _)| name.to_string()).collect()
    }

    pub fn dolby_mode(&self) -> Option<&'static str> {
        self.dolby_mode_id
            .and_then(DolbyMode::from_id)
            .map(DolbyMode::label)
    }

    pub fn loudness(&self) -> Option<&'static str> {
        self.loudness_mode_id
            .and_then(LoudnessMode::from_id)
            .map(LoudnessMode::label)
    }

    pub fn auro_preset(&self) -> Option<&'static str> {
        self.auro_preset_id.and_then(|id| {
            AURO_PRESETS
                .iter()
                .find(|(_, preset)| *preset == id)
                .map(|(name, _)| *name)
        })
    }

    pub fn auro_preset_list(&self) -> Vec<String> {
        AURO_PRESETS.iter().map(|(name, _)| name.to_string()).collect()
    }

    pub fn auro_strength_list(&self) -> Vec<String> {
        (0..=MAX_AURO_STRENGTH).map(|n| n.to_string()).collect()
    }

    /// Volume on the device's relative dB scale
    pub fn volume_db(&self) -> i32 {
        self.volume - crate::protocol::MAX_VOLUME
    }
}

/// Id of an upmixer mode by display name
pub fn upmixer_mode_id(name: &str) -> Option<i64> {
    UPMIXER_MODES
        .iter()
        .find(|(mode, _)| *mode == name)
        .map(|(_, id)| *id)
}

fn upmixer_mode_name(id: i64) -> Option<&'static str> {
    UPMIXER_MODES
        .iter()
        .find(|(_, mode)| *mode == id)
        .map(|(name, _)| *name)
}

/// Id of an Auro-Matic preset by display name
pub fn auro_preset_id(name: &str) -> Option<i64> {
    AURO_PRESETS
        .iter()
        .find(|(preset, _)| *preset == name)
        .map(|(_, id)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_ids_keeps_insertion_order() {
        let mut sources = NamedIds::new();
        sources.insert("TV", 8);
        sources.insert("BD-Player", 1);
        sources.insert("TV", 9);

        assert_eq!(sources.names(), vec!["TV", "BD-Player"]);
        assert_eq!(sources.get("TV"), Some(9));
        assert_eq!(sources.name_of(1), Some("BD-Player"));
        assert_eq!(sources.name_of(42), None);
    }

    #[test]
    fn test_named_ids_serializes_as_ordered_object() {
        let presets: NamedIds = [("Default", 175), ("ARTopt", 246)].into_iter().collect();
        let json = serde_json::to_string(&presets).unwrap();
        assert_eq!(json, r#"{"Default":175,"ARTopt":246}"#);

        let back: NamedIds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, presets);
    }

    #[test]
    fn test_unresolved_ids_project_to_none() {
        let attrs = DeviceAttributes {
            source_id: Some(3),
            preset_id: Some(247),
            upmixer_mode_id: Some(99),
            dolby_mode_id: Some(7),
            ..Default::default()
        };

        assert_eq!(attrs.source(), None);
        assert_eq!(attrs.preset(), None);
        assert_eq!(attrs.sound_mode(), None);
        assert_eq!(attrs.dolby_mode(), None);
        assert_eq!(attrs.loudness(), None);
    }

    #[test]
    fn test_lookups_resolve_through_catalogues() {
        let attrs = DeviceAttributes {
            sources: [("BD-Player", 1), ("TV", 8)].into_iter().collect(),
            source_id: Some(8),
            upmixer_mode_id: Some(2),
            actual_upmixer_mode_id: Some(0),
            dolby_mode_id: Some(3),
            loudness_mode_id: Some(1),
            auro_preset_id: Some(3),
            ..Default::default()
        };

        assert_eq!(attrs.source(), Some("TV"));
        assert_eq!(attrs.sound_mode(), Some("Dolby Surround"));
        assert_eq!(attrs.actual_sound_mode(), Some("Native"));
        assert_eq!(attrs.dolby_mode(), Some("Night"));
        assert_eq!(attrs.loudness(), Some("Low"));
        assert_eq!(attrs.auro_preset(), Some("Speech"));
        assert_eq!(attrs.auro_strength_list().len(), 15);
    }

    #[test]
    fn test_proc_state_collapses_indeterminate_to_off() {
        assert_eq!(PowerState::from_proc_state(0), Some(PowerState::Off));
        assert_eq!(PowerState::from_proc_state(1), Some(PowerState::Off));
        assert_eq!(PowerState::from_proc_state(2), Some(PowerState::On));
        assert_eq!(PowerState::from_proc_state(3), None);
    }
}

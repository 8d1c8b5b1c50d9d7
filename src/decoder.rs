//! Protocol decoder - turns device lines into session state changes
//!
//! Lines are dispatched through an ordered rule table; the first rule whose
//! pattern fits wins. Order matters: `ssp.input.list.` must be tried before
//! `ssp.input.`, and `ssp.preset.` must exclude `ssp.preset.custom.`.

use crate::error::{Result, StormAudioError};
use crate::protocol::{as_int, parse_payload, relative_to_absolute, response, ToneControl};
use crate::state::{DeviceAttributes, NamedIds, PowerState};
use serde_json::Value;

/// Which bulk list a line belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    Sources,
    Presets,
}

/// What applying one line did to the session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Not a line the driver tracks
    Ignored,
    /// Consumed into a bulk-list accumulator; nothing visible yet
    Staged,
    /// State changed; attributes need re-projecting
    Changed,
    /// A bulk list was committed; re-project and persist it
    ListCommitted(ListKind),
}

impl Outcome {
    /// Whether consumers should receive fresh attributes
    pub fn should_project(self) -> bool {
        matches!(self, Outcome::Changed | Outcome::ListCommitted(_))
    }
}

#[derive(Debug, Clone, Copy)]
enum Pattern {
    Exact(&'static str),
    Prefix(&'static str),
    PrefixExcept(&'static str, &'static str),
}

impl Pattern {
    fn matches(self, line: &str) -> bool {
        match self {
            Pattern::Exact(pattern) => line == pattern,
            Pattern::Prefix(prefix) => line.starts_with(prefix),
            Pattern::PrefixExcept(prefix, excluded) => {
                line.starts_with(prefix) && !line.starts_with(excluded)
            }
        }
    }
}

type Handler = fn(&mut Decoder, &mut DeviceAttributes, &str) -> Result<Outcome>;

struct Rule {
    pattern: Pattern,
    handler: Handler,
}

const fn rule(pattern: Pattern, handler: Handler) -> Rule {
    Rule { pattern, handler }
}

static RULES: &[Rule] = &[
    rule(Pattern::Prefix(response::DOLBY_MODE), |_, attrs, line| {
        set_id(line, response::DOLBY_MODE, false, &mut attrs.dolby_mode_id)
    }),
    rule(Pattern::Exact(response::INPUT_LIST_START), |decoder, _, _| {
        decoder.pending_sources = Some(NamedIds::new());
        Ok(Outcome::Staged)
    }),
    rule(Pattern::Prefix(response::INPUT_LIST_ITEM), |decoder, _, line| {
        let (name, id) = list_item(line, response::INPUT_LIST_ITEM)?;
        decoder
            .pending_sources
            .get_or_insert_with(NamedIds::new)
            .insert(name, id);
        Ok(Outcome::Staged)
    }),
    rule(Pattern::Exact(response::INPUT_LIST_END), |decoder, attrs, _| {
        if let Some(sources) = decoder.pending_sources.take() {
            attrs.sources = sources;
        }
        Ok(Outcome::ListCommitted(ListKind::Sources))
    }),
    rule(Pattern::Prefix(response::INPUT), |_, attrs, line| {
        set_id(line, response::INPUT, true, &mut attrs.source_id)
    }),
    rule(Pattern::Prefix(response::LOUDNESS), |_, attrs, line| {
        set_id(line, response::LOUDNESS, false, &mut attrs.loudness_mode_id)
    }),
    rule(Pattern::Exact(response::MUTE_ON), |_, attrs, _| {
        attrs.muted = true;
        Ok(Outcome::Changed)
    }),
    rule(Pattern::Exact(response::MUTE_OFF), |_, attrs, _| {
        attrs.muted = false;
        Ok(Outcome::Changed)
    }),
    rule(Pattern::Exact(response::PRESET_LIST_START), |decoder, _, _| {
        decoder.pending_presets = Some(NamedIds::new());
        Ok(Outcome::Staged)
    }),
    rule(Pattern::Prefix(response::PRESET_LIST_ITEM), |decoder, _, line| {
        let (name, id) = list_item(line, response::PRESET_LIST_ITEM)?;
        decoder
            .pending_presets
            .get_or_insert_with(NamedIds::new)
            .insert(name, id);
        Ok(Outcome::Staged)
    }),
    rule(Pattern::Exact(response::PRESET_LIST_END), |decoder, attrs, _| {
        if let Some(presets) = decoder.pending_presets.take() {
            attrs.presets = presets;
        }
        Ok(Outcome::ListCommitted(ListKind::Presets))
    }),
    rule(
        Pattern::PrefixExcept(response::PRESET, response::PRESET_CUSTOM),
        |_, attrs, line| set_id(line, response::PRESET, true, &mut attrs.preset_id),
    ),
    rule(Pattern::Exact(response::PROC_STATE_OFF), |_, attrs, _| {
        set_power(attrs, 0)
    }),
    rule(Pattern::Exact(response::PROC_STATE_INDETERMINATE), |_, attrs, _| {
        set_power(attrs, 1)
    }),
    rule(Pattern::Exact(response::PROC_STATE_ON), |_, attrs, _| {
        set_power(attrs, 2)
    }),
    rule(Pattern::Exact(response::STORM_XT_ON), |_, attrs, _| {
        attrs.storm_xt_active = true;
        Ok(Outcome::Changed)
    }),
    rule(Pattern::Exact(response::STORM_XT_OFF), |_, attrs, _| {
        attrs.storm_xt_active = false;
        Ok(Outcome::Changed)
    }),
    rule(Pattern::Prefix(response::SURROUND_MODE), |_, attrs, line| {
        set_id(line, response::SURROUND_MODE, true, &mut attrs.upmixer_mode_id)
    }),
    rule(Pattern::Prefix(response::ALLOWED_MODE), |_, attrs, line| {
        set_id(line, response::ALLOWED_MODE, true, &mut attrs.actual_upmixer_mode_id)
    }),
    rule(Pattern::Prefix(response::VOLUME), |_, attrs, line| {
        let Some(values) = parse_payload(line, response::VOLUME, false)? else {
            return Ok(Outcome::Ignored);
        };
        let volume = values
            .first()
            .and_then(Value::as_f64)
            .filter(|volume| volume.is_finite())
            .ok_or_else(|| StormAudioError::malformed(line, "volume is not a number"))?;
        attrs.volume = relative_to_absolute(volume);
        Ok(Outcome::Changed)
    }),
    rule(Pattern::Prefix("ssp.bass."), |_, attrs, line| {
        set_tone(line, ToneControl::Bass, &mut attrs.bass)
    }),
    rule(Pattern::Prefix("ssp.treble."), |_, attrs, line| {
        set_tone(line, ToneControl::Treble, &mut attrs.treble)
    }),
    rule(Pattern::Prefix("ssp.brightness."), |_, attrs, line| {
        set_tone(line, ToneControl::Brightness, &mut attrs.brightness)
    }),
    rule(Pattern::Prefix("ssp.c_en."), |_, attrs, line| {
        set_tone(line, ToneControl::CenterEnhance, &mut attrs.center_enhance)
    }),
    rule(Pattern::Prefix("ssp.s_en."), |_, attrs, line| {
        set_tone(line, ToneControl::SurroundEnhance, &mut attrs.surround_enhance)
    }),
    rule(Pattern::Prefix("ssp.lfe_en."), |_, attrs, line| {
        set_tone(line, ToneControl::LfeEnhance, &mut attrs.lfe_enhance)
    }),
    rule(Pattern::Prefix(response::AURO_PRESET), |_, attrs, line| {
        set_id(line, response::AURO_PRESET, false, &mut attrs.auro_preset_id)
    }),
    rule(Pattern::Prefix(response::AURO_STRENGTH), |_, attrs, line| {
        set_id(line, response::AURO_STRENGTH, false, &mut attrs.auro_strength)
    }),
];

/// Stateful line decoder for one connection
///
/// Holds the bulk-list accumulators so a half-received list never reaches
/// [`DeviceAttributes`]; the live map is swapped in wholesale on `*.end`.
#[derive(Debug, Default)]
pub struct Decoder {
    pending_sources: Option<NamedIds>,
    pending_presets: Option<NamedIds>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line to `attrs`.
    ///
    /// On error `attrs` is untouched and any list accumulation in progress
    /// carries on with the next line.
    pub fn apply(&mut self, attrs: &mut DeviceAttributes, line: &str) -> Result<Outcome> {
        match RULES.iter().find(|rule| rule.pattern.matches(line)) {
            Some(rule) => (rule.handler)(self, attrs, line),
            None => Ok(Outcome::Ignored),
        }
    }
}

fn set_power(attrs: &mut DeviceAttributes, raw: u8) -> Result<Outcome> {
    if let Some(state) = PowerState::from_proc_state(raw) {
        attrs.state = state;
    }
    Ok(Outcome::Changed)
}

fn set_id(line: &str, prefix: &str, repair: bool, slot: &mut Option<i64>) -> Result<Outcome> {
    let Some(values) = parse_payload(line, prefix, repair)? else {
        return Ok(Outcome::Ignored);
    };
    let id = values
        .first()
        .and_then(as_int)
        .ok_or_else(|| StormAudioError::malformed(line, "expected a numeric id"))?;
    *slot = Some(id);
    Ok(Outcome::Changed)
}

fn set_tone(line: &str, control: ToneControl, slot: &mut i64) -> Result<Outcome> {
    let Some(values) = parse_payload(line, control.response_prefix(), false)? else {
        return Ok(Outcome::Ignored);
    };
    *slot = values
        .first()
        .and_then(as_int)
        .ok_or_else(|| StormAudioError::malformed(line, "expected a dB offset"))?;
    Ok(Outcome::Changed)
}

/// `["Name", id, ...tail]` → `(name, id)`; the tail is ignored
fn list_item(line: &str, prefix: &str) -> Result<(String, i64)> {
    let values = parse_payload(line, prefix, true)?
        .ok_or_else(|| StormAudioError::malformed(line, "list item is not bracketed"))?;

    match values.as_slice() {
        [Value::String(name), id, ..] => {
            let id = as_int(id)
                .ok_or_else(|| StormAudioError::malformed(line, "list item id is not a number"))?;
            Ok((name.clone(), id))
        }
        _ => Err(StormAudioError::malformed(line, "expected [name, id, ...]")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn feed(lines: &[&str]) -> (DeviceAttributes, Vec<Outcome>) {
        let mut decoder = Decoder::new();
        let mut attrs = DeviceAttributes::new();
        let outcomes = lines
            .iter()
            .map(|line| decoder.apply(&mut attrs, line).unwrap())
            .collect();
        (attrs, outcomes)
    }

    #[test]
    fn test_latest_proc_state_wins() {
        let (attrs, _) = feed(&["ssp.procstate.[1]", "ssp.procstate.[2]"]);
        assert_eq!(attrs.state, PowerState::On);

        let (attrs, _) = feed(&["ssp.procstate.[2]", "ssp.procstate.[1]"]);
        assert_eq!(attrs.state, PowerState::Off);
    }

    #[test]
    fn test_source_list_commits_once_on_end() {
        let (attrs, outcomes) = feed(&[
            "ssp.input.start",
            r#"ssp.input.list.["BD-Player", 1, 1, 1, 0, 0, 0.0, 0]"#,
            r#"ssp.input.list.["TV", 8, 0, 23, 0, 0, 0.0, 0]"#,
            "ssp.input.end",
        ]);

        let expected: NamedIds = [("BD-Player", 1), ("TV", 8)].into_iter().collect();
        assert_eq!(attrs.sources, expected);

        let projections: Vec<bool> = outcomes.iter().map(|o| o.should_project()).collect();
        assert_eq!(projections, vec![false, false, false, true]);
        assert_eq!(outcomes[3], Outcome::ListCommitted(ListKind::Sources));
    }

    #[test]
    fn test_partial_list_is_not_visible() {
        let mut decoder = Decoder::new();
        let mut attrs = DeviceAttributes {
            sources: [("Old", 5)].into_iter().collect(),
            ..Default::default()
        };

        decoder.apply(&mut attrs, "ssp.input.start").unwrap();
        decoder
            .apply(&mut attrs, r#"ssp.input.list.["TV", 8, 0]"#)
            .unwrap();
        assert_eq!(attrs.sources.names(), vec!["Old"]);

        decoder.apply(&mut attrs, "ssp.input.end").unwrap();
        assert_eq!(attrs.sources.names(), vec!["TV"]);
    }

    #[test]
    fn test_preset_list_with_malformed_quotes() {
        let (attrs, _) = feed(&[
            "ssp.preset.start",
            r#"ssp.preset.list.["Default", 175, "["1"]", 0, 0, 0, 0, 0]"#,
            r#"ssp.preset.list.["ARTopt-LW", 247, "["1"]", 0, 0, 0, 0, 0]"#,
            "ssp.preset.end",
            "ssp.preset.[247]",
        ]);

        assert_eq!(attrs.presets.get("ARTopt-LW"), Some(247));
        assert_eq!(attrs.preset(), Some("ARTopt-LW"));
    }

    #[test]
    fn test_bad_list_item_is_skipped_without_aborting_the_list() {
        let mut decoder = Decoder::new();
        let mut attrs = DeviceAttributes::new();

        decoder.apply(&mut attrs, "ssp.input.start").unwrap();
        decoder.apply(&mut attrs, r#"ssp.input.list.["TV", 8]"#).unwrap();
        let err = decoder
            .apply(&mut attrs, r#"ssp.input.list.[8, "TV"]"#)
            .unwrap_err();
        assert!(matches!(err, StormAudioError::MalformedPayload { .. }));
        decoder.apply(&mut attrs, r#"ssp.input.list.["Roon", 10]"#).unwrap();
        decoder.apply(&mut attrs, "ssp.input.end").unwrap();

        assert_eq!(attrs.sources.names(), vec!["TV", "Roon"]);
    }

    #[test]
    fn test_custom_preset_line_is_not_a_preset_id() {
        let (attrs, outcomes) = feed(&["ssp.preset.[247]", "ssp.preset.custom.off"]);
        assert_eq!(attrs.preset_id, Some(247));
        assert_eq!(outcomes[1], Outcome::Ignored);
    }

    #[test]
    fn test_volume_is_rescaled_to_absolute() {
        let (attrs, _) = feed(&["ssp.vol.[-55.0]"]);
        assert_eq!(attrs.volume, 45);
        assert_eq!(attrs.volume_db(), -55);
    }

    #[rstest]
    #[case("ssp.vol.[1e10]", 100)]
    #[case("ssp.vol.[-1e10]", 0)]
    #[case("ssp.vol.[12.0]", 100)]
    fn test_out_of_range_volume_is_clamped(#[case] line: &str, #[case] expected: i32) {
        let (attrs, outcomes) = feed(&[line, "ssp.mute.on"]);
        assert_eq!(outcomes, vec![Outcome::Changed, Outcome::Changed]);
        assert_eq!(attrs.volume, expected);
        assert!(attrs.muted);
    }

    #[test]
    fn test_unparseable_volume_is_malformed() {
        let mut decoder = Decoder::new();
        let mut attrs = DeviceAttributes::new();
        let err = decoder.apply(&mut attrs, "ssp.vol.[1e999]").unwrap_err();
        assert!(matches!(err, StormAudioError::MalformedPayload { .. }));
        assert_eq!(attrs, DeviceAttributes::new());
    }

    #[test]
    fn test_requested_and_actual_upmixer_modes_are_tracked_separately() {
        let (attrs, _) = feed(&["ssp.surroundmode.[2]", "ssp.allowedmode.[0]"]);
        assert_eq!(attrs.sound_mode(), Some("Dolby Surround"));
        assert_eq!(attrs.actual_sound_mode(), Some("Native"));
    }

    #[rstest]
    #[case("ssp.bass.[3]", 3, 0, 0)]
    #[case("ssp.treble.[-2]", 0, -2, 0)]
    #[case("ssp.lfe_en.[4]", 0, 0, 4)]
    fn test_tone_offsets(
        #[case] line: &str,
        #[case] bass: i64,
        #[case] treble: i64,
        #[case] lfe: i64,
    ) {
        let (attrs, outcomes) = feed(&[line]);
        assert_eq!(outcomes, vec![Outcome::Changed]);
        assert_eq!((attrs.bass, attrs.treble, attrs.lfe_enhance), (bass, treble, lfe));
    }

    #[test]
    fn test_mode_and_toggle_lines() {
        let (attrs, _) = feed(&[
            "ssp.mute.on",
            "ssp.stormxt.on",
            "ssp.dolbymode.[1]",
            "ssp.loudness.[3]",
            "ssp.auropreset.[2]",
            "ssp.aurostrength.[12]",
            "ssp.c_en.[1]",
            "ssp.s_en.[-1]",
            "ssp.brightness.[2]",
        ]);

        assert!(attrs.muted);
        assert!(attrs.storm_xt_active);
        assert_eq!(attrs.dolby_mode(), Some("Movie"));
        assert_eq!(attrs.loudness(), Some("Full"));
        assert_eq!(attrs.auro_preset(), Some("Large"));
        assert_eq!(attrs.auro_strength, Some(12));
        assert_eq!(
            (attrs.center_enhance, attrs.surround_enhance, attrs.brightness),
            (1, -1, 2)
        );
    }

    #[rstest]
    #[case("ssp.frontpanel.color.[white]")]
    #[case("ssp.volume.[-45.0]")]
    #[case("ssp.inputZone2.[0]")]
    #[case("ssp.preset.next")]
    #[case("ssp.treb.[1]")]
    #[case("")]
    fn test_unknown_lines_change_nothing(#[case] line: &str) {
        let mut decoder = Decoder::new();
        let mut attrs = DeviceAttributes::new();
        let outcome = decoder.apply(&mut attrs, line).unwrap();

        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(attrs, DeviceAttributes::new());
    }
}

//! Preset documents.
//!
//! ```json
//! {
//!   "name": "Glass Pad",
//!   "parameters": { "10": 500.0, "30": 0.25 },
//!   "midiCcMappings": { "7": 10 },
//!   "xyPad": { "x": 10, "y": 11 },
//!   "automationTracks": {
//!     "10": [ { "parameterId": 10, "value": 800.0, "timestamp": 0.5 } ]
//!   }
//! }
//! ```
//!
//! Import is tolerant per entry: a bad key or value is skipped with a
//! warning and the rest of the document still applies. Only a document
//! that is not JSON at all (or whose root is not an object) fails.

use std::collections::BTreeMap;

use log::warn;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::automation::{AutomationEvent, AutomationTracks};
use crate::error::PresetError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Preset {
    pub name: String,
    pub parameters: BTreeMap<i32, f32>,
    /// `None` when the document has no `midiCcMappings` key, which leaves
    /// the engine's table alone on import. `Some` replaces it.
    pub midi_cc_mappings: Option<BTreeMap<u8, i32>>,
    /// `None` when the document has no `automationTracks` key. On import
    /// `Some` replaces the engine's tracks wholesale.
    pub automation_tracks: Option<AutomationTracks>,
    /// Parameters the XY pad axes drive. `None` leaves the engine's pad
    /// assignment alone on import.
    pub xy_pad: Option<XyPadTargets>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct XyPadTargets {
    pub x: i32,
    pub y: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PresetFile<'a> {
    name: &'a str,
    parameters: &'a BTreeMap<i32, f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    midi_cc_mappings: Option<&'a BTreeMap<u8, i32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    automation_tracks: Option<&'a AutomationTracks>,
    #[serde(skip_serializing_if = "Option::is_none")]
    xy_pad: Option<XyPadTargets>,
}

impl Preset {
    pub fn to_json(&self) -> Result<String, PresetError> {
        let file = PresetFile {
            name: &self.name,
            parameters: &self.parameters,
            midi_cc_mappings: self.midi_cc_mappings.as_ref(),
            automation_tracks: self
                .automation_tracks
                .as_ref()
                .filter(|tracks| !tracks.is_empty()),
            xy_pad: self.xy_pad,
        };
        serde_json::to_string_pretty(&file).map_err(PresetError::Serialize)
    }

    pub fn from_json(json: &str) -> Result<Self, PresetError> {
        let root: Value = serde_json::from_str(json).map_err(PresetError::Parse)?;
        let Value::Object(root) = root else {
            return Err(PresetError::NotAnObject);
        };

        let name = match root.get("name") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                warn!("preset name is not a string: {other}");
                String::new()
            }
            None => String::new(),
        };

        let parameters = section(&root, "parameters")
            .map(parse_parameters)
            .unwrap_or_default();
        let midi_cc_mappings = section(&root, "midiCcMappings").map(parse_cc_mappings);
        let automation_tracks = section(&root, "automationTracks").map(parse_tracks);
        let xy_pad = section(&root, "xyPad").and_then(parse_xy_pad);

        Ok(Self {
            name,
            parameters,
            midi_cc_mappings,
            automation_tracks,
            xy_pad,
        })
    }
}

fn section<'a>(root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
    match root.get(key)? {
        Value::Object(map) => Some(map),
        other => {
            warn!("preset section {key:?} is not an object ({other}), skipped");
            None
        }
    }
}

fn parse_parameters(map: &Map<String, Value>) -> BTreeMap<i32, f32> {
    let mut parameters = BTreeMap::new();
    for (key, value) in map {
        let Ok(id) = key.parse::<i32>() else {
            warn!("invalid parameter id {key:?} in preset, skipped");
            continue;
        };
        match value.as_f64() {
            Some(v) if v.is_finite() => {
                parameters.insert(id, v as f32);
            }
            _ => warn!("invalid value {value} for parameter {id} in preset, skipped"),
        }
    }
    parameters
}

fn parse_cc_mappings(map: &Map<String, Value>) -> BTreeMap<u8, i32> {
    let mut mappings = BTreeMap::new();
    for (key, value) in map {
        let cc = match key.parse::<u8>() {
            Ok(cc) if cc < 128 => cc,
            _ => {
                warn!("invalid MIDI CC number {key:?} in preset, skipped");
                continue;
            }
        };
        match value.as_i64().and_then(|v| i32::try_from(v).ok()) {
            Some(id) => {
                mappings.insert(cc, id);
            }
            None => warn!("invalid parameter id {value} for CC {cc} in preset, skipped"),
        }
    }
    mappings
}

fn parse_xy_pad(map: &Map<String, Value>) -> Option<XyPadTargets> {
    let axis = |key: &str| {
        let id = map
            .get(key)
            .and_then(Value::as_i64)
            .and_then(|v| i32::try_from(v).ok());
        if id.is_none() {
            warn!("invalid or missing XY pad target {key:?} in preset, skipped");
        }
        id
    };
    Some(XyPadTargets {
        x: axis("x")?,
        y: axis("y")?,
    })
}

fn parse_tracks(map: &Map<String, Value>) -> AutomationTracks {
    let mut tracks = AutomationTracks::new();
    for (key, value) in map {
        let Ok(id) = key.parse::<i32>() else {
            warn!("invalid automation track id {key:?} in preset, skipped");
            continue;
        };
        let Value::Array(events) = value else {
            warn!("automation track {id} is not an array, skipped");
            continue;
        };

        let mut track = Vec::with_capacity(events.len());
        for raw in events {
            match serde_json::from_value::<AutomationEvent>(raw.clone()) {
                Ok(event) if event.parameter_id == id && event.timestamp.is_finite() => {
                    track.push(event)
                }
                Ok(event) => warn!(
                    "automation event {event:?} does not belong to track {id}, skipped"
                ),
                Err(err) => warn!("malformed automation event in track {id}: {err}"),
            }
        }
        if !track.is_empty() {
            tracks.insert(id, track);
        }
    }
    tracks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_uses_string_keys() {
        let mut preset = Preset {
            name: "Test".into(),
            ..Preset::default()
        };
        preset.parameters.insert(10, 500.0);
        preset.midi_cc_mappings = Some(BTreeMap::from([(7, 10)]));

        let json = preset.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["name"], "Test");
        assert_eq!(value["parameters"]["10"], 500.0);
        assert_eq!(value["midiCcMappings"]["7"], 10);
        assert!(value.get("automationTracks").is_none());
    }

    #[test]
    fn import_skips_bad_entries() {
        let json = r#"{
            "name": "Messy",
            "parameters": { "10": 500.0, "abc": 1.0, "11": "loud", "30": 0.25 },
            "midiCcMappings": { "7": 10, "300": 11, "1": "x" }
        }"#;
        let preset = Preset::from_json(json).unwrap();
        assert_eq!(preset.name, "Messy");
        assert_eq!(preset.parameters.len(), 2);
        assert_eq!(preset.parameters[&10], 500.0);
        assert_eq!(preset.parameters[&30], 0.25);
        let mappings = preset.midi_cc_mappings.unwrap();
        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[&7], 10);
        assert!(preset.automation_tracks.is_none());
    }

    #[test]
    fn missing_sections_stay_none() {
        let preset = Preset::from_json(r#"{ "name": "Bare" }"#).unwrap();
        assert!(preset.parameters.is_empty());
        assert!(preset.midi_cc_mappings.is_none());
        assert!(preset.automation_tracks.is_none());

        let json = preset.to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("midiCcMappings").is_none());
    }

    #[test]
    fn xy_pad_targets_need_both_axes() {
        let preset = Preset::from_json(r#"{ "xyPad": { "x": 30, "y": 31 } }"#).unwrap();
        assert_eq!(preset.xy_pad, Some(XyPadTargets { x: 30, y: 31 }));

        let preset = Preset::from_json(r#"{ "xyPad": { "x": 30, "y": "up" } }"#).unwrap();
        assert!(preset.xy_pad.is_none());
    }

    #[test]
    fn import_fails_on_unparseable_document() {
        assert!(matches!(Preset::from_json("{ not json"), Err(PresetError::Parse(_))));
        assert!(matches!(Preset::from_json("[1, 2]"), Err(PresetError::NotAnObject)));
    }

    #[test]
    fn automation_tracks_round_trip() {
        let mut tracks = AutomationTracks::new();
        tracks.insert(
            10,
            vec![AutomationEvent {
                parameter_id: 10,
                value: 800.0,
                timestamp: 0.5,
            }],
        );
        let preset = Preset {
            name: "Moving".into(),
            automation_tracks: Some(tracks.clone()),
            ..Preset::default()
        };

        let loaded = Preset::from_json(&preset.to_json().unwrap()).unwrap();
        assert_eq!(loaded.automation_tracks, Some(tracks));
    }

    #[test]
    fn mismatched_automation_events_are_dropped() {
        let json = r#"{
            "automationTracks": {
                "10": [
                    { "parameterId": 10, "value": 1.0, "timestamp": 0.1 },
                    { "parameterId": 11, "value": 2.0, "timestamp": 0.2 },
                    { "value": 3.0 }
                ]
            }
        }"#;
        let preset = Preset::from_json(json).unwrap();
        let tracks = preset.automation_tracks.unwrap();
        assert_eq!(tracks[&10].len(), 1);
    }
}

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::DmmError;

/// Electrical quantity a meter is configured to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    VoltsDc,
    VoltsAc,
    CurrentDc,
    CurrentAc,
    Resistance,
    #[serde(rename = "resistance_4w")]
    Resistance4w,
    Frequency,
    Period,
    Temperature,
    Diode,
    Continuity,
    Capacitance,
}

impl Mode {
    pub const ALL: [Mode; 12] = [
        Mode::VoltsDc,
        Mode::VoltsAc,
        Mode::CurrentDc,
        Mode::CurrentAc,
        Mode::Resistance,
        Mode::Resistance4w,
        Mode::Frequency,
        Mode::Period,
        Mode::Temperature,
        Mode::Diode,
        Mode::Continuity,
        Mode::Capacitance,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Mode::VoltsDc => "volts_dc",
            Mode::VoltsAc => "volts_ac",
            Mode::CurrentDc => "current_dc",
            Mode::CurrentAc => "current_ac",
            Mode::Resistance => "resistance",
            Mode::Resistance4w => "resistance_4w",
            Mode::Frequency => "frequency",
            Mode::Period => "period",
            Mode::Temperature => "temperature",
            Mode::Diode => "diode",
            Mode::Continuity => "continuity",
            Mode::Capacitance => "capacitance",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Mode {
    type Err = DmmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Mode::ALL
            .into_iter()
            .find(|mode| mode.name() == wanted)
            .ok_or_else(|| DmmError::UnknownMode {
                mode: s.to_string(),
                allowed: Mode::ALL.map(Mode::name).join(","),
            })
    }
}

/// Supported meter families. Each carries its own capability table,
/// status query set and command prefix conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstrumentFamily {
    /// Keysight 34460A / 34461A, usually attached over USB-VISA
    #[serde(rename = "ks34460a")]
    Keysight34460A,
    /// Siglent SDM3055, raw SCPI over TCP port 5025
    #[serde(rename = "sdm3055")]
    SiglentSdm3055,
}

impl fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstrumentFamily::Keysight34460A => f.write_str("Keysight 34460A"),
            InstrumentFamily::SiglentSdm3055 => f.write_str("Siglent SDM3055"),
        }
    }
}

/// Result of a read: one reading or a series in acquisition order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Measurement {
    Single(f64),
    Series(Vec<f64>),
}

impl Measurement {
    pub fn values(&self) -> &[f64] {
        match self {
            Measurement::Single(value) => std::slice::from_ref(value),
            Measurement::Series(values) => values,
        }
    }
}

/// Raw answers to the family's status queries, kept in query order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusRecord {
    entries: Vec<(String, String)>,
}

impl StatusRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for StatusRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_names_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(mode.name().parse::<Mode>().unwrap(), mode);
        }
        assert_eq!("VOLTS_DC".parse::<Mode>().unwrap(), Mode::VoltsDc);
    }

    #[test]
    fn test_unknown_mode_lists_choices() {
        let err = "ohms".parse::<Mode>().unwrap_err();
        match err {
            DmmError::UnknownMode { mode, allowed } => {
                assert_eq!(mode, "ohms");
                assert!(allowed.contains("resistance_4w"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_status_record_keeps_order_in_json() {
        let mut status = StatusRecord::new();
        status.insert("identity", "KEYSIGHT,34460A");
        status.insert("mode", "VOLT +1.0E+01");
        status.insert("sample_count", "+1");

        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(
            json,
            r#"{"identity":"KEYSIGHT,34460A","mode":"VOLT +1.0E+01","sample_count":"+1"}"#
        );
        assert_eq!(status.get("mode"), Some("VOLT +1.0E+01"));
        assert_eq!(status.get("sense"), None);
    }

    #[test]
    fn test_measurement_serializes_untagged() {
        assert_eq!(serde_json::to_string(&Measurement::Single(1.5)).unwrap(), "1.5");
        assert_eq!(
            serde_json::to_string(&Measurement::Series(vec![1.0, 2.0])).unwrap(),
            "[1.0,2.0]"
        );
    }
}

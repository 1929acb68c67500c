//! Validated SCPI command sequences.
//!
//! The builder only produces strings; the client writes them. Every check
//! runs before the first command is produced, so a rejected request never
//! reaches the instrument.

use crate::capability::{CapabilityTable, ModeDescriptor};
use crate::error::DmmError;
use crate::types::{InstrumentFamily, Mode};

pub const READ_QUERY: &str = "READ?";
pub const SAMPLE_COUNT_QUERY: &str = "SAMP:COUN?";

#[derive(Debug, Clone, Copy)]
pub struct CommandBuilder {
    table: &'static CapabilityTable,
}

impl CommandBuilder {
    pub fn new(family: InstrumentFamily) -> Self {
        Self {
            table: family.capabilities(),
        }
    }

    pub fn table(&self) -> &'static CapabilityTable {
        self.table
    }

    /// Commands selecting `mode`, optionally with a range and an NPLC value.
    ///
    /// `auto` turns on autoranging instead of fixing a range.
    pub fn configure(
        &self,
        mode: Mode,
        range: Option<&str>,
        nplc: Option<&str>,
    ) -> Result<Vec<String>, DmmError> {
        let descriptor = self.table.describe(mode)?;

        let range = range
            .map(|value| validated_range(descriptor, value))
            .transpose()?;
        let nplc = nplc
            .map(|value| validated_nplc(descriptor, value))
            .transpose()?;

        let stem = descriptor.stem;
        let mut commands = vec![format!("CONF:{stem}")];
        match range {
            Some("auto") => commands.push(format!("{stem}:RANG:AUTO ON")),
            Some(value) => commands.push(format!("{stem}:RANG {value}")),
            None => {}
        }
        if let Some(value) = nplc {
            commands.push(format!("{}{stem}:NPLC {value}", self.table.nplc_prefix));
        }
        Ok(commands)
    }

    /// [`configure`](Self::configure) followed by an optional bandwidth
    /// filter, validated as a whole before any command is produced
    pub fn configure_with_bandwidth(
        &self,
        mode: Mode,
        range: Option<&str>,
        nplc: Option<&str>,
        bandwidth: Option<&str>,
    ) -> Result<Vec<String>, DmmError> {
        let bandwidth = bandwidth
            .map(|value| self.bandwidth(mode, value))
            .transpose()?;
        let mut commands = self.configure(mode, range, nplc)?;
        commands.extend(bandwidth);
        Ok(commands)
    }

    pub fn bandwidth(&self, mode: Mode, value: &str) -> Result<String, DmmError> {
        let descriptor = self.table.describe(mode)?;
        if descriptor.bandwidth.is_none() {
            return Err(DmmError::BandwidthUnsupported(mode.name().to_string()));
        }
        let token = descriptor
            .canonical_bandwidth(value)
            .ok_or_else(|| DmmError::InvalidBandwidth {
                mode: mode.name().to_string(),
                value: value.to_string(),
                allowed: joined(descriptor.bandwidth),
            })?;
        Ok(format!("{}:BAND {token}", descriptor.stem))
    }

    pub fn reset(&self) -> Vec<String> {
        self.table
            .reset_commands
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    pub fn single_sample(&self) -> String {
        "SAMP:COUN 1".to_string()
    }

    /// Setup written before every multi-sample read
    pub fn multi_sample(&self, count: u32) -> Result<Vec<String>, DmmError> {
        if count == 0 {
            return Err(DmmError::InvalidArgument(
                "sample count must be at least 1".to_string(),
            ));
        }
        Ok(vec![
            format!("SAMP:COUN {count}"),
            "TRIG:COUN 1".to_string(),
            "TRIG:DEL 0".to_string(),
            "TRIG:SOUR IMM".to_string(),
        ])
    }
}

fn validated_range(descriptor: &ModeDescriptor, value: &str) -> Result<&'static str, DmmError> {
    descriptor
        .canonical_range(value)
        .ok_or_else(|| DmmError::InvalidRange {
            mode: descriptor.mode.name().to_string(),
            value: value.to_lowercase(),
            allowed: joined(descriptor.ranges),
        })
}

fn validated_nplc(descriptor: &ModeDescriptor, value: &str) -> Result<&'static str, DmmError> {
    if descriptor.nplc.is_none() {
        return Err(DmmError::NplcUnsupported(descriptor.mode.name().to_string()));
    }
    descriptor
        .canonical_nplc(value)
        .ok_or_else(|| DmmError::InvalidNplc {
            mode: descriptor.mode.name().to_string(),
            value: value.to_string(),
            allowed: joined(descriptor.nplc),
        })
}

fn joined(set: Option<&'static [&'static str]>) -> String {
    match set {
        Some(values) if !values.is_empty() => values.join(","),
        _ => "(none)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keysight() -> CommandBuilder {
        CommandBuilder::new(InstrumentFamily::Keysight34460A)
    }

    fn siglent() -> CommandBuilder {
        CommandBuilder::new(InstrumentFamily::SiglentSdm3055)
    }

    #[test]
    fn test_mode_only_emits_single_command() {
        for builder in [keysight(), siglent()] {
            for descriptor in builder.table().modes {
                let commands = builder.configure(descriptor.mode, None, None).unwrap();
                assert_eq!(commands, vec![format!("CONF:{}", descriptor.stem)]);
            }
        }
    }

    #[test]
    fn test_concrete_range_emits_rang() {
        for builder in [keysight(), siglent()] {
            for descriptor in builder.table().modes {
                for range in descriptor.ranges.unwrap_or(&[]) {
                    if *range == "auto" {
                        continue;
                    }
                    let commands = builder
                        .configure(descriptor.mode, Some(*range), None)
                        .unwrap();
                    assert_eq!(
                        commands,
                        vec![
                            format!("CONF:{}", descriptor.stem),
                            format!("{}:RANG {}", descriptor.stem, range),
                        ]
                    );
                }
            }
        }
    }

    #[test]
    fn test_auto_range() {
        let commands = keysight()
            .configure(Mode::CurrentDc, Some("AUTO"), None)
            .unwrap();
        assert_eq!(commands, vec!["CONF:CURR:DC", "CURR:DC:RANG:AUTO ON"]);
    }

    #[test]
    fn test_bogus_range_rejected() {
        let err = keysight()
            .configure(Mode::VoltsDc, Some("bogus"), None)
            .unwrap_err();
        match err {
            DmmError::InvalidRange { value, allowed, .. } => {
                assert_eq!(value, "bogus");
                assert!(allowed.contains("1000"));
                assert!(allowed.contains("auto"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_range_on_rangeless_mode_rejected() {
        assert!(matches!(
            keysight().configure(Mode::Diode, Some("auto"), None),
            Err(DmmError::InvalidRange { .. })
        ));
        assert!(matches!(
            siglent().configure(Mode::Frequency, Some("auto"), None),
            Err(DmmError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_nplc_unsupported_for_diode() {
        assert!(matches!(
            keysight().configure(Mode::Diode, None, Some("10")),
            Err(DmmError::NplcUnsupported(mode)) if mode == "diode"
        ));
    }

    #[test]
    fn test_invalid_nplc_lists_choices() {
        let err = keysight()
            .configure(Mode::VoltsDc, Some("10"), Some("7"))
            .unwrap_err();
        assert!(err.to_string().contains("0.02,0.06,0.2,1,2,10,100,min,max,def"));
    }

    #[test]
    fn test_nplc_prefix_per_family() {
        assert_eq!(
            keysight()
                .configure(Mode::VoltsDc, Some("10"), Some("10"))
                .unwrap(),
            vec!["CONF:VOLT:DC", "VOLT:DC:RANG 10", "VOLT:DC:NPLC 10"]
        );
        assert_eq!(
            siglent()
                .configure(Mode::CurrentDc, Some("auto"), Some("10"))
                .unwrap(),
            vec!["CONF:CURR:DC", "CURR:DC:RANG:AUTO ON", "SENS:CURR:DC:NPLC 10"]
        );
    }

    #[test]
    fn test_siglent_probe_range_uses_table_token() {
        assert_eq!(
            siglent()
                .configure(Mode::Temperature, Some("rtd,pt100"), None)
                .unwrap(),
            vec!["CONF:TEMP", "TEMP:RANG RTD,PT100"]
        );
    }

    #[test]
    fn test_unknown_mode_for_family() {
        assert!(matches!(
            siglent().configure(Mode::Period, None, None),
            Err(DmmError::UnknownMode { .. })
        ));
    }

    #[test]
    fn test_bandwidth() {
        assert_eq!(
            keysight().bandwidth(Mode::VoltsAc, "20").unwrap(),
            "VOLT:AC:BAND 20"
        );
        assert!(matches!(
            keysight().bandwidth(Mode::VoltsDc, "20"),
            Err(DmmError::BandwidthUnsupported(_))
        ));
        assert!(matches!(
            keysight().bandwidth(Mode::CurrentAc, "50"),
            Err(DmmError::InvalidBandwidth { .. })
        ));
    }

    #[test]
    fn test_configure_with_bandwidth() {
        assert_eq!(
            keysight()
                .configure_with_bandwidth(Mode::VoltsAc, Some("10"), None, Some("3"))
                .unwrap(),
            vec!["CONF:VOLT:AC", "VOLT:AC:RANG 10", "VOLT:AC:BAND 3"]
        );
        assert_eq!(
            keysight()
                .configure_with_bandwidth(Mode::VoltsDc, None, Some("1"), None)
                .unwrap(),
            vec!["CONF:VOLT:DC", "VOLT:DC:NPLC 1"]
        );
        assert!(matches!(
            keysight().configure_with_bandwidth(Mode::VoltsDc, None, None, Some("20")),
            Err(DmmError::BandwidthUnsupported(_))
        ));
        assert!(matches!(
            siglent().configure_with_bandwidth(Mode::VoltsAc, None, None, Some("20")),
            Err(DmmError::BandwidthUnsupported(_))
        ));
    }

    #[test]
    fn test_reset_per_family() {
        assert_eq!(keysight().reset(), vec!["*RST", "*CLS"]);
        assert_eq!(siglent().reset(), vec!["*RST"]);
    }

    #[test]
    fn test_multi_sample_setup() {
        assert_eq!(
            keysight().multi_sample(5).unwrap(),
            vec!["SAMP:COUN 5", "TRIG:COUN 1", "TRIG:DEL 0", "TRIG:SOUR IMM"]
        );
        assert!(matches!(
            keysight().multi_sample(0),
            Err(DmmError::InvalidArgument(_))
        ));
    }
}

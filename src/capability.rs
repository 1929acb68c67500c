//! Static capability tables for the supported meter families.
//!
//! Each table maps a [`Mode`] to the SCPI stem used to select it and to the
//! sets of range, NPLC and bandwidth tokens the instrument accepts for it.
//! A category that is absent (`None`) means the parameter cannot be set for
//! that mode at all. Tokens are compared case-insensitively as literal
//! strings; no numeric or unit normalisation takes place.

use crate::error::DmmError;
use crate::types::{InstrumentFamily, Mode};

/// Named status query sent by `status()`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusQuery {
    pub name: &'static str,
    pub command: &'static str,
}

/// Everything the command builder needs to know about one mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeDescriptor {
    pub mode: Mode,
    /// SCPI function stem, e.g. `VOLT:DC`
    pub stem: &'static str,
    pub ranges: Option<&'static [&'static str]>,
    pub nplc: Option<&'static [&'static str]>,
    pub bandwidth: Option<&'static [&'static str]>,
}

impl ModeDescriptor {
    const fn new(mode: Mode, stem: &'static str) -> Self {
        Self {
            mode,
            stem,
            ranges: None,
            nplc: None,
            bandwidth: None,
        }
    }

    const fn ranges(mut self, ranges: &'static [&'static str]) -> Self {
        self.ranges = Some(ranges);
        self
    }

    const fn nplc(mut self, nplc: &'static [&'static str]) -> Self {
        self.nplc = Some(nplc);
        self
    }

    const fn bandwidth(mut self, bandwidth: &'static [&'static str]) -> Self {
        self.bandwidth = Some(bandwidth);
        self
    }

    pub fn is_range_valid(&self, value: &str) -> bool {
        self.canonical_range(value).is_some()
    }

    pub fn is_nplc_valid(&self, value: &str) -> bool {
        self.canonical_nplc(value).is_some()
    }

    pub fn is_bandwidth_valid(&self, value: &str) -> bool {
        self.canonical_bandwidth(value).is_some()
    }

    /// Table token matching `value`, ignoring case
    pub fn canonical_range(&self, value: &str) -> Option<&'static str> {
        find_token(self.ranges, value)
    }

    pub fn canonical_nplc(&self, value: &str) -> Option<&'static str> {
        find_token(self.nplc, value)
    }

    pub fn canonical_bandwidth(&self, value: &str) -> Option<&'static str> {
        find_token(self.bandwidth, value)
    }
}

fn find_token(set: Option<&'static [&'static str]>, value: &str) -> Option<&'static str> {
    let wanted = value.trim().to_lowercase();
    set?.iter()
        .copied()
        .find(|token| token.to_lowercase() == wanted)
}

/// Immutable per-family description of what the meter accepts
#[derive(Debug)]
pub struct CapabilityTable {
    pub family: InstrumentFamily,
    pub modes: &'static [ModeDescriptor],
    /// Queries issued by `status()`, in this order
    pub status_queries: &'static [StatusQuery],
    /// Prefix in front of `<stem>:NPLC`, empty or `SENS:`
    pub nplc_prefix: &'static str,
    pub reset_commands: &'static [&'static str],
    /// Substrings preferred when auto-selecting a USB resource
    pub discovery_hints: &'static [&'static str],
}

impl CapabilityTable {
    pub fn describe(&self, mode: Mode) -> Result<&ModeDescriptor, DmmError> {
        self.modes
            .iter()
            .find(|descriptor| descriptor.mode == mode)
            .ok_or_else(|| DmmError::UnknownMode {
                mode: mode.name().to_string(),
                allowed: self.mode_names().join(","),
            })
    }

    /// Parse a user supplied mode name and look it up in one step
    pub fn describe_name(&self, name: &str) -> Result<&ModeDescriptor, DmmError> {
        let mode = name.parse::<Mode>().map_err(|_| DmmError::UnknownMode {
            mode: name.to_string(),
            allowed: self.mode_names().join(","),
        })?;
        self.describe(mode)
    }

    pub fn mode_names(&self) -> Vec<&'static str> {
        self.modes.iter().map(|d| d.mode.name()).collect()
    }

    /// Sorted mode names, for CLI help
    pub fn list_modes(&self) -> Vec<&'static str> {
        let mut names = self.mode_names();
        names.sort_unstable();
        names
    }

    /// Every range token of any mode, symbolic first then numeric ascending
    pub fn list_ranges(&self) -> Vec<&'static str> {
        sorted_union(self.modes.iter().filter_map(|d| d.ranges))
    }

    pub fn list_nplcs(&self) -> Vec<&'static str> {
        sorted_union(self.modes.iter().filter_map(|d| d.nplc))
    }
}

fn sorted_union<'a>(sets: impl Iterator<Item = &'a [&'static str]>) -> Vec<&'static str> {
    let mut tokens: Vec<&'static str> = Vec::new();
    for &token in sets.flatten() {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    tokens.sort_by(|a, b| {
        match (a.parse::<f64>().ok(), b.parse::<f64>().ok()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Greater,
            (None, Some(_)) => std::cmp::Ordering::Less,
            (None, None) => a.cmp(b),
        }
    });
    tokens
}

impl InstrumentFamily {
    pub fn capabilities(self) -> &'static CapabilityTable {
        match self {
            InstrumentFamily::Keysight34460A => &KEYSIGHT_34460A,
            InstrumentFamily::SiglentSdm3055 => &SIGLENT_SDM3055,
        }
    }
}

const KS_NPLC: &[&str] = &[
    "0.02", "0.06", "0.2", "1", "2", "10", "100", "min", "max", "def",
];
const KS_BANDWIDTH: &[&str] = &["3", "20", "200", "min", "max", "def"];
const KS_RESISTANCE: &[&str] = &[
    "100", "1000", "10000", "100000", "1000000", "10000000", "100000000", "1000000000", "auto",
    "min", "max", "def",
];
const KS_FREQUENCY: &[&str] = &["0.1", "1", "10", "100", "750", "auto", "min", "max", "def"];

pub static KEYSIGHT_34460A: CapabilityTable = CapabilityTable {
    family: InstrumentFamily::Keysight34460A,
    modes: &[
        ModeDescriptor::new(Mode::VoltsDc, "VOLT:DC")
            .ranges(&["0.1", "1", "10", "100", "1000", "auto", "min", "max", "def"])
            .nplc(KS_NPLC),
        ModeDescriptor::new(Mode::VoltsAc, "VOLT:AC")
            .ranges(&["0.1", "1", "10", "100", "750", "auto", "min", "max", "def"])
            .bandwidth(KS_BANDWIDTH),
        ModeDescriptor::new(Mode::CurrentDc, "CURR:DC")
            .ranges(&[
                "0.0001", "0.001", "0.01", "0.1", "1", "3", "auto", "min", "max", "def",
            ])
            .nplc(KS_NPLC),
        ModeDescriptor::new(Mode::CurrentAc, "CURR:AC")
            .ranges(&["1", "3", "auto", "min", "max", "def"])
            .bandwidth(KS_BANDWIDTH),
        ModeDescriptor::new(Mode::Resistance, "RES")
            .ranges(KS_RESISTANCE)
            .nplc(KS_NPLC),
        ModeDescriptor::new(Mode::Resistance4w, "FRES")
            .ranges(KS_RESISTANCE)
            .nplc(KS_NPLC),
        ModeDescriptor::new(Mode::Frequency, "FREQ").ranges(KS_FREQUENCY),
        ModeDescriptor::new(Mode::Period, "PER").ranges(KS_FREQUENCY),
        ModeDescriptor::new(Mode::Temperature, "TEMP"),
        ModeDescriptor::new(Mode::Diode, "DIOD"),
        ModeDescriptor::new(Mode::Continuity, "CONT"),
        ModeDescriptor::new(Mode::Capacitance, "CAP").ranges(&[
            "1e-9", "10e-9", "100e-9", "1e-6", "10e-6", "100e-6", "1e-3", "10e-3", "auto", "min",
            "max", "def",
        ]),
    ],
    status_queries: &[
        StatusQuery { name: "identity", command: "*IDN?" },
        StatusQuery { name: "mode", command: "CONF?" },
        StatusQuery { name: "trigger_count", command: "TRIG:COUN?" },
        StatusQuery { name: "trigger_delay", command: "TRIG:DEL?" },
        StatusQuery { name: "trigger_slope", command: "TRIG:SLOP?" },
        StatusQuery { name: "trigger_source", command: "TRIG:SOUR?" },
        StatusQuery { name: "sample_count", command: "SAMP:COUN?" },
    ],
    nplc_prefix: "",
    reset_commands: &["*RST", "*CLS"],
    discovery_hints: &["34460", "34461", "KEYSIGHT"],
};

const SDM_VOLTS: &[&str] = &[
    "200mv", "2v", "20v", "200v", "1000v", "auto", "min", "max", "def",
];
const SDM_RESISTANCE: &[&str] = &[
    "200", "2k", "20k", "200k", "2m", "10m", "100m", "auto", "min", "max", "def",
];
const SDM_NPLC: &[&str] = &["0.3", "1", "10", "min", "max", "def"];

pub static SIGLENT_SDM3055: CapabilityTable = CapabilityTable {
    family: InstrumentFamily::SiglentSdm3055,
    modes: &[
        ModeDescriptor::new(Mode::VoltsDc, "VOLT:DC")
            .ranges(SDM_VOLTS)
            .nplc(SDM_NPLC),
        ModeDescriptor::new(Mode::VoltsAc, "VOLT:AC").ranges(SDM_VOLTS),
        ModeDescriptor::new(Mode::CurrentDc, "CURR:DC")
            .ranges(&[
                "200ua", "2ma", "20ma", "200ma", "2a", "10a", "auto", "min", "max", "def",
            ])
            .nplc(SDM_NPLC),
        ModeDescriptor::new(Mode::CurrentAc, "CURR:AC")
            .ranges(&["20ma", "200ma", "2a", "10a", "auto", "min", "max", "def"]),
        ModeDescriptor::new(Mode::Temperature, "TEMP").ranges(&[
            "RTD,PT100",
            "RTD,PT1000",
            "THER,BITS90",
            "THER,EITS90",
            "THER,JITS90",
            "THER,NITS90",
            "THER,SITS90",
            "THER,TITS90",
        ]),
        ModeDescriptor::new(Mode::Resistance, "RES")
            .ranges(SDM_RESISTANCE)
            .nplc(SDM_NPLC),
        ModeDescriptor::new(Mode::Resistance4w, "FRES")
            .ranges(SDM_RESISTANCE)
            .nplc(SDM_NPLC),
        ModeDescriptor::new(Mode::Frequency, "FREQ"),
        ModeDescriptor::new(Mode::Diode, "DIOD"),
        ModeDescriptor::new(Mode::Continuity, "CONT"),
    ],
    status_queries: &[
        StatusQuery { name: "identity", command: "*IDN?" },
        StatusQuery { name: "mode", command: "CONF?" },
        StatusQuery { name: "sense", command: "SENSE:FUNC?" },
        StatusQuery { name: "trigger_count", command: "TRIG:COUN?" },
        StatusQuery { name: "trigger_delay", command: "TRIG:DEL?" },
        StatusQuery { name: "trigger_slope", command: "TRIG:SLOP?" },
        StatusQuery { name: "trigger_source", command: "TRIG:SOUR?" },
        StatusQuery { name: "sample_count", command: "SAMP:COUN?" },
    ],
    nplc_prefix: "SENS:",
    reset_commands: &["*RST"],
    discovery_hints: &["SDM3055", "SIGLENT"],
};

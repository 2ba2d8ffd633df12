//! Radio mode selection

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModemError;

/// Which backend carries packets to and from the radio
///
/// Chosen at configuration time and fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioMode {
    /// KISS TNC over TCP or serial
    #[default]
    Kiss,
    /// RTL-SDR receiver through rtl_fm and multimon-ng
    #[serde(alias = "rtl_fm")]
    RtlFm,
    /// KISS byte stream on stdin/stdout
    Stdin,
    /// External sound-card modem speaking KISS on stdio
    Sound,
}

impl RadioMode {
    /// All modes, in CLI order
    pub const ALL: [RadioMode; 4] = [
        RadioMode::Kiss,
        RadioMode::Stdin,
        RadioMode::RtlFm,
        RadioMode::Sound,
    ];

    /// Returns a human-readable name for the mode
    pub fn name(&self) -> &'static str {
        match self {
            RadioMode::Kiss => "KISS",
            RadioMode::RtlFm => "RTL_FM",
            RadioMode::Stdin => "STDIN",
            RadioMode::Sound => "SOUND",
        }
    }
}

impl fmt::Display for RadioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RadioMode {
    type Err = ModemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kiss" => Ok(RadioMode::Kiss),
            "rtlfm" | "rtl_fm" | "rtl-fm" => Ok(RadioMode::RtlFm),
            "stdin" => Ok(RadioMode::Stdin),
            "sound" => Ok(RadioMode::Sound),
            other => Err(ModemError::UnknownMode(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_modes() {
        assert_eq!("kiss".parse::<RadioMode>().unwrap(), RadioMode::Kiss);
        assert_eq!("RTLFM".parse::<RadioMode>().unwrap(), RadioMode::RtlFm);
        assert_eq!("rtl_fm".parse::<RadioMode>().unwrap(), RadioMode::RtlFm);
        assert_eq!("Sound".parse::<RadioMode>().unwrap(), RadioMode::Sound);
        assert!(matches!(
            "afsk".parse::<RadioMode>(),
            Err(ModemError::UnknownMode(_))
        ));
    }

    #[test]
    fn test_display_names() {
        assert_eq!(RadioMode::RtlFm.to_string(), "RTL_FM");
        for mode in RadioMode::ALL {
            assert_eq!(mode.name().parse::<RadioMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&RadioMode::RtlFm).unwrap(), "\"rtlfm\"");
        let mode: RadioMode = serde_json::from_str("\"rtl_fm\"").unwrap();
        assert_eq!(mode, RadioMode::RtlFm);
    }
}

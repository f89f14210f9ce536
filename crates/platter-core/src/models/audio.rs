use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target formats supported by audio conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    Wav,
    Aiff,
    Flac,
    Alac,
    Mp3,
    Opus,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 6] = [
        AudioFormat::Wav,
        AudioFormat::Aiff,
        AudioFormat::Flac,
        AudioFormat::Alac,
        AudioFormat::Mp3,
        AudioFormat::Opus,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Aiff => "aiff",
            AudioFormat::Flac => "flac",
            AudioFormat::Alac => "alac",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Opus => "opus",
        }
    }

    /// File extension of converted output. ALAC lives in an MP4 container.
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Alac => "m4a",
            other => other.as_str(),
        }
    }
}

impl Display for AudioFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        AudioFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| format!("unsupported audio format: {}", s))
    }
}

/// Technical properties of a stored audio file, carried by the record layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioQuality {
    pub format: String,
    /// kbps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u32>,
    /// Hz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bit_depth: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

impl AudioQuality {
    pub fn is_lossless(&self) -> bool {
        matches!(
            self.format.to_lowercase().as_str(),
            "wav" | "aiff" | "flac" | "alac"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("FLAC".parse::<AudioFormat>().unwrap(), AudioFormat::Flac);
        assert_eq!(" opus ".parse::<AudioFormat>().unwrap(), AudioFormat::Opus);
        assert!("ogg".parse::<AudioFormat>().is_err());
    }

    #[test]
    fn test_alac_uses_m4a_container() {
        assert_eq!(AudioFormat::Alac.extension(), "m4a");
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
    }

    #[test]
    fn test_quality_serialization_skips_unknowns() {
        let quality = AudioQuality {
            format: "flac".to_string(),
            bitrate: None,
            sample_rate: Some(96_000),
            bit_depth: Some(24),
            channels: Some(2),
        };
        let json = serde_json::to_value(&quality).unwrap();
        assert!(json.get("bitrate").is_none());
        assert_eq!(json["sample_rate"], 96_000);
        assert!(quality.is_lossless());
    }
}

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Output language of the assistant. Exactly two locales are supported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "si")]
    Sinhala,
    #[serde(rename = "en")]
    English,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sinhala => "si",
            Self::English => "en",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Sinhala => "Sinhala",
            Self::English => "English",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "si" | "sinhala" => Ok(Self::Sinhala),
            "en" | "english" => Ok(Self::English),
            other => Err(DomainError::UnsupportedLanguage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Language;

    #[test]
    fn language_codes_roundtrip_through_serde() {
        let json = serde_json::to_string(&Language::English).expect("serialize");
        assert_eq!(json, "\"en\"");
        assert_eq!("SI".parse::<Language>(), Ok(Language::Sinhala));
        assert!("ta".parse::<Language>().is_err());
    }
}

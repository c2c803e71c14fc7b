//! Provider condition codes mapped onto one internal vocabulary.
//!
//! Open-Meteo reports WMO codes (0–99), Tomorrow.io uses its own 1000–8000
//! scheme. Everything past the provider layer only sees [`InternalCondition`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InternalCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Fog,
    Drizzle,
    Rain,
    HeavyRain,
    Snow,
    HeavySnow,
    FreezingRain,
    Thunderstorm,
    #[default]
    Unknown,
}

impl InternalCondition {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Clear => "Clear",
            Self::PartlyCloudy => "Partly Cloudy",
            Self::Cloudy => "Cloudy",
            Self::Fog => "Fog",
            Self::Drizzle => "Drizzle",
            Self::Rain => "Rain",
            Self::HeavyRain => "Heavy Rain",
            Self::Snow => "Snow",
            Self::HeavySnow => "Heavy Snow",
            Self::FreezingRain => "Freezing Rain",
            Self::Thunderstorm => "Thunderstorm",
            Self::Unknown => "Unknown",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            Self::Clear => "☀️",
            Self::PartlyCloudy => "⛅",
            Self::Cloudy => "☁️",
            Self::Fog => "🌫️",
            Self::Drizzle => "🌦️",
            Self::Rain => "🌧️",
            Self::HeavyRain => "🌧️",
            Self::Snow => "🌨️",
            Self::HeavySnow => "❄️",
            Self::FreezingRain => "🧊",
            Self::Thunderstorm => "⛈️",
            Self::Unknown => "❔",
        }
    }

    pub fn is_precipitation(&self) -> bool {
        matches!(
            self,
            Self::Drizzle
                | Self::Rain
                | Self::HeavyRain
                | Self::Snow
                | Self::HeavySnow
                | Self::FreezingRain
                | Self::Thunderstorm
        )
    }
}

/// Numbering scheme a raw condition code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionScheme {
    /// WMO 4677 present-weather codes, as used by Open-Meteo.
    Wmo,
    /// Tomorrow.io `weatherCode`.
    TomorrowIo,
}

/// Maps a raw provider code to the internal vocabulary. Unmapped codes are
/// [`InternalCondition::Unknown`].
pub fn normalize(scheme: ConditionScheme, raw: i64) -> InternalCondition {
    match scheme {
        ConditionScheme::Wmo => from_wmo(raw),
        ConditionScheme::TomorrowIo => from_tomorrow_io(raw),
    }
}

fn from_wmo(code: i64) -> InternalCondition {
    use InternalCondition::*;
    match code {
        0 | 1 => Clear,
        2 => PartlyCloudy,
        3 => Cloudy,
        45 | 48 => Fog,
        51 | 53 | 55 => Drizzle,
        56 | 57 | 66 | 67 => FreezingRain,
        61 | 63 | 80 | 81 => Rain,
        65 | 82 => HeavyRain,
        71 | 73 | 77 | 85 => Snow,
        75 | 86 => HeavySnow,
        95 | 96 | 99 => Thunderstorm,
        _ => Unknown,
    }
}

fn from_tomorrow_io(code: i64) -> InternalCondition {
    use InternalCondition::*;
    match code {
        // Wind-only codes carry no sky state of their own.
        1000 | 1100 | 3000 | 3001 | 3002 => Clear,
        1101 => PartlyCloudy,
        1001 | 1102 => Cloudy,
        2000 | 2100 => Fog,
        4000 => Drizzle,
        4001 | 4200 => Rain,
        4201 => HeavyRain,
        5000 | 5001 | 5100 => Snow,
        5101 => HeavySnow,
        6000 | 6001 | 6200 | 6201 | 7000 | 7101 | 7102 => FreezingRain,
        8000 => Thunderstorm,
        _ => Unknown,
    }
}

/// Tomorrow.io's own label for a code, finer grained than the internal enum.
pub fn tomorrow_io_text(code: i64) -> Option<&'static str> {
    let text = match code {
        1000 => "Clear",
        1001 => "Cloudy",
        1100 => "Mostly Clear",
        1101 => "Partly Cloudy",
        1102 => "Mostly Cloudy",
        2000 => "Fog",
        2100 => "Light Fog",
        3000 => "Light Wind",
        3001 => "Windy",
        3002 => "Strong Wind",
        4000 => "Drizzle",
        4001 => "Rain",
        4200 => "Light Rain",
        4201 => "Heavy Rain",
        5000 => "Snow",
        5001 => "Flurries",
        5100 => "Light Snow",
        5101 => "Heavy Snow",
        6000 => "Freezing Drizzle",
        6001 => "Freezing Rain",
        6200 => "Light Freezing Rain",
        6201 => "Heavy Freezing Rain",
        7000 => "Ice Pellets",
        7101 => "Heavy Ice Pellets",
        7102 => "Light Ice Pellets",
        8000 => "Thunderstorm",
        _ => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thunderstorm_agrees_across_schemes() {
        assert_eq!(normalize(ConditionScheme::Wmo, 95), InternalCondition::Thunderstorm);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 8000), InternalCondition::Thunderstorm);
    }

    #[test]
    fn wmo_table() {
        assert_eq!(normalize(ConditionScheme::Wmo, 0), InternalCondition::Clear);
        assert_eq!(normalize(ConditionScheme::Wmo, 2), InternalCondition::PartlyCloudy);
        assert_eq!(normalize(ConditionScheme::Wmo, 3), InternalCondition::Cloudy);
        assert_eq!(normalize(ConditionScheme::Wmo, 48), InternalCondition::Fog);
        assert_eq!(normalize(ConditionScheme::Wmo, 53), InternalCondition::Drizzle);
        assert_eq!(normalize(ConditionScheme::Wmo, 66), InternalCondition::FreezingRain);
        assert_eq!(normalize(ConditionScheme::Wmo, 63), InternalCondition::Rain);
        assert_eq!(normalize(ConditionScheme::Wmo, 82), InternalCondition::HeavyRain);
        assert_eq!(normalize(ConditionScheme::Wmo, 71), InternalCondition::Snow);
        assert_eq!(normalize(ConditionScheme::Wmo, 75), InternalCondition::HeavySnow);
        assert_eq!(normalize(ConditionScheme::Wmo, 99), InternalCondition::Thunderstorm);
    }

    #[test]
    fn tomorrow_io_table() {
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 1000), InternalCondition::Clear);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 1101), InternalCondition::PartlyCloudy);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 1102), InternalCondition::Cloudy);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 2100), InternalCondition::Fog);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 4000), InternalCondition::Drizzle);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 4201), InternalCondition::HeavyRain);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 5101), InternalCondition::HeavySnow);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 7102), InternalCondition::FreezingRain);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 3001), InternalCondition::Clear);
    }

    #[test]
    fn unknown_codes_fall_through() {
        assert_eq!(normalize(ConditionScheme::Wmo, 42), InternalCondition::Unknown);
        assert_eq!(normalize(ConditionScheme::Wmo, -1), InternalCondition::Unknown);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 95), InternalCondition::Unknown);
        assert_eq!(normalize(ConditionScheme::TomorrowIo, 0), InternalCondition::Unknown);
    }

    #[test]
    fn tomorrow_text_labels() {
        assert_eq!(tomorrow_io_text(6200), Some("Light Freezing Rain"));
        assert_eq!(tomorrow_io_text(1234), None);
    }

    #[test]
    fn precipitation_classification() {
        assert!(InternalCondition::Drizzle.is_precipitation());
        assert!(InternalCondition::Thunderstorm.is_precipitation());
        assert!(!InternalCondition::Fog.is_precipitation());
        assert!(!InternalCondition::Unknown.is_precipitation());
    }
}

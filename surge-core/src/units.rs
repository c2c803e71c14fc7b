//! Unit conversion and derived quantities.
//!
//! Snapshots are always stored in metric (°C, km/h, mm, hPa). Everything in
//! this module that converts *away* from metric is meant for display only.

use serde::{Deserialize, Serialize};

/// Display preference. Never changes what is stored in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnitPreference {
    #[default]
    Fahrenheit,
    Celsius,
}

impl UnitPreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitPreference::Fahrenheit => "fahrenheit",
            UnitPreference::Celsius => "celsius",
        }
    }

    pub fn temperature_symbol(&self) -> &'static str {
        match self {
            UnitPreference::Fahrenheit => "°F",
            UnitPreference::Celsius => "°C",
        }
    }

    pub fn speed_symbol(&self) -> &'static str {
        match self {
            UnitPreference::Fahrenheit => "mph",
            UnitPreference::Celsius => "km/h",
        }
    }

    pub fn precipitation_symbol(&self) -> &'static str {
        match self {
            UnitPreference::Fahrenheit => "in",
            UnitPreference::Celsius => "mm",
        }
    }

    pub fn temperature(&self, celsius: f64) -> f64 {
        match self {
            UnitPreference::Fahrenheit => celsius_to_fahrenheit(celsius),
            UnitPreference::Celsius => celsius,
        }
    }

    pub fn speed(&self, kmh: f64) -> f64 {
        match self {
            UnitPreference::Fahrenheit => kmh_to_mph(kmh),
            UnitPreference::Celsius => kmh,
        }
    }

    pub fn precipitation(&self, mm: f64) -> f64 {
        match self {
            UnitPreference::Fahrenheit => mm_to_inches(mm),
            UnitPreference::Celsius => mm,
        }
    }
}

impl std::fmt::Display for UnitPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for UnitPreference {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "f" | "fahrenheit" | "imperial" => Ok(UnitPreference::Fahrenheit),
            "c" | "celsius" | "metric" => Ok(UnitPreference::Celsius),
            _ => Err(anyhow::anyhow!(
                "Unknown unit preference '{value}'. Use 'fahrenheit' or 'celsius'."
            )),
        }
    }
}

const KM_PER_MILE: f64 = 1.609_344;
const MM_PER_INCH: f64 = 25.4;

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn kmh_to_mph(kmh: f64) -> f64 {
    kmh / KM_PER_MILE
}

pub fn mph_to_kmh(mph: f64) -> f64 {
    mph * KM_PER_MILE
}

pub fn mps_to_kmh(mps: f64) -> f64 {
    mps * 3.6
}

pub fn mm_to_inches(mm: f64) -> f64 {
    mm / MM_PER_INCH
}

pub fn inches_to_mm(inches: f64) -> f64 {
    inches * MM_PER_INCH
}

/// Magnus-formula dew point in °C.
///
/// Returns `None` when either input is missing or not finite, or when the
/// relative humidity is not positive (the logarithm is undefined there).
/// Humidity above 100% is clamped.
pub fn dew_point_c(temperature_c: Option<f64>, humidity_pct: Option<f64>) -> Option<f64> {
    let t = temperature_c.filter(|t| t.is_finite())?;
    let rh = humidity_pct.filter(|rh| rh.is_finite() && *rh > 0.0)?.min(100.0);

    let alpha = (17.27 * t) / (237.7 + t) + (rh / 100.0).ln();
    let dew = (237.7 * alpha) / (17.27 - alpha);

    dew.is_finite().then_some(dew)
}

const COMPASS_SECTORS: [&str; 16] = [
    "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW", "NW",
    "NNW",
];

/// Sixteen-point compass name for a bearing in degrees clockwise from north.
pub fn compass_sector(degrees: f64) -> &'static str {
    if !degrees.is_finite() {
        return "--";
    }
    let index = (degrees / 22.5).round().rem_euclid(16.0) as usize;
    COMPASS_SECTORS[index % 16]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_fahrenheit_round_trip() {
        let mut c = -90.0;
        while c <= 60.0 {
            let back = fahrenheit_to_celsius(celsius_to_fahrenheit(c));
            assert!((back - c).abs() <= 0.01, "{c} came back as {back}");
            c += 0.25;
        }
    }

    #[test]
    fn known_conversions() {
        assert_eq!(celsius_to_fahrenheit(100.0), 212.0);
        assert_eq!(celsius_to_fahrenheit(-40.0), -40.0);
        assert!((kmh_to_mph(mph_to_kmh(30.0)) - 30.0).abs() < 1e-9);
        assert!((mps_to_kmh(10.0) - 36.0).abs() < 1e-9);
        assert!((inches_to_mm(mm_to_inches(12.7)) - 12.7).abs() < 1e-9);
    }

    #[test]
    fn dew_point_matches_reference_value() {
        // 20 °C at 50% RH is about 9.3 °C.
        let dew = dew_point_c(Some(20.0), Some(50.0)).expect("defined");
        assert!((dew - 9.26).abs() < 0.1, "got {dew}");
    }

    #[test]
    fn dew_point_equals_temperature_when_saturated() {
        let dew = dew_point_c(Some(15.0), Some(100.0)).expect("defined");
        assert!((dew - 15.0).abs() < 1e-9);
    }

    #[test]
    fn dew_point_is_monotonic_in_humidity() {
        for t in [-10.0, 0.0, 12.5, 25.0, 40.0, 60.0] {
            let mut previous = f64::NEG_INFINITY;
            for rh in 1..=100 {
                let dew = dew_point_c(Some(t), Some(rh as f64)).expect("defined");
                assert!(dew >= previous, "t={t} rh={rh}: {dew} < {previous}");
                previous = dew;
            }
        }
    }

    #[test]
    fn dew_point_guards_zero_humidity_and_missing_inputs() {
        assert_eq!(dew_point_c(Some(20.0), Some(0.0)), None);
        assert_eq!(dew_point_c(Some(20.0), Some(-5.0)), None);
        assert_eq!(dew_point_c(None, Some(50.0)), None);
        assert_eq!(dew_point_c(Some(20.0), None), None);
        assert_eq!(dew_point_c(Some(f64::NAN), Some(50.0)), None);
    }

    #[test]
    fn compass_sector_lookup() {
        assert_eq!(compass_sector(0.0), "N");
        assert_eq!(compass_sector(359.9), "N");
        assert_eq!(compass_sector(180.0), "S");
        assert_eq!(compass_sector(22.5), "NNE");
        assert_eq!(compass_sector(90.0), "E");
        assert_eq!(compass_sector(270.0), "W");
        assert_eq!(compass_sector(337.5), "NNW");
        assert_eq!(compass_sector(-90.0), "W");
        assert_eq!(compass_sector(720.0), "N");
    }

    #[test]
    fn unit_preference_parses_aliases() {
        assert_eq!(UnitPreference::try_from("F").unwrap(), UnitPreference::Fahrenheit);
        assert_eq!(UnitPreference::try_from("metric").unwrap(), UnitPreference::Celsius);
        assert!(UnitPreference::try_from("kelvin").is_err());
    }

    #[test]
    fn display_conversion_only_depends_on_preference() {
        assert_eq!(UnitPreference::Celsius.temperature(21.0), 21.0);
        assert!((UnitPreference::Fahrenheit.temperature(21.0) - 69.8).abs() < 1e-9);
        assert_eq!(UnitPreference::Celsius.speed(10.0), 10.0);
        assert!((UnitPreference::Fahrenheit.precipitation(25.4) - 1.0).abs() < 1e-9);
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::condition::InternalCondition;
use crate::units::UnitPreference;

/// A point on the globe. Construct with [`Coordinates::new`] to get range checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Returns `None` unless both values are finite and inside the valid
    /// latitude/longitude ranges.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        valid.then_some(Self { latitude, longitude })
    }

    /// `"39.9612, -82.9988"`, used as the label for literal coordinate input.
    pub fn label(&self) -> String {
        format!("{:.4}, {:.4}", self.latitude, self.longitude)
    }

    /// Parses `"lat,lon"` input. Both halves must be numeric and in range.
    pub fn parse_pair(input: &str) -> Option<Self> {
        let (lat, lon) = input.split_once(',')?;
        let lat = lat.trim().parse::<f64>().ok()?;
        let lon = lon.trim().parse::<f64>().ok()?;
        Self::new(lat, lon)
    }
}

/// Which kind of lookup produced a [`ResolvedLocation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Zip,
    Geocoder,
    Coordinates,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedLocation {
    pub display_label: String,
    pub source: LocationSource,
    pub coordinates: Coordinates,
}

/// Current conditions, normalized to Celsius, km/h and hPa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temperature_c: Option<f64>,
    pub feels_like_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub wind_direction_deg: Option<f64>,
    pub pressure_hpa: Option<f64>,
    pub dew_point_c: Option<f64>,
    pub condition: InternalCondition,
    /// Provider's own wording when finer than `condition`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub observed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourlyEntry {
    pub time: DateTime<Utc>,
    pub temperature_c: Option<f64>,
    pub condition: InternalCondition,
    pub precipitation_mm: Option<f64>,
    pub wind_speed_kmh: Option<f64>,
    pub humidity_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyEntry {
    pub date: NaiveDate,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub condition: InternalCondition,
}

/// The sections a weather source can be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Current,
    Hourly,
    Daily,
    Recent,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Current => "current",
            Section::Hourly => "hourly",
            Section::Daily => "daily",
            Section::Recent => "recent",
        }
    }
}

impl std::fmt::Display for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized fetch cycle for one location.
///
/// `None` sections mean "no data", which is different from an empty list or
/// zeroed values; the renderer shows an explicit placeholder for them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub coordinates: Coordinates,
    pub current: Option<CurrentConditions>,
    pub hourly: Option<Vec<HourlyEntry>>,
    pub daily: Option<Vec<DailyEntry>>,
    pub recent: Option<Vec<HourlyEntry>>,
    pub source_failures: BTreeSet<String>,
    pub preferred_units: UnitPreference,
    pub fetched_at: DateTime<Utc>,
}

impl WeatherSnapshot {
    pub fn empty(coordinates: Coordinates, units: UnitPreference, fetched_at: DateTime<Utc>) -> Self {
        Self {
            coordinates,
            current: None,
            hourly: None,
            daily: None,
            recent: None,
            source_failures: BTreeSet::new(),
            preferred_units: units,
            fetched_at,
        }
    }

    /// True when nothing at all could be loaded.
    pub fn is_unavailable(&self) -> bool {
        self.current.is_none() && self.hourly.is_none() && self.daily.is_none() && self.recent.is_none()
    }

    /// True when at least one source failed but something was loaded.
    pub fn is_partial(&self) -> bool {
        !self.source_failures.is_empty() && !self.is_unavailable()
    }
}

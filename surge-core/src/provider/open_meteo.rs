use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    condition::{ConditionScheme, InternalCondition, normalize as normalize_code},
    error::ProviderError,
    http::{fetch_json, lenient_f64, lenient_f64_vec},
    model::{Coordinates, CurrentConditions, DailyEntry, HourlyEntry, Section},
    units::{fahrenheit_to_celsius, inches_to_mm, mph_to_kmh, mps_to_kmh},
};

use super::{SectionData, WeatherProviderResponse, WeatherSource};

const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com";
const FORECAST_PATH: &str = "/v1/forecast";

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,\
weather_code,wind_speed_10m,wind_direction_10m,surface_pressure";
const HOURLY_FIELDS: &str =
    "temperature_2m,weather_code,precipitation,wind_speed_10m,relative_humidity_2m";
const DAILY_FIELDS: &str = "weather_code,temperature_2m_max,temperature_2m_min";

#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    http: Client,
    base_url: String,
}

impl OpenMeteoSource {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(http: Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn section_query(section: Section) -> Vec<(&'static str, String)> {
        match section {
            Section::Current => vec![("current", CURRENT_FIELDS.to_string())],
            Section::Hourly => vec![
                ("hourly", HOURLY_FIELDS.to_string()),
                ("forecast_hours", "48".to_string()),
            ],
            Section::Daily => vec![
                ("daily", DAILY_FIELDS.to_string()),
                ("forecast_days", "10".to_string()),
            ],
            Section::Recent => vec![
                ("hourly", HOURLY_FIELDS.to_string()),
                ("past_hours", "24".to_string()),
                ("forecast_hours", "1".to_string()),
            ],
        }
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoSource {
    fn id(&self) -> &str {
        "open-meteo"
    }

    fn supports(&self, _section: Section) -> bool {
        true
    }

    async fn fetch(
        &self,
        section: Section,
        coords: Coordinates,
    ) -> Result<WeatherProviderResponse, ProviderError> {
        let url = format!("{}{}", self.base_url, FORECAST_PATH);

        let mut query = vec![
            ("latitude", coords.latitude.to_string()),
            ("longitude", coords.longitude.to_string()),
            ("timezone", "auto".to_string()),
            ("timeformat", "unixtime".to_string()),
            ("temperature_unit", "celsius".to_string()),
            ("wind_speed_unit", "kmh".to_string()),
            ("precipitation_unit", "mm".to_string()),
        ];
        query.extend(Self::section_query(section));

        let payload: ForecastPayload = fetch_json(self.http.get(url).query(&query)).await?;
        Ok(WeatherProviderResponse::OpenMeteo(payload))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastPayload {
    #[serde(default)]
    utc_offset_seconds: i64,
    current: Option<CurrentBlock>,
    #[serde(default)]
    current_units: HashMap<String, String>,
    hourly: Option<HourlyBlock>,
    #[serde(default)]
    hourly_units: HashMap<String, String>,
    daily: Option<DailyBlock>,
    #[serde(default)]
    daily_units: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CurrentBlock {
    time: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature_2m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    relative_humidity_2m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    apparent_temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    weather_code: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_speed_10m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_direction_10m: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    surface_pressure: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct HourlyBlock {
    #[serde(default)]
    time: Vec<i64>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    weather_code: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    precipitation: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    relative_humidity_2m: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
struct DailyBlock {
    #[serde(default)]
    time: Vec<i64>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    weather_code: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    temperature_2m_max: Vec<Option<f64>>,
    #[serde(default, deserialize_with = "lenient_f64_vec")]
    temperature_2m_min: Vec<Option<f64>>,
}

/// Turns an Open-Meteo payload into the requested section. Values are
/// converted according to the `*_units` blocks the API echoes back. `now`
/// stands in for a missing observation time.
pub fn normalize(
    payload: ForecastPayload,
    section: Section,
    now: DateTime<Utc>,
) -> Result<SectionData, ProviderError> {
    match section {
        Section::Current => {
            let block = payload
                .current
                .ok_or_else(|| missing_block("current"))?;
            Ok(SectionData::Current(normalize_current(block, &payload.current_units, now)))
        }
        Section::Hourly | Section::Recent => {
            let block = payload.hourly.ok_or_else(|| missing_block("hourly"))?;
            let entries = normalize_hourly(block, &payload.hourly_units);
            Ok(if section == Section::Hourly {
                SectionData::Hourly(entries)
            } else {
                SectionData::Recent(entries)
            })
        }
        Section::Daily => {
            let block = payload.daily.ok_or_else(|| missing_block("daily"))?;
            Ok(SectionData::Daily(normalize_daily(
                block,
                &payload.daily_units,
                payload.utc_offset_seconds,
            )))
        }
    }
}

fn missing_block(name: &str) -> ProviderError {
    ProviderError::InvalidResponse(format!("open-meteo payload: missing {name}"))
}

fn normalize_current(
    block: CurrentBlock,
    units: &HashMap<String, String>,
    now: DateTime<Utc>,
) -> CurrentConditions {
    CurrentConditions {
        temperature_c: to_celsius(block.temperature_2m, units.get("temperature_2m")),
        feels_like_c: to_celsius(block.apparent_temperature, units.get("apparent_temperature")),
        humidity_pct: block.relative_humidity_2m,
        wind_speed_kmh: to_kmh(block.wind_speed_10m, units.get("wind_speed_10m")),
        wind_direction_deg: block.wind_direction_10m,
        pressure_hpa: block.surface_pressure,
        // Open-Meteo has no dew point in `current`; the aggregator derives it.
        dew_point_c: None,
        condition: condition(block.weather_code),
        summary: None,
        observed_at: block.time.and_then(unix_to_utc).unwrap_or(now),
    }
}

fn normalize_hourly(block: HourlyBlock, units: &HashMap<String, String>) -> Vec<HourlyEntry> {
    let temp_unit = units.get("temperature_2m");
    let wind_unit = units.get("wind_speed_10m");
    let precip_unit = units.get("precipitation");

    block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let time = unix_to_utc(*ts)?;
            Some(HourlyEntry {
                time,
                temperature_c: to_celsius(at(&block.temperature_2m, i), temp_unit),
                condition: condition(at(&block.weather_code, i)),
                precipitation_mm: to_mm(at(&block.precipitation, i), precip_unit),
                wind_speed_kmh: to_kmh(at(&block.wind_speed_10m, i), wind_unit),
                humidity_pct: at(&block.relative_humidity_2m, i),
            })
        })
        .collect()
}

fn normalize_daily(
    block: DailyBlock,
    units: &HashMap<String, String>,
    utc_offset_seconds: i64,
) -> Vec<DailyEntry> {
    block
        .time
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            // Daily timestamps are local midnight; shift before taking the date.
            let date = unix_to_utc(ts.checked_add(utc_offset_seconds)?)?.date_naive();
            Some(DailyEntry {
                date,
                temp_max_c: to_celsius(at(&block.temperature_2m_max, i), units.get("temperature_2m_max")),
                temp_min_c: to_celsius(at(&block.temperature_2m_min, i), units.get("temperature_2m_min")),
                condition: condition(at(&block.weather_code, i)),
            })
        })
        .collect()
}

fn at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

fn condition(code: Option<f64>) -> InternalCondition {
    code.map(|c| normalize_code(ConditionScheme::Wmo, c.round() as i64))
        .unwrap_or(InternalCondition::Unknown)
}

fn to_celsius(value: Option<f64>, unit: Option<&String>) -> Option<f64> {
    let value = value?;
    Some(match unit.map(String::as_str) {
        Some("°F") => fahrenheit_to_celsius(value),
        _ => value,
    })
}

fn to_kmh(value: Option<f64>, unit: Option<&String>) -> Option<f64> {
    let value = value?;
    Some(match unit.map(String::as_str) {
        Some("mp/h") | Some("mph") => mph_to_kmh(value),
        Some("m/s") => mps_to_kmh(value),
        Some("kn") => value * 1.852,
        _ => value,
    })
}

fn to_mm(value: Option<f64>, unit: Option<&String>) -> Option<f64> {
    let value = value?;
    Some(match unit.map(String::as_str) {
        Some("inch") => inches_to_mm(value),
        _ => value,
    })
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> ForecastPayload {
        serde_json::from_value(value).expect("valid payload")
    }

    fn fixed_now() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_792_324_800, 0).unwrap()
    }

    #[test]
    fn current_block_is_normalized() {
        let p = payload(json!({
            "utc_offset_seconds": -14400,
            "current_units": { "temperature_2m": "°C", "wind_speed_10m": "km/h" },
            "current": {
                "time": 1_760_800_000,
                "temperature_2m": 20.0,
                "relative_humidity_2m": 50,
                "apparent_temperature": 19.2,
                "weather_code": 95,
                "wind_speed_10m": 12.5,
                "wind_direction_10m": 180,
                "surface_pressure": 1012.3
            }
        }));

        let SectionData::Current(c) = normalize(p, Section::Current, fixed_now()).unwrap() else {
            panic!("expected current");
        };
        assert_eq!(c.temperature_c, Some(20.0));
        assert_eq!(c.condition, InternalCondition::Thunderstorm);
        assert_eq!(c.wind_speed_kmh, Some(12.5));
        assert_eq!(c.observed_at.timestamp(), 1_760_800_000);
        assert_eq!(c.dew_point_c, None);
    }

    #[test]
    fn missing_observation_time_uses_given_now() {
        let p = payload(json!({ "current": { "temperature_2m": 5.0 } }));

        let SectionData::Current(c) = normalize(p, Section::Current, fixed_now()).unwrap() else {
            panic!("expected current");
        };
        assert_eq!(c.observed_at, fixed_now());
    }

    #[test]
    fn overflowing_daily_timestamp_is_dropped() {
        let p = payload(json!({
            "utc_offset_seconds": 3600,
            "daily": {
                "time": [i64::MAX, 1_792_296_000],
                "weather_code": [0, 3],
                "temperature_2m_max": [30.0, 18.0],
                "temperature_2m_min": [20.0, 9.0]
            }
        }));

        let SectionData::Daily(d) = normalize(p, Section::Daily, fixed_now()).unwrap() else {
            panic!("expected daily");
        };
        assert_eq!(d.len(), 1);
        assert_eq!(d[0].condition, InternalCondition::Cloudy);
    }

    #[test]
    fn imperial_units_are_converted_back_to_metric() {
        let p = payload(json!({
            "current_units": {
                "temperature_2m": "°F",
                "apparent_temperature": "°F",
                "wind_speed_10m": "mp/h"
            },
            "current": {
                "time": 1_760_800_000,
                "temperature_2m": 212.0,
                "apparent_temperature": 32.0,
                "wind_speed_10m": 10.0
            }
        }));

        let SectionData::Current(c) = normalize(p, Section::Current, fixed_now()).unwrap() else {
            panic!("expected current");
        };
        assert!((c.temperature_c.unwrap() - 100.0).abs() < 1e-9);
        assert!(c.feels_like_c.unwrap().abs() < 1e-9);
        assert!((c.wind_speed_kmh.unwrap() - 16.09344).abs() < 1e-6);
        assert_eq!(c.condition, InternalCondition::Unknown);
    }

    #[test]
    fn bad_numbers_become_none() {
        let p = payload(json!({
            "hourly": {
                "time": [1_760_800_000, 1_760_803_600],
                "temperature_2m": ["oops", 11.5],
                "weather_code": [61, null],
                "precipitation": [0.4],
                "wind_speed_10m": [5, 6],
                "relative_humidity_2m": [80, 82]
            }
        }));

        let SectionData::Hourly(h) = normalize(p, Section::Hourly, fixed_now()).unwrap() else {
            panic!("expected hourly");
        };
        assert_eq!(h.len(), 2);
        assert_eq!(h[0].temperature_c, None);
        assert_eq!(h[0].condition, InternalCondition::Rain);
        assert_eq!(h[0].precipitation_mm, Some(0.4));
        assert_eq!(h[1].temperature_c, Some(11.5));
        assert_eq!(h[1].condition, InternalCondition::Unknown);
        assert_eq!(h[1].precipitation_mm, None);
    }

    #[test]
    fn daily_dates_use_local_offset() {
        // 2026-10-18T04:00:00Z is local midnight at UTC-4.
        let p = payload(json!({
            "utc_offset_seconds": -14400,
            "daily": {
                "time": [1_792_296_000],
                "weather_code": [3],
                "temperature_2m_max": [18.0],
                "temperature_2m_min": [9.0]
            }
        }));

        let SectionData::Daily(d) = normalize(p, Section::Daily, fixed_now()).unwrap() else {
            panic!("expected daily");
        };
        assert_eq!(d[0].date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(d[0].condition, InternalCondition::Cloudy);
        assert_eq!(d[0].temp_max_c, Some(18.0));
    }

    #[test]
    fn missing_block_is_invalid_response() {
        let err = normalize(payload(json!({})), Section::Daily, fixed_now()).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn recent_reuses_hourly_block() {
        let p = payload(json!({ "hourly": { "time": [1_760_800_000], "temperature_2m": [4.0] } }));
        let data = normalize(p, Section::Recent, fixed_now()).unwrap();
        assert_eq!(data.section(), Section::Recent);
    }
}

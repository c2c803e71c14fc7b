use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{
    condition::{ConditionScheme, InternalCondition, normalize as normalize_code, tomorrow_io_text},
    error::ProviderError,
    http::{fetch_json, lenient_f64},
    model::{Coordinates, CurrentConditions, DailyEntry, HourlyEntry, Section},
    units::mps_to_kmh,
};

use super::{SectionData, WeatherProviderResponse, WeatherSource};

const DEFAULT_BASE_URL: &str = "https://api.tomorrow.io";

#[derive(Debug, Clone)]
pub struct TomorrowIoSource {
    api_key: String,
    http: Client,
    base_url: String,
}

impl TomorrowIoSource {
    pub fn new(http: Client, api_key: String) -> Self {
        Self::with_base_url(http, api_key, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(http: Client, api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(section: Section) -> (&'static str, Option<&'static str>) {
        match section {
            Section::Current => ("/v4/weather/realtime", None),
            Section::Hourly => ("/v4/weather/forecast", Some("1h")),
            Section::Daily => ("/v4/weather/forecast", Some("1d")),
            Section::Recent => ("/v4/weather/history/recent", Some("1h")),
        }
    }
}

#[async_trait]
impl WeatherSource for TomorrowIoSource {
    fn id(&self) -> &str {
        "tomorrow-io"
    }

    fn supports(&self, _section: Section) -> bool {
        true
    }

    async fn fetch(
        &self,
        section: Section,
        coords: Coordinates,
    ) -> Result<WeatherProviderResponse, ProviderError> {
        let (path, timesteps) = Self::endpoint(section);
        let url = format!("{}{}", self.base_url, path);
        let location = format!("{},{}", coords.latitude, coords.longitude);

        let mut query = vec![
            ("location", location),
            ("units", "metric".to_string()),
            ("apikey", self.api_key.clone()),
        ];
        if let Some(steps) = timesteps {
            query.push(("timesteps", steps.to_string()));
        }

        let request = self.http.get(url).query(&query);
        match section {
            Section::Current => Ok(WeatherProviderResponse::TomorrowIoRealtime(fetch_json(request).await?)),
            _ => Ok(WeatherProviderResponse::TomorrowIoTimelines(fetch_json(request).await?)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RealtimePayload {
    data: RealtimeData,
}

#[derive(Debug, Clone, Deserialize)]
struct RealtimeData {
    time: Option<DateTime<Utc>>,
    values: Values,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelinesPayload {
    timelines: Timelines,
}

#[derive(Debug, Clone, Deserialize)]
struct Timelines {
    #[serde(default)]
    hourly: Vec<Interval>,
    #[serde(default)]
    daily: Vec<Interval>,
}

#[derive(Debug, Clone, Deserialize)]
struct Interval {
    time: String,
    values: Values,
}

/// Metric units: °C, m/s, mm/h, hPa.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Values {
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature_apparent: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    humidity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_speed: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    wind_direction: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pressure_surface_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    dew_point: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    weather_code: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    weather_code_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    precipitation_intensity: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature_max: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    temperature_min: Option<f64>,
}

/// `now` stands in for a missing observation time.
pub fn normalize_realtime(
    payload: RealtimePayload,
    now: DateTime<Utc>,
) -> Result<CurrentConditions, ProviderError> {
    let values = payload.data.values;

    Ok(CurrentConditions {
        temperature_c: values.temperature,
        feels_like_c: values.temperature_apparent,
        humidity_pct: values.humidity,
        wind_speed_kmh: values.wind_speed.map(mps_to_kmh),
        wind_direction_deg: values.wind_direction,
        pressure_hpa: values.pressure_surface_level,
        dew_point_c: values.dew_point,
        condition: condition(values.weather_code),
        summary: values
            .weather_code
            .and_then(|code| tomorrow_io_text(code.round() as i64))
            .map(str::to_string),
        observed_at: payload.data.time.unwrap_or(now),
    })
}

pub fn normalize_timelines(
    payload: TimelinesPayload,
    section: Section,
) -> Result<SectionData, ProviderError> {
    let Timelines { hourly, daily } = payload.timelines;

    match section {
        Section::Hourly => Ok(SectionData::Hourly(hourly_entries(hourly))),
        Section::Recent => Ok(SectionData::Recent(hourly_entries(hourly))),
        Section::Daily => Ok(SectionData::Daily(
            daily
                .into_iter()
                .filter_map(|interval| {
                    // The date is the local calendar day the provider reports.
                    let date = interval
                        .time
                        .split('T')
                        .next()
                        .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())?;
                    let values = interval.values;
                    Some(DailyEntry {
                        date,
                        temp_max_c: values.temperature_max,
                        temp_min_c: values.temperature_min,
                        condition: condition(values.weather_code_max.or(values.weather_code)),
                    })
                })
                .collect(),
        )),
        Section::Current => Err(ProviderError::InvalidResponse(
            "timelines payload cannot fill the current section".to_string(),
        )),
    }
}

fn hourly_entries(intervals: Vec<Interval>) -> Vec<HourlyEntry> {
    intervals
        .into_iter()
        .filter_map(|interval| {
            let time = DateTime::parse_from_rfc3339(&interval.time)
                .ok()?
                .with_timezone(&Utc);
            let values = interval.values;
            Some(HourlyEntry {
                time,
                temperature_c: values.temperature,
                condition: condition(values.weather_code),
                // Intensity is mm/h over a one-hour step.
                precipitation_mm: values.precipitation_intensity,
                wind_speed_kmh: values.wind_speed.map(mps_to_kmh),
                humidity_pct: values.humidity,
            })
        })
        .collect()
}

fn condition(code: Option<f64>) -> InternalCondition {
    code.map(|c| normalize_code(ConditionScheme::TomorrowIo, c.round() as i64))
        .unwrap_or(InternalCondition::Unknown)
}

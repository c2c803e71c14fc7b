//! Plain-text and JSON output. Converts from metric only here, at display
//! time.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use stormsurge_core::{
    AppState, ResolvedLocation, Status, UnitPreference, WeatherSnapshot,
    model::{CurrentConditions, DailyEntry, HourlyEntry},
    units::compass_sector,
};

const PLACEHOLDER: &str = "--";
const HOURS_SHOWN: usize = 12;
const RECENT_SHOWN: usize = 6;

pub const UNAVAILABLE: &str = "Weather data unavailable. Please try again later.";

fn temp(units: UnitPreference, celsius: Option<f64>) -> String {
    match celsius {
        Some(c) => format!("{:.0}{}", units.temperature(c), units.temperature_symbol()),
        None => PLACEHOLDER.to_string(),
    }
}

fn speed(units: UnitPreference, kmh: Option<f64>) -> String {
    match kmh {
        Some(v) => format!("{:.0} {}", units.speed(v), units.speed_symbol()),
        None => PLACEHOLDER.to_string(),
    }
}

fn precipitation(units: UnitPreference, mm: Option<f64>) -> String {
    match (mm, units) {
        (Some(v), UnitPreference::Fahrenheit) => {
            format!("{:.2} {}", units.precipitation(v), units.precipitation_symbol())
        }
        (Some(v), UnitPreference::Celsius) => {
            format!("{:.1} {}", units.precipitation(v), units.precipitation_symbol())
        }
        (None, _) => PLACEHOLDER.to_string(),
    }
}

fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.0}%"))
        .unwrap_or_else(|| PLACEHOLDER.to_string())
}

fn current_lines(current: &CurrentConditions, units: UnitPreference) -> Vec<String> {
    let wind = match (current.wind_speed_kmh, current.wind_direction_deg) {
        (Some(_), Some(deg)) => format!("{} {}", speed(units, current.wind_speed_kmh), compass_sector(deg)),
        _ => speed(units, current.wind_speed_kmh),
    };
    let pressure = current
        .pressure_hpa
        .map(|p| format!("{p:.0} hPa"))
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    let headline = match &current.summary {
        Some(summary) if summary.as_str() != current.condition.description() => {
            format!("{} {} ({summary})", current.condition.icon(), current.condition.description())
        }
        _ => format!("{} {}", current.condition.icon(), current.condition.description()),
    };

    vec![
        headline,
        format!(
            "Temperature  {} (feels like {})",
            temp(units, current.temperature_c),
            temp(units, current.feels_like_c)
        ),
        format!("Humidity     {}", percent(current.humidity_pct)),
        format!("Wind         {wind}"),
        format!("Pressure     {pressure}"),
        format!("Dew point    {}", temp(units, current.dew_point_c)),
    ]
}

fn hourly_line<Tz: TimeZone>(entry: &HourlyEntry, units: UnitPreference, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "  {}  {}  {:>5}  {:>8}  {}",
        entry.time.with_timezone(tz).format("%a %H:%M"),
        entry.condition.icon(),
        temp(units, entry.temperature_c),
        precipitation(units, entry.precipitation_mm),
        entry.condition.description()
    )
}

fn daily_line(entry: &DailyEntry, units: UnitPreference) -> String {
    format!(
        "  {}  {}  {:>5} / {:<5}  {}",
        entry.date.format("%a %d %b"),
        entry.condition.icon(),
        temp(units, entry.temp_max_c),
        temp(units, entry.temp_min_c),
        entry.condition.description()
    )
}

/// Text view of a snapshot. Times are shown in `tz`.
pub fn snapshot_text<Tz: TimeZone>(
    location: &ResolvedLocation,
    snapshot: &WeatherSnapshot,
    units: UnitPreference,
    tz: &Tz,
) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut lines = vec![format!(
        "{} ({})",
        location.display_label,
        location.coordinates.label()
    )];

    if snapshot.is_unavailable() {
        lines.push(UNAVAILABLE.to_string());
        return lines.join("\n");
    }

    match &snapshot.current {
        Some(current) => lines.extend(current_lines(current, units)),
        None => lines.push(format!("Current conditions {PLACEHOLDER}")),
    }

    if let Some(hourly) = &snapshot.hourly {
        lines.push(String::new());
        lines.push("Next hours".to_string());
        lines.extend(hourly.iter().take(HOURS_SHOWN).map(|e| hourly_line(e, units, tz)));
    }

    if let Some(daily) = &snapshot.daily {
        lines.push(String::new());
        lines.push("Next days".to_string());
        lines.extend(daily.iter().map(|e| daily_line(e, units)));
    }

    if let Some(recent) = &snapshot.recent {
        let skip = recent.len().saturating_sub(RECENT_SHOWN);
        lines.push(String::new());
        lines.push("Past hours".to_string());
        lines.extend(recent.iter().skip(skip).map(|e| hourly_line(e, units, tz)));
    }

    if snapshot.is_partial() {
        let failed: Vec<&str> = snapshot.source_failures.iter().map(String::as_str).collect();
        lines.push(String::new());
        lines.push(format!("Some data unavailable ({}).", failed.join(", ")));
    }

    lines.push(format!(
        "Updated {}",
        snapshot.fetched_at.with_timezone(tz).format("%Y-%m-%d %H:%M")
    ));

    lines.join("\n")
}

/// Text view of whatever the controller currently holds.
pub fn state_text<Tz: TimeZone>(state: &AppState, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match (&state.status, &state.location, &state.snapshot) {
        (Status::Failed { message }, _, _) => message.clone(),
        (Status::Loading { query }, _, _) => format!("Looking up {query}..."),
        (_, Some(location), Some(snapshot)) => snapshot_text(location, snapshot, state.units, tz),
        (_, Some(location), None) => format!("{}\n{UNAVAILABLE}", location.display_label),
        (_, None, _) => "No location selected.".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    location: &'a ResolvedLocation,
    units: UnitPreference,
    unavailable: bool,
    snapshot: &'a WeatherSnapshot,
}

/// JSON view. Values stay metric; `units` only records the display choice.
pub fn snapshot_json(
    location: &ResolvedLocation,
    snapshot: &WeatherSnapshot,
    units: UnitPreference,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&Report {
        location,
        units,
        unavailable: snapshot.is_unavailable(),
        snapshot,
    })
}

pub fn radar_json(
    location: &ResolvedLocation,
    tile_url: &str,
    template: &str,
    frame_time: Option<DateTime<Utc>>,
) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "location": location,
        "tile_url": tile_url,
        "template": template,
        "frame_time": frame_time,
    }))
}

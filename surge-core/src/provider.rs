use std::{convert::TryFrom, fmt::Debug, sync::Arc};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;

use crate::{
    Config,
    aggregator::WeatherAggregator,
    error::ProviderError,
    geocode::{
        Geocoder, mapbox::MapboxGeocoder, nominatim::NominatimGeocoder,
        open_meteo::OpenMeteoGeocoder, zippopotam::ZippopotamGeocoder,
    },
    model::{Coordinates, CurrentConditions, DailyEntry, HourlyEntry, Section},
    provider::{open_meteo::OpenMeteoSource, tomorrow_io::TomorrowIoSource},
    resolver::LocationResolver,
};

pub mod open_meteo;
pub mod tomorrow_io;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderId {
    OpenMeteo,
    TomorrowIo,
    Zippopotam,
    Nominatim,
    Mapbox,
    RainViewer,
}

impl ProviderId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::OpenMeteo => "open-meteo",
            ProviderId::TomorrowIo => "tomorrow-io",
            ProviderId::Zippopotam => "zippopotam",
            ProviderId::Nominatim => "nominatim",
            ProviderId::Mapbox => "mapbox",
            ProviderId::RainViewer => "rainviewer",
        }
    }

    pub const fn all() -> &'static [ProviderId] {
        &[
            ProviderId::OpenMeteo,
            ProviderId::TomorrowIo,
            ProviderId::Zippopotam,
            ProviderId::Nominatim,
            ProviderId::Mapbox,
            ProviderId::RainViewer,
        ]
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, ProviderId::TomorrowIo | ProviderId::Mapbox)
    }

    pub fn geocodes(&self) -> bool {
        matches!(
            self,
            ProviderId::OpenMeteo | ProviderId::Zippopotam | ProviderId::Nominatim | ProviderId::Mapbox
        )
    }

    pub fn serves_weather(&self) -> bool {
        matches!(self, ProviderId::OpenMeteo | ProviderId::TomorrowIo)
    }
}

impl std::fmt::Display for ProviderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ProviderId {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let lower = value.to_lowercase();

        match lower.as_str() {
            "open-meteo" | "openmeteo" => Ok(ProviderId::OpenMeteo),
            "tomorrow-io" | "tomorrow" | "tomorrowio" => Ok(ProviderId::TomorrowIo),
            "zippopotam" => Ok(ProviderId::Zippopotam),
            "nominatim" => Ok(ProviderId::Nominatim),
            "mapbox" => Ok(ProviderId::Mapbox),
            "rainviewer" => Ok(ProviderId::RainViewer),
            _ => Err(anyhow!(
                "Unknown provider '{value}'. Supported providers: open-meteo, tomorrow-io, \
                 zippopotam, nominatim, mapbox, rainviewer."
            )),
        }
    }
}

/// A provider payload, tagged by the provider and endpoint it came from.
/// Each variant has its own normalizer.
#[derive(Debug, Clone)]
pub enum WeatherProviderResponse {
    OpenMeteo(open_meteo::ForecastPayload),
    TomorrowIoRealtime(tomorrow_io::RealtimePayload),
    TomorrowIoTimelines(tomorrow_io::TimelinesPayload),
}

/// One section in the internal shape (°C, km/h, mm).
#[derive(Debug, Clone, PartialEq)]
pub enum SectionData {
    Current(CurrentConditions),
    Hourly(Vec<HourlyEntry>),
    Daily(Vec<DailyEntry>),
    Recent(Vec<HourlyEntry>),
}

impl SectionData {
    pub fn section(&self) -> Section {
        match self {
            SectionData::Current(_) => Section::Current,
            SectionData::Hourly(_) => Section::Hourly,
            SectionData::Daily(_) => Section::Daily,
            SectionData::Recent(_) => Section::Recent,
        }
    }
}

/// Routes a tagged payload through its provider's normalizer.
pub fn normalize(
    response: WeatherProviderResponse,
    section: Section,
    now: DateTime<Utc>,
) -> Result<SectionData, ProviderError> {
    match response {
        WeatherProviderResponse::OpenMeteo(payload) => open_meteo::normalize(payload, section, now),
        WeatherProviderResponse::TomorrowIoRealtime(payload) => match section {
            Section::Current => Ok(SectionData::Current(tomorrow_io::normalize_realtime(payload, now)?)),
            other => Err(ProviderError::InvalidResponse(format!(
                "realtime payload cannot fill the {other} section"
            ))),
        },
        WeatherProviderResponse::TomorrowIoTimelines(payload) => {
            tomorrow_io::normalize_timelines(payload, section)
        }
    }
}

#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    /// Identifier reported in `WeatherSnapshot::source_failures`.
    fn id(&self) -> &str;

    fn supports(&self, section: Section) -> bool;

    async fn fetch(
        &self,
        section: Section,
        coords: Coordinates,
    ) -> Result<WeatherProviderResponse, ProviderError>;
}

/// Base URL override from config, if any.
fn base_url(config: &Config, id: ProviderId) -> Option<String> {
    config
        .provider_config(id)
        .and_then(|cfg| cfg.base_url.clone())
        .filter(|url| !url.trim().is_empty())
}

fn required_api_key(config: &Config, id: ProviderId) -> anyhow::Result<String> {
    config.provider_api_key(id).map(str::to_owned).ok_or_else(|| {
        anyhow!(
            "No API key configured for provider '{id}'.\n\
             Hint: run `surge configure {id}` and enter your API key."
        )
    })
}

/// Construct a geocoder from config and explicit ProviderId.
pub fn geocoder_from_config(
    id: ProviderId,
    config: &Config,
    http: &Client,
) -> anyhow::Result<Box<dyn Geocoder>> {
    let base = base_url(config, id);
    let http = http.clone();

    let boxed: Box<dyn Geocoder> = match id {
        ProviderId::Zippopotam => Box::new(match base {
            Some(url) => ZippopotamGeocoder::with_base_url(http, url),
            None => ZippopotamGeocoder::new(http),
        }),
        ProviderId::OpenMeteo => Box::new(match base {
            Some(url) => OpenMeteoGeocoder::with_base_url(http, url),
            None => OpenMeteoGeocoder::new(http),
        }),
        ProviderId::Nominatim => Box::new(match base {
            Some(url) => NominatimGeocoder::with_base_url(http, url),
            None => NominatimGeocoder::new(http),
        }),
        ProviderId::Mapbox => {
            let token = required_api_key(config, id)?;
            Box::new(match base {
                Some(url) => MapboxGeocoder::with_base_url(http, token, url),
                None => MapboxGeocoder::new(http, token),
            })
        }
        ProviderId::TomorrowIo | ProviderId::RainViewer => {
            return Err(anyhow!("Provider '{id}' does not offer geocoding."));
        }
    };

    Ok(boxed)
}

/// Construct a weather source from config and explicit ProviderId.
pub fn weather_source_from_config(
    id: ProviderId,
    config: &Config,
    http: &Client,
) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let base = base_url(config, id);
    let http = http.clone();

    let source: Arc<dyn WeatherSource> = match id {
        ProviderId::OpenMeteo => Arc::new(match base {
            Some(url) => OpenMeteoSource::with_base_url(http, url),
            None => OpenMeteoSource::new(http),
        }),
        ProviderId::TomorrowIo => {
            let api_key = required_api_key(config, id)?;
            Arc::new(match base {
                Some(url) => TomorrowIoSource::with_base_url(http, api_key, url),
                None => TomorrowIoSource::new(http, api_key),
            })
        }
        _ => return Err(anyhow!("Provider '{id}' does not offer weather data.")),
    };

    Ok(source)
}

/// Build the geocoding chain in configured order. Providers that cannot be
/// constructed (e.g. a missing API key) are skipped with a warning.
pub fn resolver_from_config(config: &Config, http: &Client) -> anyhow::Result<LocationResolver> {
    let mut geocoders = Vec::new();

    for id in config.geocoder_ids()? {
        if !id.geocodes() {
            return Err(anyhow!(
                "Provider '{id}' listed in `geocoders` does not offer geocoding."
            ));
        }
        match geocoder_from_config(id, config, http) {
            Ok(geocoder) => geocoders.push(geocoder),
            Err(error) => tracing::warn!(provider = %id, "skipping geocoder: {error}"),
        }
    }

    Ok(LocationResolver::new(geocoders, config.request_timeout()))
}

/// Build the aggregator from the `[sources]` routing table.
pub fn aggregator_from_config(config: &Config, http: &Client) -> anyhow::Result<WeatherAggregator> {
    let mut aggregator = WeatherAggregator::new(config.request_timeout());

    for (section, id) in config.sources.routes()? {
        match weather_source_from_config(id, config, http) {
            Ok(source) => {
                if !source.supports(section) {
                    return Err(anyhow!("Provider '{id}' cannot serve the {section} section."));
                }
                aggregator = aggregator.route(section, source);
            }
            Err(error) => tracing::warn!(provider = %id, %section, "skipping source: {error}"),
        }
    }

    Ok(aggregator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn client() -> Client {
        Client::new()
    }

    #[test]
    fn provider_id_as_str_roundtrip() {
        for id in ProviderId::all() {
            let s = id.as_str();
            let parsed = ProviderId::try_from(s).expect("roundtrip should succeed");
            assert_eq!(*id, parsed);
        }
    }

    #[test]
    fn unknown_provider_error() {
        let err = ProviderId::try_from("doesnotexist").unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn weather_source_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = weather_source_from_config(ProviderId::TomorrowIo, &cfg, &client()).unwrap_err();
        assert!(err.to_string().contains("No API key configured for provider"));
        assert!(err.to_string().contains("surge configure tomorrow-io"));
    }

    #[test]
    fn weather_source_works_when_configured() {
        let mut cfg = Config::default();
        cfg.upsert_provider_api_key(ProviderId::TomorrowIo, "KEY".to_string());

        let source = weather_source_from_config(ProviderId::TomorrowIo, &cfg, &client())
            .expect("configured");
        assert_eq!(source.id(), "tomorrow-io");
        assert!(source.supports(Section::Recent));
    }

    #[test]
    fn geocoder_rejects_weather_only_provider() {
        let cfg = Config::default();
        let err = geocoder_from_config(ProviderId::TomorrowIo, &cfg, &client()).unwrap_err();
        assert!(err.to_string().contains("does not offer geocoding"));
    }

    #[test]
    fn resolver_skips_mapbox_without_token() {
        let cfg = Config::default();
        let resolver = resolver_from_config(&cfg, &client()).expect("default chain");
        let ids = resolver.geocoder_ids();
        assert_eq!(ids, vec!["zippopotam", "open-meteo", "nominatim"]);
    }

    #[test]
    fn aggregator_routes_default_sources() {
        let cfg = Config::default();
        let aggregator = aggregator_from_config(&cfg, &client()).expect("default routing");
        assert_eq!(aggregator.source_for(Section::Current), Some("open-meteo"));
        assert_eq!(aggregator.source_for(Section::Hourly), Some("open-meteo"));
        assert_eq!(aggregator.source_for(Section::Daily), Some("open-meteo"));
        assert_eq!(aggregator.source_for(Section::Recent), Some("open-meteo"));
    }

    #[test]
    fn normalize_rejects_realtime_payload_for_daily() {
        let payload: tomorrow_io::RealtimePayload = serde_json::from_value(serde_json::json!({
            "data": { "time": "2026-10-18T12:00:00Z", "values": { "temperature": 10.0 } }
        }))
        .unwrap();
        let err = normalize(WeatherProviderResponse::TomorrowIoRealtime(payload), Section::Daily, Utc::now())
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }
}

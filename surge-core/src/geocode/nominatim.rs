//! Forward geocoding through Nominatim (OpenStreetMap). No key, but a user
//! agent is mandatory.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::ProviderError,
    http::{fetch_json, lenient_f64},
};

use super::{GeocodeCandidate, Geocoder, QueryKind, join_label};

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    http: Client,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(http: Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    #[serde(default, deserialize_with = "lenient_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lon: Option<f64>,
    display_name: Option<String>,
    address: Option<NominatimAddress>,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    municipality: Option<String>,
    county: Option<String>,
    state: Option<String>,
    country: Option<String>,
}

impl NominatimPlace {
    /// City/town/village plus state (or country), falling back to the first
    /// two parts of `display_name`.
    fn label(&self) -> String {
        if let Some(addr) = &self.address {
            let place = addr
                .city
                .as_deref()
                .or(addr.town.as_deref())
                .or(addr.village.as_deref())
                .or(addr.municipality.as_deref())
                .or(addr.county.as_deref());
            let region = addr.state.as_deref().or(addr.country.as_deref());

            if let Some(place) = place {
                return join_label(place, region);
            }
            if let Some(region) = region {
                return region.to_string();
            }
        }

        self.display_name
            .as_deref()
            .map(|name| {
                name.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .take(2)
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn id(&self) -> &str {
        "nominatim"
    }

    fn handles(&self, kind: QueryKind) -> bool {
        kind == QueryKind::Text
    }

    async fn lookup(&self, query: &str) -> Result<GeocodeCandidate, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let places: Vec<NominatimPlace> = fetch_json(self.http.get(url).query(&[
            ("q", query),
            ("format", "jsonv2"),
            ("limit", "1"),
            ("addressdetails", "1"),
        ]))
        .await?;

        let place = places.into_iter().next().ok_or(ProviderError::NoResults)?;
        let (Some(latitude), Some(longitude)) = (place.lat, place.lon) else {
            return Err(ProviderError::InvalidResponse(
                "nominatim payload: non-numeric coordinates".to_string(),
            ));
        };

        Ok(GeocodeCandidate {
            latitude,
            longitude,
            display_name: place.label(),
        })
    }
}

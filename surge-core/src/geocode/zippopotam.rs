use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::{
    error::ProviderError,
    http::{fetch_json, lenient_f64},
};

use super::{GeocodeCandidate, Geocoder, QueryKind, join_label};

const DEFAULT_BASE_URL: &str = "https://api.zippopotam.us";

/// US ZIP code lookup. Unknown codes come back as a 404 with `{}`.
#[derive(Debug, Clone)]
pub struct ZippopotamGeocoder {
    http: Client,
    base_url: String,
}

impl ZippopotamGeocoder {
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
struct ZipResponse {
    #[serde(default)]
    places: Vec<ZipPlace>,
}

#[derive(Debug, Deserialize)]
struct ZipPlace {
    #[serde(rename = "place name", default)]
    place_name: String,
    #[serde(rename = "state abbreviation", default)]
    state_abbreviation: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    longitude: Option<f64>,
}

#[async_trait]
impl Geocoder for ZippopotamGeocoder {
    fn id(&self) -> &str {
        "zippopotam"
    }

    fn handles(&self, kind: QueryKind) -> bool {
        kind == QueryKind::Zip
    }

    async fn lookup(&self, query: &str) -> Result<GeocodeCandidate, ProviderError> {
        let url = format!("{}/us/{}", self.base_url, query);
        let parsed: ZipResponse = fetch_json(self.http.get(url)).await?;

        let place = parsed.places.into_iter().next().ok_or(ProviderError::NoResults)?;
        let (Some(latitude), Some(longitude)) = (place.latitude, place.longitude) else {
            return Err(ProviderError::InvalidResponse(
                "zippopotam payload: non-numeric coordinates".to_string(),
            ));
        };

        Ok(GeocodeCandidate {
            latitude,
            longitude,
            display_name: join_label(&place.place_name, place.state_abbreviation.as_deref()),
        })
    }
}

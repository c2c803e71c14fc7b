use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{error::ProviderError, http::fetch_json};

use super::{GeocodeCandidate, Geocoder, QueryKind, join_label};

const DEFAULT_BASE_URL: &str = "https://geocoding-api.open-meteo.com";

#[derive(Debug, Clone)]
pub struct OpenMeteoGeocoder {
    http: Client,
    base_url: String,
}

impl OpenMeteoGeocoder {
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

#[derive(Debug, Serialize)]
struct SearchQuery<'a> {
    name: &'a str,
    count: u8,
    language: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    name: String,
    latitude: f64,
    longitude: f64,
    admin1: Option<String>,
    country: Option<String>,
}

#[async_trait]
impl Geocoder for OpenMeteoGeocoder {
    fn id(&self) -> &str {
        "open-meteo"
    }

    fn handles(&self, kind: QueryKind) -> bool {
        kind == QueryKind::Text
    }

    async fn lookup(&self, query: &str) -> Result<GeocodeCandidate, ProviderError> {
        let url = format!("{}/v1/search", self.base_url);
        let search = SearchQuery {
            name: query,
            count: 1,
            language: "en",
            format: "json",
        };

        let parsed: SearchResponse = fetch_json(self.http.get(url).query(&search)).await?;
        let result = parsed.results.into_iter().next().ok_or(ProviderError::NoResults)?;
        let region = result.admin1.as_deref().or(result.country.as_deref());

        Ok(GeocodeCandidate {
            latitude: result.latitude,
            longitude: result.longitude,
            display_name: join_label(&result.name, region),
        })
    }
}

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{error::ProviderError, http::fetch_json};

use super::{GeocodeCandidate, Geocoder, QueryKind};

const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

/// Mapbox Geocoding v5. Needs an access token.
#[derive(Debug, Clone)]
pub struct MapboxGeocoder {
    access_token: String,
    http: Client,
    base_url: String,
}

impl MapboxGeocoder {
    pub fn new(http: Client, access_token: String) -> Self {
        Self::with_base_url(http, access_token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(http: Client, access_token: String, base_url: String) -> Self {
        Self {
            access_token,
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// The query is a path segment, so it has to be percent-encoded there.
    fn places_url(&self, query: &str) -> Result<Url, ProviderError> {
        let file = format!("{query}.json");
        let mut url = Url::parse(&self.base_url)
            .map_err(|error| ProviderError::Transport(format!("bad mapbox base url: {error}")))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Transport("mapbox base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places", file.as_str()]);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    /// `[longitude, latitude]`
    center: Vec<f64>,
    place_name: Option<String>,
    text: Option<String>,
}

#[async_trait]
impl Geocoder for MapboxGeocoder {
    fn id(&self) -> &str {
        "mapbox"
    }

    fn handles(&self, kind: QueryKind) -> bool {
        kind == QueryKind::Text
    }

    async fn lookup(&self, query: &str) -> Result<GeocodeCandidate, ProviderError> {
        let url = self.places_url(query)?;
        let parsed: FeatureCollection = fetch_json(
            self.http
                .get(url)
                .query(&[("access_token", self.access_token.as_str()), ("limit", "1")]),
        )
        .await?;

        let feature = parsed.features.into_iter().next().ok_or(ProviderError::NoResults)?;
        let [longitude, latitude] = feature.center[..] else {
            return Err(ProviderError::InvalidResponse(
                "mapbox payload: center is not a coordinate pair".to_string(),
            ));
        };

        // place_name is long ("Columbus, Ohio, United States"); keep two parts.
        let display_name = feature
            .place_name
            .as_deref()
            .map(|name| name.split(',').map(str::trim).take(2).collect::<Vec<_>>().join(", "))
            .or(feature.text)
            .unwrap_or_default();

        Ok(GeocodeCandidate {
            latitude,
            longitude,
            display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_encoded_as_a_path_segment() {
        let geocoder = MapboxGeocoder::with_base_url(
            Client::new(),
            "tok".to_string(),
            "https://api.mapbox.com/".to_string(),
        );
        let url = geocoder.places_url("New York/NY").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.mapbox.com/geocoding/v5/mapbox.places/New%20York%2FNY.json"
        );
    }
}

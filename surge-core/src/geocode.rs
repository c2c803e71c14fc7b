//! Geocoding providers: free text or ZIP code in, coordinates and a label out.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::ProviderError;

pub mod mapbox;
pub mod nominatim;
pub mod open_meteo;
pub mod zippopotam;

/// Shape of a location query, which decides the provider chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// Exactly five ASCII digits.
    Zip,
    Text,
}

impl QueryKind {
    pub fn of(query: &str) -> Self {
        if query.len() == 5 && query.bytes().all(|b| b.is_ascii_digit()) {
            QueryKind::Zip
        } else {
            QueryKind::Text
        }
    }
}

/// First match returned by a provider, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeCandidate {
    pub latitude: f64,
    pub longitude: f64,
    pub display_name: String,
}

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    fn id(&self) -> &str;

    fn handles(&self, kind: QueryKind) -> bool;

    /// Look up `query`. An empty result set is [`ProviderError::NoResults`].
    async fn lookup(&self, query: &str) -> Result<GeocodeCandidate, ProviderError>;
}

/// `"Place, Region"`, skipping empty or duplicate parts.
pub(crate) fn join_label(place: &str, region: Option<&str>) -> String {
    let place = place.trim();
    match region.map(str::trim).filter(|r| !r.is_empty() && *r != place) {
        Some(region) if !place.is_empty() => format!("{place}, {region}"),
        Some(region) => region.to_string(),
        None => place.to_string(),
    }
}

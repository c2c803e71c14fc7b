use std::time::Duration;

use tracing::{debug, warn};

use crate::{
    error::{LocationError, ProviderError},
    geocode::{GeocodeCandidate, Geocoder, QueryKind},
    http::with_deadline,
    model::{Coordinates, LocationSource, ResolvedLocation},
};

/// Turns a free-text query into coordinates by walking a fixed chain of
/// geocoders. ZIP codes go to ZIP-capable providers first and then fall
/// through to the free-text providers.
#[derive(Debug)]
pub struct LocationResolver {
    geocoders: Vec<Box<dyn Geocoder>>,
    attempt_timeout: Duration,
}

impl LocationResolver {
    pub fn new(geocoders: Vec<Box<dyn Geocoder>>, attempt_timeout: Duration) -> Self {
        Self {
            geocoders,
            attempt_timeout,
        }
    }

    pub fn geocoder_ids(&self) -> Vec<&str> {
        self.geocoders.iter().map(|g| g.id()).collect()
    }

    pub async fn resolve(&self, query: &str) -> Result<ResolvedLocation, LocationError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LocationError::NotFound);
        }

        if let Some(coordinates) = Coordinates::parse_pair(query) {
            return Ok(ResolvedLocation {
                display_label: coordinates.label(),
                source: LocationSource::Coordinates,
                coordinates,
            });
        }

        let chain = self.chain(QueryKind::of(query));
        if chain.is_empty() {
            warn!("no geocoders configured");
            return Err(LocationError::AllProvidersUnavailable);
        }

        // Set once any provider actually answered, even if unusably.
        let mut answered = false;

        for (geocoder, source) in chain {
            debug!(provider = geocoder.id(), query, "geocoding attempt");

            let attempt = with_deadline(self.attempt_timeout, geocoder.lookup(query))
                .await
                .and_then(validate);

            match attempt {
                Ok((coordinates, display_label)) => {
                    debug!(provider = geocoder.id(), label = %display_label, "resolved");
                    return Ok(ResolvedLocation {
                        display_label,
                        source,
                        coordinates,
                    });
                }
                Err(error) => {
                    answered |= !error.is_unavailable();
                    warn!(provider = geocoder.id(), query, "geocoding failed: {error}");
                }
            }
        }

        if answered {
            Err(LocationError::NotFound)
        } else {
            Err(LocationError::AllProvidersUnavailable)
        }
    }

    fn chain(&self, kind: QueryKind) -> Vec<(&dyn Geocoder, LocationSource)> {
        let text = self
            .geocoders
            .iter()
            .filter(|g| g.handles(QueryKind::Text))
            .map(|g| (g.as_ref(), LocationSource::Geocoder));

        match kind {
            QueryKind::Zip => self
                .geocoders
                .iter()
                .filter(|g| g.handles(QueryKind::Zip))
                .map(|g| (g.as_ref(), LocationSource::Zip))
                .chain(text.filter(|(g, _)| !g.handles(QueryKind::Zip)))
                .collect(),
            QueryKind::Text => text.collect(),
        }
    }
}

fn validate(candidate: GeocodeCandidate) -> Result<(Coordinates, String), ProviderError> {
    let coordinates = Coordinates::new(candidate.latitude, candidate.longitude).ok_or_else(|| {
        ProviderError::InvalidResponse(format!(
            "coordinates out of range: {}, {}",
            candidate.latitude, candidate.longitude
        ))
    })?;

    let label = candidate.display_name.trim();
    if label.is_empty() {
        return Err(ProviderError::InvalidResponse("empty location label".to_string()));
    }

    Ok((coordinates, label.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;

    #[derive(Debug)]
    struct FakeGeocoder {
        id: &'static str,
        kind: QueryKind,
        result: Result<GeocodeCandidate, ProviderError>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl FakeGeocoder {
        fn new(
            id: &'static str,
            kind: QueryKind,
            result: Result<GeocodeCandidate, ProviderError>,
        ) -> Self {
            Self {
                id,
                kind,
                result,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        fn id(&self) -> &str {
            self.id
        }

        fn handles(&self, kind: QueryKind) -> bool {
            kind == self.kind
        }

        async fn lookup(&self, _query: &str) -> Result<GeocodeCandidate, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.result.clone()
        }
    }

    fn columbus() -> GeocodeCandidate {
        GeocodeCandidate {
            latitude: 39.969,
            longitude: -82.9988,
            display_name: "Columbus, OH".to_string(),
        }
    }

    fn resolver(geocoders: Vec<FakeGeocoder>) -> LocationResolver {
        LocationResolver::new(
            geocoders
                .into_iter()
                .map(|g| Box::new(g) as Box<dyn Geocoder>)
                .collect(),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn blank_queries_fail_without_network() {
        let zip = FakeGeocoder::new("zip", QueryKind::Zip, Ok(columbus()));
        let text = FakeGeocoder::new("text", QueryKind::Text, Ok(columbus()));
        let (zip_calls, text_calls) = (zip.calls.clone(), text.calls.clone());
        let r = resolver(vec![zip, text]);

        for query in ["", "   ", "\t\n"] {
            assert_eq!(r.resolve(query).await, Err(LocationError::NotFound));
        }
        assert_eq!(zip_calls.load(Ordering::SeqCst), 0);
        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zip_goes_to_zip_provider_first() {
        let zip = FakeGeocoder::new("zip", QueryKind::Zip, Ok(columbus()));
        let text = FakeGeocoder::new("text", QueryKind::Text, Err(ProviderError::NoResults));
        let text_calls = text.calls.clone();
        let r = resolver(vec![text, zip]);

        let loc = r.resolve(" 43215 ").await.unwrap();
        assert_eq!(loc.source, LocationSource::Zip);
        assert_eq!(loc.display_label, "Columbus, OH");
        assert!((-90.0..=90.0).contains(&loc.coordinates.latitude));
        assert!((-180.0..=180.0).contains(&loc.coordinates.longitude));
        assert_eq!(text_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_zip_falls_through_to_text_geocoder() {
        let zip = FakeGeocoder::new("zip", QueryKind::Zip, Err(ProviderError::NoResults));
        let text = FakeGeocoder::new("text", QueryKind::Text, Ok(columbus()));
        let r = resolver(vec![zip, text]);

        let loc = r.resolve("43215").await.unwrap();
        assert_eq!(loc.source, LocationSource::Geocoder);
    }

    #[tokio::test]
    async fn text_query_skips_zip_provider() {
        let zip = FakeGeocoder::new("zip", QueryKind::Zip, Ok(columbus()));
        let zip_calls = zip.calls.clone();
        let r = resolver(vec![zip]);

        assert_eq!(r.resolve("Columbus").await, Err(LocationError::AllProvidersUnavailable));
        assert_eq!(zip_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn slow_provider_times_out_and_chain_continues() {
        let slow = FakeGeocoder::new("slow", QueryKind::Text, Ok(columbus()))
            .slow(Duration::from_secs(30));
        let fast = FakeGeocoder::new("fast", QueryKind::Text, Ok(GeocodeCandidate {
            latitude: 42.3478,
            longitude: -71.0466,
            display_name: "Boston, MA".to_string(),
        }));
        let r = resolver(vec![slow, fast]);

        let started = std::time::Instant::now();
        let loc = r.resolve("Boston").await.unwrap();
        assert_eq!(loc.display_label, "Boston, MA");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn invalid_candidates_are_skipped() {
        let bad_coords = FakeGeocoder::new("bad", QueryKind::Text, Ok(GeocodeCandidate {
            latitude: 123.0,
            longitude: 0.0,
            display_name: "Nowhere".to_string(),
        }));
        let blank_label = FakeGeocoder::new("blank", QueryKind::Text, Ok(GeocodeCandidate {
            latitude: 1.0,
            longitude: 1.0,
            display_name: "  ".to_string(),
        }));
        let good = FakeGeocoder::new("good", QueryKind::Text, Ok(columbus()));
        let r = resolver(vec![bad_coords, blank_label, good]);

        assert_eq!(r.resolve("Columbus").await.unwrap().display_label, "Columbus, OH");
    }

    #[tokio::test]
    async fn not_found_when_any_provider_answered() {
        let down = FakeGeocoder::new("down", QueryKind::Text, Err(ProviderError::Timeout));
        let empty = FakeGeocoder::new("empty", QueryKind::Text, Err(ProviderError::NoResults));
        let r = resolver(vec![down, empty]);

        assert_eq!(r.resolve("Atlantis").await, Err(LocationError::NotFound));
    }

    #[tokio::test]
    async fn unavailable_when_every_attempt_fails_in_transport() {
        let down = FakeGeocoder::new("down", QueryKind::Text, Err(ProviderError::Transport(
            "connection refused".into(),
        )));
        let overloaded = FakeGeocoder::new("busy", QueryKind::Text, Err(ProviderError::Http {
            status: 503,
            message: "unavailable".into(),
        }));
        let r = resolver(vec![down, overloaded]);

        assert_eq!(r.resolve("Columbus").await, Err(LocationError::AllProvidersUnavailable));
    }

    #[tokio::test]
    async fn coordinate_pairs_resolve_locally() {
        let text = FakeGeocoder::new("text", QueryKind::Text, Ok(columbus()));
        let calls = text.calls.clone();
        let r = resolver(vec![text]);

        let loc = r.resolve("42.3478,-71.0466").await.unwrap();
        assert_eq!(loc.source, LocationSource::Coordinates);
        assert_eq!(loc.display_label, "42.3478, -71.0466");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}

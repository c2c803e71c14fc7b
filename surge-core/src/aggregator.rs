use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use tracing::{debug, warn};

use crate::{
    error::{ProviderError, WeatherFetchError},
    http::with_deadline,
    model::{Coordinates, CurrentConditions, DailyEntry, HourlyEntry, Section, WeatherSnapshot},
    provider::{SectionData, WeatherSource, normalize},
    units::{UnitPreference, dew_point_c},
};

pub const MAX_HOURLY: usize = 48;
pub const MAX_DAILY: usize = 10;
pub const MAX_RECENT: usize = 24;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Fans a fetch cycle out to the sources routed for each section and folds
/// whatever comes back into one [`WeatherSnapshot`].
pub struct WeatherAggregator {
    routes: BTreeMap<Section, Arc<dyn WeatherSource>>,
    call_timeout: Duration,
    clock: Clock,
}

impl std::fmt::Debug for WeatherAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherAggregator")
            .field("routes", &self.routes)
            .field("call_timeout", &self.call_timeout)
            .finish_non_exhaustive()
    }
}

impl WeatherAggregator {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            routes: BTreeMap::new(),
            call_timeout,
            clock: Arc::new(Utc::now),
        }
    }

    /// Serve `section` from `source`, replacing any earlier route.
    pub fn route(mut self, section: Section, source: Arc<dyn WeatherSource>) -> Self {
        self.routes.insert(section, source);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn source_for(&self, section: Section) -> Option<&str> {
        self.routes.get(&section).map(|source| source.id())
    }

    pub async fn fetch(&self, coords: Coordinates, units: UnitPreference) -> WeatherSnapshot {
        self.fetch_with_previous(coords, units, None).await
    }

    /// Like [`fetch`](Self::fetch), but a failed section keeps its value from
    /// `previous` when that snapshot is for the same coordinates.
    pub async fn fetch_with_previous(
        &self,
        coords: Coordinates,
        units: UnitPreference,
        previous: Option<&WeatherSnapshot>,
    ) -> WeatherSnapshot {
        let now = (self.clock)();
        let (current, hourly, daily, recent) = tokio::join!(
            self.fetch_section(Section::Current, coords, now),
            self.fetch_section(Section::Hourly, coords, now),
            self.fetch_section(Section::Daily, coords, now),
            self.fetch_section(Section::Recent, coords, now),
        );

        let previous = previous.filter(|p| p.coordinates == coords);
        let mut snapshot = WeatherSnapshot::empty(coords, units, now);

        for outcome in [current, hourly, daily, recent].into_iter().flatten() {
            match outcome {
                Ok(SectionData::Current(current)) => snapshot.current = Some(with_dew_point(current)),
                Ok(SectionData::Hourly(entries)) => snapshot.hourly = tidy_hourly(entries, now),
                Ok(SectionData::Daily(entries)) => snapshot.daily = tidy_daily(entries),
                Ok(SectionData::Recent(entries)) => snapshot.recent = tidy_recent(entries, now),
                Err(failure) => {
                    warn!("weather source failed: {failure}");
                    if let Some(previous) = previous {
                        retain_previous(&mut snapshot, previous, failure.section);
                    }
                    snapshot.source_failures.insert(failure.source_id);
                }
            }
        }

        debug!(
            failures = snapshot.source_failures.len(),
            unavailable = snapshot.is_unavailable(),
            "fetch cycle finished"
        );
        snapshot
    }

    /// `None` when nothing is routed for `section`.
    async fn fetch_section(
        &self,
        section: Section,
        coords: Coordinates,
        now: DateTime<Utc>,
    ) -> Option<Result<SectionData, WeatherFetchError>> {
        let source = self.routes.get(&section)?;

        let result = with_deadline(self.call_timeout, source.fetch(section, coords))
            .await
            .and_then(|response| normalize(response, section, now))
            .and_then(|data| {
                if data.section() == section {
                    Ok(data)
                } else {
                    Err(ProviderError::InvalidResponse(format!(
                        "expected {section} data, got {}",
                        data.section()
                    )))
                }
            });

        Some(result.map_err(|error| WeatherFetchError {
            source_id: source.id().to_string(),
            section,
            error,
        }))
    }
}

fn retain_previous(snapshot: &mut WeatherSnapshot, previous: &WeatherSnapshot, section: Section) {
    match section {
        Section::Current => snapshot.current = previous.current.clone(),
        Section::Hourly => snapshot.hourly = previous.hourly.clone(),
        Section::Daily => snapshot.daily = previous.daily.clone(),
        Section::Recent => snapshot.recent = previous.recent.clone(),
    }
}

fn with_dew_point(mut current: CurrentConditions) -> CurrentConditions {
    if current.dew_point_c.is_none() {
        current.dew_point_c = dew_point_c(current.temperature_c, current.humidity_pct);
    }
    current
}

fn sorted_unique(mut entries: Vec<HourlyEntry>) -> Vec<HourlyEntry> {
    entries.sort_by_key(|e| e.time);
    entries.dedup_by_key(|e| e.time);
    entries
}

fn non_empty<T>(entries: Vec<T>) -> Option<Vec<T>> {
    (!entries.is_empty()).then_some(entries)
}

/// Ascending, unique, starting at the current hour, at most [`MAX_HOURLY`].
fn tidy_hourly(entries: Vec<HourlyEntry>, now: DateTime<Utc>) -> Option<Vec<HourlyEntry>> {
    let start = now.duration_trunc(TimeDelta::hours(1)).unwrap_or(now);
    let mut entries = sorted_unique(entries);
    entries.retain(|e| e.time >= start);
    entries.truncate(MAX_HOURLY);
    non_empty(entries)
}

/// Ascending, unique, not after now, the latest [`MAX_RECENT`].
fn tidy_recent(entries: Vec<HourlyEntry>, now: DateTime<Utc>) -> Option<Vec<HourlyEntry>> {
    let mut entries = sorted_unique(entries);
    entries.retain(|e| e.time <= now);
    let skip = entries.len().saturating_sub(MAX_RECENT);
    non_empty(entries.split_off(skip))
}

fn tidy_daily(mut entries: Vec<DailyEntry>) -> Option<Vec<DailyEntry>> {
    entries.sort_by_key(|e| e.date);
    entries.dedup_by_key(|e| e.date);
    entries.truncate(MAX_DAILY);
    non_empty(entries)
}

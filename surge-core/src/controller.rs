//! Top-level controller: the single owner of mutable application state.
//!
//! Every search takes a new generation number; a refresh reuses the one it
//! found. Results are applied only if no newer search started in the
//! meantime, so a slow response for an old query can never overwrite a
//! newer one. State changes are published
//! on a `watch` channel for whatever presentation layer is attached.

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    Config,
    aggregator::WeatherAggregator,
    error::LocationError,
    model::{ResolvedLocation, WeatherSnapshot},
    provider::{aggregator_from_config, resolver_from_config},
    resolver::LocationResolver,
    state::{SavedState, StateStore},
    units::UnitPreference,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Idle,
    Loading { query: String },
    Ready,
    Failed { message: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    pub status: Status,
    pub location: Option<ResolvedLocation>,
    pub snapshot: Option<WeatherSnapshot>,
    pub units: UnitPreference,
    /// Generation of the request that produced this state.
    pub generation: u64,
}

impl AppState {
    fn initial(units: UnitPreference, location: Option<ResolvedLocation>) -> Self {
        Self {
            status: Status::Idle,
            location,
            snapshot: None,
            units,
            generation: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Applied,
    /// A newer request started first; the result was dropped.
    Superseded,
    Failed(LocationError),
    /// Refresh requested before any location was known.
    NoLocation,
}

#[derive(Debug)]
pub struct Controller {
    resolver: LocationResolver,
    aggregator: WeatherAggregator,
    generation: AtomicU64,
    state: watch::Sender<AppState>,
    store: Option<StateStore>,
}

impl Controller {
    pub fn new(resolver: LocationResolver, aggregator: WeatherAggregator, units: UnitPreference) -> Self {
        let (state, _) = watch::channel(AppState::initial(units, None));
        Self {
            resolver,
            aggregator,
            generation: AtomicU64::new(0),
            state,
            store: None,
        }
    }

    /// Build the whole pipeline from config. Saved state, when a store is
    /// given, takes precedence over the configured units and seeds the
    /// location.
    pub fn from_config(config: &Config, store: Option<StateStore>) -> anyhow::Result<Self> {
        let http = crate::http::build_client(config.request_timeout())?;
        let resolver = resolver_from_config(config, &http)?;
        let aggregator = aggregator_from_config(config, &http)?;

        let saved = match &store {
            Some(store) => store.load().unwrap_or_else(|error| {
                warn!("ignoring unreadable saved state: {error:#}");
                SavedState::default()
            }),
            None => SavedState::default(),
        };

        let units = saved.units.unwrap_or(config.units);
        let location = saved.last_location.or_else(|| config.default_location().ok());

        let (state, _) = watch::channel(AppState::initial(units, location));
        Ok(Self {
            resolver,
            aggregator,
            generation: AtomicU64::new(0),
            state,
            store,
        })
    }

    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<AppState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AppState {
        self.state.borrow().clone()
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Resolve `query`, fetch weather for it, and publish the result.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let generation = self.next_generation();
        self.apply(generation, |s| {
            s.status = Status::Loading {
                query: query.trim().to_string(),
            }
        });

        let location = match self.resolver.resolve(query).await {
            Ok(location) => location,
            Err(error) => {
                let applied = self.apply(generation, |s| {
                    s.status = Status::Failed {
                        message: error.user_message().to_string(),
                    };
                    s.location = None;
                    s.snapshot = None;
                });
                return if applied {
                    SearchOutcome::Failed(error)
                } else {
                    SearchOutcome::Superseded
                };
            }
        };

        if !self.is_current(generation) {
            debug!(generation, "search superseded before fetch");
            return SearchOutcome::Superseded;
        }

        self.fetch_and_apply(generation, location, None).await
    }

    /// Re-fetch weather for the current location. Sections that fail keep
    /// their previous values.
    ///
    /// A refresh never starts a generation of its own. It runs under the
    /// generation of the state it read, so a search started before or during
    /// the refresh always wins.
    pub async fn refresh(&self) -> SearchOutcome {
        let (generation, location, previous) = {
            let state = self.state.borrow();
            let pending = state.generation != self.current_generation()
                || matches!(state.status, Status::Loading { .. });
            if pending {
                debug!("refresh skipped, search in flight");
                return SearchOutcome::Superseded;
            }
            (state.generation, state.location.clone(), state.snapshot.clone())
        };
        let Some(location) = location else {
            return SearchOutcome::NoLocation;
        };

        self.fetch_and_apply(generation, location, previous).await
    }

    /// Refresh on a fixed interval, forever. The first refresh happens after
    /// one full interval.
    pub async fn refresh_every(&self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let outcome = self.refresh().await;
            debug!(?outcome, "scheduled refresh");
        }
    }

    /// Changes display units only; nothing is refetched.
    pub fn set_units(&self, units: UnitPreference) {
        self.state.send_modify(|s| s.units = units);
        let location = self.state.borrow().location.clone();
        self.persist(location, units);
    }

    async fn fetch_and_apply(
        &self,
        generation: u64,
        location: ResolvedLocation,
        previous: Option<WeatherSnapshot>,
    ) -> SearchOutcome {
        let units = self.state.borrow().units;
        let snapshot = self
            .aggregator
            .fetch_with_previous(location.coordinates, units, previous.as_ref())
            .await;

        let applied = self.apply(generation, |s| {
            s.status = Status::Ready;
            s.location = Some(location.clone());
            s.snapshot = Some(snapshot);
        });

        if !applied {
            debug!(generation, "fetch result discarded, newer request in flight");
            return SearchOutcome::Superseded;
        }

        info!(generation, location = %location.display_label, "weather updated");
        self.persist(Some(location), units);
        SearchOutcome::Applied
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Applies `update` only while `generation` is still the latest. The
    /// check runs under the channel's write lock.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut AppState)) -> bool {
        self.state.send_if_modified(|s| {
            if !self.is_current(generation) {
                return false;
            }
            update(s);
            s.generation = generation;
            true
        })
    }

    fn persist(&self, location: Option<ResolvedLocation>, units: UnitPreference) {
        let Some(store) = &self.store else {
            return;
        };
        let saved = SavedState {
            units: Some(units),
            last_location: location,
        };
        if let Err(error) = store.save(&saved) {
            warn!("failed to save state: {error:#}");
        }
    }
}

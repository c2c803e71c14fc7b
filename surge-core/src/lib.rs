//! Core library for the `surge` weather tool.
//!
//! This crate defines:
//! - Location resolution over a chain of geocoders
//! - Weather aggregation across providers, section by section
//! - Condition-code normalization and unit conversion
//! - Radar tile addressing
//! - Configuration, saved state and the request controller
//!
//! It is used by `surge-cli`, but carries no terminal concerns so another
//! front end can sit on top of [`Controller`].

pub mod aggregator;
pub mod condition;
pub mod config;
pub mod controller;
pub mod error;
pub mod geocode;
pub mod http;
pub mod model;
pub mod provider;
pub mod radar;
pub mod resolver;
pub mod state;
pub mod units;

pub use aggregator::WeatherAggregator;
pub use condition::InternalCondition;
pub use config::{Config, ProviderConfig};
pub use controller::{AppState, Controller, SearchOutcome, Status};
pub use error::{LocationError, ProviderError};
pub use model::{Coordinates, LocationSource, ResolvedLocation, Section, WeatherSnapshot};
pub use provider::{ProviderId, WeatherSource};
pub use resolver::LocationResolver;
pub use state::StateStore;
pub use units::UnitPreference;

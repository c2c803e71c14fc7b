use thiserror::Error;

use crate::model::Section;

/// Why a location query could not be resolved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("location not found")]
    NotFound,
    #[error("all location providers are unavailable")]
    AllProvidersUnavailable,
}

impl LocationError {
    pub fn user_message(&self) -> &'static str {
        match self {
            LocationError::NotFound => "Location not found. Check the spelling or try a ZIP code.",
            LocationError::AllProvidersUnavailable => {
                "Location lookup is unavailable right now. Please try again."
            }
        }
    }
}

/// Failure of a single provider call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("http error ({status}): {message}")]
    Http { status: u16, message: String },
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("no results")]
    NoResults,
}

impl ProviderError {
    /// Whether the provider could not be reached at all, as opposed to having
    /// answered with something unusable.
    pub fn is_unavailable(&self) -> bool {
        match self {
            ProviderError::Transport(_) | ProviderError::Timeout => true,
            ProviderError::Http { status, .. } => *status == 429 || (500..=599).contains(status),
            ProviderError::InvalidResponse(_) | ProviderError::NoResults => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ProviderError::Timeout
        } else if error.is_decode() {
            ProviderError::InvalidResponse(error.to_string())
        } else {
            ProviderError::Transport(error.to_string())
        }
    }
}

/// A weather source failing one section of a fetch cycle. Only ever logged
/// and folded into `WeatherSnapshot::source_failures`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{source_id} ({section}): {error}")]
pub struct WeatherFetchError {
    pub source_id: String,
    pub section: Section,
    pub error: ProviderError,
}

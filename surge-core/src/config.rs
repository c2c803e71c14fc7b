use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::{
    http::DEFAULT_TIMEOUT_SECS,
    model::{Coordinates, LocationSource, ResolvedLocation, Section},
    provider::ProviderId,
    units::UnitPreference,
};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;

/// Per-provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Overrides the provider's public endpoint (self-hosted mirrors, tests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Location shown before the first search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DefaultLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl Default for DefaultLocation {
    fn default() -> Self {
        Self {
            latitude: 42.3478,
            longitude: -71.0466,
            label: "Boston, MA".to_string(),
        }
    }
}

/// Which provider serves each snapshot section.
///
/// Example TOML:
/// [sources]
/// current = "tomorrow-io"
/// hourly = "open-meteo"
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceRoutes {
    pub current: Option<String>,
    pub hourly: Option<String>,
    pub daily: Option<String>,
    pub recent: Option<String>,
}

impl Default for SourceRoutes {
    fn default() -> Self {
        let open_meteo = Some(ProviderId::OpenMeteo.as_str().to_string());
        Self {
            current: open_meteo.clone(),
            hourly: open_meteo.clone(),
            daily: open_meteo.clone(),
            recent: open_meteo,
        }
    }
}

impl SourceRoutes {
    /// Configured routes as typed pairs; unset sections are left out.
    pub fn routes(&self) -> Result<Vec<(Section, ProviderId)>> {
        [
            (Section::Current, &self.current),
            (Section::Hourly, &self.hourly),
            (Section::Daily, &self.daily),
            (Section::Recent, &self.recent),
        ]
        .into_iter()
        .filter_map(|(section, id)| id.as_deref().map(|id| (section, id)))
        .map(|(section, id)| Ok((section, ProviderId::try_from(id)?)))
        .collect()
    }
}

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Display units; stored data is always metric.
    pub units: UnitPreference,

    pub request_timeout_secs: u64,

    pub refresh_interval_secs: u64,

    /// Geocoder ids in fallback order.
    pub geocoders: Vec<String>,

    pub default_location: DefaultLocation,

    pub sources: SourceRoutes,

    /// Example TOML:
    /// [providers.tomorrow-io]
    /// api_key = "..."
    pub providers: HashMap<String, ProviderConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            units: UnitPreference::default(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            geocoders: [
                ProviderId::Zippopotam,
                ProviderId::OpenMeteo,
                ProviderId::Nominatim,
                ProviderId::Mapbox,
            ]
            .iter()
            .map(|id| id.as_str().to_string())
            .collect(),
            default_location: DefaultLocation::default(),
            sources: SourceRoutes::default(),
            providers: HashMap::new(),
        }
    }
}

impl Config {
    pub fn geocoder_ids(&self) -> Result<Vec<ProviderId>> {
        self.geocoders
            .iter()
            .map(|id| ProviderId::try_from(id.as_str()))
            .collect()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(60))
    }

    /// The configured default location, validated.
    pub fn default_location(&self) -> Result<ResolvedLocation> {
        let loc = &self.default_location;
        let coordinates = Coordinates::new(loc.latitude, loc.longitude).ok_or_else(|| {
            anyhow!(
                "Default location ({}, {}) is out of range.",
                loc.latitude,
                loc.longitude
            )
        })?;

        let display_label = if loc.label.trim().is_empty() {
            coordinates.label()
        } else {
            loc.label.trim().to_string()
        };

        Ok(ResolvedLocation {
            display_label,
            source: LocationSource::Coordinates,
            coordinates,
        })
    }

    pub fn provider_config(&self, id: ProviderId) -> Option<&ProviderConfig> {
        self.providers.get(id.as_str())
    }

    /// Load config from disk, or return defaults if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Set/replace a provider API key.
    pub fn upsert_provider_api_key(&mut self, provider_id: ProviderId, api_key: String) {
        self.providers
            .entry(provider_id.as_str().to_string())
            .or_default()
            .api_key = Some(api_key);
    }

    /// Returns API key for a provider, if present.
    pub fn provider_api_key(&self, provider_id: ProviderId) -> Option<&str> {
        self.provider_config(provider_id)
            .and_then(|cfg| cfg.api_key.as_deref())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn is_provider_configured(&self, provider_id: ProviderId) -> bool {
        !provider_id.requires_api_key() || self.provider_api_key(provider_id).is_some()
    }
}

pub(crate) fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("dev", "storm-surge", "surge")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))
}

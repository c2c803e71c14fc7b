//! Last searched location and unit preference, kept between runs.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{config::project_dirs, model::ResolvedLocation, units::UnitPreference};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<UnitPreference>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_location: Option<ResolvedLocation>,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform data directory.
    pub fn open_default() -> Result<Self> {
        let dirs = project_dirs()?;
        Ok(Self::new(dirs.data_dir().join("state.toml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file means a fresh install, not an error.
    pub fn load(&self) -> Result<SavedState> {
        if !self.path.exists() {
            return Ok(SavedState::default());
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse state file: {}", self.path.display()))
    }

    pub fn save(&self, state: &SavedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create state directory: {}", parent.display())
            })?;
        }

        let toml = toml::to_string_pretty(state).context("Failed to serialize state to TOML")?;

        fs::write(&self.path, toml)
            .with_context(|| format!("Failed to write state file: {}", self.path.display()))
    }
}

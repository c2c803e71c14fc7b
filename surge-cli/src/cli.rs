use std::time::Duration;

use anyhow::{Context, anyhow, bail};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode};
use stormsurge_core::{
    Config, Controller, ProviderId, ResolvedLocation, SearchOutcome, StateStore, Status,
    UnitPreference,
    http::build_client,
    provider::resolver_from_config,
    radar::{RadarLayer, RainViewerClient, TileCoord},
};
use tracing::warn;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "surge", version, about = "Storm Surge Weather")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "tomorrow-io" or "mapbox".
        provider: String,
    },

    /// Show weather for a ZIP code, place name or "lat,lon" pair.
    Show {
        /// Location query; defaults to the last location searched.
        query: Option<String>,

        /// Display units: c or f.
        #[arg(long, value_parser = parse_units)]
        units: Option<UnitPreference>,

        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Keep showing weather, refreshing on an interval until Ctrl-C.
    Watch {
        query: Option<String>,

        /// Refresh interval in seconds; defaults to the configured value.
        #[arg(long)]
        every: Option<u64>,

        #[arg(long, value_parser = parse_units)]
        units: Option<UnitPreference>,
    },

    /// Print radar / map-overlay tile URLs around a location.
    Radar {
        query: Option<String>,

        #[arg(long, default_value_t = 8)]
        zoom: u8,

        #[arg(long, value_enum, default_value_t = LayerArg::Rainviewer)]
        layer: LayerArg,

        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LayerArg {
    Temperature,
    Precipitation,
    Rainviewer,
}

impl LayerArg {
    fn tomorrow_io_field(&self) -> Option<&'static str> {
        match self {
            LayerArg::Temperature => Some("temperature"),
            LayerArg::Precipitation => Some("precipitationIntensity"),
            LayerArg::Rainviewer => None,
        }
    }
}

fn parse_units(value: &str) -> Result<UnitPreference, String> {
    UnitPreference::try_from(value).map_err(|e| e.to_string())
}

fn open_store() -> Option<StateStore> {
    StateStore::open_default()
        .map_err(|error| warn!("saved state disabled: {error:#}"))
        .ok()
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Show { query, units, json } => show(query, units, json).await,
            Command::Watch { query, every, units } => watch(query, every, units).await,
            Command::Radar {
                query,
                zoom,
                layer,
                json,
            } => radar(query, zoom, layer, json).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if !id.requires_api_key() {
        println!("Provider '{id}' does not need an API key.");
        return Ok(());
    }

    let api_key = Password::new(&format!("API key for {id}:"))
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let api_key = api_key.trim().to_string();
    if api_key.is_empty() {
        bail!("API key for '{id}' cannot be empty.");
    }

    config.upsert_provider_api_key(id, api_key);
    config.save()?;

    println!(
        "Saved API key for '{id}' to {}",
        Config::config_file_path()?.display()
    );
    Ok(())
}

/// Searches `query`, or refreshes the saved/default location when absent.
async fn load(controller: &Controller, query: Option<&str>) -> anyhow::Result<()> {
    let outcome = match query {
        Some(query) => controller.search(query).await,
        None => controller.refresh().await,
    };

    match outcome {
        SearchOutcome::Applied => Ok(()),
        SearchOutcome::Failed(error) => Err(anyhow!(error.user_message())),
        SearchOutcome::NoLocation => bail!("No location given and none saved. Try `surge show 02110`."),
        SearchOutcome::Superseded => bail!("Search was superseded by a newer one."),
    }
}

async fn show(query: Option<String>, units: Option<UnitPreference>, json: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let controller = Controller::from_config(&config, open_store())?;
    if let Some(units) = units {
        controller.set_units(units);
    }

    load(&controller, query.as_deref()).await?;

    let state = controller.state();
    let (Some(location), Some(snapshot)) = (&state.location, &state.snapshot) else {
        bail!(render::UNAVAILABLE);
    };

    if json {
        println!("{}", render::snapshot_json(location, snapshot, state.units)?);
    } else {
        println!("{}", render::snapshot_text(location, snapshot, state.units, &Local));
    }
    Ok(())
}

async fn watch(
    query: Option<String>,
    every: Option<u64>,
    units: Option<UnitPreference>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let interval = every
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.refresh_interval());

    let controller = Controller::from_config(&config, open_store())?;
    if let Some(units) = units {
        controller.set_units(units);
    }

    let mut updates = controller.subscribe();
    if let Err(error) = load(&controller, query.as_deref()).await {
        eprintln!("{error}");
    }
    println!("{}", render::state_text(&updates.borrow_and_update(), &Local));

    let refresher = controller.refresh_every(interval);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(refresher, ctrl_c);

    loop {
        tokio::select! {
            _ = &mut refresher => break,
            result = &mut ctrl_c => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if matches!(state.status, Status::Ready | Status::Failed { .. }) {
                    println!("\n{}", render::state_text(&state, &Local));
                }
            }
        }
    }

    Ok(())
}

async fn radar(query: Option<String>, zoom: u8, layer: LayerArg, json: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    let http = build_client(config.request_timeout())?;
    let location = radar_location(&config, &http, query.as_deref()).await?;
    let tile = TileCoord::containing(location.coordinates, zoom);

    let (layer, frame_time) = match layer.tomorrow_io_field() {
        Some(field) => {
            let api_key = config
                .provider_api_key(ProviderId::TomorrowIo)
                .ok_or_else(|| {
                    anyhow!(
                        "No API key configured for provider 'tomorrow-io'.\n\
                         Hint: run `surge configure tomorrow-io` and enter your API key."
                    )
                })?;
            let layer = RadarLayer::TomorrowIo {
                field: field.to_string(),
                api_key: api_key.to_string(),
            };
            (layer, None)
        }
        None => {
            let client = match config
                .provider_config(ProviderId::RainViewer)
                .and_then(|cfg| cfg.base_url.clone())
            {
                Some(url) => RainViewerClient::with_base_url(http, url),
                None => RainViewerClient::new(http),
            };
            let frame = client
                .latest()
                .await
                .context("Failed to load radar frames from RainViewer")?;
            let time = frame.time;
            (RadarLayer::RainViewer(frame), Some(time))
        }
    };

    let url = layer.tile_url(tile, None);
    let template = layer.tile_template(None);

    if json {
        println!("{}", render::radar_json(&location, &url, &template, frame_time)?);
    } else {
        println!("{} ({})", location.display_label, location.coordinates.label());
        if let Some(time) = frame_time {
            println!("Frame     {}", time.with_timezone(&Local).format("%Y-%m-%d %H:%M"));
        }
        println!("Tile      {url}");
        println!("Template  {template}");
    }
    Ok(())
}

/// Radar only needs coordinates, so skip the weather fetch.
async fn radar_location(
    config: &Config,
    http: &reqwest::Client,
    query: Option<&str>,
) -> anyhow::Result<ResolvedLocation> {
    if let Some(query) = query {
        let resolver = resolver_from_config(config, http)?;
        return resolver
            .resolve(query)
            .await
            .map_err(|error| anyhow!(error.user_message()));
    }

    let saved = open_store()
        .and_then(|store| store.load().ok())
        .and_then(|state| state.last_location);
    match saved {
        Some(location) => Ok(location),
        None => config.default_location(),
    }
}

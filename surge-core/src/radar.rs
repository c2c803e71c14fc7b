//! Radar and map-overlay tile URLs. Only URL construction lives here; the
//! images themselves are the map widget's business.

use std::f64::consts::PI;

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::{error::ProviderError, http::fetch_json, model::Coordinates};

const TOMORROW_IO_TILE_BASE: &str = "https://api.tomorrow.io/v4/map/tile";
const RAINVIEWER_BASE_URL: &str = "https://api.rainviewer.com";
const RAINVIEWER_TILE_SIZE: u32 = 256;
/// RainViewer colour scheme 2 ("Universal Blue"), smoothing on, snow shown.
const RAINVIEWER_STYLE: &str = "2/1_1";

pub const MAX_ZOOM: u8 = 22;

/// Slippy-map tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// The Web-Mercator tile containing `coords` at `zoom` (clamped to
    /// [`MAX_ZOOM`]).
    pub fn containing(coords: Coordinates, zoom: u8) -> Self {
        let z = zoom.min(MAX_ZOOM);
        let n = f64::from(1u32 << z);
        let max_index = (1u32 << z) - 1;

        // Mercator is undefined at the poles.
        let lat = coords.latitude.clamp(-85.051_128_78, 85.051_128_78).to_radians();
        let x = ((coords.longitude + 180.0) / 360.0 * n).floor();
        let y = ((1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / PI) / 2.0 * n).floor();

        Self {
            z,
            x: (x.max(0.0) as u32).min(max_index),
            y: (y.max(0.0) as u32).min(max_index),
        }
    }
}

/// One RainViewer radar frame.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarFrame {
    pub time: DateTime<Utc>,
    pub host: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RadarLayer {
    /// Tomorrow.io map tiles for a data field such as `temperature` or
    /// `precipitationIntensity`.
    TomorrowIo { field: String, api_key: String },
    RainViewer(RadarFrame),
}

impl RadarLayer {
    /// URL for one tile. `time` only applies to Tomorrow.io; `None` asks for
    /// the latest data.
    pub fn tile_url(&self, tile: TileCoord, time: Option<DateTime<Utc>>) -> String {
        self.render(
            &tile.z.to_string(),
            &tile.x.to_string(),
            &tile.y.to_string(),
            time,
        )
    }

    /// URL template with `{z}`, `{x}` and `{y}` placeholders, as raster map
    /// sources expect.
    pub fn tile_template(&self, time: Option<DateTime<Utc>>) -> String {
        self.render("{z}", "{x}", "{y}", time)
    }

    fn render(&self, z: &str, x: &str, y: &str, time: Option<DateTime<Utc>>) -> String {
        match self {
            RadarLayer::TomorrowIo { field, api_key } => {
                let time = time
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_else(|| "now".to_string());
                format!("{TOMORROW_IO_TILE_BASE}/{z}/{x}/{y}/{field}/{time}.png?apikey={api_key}")
            }
            RadarLayer::RainViewer(frame) => format!(
                "{}{}/{RAINVIEWER_TILE_SIZE}/{z}/{x}/{y}/{RAINVIEWER_STYLE}.png",
                frame.host.trim_end_matches('/'),
                frame.path
            ),
        }
    }
}

/// Loads the list of available RainViewer frames.
#[derive(Debug, Clone)]
pub struct RainViewerClient {
    http: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct WeatherMaps {
    host: String,
    radar: RadarFrames,
}

#[derive(Debug, Deserialize)]
struct RadarFrames {
    #[serde(default)]
    past: Vec<RawFrame>,
    #[serde(default)]
    nowcast: Vec<RawFrame>,
}

#[derive(Debug, Deserialize)]
struct RawFrame {
    time: i64,
    path: String,
}

impl RainViewerClient {
    pub fn new(http: Client) -> Self {
        Self::with_base_url(http, RAINVIEWER_BASE_URL.to_string())
    }

    pub fn with_base_url(http: Client, base_url: String) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Past frames followed by nowcast frames, oldest first.
    pub async fn frames(&self) -> Result<Vec<RadarFrame>, ProviderError> {
        let url = format!("{}/public/weather-maps.json", self.base_url);
        let maps: WeatherMaps = fetch_json(self.http.get(url)).await?;

        let mut frames: Vec<RadarFrame> = maps
            .radar
            .past
            .into_iter()
            .chain(maps.radar.nowcast)
            .filter_map(|raw| {
                Some(RadarFrame {
                    time: DateTime::<Utc>::from_timestamp(raw.time, 0)?,
                    host: maps.host.clone(),
                    path: raw.path,
                })
            })
            .collect();
        frames.sort_by_key(|f| f.time);

        if frames.is_empty() {
            return Err(ProviderError::NoResults);
        }
        Ok(frames)
    }

    /// Most recent observed (non-forecast) frame.
    pub async fn latest(&self) -> Result<RadarFrame, ProviderError> {
        let now = Utc::now();
        self.frames()
            .await?
            .into_iter()
            .filter(|f| f.time <= now)
            .next_back()
            .ok_or(ProviderError::NoResults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn tile_for_columbus() {
        let c = Coordinates::new(39.96, -82.99).unwrap();
        assert_eq!(TileCoord::containing(c, 0), TileCoord { z: 0, x: 0, y: 0 });
        assert_eq!(TileCoord::containing(c, 9), TileCoord { z: 9, x: 137, y: 193 });
    }

    #[test]
    fn tile_indices_stay_in_range_at_edges() {
        let ne = Coordinates::new(90.0, 180.0).unwrap();
        let sw = Coordinates::new(-90.0, -180.0).unwrap();
        assert_eq!(TileCoord::containing(ne, 3), TileCoord { z: 3, x: 7, y: 0 });
        assert_eq!(TileCoord::containing(sw, 3), TileCoord { z: 3, x: 0, y: 7 });
        assert_eq!(TileCoord::containing(ne, 40).z, MAX_ZOOM);
    }

    #[test]
    fn tomorrow_io_urls() {
        let layer = RadarLayer::TomorrowIo {
            field: "temperature".to_string(),
            api_key: "KEY".to_string(),
        };
        assert_eq!(
            layer.tile_template(None),
            "https://api.tomorrow.io/v4/map/tile/{z}/{x}/{y}/temperature/now.png?apikey=KEY"
        );

        let at = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        assert_eq!(
            layer.tile_url(TileCoord { z: 9, x: 137, y: 193 }, Some(at)),
            "https://api.tomorrow.io/v4/map/tile/9/137/193/temperature/2026-10-18T12:00:00Z.png?apikey=KEY"
        );
    }

    #[test]
    fn rainviewer_urls() {
        let layer = RadarLayer::RainViewer(RadarFrame {
            time: Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap(),
            host: "https://tilecache.rainviewer.com/".to_string(),
            path: "/v2/radar/1792324800".to_string(),
        });
        assert_eq!(
            layer.tile_url(TileCoord { z: 6, x: 17, y: 24 }, None),
            "https://tilecache.rainviewer.com/v2/radar/1792324800/256/6/17/24/2/1_1.png"
        );
    }
}

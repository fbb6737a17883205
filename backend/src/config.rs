use std::{net::SocketAddr, num::NonZeroUsize, time::Duration};

use clap::Parser;
use shared::{Coordinate, Span, Viewport, ViewportError};

use crate::runtime::CoordinatorConfig;

#[derive(Debug, Clone, Parser)]
#[command(
    author,
    version,
    about = "Ride-request coordinator: location search, viewport and ride scheduling"
)]
pub struct Config {
    /// Address the HTTP API listens on
    #[arg(long, env = "RIDEHAIL_LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Base URL of a Nominatim-compatible geocoder
    #[arg(
        long,
        env = "GEOCODER_URL",
        default_value = "https://nominatim.openstreetmap.org"
    )]
    pub geocoder_url: String,

    /// Maximum number of candidates requested per search
    #[arg(long, env = "SEARCH_LIMIT", default_value_t = 5)]
    pub search_limit: usize,

    /// Number of recent searches kept in memory (0 disables the cache)
    #[arg(long, env = "SEARCH_CACHE_SIZE", default_value_t = 64)]
    pub search_cache_size: usize,

    /// Dispatch service endpoint; rides are confirmed in memory when absent
    #[arg(long, env = "SCHEDULER_URL")]
    pub scheduler_url: Option<String>,

    /// Drivers available to the in-memory scheduler
    #[arg(long, env = "DRIVER_CAPACITY", default_value_t = 10)]
    pub driver_capacity: usize,

    #[arg(long, env = "DEBOUNCE_MS", default_value_t = 300)]
    pub debounce_ms: u64,

    #[arg(long, env = "SEARCH_TIMEOUT_SECS", default_value_t = 10)]
    pub search_timeout_secs: u64,

    /// Seconds to wait for a device position before giving up
    #[arg(long, env = "LOCATION_TIMEOUT_SECS", default_value_t = 10)]
    pub location_timeout_secs: u64,

    /// Fixed device latitude reported as the current position
    #[arg(long, env = "DEVICE_LAT", requires = "device_lon", allow_hyphen_values = true)]
    pub device_lat: Option<f64>,
    #[arg(long, env = "DEVICE_LON", requires = "device_lat", allow_hyphen_values = true)]
    pub device_lon: Option<f64>,

    #[arg(long, default_value_t = 40.7128, allow_hyphen_values = true)]
    pub initial_lat: f64,
    #[arg(long, default_value_t = -74.0060, allow_hyphen_values = true)]
    pub initial_lon: f64,
    /// Latitude and longitude delta of the initial viewport
    #[arg(long, default_value_t = 0.05)]
    pub initial_span: f64,
}

impl Config {
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            debounce: Duration::from_millis(self.debounce_ms),
            search_timeout: Duration::from_secs(self.search_timeout_secs),
            location_timeout: Duration::from_secs(self.location_timeout_secs),
        }
    }

    pub fn initial_viewport(&self) -> Result<Viewport, ViewportError> {
        Viewport::new(
            Coordinate::new(self.initial_lat, self.initial_lon),
            Span {
                lat_delta: self.initial_span,
                lon_delta: self.initial_span,
            },
        )
    }

    pub fn device_position(&self) -> Option<Coordinate> {
        match (self.device_lat, self.device_lon) {
            (Some(lat), Some(lon)) => Some(Coordinate::new(lat, lon)),
            _ => None,
        }
    }

    pub fn search_cache_capacity(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.search_cache_size)
    }
}

use std::{num::NonZeroUsize, sync::Mutex, time::Duration};

use async_trait::async_trait;
use lru::LruCache;
use serde::Deserialize;
use shared::{Coordinate, PlaceCandidate};

use crate::providers::{LocationSearchProvider, PositionError, ProviderError};

const USER_AGENT: &str = concat!("ridehail-backend/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Search provider speaking the Nominatim `/search` API.
///
/// There is no device on the server side, so the "current position" is the
/// one configured at startup. Without it every lookup reports
/// `PositionUnavailable`.
pub struct NominatimSearchProvider {
    client: reqwest::Client,
    base_url: String,
    limit: usize,
    device_position: Option<Coordinate>,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: u64,
    display_name: String,
    lat: String,
    lon: String,
}

impl NominatimSearchProvider {
    pub fn new(
        base_url: impl Into<String>,
        limit: usize,
        device_position: Option<Coordinate>,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            limit,
            device_position,
        })
    }
}

#[async_trait]
impl LocationSearchProvider for NominatimSearchProvider {
    async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, ProviderError> {
        let url = format!("{}/search", self.base_url);
        let limit = self.limit.to_string();
        tracing::debug!("geocoding {text:?} via {url}");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", text),
                ("format", "jsonv2"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Backend(format!(
                "geocoder answered {status}"
            )));
        }

        let places: Vec<NominatimPlace> = response.json().await?;
        Ok(places_to_candidates(places))
    }

    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        self.device_position
            .ok_or(PositionError::PositionUnavailable)
    }
}

fn places_to_candidates(places: Vec<NominatimPlace>) -> Vec<PlaceCandidate> {
    places
        .into_iter()
        .filter_map(|place| {
            let lat = place.lat.parse::<f64>().ok()?;
            let lon = place.lon.parse::<f64>().ok()?;
            Some(PlaceCandidate {
                id: place.place_id.to_string(),
                label: place.display_name,
                coordinate: Coordinate { lat, lon },
            })
        })
        .collect()
}

/// Memoizes successful searches of the wrapped provider by normalized query.
/// Failures are never cached.
pub struct CachingSearchProvider<P> {
    inner: P,
    cache: Mutex<LruCache<String, Vec<PlaceCandidate>>>,
}

impl<P> CachingSearchProvider<P> {
    pub fn new(inner: P, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn cached(&self, key: &str) -> Option<Vec<PlaceCandidate>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn remember(&self, key: String, candidates: &[PlaceCandidate]) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(key, candidates.to_vec());
        }
    }
}

fn cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}

#[async_trait]
impl<P: LocationSearchProvider> LocationSearchProvider for CachingSearchProvider<P> {
    async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, ProviderError> {
        let key = cache_key(text);
        if let Some(candidates) = self.cached(&key) {
            tracing::debug!("search cache hit for {key:?}");
            return Ok(candidates);
        }

        let candidates = self.inner.search(text).await?;
        self.remember(key, &candidates);
        Ok(candidates)
    }

    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        self.inner.current_position().await
    }
}

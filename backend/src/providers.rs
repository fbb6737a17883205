use async_trait::async_trait;
use shared::{Confirmation, Coordinate, PlaceCandidate, RideScheduleRequest};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("search request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable")]
    PositionUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct SchedulingError {
    pub reason: String,
}

impl SchedulingError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Free-text geocoding plus the device position source.
///
/// Implementations must return candidates ordered by relevance, best
/// match first. The coordinator applies its own timeout on top of
/// whatever the provider does.
#[async_trait]
pub trait LocationSearchProvider: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, ProviderError>;

    async fn current_position(&self) -> Result<Coordinate, PositionError>;
}

/// Sink for validated ride requests.
#[async_trait]
pub trait RideScheduler: Send + Sync {
    async fn schedule(&self, request: RideScheduleRequest)
    -> Result<Confirmation, SchedulingError>;
}

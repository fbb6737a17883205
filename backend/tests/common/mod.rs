#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use ridehail_backend::{
    coordinator::RideRequestCoordinator,
    providers::{
        LocationSearchProvider, PositionError, ProviderError, RideScheduler, SchedulingError,
    },
    runtime::{CoordinatorConfig, CoordinatorHandle},
};
use shared::{Confirmation, Coordinate, PlaceCandidate, RideScheduleRequest, Span, Viewport};

pub fn initial_viewport() -> Viewport {
    Viewport::new(
        Coordinate::new(40.7128, -74.006),
        Span {
            lat_delta: 0.05,
            lon_delta: 0.05,
        },
    )
    .unwrap()
}

pub fn candidate(id: &str, label: &str, lat: f64, lon: f64) -> PlaceCandidate {
    PlaceCandidate {
        id: id.into(),
        label: label.into(),
        coordinate: Coordinate::new(lat, lon),
    }
}

/// Search provider with per-query latency, canned results and failures.
/// Unknown queries answer with a single candidate labelled after the query.
#[derive(Default)]
pub struct ScriptedSearch {
    calls: Mutex<Vec<String>>,
    delays: HashMap<String, Duration>,
    results: HashMap<String, Vec<PlaceCandidate>>,
    failing: Vec<String>,
    position: Option<Coordinate>,
    position_hangs: bool,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delay(mut self, query: &str, delay: Duration) -> Self {
        self.delays.insert(query.into(), delay);
        self
    }

    pub fn results(mut self, query: &str, candidates: Vec<PlaceCandidate>) -> Self {
        self.results.insert(query.into(), candidates);
        self
    }

    pub fn failing(mut self, query: &str) -> Self {
        self.failing.push(query.into());
        self
    }

    pub fn position(mut self, position: Coordinate) -> Self {
        self.position = Some(position);
        self
    }

    /// Position lookups never complete, like a GPS that cannot get a fix.
    pub fn position_hangs(mut self) -> Self {
        self.position_hangs = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LocationSearchProvider for ScriptedSearch {
    async fn search(&self, text: &str) -> Result<Vec<PlaceCandidate>, ProviderError> {
        self.calls.lock().unwrap().push(text.to_string());
        if let Some(delay) = self.delays.get(text) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.iter().any(|query| query == text) {
            return Err(ProviderError::Backend("upstream unavailable".into()));
        }
        Ok(self
            .results
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![candidate(text, text, 1.0, 1.0)]))
    }

    async fn current_position(&self) -> Result<Coordinate, PositionError> {
        if self.position_hangs {
            std::future::pending::<()>().await;
        }
        self.position.ok_or(PositionError::PermissionDenied)
    }
}

/// Scheduler that confirms, or fails with a fixed reason, after a delay.
pub struct ScriptedScheduler {
    calls: AtomicUsize,
    delay: Duration,
    failure: Option<String>,
}

impl ScriptedScheduler {
    pub fn confirming(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            failure: None,
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            failure: Some(reason.into()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RideScheduler for ScriptedScheduler {
    async fn schedule(
        &self,
        request: RideScheduleRequest,
    ) -> Result<Confirmation, SchedulingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.delay).await;
        if let Some(reason) = &self.failure {
            return Err(SchedulingError::new(reason.clone()));
        }
        Ok(Confirmation {
            ride_id: format!("ride-{call}"),
            pickup: request.pickup,
            dropoff: request.dropoff,
            scheduled_at: Utc::now(),
        })
    }
}

pub fn spawn_coordinator(
    search: Arc<ScriptedSearch>,
    scheduler: Arc<ScriptedScheduler>,
    config: CoordinatorConfig,
) -> CoordinatorHandle {
    CoordinatorHandle::spawn(
        RideRequestCoordinator::new(initial_viewport()),
        search,
        scheduler,
        config,
    )
}

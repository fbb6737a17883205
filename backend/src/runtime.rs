use std::{sync::Arc, time::Duration};

use shared::{
    Confirmation, Coordinate, CoordinatorSnapshot, PlaceCandidate, SelectionTarget, Span,
};
use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
};

use crate::coordinator::{PendingSearch, RideRequestCoordinator, SearchRequest};
use crate::error::CoordinatorError;
use crate::providers::{LocationSearchProvider, PositionError, RideScheduler, SchedulingError};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_SEARCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(10);

const REQUEST_QUEUE: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorConfig {
    pub debounce: Duration,
    pub search_timeout: Duration,
    /// Bound on a position lookup; expiry counts as `PositionUnavailable`.
    pub location_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            search_timeout: DEFAULT_SEARCH_TIMEOUT,
            location_timeout: DEFAULT_LOCATION_TIMEOUT,
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, CoordinatorError>>;

enum Request {
    UpdateQuery(String, Reply<()>),
    SelectCandidate(PlaceCandidate, Reply<()>),
    SetSelectionTarget(SelectionTarget, Reply<()>),
    Recenter(Coordinate, Reply<()>),
    SetSpan(Span, Reply<()>),
    RecenterOnCurrentLocation(Reply<Coordinate>),
    SetPickup(String, Reply<()>),
    SetDropoff(String, Reply<()>),
    SubmitRide(Reply<Confirmation>),
}

// Completions of work the actor dispatched itself.
enum Event {
    DebounceElapsed(PendingSearch),
    SearchCompleted {
        seq: u64,
        result: Result<Vec<PlaceCandidate>, CoordinatorError>,
    },
    PositionResolved {
        result: Result<Coordinate, PositionError>,
        reply: Reply<Coordinate>,
    },
    RideScheduled {
        result: Result<Confirmation, SchedulingError>,
        reply: Reply<Confirmation>,
    },
}

/// Cloneable front door to a running coordinator.
///
/// All mutations are funneled to one task that owns the
/// [`RideRequestCoordinator`]; callers only ever see snapshots.
#[derive(Clone)]
pub struct CoordinatorHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<CoordinatorSnapshot>,
}

impl CoordinatorHandle {
    /// Starts the owning task on the current tokio runtime. The task stops
    /// once every handle has been dropped.
    pub fn spawn(
        coordinator: RideRequestCoordinator,
        search: Arc<dyn LocationSearchProvider>,
        scheduler: Arc<dyn RideScheduler>,
        config: CoordinatorConfig,
    ) -> Self {
        let (requests, requests_rx) = mpsc::channel(REQUEST_QUEUE);
        let (events, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshots) = watch::channel(coordinator.snapshot());

        let actor = CoordinatorActor {
            coordinator,
            search,
            scheduler,
            config,
            events,
            snapshots: snapshot_tx,
            debounce: None,
        };
        tokio::spawn(actor.run(requests_rx, events_rx));

        Self {
            requests,
            snapshots,
        }
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshots.clone()
    }

    pub async fn update_query(&self, text: impl Into<String>) -> Result<(), CoordinatorError> {
        let text = text.into();
        self.call(|reply| Request::UpdateQuery(text, reply)).await
    }

    pub async fn select_candidate(
        &self,
        candidate: PlaceCandidate,
    ) -> Result<(), CoordinatorError> {
        self.call(|reply| Request::SelectCandidate(candidate, reply))
            .await
    }

    pub async fn set_selection_target(
        &self,
        target: SelectionTarget,
    ) -> Result<(), CoordinatorError> {
        self.call(|reply| Request::SetSelectionTarget(target, reply))
            .await
    }

    pub async fn recenter(&self, center: Coordinate) -> Result<(), CoordinatorError> {
        self.call(|reply| Request::Recenter(center, reply)).await
    }

    pub async fn set_span(&self, span: Span) -> Result<(), CoordinatorError> {
        self.call(|reply| Request::SetSpan(span, reply)).await
    }

    /// Resolves with the new center, or `LocationUnavailable` with the
    /// viewport left untouched.
    pub async fn recenter_on_current_location(&self) -> Result<Coordinate, CoordinatorError> {
        self.call(Request::RecenterOnCurrentLocation).await
    }

    pub async fn set_pickup(&self, text: impl Into<String>) -> Result<(), CoordinatorError> {
        let text = text.into();
        self.call(|reply| Request::SetPickup(text, reply)).await
    }

    pub async fn set_dropoff(&self, text: impl Into<String>) -> Result<(), CoordinatorError> {
        let text = text.into();
        self.call(|reply| Request::SetDropoff(text, reply)).await
    }

    /// Resolves once the scheduler has answered. A call made while another
    /// submission is pending fails with `AlreadyInProgress` immediately.
    pub async fn submit_ride(&self) -> Result<Confirmation, CoordinatorError> {
        self.call(Request::SubmitRide).await
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, CoordinatorError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(request(reply))
            .await
            .map_err(|_| CoordinatorError::Closed)?;
        response.await.map_err(|_| CoordinatorError::Closed)?
    }
}

struct CoordinatorActor {
    coordinator: RideRequestCoordinator,
    search: Arc<dyn LocationSearchProvider>,
    scheduler: Arc<dyn RideScheduler>,
    config: CoordinatorConfig,
    events: mpsc::UnboundedSender<Event>,
    snapshots: watch::Sender<CoordinatorSnapshot>,
    debounce: Option<JoinHandle<()>>,
}

impl CoordinatorActor {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        tracing::debug!("ride request coordinator started");
        loop {
            tokio::select! {
                request = requests.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }

        if let Some(timer) = self.debounce.take() {
            timer.abort();
        }
        tracing::debug!("ride request coordinator stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::UpdateQuery(text, reply) => {
                if let Some(timer) = self.debounce.take() {
                    timer.abort();
                }
                if let Some(pending) = self.coordinator.update_query(text) {
                    self.start_debounce(pending);
                }
                self.respond(reply, Ok(()));
            }
            Request::SelectCandidate(candidate, reply) => {
                let result = self.coordinator.select_candidate(&candidate);
                if result.is_ok()
                    && let Some(timer) = self.debounce.take()
                {
                    timer.abort();
                }
                self.respond(reply, result);
            }
            Request::SetSelectionTarget(target, reply) => {
                self.coordinator.set_selection_target(target);
                self.respond(reply, Ok(()));
            }
            Request::Recenter(center, reply) => {
                let result = self.coordinator.recenter(center);
                self.respond(reply, result);
            }
            Request::SetSpan(span, reply) => {
                let result = self.coordinator.set_span(span);
                self.respond(reply, result);
            }
            Request::RecenterOnCurrentLocation(reply) => {
                let search = Arc::clone(&self.search);
                let events = self.events.clone();
                let timeout = self.config.location_timeout;
                tokio::spawn(async move {
                    let result = tokio::time::timeout(timeout, search.current_position())
                        .await
                        .unwrap_or_else(|_| {
                            tracing::warn!("position lookup timed out after {timeout:?}");
                            Err(PositionError::PositionUnavailable)
                        });
                    let _ = events.send(Event::PositionResolved { result, reply });
                });
            }
            Request::SetPickup(text, reply) => {
                let result = self.coordinator.set_pickup(text);
                self.respond(reply, result);
            }
            Request::SetDropoff(text, reply) => {
                let result = self.coordinator.set_dropoff(text);
                self.respond(reply, result);
            }
            Request::SubmitRide(reply) => match self.coordinator.begin_submit() {
                Ok(request) => {
                    self.publish();
                    let scheduler = Arc::clone(&self.scheduler);
                    let events = self.events.clone();
                    tokio::spawn(async move {
                        let result = scheduler.schedule(request).await;
                        let _ = events.send(Event::RideScheduled { result, reply });
                    });
                }
                Err(err) => {
                    tracing::debug!("ride submission rejected: {err}");
                    let _ = reply.send(Err(err));
                }
            },
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::DebounceElapsed(pending) => {
                if let Some(request) = self.coordinator.debounce_elapsed(pending) {
                    self.publish();
                    self.start_search(request);
                }
            }
            Event::SearchCompleted { seq, result } => {
                if self.coordinator.apply_search_result(seq, result) {
                    self.publish();
                }
            }
            Event::PositionResolved { result, reply } => {
                let result = self.coordinator.apply_current_position(result);
                self.respond(reply, result);
            }
            Event::RideScheduled { result, reply } => {
                let result = self.coordinator.finish_submit(result);
                self.respond(reply, result);
            }
        }
    }

    // Publish first so a caller reading the snapshot after its reply sees
    // its own change.
    fn respond<T>(&self, reply: Reply<T>, result: Result<T, CoordinatorError>) {
        self.publish();
        let _ = reply.send(result);
    }

    fn start_debounce(&mut self, pending: PendingSearch) {
        let events = self.events.clone();
        let delay = self.config.debounce;
        self.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::DebounceElapsed(pending));
        }));
    }

    // The network call itself is never cancelled; a superseded response is
    // dropped by the sequence check when it arrives.
    fn start_search(&self, request: SearchRequest) {
        let search = Arc::clone(&self.search);
        let events = self.events.clone();
        let timeout = self.config.search_timeout;
        tracing::info!(seq = request.seq, "searching for {:?}", request.text);

        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, search.search(&request.text)).await
            {
                Ok(Ok(candidates)) => Ok(candidates),
                Ok(Err(err)) => Err(CoordinatorError::Provider(err.to_string())),
                Err(_) => {
                    tracing::warn!(seq = request.seq, "search timed out after {timeout:?}");
                    Err(CoordinatorError::SearchTimeout)
                }
            };
            let _ = events.send(Event::SearchCompleted {
                seq: request.seq,
                result,
            });
        });
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.coordinator.snapshot());
    }
}

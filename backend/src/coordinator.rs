use shared::{
    Confirmation, Coordinate, CoordinatorSnapshot, Notice, PlaceCandidate, RideRequestDraft,
    RideRequestState, RideScheduleRequest, SelectionTarget, Span, Viewport,
};

use crate::error::{CoordinatorError, ValidationError};
use crate::providers::{PositionError, SchedulingError};

/// Debounce ticket returned by [`RideRequestCoordinator::update_query`].
///
/// The caller waits out the debounce interval and hands the ticket back to
/// [`RideRequestCoordinator::debounce_elapsed`]. A ticket whose `seq` is no
/// longer current is ignored there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSearch {
    pub seq: u64,
}

/// A search the caller must send to the provider. The result goes back
/// through [`RideRequestCoordinator::apply_search_result`] with the same `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub seq: u64,
    pub text: String,
}

/// Single owner of viewport, search, draft and ride-scheduling state.
///
/// Every method is synchronous. Asynchronous work leaves the coordinator as
/// a ticket and comes back as an event, so the whole thing reads as a
/// reducer: each user action or provider response is folded into the
/// current state.
///
/// Search ordering rests on `search_seq`. Every new query, cleared query or
/// candidate selection bumps it; a provider response is applied only when it
/// carries the current value, so a slow answer to an old query can never
/// overwrite a fresher one.
#[derive(Debug, Clone)]
pub struct RideRequestCoordinator {
    viewport: Viewport,
    query: String,
    candidates: Vec<PlaceCandidate>,
    searching: bool,
    selection_target: SelectionTarget,
    draft: RideRequestDraft,
    state: RideRequestState,
    notice: Option<Notice>,
    search_seq: u64,
}

impl RideRequestCoordinator {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            query: String::new(),
            candidates: Vec::new(),
            searching: false,
            selection_target: SelectionTarget::default(),
            draft: RideRequestDraft::default(),
            state: RideRequestState::Idle,
            notice: None,
            search_seq: 0,
        }
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn candidates(&self) -> &[PlaceCandidate] {
        &self.candidates
    }

    pub fn candidate(&self, id: &str) -> Option<&PlaceCandidate> {
        self.candidates.iter().find(|candidate| candidate.id == id)
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    pub fn selection_target(&self) -> SelectionTarget {
        self.selection_target
    }

    pub fn draft(&self) -> &RideRequestDraft {
        &self.draft
    }

    pub fn state(&self) -> &RideRequestState {
        &self.state
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            viewport: self.viewport,
            query: self.query.clone(),
            candidates: self.candidates.clone(),
            searching: self.searching,
            selection_target: self.selection_target,
            draft: self.draft.clone(),
            state: self.state.clone(),
            notice: self.notice.clone(),
        }
    }

    /// Records the new query text. Blank text clears the candidates right
    /// away and needs no search; anything else returns a debounce ticket.
    pub fn update_query(&mut self, text: impl Into<String>) -> Option<PendingSearch> {
        self.query = text.into();
        self.search_seq += 1;
        self.searching = false;
        if matches!(
            self.notice,
            Some(Notice::SearchFailed { .. } | Notice::SearchTimeout)
        ) {
            self.notice = None;
        }

        if self.query.trim().is_empty() {
            tracing::debug!(seq = self.search_seq, "query cleared, dropping candidates");
            self.candidates.clear();
            return None;
        }

        tracing::debug!(seq = self.search_seq, "debounce restarted for {:?}", self.query);
        Some(PendingSearch {
            seq: self.search_seq,
        })
    }

    /// Turns an expired debounce ticket into a provider request, unless a
    /// newer query has replaced it in the meantime.
    pub fn debounce_elapsed(&mut self, pending: PendingSearch) -> Option<SearchRequest> {
        if pending.seq != self.search_seq {
            tracing::debug!(
                "ignoring superseded debounce seq={} current={}",
                pending.seq,
                self.search_seq
            );
            return None;
        }
        let text = self.query.trim();
        if text.is_empty() {
            return None;
        }

        self.searching = true;
        Some(SearchRequest {
            seq: pending.seq,
            text: text.to_string(),
        })
    }

    /// Folds a provider response into the state. Returns `false` when the
    /// response was stale and dropped.
    pub fn apply_search_result(
        &mut self,
        seq: u64,
        result: Result<Vec<PlaceCandidate>, CoordinatorError>,
    ) -> bool {
        if seq != self.search_seq {
            tracing::debug!(
                "dropping stale search response seq={seq} current={}",
                self.search_seq
            );
            return false;
        }

        self.searching = false;
        match result {
            Ok(candidates) => {
                let total = candidates.len();
                let candidates: Vec<PlaceCandidate> = candidates
                    .into_iter()
                    .filter(|candidate| candidate.coordinate.is_valid())
                    .collect();
                if candidates.len() < total {
                    tracing::warn!(
                        "discarded {} candidate(s) with out-of-range coordinates",
                        total - candidates.len()
                    );
                }

                if let Some(best) = candidates.first()
                    && let Ok(viewport) = self.viewport.recentered(best.coordinate)
                {
                    self.viewport = viewport;
                }

                tracing::debug!(seq, "applied {} candidate(s)", candidates.len());
                self.candidates = candidates;
                self.notice = None;
            }
            Err(err) => {
                tracing::warn!(seq, "search failed: {err}");
                self.candidates.clear();
                self.notice = Some(match err {
                    CoordinatorError::SearchTimeout => Notice::SearchTimeout,
                    other => Notice::SearchFailed {
                        message: other.to_string(),
                    },
                });
            }
        }
        true
    }

    /// Centers the viewport on the candidate, keeps the span, clears the
    /// candidate list and fills the targeted draft field. Selecting the same
    /// candidate again leaves the same viewport.
    pub fn select_candidate(&mut self, candidate: &PlaceCandidate) -> Result<(), CoordinatorError> {
        self.viewport = self.viewport.recentered(candidate.coordinate)?;
        self.candidates.clear();
        self.search_seq += 1;
        self.searching = false;

        if self.state == RideRequestState::Submitting {
            tracing::debug!("submission in progress, selection leaves the draft untouched");
            return Ok(());
        }

        match self.selection_target {
            SelectionTarget::Pickup => {
                self.draft.pickup = candidate.label.clone();
                self.draft.pickup_coordinate = Some(candidate.coordinate);
            }
            SelectionTarget::Dropoff => {
                self.draft.dropoff = candidate.label.clone();
                self.draft.dropoff_coordinate = Some(candidate.coordinate);
            }
        }
        self.acknowledge_edit();
        Ok(())
    }

    pub fn set_selection_target(&mut self, target: SelectionTarget) {
        self.selection_target = target;
    }

    pub fn recenter(&mut self, center: Coordinate) -> Result<(), CoordinatorError> {
        self.viewport = self.viewport.recentered(center)?;
        Ok(())
    }

    pub fn set_span(&mut self, span: Span) -> Result<(), CoordinatorError> {
        self.viewport = self.viewport.with_span(span)?;
        Ok(())
    }

    /// Applies the outcome of a device position lookup. On failure the
    /// viewport stays where it is and a notice is raised.
    pub fn apply_current_position(
        &mut self,
        result: Result<Coordinate, PositionError>,
    ) -> Result<Coordinate, CoordinatorError> {
        let outcome = result
            .map_err(|err| err.to_string())
            .and_then(|position| {
                self.viewport
                    .recentered(position)
                    .map_err(|err| format!("invalid position: {err}"))
            });

        match outcome {
            Ok(viewport) => {
                self.viewport = viewport;
                if matches!(self.notice, Some(Notice::LocationUnavailable { .. })) {
                    self.notice = None;
                }
                Ok(viewport.center())
            }
            Err(message) => {
                tracing::warn!("current location unavailable: {message}");
                self.notice = Some(Notice::LocationUnavailable {
                    message: message.clone(),
                });
                Err(CoordinatorError::LocationUnavailable(message))
            }
        }
    }

    pub fn set_pickup(&mut self, text: impl Into<String>) -> Result<(), CoordinatorError> {
        self.ensure_editable()?;
        self.draft.pickup = text.into();
        self.draft.pickup_coordinate = None;
        self.acknowledge_edit();
        Ok(())
    }

    pub fn set_dropoff(&mut self, text: impl Into<String>) -> Result<(), CoordinatorError> {
        self.ensure_editable()?;
        self.draft.dropoff = text.into();
        self.draft.dropoff_coordinate = None;
        self.acknowledge_edit();
        Ok(())
    }

    /// Validates the draft and moves to `Submitting`. On error nothing
    /// changes and the scheduler must not be contacted.
    pub fn begin_submit(&mut self) -> Result<RideScheduleRequest, CoordinatorError> {
        match self.state {
            RideRequestState::Submitting => return Err(CoordinatorError::AlreadyInProgress),
            RideRequestState::Scheduled { .. } => {
                return Err(ValidationError::AlreadyScheduled.into());
            }
            RideRequestState::Idle | RideRequestState::Failed { .. } => {}
        }
        if !self.draft.is_submittable() {
            let missing = if self.draft.has_pickup() {
                ValidationError::MissingDropoff
            } else {
                ValidationError::MissingPickup
            };
            return Err(missing.into());
        }

        self.state = RideRequestState::Submitting;
        Ok(RideScheduleRequest {
            pickup: self.draft.pickup.trim().to_string(),
            dropoff: self.draft.dropoff.trim().to_string(),
            pickup_coordinate: self.draft.pickup_coordinate,
            dropoff_coordinate: self.draft.dropoff_coordinate,
        })
    }

    pub fn finish_submit(
        &mut self,
        result: Result<Confirmation, SchedulingError>,
    ) -> Result<Confirmation, CoordinatorError> {
        if self.state != RideRequestState::Submitting {
            tracing::warn!("scheduler answered while no submission was in progress");
            return result.map_err(|err| CoordinatorError::Scheduling(err.reason));
        }

        match result {
            Ok(confirmation) => {
                tracing::info!("ride {} scheduled", confirmation.ride_id);
                self.state = RideRequestState::Scheduled {
                    confirmation: confirmation.clone(),
                };
                Ok(confirmation)
            }
            Err(err) => {
                tracing::warn!("ride scheduling failed: {}", err.reason);
                self.state = RideRequestState::Failed {
                    reason: err.reason.clone(),
                };
                Err(CoordinatorError::Scheduling(err.reason))
            }
        }
    }

    fn ensure_editable(&self) -> Result<(), CoordinatorError> {
        if self.state == RideRequestState::Submitting {
            Err(CoordinatorError::AlreadyInProgress)
        } else {
            Ok(())
        }
    }

    // Edits start a new draft: a failure is acknowledged, a scheduled ride
    // is left behind.
    fn acknowledge_edit(&mut self) {
        if matches!(
            self.state,
            RideRequestState::Failed { .. } | RideRequestState::Scheduled { .. }
        ) {
            tracing::debug!("draft edited, returning to idle");
            self.state = RideRequestState::Idle;
        }
    }
}

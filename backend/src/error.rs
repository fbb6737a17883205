use shared::ViewportError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("pickup location is required")]
    MissingPickup,
    #[error("dropoff location is required")]
    MissingDropoff,
    #[error("this ride is already scheduled; edit the request to start a new one")]
    AlreadyScheduled,
}

/// Every failure the coordinator surfaces. All of them are recoverable:
/// none ends the coordinator's lifecycle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoordinatorError {
    #[error("ride request is not submittable: {0}")]
    Validation(#[from] ValidationError),
    #[error("a ride request is already being submitted")]
    AlreadyInProgress,
    #[error("location search failed: {0}")]
    Provider(String),
    #[error("location search timed out")]
    SearchTimeout,
    #[error("current location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("ride scheduling failed: {0}")]
    Scheduling(String),
    #[error("invalid viewport: {0}")]
    Viewport(#[from] ViewportError),
    #[error("coordinator is no longer running")]
    Closed,
}

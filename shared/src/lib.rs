use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Checks latitude in [-90, 90] and longitude in [-180, 180].
    pub fn validate(self) -> Result<Self, ViewportError> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ViewportError::InvalidLatitude(self.lat));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ViewportError::InvalidLongitude(self.lon));
        }
        Ok(self)
    }

    pub fn is_valid(self) -> bool {
        self.validate().is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub lat_delta: f64,
    pub lon_delta: f64,
}

impl Span {
    pub fn validate(self) -> Result<Self, ViewportError> {
        // NaN fails both comparisons
        if self.lat_delta > 0.0 && self.lon_delta > 0.0 {
            Ok(self)
        } else {
            Err(ViewportError::InvalidSpan {
                lat_delta: self.lat_delta,
                lon_delta: self.lon_delta,
            })
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ViewportError {
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),
    #[error("span deltas must be strictly positive (lat {lat_delta}, lon {lon_delta})")]
    InvalidSpan { lat_delta: f64, lon_delta: f64 },
}

/// Visible map region. Fields are private so every instance has passed
/// validation; deserialization goes through [`Viewport::new`] as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawViewport")]
pub struct Viewport {
    center: Coordinate,
    span: Span,
}

#[derive(Deserialize)]
struct RawViewport {
    center: Coordinate,
    span: Span,
}

impl TryFrom<RawViewport> for Viewport {
    type Error = ViewportError;

    fn try_from(raw: RawViewport) -> Result<Self, Self::Error> {
        Viewport::new(raw.center, raw.span)
    }
}

impl Viewport {
    pub fn new(center: Coordinate, span: Span) -> Result<Self, ViewportError> {
        Ok(Self {
            center: center.validate()?,
            span: span.validate()?,
        })
    }

    pub fn center(&self) -> Coordinate {
        self.center
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Same span, new center.
    pub fn recentered(self, center: Coordinate) -> Result<Self, ViewportError> {
        Self::new(center, self.span)
    }

    pub fn with_span(self, span: Span) -> Result<Self, ViewportError> {
        Self::new(self.center, span)
    }
}

/// One geocoding result, ordered by provider relevance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceCandidate {
    pub id: String,
    pub label: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RideRequestDraft {
    pub pickup: String,
    pub dropoff: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropoff_coordinate: Option<Coordinate>,
}

impl RideRequestDraft {
    pub fn has_pickup(&self) -> bool {
        !self.pickup.trim().is_empty()
    }

    pub fn has_dropoff(&self) -> bool {
        !self.dropoff.trim().is_empty()
    }

    /// Only the text matters; resolved coordinates are optional.
    pub fn is_submittable(&self) -> bool {
        self.has_pickup() && self.has_dropoff()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub ride_id: String,
    pub pickup: String,
    pub dropoff: String,
    pub scheduled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RideRequestState {
    #[default]
    Idle,
    Submitting,
    Scheduled {
        confirmation: Confirmation,
    },
    Failed {
        reason: String,
    },
}

/// Which draft field a selected candidate fills in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectionTarget {
    #[default]
    Pickup,
    Dropoff,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    SearchFailed { message: String },
    SearchTimeout,
    LocationUnavailable { message: String },
}

/// Read-only view of the coordinator handed to rendering code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub viewport: Viewport,
    pub query: String,
    pub candidates: Vec<PlaceCandidate>,
    pub searching: bool,
    pub selection_target: SelectionTarget,
    pub draft: RideRequestDraft,
    pub state: RideRequestState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

/// Body sent to a remote ride scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RideScheduleRequest {
    pub pickup: String,
    pub dropoff: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pickup_coordinate: Option<Coordinate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dropoff_coordinate: Option<Coordinate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

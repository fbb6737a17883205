use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use chrono::Utc;
use shared::{ApiError, Confirmation, RideScheduleRequest};
use uuid::Uuid;

use crate::providers::{RideScheduler, SchedulingError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Forwards ride requests to a remote dispatch service as JSON.
pub struct HttpRideScheduler {
    client: reqwest::Client,
    url: String,
}

impl HttpRideScheduler {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl RideScheduler for HttpRideScheduler {
    async fn schedule(
        &self,
        request: RideScheduleRequest,
    ) -> Result<Confirmation, SchedulingError> {
        tracing::info!(
            "scheduling ride {:?} -> {:?} via {}",
            request.pickup,
            request.dropoff,
            self.url
        );
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| SchedulingError::new(format!("scheduler unreachable: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<Confirmation>()
                .await
                .map_err(|err| SchedulingError::new(format!("invalid confirmation: {err}")));
        }

        // Rejections carry a human-readable reason when the service follows
        // the ApiError shape.
        let reason = match response.json::<ApiError>().await {
            Ok(body) => body.message,
            Err(_) => format!("scheduler answered {status}"),
        };
        Err(SchedulingError::new(reason))
    }
}

/// Local stand-in for a dispatch service: confirms rides until its fixed
/// number of drivers is used up.
pub struct InMemoryRideScheduler {
    capacity: usize,
    rides: Mutex<Vec<Confirmation>>,
}

impl InMemoryRideScheduler {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            rides: Mutex::new(Vec::new()),
        }
    }

    pub fn scheduled(&self) -> Vec<Confirmation> {
        self.rides
            .lock()
            .map(|rides| rides.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RideScheduler for InMemoryRideScheduler {
    async fn schedule(
        &self,
        request: RideScheduleRequest,
    ) -> Result<Confirmation, SchedulingError> {
        let mut rides = self
            .rides
            .lock()
            .map_err(|_| SchedulingError::new("scheduler state poisoned"))?;
        if rides.len() >= self.capacity {
            return Err(SchedulingError::new("no drivers available"));
        }

        let confirmation = Confirmation {
            ride_id: Uuid::new_v4().to_string(),
            pickup: request.pickup,
            dropoff: request.dropoff,
            scheduled_at: Utc::now(),
        };
        rides.push(confirmation.clone());
        tracing::info!(
            "ride {} confirmed ({}/{} drivers busy)",
            confirmation.ride_id,
            rides.len(),
            self.capacity
        );
        Ok(confirmation)
    }
}

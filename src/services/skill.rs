//! Skill request handling
//!
//! One envelope in, one `SpeechResponse` out. The only suspension point is the
//! arrival lookup; every failure is turned into a canned reply here, so the
//! caller never sees an error.

use crate::domain::error::SkillError;
use crate::domain::speech::{
    describe_arrivals, SpeechResponse, GOODBYE_MESSAGE, HELP_MESSAGE, LAUNCH_MESSAGE,
};
use crate::domain::types::{Arrivals, EstimateCount, RequestEnvelope, RouteCode, StopCode};
use crate::infra::metrics::Metrics;
use crate::io::transloc::LookupError;
use crate::services::directory::TransitDirectory;
use crate::services::router::{SkillRequest, SlotValues};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Source of upstream arrival estimates
#[async_trait]
pub trait ArrivalSource: Send + Sync {
    /// Fetch the next arrival (and the one after it for `EstimateCount::Double`).
    /// `LookupError::NoEstimates` signals a successful but empty response.
    async fn fetch_arrivals(
        &self,
        route: RouteCode,
        stop: StopCode,
        count: EstimateCount,
    ) -> Result<Arrivals, LookupError>;
}

/// Log lookup failure (cold path)
#[cold]
fn log_lookup_failed(route: RouteCode, stop: StopCode, e: &LookupError) {
    warn!(route = %route, stop = %stop, error = %e, "arrival_lookup_failed");
}

pub struct Skill<S: ArrivalSource> {
    directory: Arc<TransitDirectory>,
    source: S,
    unavailable_message: String,
    metrics: Arc<Metrics>,
}

impl<S: ArrivalSource> Skill<S> {
    pub fn new(
        directory: Arc<TransitDirectory>,
        source: S,
        unavailable_message: impl Into<String>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { directory, source, unavailable_message: unavailable_message.into(), metrics }
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    /// Handle one platform request envelope
    pub async fn handle(&self, envelope: &RequestEnvelope) -> SpeechResponse {
        let request = SkillRequest::route(envelope);
        self.metrics.record_request(&request);
        debug!(
            request_id = %envelope.request_id(),
            request_type = %envelope.request_type(),
            intent = ?envelope.intent_name(),
            kind = %request.kind(),
            "skill_request_routed"
        );
        self.respond(request).await
    }

    /// Produce the response for an already routed request
    pub async fn respond(&self, request: SkillRequest) -> SpeechResponse {
        let result = match request {
            SkillRequest::Launch => Ok(SpeechResponse::ask(LAUNCH_MESSAGE)),
            SkillRequest::Help => Ok(SpeechResponse::ask(HELP_MESSAGE)),
            SkillRequest::Cancel => Ok(SpeechResponse::tell(GOODBYE_MESSAGE)),
            SkillRequest::SessionEnded => Ok(SpeechResponse::silent()),
            SkillRequest::NextArrival(slots) => self.arrivals(&slots, EstimateCount::Single).await,
            SkillRequest::TwoArrivals(slots) => self.arrivals(&slots, EstimateCount::Double).await,
            SkillRequest::Unrecognized => Err(SkillError::UnroutableRequest),
        };

        result.unwrap_or_else(|e| {
            if e.is_clarification() {
                self.metrics.record_clarification();
                info!(reason = %e, "skill_clarification");
            }
            e.to_speech(&self.unavailable_message)
        })
    }

    async fn arrivals(
        &self,
        slots: &SlotValues,
        count: EstimateCount,
    ) -> Result<SpeechResponse, SkillError> {
        let query = self.directory.resolve(slots)?;

        let start = Instant::now();
        let result = self.source.fetch_arrivals(query.route, query.stop_code, count).await;
        let latency_ms = start.elapsed().as_millis() as u64;
        self.metrics.record_upstream(latency_ms);

        let mut arrivals = match result {
            Ok(arrivals) => arrivals,
            Err(LookupError::NoEstimates) => {
                self.metrics.record_upstream_empty();
                info!(bus = %query.bus, stop = %query.stop, "arrival_lookup_empty");
                return Err(SkillError::UpstreamUnavailable);
            }
            Err(e) => {
                self.metrics.record_upstream_failure();
                log_lookup_failed(query.route, query.stop_code, &e);
                return Err(SkillError::UpstreamUnavailable);
            }
        };

        if count == EstimateCount::Single {
            arrivals.second = None;
        }

        let message = describe_arrivals(&query.bus, &query.stop, &arrivals, Utc::now());
        info!(
            bus = %query.bus,
            stop = %query.stop,
            count = %count.as_str(),
            latency_ms = %latency_ms,
            message = %message,
            "arrival_lookup"
        );
        Ok(SpeechResponse::tell(message))
    }
}

//! TransLoc arrival-estimates client
//!
//! Request:
//! - GET <base_url>/arrival-estimates.json?agencies=<agency>&routes=<route>&stops=<stop>
//! - API key in a header (X-Mashape-Key by default)
//!
//! Response body: { "data": [ { "arrivals": [ { "arrival_at": "<ISO-8601>" }, ... ] } ] }
//! Only the first `data` entry is read.

use crate::domain::types::{ArrivalEstimate, Arrivals, EstimateCount, RouteCode, StopCode};
use crate::infra::config::Config;
use crate::services::skill::ArrivalSource;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

const ARRIVALS_PATH: &str = "arrival-estimates.json";

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("invalid response body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no arrival estimates")]
    NoEstimates,
}

#[derive(Debug, Deserialize)]
struct ArrivalResponse {
    #[serde(default)]
    data: Option<Vec<StopArrivals>>,
}

#[derive(Debug, Deserialize)]
struct StopArrivals {
    #[serde(default)]
    arrivals: Option<Vec<RawArrival>>,
}

#[derive(Debug, Deserialize)]
struct RawArrival {
    arrival_at: DateTime<Utc>,
}

/// Extract the first (and optionally second) estimate from a response body
pub fn parse_arrivals(body: &str, count: EstimateCount) -> Result<Arrivals, LookupError> {
    let response: ArrivalResponse = serde_json::from_str(body)?;

    let arrivals = response
        .data
        .and_then(|data| data.into_iter().next())
        .and_then(|stop| stop.arrivals)
        .unwrap_or_default();

    let mut estimates = arrivals.into_iter().map(|a| ArrivalEstimate::new(a.arrival_at));
    let first = estimates.next().ok_or(LookupError::NoEstimates)?;
    let second = match count {
        EstimateCount::Double => estimates.next(),
        EstimateCount::Single => None,
    };

    Ok(Arrivals { first, second })
}

pub struct TranslocClient {
    http: reqwest::Client,
    endpoint: Url,
    agency: String,
    api_key_header: String,
    api_key: String,
}

impl TranslocClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let base = config.transloc_base_url().trim_end_matches('/');
        let endpoint = Url::parse(&format!("{base}/{ARRIVALS_PATH}"))
            .with_context(|| format!("Invalid TransLoc base URL {base}"))?;

        let api_key = match config.transloc_api_key() {
            Some(key) => key.to_string(),
            None => {
                warn!("transloc_api_key_missing");
                String::new()
            }
        };

        // Create HTTP client once for reuse (connection pooling)
        let http = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            agency: config.transloc_agency().to_string(),
            api_key_header: config.transloc_api_key_header().to_string(),
            api_key,
        })
    }

    /// Full request URL for one route at one stop
    pub fn arrivals_url(&self, route: RouteCode, stop: StopCode) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("agencies", &self.agency)
            .append_pair("routes", &route.to_string())
            .append_pair("stops", &stop.to_string());
        url
    }
}

#[async_trait]
impl ArrivalSource for TranslocClient {
    async fn fetch_arrivals(
        &self,
        route: RouteCode,
        stop: StopCode,
        count: EstimateCount,
    ) -> Result<Arrivals, LookupError> {
        let url = self.arrivals_url(route, stop);
        debug!(url = %url, "transloc_request");

        let response = self
            .http
            .get(url)
            .header(self.api_key_header.as_str(), self.api_key.as_str())
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        debug!(status = %status.as_u16(), bytes = %body.len(), "transloc_response");
        parse_arrivals(&body, count)
    }
}

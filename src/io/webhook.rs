//! Skill webhook HTTP endpoint
//!
//! Routes:
//! - POST / and POST /skill - voice platform request envelope in, speech response out
//! - GET /health - liveness
//! - GET /metrics - skill counters in Prometheus text format
//!
//! Uses hyper for the HTTP server, one task per connection.

use crate::domain::types::RequestEnvelope;
use crate::infra::metrics::{
    Metrics, MetricsSummary, METRICS_BUCKET_BOUNDS, METRICS_NUM_BUCKETS, REQUEST_KINDS,
};
use crate::services::skill::{ArrivalSource, Skill};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Envelopes are a few KiB; anything larger is not from the platform
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    buckets: &[u64; METRICS_NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[METRICS_NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum {sum}");
    let _ = writeln!(output, "{name}_count {count}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(summary: &MetricsSummary) -> String {
    let mut output = String::with_capacity(2048);

    let _ = writeln!(output, "# HELP skill_requests_total Skill requests by routed kind");
    let _ = writeln!(output, "# TYPE skill_requests_total counter");
    for (kind, count) in REQUEST_KINDS.iter().zip(summary.requests_by_kind.iter()) {
        let _ = writeln!(output, "skill_requests_total{{kind=\"{kind}\"}} {count}");
    }

    write_metric(
        &mut output,
        "skill_rejected_total",
        "Request bodies that were not a valid envelope",
        MetricType::Counter,
        summary.rejected_total,
    );
    write_metric(
        &mut output,
        "skill_clarifications_total",
        "Unknown or missing bus/stop names",
        MetricType::Counter,
        summary.clarifications_total,
    );
    write_metric(
        &mut output,
        "skill_upstream_requests_total",
        "Arrival lookups attempted",
        MetricType::Counter,
        summary.upstream_requests_total,
    );
    write_metric(
        &mut output,
        "skill_upstream_failures_total",
        "Arrival lookups that failed",
        MetricType::Counter,
        summary.upstream_failures_total,
    );
    write_metric(
        &mut output,
        "skill_upstream_empty_total",
        "Arrival lookups with no estimates",
        MetricType::Counter,
        summary.upstream_empty_total,
    );
    write_histogram(
        &mut output,
        "skill_upstream_latency_ms",
        "Arrival lookup latency in milliseconds",
        &summary.upstream_latency_buckets,
        &METRICS_BUCKET_BOUNDS,
        summary.upstream_latency_sum_ms,
    );
    write_metric(
        &mut output,
        "skill_upstream_latency_max_ms",
        "Maximum arrival lookup latency",
        MetricType::Gauge,
        summary.upstream_latency_max_ms,
    );

    output
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json;charset=UTF-8")
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

/// Read the body and run it through the skill
async fn handle_skill<S: ArrivalSource>(
    req: Request<hyper::body::Incoming>,
    skill: Arc<Skill<S>>,
) -> Response<Full<Bytes>> {
    let body = match Limited::new(req.into_body(), MAX_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            skill.metrics().record_rejected();
            warn!(error = %e, "skill_body_read_failed");
            if e.downcast_ref::<LengthLimitError>().is_some() {
                return text_response(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
            }
            return text_response(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    let envelope: RequestEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            skill.metrics().record_rejected();
            warn!(error = %e, bytes = %body.len(), "skill_envelope_invalid");
            return text_response(StatusCode::BAD_REQUEST, "Bad Request");
        }
    };

    let speech = skill.handle(&envelope).await;
    json_response(StatusCode::OK, speech.to_json())
}

/// Handle HTTP requests
async fn handle_request<S: ArrivalSource>(
    req: Request<hyper::body::Incoming>,
    skill: Arc<Skill<S>>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match (&method, path.as_str()) {
        (&Method::POST, "/") | (&Method::POST, "/skill") => Ok(handle_skill(req, skill).await),
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics.report());
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(text_response(StatusCode::OK, "ok")),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

/// Bind and serve the webhook until shutdown
pub async fn start_skill_server<S: ArrivalSource + 'static>(
    addr: SocketAddr,
    skill: Arc<Skill<S>>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    serve(listener, skill, shutdown).await
}

/// Serve the webhook on an already bound listener
pub async fn serve<S: ArrivalSource + 'static>(
    listener: TcpListener,
    skill: Arc<Skill<S>>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let metrics = skill.metrics().clone();
    info!(addr = %listener.local_addr()?, "skill_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let skill = skill.clone();
                        let metrics = metrics.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let skill = skill.clone();
                                let metrics = metrics.clone();
                                async move { handle_request(req, skill, metrics).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "skill_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "skill_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("skill_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

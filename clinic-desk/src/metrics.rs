use axum::{
    extract::{MatchedPath, Request},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramVec, TextEncoder, histogram_opts, opts,
    register_counter_vec, register_gauge, register_histogram_vec,
};

use std::sync::LazyLock;
use std::time::Instant;

static HTTP_REQUESTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"]
    )
    .unwrap()
});

static HTTP_REQUEST_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "http_request_duration_seconds",
            "HTTP request duration in seconds"
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0
        ]),
        &["method", "path"]
    )
    .unwrap()
});

static SESSIONS_ACTIVE: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge!(opts!("desk_sessions_active", "Live dashboard sessions")).unwrap()
});

static CHAT_MESSAGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!("chat_messages_total", "Total chat messages appended"),
        &["kind", "sender_role"]
    )
    .unwrap()
});

static CONVERSATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!("chat_conversations_total", "Conversation lifecycle events"),
        &["event"]
    )
    .unwrap()
});

static APPOINTMENT_DECISIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    register_counter_vec!(
        opts!(
            "appointment_decisions_total",
            "Appointment approve/reject outcomes"
        ),
        &["decision", "outcome"]
    )
    .unwrap()
});

static DB_QUERY_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    register_histogram_vec!(
        histogram_opts!(
            "db_query_duration_seconds",
            "Duration of database queries in seconds"
        ),
        &["operation"]
    )
    .unwrap()
});

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    // label by route template so ids don't blow up cardinality
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION
        .with_label_values(&[&method, &path])
        .observe(duration.as_secs_f64());

    response
}

// ------------------------------------------------------------
// METRICS ENDPOINT HANDLER
// ------------------------------------------------------------
pub async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metrics = prometheus::gather();
    let mut buffer = Vec::new();

    encoder
        .encode(&metrics, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// ------------------------------------------------------------
// METRIC HELPERS
// ------------------------------------------------------------
pub struct Metrics;

impl Metrics {
    // --- Sessions ---
    pub fn session_opened() {
        SESSIONS_ACTIVE.inc();
    }

    pub fn sessions_closed(count: usize) {
        SESSIONS_ACTIVE.sub(count as f64);
    }

    // --- Chat ---
    pub fn chat_message_appended(kind: &str, sender_role: &str) {
        CHAT_MESSAGES_TOTAL
            .with_label_values(&[kind, sender_role])
            .inc();
    }

    pub fn conversation_event(event: &str) {
        CONVERSATIONS_TOTAL.with_label_values(&[event]).inc();
    }

    // --- Appointments ---
    pub fn appointment_decided(decision: &str, outcome: &str) {
        APPOINTMENT_DECISIONS_TOTAL
            .with_label_values(&[decision, outcome])
            .inc();
    }

    pub fn observe_db_query(operation: &str, duration: std::time::Duration) {
        DB_QUERY_DURATION_SECONDS
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }
}

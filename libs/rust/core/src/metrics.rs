//! Prometheus metrics for training, model loading and prediction serving.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder, HistogramVec, IntCounter,
    IntCounterVec, TextEncoder,
};

pub struct ServingMetrics {
    pub predictions_total: IntCounterVec,
    pub prediction_latency_seconds: HistogramVec,
    pub model_loads_total: IntCounterVec,
    pub model_switches_total: IntCounter,
    pub training_runs_total: IntCounterVec,
}

pub static SERVING_METRICS: Lazy<ServingMetrics> = Lazy::new(|| ServingMetrics {
    predictions_total: register_int_counter_vec!(
        "iris_predictions_total",
        "Prediction requests by resolved model version and outcome",
        &["version", "outcome"]
    )
    .expect("register iris_predictions_total"),
    prediction_latency_seconds: register_histogram_vec!(
        "iris_prediction_latency_seconds",
        "Time spent resolving a model and classifying one feature vector",
        &["version"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    )
    .expect("register iris_prediction_latency_seconds"),
    model_loads_total: register_int_counter_vec!(
        "iris_model_loads_total",
        "Artifact loads from disk into the in-memory cache",
        &["version"]
    )
    .expect("register iris_model_loads_total"),
    model_switches_total: register_int_counter!(
        "iris_model_switches_total",
        "Successful active-model switches"
    )
    .expect("register iris_model_switches_total"),
    training_runs_total: register_int_counter_vec!(
        "iris_training_runs_total",
        "Completed training runs by version",
        &["version"]
    )
    .expect("register iris_training_runs_total"),
});

/// Text exposition of everything in the default registry.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    Lazy::force(&SERVING_METRICS);
    let families = prometheus::default_registry().gather();
    let mut buf = Vec::new();
    TextEncoder::new().encode(&families, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub async fn metrics_handler() -> Response {
    match render_metrics() {
        Ok(body) => (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("encode error: {e}")).into_response(),
    }
}

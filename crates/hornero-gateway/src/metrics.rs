//! Prometheus metrics for the Hornero gateway
//!
//! Exposes access guard decisions and tenant isolation violations.

use axum::{
    http::{header::CONTENT_TYPE, StatusCode},
    response::{IntoResponse, Response},
};
use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge_vec, CounterVec, Encoder, GaugeVec, TextEncoder};

lazy_static! {
    /// Access guard decisions by outcome (`tenant`, `super_admin`,
    /// `unauthenticated`, `subscription_expired`, or a deny reason code)
    pub static ref GUARD_OUTCOMES: CounterVec = register_counter_vec!(
        "hornero_guard_outcomes_total",
        "Access guard decisions by outcome",
        &["outcome"]
    )
    .expect("guard outcome counter registers once");

    /// Tenant isolation violations by kind
    pub static ref TENANT_VIOLATIONS: CounterVec = register_counter_vec!(
        "hornero_tenant_violations_total",
        "Tenant isolation violations by kind",
        &["kind"]
    )
    .expect("violation counter registers once");

    /// Build info
    pub static ref BUILD_INFO: GaugeVec =
        register_gauge_vec!("hornero_build_info", "Build information", &["version", "commit"])
            .expect("build info gauge registers once");
}

/// Initialize metrics with build info
pub fn init_metrics() {
    BUILD_INFO
        .with_label_values(&[
            env!("CARGO_PKG_VERSION"),
            option_env!("GIT_COMMIT_SHA").unwrap_or("unknown"),
        ])
        .set(1.0);
}

/// Export metrics in Prometheus text format
pub fn export() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub async fn metrics_handler() -> Response {
    match export() {
        Ok(body) => ([(CONTENT_TYPE, TextEncoder::new().format_type().to_string())], body).into_response(),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

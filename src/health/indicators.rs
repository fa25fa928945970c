//! Health indicators and the `/health` handler.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::store::CounterStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    pub status: IndicatorStatus,
    #[serde(flatten)]
    pub data: BTreeMap<String, Value>,
}

impl Indicator {
    fn up(data: Value) -> Self {
        Self::with(IndicatorStatus::Up, data)
    }

    fn down(message: impl Into<String>) -> Self {
        Self::with(IndicatorStatus::Down, json!({ "message": message.into() }))
    }

    fn with(status: IndicatorStatus, data: Value) -> Self {
        let data = match data {
            Value::Object(map) => map.into_iter().collect(),
            _ => BTreeMap::new(),
        };
        Self { status, data }
    }
}

/// Aggregated health, split into healthy (`info`) and failing (`error`)
/// indicators, with everything repeated under `details`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub info: BTreeMap<String, Indicator>,
    pub error: BTreeMap<String, Indicator>,
    pub details: BTreeMap<String, Indicator>,
}

impl HealthReport {
    pub fn from_indicators(indicators: Vec<(&'static str, Indicator)>) -> Self {
        let mut info = BTreeMap::new();
        let mut error = BTreeMap::new();
        let mut details = BTreeMap::new();

        for (name, indicator) in indicators {
            details.insert(name.to_string(), indicator.clone());
            match indicator.status {
                IndicatorStatus::Up => info.insert(name.to_string(), indicator),
                IndicatorStatus::Down => error.insert(name.to_string(), indicator),
            };
        }

        let status = if error.is_empty() { "ok" } else { "error" };
        Self {
            status: status.to_string(),
            info,
            error,
            details,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.error.is_empty()
    }
}

pub fn process_indicator(started_at: Instant) -> Indicator {
    Indicator::up(json!({
        "uptimeSecs": started_at.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn store_indicator(store: &Arc<dyn CounterStore>, timeout: Duration) -> Indicator {
    match tokio::time::timeout(timeout, store.tracked_keys()).await {
        Ok(Ok(keys)) => {
            metrics::record_tracked_keys(keys);
            Indicator::up(json!({ "trackedKeys": keys }))
        }
        Ok(Err(e)) => Indicator::down(e.to_string()),
        Err(_) => Indicator::down("counter store timed out"),
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let timeout = state.admission.settings().throttle.store_timeout;
    let store = store_indicator(state.admission.limiter().store(), timeout).await;

    let report = HealthReport::from_indicators(vec![
        ("process", process_indicator(state.started_at)),
        ("throttleStore", store),
    ]);

    if report.is_healthy() {
        (StatusCode::OK, Json(report))
    } else {
        tracing::warn!(failing = ?report.error.keys().collect::<Vec<_>>(), "Health check failing");
        (StatusCode::SERVICE_UNAVAILABLE, Json(report))
    }
}

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use prometheus::{opts, register_int_counter_vec_with_registry, IntCounterVec, Registry};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{
    alert::AlertGroup,
    error::{Error, ErrorKind},
    reconciler::{Reconciler, Report},
    settings::Settings,
};

#[derive(Debug, Deserialize, Clone)]
pub struct AlertReceiverSettings {
    pub bind_address: IpAddr,
    pub port: u16,
    /// bearer token alertmanager has to send, no authorization if unset
    #[serde(default)]
    pub token: Option<String>,
}

impl AlertReceiverSettings {
    pub fn global() -> &'static Self {
        &Settings::global().alert_webhook_receiver
    }

    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

struct Metrics {
    received: IntCounterVec,
    skipped: IntCounterVec,
    mutations: IntCounterVec,
    failures: IntCounterVec,
}

impl Metrics {
    fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let received = register_int_counter_vec_with_registry!(
            opts!("received_alert_groups", "total number of deserialized alert groups")
                .namespace("cachet_relay")
                .subsystem("alertmanager_webhook"),
            &["status"],
            registry
        )?;

        let skipped = register_int_counter_vec_with_registry!(
            opts!("skipped_alerts", "alerts that didn't lead to a cachet call")
                .namespace("cachet_relay")
                .subsystem("alertmanager_webhook"),
            &["reason"],
            registry
        )?;

        let mutations = register_int_counter_vec_with_registry!(
            opts!("incident_mutations", "incidents created or resolved")
                .namespace("cachet_relay")
                .subsystem("alertmanager_webhook"),
            &["outcome"],
            registry
        )?;

        let failures = register_int_counter_vec_with_registry!(
            opts!("failed_alert_groups", "alert groups answered with an error")
                .namespace("cachet_relay")
                .subsystem("alertmanager_webhook"),
            &["kind"],
            registry
        )?;

        Ok(Self {
            received,
            skipped,
            mutations,
            failures,
        })
    }

    fn record_report(&self, report: &Report) {
        let Report {
            created,
            resolved,
            already_open,
            unknown_component,
            duplicate,
        } = *report;

        self.mutations
            .with_label_values(&["created"])
            .inc_by(created as u64);
        self.mutations
            .with_label_values(&["resolved"])
            .inc_by(resolved as u64);
        self.skipped
            .with_label_values(&["already_open"])
            .inc_by(already_open as u64);
        self.skipped
            .with_label_values(&["unknown_component"])
            .inc_by(unknown_component as u64);
        self.skipped
            .with_label_values(&["duplicate"])
            .inc_by(duplicate as u64);
    }
}

pub struct State {
    reconciler: Reconciler,
    token: Option<String>,
    metrics: Metrics,
}

impl State {
    pub fn new(reconciler: Reconciler, token: Option<String>, registry: &Registry) -> Result<Self> {
        let metrics = Metrics::new(registry).context("failed to register webhook metrics")?;

        Ok(Self {
            reconciler,
            token,
            metrics,
        })
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let token = match &self.token {
            Some(token) => token,
            None => return true,
        };

        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if bearer.strip_prefix("Bearer ") == Some(token.as_str()) {
            true
        } else {
            tracing::debug!("wrong Authorization header: {:?}", bearer);
            false
        }
    }
}

fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::AuthFailure => StatusCode::UNAUTHORIZED,
        ErrorKind::BackendUnavailable => StatusCode::BAD_GATEWAY,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::NoOpenIncident => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn error_response(err: &Error) -> (StatusCode, Json<Value>) {
    let kind = err.kind();
    (
        status_code(kind),
        Json(json!({ "error": err.to_string(), "kind": kind.as_str() })),
    )
}

async fn alert_receiver(
    Extension(state): Extension<Arc<State>>,
    headers: HeaderMap,
    alert: Result<Json<AlertGroup>, JsonRejection>,
) -> (StatusCode, Json<Value>) {
    if !state.authorized(&headers) {
        state
            .metrics
            .failures
            .with_label_values(&[ErrorKind::AuthFailure.as_str()])
            .inc();
        return error_response(&Error::auth_failure("wrong Authorization header"));
    }

    let group = match alert {
        Ok(Json(group)) => group,
        Err(err) => {
            tracing::debug!("failed to deserialize alert: {:?}", err);
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            );
        }
    };

    tracing::debug!(
        "received {} {} alerts for receiver {:?} from {}",
        group.alerts.len(),
        group.status.as_str(),
        group.receiver,
        group.external_url
    );

    state
        .metrics
        .received
        .with_label_values(&[group.status.as_str()])
        .inc();

    match state.reconciler.reconcile(&group).await {
        Ok(report) => {
            tracing::debug!("reconciled alert group {:?}: {:?}", group.group_key, report);
            state.metrics.record_report(&report);
            (StatusCode::OK, Json(json!({ "status": "OK" })))
        }
        Err(err) => {
            tracing::warn!("failed to reconcile alert group {:?}: {}", group.group_key, err);
            state
                .metrics
                .failures
                .with_label_values(&[err.kind().as_str()])
                .inc();
            error_response(&err)
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "OK" }))
}

/// every request except health checks is traced, the trace layer only wraps
/// the routes added before it
pub fn router(state: Arc<State>) -> Router {
    Router::new()
        .route("/alert", post(alert_receiver))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .route("/health", get(health))
        .layer(Extension(state))
}

pub async fn run_prometheus_receiver(state: State) -> Result<()> {
    let addr = AlertReceiverSettings::global().to_socket_addr();

    tracing::info!("listening for alertmanager webhooks on {}", addr);

    axum::Server::bind(&addr)
        .serve(router(Arc::new(state)).into_make_service())
        .await
        .context("prometheus endpoint crashed")?;

    Ok(())
}

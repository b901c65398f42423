//! prometheus alertmanager receiver that reconciles alerts into cachet
//! incidents
//!
//! Features:
//! - one incident per firing notification, or a single long lived incident
//!   per component with `squash_incident`
//! - resolved notifications close the incident and note the downtime
//! - bearer token protected webhook and prometheus metrics about itself

use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use settings::Settings;

use crate::{
    alertmanager_webhook_receiver::State, cachet::CachetClient, reconciler::Reconciler,
};

mod alert;
mod alertmanager_webhook_receiver;
mod cachet;
mod component_locks;
mod error;
mod log;
mod reconciler;
mod settings;
mod telemetry_endpoint;

/// exit the complete program if one thread panics
fn setup_panic_handler() {
    let default_panic = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic(info);
        std::process::exit(1);
    }));
}

/// the entry point of the program
#[tokio::main]
pub async fn main() -> Result<()> {
    setup_panic_handler();

    log::setup_logging().context("could not setup logging")?;

    let settings = Settings::global();
    let registry = Registry::new();

    let cachet = CachetClient::new(&settings.cachet, &registry)
        .context("failed to construct cachet client")?;

    if settings.reconciler.squash_incident {
        tracing::info!(
            "squashing incidents per component, label {}",
            settings.reconciler.label_name
        );
    }

    let reconciler = Reconciler::new(Arc::new(cachet), settings.reconciler.clone());
    let state = State::new(
        reconciler,
        settings.alert_webhook_receiver.token.clone(),
        &registry,
    )?;

    tokio::try_join!(
        alertmanager_webhook_receiver::run_prometheus_receiver(state),
        telemetry_endpoint::run_telemetry_endpoint(registry),
    )?;

    Ok(())
}

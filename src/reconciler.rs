//! maps an alertmanager alert group onto cachet incident mutations
//!
//! Alerts are processed one after another in payload order. The first failing
//! backend call aborts the whole group, mutations already applied for earlier
//! alerts stay in place. Alertmanager redelivers the group if we fail.

use std::sync::Arc;

use hashbrown::HashSet;
use serde::Deserialize;

use crate::{
    alert::{AlertDetail, AlertGroup},
    cachet::{ComponentDirectory, ComponentId, ComponentStatus, IncidentStatus, StatusPage},
    component_locks::ComponentLocks,
    error::{Error, Result},
};

#[derive(Debug, Deserialize, Clone)]
pub struct ReconcilerSettings {
    /// alert label whose value is the cachet component name
    #[serde(default = "default_label_name")]
    pub label_name: String,
    /// keep a single incident open per component instead of creating one
    /// per notification
    #[serde(default)]
    pub squash_incident: bool,
}

fn default_label_name() -> String {
    "alertname".to_owned()
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            label_name: default_label_name(),
            squash_incident: false,
        }
    }
}

/// what happened to the alerts of one group
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    pub created: usize,
    pub resolved: usize,
    /// squash mode only, firing alerts whose component already has an open
    /// incident
    pub already_open: usize,
    /// alerts without the label or with a value cachet has no component for
    pub unknown_component: usize,
    /// alerts for a component already handled earlier in the same group
    pub duplicate: usize,
}

pub struct Reconciler {
    status_page: Arc<dyn StatusPage>,
    settings: ReconcilerSettings,
    locks: ComponentLocks,
}

impl Reconciler {
    pub fn new(status_page: Arc<dyn StatusPage>, settings: ReconcilerSettings) -> Self {
        Self {
            status_page,
            settings,
            locks: ComponentLocks::new(),
        }
    }

    pub async fn reconcile(&self, group: &AlertGroup) -> Result<Report> {
        let status = IncidentStatus::from(group.status);
        let directory = self.status_page.list_components().await?;

        let mut report = Report::default();
        let mut handled = HashSet::new();

        for alert in group.alerts.iter() {
            let (name, component_id) = match self.resolve_component(alert, &directory) {
                Some(component) => component,
                None => {
                    report.unknown_component += 1;
                    continue;
                }
            };

            // alertmanager may repeat an alert within one notification
            if !handled.insert(component_id) {
                tracing::debug!("skipping duplicate alert for component {}", name);
                report.duplicate += 1;
                continue;
            }

            if !self.settings.squash_incident {
                self.create(name, component_id, status).await?;
                report.created += 1;
                continue;
            }

            let _guard = self.locks.lock(component_id).await;

            match status {
                IncidentStatus::Firing => {
                    if self.open_if_none(name, component_id).await? {
                        report.created += 1;
                    } else {
                        report.already_open += 1;
                    }
                }
                IncidentStatus::Resolved => {
                    self.resolve_latest(name, component_id).await?;
                    report.resolved += 1;
                }
            }
        }

        Ok(report)
    }

    fn resolve_component<'a>(
        &self,
        alert: &'a AlertDetail,
        directory: &ComponentDirectory,
    ) -> Option<(&'a str, ComponentId)> {
        let label_name = self.settings.label_name.as_str();

        let name = match alert.component_label(label_name) {
            Some(name) => name,
            None => {
                tracing::debug!("skipping alert without label {}", label_name);
                return None;
            }
        };

        match directory.get(name) {
            Some(&component_id) => Some((name, component_id)),
            None => {
                tracing::debug!("skipping alert for unknown component {}", name);
                None
            }
        }
    }

    async fn create(&self, name: &str, component_id: ComponentId, status: IncidentStatus) -> Result<()> {
        self.status_page
            .create_incident(name, component_id, status, ComponentStatus::from(status))
            .await?;

        tracing::info!(
            "created incident for component {} ({}) with status {}",
            name,
            component_id,
            status.code()
        );

        Ok(())
    }

    /// creates a firing incident unless the newest one is still open, returns
    /// whether an incident was created
    async fn open_if_none(&self, name: &str, component_id: ComponentId) -> Result<bool> {
        let incidents = self.status_page.search_incidents(component_id).await?;

        if let Some(latest) = incidents.first() {
            if latest.is_open() {
                tracing::debug!(
                    "component {} already has open incident {}",
                    name,
                    latest.id
                );
                return Ok(false);
            }
        }

        self.create(name, component_id, IncidentStatus::Firing).await?;

        Ok(true)
    }

    /// marks the newest incident of the component as resolved and, if cachet
    /// hands back parseable timestamps, amends the message with the downtime
    async fn resolve_latest(&self, name: &str, component_id: ComponentId) -> Result<()> {
        let incidents = self.status_page.search_incidents(component_id).await?;
        let incident_id = incidents
            .first()
            .ok_or(Error::NoOpenIncident { component_id })?
            .id;

        let message = format!("Prometheus flagged service {} as up", name);
        self.status_page
            .update_incident(name, component_id, incident_id, IncidentStatus::Resolved, &message)
            .await?;

        tracing::info!("resolved incident {} of component {}", incident_id, name);

        let incident = self.status_page.read_incident(incident_id).await?;
        let downtime = match incident.downtime() {
            Some(downtime) => downtime,
            None => {
                tracing::debug!(
                    "incident {} has unparseable timestamps {:?} / {:?}",
                    incident_id,
                    incident.created_at,
                    incident.updated_at
                );
                return Ok(());
            }
        };

        let message = format!(
            "Prometheus flagged service {} as up (service was down for {} minutes)",
            name,
            downtime.num_minutes()
        );
        self.status_page
            .update_incident(name, component_id, incident_id, IncidentStatus::Resolved, &message)
            .await?;

        Ok(())
    }
}

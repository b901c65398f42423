//! the status page side: cachet data model and the operations the reconciler
//! needs from it

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::Deserialize;
use serde_with::{serde_as, DisplayFromStr, PickFirst};

pub use self::{client::CachetClient, settings::CachetSettings};
use crate::{alert::GroupStatus, error::Result};

mod client;
mod metrics;
pub mod settings;

#[cfg(test)]
pub mod testing;

pub type ComponentId = u64;
pub type IncidentId = u64;

/// component name (the value of the configured alert label) to component id
pub type ComponentDirectory = HashMap<String, ComponentId>;

/// layout of `created_at` and `updated_at` as rendered by cachet
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// the two incident states we ever write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidentStatus {
    Resolved = 1,
    Firing = 4,
}

impl IncidentStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<GroupStatus> for IncidentStatus {
    fn from(status: GroupStatus) -> Self {
        match status {
            GroupStatus::Resolved => Self::Resolved,
            GroupStatus::Firing => Self::Firing,
        }
    }
}

/// component health, mirrors the incident status one to one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Operational = 1,
    MajorOutage = 4,
}

impl ComponentStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<IncidentStatus> for ComponentStatus {
    fn from(status: IncidentStatus) -> Self {
        match status {
            IncidentStatus::Resolved => Self::Operational,
            IncidentStatus::Firing => Self::MajorOutage,
        }
    }
}

/// an incident as returned by cachet
///
/// `status` is kept as the raw code since other tools (or humans) may have
/// moved the incident into a state we never produce ourselves
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Incident {
    pub id: IncidentId,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    #[serde(default)]
    pub component_id: ComponentId,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub status: u8,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Incident {
    pub fn is_open(&self) -> bool {
        self.status == IncidentStatus::Firing.code()
    }

    /// time between creation and last update, `None` if either timestamp
    /// doesn't match [TIMESTAMP_FORMAT]
    pub fn downtime(&self) -> Option<Duration> {
        let created_at = NaiveDateTime::parse_from_str(&self.created_at, TIMESTAMP_FORMAT).ok()?;
        let updated_at = NaiveDateTime::parse_from_str(&self.updated_at, TIMESTAMP_FORMAT).ok()?;

        Some(updated_at - created_at)
    }
}

/// operations on the status page backend
#[async_trait]
pub trait StatusPage: Send + Sync {
    async fn list_components(&self) -> Result<ComponentDirectory>;

    /// incidents of a component, newest first
    async fn search_incidents(&self, component_id: ComponentId) -> Result<Vec<Incident>>;

    async fn create_incident(
        &self,
        name: &str,
        component_id: ComponentId,
        status: IncidentStatus,
        component_status: ComponentStatus,
    ) -> Result<()>;

    async fn update_incident(
        &self,
        name: &str,
        component_id: ComponentId,
        incident_id: IncidentId,
        status: IncidentStatus,
        message: &str,
    ) -> Result<()>;

    async fn read_incident(&self, incident_id: IncidentId) -> Result<Incident>;
}

//! in memory [StatusPage] recording every call, used by the reconciler and
//! webhook receiver tests

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{
    ComponentDirectory, ComponentId, ComponentStatus, Incident, IncidentId, IncidentStatus,
    StatusPage,
};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListComponents,
    SearchIncidents(ComponentId),
    CreateIncident {
        name: String,
        component_id: ComponentId,
        status: u8,
        component_status: u8,
    },
    UpdateIncident {
        name: String,
        component_id: ComponentId,
        incident_id: IncidentId,
        status: u8,
        message: String,
    },
    ReadIncident(IncidentId),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(self, Self::CreateIncident { .. } | Self::UpdateIncident { .. })
    }
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    incidents: Vec<Incident>,
    next_incident_id: IncidentId,
}

/// fake status page, incidents get `created_at` set to `created_at` and
/// updates move `updated_at` to `clock`
#[derive(Debug)]
pub struct MemoryStatusPage {
    components: ComponentDirectory,
    pub created_at: String,
    pub clock: String,
    /// every call whose name starts with this fails with a backend error
    pub fail_on: Option<&'static str>,
    state: Mutex<State>,
}

impl MemoryStatusPage {
    pub fn new<'a>(components: impl IntoIterator<Item = (&'a str, ComponentId)>) -> Self {
        Self {
            components: components
                .into_iter()
                .map(|(name, id)| (name.to_owned(), id))
                .collect(),
            created_at: "2022-05-01 10:00:00".to_owned(),
            clock: "2022-05-01 10:42:00".to_owned(),
            fail_on: None,
            state: Mutex::new(State {
                next_incident_id: 1,
                ..State::default()
            }),
        }
    }

    /// stores an incident as if it was created earlier
    pub async fn seed_incident(&self, component_id: ComponentId, status: IncidentStatus) -> IncidentId {
        let mut state = self.state.lock().await;
        let id = state.next_incident_id;
        state.next_incident_id += 1;
        state.incidents.push(Incident {
            id,
            component_id,
            status: status.code(),
            created_at: self.created_at.clone(),
            updated_at: self.created_at.clone(),
        });
        id
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.state.lock().await.calls.clone()
    }

    pub async fn mutations(&self) -> Vec<Call> {
        self.calls()
            .await
            .into_iter()
            .filter(Call::is_mutation)
            .collect()
    }

    pub async fn incidents(&self, component_id: ComponentId) -> Vec<Incident> {
        let mut incidents: Vec<_> = self
            .state
            .lock()
            .await
            .incidents
            .iter()
            .filter(|incident| incident.component_id == component_id)
            .cloned()
            .collect();
        incidents.sort_by(|a, b| b.id.cmp(&a.id));
        incidents
    }

    fn check(&self, operation: &'static str) -> Result<()> {
        match self.fail_on {
            Some(prefix) if operation.starts_with(prefix) => {
                Err(Error::backend_unavailable(operation, "connection refused"))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl StatusPage for MemoryStatusPage {
    async fn list_components(&self) -> Result<ComponentDirectory> {
        self.state.lock().await.calls.push(Call::ListComponents);
        self.check("list components")?;
        Ok(self.components.clone())
    }

    async fn search_incidents(&self, component_id: ComponentId) -> Result<Vec<Incident>> {
        self.state
            .lock()
            .await
            .calls
            .push(Call::SearchIncidents(component_id));
        self.check("search incidents")?;
        Ok(self.incidents(component_id).await)
    }

    async fn create_incident(
        &self,
        name: &str,
        component_id: ComponentId,
        status: IncidentStatus,
        component_status: ComponentStatus,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::CreateIncident {
            name: name.to_owned(),
            component_id,
            status: status.code(),
            component_status: component_status.code(),
        });
        self.check("create incident")?;

        let id = state.next_incident_id;
        state.next_incident_id += 1;
        state.incidents.push(Incident {
            id,
            component_id,
            status: status.code(),
            created_at: self.created_at.clone(),
            updated_at: self.created_at.clone(),
        });

        Ok(())
    }

    async fn update_incident(
        &self,
        name: &str,
        component_id: ComponentId,
        incident_id: IncidentId,
        status: IncidentStatus,
        message: &str,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::UpdateIncident {
            name: name.to_owned(),
            component_id,
            incident_id,
            status: status.code(),
            message: message.to_owned(),
        });
        self.check("update incident")?;

        let incident = state
            .incidents
            .iter_mut()
            .find(|incident| incident.id == incident_id)
            .ok_or(Error::IncidentNotFound {
                operation: "update incident",
                incident_id,
            })?;
        incident.status = status.code();
        incident.updated_at = self.clock.clone();

        Ok(())
    }

    async fn read_incident(&self, incident_id: IncidentId) -> Result<Incident> {
        let mut state = self.state.lock().await;
        state.calls.push(Call::ReadIncident(incident_id));
        self.check("read incident")?;

        state
            .incidents
            .iter()
            .find(|incident| incident.id == incident_id)
            .cloned()
            .ok_or(Error::IncidentNotFound {
                operation: "read incident",
                incident_id,
            })
    }
}

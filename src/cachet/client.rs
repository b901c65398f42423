//! cachet api v1 client

use anyhow::Context;
use async_trait::async_trait;
use prometheus::Registry;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    RequestBuilder, StatusCode,
};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize, Serialize};
use url::Url;

use super::{
    metrics::ClientMetrics, CachetSettings, ComponentDirectory, ComponentId, ComponentStatus,
    Incident, IncidentId, IncidentStatus, StatusPage,
};
use crate::error::{Error, Result};

const TOKEN_HEADER: &str = "x-cachet-token";

/// every cachet response wraps its payload into `data`, lists carry
/// pagination info in `meta`
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    total_pages: u32,
}

#[derive(Debug, Deserialize)]
struct Component {
    id: ComponentId,
    name: String,
}

#[derive(Debug, Serialize)]
struct IncidentBody<'a> {
    name: &'a str,
    message: &'a str,
    status: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    visible: Option<u8>,
    component_id: ComponentId,
    component_status: u8,
}

#[derive(Debug, Clone)]
/// [StatusPage] implementation talking to a cachet installation over http
pub struct CachetClient {
    client: reqwest::Client,
    /// `<cachet url>/api/v1/`
    api: Url,
    components_per_page: u32,
    metrics: ClientMetrics,
}

impl CachetClient {
    pub fn new(settings: &CachetSettings, registry: &Registry) -> anyhow::Result<Self> {
        let mut token =
            HeaderValue::from_str(&settings.token).context("cachet token is not a valid header")?;
        token.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(TOKEN_HEADER, token);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .context("failed to build http client")?;

        let api = Url::parse(&format!(
            "{}/api/v1/",
            settings.url.as_str().trim_end_matches('/')
        ))
        .context("invalid cachet url")?;

        let metrics =
            ClientMetrics::new(registry).context("failed to register cachet client metrics")?;

        Ok(Self {
            client,
            api,
            components_per_page: settings.components_per_page.max(1),
            metrics,
        })
    }

    fn endpoint(&self, operation: &'static str, path: &str) -> Result<Url> {
        self.api
            .join(path)
            .map_err(|err| Error::backend_unavailable(operation, err))
    }

    /// sends the request and decodes the response envelope
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Envelope<T>> {
        let _timer = self.metrics.record_request(operation);

        let response = request.send().await.map_err(|err| {
            self.metrics.record_failure(operation, "");
            Error::backend_unavailable(operation, err)
        })?;

        let status = response.status();
        if !status.is_success() {
            self.metrics.record_failure(operation, status.as_str());

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    Error::auth_failure(format!("cachet rejected the api token ({})", operation))
                }
                StatusCode::NOT_FOUND => Error::NotFound { operation },
                status => {
                    let body = response.text().await.unwrap_or_default();
                    Error::backend_unavailable(operation, format!("{}: {}", status, body.trim()))
                }
            });
        }

        response
            .json()
            .await
            .map_err(|err| Error::backend_unavailable(operation, err))
    }
}

/// turns a generic 404 into one naming the incident
fn incident_not_found(incident_id: IncidentId) -> impl FnOnce(Error) -> Error {
    move |err| match err {
        Error::NotFound { operation } => Error::IncidentNotFound {
            operation,
            incident_id,
        },
        err => err,
    }
}

#[async_trait]
impl StatusPage for CachetClient {
    async fn list_components(&self) -> Result<ComponentDirectory> {
        const OPERATION: &str = "list components";

        let mut directory = ComponentDirectory::new();
        let mut page: u32 = 1;
        // page count of the first response, later ones are not trusted
        let mut last_page = None;

        loop {
            let request = self
                .client
                .get(self.endpoint(OPERATION, "components")?)
                .query(&[("per_page", self.components_per_page), ("page", page)]);

            let Envelope { data, meta } = self.send::<Vec<Component>>(OPERATION, request).await?;

            if data.is_empty() {
                break;
            }

            for Component { id, name } in data {
                match directory.insert(name.clone(), id) {
                    Some(previous) if previous != id => tracing::warn!(
                        "component name {} is used by {} and {}, using {}",
                        name,
                        previous,
                        id,
                        id
                    ),
                    _ => {}
                }
            }

            let total_pages = meta
                .and_then(|meta| meta.pagination)
                .map_or(page, |pagination| pagination.total_pages);
            let last_page = *last_page.get_or_insert(total_pages);

            if page >= last_page {
                break;
            }
            page += 1;
        }

        tracing::debug!("fetched {} components from cachet", directory.len());

        Ok(directory)
    }

    async fn search_incidents(&self, component_id: ComponentId) -> Result<Vec<Incident>> {
        const OPERATION: &str = "search incidents";

        let request = self
            .client
            .get(self.endpoint(OPERATION, "incidents")?)
            .query(&[
                ("component_id", component_id.to_string()),
                ("sort", "id".to_owned()),
                ("order", "desc".to_owned()),
            ]);

        let mut incidents = self
            .send::<Vec<Incident>>(OPERATION, request)
            .await?
            .data;

        // newest first, independent of the backend's default ordering
        incidents.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(incidents)
    }

    async fn create_incident(
        &self,
        name: &str,
        component_id: ComponentId,
        status: IncidentStatus,
        component_status: ComponentStatus,
    ) -> Result<()> {
        const OPERATION: &str = "create incident";

        let message = match status {
            IncidentStatus::Firing => format!("Prometheus flagged service {} as down", name),
            IncidentStatus::Resolved => format!("Prometheus flagged service {} as up", name),
        };

        let body = IncidentBody {
            name,
            message: &message,
            status: status.code(),
            visible: Some(1),
            component_id,
            component_status: component_status.code(),
        };

        let request = self
            .client
            .post(self.endpoint(OPERATION, "incidents")?)
            .json(&body);

        self.send::<IgnoredAny>(OPERATION, request).await?;

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
        const OPERATION: &str = "update incident";

        let body = IncidentBody {
            name,
            message,
            status: status.code(),
            visible: None,
            component_id,
            component_status: ComponentStatus::from(status).code(),
        };

        let request = self
            .client
            .put(self.endpoint(OPERATION, &format!("incidents/{}", incident_id))?)
            .json(&body);

        self.send::<IgnoredAny>(OPERATION, request)
            .await
            .map_err(incident_not_found(incident_id))?;

        Ok(())
    }

    async fn read_incident(&self, incident_id: IncidentId) -> Result<Incident> {
        const OPERATION: &str = "read incident";

        let request = self
            .client
            .get(self.endpoint(OPERATION, &format!("incidents/{}", incident_id))?);

        let incident = self
            .send::<Incident>(OPERATION, request)
            .await
            .map_err(incident_not_found(incident_id))?
            .data;

        Ok(incident)
    }
}

//! Service-to-service clients used to purge a user's data on account deletion.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::ServicesConfig;
use crate::middleware::auth::USER_ID_HEADER;
use crate::types::ServiceKind;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to {service} failed: {source}")]
    Transport {
        service: ServiceKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} answered with status {status}")]
    Status { service: ServiceKind, status: u16 },

    #[error("{service} returned an unreadable body")]
    Decode { service: ServiceKind },

    #[error("could not remove data from: {}", .0.join(", "))]
    Incomplete(Vec<String>),
}

/// Body of `DELETE /api/<resource>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedCount {
    pub deleted: u64,
}

/// A service holding records owned by users
#[async_trait]
pub trait OwnedDataClient: Send + Sync {
    fn service(&self) -> ServiceKind;

    /// Delete every record owned by `owner_id`, returning how many went
    async fn purge_owner(&self, owner_id: Uuid) -> Result<u64, ClientError>;
}

pub struct HttpOwnedDataClient {
    service: ServiceKind,
    base_url: String,
    http: reqwest::Client,
}

impl HttpOwnedDataClient {
    pub fn new(service: ServiceKind, base_url: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            service,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// Clients for every service that stores owned records
    pub fn for_services(services: &ServicesConfig, timeout: Duration) -> Result<Vec<Arc<dyn OwnedDataClient>>, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).no_proxy().build()?;
        let clients = [ServiceKind::Notes, ServiceKind::Tasks, ServiceKind::Events]
            .into_iter()
            .filter_map(|kind| {
                services.base_url(kind).map(|url| {
                    Arc::new(HttpOwnedDataClient::new(kind, url, http.clone())) as Arc<dyn OwnedDataClient>
                })
            })
            .collect();
        Ok(clients)
    }

    fn collection_url(&self) -> String {
        format!("{}/api/{}", self.base_url, self.service.name())
    }
}

#[async_trait]
impl OwnedDataClient for HttpOwnedDataClient {
    fn service(&self) -> ServiceKind {
        self.service
    }

    async fn purge_owner(&self, owner_id: Uuid) -> Result<u64, ClientError> {
        let service = self.service;
        let response = self
            .http
            .delete(self.collection_url())
            .header(USER_ID_HEADER, owner_id.to_string())
            .send()
            .await
            .map_err(|source| ClientError::Transport { service, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                service,
                status: status.as_u16(),
            });
        }

        let body: DeletedCount = response
            .json()
            .await
            .map_err(|_| ClientError::Decode { service })?;
        Ok(body.deleted)
    }
}

/// Outcome of purging one owner across services
#[derive(Debug, Default, Clone, Serialize)]
pub struct PurgeReport {
    pub deleted: BTreeMap<String, u64>,
    pub failed: BTreeMap<String, String>,
}

impl PurgeReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn into_result(self) -> Result<Self, ClientError> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ClientError::Incomplete(self.failed.into_keys().collect()))
        }
    }
}

/// Purge `owner_id` from every client concurrently. One failing service does not stop the others.
pub async fn purge_everywhere(clients: &[Arc<dyn OwnedDataClient>], owner_id: Uuid) -> PurgeReport {
    let calls = clients.iter().map(|client| async move {
        (client.service(), client.purge_owner(owner_id).await)
    });

    let mut report = PurgeReport::default();
    for (service, outcome) in futures::future::join_all(calls).await {
        match outcome {
            Ok(count) => {
                tracing::info!("Purged {} {} records for {}", count, service, owner_id);
                report.deleted.insert(service.name().to_string(), count);
            }
            Err(err) => {
                tracing::error!("Failed to purge {} records for {}: {}", service, owner_id, err);
                report.failed.insert(service.name().to_string(), err.to_string());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedClient {
        service: ServiceKind,
        outcome: Option<u64>,
    }

    #[async_trait]
    impl OwnedDataClient for FixedClient {
        fn service(&self) -> ServiceKind {
            self.service
        }

        async fn purge_owner(&self, _owner_id: Uuid) -> Result<u64, ClientError> {
            self.outcome.ok_or(ClientError::Status {
                service: self.service,
                status: 503,
            })
        }
    }

    #[tokio::test]
    async fn report_collects_successes_and_failures() {
        let clients: Vec<Arc<dyn OwnedDataClient>> = vec![
            Arc::new(FixedClient { service: ServiceKind::Notes, outcome: Some(3) }),
            Arc::new(FixedClient { service: ServiceKind::Tasks, outcome: None }),
            Arc::new(FixedClient { service: ServiceKind::Events, outcome: Some(0) }),
        ];

        let report = purge_everywhere(&clients, Uuid::new_v4()).await;
        assert_eq!(report.deleted.get("notes"), Some(&3));
        assert_eq!(report.deleted.get("events"), Some(&0));
        assert!(report.failed.contains_key("tasks"));

        match report.into_result() {
            Err(ClientError::Incomplete(services)) => assert_eq!(services, vec!["tasks"]),
            other => panic!("expected incomplete purge, got {:?}", other),
        }
    }

    #[test]
    fn collection_url_uses_service_name() {
        let client = HttpOwnedDataClient::new(ServiceKind::Events, "http://events:9091/", reqwest::Client::new());
        assert_eq!(client.collection_url(), "http://events:9091/api/events");
    }
}

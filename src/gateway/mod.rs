//! The `call_mcp` gateway: capacity gate plus worker dispatch.

pub mod server;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{GatewaySettings, WorkerCatalog};
use crate::error::CascadeError;
use crate::registry::ToolRegistry;
use crate::worker::{self, CallOutcome, WorkerEndpoint};

pub use server::router;

/// Shared gateway state. One instance serves all requests.
pub struct Gateway {
    settings: GatewaySettings,
    /// Swapped wholesale by the catalog reload task.
    catalog: Arc<RwLock<Arc<WorkerCatalog>>>,
    registry: Arc<ToolRegistry>,
    client: reqwest::Client,
    endpoint: WorkerEndpoint,
}

impl Gateway {
    pub fn new(settings: GatewaySettings, catalog: WorkerCatalog) -> crate::Result<Self> {
        settings.validate()?;
        catalog.validate()?;
        // Workers are always local; never route them through a proxy.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .no_proxy()
            .build()
            .map_err(|e| CascadeError::InvalidConfig("http client".into(), e.to_string()))?;
        let endpoint = WorkerEndpoint {
            base_url: settings.worker_base_url(),
            startup_grace: Duration::from_millis(settings.startup_grace_ms),
        };
        tracing::info!(
            workers = catalog.mcp_servers.len(),
            max_tools = settings.max_tools,
            worker_url = %endpoint.base_url,
            "gateway ready"
        );
        Ok(Self {
            settings,
            catalog: Arc::new(RwLock::new(Arc::new(catalog))),
            registry: Arc::new(ToolRegistry::new()),
            client,
            endpoint,
        })
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    /// Handle for the reload task to swap the catalog.
    pub fn catalog_handle(&self) -> Arc<RwLock<Arc<WorkerCatalog>>> {
        self.catalog.clone()
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Invoke `worker_name` with `payload`.
    ///
    /// A `selector` naming a catalog entry runs that external worker; anything
    /// else is answered in-process under `worker_name`. The capacity check
    /// comes first, so a rejected call never starts a process.
    pub async fn call(
        &self,
        worker_name: &str,
        payload: Value,
        selector: Option<&str>,
    ) -> crate::Result<CallOutcome> {
        self.registry.check_capacity(self.settings.max_tools)?;

        let external = match selector {
            Some(name) => {
                let catalog = self.catalog.read().await.clone();
                catalog.get(name).cloned().map(|spec| (name, spec))
            }
            None => None,
        };

        match external {
            Some((name, spec)) => {
                tracing::info!(worker = %worker_name, server = %name, "dispatching to external worker");
                worker::call_external(
                    &self.registry,
                    &self.client,
                    &self.endpoint,
                    name,
                    &spec,
                    &payload,
                )
                .await
            }
            None => {
                if let Some(name) = selector {
                    tracing::debug!(server = %name, "selector not in catalog, handling internally");
                }
                worker::call_internal(&self.registry, worker_name, payload).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::WorkerKind;
    use serde_json::json;

    fn catalog() -> WorkerCatalog {
        WorkerCatalog::from_json(
            r#"{"mcpServers": {"ghost": {"command": "/nonexistent/cascade-worker", "args": []}}}"#,
        )
        .unwrap()
    }

    fn gateway(max_tools: usize) -> Gateway {
        let settings = GatewaySettings {
            max_tools,
            worker_addr: "127.0.0.1:1".to_string(),
            ..Default::default()
        };
        Gateway::new(settings, catalog()).unwrap()
    }

    #[tokio::test]
    async fn test_internal_when_no_selector() {
        let gw = gateway(50);
        let outcome = gw.call("main-mcp", json!({"a": 1}), None).await.unwrap();
        assert_eq!(outcome.server, "main-mcp");
        assert_eq!(outcome.result, json!({"mcp": "main-mcp", "payload": {"a": 1}}));
        assert!(gw.registry().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_selector_falls_back_to_internal() {
        let gw = gateway(50);
        let outcome = gw.call("w", json!({}), Some("nope")).await.unwrap();
        assert_eq!(outcome.server, "w");
    }

    #[tokio::test]
    async fn test_known_selector_goes_external() {
        let gw = gateway(50);
        let result = gw.call("w", json!({}), Some("ghost")).await;
        assert!(matches!(result, Err(CascadeError::WorkerSpawn(name, _)) if name == "ghost"));
        assert!(gw.registry().is_empty());
    }

    #[tokio::test]
    async fn test_capacity_rejects_before_spawn() {
        let gw = gateway(3);
        gw.registry().track("busy", WorkerKind::External, 3);
        let result = gw.call("w", json!({}), Some("ghost")).await;
        // The ghost command would fail with WorkerSpawn if it were attempted.
        assert!(matches!(result, Err(CascadeError::CapacityExceeded { max: 3 })));
        assert_eq!(gw.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_swap_is_visible() {
        let gw = gateway(50);
        let empty = WorkerCatalog::from_json(r#"{"mcpServers": {}}"#).unwrap();
        *gw.catalog_handle().write().await = Arc::new(empty);
        let outcome = gw.call("w", json!({}), Some("ghost")).await.unwrap();
        assert_eq!(outcome.server, "w");
    }
}

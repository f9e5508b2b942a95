//! Worker invocation: external subprocess relay or in-process echo.

pub mod external;
pub mod internal;

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::WorkerSpec;
use crate::error::CascadeError;
use crate::registry::{ToolRegistry, WorkerKind};

pub use external::{StderrBuffer, WorkerProcess};
pub use internal::call_internal;

/// Body of a successful `call_mcp` response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallOutcome {
    pub result: Value,
    pub server: String,
}

/// Where an external worker listens once started.
#[derive(Debug, Clone)]
pub struct WorkerEndpoint {
    pub base_url: String,
    /// Pause between spawn and the first request.
    pub startup_grace: Duration,
}

/// Run one call through a freshly spawned external worker.
///
/// The worker is tracked under `name` while it runs. Whatever the outcome,
/// the process is killed and reaped and the registry entry removed before
/// this returns.
pub async fn call_external(
    registry: &ToolRegistry,
    client: &reqwest::Client,
    endpoint: &WorkerEndpoint,
    name: &str,
    spec: &WorkerSpec,
    payload: &Value,
) -> crate::Result<CallOutcome> {
    let process = WorkerProcess::spawn(name, spec)?;

    let reply = async {
        if !endpoint.startup_grace.is_zero() {
            tokio::time::sleep(endpoint.startup_grace).await;
        }
        let tool_count = external::probe_tool_count(client, &endpoint.base_url, name).await;
        let _tracked = registry.track_scoped(name, WorkerKind::External, tool_count);
        external::relay_call(client, &endpoint.base_url, name, payload).await
    }
    .await;

    let reply = match reply {
        Err(CascadeError::WorkerRelay(worker, msg)) => {
            let tail = process.stderr_tail().await;
            let msg = if tail.is_empty() {
                msg
            } else {
                format!("{msg} (stderr: {tail})")
            };
            Err(CascadeError::WorkerRelay(worker, msg))
        }
        other => other,
    };
    process.shutdown().await;

    Ok(CallOutcome {
        result: reply?,
        server: name.to_string(),
    })
}

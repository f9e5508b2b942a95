//! In-process handling for workers without a catalog entry.

use serde_json::{json, Value};

use crate::exposure::{ExposureOptions, ItemsMcpServer};
use crate::items::ItemStore;
use crate::registry::{ToolRegistry, WorkerKind};
use crate::worker::CallOutcome;

/// Build a throwaway capability surface named `name`, count its tools while
/// it is tracked, and echo `payload` back.
pub async fn call_internal(
    registry: &ToolRegistry,
    name: &str,
    payload: Value,
) -> crate::Result<CallOutcome> {
    let server = ItemsMcpServer::new(name, ItemStore::new(), &ExposureOptions::default())?;
    let tool_count = server.tool_count().await;
    let _tracked = registry.track_scoped(name, WorkerKind::Internal, tool_count);
    tracing::info!(worker = %name, tool_count, "handled internal worker call");
    Ok(CallOutcome {
        result: json!({"mcp": name, "payload": payload}),
        server: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echoes_payload_and_leaves_no_entry() {
        let registry = ToolRegistry::new();
        let payload = json!({"tool": "get_item", "arguments": {"item_id": 1}});
        let outcome = call_internal(&registry, "main-mcp", payload.clone())
            .await
            .unwrap();
        assert_eq!(outcome.server, "main-mcp");
        assert_eq!(outcome.result["mcp"], "main-mcp");
        assert_eq!(outcome.result["payload"], payload);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_accepts_any_json_payload() {
        let registry = ToolRegistry::new();
        let outcome = call_internal(&registry, "w", json!([1, "two", null]))
            .await
            .unwrap();
        assert_eq!(outcome.result["payload"], json!([1, "two", null]));
    }
}

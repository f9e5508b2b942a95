//! ItemsMcpServer: rmcp ServerHandler that republishes item operations as tools.
//!
//! The tool list is derived from the declared operations in
//! [`crate::items::operations`], narrowed by an [`OperationFilter`]. Clones
//! share the tool list and the item store, so `StreamableHttpService` can hand
//! one clone to every session while `reconfigure` updates them all.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rmcp::handler::server::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{NotificationContext, Peer, RequestContext, RoleServer};
use rmcp::ErrorData as McpError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::error::CascadeError;
use crate::exposure::filter::OperationFilter;
use crate::items::operations::{self, Operation, OPERATIONS};
use crate::items::{Item, ItemStore, ListParams, SearchParams};

/// How the item operations are described and filtered.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ExposureOptions {
    #[serde(default, flatten)]
    pub filter: OperationFilter,
    /// Put the full response JSON schema into tool descriptions instead of an example.
    #[serde(default)]
    pub describe_full_response_schema: bool,
    /// Describe error responses too, not just the success response.
    #[serde(default)]
    pub describe_all_responses: bool,
}

#[derive(Clone)]
pub struct ItemsMcpServer {
    name: String,
    description: Option<String>,
    call_timeout: Option<Duration>,
    store: ItemStore,
    tools: Arc<RwLock<Vec<Tool>>>,
    /// Initialized session peers, told when the tool list changes.
    peers: Arc<tokio::sync::Mutex<Vec<Peer<RoleServer>>>>,
}

impl ItemsMcpServer {
    /// Build the tool surface for `store`. Fails on conflicting filter options.
    pub fn new(name: &str, store: ItemStore, options: &ExposureOptions) -> crate::Result<Self> {
        let tools = build_tools(options)?;
        tracing::debug!(server = %name, tool_count = tools.len(), "capability surface built");
        Ok(Self {
            name: name.to_string(),
            description: None,
            call_timeout: None,
            store,
            tools: Arc::new(RwLock::new(tools)),
            peers: Arc::new(tokio::sync::Mutex::new(Vec::new())),
        })
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Bound each tool invocation to `limit`.
    pub fn with_call_timeout(mut self, limit: Duration) -> Self {
        self.call_timeout = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Snapshot of the currently exposed tools.
    pub async fn tools(&self) -> Vec<Tool> {
        self.tools.read().await.clone()
    }

    pub async fn tool_count(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Re-register the tool list under new options. All clones see the change.
    pub async fn reconfigure(&self, options: &ExposureOptions) -> crate::Result<()> {
        let tools = build_tools(options)?;
        let count = tools.len();
        *self.tools.write().await = tools;
        tracing::info!(server = %self.name, tool_count = count, "tools re-registered");
        self.notify_peers().await;
        Ok(())
    }

    /// Send tools-list-changed to every peer, dropping the ones whose transport is gone.
    async fn notify_peers(&self) {
        let mut peers = self.peers.lock().await;
        let mut live = Vec::with_capacity(peers.len());
        for peer in peers.drain(..) {
            match peer.notify_tool_list_changed().await {
                Ok(()) => live.push(peer),
                Err(e) => tracing::debug!(error = %e, "pruning stale peer"),
            }
        }
        *peers = live;
    }

    async fn is_exposed(&self, name: &str) -> bool {
        self.tools.read().await.iter().any(|t| t.name == name)
    }

    /// Run an exposed tool under the configured call timeout.
    async fn invoke(
        &self,
        tool: &str,
        args: Map<String, Value>,
    ) -> Result<CallToolResult, McpError> {
        if !self.is_exposed(tool).await {
            return Err(McpError::invalid_params(
                format!("unknown tool '{tool}'"),
                None,
            ));
        }
        bounded_call(tool, self.call_timeout, self.dispatch(tool, args)).await
    }

    /// Run one operation against the store.
    async fn dispatch(&self, operation_id: &str, args: Map<String, Value>) -> crate::Result<Value> {
        let value = match operation_id {
            operations::LIST_ITEMS => {
                let params: ListParams = parse_args(args)?;
                to_json(self.store.list(&params).await)?
            }
            operations::GET_ITEM => {
                let ItemIdArgs { item_id } = parse_args(args)?;
                to_json(self.store.get(item_id).await?)?
            }
            operations::CREATE_ITEM => {
                let item: Item = parse_args(args)?;
                to_json(self.store.create(item).await)?
            }
            operations::UPDATE_ITEM => {
                let UpdateArgs { item_id, item } = parse_args(args)?;
                to_json(self.store.update(item_id, item).await?)?
            }
            operations::DELETE_ITEM => {
                let ItemIdArgs { item_id } = parse_args(args)?;
                self.store.delete(item_id).await?;
                serde_json::json!({"message": "Item deleted successfully"})
            }
            operations::SEARCH_ITEMS => {
                let params: SearchParams = parse_args(args)?;
                to_json(self.store.search(&params).await)?
            }
            other => {
                return Err(CascadeError::InvalidRequest(format!(
                    "no handler for operation '{other}'"
                )));
            }
        };
        Ok(value)
    }
}

#[derive(Deserialize)]
struct ItemIdArgs {
    item_id: i64,
}

#[derive(Deserialize)]
struct UpdateArgs {
    item_id: i64,
    item: Item,
}

fn parse_args<T: DeserializeOwned>(args: Map<String, Value>) -> crate::Result<T> {
    serde_json::from_value(Value::Object(args))
        .map_err(|e| CascadeError::InvalidRequest(e.to_string()))
}

fn to_json<T: serde::Serialize>(value: T) -> crate::Result<Value> {
    serde_json::to_value(value).map_err(|e| CascadeError::InvalidRequest(e.to_string()))
}

/// Await `call`, bounded by `limit`, and shape its outcome as a tool result.
///
/// Item-level failures (unknown id) come back as tool errors the model can
/// read; malformed arguments are protocol errors. An elapsed call is an
/// internal error.
async fn bounded_call<F>(
    tool: &str,
    limit: Option<Duration>,
    call: F,
) -> Result<CallToolResult, McpError>
where
    F: Future<Output = crate::Result<Value>>,
{
    let outcome = match limit {
        Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
            McpError::internal_error(format!("tool '{tool}' timed out after {limit:?}"), None)
        })?,
        None => call.await,
    };
    match outcome {
        Ok(value) => Ok(CallToolResult {
            content: vec![Content::json(value)?],
            is_error: Some(false),
            structured_content: None,
            meta: None,
        }),
        Err(CascadeError::InvalidRequest(msg)) => Err(McpError::invalid_params(msg, None)),
        Err(e) => Ok(CallToolResult {
            content: vec![Content::text(e.to_string())],
            is_error: Some(true),
            structured_content: None,
            meta: None,
        }),
    }
}

fn build_tools(options: &ExposureOptions) -> crate::Result<Vec<Tool>> {
    options.filter.validate()?;
    let selected = options.filter.select(OPERATIONS);
    Ok(OPERATIONS
        .iter()
        .filter(|op| selected.contains(op.id))
        .map(|op| operation_tool(op, options))
        .collect())
}

fn operation_tool(op: &Operation, options: &ExposureOptions) -> Tool {
    let input_schema = Arc::new((op.input_schema)().as_object().cloned().unwrap_or_default());
    Tool {
        name: op.id.into(),
        title: None,
        description: Some(describe(op, options).into()),
        input_schema,
        output_schema: None,
        annotations: None,
        icons: None,
        meta: None,
    }
}

fn describe(op: &Operation, options: &ExposureOptions) -> String {
    let mut desc = format!("{}\n\n### Responses:\n\n**200**: Successful Response", op.summary);
    let (label, body) = if options.describe_full_response_schema {
        ("Output Schema", (op.response_schema)())
    } else {
        ("Example Response", (op.response_example)())
    };
    let pretty = serde_json::to_string_pretty(&body).unwrap_or_default();
    desc.push_str(&format!("\n\n**{label}:**\n```json\n{pretty}\n```"));
    if options.describe_all_responses {
        if op.path.contains("{item_id}") {
            desc.push_str("\n\n**404**: Item not found");
        }
        desc.push_str("\n\n**422**: Validation Error");
    }
    desc
}

impl ServerHandler for ItemsMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: rmcp::model::Implementation {
                name: self.name.clone(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            instructions: Some(
                self.description
                    .clone()
                    .unwrap_or_else(|| "Item catalog operations exposed as MCP tools.".into()),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.tools().await,
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.invoke(&request.name, request.arguments.unwrap_or_default())
            .await
    }

    async fn on_initialized(&self, context: NotificationContext<RoleServer>) {
        tracing::debug!(server = %self.name, "MCP client initialized");
        self.peers.lock().await.push(context.peer.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmcp::model::ErrorCode;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_all_operations_exposed_by_default() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        assert_eq!(server.tool_count().await, OPERATIONS.len());
    }

    #[tokio::test]
    async fn test_get_info_uses_name() {
        let server = ItemsMcpServer::new("main-mcp", ItemStore::new(), &ExposureOptions::default())
            .unwrap()
            .with_description("Item API MCP");
        let info = server.get_info();
        assert_eq!(info.server_info.name, "main-mcp");
        assert_eq!(info.instructions.as_deref(), Some("Item API MCP"));
        assert!(info.capabilities.tools.is_some());
    }

    #[tokio::test]
    async fn test_conflicting_filter_rejected() {
        let options = ExposureOptions {
            filter: OperationFilter {
                include_tags: Some(vec!["items".into()]),
                exclude_tags: Some(vec!["search".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(ItemsMcpServer::new("x", ItemStore::new(), &options).is_err());
    }

    #[tokio::test]
    async fn test_reconfigure_shared_across_clones() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        let clone = server.clone();
        let narrowed = ExposureOptions {
            filter: OperationFilter {
                include_operations: Some(vec!["get_item".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        server.reconfigure(&narrowed).await.unwrap();
        let tools = clone.tools().await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name.as_ref(), "get_item");
    }

    #[test]
    fn test_description_example_vs_schema() {
        let op = operations::find(operations::GET_ITEM).unwrap();
        let example = describe(op, &ExposureOptions::default());
        assert!(example.contains("**Example Response:**"));
        assert!(!example.contains("**404**"));

        let full = describe(
            op,
            &ExposureOptions {
                describe_full_response_schema: true,
                describe_all_responses: true,
                ..Default::default()
            },
        );
        assert!(full.contains("**Output Schema:**"));
        assert!(full.contains("**404**: Item not found"));
    }

    #[tokio::test]
    async fn test_dispatch_get_and_missing() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        let value = server
            .dispatch(operations::GET_ITEM, args(json!({"item_id": 5})))
            .await
            .unwrap();
        assert_eq!(value["name"], "Drill");

        let missing = server
            .dispatch(operations::GET_ITEM, args(json!({"item_id": 500})))
            .await;
        assert!(matches!(missing, Err(CascadeError::ItemNotFound(500))));
    }

    #[tokio::test]
    async fn test_dispatch_update_and_search() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        server
            .dispatch(
                operations::UPDATE_ITEM,
                args(json!({
                    "item_id": 1,
                    "item": {"id": 1, "name": "Mallet", "price": 11.0, "tags": ["tool", "rubber"]}
                })),
            )
            .await
            .unwrap();
        let found = server
            .dispatch(operations::SEARCH_ITEMS, args(json!({"tags": ["rubber"]})))
            .await
            .unwrap();
        assert_eq!(found.as_array().unwrap().len(), 1);
        assert_eq!(found[0]["name"], "Mallet");
    }

    #[tokio::test]
    async fn test_dispatch_bad_arguments() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        let result = server
            .dispatch(operations::DELETE_ITEM, args(json!({"item_id": "one"})))
            .await;
        assert!(matches!(result, Err(CascadeError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_invoke_missing_item_is_tool_error() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        let found = server
            .invoke(operations::GET_ITEM, args(json!({"item_id": 2})))
            .await
            .unwrap();
        assert_eq!(found.is_error, Some(false));

        let missing = server
            .invoke(operations::GET_ITEM, args(json!({"item_id": 500})))
            .await
            .unwrap();
        assert_eq!(missing.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_invoke_unexposed_tool_is_invalid_params() {
        let options = ExposureOptions {
            filter: OperationFilter {
                include_operations: Some(vec!["get_item".into()]),
                ..Default::default()
            },
            ..Default::default()
        };
        let server = ItemsMcpServer::new("items", ItemStore::seeded(), &options).unwrap();
        let err = server
            .invoke(operations::DELETE_ITEM, args(json!({"item_id": 1})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        // The hidden operation must not have run.
        assert!(server.store.get(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_invoke_bad_arguments_is_invalid_params() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default()).unwrap();
        let err = server
            .invoke(operations::GET_ITEM, args(json!({"item_id": "five"})))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_call_timeout_is_internal_error() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(json!({}))
        };
        let err = bounded_call("list_items", Some(Duration::from_millis(20)), slow)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert!(err.message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_call_within_timeout_succeeds() {
        let server =
            ItemsMcpServer::new("items", ItemStore::seeded(), &ExposureOptions::default())
                .unwrap()
                .with_call_timeout(Duration::from_secs(5));
        let result = server
            .invoke(operations::LIST_ITEMS, args(json!({"limit": 2})))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(false));
        assert_eq!(result.content.len(), 1);
    }
}

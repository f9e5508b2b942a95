//! Cascade: dynamic MCP gateway.
//! Invokes MCP workers on demand under a ceiling on the total tool count,
//! spawning external workers per call and tearing them down afterwards, and
//! republishes an item catalog REST resource as MCP tools.

pub mod auth;
pub mod config;
pub mod error;
pub mod exposure;
pub mod gateway;
pub mod items;
pub mod probe;
pub mod registry;
pub mod reload;
pub mod worker;

pub use auth::TokenStore;
pub use config::{parse_env_ref, resolve_env_vars, GatewaySettings, WorkerCatalog, WorkerSpec};
pub use error::{CascadeError, Result};
pub use exposure::{ExposureOptions, ItemsMcpServer, OperationFilter};
pub use gateway::Gateway;
pub use items::{Item, ItemStore};
pub use probe::fetch_tool_count;
pub use registry::{ToolRegistry, WorkerKind};
pub use reload::run_catalog_reload;
pub use worker::CallOutcome;

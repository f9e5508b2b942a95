//! Cascade: dynamic MCP gateway and item catalog demo.
//!
//! Subcommands:
//! - `cascade serve`: the `call_mcp` gateway with its own MCP endpoint
//! - `cascade items`: item catalog REST API with its operations mounted as MCP tools
//! - `cascade stdio`: the item catalog tools over STDIO
//! - `cascade probe`: report how many tools a running MCP server exposes

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use clap::{Args, Parser, Subcommand};
use mcp_cascade::auth::private_router;
use mcp_cascade::{
    exposure, fetch_tool_count, gateway, items, run_catalog_reload, ExposureOptions, Gateway,
    GatewaySettings, ItemStore, ItemsMcpServer, OperationFilter, TokenStore, WorkerCatalog,
};
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Cascade: dynamic MCP gateway.
#[derive(Parser)]
#[command(name = "cascade", version, about = "Cascade: dynamic MCP gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the call_mcp gateway
    Serve {
        /// Path to cascade.toml [default: ./cascade.toml or ~/.config/cascade/cascade.toml]
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bind address (overrides the settings file)
        #[arg(long)]
        host: Option<String>,
        /// HTTP port (overrides the settings file)
        #[arg(short, long)]
        port: Option<u16>,
        /// mcpServers JSON catalog (overrides the settings file)
        #[arg(long)]
        worker_config: Option<PathBuf>,
        /// Ceiling on the total tool count of tracked workers
        #[arg(long)]
        max_tools: Option<usize>,
        /// Do not watch the worker catalog for changes
        #[arg(long)]
        no_watch: bool,
    },
    /// Serve the item catalog REST API and its MCP tools
    Items {
        /// Bind address
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// HTTP port
        #[arg(short, long, default_value = "8000")]
        port: u16,
        /// Path the MCP endpoint is mounted at
        #[arg(long, default_value = "/mcp")]
        mount_path: String,
        /// Serve only the MCP endpoint, not the REST routes
        #[arg(long)]
        mcp_only: bool,
        /// Require a bearer token on the MCP endpoint (tokens from CASCADE_AUTH_TOKENS)
        #[arg(long)]
        require_auth: bool,
        #[command(flatten)]
        exposure: ExposureArgs,
    },
    /// Serve the item catalog tools over STDIO
    Stdio {
        #[command(flatten)]
        exposure: ExposureArgs,
    },
    /// Print the tool count of a running MCP server
    Probe {
        /// MCP base URL, e.g. http://127.0.0.1:8000/mcp
        #[arg(long)]
        url: String,
        /// Request timeout in seconds
        #[arg(long, default_value = "5")]
        timeout: u64,
    },
}

/// Which item operations become tools, and how they are described.
#[derive(Args)]
struct ExposureArgs {
    /// Only expose these operation ids (comma-separated)
    #[arg(long, value_delimiter = ',')]
    include_operations: Option<Vec<String>>,
    /// Expose everything except these operation ids
    #[arg(long, value_delimiter = ',')]
    exclude_operations: Option<Vec<String>>,
    /// Only expose operations carrying these tags
    #[arg(long, value_delimiter = ',')]
    include_tags: Option<Vec<String>>,
    /// Expose everything except operations carrying these tags
    #[arg(long, value_delimiter = ',')]
    exclude_tags: Option<Vec<String>>,
    /// Describe responses with their full JSON schema instead of an example
    #[arg(long)]
    describe_full_response_schema: bool,
    /// Also describe error responses
    #[arg(long)]
    describe_all_responses: bool,
    /// Per-call timeout for tool invocations, in seconds
    #[arg(long)]
    timeout: Option<u64>,
}

impl ExposureArgs {
    fn options(&self) -> ExposureOptions {
        ExposureOptions {
            filter: OperationFilter {
                include_operations: self.include_operations.clone(),
                exclude_operations: self.exclude_operations.clone(),
                include_tags: self.include_tags.clone(),
                exclude_tags: self.exclude_tags.clone(),
            },
            describe_full_response_schema: self.describe_full_response_schema,
            describe_all_responses: self.describe_all_responses,
        }
    }

    fn build_server(&self, name: &str, store: ItemStore) -> Result<ItemsMcpServer> {
        let mut server = ItemsMcpServer::new(name, store, &self.options())
            .map_err(|e| anyhow::anyhow!("Invalid exposure options: {}", e))?
            .with_description("Item catalog operations exposed as MCP tools.");
        if let Some(secs) = self.timeout {
            server = server.with_call_timeout(Duration::from_secs(secs));
        }
        Ok(server)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for the STDIO transport
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancellationToken::new();

    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down Cascade...");
        cancel_for_signal.cancel();
    });

    match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            worker_config,
            max_tools,
            no_watch,
        } => {
            let mut settings = load_settings(config)?;
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(path) = worker_config {
                settings.worker_config = path;
            }
            if let Some(max) = max_tools {
                settings.max_tools = max;
            }
            run_serve(settings, !no_watch, cancel).await?;
        }
        Commands::Items {
            host,
            port,
            mount_path,
            mcp_only,
            require_auth,
            exposure,
        } => {
            let auth = require_auth.then(|| Arc::new(TokenStore::from_env()));
            let store = ItemStore::seeded();
            let server = exposure.build_server("items", store.clone())?;
            let rest = (!mcp_only).then_some(store);
            run_items(server, rest, &host, port, &mount_path, auth, cancel).await?;
        }
        Commands::Stdio { exposure } => {
            let server = exposure.build_server("items", ItemStore::seeded())?;
            run_stdio(server, cancel).await?;
        }
        Commands::Probe { url, timeout } => {
            let count = fetch_tool_count(&url, Duration::from_secs(timeout))
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            println!("{count}");
        }
    }

    Ok(())
}

/// Run the gateway: load the worker catalog, start the reload watcher, serve HTTP.
async fn run_serve(settings: GatewaySettings, watch: bool, cancel: CancellationToken) -> Result<()> {
    let catalog_path = settings.worker_config.clone();
    let catalog = WorkerCatalog::load(&catalog_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load worker catalog: {}", e))?;
    let addr = format!("{}:{}", settings.host, settings.port);

    let gateway = Arc::new(
        Gateway::new(settings, catalog).map_err(|e| anyhow::anyhow!("Invalid settings: {}", e))?,
    );

    if watch {
        tokio::spawn(run_catalog_reload(
            catalog_path,
            gateway.catalog_handle(),
            cancel.child_token(),
        ));
    }

    let app = gateway::router(gateway, cancel.clone())
        .map_err(|e| anyhow::anyhow!("Failed to build gateway router: {}", e))?;
    serve_http(app, &addr, cancel).await
}

/// Serve the MCP endpoint at `mount_path`, plus the REST routes over `rest` when given.
async fn run_items(
    server: ItemsMcpServer,
    rest: Option<ItemStore>,
    host: &str,
    port: u16,
    mount_path: &str,
    auth: Option<Arc<TokenStore>>,
    cancel: CancellationToken,
) -> Result<()> {
    if !mount_path.starts_with('/') {
        anyhow::bail!("--mount-path must start with '/', got '{}'", mount_path);
    }
    let mut app = Router::new();
    if let Some(store) = rest {
        app = app.merge(items::http::router(store));
    }
    if let Some(store) = &auth {
        app = app.merge(private_router(store.clone()));
    }
    let app = exposure::mount(app, mount_path, server, auth, cancel.clone());

    let addr = format!("{}:{}", host, port);
    tracing::info!("Connect your MCP client to http://{}{}", addr, mount_path);
    serve_http(app, &addr, cancel).await
}

async fn serve_http(app: Router, addr: &str, cancel: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", addr, e))?;
    tracing::info!(addr = %addr, "Cascade HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| anyhow::anyhow!("Cascade HTTP server error: {}", e))?;

    tracing::info!("Cascade HTTP server stopped");
    Ok(())
}

/// Serve the item tools over stdin/stdout.
async fn run_stdio(server: ItemsMcpServer, cancel: CancellationToken) -> Result<()> {
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let running = server
        .serve_with_ct(transport, cancel.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize stdio transport: {:?}", e))?;

    tracing::info!("Cascade stdio transport initialized, waiting for messages");

    tokio::select! {
        result = running.waiting() => {
            match result {
                Ok(reason) => tracing::info!(?reason, "stdio transport completed"),
                Err(e) => {
                    tracing::error!(error = %e, "stdio transport error");
                    return Err(anyhow::anyhow!("stdio transport error: {}", e));
                }
            }
        }
        _ = cancel.cancelled() => {
            tracing::info!("stdio transport cancelled");
        }
    }

    Ok(())
}

/// Settings from an explicit path, ./cascade.toml, ~/.config/cascade/cascade.toml,
/// or built-in defaults, in that order.
fn load_settings(explicit: Option<PathBuf>) -> Result<GatewaySettings> {
    let path = match explicit {
        Some(path) => Some(path),
        None => find_settings_file(),
    };
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading settings");
            GatewaySettings::load(&path).map_err(|e| anyhow::anyhow!("{}", e))
        }
        None => {
            tracing::info!("no cascade.toml found, using defaults");
            Ok(GatewaySettings::default())
        }
    }
}

fn find_settings_file() -> Option<PathBuf> {
    let local = Path::new("cascade.toml");
    if local.exists() {
        return Some(local.to_path_buf());
    }
    dirs::config_dir()
        .map(|dir| dir.join("cascade").join("cascade.toml"))
        .filter(|p| p.exists())
}

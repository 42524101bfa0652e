//! Server initialization utilities
//!
//! Tracing setup and the `serve_stdio!` macro shared by the MCP servers.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format for log lines, selected by `LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `json` (any case) selects JSON; anything else, or unset, is text
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.trim().eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Initialize tracing for an MCP server
///
/// Logs go to stderr because stdout carries the MCP protocol. `RUST_LOG`
/// filters as usual, with `<crate_name>=info` added as the default for the
/// server's own crate.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::from_default_env().add_directive(format!("{}=info", crate_name).parse()?);
    let format = LogFormat::from_env_value(std::env::var("LOG_FORMAT").ok().as_deref());

    let layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(layer.json()).try_init()?,
        LogFormat::Text => registry.with(layer.with_ansi(false)).try_init()?,
    }

    Ok(())
}

/// Generate `main` for a stdio MCP server
///
/// The server type must provide `fn try_new() -> anyhow::Result<Self>`.
/// Construction errors (missing configuration and the like) end the process
/// with an error before the transport starts.
///
/// ```rust,ignore
/// mcp_common::serve_stdio!(PgQueryMcpServer, "pg_query_mcp");
/// ```
#[macro_export]
macro_rules! serve_stdio {
    ($server_type:ty, $crate_name:expr) => {
        #[tokio::main]
        async fn main() -> anyhow::Result<()> {
            use rmcp::ServiceExt;

            $crate::init_tracing($crate_name)?;

            tracing::info!(concat!("Starting ", $crate_name, " MCP Server"));

            let server = <$server_type>::try_new().map_err(|e| {
                tracing::error!("Failed to start: {:#}", e);
                e
            })?;
            let service = server.serve(rmcp::transport::stdio()).await?;

            tracing::info!("Server running, waiting for requests...");

            service.waiting().await?;

            tracing::info!("Server shutting down");
            Ok(())
        }
    };
}

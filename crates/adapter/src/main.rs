//! `openapi-mcp`: list and invoke the tools generated from `OpenAPI` documents.

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use openapi_mcp_adapter::{Overrides, ToolCatalog, plan, result_text};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "openapi-mcp", version, about = "Expose OpenAPI operations as MCP tools")]
struct Cli {
    /// `OpenAPI` document (file path or URL).
    #[arg(long, env = "OPENAPI_MCP_SPEC", global = true)]
    spec: Option<String>,

    /// Directory of `.yaml` / `.yml` documents, used when no spec or config is given.
    #[arg(long, env = "OPENAPI_MCP_DIR", default_value = "./openapi", global = true)]
    openapi_dir: PathBuf,

    /// Source config file (YAML or JSON).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Override the base URL derived from the document.
    #[arg(long, env = "OPENAPI_MCP_BASE_URL", global = true)]
    base_url: Option<String>,

    /// Per-request timeout in milliseconds.
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Send requests even when a required API key is missing.
    #[arg(long, global = true)]
    no_strict_security: bool,

    /// Log filter (falls back to `RUST_LOG`, then `info`).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the generated tools as JSON.
    List,
    /// Invoke one tool and print its text result.
    Call {
        tool: String,
        /// Arguments as a JSON object.
        #[arg(default_value = "{}")]
        arguments: String,
    },
}

fn init_tracing(level: Option<&str>, format: LogFormat) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref(), cli.log_format);

    let overrides = Overrides {
        spec: cli.spec.clone(),
        base_url: cli.base_url.clone(),
        timeout_ms: cli.timeout_ms,
        lenient_security: cli.no_strict_security,
    };
    let plan = plan(cli.config.as_deref(), &cli.openapi_dir, &overrides)
        .context("resolve tool sources")?;
    let catalog = ToolCatalog::load(&plan).await.context("load tools")?;

    match cli.command {
        Command::List => {
            let out = serde_json::to_string_pretty(catalog.listings())
                .context("serialize tool list")?;
            println!("{out}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Call { tool, arguments } => {
            let arguments: Value =
                serde_json::from_str(&arguments).context("parse tool arguments as JSON")?;
            let result = catalog.call(&tool, arguments).await?;
            println!("{}", result_text(&result));
            if result.is_error == Some(true) {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

use mcp_langbase_mindmap::{
    cli::{execute_fallback, execute_generate, Cli, CliResult, Commands},
    config::{Config, LogFormat},
    langbase::LangbaseClient,
    server::{AppState, McpServer},
    storage::SqliteStorage,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Offline: no API key, database or logging needed.
    if let Some(Commands::Fallback {
        input,
        color_scheme,
    }) = &cli.command
    {
        finish(execute_fallback(input, color_scheme.as_deref()));
    }

    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("{}", e);
        std::process::exit(1)
    });
    init_logging(&config);
    info!(version = env!("CARGO_PKG_VERSION"), "mcp-langbase-mindmap starting");

    let state = match startup(config).await {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("Startup failed: {:#}", e);
            return Err(e);
        }
    };

    match cli.command {
        Some(Commands::Generate {
            input,
            color_scheme,
            session_id,
        }) => finish(execute_generate(&state, input, color_scheme, session_id).await),
        _ => {
            McpServer::new(state).run().await.context("stdio server failed")?;
            info!("Server stopped");
            Ok(())
        }
    }
}

/// Storage and Langbase client are required; pipe setup is best-effort.
async fn startup(config: Config) -> anyhow::Result<AppState> {
    let storage = SqliteStorage::new(&config.database)
        .await
        .with_context(|| format!("opening database {}", config.database.path.display()))?;

    let langbase = LangbaseClient::new(&config.langbase, config.request.clone())
        .context("building Langbase client")?;

    Ok(AppState::connect(config, storage, langbase).await)
}

/// Print a one-shot command's output and exit with its code.
fn finish(result: CliResult) -> ! {
    if result.exit_code == 0 {
        println!("{}", result.message);
    } else {
        eprintln!("{}", result.message);
    }
    std::process::exit(result.exit_code);
}

/// Logs go to stderr; stdout carries the protocol.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let output = match config.logging.format {
        LogFormat::Json => fmt::layer().json().with_writer(std::io::stderr).boxed(),
        LogFormat::Pretty => fmt::layer().with_writer(std::io::stderr).boxed(),
    };

    tracing_subscriber::registry().with(filter).with(output).init();
}

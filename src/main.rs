//! querygate - validates and runs a single query from the command line.

mod cli;

use anyhow::Context;
use cli::Cli;
use querygate::config::{Config, ConnectionConfig};
use querygate::connection::ConnectionRegistry;
use querygate::error::{EngineError, Result};
use querygate::{logging, Operation, QueryExecutor};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    match cli.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }

    match run(cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether the command succeeded.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_overrides();

    let engine = cli.apply_engine_overrides(config.engine.clone());
    engine.validate()?;
    let executor = QueryExecutor::new(engine);

    if cli.assess {
        let sql = cli.query_text().context("--assess needs a query")?;
        print_json(&executor.assess(sql))?;
        return Ok(true);
    }

    let connection = resolve_connection(&cli, &config)?
        .context("No database connection configured. Use --help for usage information.")?;
    let connection = cli.apply_connection_overrides(connection);
    info!("Connection: {}", connection.display_string());

    let registry = ConnectionRegistry::new(config.pool.clone());
    let name = cli.connection_name().unwrap_or("default");
    let outcome = run_against(&cli, &executor, &registry, name, &connection).await;
    registry.close_all().await;
    outcome
}

async fn run_against(
    cli: &Cli,
    executor: &QueryExecutor,
    registry: &ConnectionRegistry,
    name: &str,
    connection: &ConnectionConfig,
) -> anyhow::Result<bool> {
    if cli.test_connection {
        let report = match registry.provision(name, connection).await {
            Ok(handle) => json!({
                "connected": true,
                "backend": handle.backend(),
                "descriptor": handle.descriptor(),
            }),
            Err(e) => json!({
                "connected": false,
                "error": e.to_string(),
                "error_kind": e.kind(),
            }),
        };
        let connected = report["connected"] == json!(true);
        print_json(&report)?;
        return Ok(connected);
    }

    let text = cli
        .query_text()
        .context("No query given. Pass it after the connection string")?;
    let operation = if cli.mutate {
        Operation::mutating(text)
    } else {
        Operation::read_only(text)
    };

    let handle = registry.provision(name, connection).await?;
    let result = executor.execute(&handle, &operation).await;
    if let Some(warning) = result.truncation_warning() {
        warn!("{}", warning);
    }
    print_json(&result)?;
    Ok(result.is_success())
}

/// Resolves the connection with precedence: CLI connection string, then the
/// named connection, then the config's `default` entry.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    if let Some(connection) = cli.to_connection_config()? {
        return Ok(Some(connection));
    }

    if let Some(name) = cli.connection_name() {
        return match config.get_connection(Some(name)) {
            Some(connection) => Ok(Some(connection.clone())),
            None => Err(EngineError::config(format!(
                "Connection '{}' not found in config file",
                name
            ))),
        };
    }

    Ok(config.get_connection(None).cloned())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{rendered}");
    Ok(())
}

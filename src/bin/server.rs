//! `nl2sql` Server Binary
//!
//! Starts the nl2sql translation server.
//!
//! ## Usage
//!
//! ```bash
//! # Start server with default settings
//! cargo run --bin nl2sql-server
//!
//! # Start with a config file and a custom bind address
//! cargo run --bin nl2sql-server -- --config nl2sql.toml --host 0.0.0.0 --port 8000
//! ```
//!
//! ## HTTP Server
//!
//! The HTTP server provides:
//! - Translation endpoints at `/ask` and `/ask-with-schema`
//! - Schema administration at `/schema/{db_id}`
//! - OpenAPI document at `/api-docs/openapi.json`

use nl2sql::config::LoggingConfig;
use nl2sql::rest;
use nl2sql::Config;
use nl2sql::Handler;

use std::env;
use std::sync::Arc;
use std::sync::OnceLock;

static TRACE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    println!("nl2sql Server");
    println!("=============");
    println!();

    // Load configuration
    let mut config = match get_arg(&args, "--config") {
        Some(path) => Config::from_file(&path).map_err(|e| {
            eprintln!("ERROR: Failed to read config '{path}': {e}");
            Box::<dyn std::error::Error + Send + Sync>::from(e)
        })?,
        None => Config::load().unwrap_or_else(|_| {
            println!("Using default configuration");
            Config::default()
        }),
    };

    // Initialize tracing using config as fallback when env vars are not set
    init_tracing(&config.logging);

    // Override HTTP config from command line
    if let Some(host) = get_arg(&args, "--host") {
        config.http.host = host;
    }
    if let Some(port) = get_arg(&args, "--port").and_then(|p| p.parse().ok()) {
        config.http.port = port;
    }

    let http_config = config.http.clone();
    let db_root = config.storage.db_root.clone();
    let endpoint = config.generation.endpoint.clone();

    // Create handler
    let handler = Arc::new(Handler::from_config(config).map_err(|e| {
        eprintln!("ERROR: Failed to initialize nl2sql: {e}");
        Box::<dyn std::error::Error + Send + Sync>::from(e.clone())
    })?);

    println!("Database root:      {}", db_root.display());
    println!("Generation backend: {endpoint}");
    println!();

    // Start HTTP server
    rest::start_http_server(handler, &http_config).await?;

    Ok(())
}

fn init_tracing(logging_config: &LoggingConfig) {
    // Environment variables take precedence over config file values
    let json = env::var("NL2SQL_TRACE_JSON")
        .ok()
        .map_or_else(|| logging_config.format == "json", |v| v != "0");

    let level = env::var("NL2SQL_TRACE_LEVEL")
        .ok()
        .unwrap_or_else(|| logging_config.level.clone());

    // Log to the file named by NL2SQL_TRACE_FILE, or to stderr
    let writer: Box<dyn std::io::Write + Send> = match env::var("NL2SQL_TRACE_FILE") {
        Ok(log_path) => match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
        {
            Ok(f) => Box::new(f),
            Err(e) => {
                eprintln!("ERROR: Unable to open NL2SQL_TRACE_FILE '{log_path}': {e}");
                Box::new(std::io::stderr())
            }
        },
        Err(_) => Box::new(std::io::stderr()),
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(writer);
    let _ = TRACE_GUARD.set(guard);

    let filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let base = || {
        tracing_subscriber::fmt()
            .with_env_filter(filter.clone())
            .with_ansi(false)
            .with_thread_names(true)
            .with_thread_ids(true)
            .with_writer(non_blocking.clone())
            .with_timer(tracing_subscriber::fmt::time::SystemTime)
    };

    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if json {
        Box::new(base().json().finish())
    } else {
        Box::new(base().compact().finish())
    };

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn get_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1).cloned())
}

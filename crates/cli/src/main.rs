mod config;
mod inspect;
mod loader;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::config::ServerConfig;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Activation record query server.
#[derive(Parser)]
#[command(name = "actlog", version, about = "Activation record query server")]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the activation query HTTP server
    Serve {
        /// Path to a TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Port to listen on (overrides config and ACTLOG_PORT)
        #[arg(long)]
        port: Option<u16>,
        /// Additional JSON-lines activation files to load
        #[arg(long = "records")]
        records: Vec<PathBuf>,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Summarize a JSON-lines activation file
    Inspect {
        /// Path to the JSON-lines file
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            report_error(&format!("failed to create tokio runtime: {e}"), cli.output, cli.quiet);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve {
            config,
            port,
            records,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            let config = match load_config(config, port, records) {
                Ok(config) => config,
                Err(err) => {
                    eprintln!("STARTUP_ERROR {err}");
                    process::exit(1);
                }
            };
            if let Err(e) = runtime.block_on(serve::start_server(config, tls_cert, tls_key)) {
                eprintln!("Server error: {e}");
                process::exit(1);
            }
        }
        Commands::Inspect { file } => {
            let code = runtime.block_on(inspect::cmd_inspect(&file, cli.output, cli.quiet));
            process::exit(code);
        }
    }
}

/// Config file, then `ACTLOG_*` environment, then flags.
fn load_config(
    path: Option<PathBuf>,
    port: Option<u16>,
    records: Vec<PathBuf>,
) -> Result<ServerConfig, config::StartupError> {
    let mut config = match path {
        Some(path) => ServerConfig::from_file(&path)?,
        None => ServerConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(port) = port {
        config.port = port;
    }
    config.records.extend(records);
    config.validate()?;
    Ok(config)
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => {
            eprintln!("{}", serde_json::json!({ "error": msg }));
        }
    }
}

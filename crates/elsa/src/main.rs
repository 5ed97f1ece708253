mod cli;

use std::io::IsTerminal;
use std::process::ExitCode;

use clap::Parser;
use elsa_core::config::AppConfig;
use elsa_core::kernel::constants::{EXIT_STARTUP_FAILURE, EXIT_SUCCESS};
use elsa_core::net::{listener_definition, probe_definition};
use elsa_core::{Application, ComponentCatalog, KernelError};
use log::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::CliArgs;

/// Install the tracing subscriber and route `log` records into it.
///
/// `RUST_LOG` wins over the configured level, which wins over `info`.
fn init_logging(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(config.log_level.as_deref().unwrap_or("info"))
    })?;
    tracing_log::LogTracer::init()?;
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Component definitions shipped with the binary.
fn default_catalog(config: &AppConfig) -> Result<ComponentCatalog, KernelError> {
    let mut catalog = ComponentCatalog::new();
    if let Some(listener) = &config.listener {
        catalog.register(probe_definition())?;
        catalog.register(listener_definition(listener.clone()))?;
    }
    Ok(catalog)
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    if args.ping {
        println!("pong");
        return exit_code(EXIT_SUCCESS);
    }

    let config = match &args.config {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration: {}", e);
                return exit_code(EXIT_STARTUP_FAILURE);
            }
        },
        None => AppConfig::default(),
    };

    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {}", e);
        return exit_code(EXIT_STARTUP_FAILURE);
    }

    let catalog = match default_catalog(&config) {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to build component catalog: {}", e);
            return exit_code(EXIT_STARTUP_FAILURE);
        }
    };
    let app = Application::new(config, catalog);

    if args.dry_run {
        return match app.dry_run() {
            Ok(order) => {
                println!("Instantiation plan for '{}':", app.config().namespace);
                if order.is_empty() {
                    println!("  (no components)");
                }
                for (position, id) in order.iter().enumerate() {
                    println!("  {}. {}", position + 1, id);
                }
                exit_code(EXIT_SUCCESS)
            }
            Err(e) => {
                eprintln!("Component wiring failed: {}", e);
                exit_code(EXIT_STARTUP_FAILURE)
            }
        };
    }

    match app.run(args.args).await {
        Ok(outcome) => {
            info!(
                "Application stopped ({}), released {} component(s)",
                outcome.reason,
                outcome.report.released.len()
            );
            exit_code(outcome.exit_code())
        }
        Err(e) => {
            error!("Application failed to start: {}", e);
            eprintln!("Application failed to start: {}", e);
            exit_code(EXIT_STARTUP_FAILURE)
        }
    }
}

use std::process::ExitCode;

use clap::Parser;

use tpclash::cli::Cli;
use tpclash::engine::PrivilegeDescriptor;
use tpclash::lifecycle::SignalListener;
use tpclash::observability::logging;
use tpclash::proxy_mode::HookProxyMode;
use tpclash::{Shutdown, Supervisor};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("tpclash: {e}");
            return ExitCode::from(2);
        }
    };

    logging::init(config.debug);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "tpclash starting");

    // Handlers go in before anything else so an early signal still shuts down cleanly.
    let signals = match SignalListener::install() {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };
    let shutdown = Shutdown::new();
    signals.spawn(shutdown.clone());

    let proxy_mode = HookProxyMode::from_config(&config);
    let supervisor = Supervisor::new(config, proxy_mode, PrivilegeDescriptor::engine());

    match supervisor.run(shutdown).await {
        Ok(report) => {
            if !report.is_clean() {
                tracing::warn!(
                    disable_error = ?report.disable_error,
                    terminate_error = ?report.terminate_error,
                    "Shutdown finished with errors"
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = e.as_label(), error = %e, "tpclash failed");
            ExitCode::FAILURE
        }
    }
}

use activity_agent::config::AgentConfig;
use activity_agent::{sleep_while_running, Agent};
use clap::Parser;
use log::{error, info};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn main() -> ExitCode {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let config = AgentConfig::parse();
    info!("Activity agent starting up...");

    let agent = match Agent::start(&config) {
        Ok(agent) => agent,
        Err(e) => {
            error!("Failed to start activity agent: {e}");
            return ExitCode::FAILURE;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    if let Err(e) = ctrlc::set_handler({
        let running = Arc::clone(&running);
        move || running.store(false, Ordering::SeqCst)
    }) {
        error!("Failed to set Ctrl+C handler: {e}");
        return ExitCode::FAILURE;
    }

    let mode = if agent.is_online() { "online" } else { "offline" };
    while running.load(Ordering::SeqCst) {
        match agent.status() {
            Ok(status) => info!(
                "Status ({mode}): {} records, {} unsynced, store {}",
                status.total_records, status.unsynced_records, status.store_path
            ),
            Err(e) => error!("Failed to read status: {e}"),
        }
        sleep_while_running(&running, config.status_interval());
    }

    match agent.shutdown() {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to read final status: {e}");
            ExitCode::FAILURE
        }
    }
}

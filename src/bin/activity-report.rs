//! Read-only summary of the local activity store.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    reason = "the report is the program's output"
)]

use activity_agent::config::default_db_path;
use activity_agent::db::SampleStore;
use activity_agent::error::StoreError;
use activity_agent::models::Sample;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

const RECENT_LIMIT: usize = 10;
const TOP_LIMIT: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "activity-report", version, about = "Summarize the local activity store")]
struct Args {
    /// Store file (defaults to ~/activity.db)
    #[arg(long, env = "ACTIVITY_DB_PATH")]
    db_path: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let args = Args::parse();
    let path = match args.db_path.map_or_else(default_db_path, Ok) {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Cannot locate the activity store: {e}");
            return ExitCode::FAILURE;
        }
    };

    if !path.exists() {
        println!("No activity data yet ({} does not exist).", path.display());
        println!("Start activity-agent to begin collecting samples.");
        return ExitCode::SUCCESS;
    }

    match report(&path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Failed to read {}: {e}", path.display());
            ExitCode::FAILURE
        }
    }
}

fn report(path: &std::path::Path) -> Result<(), StoreError> {
    let store = SampleStore::open_read_only(path)?;
    let status = store.status()?;

    println!("Activity store: {}", status.store_path);
    println!("Total records:    {}", status.total_records);
    println!("Unsynced records: {}", status.unsynced_records);

    let recent = store.recent(RECENT_LIMIT)?;
    println!();
    println!("Recent activity ({} samples):", recent.len());
    for sample in &recent {
        println!("{}", describe(sample));
    }

    let top = store.top_processes(TOP_LIMIT)?;
    if !top.is_empty() {
        println!();
        println!("Top processes:");
        for (rank, (name, count)) in top.iter().enumerate() {
            println!("{:>2}. {name} ({count} samples)", rank + 1);
        }
    }
    Ok(())
}

fn describe(sample: &Sample) -> String {
    let subject = match &sample.browser_url {
        Some(url) => match &sample.browser_tab_title {
            Some(title) => format!("{url} \"{title}\""),
            None => url.clone(),
        },
        None => format!("\"{}\"", sample.window_title),
    };
    format!(
        "  [{}] {} {subject} | input {} | {} | cpu {:.1}% mem {:.1}% | {}",
        sample.timestamp,
        sample.process_name,
        sample.input_events,
        if sample.is_user_active { "active" } else { "idle" },
        sample.cpu_usage,
        sample.memory_usage,
        if sample.synced { "synced" } else { "pending" },
    )
}

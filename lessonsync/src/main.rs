//! `lessonsync` -- inspect and maintain a framework lesson change log.
//!
//! # Usage
//!
//! ```bash
//! # List the records of the default change log
//! cargo run --bin lessonsync -- records
//!
//! # Print one record of a specific log
//! cargo run --bin lessonsync -- --store ./storage show '#3'
//!
//! # Drop superseded frames
//! LESSONSYNC_STORE=./storage cargo run --bin lessonsync -- compact
//! ```

use clap::Parser;
use lessonsync::config::{CliArgs, Command, SyncConfig};
use lessonsync_store::{ChangeLog, FileChangeLog, StoreError};

fn main() {
    let cli = CliArgs::parse();

    let config = match SyncConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let command = cli.command.unwrap_or(Command::Records);
    if let Err(e) = run(&config, &command) {
        tracing::error!(
            error = %e,
            store = %config.store_path.display(),
            kind = failure_kind(&e),
            "command failed"
        );
        std::process::exit(exit_code(&e));
    }
}

fn failure_kind(error: &StoreError) -> &'static str {
    if error.is_read() {
        "read"
    } else if error.is_write() {
        "write"
    } else {
        "other"
    }
}

/// Exit status: 2 when the log could not be read, 3 when it could not be written.
fn exit_code(error: &StoreError) -> i32 {
    match failure_kind(error) {
        "read" => 2,
        "write" => 3,
        _ => 1,
    }
}

fn run(config: &SyncConfig, command: &Command) -> Result<(), StoreError> {
    let store = FileChangeLog::open(&config.store_path)?;
    tracing::debug!(
        store = %store.path().display(),
        records = store.record_count(),
        "opened change log"
    );

    match command {
        Command::Records => {
            for (record, changes) in store.entries()? {
                println!("{record}\t{} change(s)", changes.len());
            }
        }
        Command::Show { record } => {
            for change in &store.get_user_changes(Some(*record))? {
                println!("{change}");
            }
        }
        Command::Compact => {
            let stats = store.compact()?;
            println!(
                "{} record(s), {} -> {} bytes",
                stats.records, stats.bytes_before, stats.bytes_after
            );
        }
    }
    Ok(())
}

// src/main.rs

use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};

use keygen::clipboard::ClipboardWriter;
use keygen::config::init_config;
use keygen::errors::{LicenseError, LicenseResult};
use keygen::generator::{GenerateOutcome, LicenseGenerator};
use keygen::history::Generation;
use keygen::logging::init_logging;

/// Derive machine-bound license keys and keep a local history.
#[derive(Debug, Parser)]
#[command(name = "keygen", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Derive the key for a machine id and record it
    Generate {
        machine_id: String,
        /// Also copy the key to the clipboard
        #[arg(long)]
        copy: bool,
    },
    /// Show the ten most recent generations
    History {
        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },
    /// Copy the key of a history entry (0 = newest)
    Copy { index: usize },
    /// Remove all history
    Clear,
    /// Derive a key for every line read from stdin
    Watch,
}

// The process exits right after copying, so hand the selection off first.
#[cfg(feature = "clipboard")]
fn clipboard() -> Box<dyn ClipboardWriter> {
    Box::new(keygen::clipboard::SystemClipboard::until_handoff())
}

#[cfg(not(feature = "clipboard"))]
fn clipboard() -> Box<dyn ClipboardWriter> {
    Box::new(keygen::clipboard::MemoryClipboard::new())
}

fn format_timestamp(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}

fn print_generation(index: usize, generation: &Generation) {
    println!(
        "{:>2}  {}  {}  {}",
        index,
        generation.key,
        format_timestamp(generation.timestamp),
        generation.machine_id
    );
}

/// Print a generate outcome. Storage failures still show the derived key.
fn report(generator: &LicenseGenerator, result: LicenseResult<GenerateOutcome>) -> LicenseResult<()> {
    match result {
        Ok(GenerateOutcome::Derived { key, recorded }) => {
            println!("{key}");
            if !recorded {
                eprintln!("(already the latest history entry)");
            }
            Ok(())
        }
        Ok(GenerateOutcome::Cleared) => {
            eprintln!("(no key: machine id is empty)");
            Ok(())
        }
        Ok(GenerateOutcome::Superseded) => Ok(()),
        Err(e) if e.is_storage_failure() => {
            if let Some(key) = generator.current_key() {
                println!("{key}");
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

async fn run(cli: Cli) -> LicenseResult<()> {
    let config = init_config()?;
    init_logging(&config.logging)?;

    let generator = LicenseGenerator::from_config(config, clipboard())?;

    match cli.command {
        Command::Generate { machine_id, copy } => {
            let result = generator.generate(&machine_id).await;
            report(&generator, result)?;
            if copy && generator.copy_current()?.is_some() {
                eprintln!("Copied!");
            }
        }
        Command::History { json } => {
            let history = generator.history();
            if json {
                println!("{}", history.to_json()?);
            } else if history.is_empty() {
                eprintln!("No history yet.");
            } else {
                for (index, generation) in history.entries().iter().enumerate() {
                    print_generation(index, generation);
                }
            }
        }
        Command::Copy { index } => {
            let generation = generator.copy_history_entry(index)?;
            println!("{}", generation.key);
            eprintln!("Copied!");
        }
        Command::Clear => {
            generator.clear_history()?;
            eprintln!("History cleared.");
        }
        Command::Watch => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.map_err(LicenseError::InputError)? {
                let result = generator.generate(&line).await;
                if let Err(e) = report(&generator, result) {
                    eprintln!("error: {e}");
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(LicenseError::HistoryIndexOutOfRange(index)) => {
            eprintln!("error: no history entry at index {index}");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

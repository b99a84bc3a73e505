use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;

use idscan::{init_tracing, load_config, Config, JobTracker, Pipeline};

/// Extract structured fields from photos of identity documents.
#[derive(Parser, Debug)]
#[command(name = "idscan", version, about)]
struct Cli {
    /// Configuration file (JSON). Built-in defaults are used when omitted.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Images to process, one job per file.
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Returns `Ok(false)` if any image failed.
async fn run(cli: Cli) -> idscan::Result<bool> {
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    init_tracing(&config.logging)?;

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let tracker = JobTracker::new(&config, pipeline);

    let mut all_ok = true;
    for image in &cli.images {
        all_ok &= process_image(&tracker, image).await;
    }
    Ok(all_ok)
}

async fn process_image(tracker: &JobTracker, image: &Path) -> bool {
    let filename = image
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let content = match tokio::fs::read(image).await {
        Ok(content) => content,
        Err(e) => {
            print_json(&serde_json::json!({
                "filename": filename,
                "error": format!("Could not read image: {}", e),
            }));
            return false;
        }
    };

    let (ticket, handle) = match tracker.submit(&content, &filename).await {
        Ok(submitted) => submitted,
        Err(e) => {
            print_json(&serde_json::json!({
                "filename": filename,
                "status_code": e.status_code(),
                "error": e.to_string(),
            }));
            return false;
        }
    };
    handle.wait().await;

    if let Ok(view) = tracker.get_result(&ticket.job_id) {
        print_json(&view);
        return true;
    }
    match tracker.get_status(&ticket.job_id) {
        Ok(status) => print_json(&status),
        Err(e) => eprintln!("Error: {}", e),
    }
    false
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: could not serialize output: {}", e),
    }
}

//! Activity Check CLI
//!
//! Validates batch files locally or submits them to a running daemon.

use actcheck_protocol::{ErrorBody, Record, validate_batch, validate_record};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tabled::Tabled;

#[derive(Parser, Debug)]
#[command(name = "actcheck")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a batch file without contacting the daemon
    Check {
        /// JSON file holding an array of records
        file: PathBuf,
    },
    /// Submit a batch file to the daemon
    Submit {
        /// JSON file holding an array of records
        file: PathBuf,

        #[arg(long, default_value = "http://127.0.0.1:8888")]
        api: String,
    },
}

#[derive(Debug, Tabled)]
struct RecordRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "checkType")]
    check_type: String,
    #[tabled(rename = "activityType")]
    activity_type: String,
    #[tabled(rename = "session")]
    session: String,
    #[tabled(rename = "entries")]
    entries: usize,
    #[tabled(rename = "verdict")]
    verdict: String,
}

fn record_rows(records: &[Record]) -> Vec<RecordRow> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| RecordRow {
            index,
            check_type: record.check_type.clone(),
            activity_type: record.activity_type.clone(),
            session: record.check_session_key.clone(),
            entries: record.activity_data.len(),
            verdict: match validate_record(record) {
                Ok(()) => "ok".to_string(),
                Err(e) => e.to_string(),
            },
        })
        .collect()
}

async fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&content).with_context(|| format!("failed to decode {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Commands::Check { file } => {
            let records = load_records(&file).await?;
            let table = tabled::Table::new(record_rows(&records)).to_string();
            println!("{}", table);

            if let Err(e) = validate_batch(&records) {
                bail!("batch rejected: {}", e);
            }
            println!("Batch accepted ({} records)", records.len());
        }
        Commands::Submit { file, api } => {
            let body = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;

            let resp = Client::new()
                .post(format!("{}/isgood", api.trim_end_matches('/')))
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await?;

            let status = resp.status();
            let text = resp.text().await?;
            println!("{} {}", status, text);

            if !status.is_success() {
                match serde_json::from_str::<ErrorBody>(&text) {
                    Ok(err) => bail!("batch rejected: {}", err.message),
                    Err(_) => bail!("batch rejected with status {}", status),
                }
            }
        }
    }

    Ok(())
}

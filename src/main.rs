use anyhow::{bail, Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use receipt_recon::{
    init_logger, Config, InMemoryCatalog, ReconciliationEngine, ReconciliationResult,
    SqliteStore, TextFieldExtractor, TransactionStore,
};

const USAGE: &str = "Usage:
  receipt-recon [--config <file>] scan <ocr-text-file> --agent <agent-id>
  receipt-recon [--config <file>] extract <ocr-text-file>
  receipt-recon [--config <file>] stats <agent-id>
  receipt-recon [--config <file>] history <agent-id>";

fn main() -> Result<()> {
    let mut args: Vec<String> = env::args().skip(1).collect();

    let config = match take_option(&mut args, "--config")? {
        Some(path) => {
            let mut config = Config::load(Path::new(&path))?;
            config.apply_env_overrides(|key| env::var(key).ok());
            config
        }
        None => Config::discover()?,
    };
    init_logger(&config.log_level);

    match args.first().map(String::as_str) {
        Some("scan") => {
            let agent = take_option(&mut args, "--agent")?.context("scan needs --agent <agent-id>")?;
            run_scan(&config, &positional(&args, 1)?, &agent)
        }
        Some("extract") => run_extract(&positional(&args, 1)?),
        Some("stats") => run_stats(&config, &positional(&args, 1)?),
        Some("history") => run_history(&config, &positional(&args, 1)?),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(1);
        }
    }
}

/// Remove `--name value` from args and return the value
fn take_option(args: &mut Vec<String>, name: &str) -> Result<Option<String>> {
    let Some(pos) = args.iter().position(|a| a == name) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} needs a value", name);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    Ok(Some(value))
}

fn positional(args: &[String], index: usize) -> Result<String> {
    match args.get(index) {
        Some(value) => Ok(value.clone()),
        None => bail!("missing argument\n\n{}", USAGE),
    }
}

fn read_text(path: &str) -> Result<String> {
    fs::read_to_string(PathBuf::from(path))
        .with_context(|| format!("Failed to read OCR text: {}", path))
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database_path)
}

fn run_scan(config: &Config, text_path: &str, agent: &str) -> Result<()> {
    let text = read_text(text_path)?;

    let catalog = InMemoryCatalog::load_csv(&config.catalog_path)?;
    let store = open_store(config)?;
    let engine = ReconciliationEngine::new(Arc::new(catalog), Arc::new(store));

    let fields = TextFieldExtractor::new().extract(&text);
    let result = engine.reconcile(&fields, agent)?;

    match &result {
        ReconciliationResult::Accepted(record) => {
            println!("✅ Money available - recorded");
            println!("   Reference: {}", record.reference_id);
            println!("   Amount:    {}", record.amount);
            println!("   Bank:      {}", record.receiver_bank);
        }
        ReconciliationResult::AlreadyRecorded { reference_id } => {
            println!("✅ Money available - already recorded ({})", reference_id);
        }
        ReconciliationResult::Rejected(reason) => {
            println!("❌ {}", reason);
            std::process::exit(2);
        }
    }

    Ok(())
}

fn run_extract(text_path: &str) -> Result<()> {
    let text = read_text(text_path)?;
    let fields = TextFieldExtractor::new().extract(&text);
    println!("{}", serde_json::to_string_pretty(&fields)?);
    Ok(())
}

fn run_stats(config: &Config, agent: &str) -> Result<()> {
    let store = open_store(config)?;
    let counters = store.get_agent_counters(agent)?;

    println!("📊 Agent {}", agent);
    println!("   Successful:   {}", counters.successful_count);
    println!("   Unsuccessful: {}", counters.unsuccessful_count);
    Ok(())
}

fn run_history(config: &Config, agent: &str) -> Result<()> {
    let store = open_store(config)?;
    let records = store.transactions_for_agent(agent)?;

    if records.is_empty() {
        println!("No accepted transactions for {}", agent);
        return Ok(());
    }

    for record in records {
        let when = record
            .timestamp
            .map(|ts| ts.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<32} {:>14} {:<14} {}",
            record.reference_id, record.amount, record.receiver_bank, when
        );
    }
    Ok(())
}

//! FraudLens command line tool
//!
//! Assesses transactions from a file and prints one JSON assessment per line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fraudlens_cli::config::{CliSettings, LogFormat};
use fraudlens_cli::{build_detector, load_fraud_config, loader};
use fraudlens_core::FraudRule;
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "fraudlens")]
#[command(about = "Transaction fraud risk assessment")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// FraudLens YAML configuration, overrides the settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Rules directory, overrides the settings file
    #[arg(long, global = true)]
    rules_dir: Option<PathBuf>,

    /// Lists directory, overrides the settings file
    #[arg(long, global = true)]
    lists_dir: Option<PathBuf>,

    /// Prior transactions (JSON array), overrides the settings file
    #[arg(long, global = true)]
    history: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assess transactions and print the assessments as JSON lines
    Assess {
        /// JSON array or JSON lines of transactions
        transactions: PathBuf,

        /// Print a metrics summary to stderr when done
        #[arg(long)]
        metrics: bool,
    },
    /// Validate the FraudLens configuration
    Check,
    /// Evaluate a rule file against transactions without storing it
    TestRule {
        /// Rule YAML file
        rule: PathBuf,

        /// JSON array or JSON lines of transactions
        transactions: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = CliSettings::load()?;
    apply_overrides(&mut settings, &args);

    init_tracing(settings.log_format)?;

    match args.command {
        Commands::Assess {
            transactions,
            metrics,
        } => assess(&settings, &transactions, metrics).await,
        Commands::Check => {
            load_fraud_config(&settings)?;
            info!("Configuration is valid");
            println!("ok");
            Ok(())
        }
        Commands::TestRule { rule, transactions } => {
            test_rule(&settings, &rule, &transactions).await
        }
    }
}

fn apply_overrides(settings: &mut CliSettings, args: &Args) {
    if let Some(path) = &args.config {
        settings.fraud_config = Some(path.clone());
    }
    if let Some(path) = &args.rules_dir {
        settings.rules_dir = Some(path.clone());
    }
    if let Some(path) = &args.lists_dir {
        settings.lists_dir = Some(path.clone());
    }
    if let Some(path) = &args.history {
        settings.history_file = Some(path.clone());
    }
}

async fn assess(settings: &CliSettings, path: &PathBuf, print_metrics: bool) -> Result<()> {
    let detector = build_detector(settings).await?;
    let transactions = loader::load_transactions(path)?;
    info!(count = transactions.len(), "Assessing transactions");

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for tx in &transactions {
        let assessment = detector.analyze_transaction(tx).await;
        writeln!(out, "{}", serde_json::to_string(&assessment)?)?;
    }
    out.flush()?;

    if print_metrics {
        let snapshot = detector.metrics().snapshot();
        eprintln!("{}", serde_json::to_string_pretty(&snapshot)?);
    }
    Ok(())
}

async fn test_rule(settings: &CliSettings, rule_path: &PathBuf, path: &PathBuf) -> Result<()> {
    let content = std::fs::read_to_string(rule_path)
        .with_context(|| format!("Failed to read rule file {}", rule_path.display()))?;
    let rule: FraudRule = serde_yaml::from_str(&content)
        .with_context(|| format!("Invalid rule file {}", rule_path.display()))?;

    let detector = build_detector(settings).await?;
    let transactions = loader::load_transactions(path)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for tx in &transactions {
        let evaluation = detector.rules().test_rule(&rule, tx)?;
        writeln!(out, "{}", serde_json::to_string(&evaluation)?)?;
    }
    out.flush()?;
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "fraudlens_cli=info,fraudlens_sdk=info,fraudlens_runtime=info".into()
    });

    // Logs go to stderr so stdout stays machine readable
    let result = match format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}

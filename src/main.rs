//! Sic Bo outcome predictor
//!
//! Replays captured game feeds or simulated dice through the adaptive
//! ensemble and reports its predictions.

use clap::{Parser, Subcommand};
use sicbo_predictor::{
    config::Config,
    feed::{run_feed, FeedSource, FileSource, ReplaySummary, SimulatedSource},
    history::{HistoryManager, PredictionReport, SharedHistory},
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "sicbo-predictor")]
#[command(about = "Adaptive ensemble predictor for three-dice High/Low outcomes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a captured feed (one JSON message per line)
    Replay {
        /// Capture file
        file: PathBuf,
        /// Records loaded as the initial batch (overrides config)
        #[arg(long)]
        warmup: Option<usize>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run the predictor against fair simulated dice
    Simulate {
        /// Number of sessions to roll
        #[arg(short, long, default_value = "1000")]
        rounds: u64,
        /// Records loaded as the initial batch (overrides config)
        #[arg(long)]
        warmup: Option<usize>,
        /// RNG seed
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(&cli.config)?;

    // Initialize logging; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Replay { file, warmup, json } => {
            if let Some(warmup) = warmup {
                config.feed.warmup = warmup;
            }
            run(FileSource::new(file), &config, json).await
        }
        Commands::Simulate {
            rounds,
            warmup,
            seed,
            json,
        } => {
            if let Some(warmup) = warmup {
                config.feed.warmup = warmup;
            }
            run(SimulatedSource::new(rounds, seed), &config, json).await
        }
    }
}

async fn run<S: FeedSource + 'static>(
    source: S,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let history = SharedHistory::new(HistoryManager::from_config(config)?);
    let summary = run_feed(source, history.clone(), &config.feed).await?;
    let report = history.report();

    if json {
        let out = serde_json::json!({ "summary": summary, "report": report });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print_report(&summary, &report);
    }
    Ok(())
}

fn print_report(summary: &ReplaySummary, report: &PredictionReport) {
    println!("\n🎲 Feed Summary\n");
    println!(
        "Messages: {}  Snapshots: {}  Warmup: {}  Pushed: {}",
        summary.messages, summary.snapshots, summary.warmup, summary.pushed
    );
    println!("Rejected: {}  Stale: {}", summary.rejected, summary.stale);

    println!("\n📊 Prediction Report\n");
    match &report.latest {
        Some(latest) => println!(
            "Latest: #{} {:?} = {} ({})",
            latest.session_id(),
            latest.dice(),
            latest.total(),
            latest.outcome_class()
        ),
        None => println!("Latest: N/A"),
    }
    if let (Some(next), Some(prediction)) = (report.next_session, &report.prediction) {
        println!(
            "Next:   #{} -> {} ({:.1}%){}",
            next,
            prediction.predicted_class,
            prediction.confidence * 100.0,
            if prediction.fallback { " [no votes]" } else { "" }
        );
    }
    println!(
        "Hit rate: {:.2}% ({}/{})",
        report.stats.correct_rate * 100.0,
        report.stats.total_correct,
        report.stats.total
    );
    println!("Pattern: {}", report.pattern);

    let mut weights: Vec<_> = report.weights.iter().collect();
    weights.sort_by(|a, b| b.1.total_cmp(&a.1));
    println!("\nTop signals:");
    for (id, weight) in weights.iter().take(5) {
        println!("  {:<26} {:.4}", id, weight);
    }
}

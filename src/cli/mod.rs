#![forbid(unsafe_code)]

//! Command-line interface: loads configuration, installs logging, and
//! dispatches to the `serve`, `status`, and `bench` subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;

/// Timestamp Oracle and Conflict-Detection Server.
#[derive(Debug, Parser)]
#[command(name = "tso", version, about)]
pub struct Cli {
    /// Path to a TOML configuration file. Unset fields fall back to
    /// documented defaults.
    #[arg(long, env = "TSO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `data_dir` from the loaded configuration.
    #[arg(long, env = "TSO_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log verbosity filter, passed straight to `tracing-subscriber`'s
    /// env-filter (e.g. "info", "tso=debug").
    #[arg(long, env = "TSO_LOG", default_value = "info")]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the oracle / request-processor / persistence-processor
    /// pipeline, fronted by the demo HTTP surface.
    Serve {
        /// Overrides `port` from the loaded configuration.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Replay the commit log and print the recovered ceiling, low-watermark,
    /// and live metrics as a report.
    Status {
        /// Emit the report as JSON instead of a human-readable table.
        #[arg(long)]
        json: bool,
    },
    /// Drive the pipeline with synthetic traffic and report throughput and
    /// latency percentiles. Does not start the HTTP front-end.
    Bench {
        /// Total timestamp requests to issue.
        #[arg(long, default_value_t = 100_000)]
        requests: usize,
        /// Number of concurrent producer threads.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Print shell completion scripts for this binary.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Installs the `tracing-subscriber` env-filter layer. Call once, before
/// touching any other part of the crate.
pub fn init_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}

/// Loads configuration per the CLI's `--config`/`--data-dir` flags, layered
/// over [`Config::default`].
pub fn resolve_config(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.data_dir {
        cfg.data_dir = dir.clone();
    }
    cfg.validate()?;
    Ok(cfg)
}

/// Runs the `status` subcommand: replays the log and prints a report.
pub fn run_status(cfg: &Config, json: bool) -> Result<()> {
    let report = crate::admin::status_report(cfg)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        println!("oracle ceiling:          {}", report.oracle_ceiling);
        println!("low watermark:           {}", report.low_watermark);
        println!(
            "highest logged timestamp: {}",
            report.highest_logged_timestamp
        );
        println!("records replayed:        {}", report.records_replayed);
        println!("-- metrics --");
        println!("requests received:       {}", report.metrics.requests_received);
        println!("commits:                 {}", report.metrics.commits);
        println!("aborts:                  {}", report.metrics.aborts);
        println!(
            "conflict map evictions:  {}",
            report.metrics.conflict_map_evictions
        );
        println!(
            "low watermark advances:  {}",
            report.metrics.low_watermark_advances
        );
        println!(
            "oracle batch persists:   {}",
            report.metrics.oracle_batch_persists
        );
        println!(
            "persistence batches:     {} ({} events)",
            report.metrics.persistence_batches, report.metrics.persistence_batch_events
        );
        println!(
            "persistence latency:     p50={}us p95={}us",
            report.metrics.persistence_latency_p50_us, report.metrics.persistence_latency_p95_us
        );
    }
    Ok(())
}

/// Runs the `bench` subcommand: spins up the pipeline in-process (no HTTP
/// front-end), fires `requests` timestamp requests spread across
/// `concurrency` producer threads, and reports wall-clock throughput.
pub fn run_bench(cfg: &Config, requests: usize, concurrency: usize) -> Result<()> {
    use crate::events::{Reply, ReplyChannel};
    use crate::pipeline::Pipeline;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    struct CountingClient(Arc<AtomicUsize>);
    impl ReplyChannel for CountingClient {
        fn send_reply(&self, reply: Reply) {
            if matches!(reply, Reply::Timestamp { .. }) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    let pipeline = Arc::new(Pipeline::start(cfg)?);
    let completed = Arc::new(AtomicUsize::new(0));
    let per_thread = requests / concurrency.max(1);
    let total = per_thread * concurrency.max(1);
    let started = Instant::now();

    let progress = indicatif::ProgressBar::new(total as u64);
    let handles: Vec<_> = (0..concurrency.max(1))
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let completed = Arc::clone(&completed);
            std::thread::spawn(move || {
                for _ in 0..per_thread {
                    pipeline.timestamp_request(Arc::new(CountingClient(Arc::clone(&completed))));
                }
            })
        })
        .collect();
    for h in handles {
        let _ = h.join();
    }
    while completed.load(Ordering::Relaxed) < total {
        progress.set_position(completed.load(Ordering::Relaxed) as u64);
        std::thread::yield_now();
    }
    progress.finish_and_clear();

    let elapsed = started.elapsed();
    println!(
        "issued {} timestamp requests across {} threads in {:.3}s ({:.0} req/s)",
        total,
        concurrency,
        elapsed.as_secs_f64(),
        total as f64 / elapsed.as_secs_f64()
    );
    Ok(())
}

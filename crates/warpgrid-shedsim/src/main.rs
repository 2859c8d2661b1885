//! shedsim — drive synthetic load through a WarpGrid adaptive shedder.
//!
//! # Usage
//!
//! ```text
//! shedsim run --workers 200 --capacity 50 --cpu 95 --duration 10s
//! shedsim run --config shed.toml --json
//! shedsim config --config shed.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use warpgrid_shed::config::parse_duration;
use warpgrid_shed::{AdaptiveShedder, CpuSampler, FixedCpu, ProcStatCpu, ShedderConfig, ShedderFile};

mod sim;

#[derive(Parser)]
#[command(
    name = "shedsim",
    about = "WarpGrid shedder simulator",
    version,
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a closed-loop load simulation.
    Run {
        /// TOML file with a [shedder] table.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Concurrent simulated clients.
        #[arg(long, default_value = "64")]
        workers: usize,

        /// How long to run (e.g. "10s", "500ms").
        #[arg(long, default_value = "10s", value_parser = duration_arg)]
        duration: Duration,

        /// Base service time per unit of work.
        #[arg(long, default_value = "20ms", value_parser = duration_arg)]
        service_time: Duration,

        /// Concurrency the simulated service handles before slowing down
        /// (0 = unlimited).
        #[arg(long, default_value = "0")]
        capacity: u64,

        /// Fixed CPU percentage fed to the shedder.
        #[arg(long, default_value = "90", conflicts_with = "real_cpu")]
        cpu: f64,

        /// Sample the host CPU from /proc/stat instead of --cpu.
        #[arg(long)]
        real_cpu: bool,

        /// Fraction of admitted work completed as failed.
        #[arg(long, default_value = "0.0")]
        error_rate: f64,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective shedder configuration.
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warpgrid_shed=debug".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            workers,
            duration,
            service_time,
            capacity,
            cpu,
            real_cpu,
            error_rate,
            json,
        } => {
            let file = load_file(config.as_deref())?;
            if !file.enabled() {
                warn!("shedding is disabled in the config file; simulating it anyway");
            }
            let sampler: Arc<dyn CpuSampler> = if real_cpu {
                Arc::new(ProcStatCpu::new())
            } else {
                Arc::new(FixedCpu::new(cpu))
            };
            let shedder = AdaptiveShedder::new(file.to_options()?, sampler)?;
            let params = sim::SimParams {
                workers,
                duration,
                service_time,
                capacity,
                error_rate,
            };
            run(shedder, params, json).await
        }
        Command::Config { config } => {
            let file = load_file(config.as_deref())?;
            let effective = ShedderConfig::from_options(file.to_options()?)?;
            println!("enabled:           {}", file.enabled());
            println!("window:            {:?}", effective.window);
            println!("buckets:           {}", effective.buckets);
            println!("bucket duration:   {:?}", effective.bucket_duration());
            println!("cpu threshold:     {}%", effective.cpu_threshold);
            println!("min rt floor:      {:?}", effective.min_rt);
            println!("flying beta:       {}", effective.flying_beta);
            println!("cool-off:          {:?}", effective.cool_off);
            Ok(())
        }
    }
}

async fn run(shedder: AdaptiveShedder, params: sim::SimParams, json: bool) -> anyhow::Result<()> {
    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = stop_tx.send(true);
        }
    });

    let report = sim::simulate(shedder, params, stop_rx).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("workers:     {}", report.workers);
    println!("elapsed:     {} ms", report.elapsed_ms);
    println!("admitted:    {}", report.admitted);
    println!("dropped:     {} ({:.1}%)", report.dropped, report.drop_ratio * 100.0);
    println!("passed:      {}", report.passed);
    println!("failed:      {}", report.failed);
    println!(
        "shedder:     max_pass={} min_rt={}ms max_flight={:.1} avg_flying={:.1} hot={}",
        report.shedder.max_pass,
        report.shedder.min_rt,
        report.shedder.max_flight,
        report.shedder.avg_flying,
        report.shedder.hot,
    );
    Ok(())
}

fn load_file(path: Option<&std::path::Path>) -> anyhow::Result<ShedderFile> {
    match path {
        Some(p) => ShedderFile::from_file(p)
            .with_context(|| format!("loading shedder config from {}", p.display())),
        None => Ok(ShedderFile::default()),
    }
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration: {s}"))
}

//! Resilience engine CLI.
//!
//! # Commands
//! - `check <config>`: validate a config file and print the resolved
//!   per-resource policies as JSON
//! - `simulate [--config <file>]`: drive a flaky, slow product catalog
//!   through the engine and print how each call ended
//!
//! The simulated dependency fails at a configurable rate and answers after a
//! random delay, so every policy layer gets exercised.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use futures_util::stream::{self, StreamExt};
use rand::Rng;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use resilience_engine::config::{load_config, EngineConfig};
use resilience_engine::observability::logging::init_logging;
use resilience_engine::observability::metrics::init_metrics;
use resilience_engine::observability::{EventListener, ListenerSet, MetricsListener, TracingListener};
use resilience_engine::resilience::{Executor, Outcome, ResilienceError};

#[derive(Parser)]
#[command(name = "resilience-engine")]
#[command(about = "Run operations under rate limit, timeout, retry and circuit breaker policies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a config file and print the resolved policies
    Check {
        /// Config file to check
        path: PathBuf,
    },
    /// Run a fault-injecting demo workload
    Simulate(SimulateArgs),
}

#[derive(Args)]
struct SimulateArgs {
    /// Engine config file (TOML). Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resource the demo calls go through
    #[arg(long, default_value = "product-api")]
    resource: String,

    /// Number of calls to make
    #[arg(long, default_value_t = 50)]
    calls: usize,

    /// Probability that a single attempt fails
    #[arg(long, default_value_t = 0.7)]
    failure_rate: f64,

    #[arg(long, default_value_t = 100)]
    min_latency_ms: u64,

    #[arg(long, default_value_t = 2000)]
    max_latency_ms: u64,

    /// Calls in flight at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
}

#[derive(Debug, Clone, Serialize)]
struct Product {
    id: String,
    name: String,
    price: f64,
}

impl Product {
    fn fallback() -> Self {
        Self {
            id: "0".to_string(),
            name: "Fallback Product".to_string(),
            price: 0.0,
        }
    }
}

#[derive(Debug, Default, Serialize)]
struct Tally {
    success: usize,
    fallback: BTreeMap<String, usize>,
    failure: BTreeMap<String, usize>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { path } => {
            let config = load_config(&path)?;
            let executor = Executor::from_config(&config)?;
            let policies: BTreeMap<String, _> = executor
                .registry()
                .names()
                .into_iter()
                .filter_map(|name| executor.registry().get(&name).map(|state| (name, state.policy().clone())))
                .collect();

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "defaults": config.defaults,
                    "resources": policies,
                }))?
            );
        }
        Commands::Simulate(args) => {
            let config = match &args.config {
                Some(path) => load_config(path)?,
                None => EngineConfig::default(),
            };
            init_logging(&config.observability);
            tracing::info!("resilience-engine v{} starting", env!("CARGO_PKG_VERSION"));

            let mut listeners = ListenerSet::new().with(Arc::new(TracingListener));
            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => {
                        init_metrics(addr)?;
                        listeners = listeners.with(Arc::new(MetricsListener));
                    }
                    Err(e) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        error = %e,
                        "Failed to parse metrics address"
                    ),
                }
            }
            let listener: Arc<dyn EventListener> = Arc::new(listeners);

            let executor = Arc::new(Executor::from_config(&config)?.with_listener(listener));
            let tally = simulate(executor.clone(), &args).await;

            println!("{}", serde_json::to_string_pretty(&tally)?);
            println!("{}", serde_json::to_string_pretty(&executor.registry().statuses())?);
        }
    }

    Ok(())
}

async fn simulate(executor: Arc<Executor>, args: &SimulateArgs) -> Tally {
    executor.register_fallback(&args.resource, |_: &ResilienceError<String>| vec![Product::fallback()]);

    let failure_rate = args.failure_rate.clamp(0.0, 1.0);
    let min_latency = args.min_latency_ms;
    let max_latency = args.max_latency_ms.max(min_latency);

    let outcomes: Vec<Outcome<Vec<Product>, String>> = stream::iter(0..args.calls)
        .map(|_| {
            let executor = executor.clone();
            let resource = args.resource.clone();
            async move {
                executor
                    .call(&resource, move |cancel: CancellationToken| {
                        fetch_products(cancel, failure_rate, min_latency, max_latency)
                    })
                    .await
            }
        })
        .buffer_unordered(args.concurrency.max(1))
        .collect()
        .await;

    let mut tally = Tally::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Success(_) => tally.success += 1,
            Outcome::Fallback { cause, .. } => {
                *tally.fallback.entry(cause.root().kind().to_string()).or_default() += 1;
            }
            Outcome::Failure(error) => {
                *tally.failure.entry(error.root().kind().to_string()).or_default() += 1;
            }
        }
    }
    tally
}

/// A product listing that is slow and usually broken.
async fn fetch_products(
    cancel: CancellationToken,
    failure_rate: f64,
    min_latency_ms: u64,
    max_latency_ms: u64,
) -> Result<Vec<Product>, String> {
    let (delay, fails) = {
        let mut rng = rand::thread_rng();
        (rng.gen_range(min_latency_ms..=max_latency_ms), rng.gen_bool(failure_rate))
    };

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
        _ = cancel.cancelled() => return Err("cancelled".to_string()),
    }

    if fails {
        return Err("product service unavailable".to_string());
    }
    Ok(vec![
        Product { id: "1".to_string(), name: "Laptop".to_string(), price: 1200.0 },
        Product { id: "2".to_string(), name: "Phone".to_string(), price: 800.0 },
    ])
}

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::task::JoinSet;

#[derive(Parser)]
#[command(name = "animals-cli")]
#[command(about = "Traffic CLI for the animal buttons API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the animals
    Animals,
    /// Press one animal button
    Call {
        #[arg(value_enum)]
        animal: Animal,
    },
    /// Dump Prometheus metrics
    Metrics,
    /// Generate load against one animal route
    Load {
        #[arg(value_enum)]
        animal: Animal,

        /// Total number of requests
        #[arg(short = 'n', long, default_value_t = 100)]
        requests: usize,

        /// Requests in flight at once
        #[arg(short, long, default_value_t = 8)]
        concurrency: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Animal {
    Snail,
    Rabbit,
    Panda,
    Beaver,
}

impl Animal {
    fn path(self) -> &'static str {
        match self {
            Animal::Snail => "/snail",
            Animal::Rabbit => "/rabbit",
            Animal::Panda => "/panda",
            Animal::Beaver => "/beaver",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Animals => {
            let res = client.get(format!("{}/", base)).send().await?;
            print_response(res).await?;
        }
        Commands::Call { animal } => {
            let res = client.get(format!("{}{}", base, animal.path())).send().await?;
            print_response(res).await?;
        }
        Commands::Metrics => {
            let res = client.get(format!("{}/metrics", base)).send().await?;
            println!("{}", res.text().await?);
        }
        Commands::Load {
            animal,
            requests,
            concurrency,
        } => {
            let url = format!("{}{}", base, animal.path());
            run_load(client, url, requests, concurrency).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: API returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}

async fn run_load(
    client: reqwest::Client,
    url: String,
    requests: usize,
    concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    if requests == 0 {
        println!("Nothing to do");
        return Ok(());
    }

    let concurrency = concurrency.clamp(1, requests);
    let started = Instant::now();
    let mut workers = JoinSet::new();

    for worker in 0..concurrency {
        let share = requests / concurrency + usize::from(worker < requests % concurrency);
        let client = client.clone();
        let url = url.clone();

        workers.spawn(async move {
            let mut samples = Vec::with_capacity(share);
            for _ in 0..share {
                let start = Instant::now();
                let outcome = match client.get(&url).send().await {
                    Ok(res) => res.status().as_u16().to_string(),
                    Err(e) if e.is_timeout() => "timeout".to_string(),
                    Err(_) => "error".to_string(),
                };
                samples.push((outcome, start.elapsed()));
            }
            samples
        });
    }

    let mut samples = Vec::with_capacity(requests);
    while let Some(batch) = workers.join_next().await {
        samples.extend(batch?);
    }

    print_summary(&url, &samples, started.elapsed());
    Ok(())
}

fn print_summary(url: &str, samples: &[(String, Duration)], wall: Duration) {
    let mut outcomes: BTreeMap<&str, usize> = BTreeMap::new();
    for (outcome, _) in samples {
        *outcomes.entry(outcome.as_str()).or_default() += 1;
    }

    let mut latencies: Vec<Duration> = samples.iter().map(|(_, d)| *d).collect();
    latencies.sort();

    println!("{} requests to {} in {:.2?}", samples.len(), url, wall);
    for (outcome, count) in &outcomes {
        println!("  {:>8}: {}", outcome, count);
    }
    for (label, p) in [("p50", 0.50), ("p90", 0.90), ("p99", 0.99)] {
        println!("  {}: {:.1?}", label, percentile(&latencies, p));
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use colored::Colorize;
use feature_schema::FeatureSchema;
use pipeline::{PredictionResult, RawInput};
use rand::Rng;
use server::{AppState, Predictor, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::info;

const GOVERNORATES: [&str; 8] = [
    "Tunis", "Ariana", "Ben Arous", "Manouba", "Nabeul", "Sousse", "Sfax", "Monastir",
];
const PROPERTY_TYPES: [&str; 4] = ["Apartment", "Villa", "House", "Duplex"];

/// House price prediction service
#[derive(Parser)]
#[command(name = "house-price")]
#[command(about = "Serve and query the house price model", long_about = None)]
struct Cli {
    /// JSON manifest of registered model versions
    #[arg(long, default_value = server::config::DEFAULT_REGISTRY_PATH)]
    registry: PathBuf,

    /// Root of the run artifact tree
    #[arg(long, default_value = server::config::DEFAULT_ARTIFACT_ROOT)]
    artifact_root: PathBuf,

    /// Registered model name
    #[arg(long, default_value = server::config::DEFAULT_MODEL_NAME)]
    model: String,

    /// Registry stage to serve
    #[arg(long, default_value = server::config::DEFAULT_MODEL_STAGE)]
    stage: String,

    /// Path of the feature-column artifact inside the model's run
    #[arg(long, default_value = server::config::DEFAULT_FEATURE_ARTIFACT_PATH)]
    feature_artifact: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        #[arg(long, default_value = server::config::DEFAULT_LISTEN_ADDR)]
        addr: String,
    },

    /// Predict the price of one listing
    Predict {
        /// Living surface in square meters
        #[arg(long)]
        surface: f64,

        #[arg(long)]
        rooms: u32,

        #[arg(long)]
        governorate: String,

        #[arg(long)]
        property_type: String,
    },

    /// Predict every listing of a JSON-lines file
    Batch {
        /// One RawInput object per line
        #[arg(long)]
        input: PathBuf,
    },

    /// Print the feature columns of the served model
    Schema {
        /// Decode this artifact file instead of asking the registry
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Run benchmark to test performance
    Benchmark {
        /// Number of requests to make
        #[arg(long, default_value = "1000")]
        requests: usize,

        /// Number of concurrent requests
        #[arg(long, default_value = "10")]
        concurrent: usize,
    },
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            registry_path: self.registry.clone(),
            artifact_root: self.artifact_root.clone(),
            model_name: self.model.clone(),
            stage: self.stage.clone(),
            feature_artifact_path: self.feature_artifact.clone(),
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.server_config();

    match cli.command {
        Commands::Serve { addr } => {
            server::serve(&ServerConfig {
                listen_addr: addr,
                ..config
            })
            .await?
        }
        Commands::Predict {
            surface,
            rooms,
            governorate,
            property_type,
        } => {
            let raw = RawInput::new(surface, rooms, governorate, property_type);
            handle_predict(&config, raw).await?
        }
        Commands::Batch { input } => handle_batch(&config, input).await?,
        Commands::Schema { file } => handle_schema(&config, file).await?,
        Commands::Benchmark {
            requests,
            concurrent,
        } => handle_benchmark(&config, requests, concurrent).await?,
    }

    Ok(())
}

/// Load the configured model and feature schema
async fn load_predictor(config: &ServerConfig) -> Result<Predictor> {
    let start = Instant::now();
    info!(
        "Loading {}/{} from registry {}",
        config.model_name,
        config.stage,
        config.registry_path.display()
    );
    let predictor = AppState::from_config(config).predictor;
    let bundle = predictor
        .reload()
        .await
        .context("Failed to load model bundle")?;
    println!(
        "{} Loaded {}/{} version {} ({} features) in {:?}",
        "✓".green(),
        bundle.model_name,
        bundle.stage,
        bundle.version.version,
        bundle.schema().len(),
        start.elapsed()
    );
    Ok(predictor)
}

/// Handle the 'predict' command
async fn handle_predict(config: &ServerConfig, raw: RawInput) -> Result<()> {
    raw.validate()?;
    let predictor = load_predictor(config).await?;
    let result = predictor.predict(&raw).await?;
    print_prediction(&raw, &result);
    Ok(())
}

/// Handle the 'batch' command
async fn handle_batch(config: &ServerConfig, input: PathBuf) -> Result<()> {
    let text = tokio::fs::read_to_string(&input)
        .await
        .with_context(|| format!("Failed to read {}", input.display()))?;

    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let raw: RawInput = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: not a listing", input.display(), idx + 1))?;
        raw.validate()
            .with_context(|| format!("{}:{}: invalid listing", input.display(), idx + 1))?;
        records.push(raw);
    }
    if records.is_empty() {
        return Err(anyhow!("{} contains no listings", input.display()));
    }

    let predictor = load_predictor(config).await?;
    let start = Instant::now();
    let results = predictor.predict_batch(&records).await?;
    println!(
        "{}",
        format!("Predicted {} listings in {:?}:", results.len(), start.elapsed())
            .bold()
            .blue()
    );
    for (raw, result) in records.iter().zip(&results) {
        print_prediction(raw, result);
    }
    Ok(())
}

/// Handle the 'schema' command
async fn handle_schema(config: &ServerConfig, file: Option<PathBuf>) -> Result<()> {
    let schema = match file {
        Some(path) => FeatureSchema::from_file(&path)
            .with_context(|| format!("Failed to decode {}", path.display()))?,
        None => {
            let predictor = load_predictor(config).await?;
            let bundle = predictor.bundle().await?;
            bundle.schema().clone()
        }
    };

    println!("{}", format!("{} feature columns:", schema.len()).bold().blue());
    for (idx, column) in schema.iter().enumerate() {
        println!("{:>4}  {}", idx.to_string().green(), column);
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(config: &ServerConfig, requests: usize, concurrent: usize) -> Result<()> {
    if requests == 0 || concurrent == 0 {
        return Err(anyhow!("requests and concurrent must be positive"));
    }
    let predictor = Arc::new(load_predictor(config).await?);

    let mut rng = rand::rng();
    let inputs: Vec<RawInput> = (0..requests)
        .map(|_| {
            RawInput::new(
                rng.random_range(20.0..1500.0),
                rng.random_range(1..=8),
                GOVERNORATES[rng.random_range(0..GOVERNORATES.len())],
                PROPERTY_TYPES[rng.random_range(0..PROPERTY_TYPES.len())],
            )
        })
        .collect();

    info!("Firing {} requests, {} at a time", requests, concurrent);
    let permits = Arc::new(Semaphore::new(concurrent));
    let wall_clock = Instant::now();
    let mut handles = Vec::with_capacity(requests);
    for raw in inputs {
        let predictor = predictor.clone();
        let permits = permits.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await?;
            let start = Instant::now();
            predictor.predict(&raw).await?;
            Ok::<_, anyhow::Error>(start.elapsed())
        }));
    }

    let mut timings: Vec<Duration> = Vec::with_capacity(requests);
    for handle in handles {
        timings.push(handle.await??);
    }
    let total_time = wall_clock.elapsed();

    timings.sort();
    let avg_latency = timings.iter().sum::<Duration>() / timings.len() as u32;
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f64 / total_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Requests: {} ({} concurrent)", requests, concurrent);
    println!("Total time: {:?}", total_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn print_prediction(raw: &RawInput, result: &PredictionResult) {
    println!(
        "{} {:.0} m², {} rooms, {} in {} => {} (log {:.4})",
        "•".green(),
        raw.surface,
        raw.rooms,
        raw.property_type,
        raw.governorate,
        format!("{:.2}", result.price).bold(),
        result.log_price
    );
}

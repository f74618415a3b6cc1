use clap::{Parser, Subcommand};
use crime_severity::config::Config;
use crime_severity::ml::TrainingPipeline;
use reqwest::Client;
use serde_json::json;
use std::error::Error;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crime-severity-cli")]
#[command(about = "Crime Severity Service CLI", long_about = None)]
struct Cli {
    #[arg(short, long, env = "CRIME_SEV_ENDPOINT", default_value = "http://localhost:8000")]
    endpoint: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate data, select the best model and write the artifacts
    Train {
        /// Artifact output directory (defaults to artifacts.dir from config)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of synthetic samples
        #[arg(short = 'n', long)]
        samples: Option<usize>,

        /// Random seed for data, split and models
        #[arg(short, long)]
        seed: Option<u64>,

        /// Cross-validation folds
        #[arg(short = 'k', long)]
        folds: Option<usize>,
    },

    /// Assess a crime report with a running server
    Predict {
        #[arg(short = 't', long)]
        crime_type: String,

        #[arg(short, long)]
        location: String,

        #[arg(short, long)]
        description: String,

        #[arg(short, long)]
        reporter: Option<String>,

        /// When the incident happened, free text
        #[arg(short = 'w', long)]
        incident_datetime: Option<String>,
    },

    /// Check server health
    Health,

    /// Show the loaded model
    ModelInfo,

    /// List supported crime types
    CrimeTypes,

    /// List supported locations
    Locations,
}

async fn get_json(client: &Client, url: String) -> Result<(), Box<dyn Error>> {
    let response = client.get(url).send().await?;
    let body: serde_json::Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

fn run_training(
    output: Option<PathBuf>,
    samples: Option<usize>,
    seed: Option<u64>,
    folds: Option<usize>,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crime_severity=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut training = config.training.clone();
    if let Some(n) = samples {
        training.n_samples = n;
    }
    if let Some(s) = seed {
        training.seed = s;
    }
    if let Some(k) = folds {
        training.cv_folds = k;
    }
    let output = output.unwrap_or(config.artifacts.dir);

    let report = TrainingPipeline::new(training, output).run()?;

    println!();
    println!("Crime Severity Training");
    println!("=======================");
    for cv in &report.cv_results {
        println!(
            "  {:<20} CV accuracy: {:.4} +/- {:.4}",
            cv.model_type.to_string(),
            cv.mean,
            cv.std
        );
    }
    println!();
    println!("Best model:      {}", report.model_type);
    println!("Test accuracy:   {:.4}", report.test_accuracy);
    println!(
        "Samples:         {} train / {} test",
        report.n_training_samples, report.n_test_samples
    );
    println!("Duration:        {:.1}s", report.duration_secs);
    println!();
    println!("{}", report.test_metrics.report());
    println!("Artifacts written to: {}", report.artifacts_dir.display());

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Train {
            output,
            samples,
            seed,
            folds,
        } => {
            tokio::task::spawn_blocking(move || {
                run_training(output, samples, seed, folds).map_err(|e| e.to_string())
            })
            .await??;
        }

        Commands::Predict {
            crime_type,
            location,
            description,
            reporter,
            incident_datetime,
        } => {
            let response = client
                .post(format!("{}/predict", cli.endpoint))
                .json(&json!({
                    "crime_type": crime_type,
                    "location": location,
                    "description": description,
                    "reporter_name": reporter,
                    "incident_datetime": incident_datetime,
                }))
                .send()
                .await?;

            let body: serde_json::Value = response.json().await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }

        Commands::Health => get_json(&client, format!("{}/health", cli.endpoint)).await?,

        Commands::ModelInfo => get_json(&client, format!("{}/model-info", cli.endpoint)).await?,

        Commands::CrimeTypes => {
            get_json(&client, format!("{}/crime-types", cli.endpoint)).await?
        }

        Commands::Locations => get_json(&client, format!("{}/locations", cli.endpoint)).await?,
    }

    Ok(())
}

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cropcast::config::ENV_MODEL_KIND;
use cropcast::{
    yield_label, ArtifactSource, InputRecord, InputTable, ModelKind, ModelManager, Predictor,
    PredictorBuilder, PredictorConfig, PredictorError, YieldClass,
};
use log::info;

#[derive(Parser)]
#[command(author, version, about = "Crop yield prediction", long_about = None)]
struct Args {
    /// Model kind (ff, rnn, lstm); prompted for when omitted
    #[arg(short, long)]
    model: Option<String>,

    /// Path to a CSV file for batch prediction
    #[arg(short, long)]
    batch: Option<PathBuf>,

    /// Directory holding the model artifacts
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Reference dataset the encoders and scaler are fit on
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL to fetch missing model artifacts from
    #[arg(long)]
    fetch_from: Option<String>,
}

fn prompt(stdin: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    if stdin.read_line(&mut line)? == 0 {
        anyhow::bail!("unexpected end of input");
    }
    Ok(line.trim().to_string())
}

fn prompt_model_choice(stdin: &mut impl BufRead) -> Result<String> {
    println!("\nSelect model to use:");
    println!("1. RNN");
    println!("2. LSTM");
    println!("3. Feedforward Neural Network");
    let choice = match prompt(stdin, "Enter choice [1/2/3]: ")?.as_str() {
        "1" => "rnn",
        "2" => "lstm",
        "3" => "ff",
        _ => {
            println!("Invalid choice. Defaulting to RNN.");
            "rnn"
        }
    };
    Ok(choice.to_string())
}

fn prompt_record(stdin: &mut impl BufRead) -> Result<InputRecord> {
    println!("\nEnter the following details:");
    let state = prompt(stdin, "State_Name: ")?;
    let district = prompt(stdin, "District_Name: ")?;
    let year = prompt(stdin, "Crop_Year (e.g., 2013): ")?
        .parse::<i32>()
        .context("Crop_Year must be an integer")?;
    let season = prompt(stdin, "Season: ")?;
    let crop = prompt(stdin, "Crop: ")?;
    let area = prompt(stdin, "Area (in hectares): ")?
        .parse::<f64>()
        .context("Area must be a number")?;
    Ok(InputRecord::new(state, district, year, season, crop, area))
}

fn describe_error(e: &PredictorError) -> String {
    let mut message = format!("Error in prediction: {}", e.root());
    if let Some(stage) = e.stage() {
        message.push_str(&format!(" (stage: {}", stage));
        if let Some(field) = e.field() {
            message.push_str(&format!(", field: {}", field));
        }
        message.push(')');
    }
    message
}

/// Output lines of a batch run. A failed batch becomes a single error
/// carrying the described message.
fn batch_lines(result: Result<Vec<YieldClass>, PredictorError>) -> Result<Vec<String>> {
    let labels = result.map_err(|e| anyhow!(describe_error(&e)))?;
    Ok(labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            format!("Sample {}: Predicted Crop Yield will be {}", i + 1, yield_label(*label))
        })
        .collect())
}

fn load_config(args: &Args) -> Result<PredictorConfig> {
    let mut config = match &args.config {
        Some(path) => PredictorConfig::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?
            .with_env_overrides(),
        None => PredictorConfig::from_env(),
    };
    if let Some(dir) = &args.models_dir {
        config.models_dir = dir.clone();
    }
    if let Some(dataset) = &args.dataset {
        config.dataset_path = dataset.clone();
    }
    Ok(config)
}

async fn fetch_artifacts(config: &PredictorConfig, base_url: &str) -> Result<()> {
    let stem = config
        .model_kind
        .parse::<ModelKind>()
        .map(ModelKind::artifact_stem)
        .unwrap_or(config.model_kind.as_str());
    let manager = ModelManager::new(&config.models_dir);
    manager
        .ensure_available(stem, &ArtifactSource::new(base_url))
        .await
        .with_context(|| format!("Failed to fetch {} artifacts from {}", stem, base_url))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let stdin = io::stdin();
    let mut stdin = stdin.lock();

    let mut config = load_config(&args)?;
    config.model_kind = match &args.model {
        Some(kind) => kind.clone(),
        None if args.config.is_some() || env::var(ENV_MODEL_KIND).is_ok() => {
            config.model_kind.clone()
        }
        None => prompt_model_choice(&mut stdin)?,
    };

    if let Some(url) = &args.fetch_from {
        fetch_artifacts(&config, url).await?;
    }

    let start_time = Instant::now();
    let predictor: Predictor = PredictorBuilder::from_config(&config)?
        .build()
        .with_context(|| format!("Failed to load {} model", config.model_kind))?;
    let predictor_info = predictor.info();
    info!(
        "{} model loaded ({}, input {}) in {:.2?}",
        predictor_info.kind,
        predictor_info.load_path,
        predictor_info.input_layout,
        start_time.elapsed()
    );

    match &args.batch {
        Some(path) => {
            let table = InputTable::from_csv_path(path)
                .with_context(|| format!("Failed to read batch file {}", path.display()))?;
            for line in batch_lines(predictor.predict_table(&table))? {
                println!("{}", line);
            }
        }
        None => {
            let record = prompt_record(&mut stdin)?;
            match predictor.predict_single(&record) {
                Ok(label) => println!("\nPrediction: Crop Yield will be {}", yield_label(label)),
                Err(e) => eprintln!("{}", describe_error(&e)),
            }
        }
    }

    Ok(())
}

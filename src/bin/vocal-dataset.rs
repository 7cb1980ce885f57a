use clap::{Parser, Subcommand};
use std::{path::PathBuf, process};
use tracing_subscriber::EnvFilter;
use vocal_dataset_core::{generate_dataset, Aligner, DatasetConfig, SpectrogramCache};

#[derive(Parser)]
#[command(name = "vocal-dataset")]
#[command(about = "Align mix/instrumental pairs and build vocal training data", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON file overriding the default configuration
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Align every pair under <input>/{mix,instrument} and write
    /// <output>/{instrument,mix,vocal}
    Generate {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        #[arg(short, long)]
        sample_rate: Option<u32>,

        /// Pairs processed in parallel, 0 for one per core
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Compute (or load) the cached magnitude spectrograms of one pair
    Cache {
        #[arg(long)]
        mix: PathBuf,

        #[arg(long)]
        inst: PathBuf,

        #[arg(short, long)]
        sample_rate: Option<u32>,

        #[arg(long)]
        hop_length: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = load_config(cli.config.as_ref()).and_then(|config| match cli.command {
        Commands::Generate {
            input,
            output,
            sample_rate,
            jobs,
        } => handle_generate(config, input, output, sample_rate, jobs),
        Commands::Cache {
            mix,
            inst,
            sample_rate,
            hop_length,
        } => handle_cache(config, mix, inst, sample_rate, hop_length),
    });

    match result {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<DatasetConfig, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(DatasetConfig::from_json_file(p)?),
        None => Ok(DatasetConfig::default()),
    }
}

fn handle_generate(
    mut config: DatasetConfig,
    input: PathBuf,
    output: PathBuf,
    sample_rate: Option<u32>,
    jobs: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !input.exists() {
        return Err(format!("Input folder not found: {}", input.display()).into());
    }
    if let Some(sr) = sample_rate {
        config.sample_rate = sr;
    }
    if let Some(j) = jobs {
        config.jobs = j;
    }

    let report = generate_dataset(&input, &output, &config)?;

    for pair in &report.written {
        println!("{}", pair.vocal_path);
    }
    for (name, err) in &report.failed {
        eprintln!("failed: {name}: {err}");
    }
    if report.written.is_empty() && !report.failed.is_empty() {
        return Err("no pair could be aligned".into());
    }
    Ok(())
}

fn handle_cache(
    mut config: DatasetConfig,
    mix: PathBuf,
    inst: PathBuf,
    sample_rate: Option<u32>,
    hop_length: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(sr) = sample_rate {
        config.sample_rate = sr;
    }
    if let Some(hop) = hop_length {
        config.hop_length = hop;
    }

    let cache = SpectrogramCache::new(
        std::sync::Arc::new(vocal_dataset_core::DecodingLoader),
        std::sync::Arc::new(vocal_dataset_core::StftTransform),
        Aligner::new(config.align.clone()),
    )
    .with_top_db(config.top_db);

    let (x, y) = cache.get_or_compute(&mix, &inst, config.sample_rate, config.hop_length)?;
    println!("mix: {:?}", x.shape());
    println!("instrument: {:?}", y.shape());
    Ok(())
}

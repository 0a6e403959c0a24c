//! Command-line entry point: decode, check, train and query digit networks.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use digit_nn::data::{load_idx3_images, load_image_input, save_column_as_image};
use digit_nn::{check_gradients, train_loop, Dataset, GradientCheckConfig, Network, NetworkSpec, TrainConfig};

#[derive(Parser)]
#[command(name = "digit-nn")]
#[command(about = "Train and run a from-scratch handwritten digit classifier", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Write one image of an IDX3 file out as a PNG
    DecodeImage {
        /// IDX3 image file
        #[arg(long)]
        images: PathBuf,

        /// Zero-based index of the image to extract
        #[arg(long)]
        index: usize,

        /// Output PNG path
        #[arg(long)]
        out: PathBuf,
    },

    /// Compare analytic and finite-difference weight gradients
    GradientCheck {
        /// Number of independent trials
        #[arg(long)]
        trials: usize,

        /// Width of the single softmax layer under test
        #[arg(long, default_value = "5")]
        size: usize,

        /// Finite-difference step
        #[arg(long, default_value = "1e-5")]
        step: f64,

        /// Seed for reproducible trials
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Classify an image with a saved model
    Inference {
        /// Model JSON written by `train`
        #[arg(long)]
        model: PathBuf,

        /// Image file (PNG, JPEG, BMP or GIF)
        #[arg(long)]
        image: PathBuf,
    },

    /// Train a network on IDX files
    Train {
        #[arg(long)]
        train_images: PathBuf,

        #[arg(long)]
        train_labels: PathBuf,

        #[arg(long)]
        test_images: PathBuf,

        #[arg(long)]
        test_labels: PathBuf,

        #[arg(long)]
        batch_size: usize,

        #[arg(long)]
        learning_rate: f64,

        /// Number of mini-batch steps
        #[arg(long)]
        steps: usize,

        /// Evaluate on the test batch every N steps
        #[arg(long)]
        test_frequency: usize,

        #[arg(long)]
        test_batch_size: usize,

        /// Write a checkpoint every N steps
        #[arg(long)]
        checkpoint_frequency: usize,

        /// Directory for checkpoint JSON files
        #[arg(long)]
        checkpoint_dir: PathBuf,

        /// Resume from a saved model instead of a fresh network
        #[arg(long)]
        checkpoint_load: Option<PathBuf>,

        /// Architecture JSON for a fresh network (default 784-20-20-10)
        #[arg(long, conflicts_with = "checkpoint_load")]
        architecture: Option<PathBuf>,

        /// Seed for initialization and shuffling
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = match cli.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to install logger")?;

    match cli.command {
        Commands::DecodeImage { images, index, out } => {
            let matrix = load_idx3_images(&images)
                .with_context(|| format!("failed to load {}", images.display()))?;
            save_column_as_image(&matrix, index, &out)?;
            info!(index, out = %out.display(), "image written");
        }

        Commands::GradientCheck { trials, size, step, seed } => {
            let config = GradientCheckConfig {
                trials,
                size,
                step,
                ..Default::default()
            };
            let report = check_gradients(&config, &mut make_rng(seed))?;
            for trial in &report.trials {
                println!("Calculated weight gradient: {}", trial.analytic);
                println!("Numerical weight gradient:  {}", trial.numerical);
            }
            println!("Average weight deviation: {}", report.average_deviation);
        }

        Commands::Inference { model, image } => {
            let network = Network::load_json(&model)
                .with_context(|| format!("failed to load model {}", model.display()))?;
            let input = load_image_input(&image)
                .with_context(|| format!("failed to read image {}", image.display()))?;
            let output = network.forward_inference(&input)?;

            let mut ranked: Vec<(usize, f64)> = output.into_iter().enumerate().collect();
            ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            println!("Top 3 probabilities:");
            for (digit, probability) in ranked.into_iter().take(3) {
                println!("    {} - {:.2}%", digit, probability * 100.0);
            }
        }

        Commands::Train {
            train_images,
            train_labels,
            test_images,
            test_labels,
            batch_size,
            learning_rate,
            steps,
            test_frequency,
            test_batch_size,
            checkpoint_frequency,
            checkpoint_dir,
            checkpoint_load,
            architecture,
            seed,
        } => {
            let mut rng = make_rng(seed);

            let mut network = match (&checkpoint_load, &architecture) {
                (Some(path), _) => Network::load_json(path)
                    .with_context(|| format!("failed to load checkpoint {}", path.display()))?,
                (None, Some(path)) => NetworkSpec::load_json(path)
                    .with_context(|| format!("failed to load architecture {}", path.display()))?
                    .build(&mut rng)?,
                (None, None) => NetworkSpec::digits().build(&mut rng)?,
            };

            let train = Dataset::load_idx(&train_images, &train_labels).context("failed to load training set")?;
            let test = Dataset::load_idx(&test_images, &test_labels).context("failed to load test set")?;
            info!(train = train.len(), test = test.len(), "datasets loaded");

            let config = TrainConfig {
                test_frequency,
                test_batch_size,
                checkpoint_frequency,
                checkpoint_dir: Some(checkpoint_dir),
                ..TrainConfig::new(batch_size, learning_rate, steps)
            };
            let report = train_loop(&mut network, &train, &test, &config, &mut rng)?;

            if let Some(last) = report.evaluations.last() {
                info!(loss = last.loss, accuracy = last.accuracy, "training finished");
            }
        }
    }

    Ok(())
}

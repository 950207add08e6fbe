//! Cotton Disease CLI
//!
//! Trains the classifier, diagnoses single images, renders reports and
//! inspects datasets and artifact directories.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::info;

use cotton_disease::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use cotton_disease::dataset::{load_class_names, AugmentationConfig, CottonLeafDataset};
use cotton_disease::inference::{Diagnosis, Predictor};
use cotton_disease::report::{ReportRenderer, DEFAULT_FONT_PATH, REPORT_FILENAME};
use cotton_disease::training::{run_training, ArtifactPaths, TrainingConfig};
use cotton_disease::utils::format_duration;
use cotton_disease::utils::logging::{init_logging, LogConfig, LogLevel};

/// Cotton leaf disease and pest classification
#[derive(Parser, Debug)]
#[command(name = "cotton_disease")]
#[command(version)]
#[command(about = "Cotton leaf disease classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error); overrides --verbose
    #[arg(long, env = "COTTON_LOG")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier (frozen base, then fine-tuning)
    Train {
        /// Dataset root with one sub-directory per class
        #[arg(short, long, default_value = "data/cotton")]
        data_dir: PathBuf,

        /// Where weights, class names and history are written
        #[arg(short, long, default_value = "artifacts")]
        artifacts_dir: PathBuf,

        /// Start from a saved training_config.json
        #[arg(long)]
        config: Option<PathBuf>,

        /// Maximum epochs per phase
        #[arg(short, long)]
        epochs: Option<usize>,

        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Phase 1 learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Early stopping patience (epochs)
        #[arg(long)]
        patience: Option<usize>,

        /// First base stage unfrozen for fine-tuning
        #[arg(long)]
        fine_tune_at: Option<usize>,

        #[arg(long)]
        image_size: Option<usize>,

        /// Fraction of each class held out for validation accuracy
        #[arg(long)]
        validation_fraction: Option<f64>,

        /// Augmentation preset: default, light, none
        #[arg(long)]
        augmentation: Option<String>,

        /// Pretrained weights: imagenet, none, or a .pth path
        #[arg(long)]
        pretrained: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        /// Stop after the feature-extraction phase
        #[arg(long, default_value = "false")]
        no_fine_tune: bool,

        /// Decode images lazily instead of caching them in memory
        #[arg(long, default_value = "false")]
        no_cache: bool,
    },

    /// Diagnose a leaf image and print the result as JSON
    Predict {
        /// Path to the image
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "artifacts")]
        artifacts_dir: PathBuf,
    },

    /// Diagnose a leaf image and write the PDF report
    Report {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long, default_value = "artifacts")]
        artifacts_dir: PathBuf,

        /// Output PDF path
        #[arg(short, long, default_value = REPORT_FILENAME)]
        output: PathBuf,

        /// Devanagari TrueType font
        #[arg(long, default_value = DEFAULT_FONT_PATH)]
        font: PathBuf,
    },

    /// List the classes of a trained model
    Classes {
        #[arg(short, long, default_value = "artifacts")]
        artifacts_dir: PathBuf,
    },

    /// Show dataset statistics
    Stats {
        #[arg(short, long, default_value = "data/cotton")]
        data_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _ = init_logging(&LogConfig::from_flags(cli.verbose, cli.log_level));

    match cli.command {
        Commands::Train {
            data_dir,
            artifacts_dir,
            config,
            epochs,
            batch_size,
            learning_rate,
            patience,
            fine_tune_at,
            image_size,
            validation_fraction,
            augmentation,
            pretrained,
            seed,
            no_fine_tune,
            no_cache,
        } => {
            let mut training = match config {
                Some(path) => TrainingConfig::load(&path)
                    .with_context(|| format!("reading training config {:?}", path))?,
                None => TrainingConfig::default(),
            };

            if let Some(v) = epochs {
                training.epochs = v;
            }
            if let Some(v) = batch_size {
                training.batch_size = v;
            }
            if let Some(v) = learning_rate {
                training.learning_rate = v;
            }
            if let Some(v) = patience {
                training.patience = v;
            }
            if let Some(v) = fine_tune_at {
                training.fine_tune_at = v;
            }
            if let Some(v) = image_size {
                training.image_size = v;
            }
            if let Some(v) = validation_fraction {
                training.validation_fraction = v;
            }
            if let Some(name) = augmentation {
                training.augmentation = match AugmentationConfig::preset(&name) {
                    Some(preset) => preset,
                    None => bail!("unknown augmentation preset '{}'", name),
                };
            }
            if let Some(v) = pretrained {
                training.pretrained = v;
            }
            if let Some(v) = seed {
                training.seed = v;
            }
            training.skip_fine_tuning |= no_fine_tune;
            training.cache_images &= !no_cache;

            cmd_train(&data_dir, &artifacts_dir, &training)?;
        }

        Commands::Predict { input, artifacts_dir } => {
            let diagnosis = diagnose(&input, &artifacts_dir)?;
            println!("{}", serde_json::to_string_pretty(&diagnosis)?);
        }

        Commands::Report {
            input,
            artifacts_dir,
            output,
            font,
        } => {
            cmd_report(&input, &artifacts_dir, &output, &font)?;
        }

        Commands::Classes { artifacts_dir } => {
            let paths = ArtifactPaths::new(&artifacts_dir);
            let class_names = load_class_names(&paths.class_names())?;
            println!("{}", "Classes (training order):".cyan().bold());
            for (idx, name) in class_names.iter().enumerate() {
                println!("  {:2}. {}", idx, name);
            }
        }

        Commands::Stats { data_dir } => {
            let dataset = CottonLeafDataset::from_dir(&data_dir)?;
            dataset.stats().print();
        }
    }

    Ok(())
}

fn cmd_train(data_dir: &Path, artifacts_dir: &Path, config: &TrainingConfig) -> Result<()> {
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Data:          {:?}", data_dir);
    println!("  Artifacts:     {:?}", artifacts_dir);
    println!("  Backend:       {}", backend_name());
    println!("  Image size:    {}", config.image_size);
    println!("  Batch size:    {}", config.batch_size);
    println!(
        "  Learning rate: {} (fine-tune {})",
        config.learning_rate,
        config.fine_tune_learning_rate()
    );
    println!("  Epochs/phase:  {} (patience {})", config.epochs, config.patience);
    println!("  Fine-tune at:  stage {}", config.fine_tune_at);
    println!("  Pretrained:    {}", config.pretrained);
    println!();

    let device = default_device();
    let summary = run_training::<TrainingBackend>(data_dir, artifacts_dir, config, &device)?;

    println!();
    println!("{}", "Training complete".green().bold());
    println!("  Train samples: {}", summary.train_samples);
    if summary.val_samples > 0 {
        println!("  Val samples:   {}", summary.val_samples);
    }
    for phase in &summary.history.phases {
        let best = phase
            .best()
            .map(|r| format!("loss {:.4}, acc {:.2}%", r.loss, r.accuracy * 100.0))
            .unwrap_or_else(|| "no epochs".to_string());
        let stop = if phase.stopped_early { " (early stop)" } else { "" };
        println!(
            "  {:<18} {:>3} epochs{}  best: {}",
            phase.name,
            phase.epochs.len(),
            stop,
            best
        );
    }
    if let Some(acc) = summary.history.final_accuracy() {
        println!("  Final accuracy: {}", format!("{:.2}%", acc * 100.0).green());
    }
    println!("  Duration:      {}", format_duration(summary.duration_secs));
    println!("  Weights:       {:?}", summary.artifacts.model_file());
    Ok(())
}

fn diagnose(input: &Path, artifacts_dir: &Path) -> Result<Diagnosis> {
    if !input.exists() {
        bail!("input image not found: {:?}", input);
    }
    let device = default_device();
    let predictor = Predictor::<DefaultBackend>::load(artifacts_dir, &device)
        .with_context(|| format!("loading model from {:?}", artifacts_dir))?;

    let prediction = predictor.predict_file(input)?;
    info!(
        "{:?} → {} ({:.2}%, {:.1} ms)",
        input,
        prediction.class_name,
        prediction.confidence * 100.0,
        prediction.inference_time_ms
    );

    let diagnosis = Diagnosis::from_prediction(&prediction);
    if let Some(warning) = &diagnosis.warning {
        eprintln!("{} {}", "Warning:".yellow().bold(), warning);
    }
    Ok(diagnosis)
}

fn cmd_report(input: &Path, artifacts_dir: &Path, output: &Path, font: &Path) -> Result<()> {
    let renderer = ReportRenderer::from_font_file(font)
        .with_context(|| format!("a Devanagari font is required at {:?}", font))?;
    let diagnosis = diagnose(input, artifacts_dir)?;

    let pdf = renderer.render_diagnosis(&diagnosis)?;
    std::fs::write(output, &pdf).with_context(|| format!("writing {:?}", output))?;

    println!(
        "{} {} ({:.2}%) → {:?}",
        "Report written:".green().bold(),
        diagnosis.disease,
        diagnosis.confidence,
        output
    );
    Ok(())
}

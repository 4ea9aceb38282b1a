use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use genrescope::config::AppConfig;
use genrescope::pipeline::{TrainOptions, TrainingOutcome};
use genrescope::select::CandidateConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "genrescope", version, about = "MIDI genre classifier")]
struct Cli {
    /// Path to a config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct TrainArgs {
    /// Tab-separated genre label file (defaults to config labels_path)
    #[arg(long)]
    labels: Option<PathBuf>,

    /// MIDI corpus root (defaults to config corpus_dir)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Shuffle seed for the train/validation/test split
    #[arg(long)]
    seed: Option<u64>,

    /// Number of parallel workers (0 = auto-detect from config)
    #[arg(short = 'j', long, default_value = "0")]
    jobs: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized feature vector of MIDI files
    Extract {
        /// MIDI files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Build the dataset, select the best candidate, report accuracies
    Train {
        #[command(flatten)]
        args: TrainArgs,
    },

    /// Train, then predict the genre of a MIDI file
    Predict {
        /// MIDI file to classify
        file: PathBuf,

        #[command(flatten)]
        args: TrainArgs,
    },

    /// List the configured candidate models
    Candidates,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load(cli.config.as_deref());

    match cli.command {
        Commands::Extract { files, json } => {
            let mut rows = Vec::with_capacity(files.len());
            for file in &files {
                match genrescope::extractor::extract(file) {
                    Ok(v) => rows.push((file, Some(v))),
                    Err(e) => {
                        log::warn!("{}: {}", file.display(), e);
                        rows.push((file, None));
                    }
                }
            }

            if json {
                let out: Vec<_> = rows
                    .iter()
                    .map(|(file, v)| serde_json::json!({ "path": file, "features": v }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!(
                    "{:>8} {:>8} {:>8} {:>8}  {}",
                    "Tempo", "Res", "TSNum", "TSDen", "File"
                );
                println!("{}", "-".repeat(60));
                for (file, v) in &rows {
                    match v {
                        Some(v) => println!(
                            "{:>8.4} {:>8.4} {:>8.4} {:>8.4}  {}",
                            v.tempo(),
                            v.resolution(),
                            v.time_signature_numerator(),
                            v.time_signature_denominator(),
                            file.display()
                        ),
                        None => println!("{:>35}  {}", "(undecodable)", file.display()),
                    }
                }
            }
        }

        Commands::Train { args } => {
            let outcome = run_training(&config, args)?;
            print_outcome(&outcome);
        }

        Commands::Predict { file, args } => {
            let outcome = run_training(&config, args)?;
            let genre = genrescope::predict::predict(&outcome.model, &outcome.vocabulary, &file)
                .with_context(|| format!("Prediction failed for {}", file.display()))?;
            println!(
                "{}: {} (model {}, test accuracy {:.3})",
                file.display(),
                genre,
                outcome.model.name,
                outcome.test_accuracy
            );
        }

        Commands::Candidates => {
            println!("{:<20} {:>7}  {}", "Name", "Shape", "Learner");
            println!("{}", "-".repeat(60));
            for c in config.resolve_candidates() {
                println!("{:<20} {:>7}  {:?}", c.name, c.shape.to_string(), c.learner);
            }
        }
    }

    Ok(())
}

fn run_training(config: &AppConfig, args: TrainArgs) -> Result<TrainingOutcome> {
    // Resolve inputs: CLI > config
    let labels_path = args
        .labels
        .or_else(|| config.labels_path.clone())
        .context("No label file. Pass --labels or set labels_path in config.")?;
    let corpus_dir = args
        .corpus
        .or_else(|| config.corpus_dir.clone())
        .context("No corpus directory. Pass --corpus or set corpus_dir in config.")?;
    let jobs = if args.jobs > 0 { args.jobs } else { config.resolve_workers() };

    let candidates = config
        .resolve_candidates()
        .iter()
        .map(CandidateConfig::build)
        .collect();

    genrescope::pipeline::train(TrainOptions {
        labels_path,
        corpus_dir,
        seed: args.seed.or(config.seed),
        jobs,
        candidates,
    })
}

fn print_outcome(outcome: &TrainingOutcome) {
    let (train, validation, test) = outcome.split_sizes;
    println!(
        "Dataset: {} matched files, {} extracted, {} undecodable",
        outcome.matched_files, outcome.extracted, outcome.failed
    );
    println!(
        "Split: {} train, {} validation, {} test ({} genres)",
        train,
        validation,
        test,
        outcome.vocabulary.len()
    );
    println!();

    println!("{:<20} {:>7} {:>10}", "Candidate", "Shape", "Val acc");
    println!("{}", "-".repeat(40));
    for s in &outcome.scores {
        let marker = if s.name == outcome.model.name { " *" } else { "" };
        println!(
            "{:<20} {:>7} {:>10.4}{}",
            s.name,
            s.shape.to_string(),
            s.accuracy,
            marker
        );
    }
    println!();
    println!(
        "Selected {}: validation {:.4}, test {:.4}",
        outcome.model.name, outcome.validation_accuracy, outcome.test_accuracy
    );
}

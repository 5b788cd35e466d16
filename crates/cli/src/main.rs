use als::{AlsConfig, AlsTrainer, Factorization, IterationStats, SyntheticRatings};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{write_ratings, ItemId, RatingFormat, RatingIndex, UserId};
use dataflow::{Engine, LocalEngine};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// factorize - ALS matrix factorization for rating data
#[derive(Parser)]
#[command(name = "factorize")]
#[command(about = "Low-rank factorization of user-item ratings with Alternating Least Squares", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train user and item factors from a ratings file
    Train {
        /// Ratings file
        #[arg(short, long)]
        ratings: PathBuf,

        /// File layout (dat, csv, tsv); guessed from the extension when omitted
        #[arg(long)]
        format: Option<RatingFormat>,

        /// Number of latent factors
        #[arg(long, default_value = "10")]
        factors: usize,

        /// Regularization weight
        #[arg(long, default_value = "0.1")]
        lambda: f64,

        /// Number of (users, items) alternations
        #[arg(long, default_value = "10")]
        iterations: usize,

        /// Seed for the initial item factors
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Number of engine partitions (default: one per Rayon thread)
        #[arg(long)]
        partitions: Option<usize>,

        /// Write the trained model as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Report the training error after every iteration
        #[arg(long)]
        history: bool,

        /// Write the per-iteration errors as JSON (implies --history)
        #[arg(long)]
        history_output: Option<PathBuf>,
    },

    /// Show rating counts and value statistics
    Stats {
        /// Ratings file
        #[arg(short, long)]
        ratings: PathBuf,

        /// File layout (dat, csv, tsv); guessed from the extension when omitted
        #[arg(long)]
        format: Option<RatingFormat>,

        /// Number of most active users and items to list
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Predict one rating from a trained model
    Predict {
        /// Model JSON written by `train --output`
        #[arg(short, long)]
        model: PathBuf,

        #[arg(long)]
        user_id: UserId,

        #[arg(long)]
        item_id: ItemId,
    },

    /// Write a synthetic low-rank ratings file
    Generate {
        #[arg(long, default_value = "100")]
        users: u32,

        #[arg(long, default_value = "50")]
        items: u32,

        /// Rank of the ground-truth factors
        #[arg(long, default_value = "3")]
        rank: usize,

        /// Fraction of observed cells
        #[arg(long, default_value = "0.2")]
        density: f64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Output file (`::`-separated)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train {
            ratings,
            format,
            factors,
            lambda,
            iterations,
            seed,
            partitions,
            output,
            history,
            history_output,
        } => {
            let config = AlsConfig::new(factors, lambda, iterations, seed);
            let options = TrainOptions {
                partitions,
                output,
                history: history || history_output.is_some(),
                history_output,
            };
            handle_train(&ratings, format, config, options)?
        }
        Commands::Stats {
            ratings,
            format,
            top,
        } => handle_stats(&ratings, format, top)?,
        Commands::Predict {
            model,
            user_id,
            item_id,
        } => handle_predict(&model, user_id, item_id)?,
        Commands::Generate {
            users,
            items,
            rank,
            density,
            seed,
            output,
        } => handle_generate(users, items, rank, density, seed, &output)?,
    }

    Ok(())
}

struct TrainOptions {
    partitions: Option<usize>,
    output: Option<PathBuf>,
    history: bool,
    history_output: Option<PathBuf>,
}

/// Read and validate a ratings file, printing how long it took
fn load_ratings(path: &Path, format: Option<RatingFormat>) -> Result<RatingIndex> {
    let format = format.unwrap_or_else(|| RatingFormat::from_path(path));
    println!("Loading {} ratings from {}...", format, path.display());

    let start = Instant::now();
    let index = RatingIndex::load_from_file(path, format)
        .with_context(|| format!("Failed to load ratings from {}", path.display()))?;
    index.validate().context("Ratings file is not usable")?;

    let (users, items, ratings) = index.counts();
    println!(
        "{} Loaded {} ratings ({} users, {} items) in {:?}",
        "✓".green(),
        ratings,
        users,
        items,
        start.elapsed()
    );
    Ok(index)
}

/// Handle the 'train' command
fn handle_train(
    path: &Path,
    format: Option<RatingFormat>,
    config: AlsConfig,
    options: TrainOptions,
) -> Result<()> {
    let index = load_ratings(path, format)?;

    let engine = match options.partitions {
        Some(partitions) => LocalEngine::new(partitions)?,
        None => LocalEngine::default(),
    };
    let trainer = AlsTrainer::new(engine, config)?;
    info!(?config, partitions = trainer.engine().partitions(), "configured trainer");

    println!(
        "{}",
        format!(
            "Training: {} factors, lambda {}, {} iterations, {} partitions",
            config.factors,
            config.lambda,
            config.iterations,
            trainer.engine().partitions()
        )
        .bold()
        .blue()
    );

    let ratings = index.ratings().to_vec();
    let dataset = trainer.engine().parallelize(ratings);

    let start = Instant::now();
    let (model, history) = if options.history {
        trainer.fit_with_history(&dataset)?
    } else {
        (trainer.fit(&dataset)?, Vec::new())
    };
    println!("{} Trained in {:?}", "✓".green(), start.elapsed());

    if !history.is_empty() {
        print_history(&history);
    }

    println!(
        "{}RMSE: {:.4}",
        "• ".cyan(),
        model.rmse(index.ratings())
    );
    println!(
        "{}Squared error: {:.4}",
        "• ".cyan(),
        model.reconstruction_error(index.ratings())
    );

    if let Some(output) = &options.output {
        model
            .save_json(output)
            .with_context(|| format!("Failed to write model to {}", output.display()))?;
        info!(path = %output.display(), "saved model");
        println!("{} Model written to {}", "✓".green(), output.display());
    }

    if let Some(output) = &options.history_output {
        let file = File::create(output)
            .with_context(|| format!("Failed to create {}", output.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &history)?;
        println!("{} History written to {}", "✓".green(), output.display());
    }

    Ok(())
}

/// Handle the 'stats' command
fn handle_stats(path: &Path, format: Option<RatingFormat>, top: usize) -> Result<()> {
    let index = load_ratings(path, format)?;
    let stats = index
        .stats()
        .ok_or_else(|| anyhow!("{} contains no ratings", path.display()))?;

    println!("{}", "Rating statistics:".bold().blue());
    println!("{}Users: {}", "• ".green(), stats.users);
    println!("{}Items: {}", "• ".green(), stats.items);
    println!("{}Ratings: {}", "• ".green(), stats.ratings);
    println!("{}Density: {:.4}%", "• ".green(), stats.density * 100.0);
    println!(
        "{}Mean rating: {:.3} (min {}, max {})",
        "• ".cyan(),
        stats.mean,
        stats.min,
        stats.max
    );

    print_activity("users", &index.ratings_per_user(), top);
    print_activity("items", &index.ratings_per_item(), top);
    Ok(())
}

/// Handle the 'predict' command
fn handle_predict(model_path: &Path, user_id: UserId, item_id: ItemId) -> Result<()> {
    let model = Factorization::load_json(model_path)
        .with_context(|| format!("Failed to read model from {}", model_path.display()))?;

    info!(
        rank = model.rank,
        users = model.user_factors.len(),
        items = model.item_factors.len(),
        "loaded model"
    );

    let score = model.predict(user_id, item_id).ok_or_else(|| {
        match (model.user_factor(user_id), model.item_factor(item_id)) {
            (None, _) => anyhow!("User {} not found in model", user_id),
            _ => anyhow!("Item {} not found in model", item_id),
        }
    })?;

    println!(
        "Predicted rating for user {} on item {}: {}",
        user_id,
        item_id,
        format!("{:.3}", score).bold().green()
    );
    Ok(())
}

/// Handle the 'generate' command
fn handle_generate(
    users: u32,
    items: u32,
    rank: usize,
    density: f64,
    seed: u64,
    output: &Path,
) -> Result<()> {
    if !(0.0..=1.0).contains(&density) {
        return Err(anyhow!("density must be in [0, 1], got {}", density));
    }

    let ratings = SyntheticRatings::new(users, items, rank)
        .with_density(density)
        .with_seed(seed)
        .generate();
    info!(count = ratings.len(), path = %output.display(), "writing synthetic ratings");
    write_ratings(output, &ratings, RatingFormat::Dat)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "{} Wrote {} ratings ({} users, {} items, rank {}) to {}",
        "✓".green(),
        ratings.len(),
        users,
        items,
        rank,
        output.display()
    );
    Ok(())
}

/// Helper function to print the per-iteration training error
fn print_history(history: &[IterationStats]) {
    println!("{}", "Training error per iteration:".bold().blue());
    for stats in history {
        println!(
            "{:>4}. squared error {:>12.4}  rmse {:.4}",
            stats.iteration.to_string().green(),
            stats.squared_error,
            stats.rmse
        );
    }
}

/// Helper function to summarize how many ratings each entity has
fn print_activity(label: &str, counts: &[(u32, usize)], top: usize) {
    if counts.is_empty() {
        return;
    }

    let mut sorted: Vec<usize> = counts.iter().map(|(_, count)| *count).collect();
    sorted.sort_unstable();
    let median = sorted[sorted.len() / 2];

    println!(
        "{}",
        format!("Ratings per {}:", label.trim_end_matches('s')).bold().blue()
    );
    println!(
        "{}min {}, median {}, max {}",
        "• ".cyan(),
        sorted[0],
        median,
        sorted[sorted.len() - 1]
    );

    let mut most_active = counts.to_vec();
    most_active.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    println!("Most active {}:", label);
    for (id, count) in most_active.iter().take(top) {
        println!("  - {}: {} ratings", id, count);
    }
}

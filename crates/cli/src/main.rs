use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use data_loader::{ItemId, RatingIndex, UserId};
use factorization::{FactorSnapshot, PrecomputeOutcome, SnapshotSummary};
use pipeline::{NewUserRatings, Recommendation};
use rand::seq::IndexedRandom;
use rand::Rng;
use server::{RecommendationService, RecommenderConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// latent-recs - Cold-start recommendations from latent factors
#[derive(Parser)]
#[command(name = "latent-recs")]
#[command(about = "Collaborative filtering with truncated SVD and fold-in cold start", long_about = None)]
struct Cli {
    /// JSON configuration file (every key optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Factorize a ratings file and persist the snapshot
    Precompute {
        /// Ratings file (CSV or `::` separated)
        #[arg(long)]
        ratings: PathBuf,

        /// Number of latent dimensions
        #[arg(long)]
        rank: Option<usize>,

        /// Where to write the snapshot
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Recommend for a new user by folding them into a snapshot
    Recommend {
        /// Snapshot written by `precompute`
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// A rating of the new user, as ITEM=SCORE (repeatable)
        #[arg(long = "rate", value_parser = parse_rate)]
        rates: Vec<(ItemId, f32)>,

        /// Number of recommendations to return
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Recommend for a new user by refitting on the full ratings file
    Refit {
        /// Ratings file (CSV or `::` separated)
        #[arg(long)]
        ratings: PathBuf,

        /// A rating of the new user, as ITEM=SCORE (repeatable)
        #[arg(long = "rate", value_parser = parse_rate)]
        rates: Vec<(ItemId, f32)>,

        /// Number of latent dimensions
        #[arg(long)]
        rank: Option<usize>,

        /// Number of recommendations to return
        #[arg(long)]
        top_n: Option<usize>,
    },

    /// Show what a snapshot contains
    Inspect {
        /// Snapshot written by `precompute`
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Also show the reconstructed ratings of this training user
        #[arg(long)]
        user_id: Option<UserId>,
    },

    /// Measure fold-in latency under concurrent requests
    Benchmark {
        /// Snapshot written by `precompute`
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Number of requests to make
        #[arg(long, default_value = "100")]
        requests: usize,

        /// Random ratings per simulated user
        #[arg(long, default_value = "5")]
        ratings_per_request: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => RecommenderConfig::from_file(path)?,
        None => RecommenderConfig::default(),
    };
    debug!("Using configuration {:?}", config);

    // Dispatch to appropriate command handler
    match cli.command {
        Commands::Precompute { ratings, rank, out } => {
            let mut config = config;
            if let Some(rank) = rank {
                config = config.with_rank(rank);
            }
            if let Some(out) = out {
                config = config.with_snapshot_path(out);
            }
            handle_precompute(config, &ratings).await?
        }
        Commands::Recommend {
            snapshot,
            rates,
            top_n,
        } => handle_recommend(with_snapshot(config, snapshot), rates, top_n)?,
        Commands::Refit {
            ratings,
            rates,
            rank,
            top_n,
        } => {
            let config = match rank {
                Some(rank) => config.with_rank(rank),
                None => config,
            };
            handle_refit(config, &ratings, rates, top_n).await?
        }
        Commands::Inspect { snapshot, user_id } => {
            handle_inspect(with_snapshot(config, snapshot), user_id)?
        }
        Commands::Benchmark {
            snapshot,
            requests,
            ratings_per_request,
        } => {
            handle_benchmark(with_snapshot(config, snapshot), requests, ratings_per_request)
                .await?
        }
    }

    Ok(())
}

fn with_snapshot(config: RecommenderConfig, snapshot: Option<PathBuf>) -> RecommenderConfig {
    match snapshot {
        Some(path) => config.with_snapshot_path(path),
        None => config,
    }
}

/// Parse `ITEM=SCORE`
fn parse_rate(s: &str) -> std::result::Result<(ItemId, f32), String> {
    let (item, score) = s
        .split_once('=')
        .ok_or_else(|| format!("expected ITEM=SCORE, got '{}'", s))?;
    let item = item
        .trim()
        .parse::<ItemId>()
        .map_err(|e| format!("invalid item id '{}': {}", item, e))?;
    let score = score
        .trim()
        .parse::<f32>()
        .map_err(|e| format!("invalid score '{}': {}", score, e))?;
    Ok((item, score))
}

fn load_ratings(config: &RecommenderConfig, path: &Path) -> Result<Arc<RatingIndex>> {
    println!("Loading ratings from {}...", path.display());
    let start = Instant::now();
    let index = RatingIndex::load_from_file_with_scale(path, config.scale())
        .with_context(|| format!("Failed to load ratings from {}", path.display()))?;
    let (users, items, ratings) = index.counts();
    println!(
        "{} Loaded {} ratings ({} users, {} items) in {:?}",
        "✓".green(),
        ratings,
        users,
        items,
        start.elapsed()
    );
    Ok(Arc::new(index))
}

/// A service with no training data, serving a persisted snapshot.
fn snapshot_service(config: RecommenderConfig) -> Result<RecommendationService> {
    let path = config.snapshot_path.clone();
    let service = RecommendationService::new(Arc::new(RatingIndex::new()), config);
    service.load_snapshot(&path)?;
    Ok(service)
}

/// Handle the 'precompute' command
async fn handle_precompute(config: RecommenderConfig, ratings: &Path) -> Result<()> {
    config.validate()?;
    let index = load_ratings(&config, ratings)?;
    let out = config.snapshot_path.clone();
    let service = RecommendationService::new(index, config);

    let start = Instant::now();
    match service.precompute().await? {
        PrecomputeOutcome::Published(snapshot) => {
            println!(
                "{} Wrote snapshot to {} in {:?}",
                "✓".green(),
                out.display(),
                start.elapsed()
            );
            print_summary(&snapshot.summary());
        }
        PrecomputeOutcome::Superseded { generation } => {
            bail!("Precompute generation {} was superseded", generation)
        }
    }
    Ok(())
}

/// Handle the 'recommend' command
fn handle_recommend(
    config: RecommenderConfig,
    rates: Vec<(ItemId, f32)>,
    top_n: Option<usize>,
) -> Result<()> {
    let service = snapshot_service(config)?;
    let ratings: NewUserRatings = rates.into_iter().collect();

    let start = Instant::now();
    let recommendations = service.recommend(&ratings, top_n)?;
    debug!("Fold-in took {:?}", start.elapsed());

    print_recommendations(&recommendations, "Fold-in Recommendations:");
    Ok(())
}

/// Handle the 'refit' command
async fn handle_refit(
    config: RecommenderConfig,
    ratings_path: &Path,
    rates: Vec<(ItemId, f32)>,
    top_n: Option<usize>,
) -> Result<()> {
    config.validate()?;
    let index = load_ratings(&config, ratings_path)?;
    let service = RecommendationService::new(index, config);
    let ratings: NewUserRatings = rates.into_iter().collect();

    let start = Instant::now();
    let recommendations = service.refit_recommend(ratings, top_n).await?;
    println!("{} Full refit took {:?}", "✓".green(), start.elapsed());

    print_recommendations(&recommendations, "Full Refit Recommendations:");
    Ok(())
}

/// Handle the 'inspect' command
fn handle_inspect(config: RecommenderConfig, user_id: Option<UserId>) -> Result<()> {
    let path = config.snapshot_path.clone();
    let snapshot = FactorSnapshot::load(&path)
        .with_context(|| format!("Failed to load snapshot from {}", path.display()))?;
    print_summary(&snapshot.summary());

    if let Some(user_id) = user_id {
        let row = snapshot
            .reconstruct_user(user_id)
            .with_context(|| format!("User {} is not in the snapshot", user_id))?;

        let mut predicted: Vec<(ItemId, f64)> =
            snapshot.items().iter().copied().zip(row).collect();
        predicted.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        println!("{}", format!("Reconstructed ratings for user {}:", user_id).bold().blue());
        for (item_id, value) in predicted.iter().take(config.default_top_n) {
            println!("  - item {}: {:.3}", item_id, value);
        }
    }
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    config: RecommenderConfig,
    requests: usize,
    ratings_per_request: usize,
) -> Result<()> {
    ensure!(requests > 0, "requests must be at least 1");

    let scale = config.scale();
    let top_n = config.default_top_n;
    let service = snapshot_service(config)?;
    let snapshot = service.current_snapshot()?;

    // Random new users over the snapshot's items
    let mut rng = rand::rng();
    let users: Vec<NewUserRatings> = (0..requests)
        .map(|_| {
            let picked: Vec<ItemId> = snapshot
                .items()
                .choose_multiple(&mut rng, ratings_per_request)
                .copied()
                .collect();
            picked
                .into_iter()
                .map(|item_id| (item_id, rng.random_range(scale.min..=scale.max).round()))
                .collect()
        })
        .collect();

    // Use tokio::spawn to make concurrent requests
    let wall_clock = Instant::now();
    let mut handles = vec![];
    for ratings in users {
        let service = service.clone();
        let handle = tokio::spawn(async move {
            let start = Instant::now();
            service.recommend(&ratings, Some(top_n))?;
            Ok::<_, anyhow::Error>(start.elapsed())
        });
        handles.push(handle);
    }

    let mut timings = vec![];
    for handle in handles {
        let elapsed = handle.await??;
        timings.push(elapsed);
    }
    let wall_time = wall_clock.elapsed();

    let total_time: Duration = timings.iter().sum();
    let avg_latency = total_time / (timings.len() as u32);
    timings.sort();
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];
    let throughput = requests as f64 / wall_time.as_secs_f64();

    println!("{}", "Benchmark results:".bold().blue());
    println!("Wall time: {:?}", wall_time);
    println!("Average latency: {:?}", avg_latency);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!("Throughput: {:.2} requests/second", throughput);

    Ok(())
}

fn print_summary(summary: &SnapshotSummary) {
    println!("{}", "Snapshot:".bold().blue());
    println!("{}Generation: {}", "• ".green(), summary.generation);
    println!("{}Users: {}", "• ".green(), summary.users);
    println!("{}Items: {}", "• ".green(), summary.items);
    println!(
        "{}Rank: {} (requested {})",
        "• ".green(),
        summary.rank,
        summary.requested_rank
    );
    let sigma = summary
        .leading_singular_values
        .iter()
        .map(|s| format!("{:.3}", s))
        .collect::<Vec<_>>()
        .join(", ");
    println!("{}Leading singular values: {}", "• ".cyan(), sigma);
}

/// Helper function to format and print recommendations
fn print_recommendations(recommendations: &[Recommendation], header: &str) {
    println!("{}", header.bold().blue());
    if recommendations.is_empty() {
        println!("  (nothing left to recommend)");
    }
    for (i, rec) in recommendations.iter().enumerate() {
        println!(
            "{}. item {} - Score: {:.4} (predicted {:.3})",
            (i + 1).to_string().green(),
            rec.item_id,
            rec.score,
            rec.predicted
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("42=4.5"), Ok((42, 4.5)));
        assert_eq!(parse_rate(" 7 = 3 "), Ok((7, 3.0)));
        assert!(parse_rate("42").is_err());
        assert!(parse_rate("x=1").is_err());
        assert!(parse_rate("1=high").is_err());
    }

    #[test]
    fn test_cli_parses_repeated_rates() {
        let cli = Cli::try_parse_from([
            "latent-recs",
            "recommend",
            "--snapshot",
            "f.json",
            "--rate",
            "1=5",
            "--rate",
            "50=3",
            "--top-n",
            "3",
        ])
        .unwrap();

        match cli.command {
            Commands::Recommend { rates, top_n, .. } => {
                assert_eq!(rates, vec![(1, 5.0), (50, 3.0)]);
                assert_eq!(top_n, Some(3));
            }
            _ => panic!("expected recommend"),
        }
    }
}

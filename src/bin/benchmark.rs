use clap::Parser;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::error::Error;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::prelude::*;

use puyo::search::{TreeSearchAgent, TreeSearchConfig};
use puyo::{ConfigError, State, StateConfig};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rule set and board size
    #[arg(long, default_value = "small", value_parser = ["small", "wide", "tsu", "large"])]
    preset: String,

    /// Number of independent episodes
    #[arg(long, default_value_t = 32)]
    episodes: u64,

    /// Moves per episode before it counts as survived
    #[arg(long, default_value_t = 100)]
    max_moves: usize,

    /// Seed of the first episode, later episodes count up from it
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Override the search depth of the preset
    #[arg(long)]
    depth: Option<i32>,

    /// Number of worker threads (default: all cores)
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// Print one line per episode
    #[arg(long, action = clap::ArgAction::SetTrue)]
    per_episode: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy)]
struct Episode {
    seed: u64,
    reward: i64,
    moves: usize,
    survived: bool,
}

/// Plays one episode with its own state and agent.
fn run_episode(
    config: &StateConfig,
    search: TreeSearchConfig,
    seed: u64,
    max_moves: usize,
) -> Result<Episode, ConfigError> {
    let mut state = State::new(StateConfig { seed: Some(seed), ..config.clone() })?;
    let mut agent = TreeSearchAgent::new(search, seed);
    let mut episode = Episode { seed, reward: 0, moves: 0, survived: true };
    while episode.moves < max_moves {
        let action = agent.get_action(&state);
        let reward = state.step(action);
        if reward < 0 {
            episode.survived = false;
            break;
        }
        episode.reward += i64::from(reward);
        episode.moves += 1;
    }
    tracing::debug!(seed, reward = episode.reward, moves = episode.moves, "episode finished");
    Ok(episode)
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let level = if args.verbose > 1 {
        Level::TRACE
    } else if args.verbose == 1 {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();

    let config = StateConfig::preset(&args.preset).ok_or_else(|| format!("unknown preset {}", args.preset))?;
    let mut search = TreeSearchConfig::preset(&args.preset).unwrap_or_default();
    if let Some(depth) = args.depth {
        search.depth = depth;
    }

    println!("Puyo Arena - Search Benchmark");
    println!("=============================");
    println!("Preset: {} ({}x{}, {} colors)", args.preset, config.height, config.width, config.num_colors);
    println!("Search Depth: {}", search.depth);
    println!("Episodes: {}", args.episodes);
    println!("Max Moves: {}", args.max_moves);
    println!("Threads: {}", args.threads);
    println!("-----------------------------");

    #[cfg(debug_assertions)]
    println!("WARNING: Running in debug mode. Performance will be significantly lower.\nUse --release for accurate benchmarks.\n");

    let pool = ThreadPoolBuilder::new().num_threads(args.threads).build()?;
    let start = Instant::now();
    let episodes = pool.install(|| {
        (0..args.episodes)
            .into_par_iter()
            .map(|i| run_episode(&config, search, args.seed.wrapping_add(i), args.max_moves))
            .collect::<Result<Vec<_>, _>>()
    })?;
    let duration = start.elapsed();

    if args.per_episode {
        for episode in &episodes {
            println!(
                "  seed {:>6}: reward {:>8} moves {:>4} {}",
                episode.seed,
                episode.reward,
                episode.moves,
                if episode.survived { "survived" } else { "topped out" }
            );
        }
    }
    print_stats(&episodes, duration);
    Ok(())
}

fn print_stats(episodes: &[Episode], duration: Duration) {
    let secs = duration.as_secs_f64();
    let total_moves: usize = episodes.iter().map(|e| e.moves).sum();
    let total_reward: i64 = episodes.iter().map(|e| e.reward).sum();
    let survived = episodes.iter().filter(|e| e.survived).count();
    let count = episodes.len().max(1) as f64;

    println!("Results:");
    println!("  Episodes: {}", episodes.len());
    println!("  Survived: {} ({:.1}%)", survived, 100.0 * survived as f64 / count);
    println!("  Mean Reward: {:.2}", total_reward as f64 / count);
    println!("  Mean Moves: {:.1}", total_moves as f64 / count);
    println!("  Time: {:.3}s", secs);
    println!("  MPS: {:.0} moves/sec", total_moves as f64 / secs);
}

//! Plays a versus game between two tree search agents and prints the boards.

use std::error::Error;

use clap::Parser;
use colored::{ColoredString, Colorize};
use tracing::Level;
use tracing_subscriber::prelude::*;

use puyo::search::{TreeSearchAgent, TreeSearchConfig};
use puyo::{Game, VersusConfig, VersusState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rule set and board size
    #[arg(short, long, default_value = "small", value_parser = ["small", "wide", "tsu", "large"])]
    preset: String,

    /// Deal seed, random when omitted
    #[arg(short, long)]
    seed: Option<u64>,

    /// Stop after this many steps even without a winner
    #[arg(short, long, default_value_t = 500)]
    max_steps: usize,

    /// Override the search depth of the preset
    #[arg(short, long)]
    depth: Option<i32>,

    /// Only print the final boards
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    quiet: bool,

    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn cell_glyph(cell: Option<u8>, garbage: Option<u8>) -> ColoredString {
    match cell {
        None => ".".dimmed(),
        Some(c) if Some(c) == garbage => "#".white(),
        Some(0) => "R".red().bold(),
        Some(1) => "G".green().bold(),
        Some(2) => "Y".yellow().bold(),
        Some(3) => "B".blue().bold(),
        Some(4) => "P".magenta().bold(),
        Some(c) => c.to_string().cyan(),
    }
}

fn player_lines(player: &VersusState) -> Vec<String> {
    let state = player.state();
    let field = state.field();
    let garbage = field.garbage_layer().map(|layer| layer as u8);
    let cells = field.to_list();
    let skip = field.shape().height - state.height();
    let mut lines: Vec<String> = (skip..field.shape().height)
        .map(|y| {
            (0..state.width())
                .map(|x| format!("{} ", cell_glyph(cells[y * puyo_bits::WIDTH + x], garbage)))
                .collect()
        })
        .collect();
    let status = format!(
        "x{} c{} s{} p{} {}",
        player.chain_number(),
        player.chain_score(),
        player.step_score(),
        player.pending_garbage(),
        if player.all_clear_pending() { "!" } else { "" }
    );
    lines.push(format!("{:<width$}", status, width = 2 * state.width()));
    lines
}

fn print_game(game: &Game) {
    let columns: Vec<Vec<String>> = game.players().iter().map(player_lines).collect();
    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
    for row in 0..rows {
        let line: Vec<&str> = columns.iter().map(|lines| lines.get(row).map_or("", String::as_str)).collect();
        println!("{}", line.join("   "));
    }
    println!();
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(tracing_subscriber::filter::LevelFilter::from_level(level))
        .init();

    let config = VersusConfig::preset(&args.preset).ok_or_else(|| format!("unknown preset {}", args.preset))?;
    let mut search = TreeSearchConfig::preset(&args.preset).unwrap_or_default();
    if let Some(depth) = args.depth {
        search.depth = depth;
    }

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut game = Game::new(config, 2, Some(seed))?;
    tracing::info!(preset = %args.preset, seed, depth = search.depth, "starting game");

    let mut agents: Vec<TreeSearchAgent> =
        (0..game.players().len()).map(|i| TreeSearchAgent::new(search, seed.wrapping_add(i as u64))).collect();

    let mut outcome = None;
    let mut sent_total = 0;
    for step in 0..args.max_steps {
        let actions: Vec<_> = agents
            .iter_mut()
            .zip(game.players())
            .map(|(agent, player)| agent.get_action(player))
            .collect();
        let (result, sent, done) = game.step(&actions);
        sent_total += sent;
        if sent != 0 {
            tracing::info!(step, sent, "garbage exchanged");
        }
        if !args.quiet {
            print_game(&game);
        }
        if tracing::enabled!(Level::DEBUG) {
            let observation = serde_json::to_string(&game.encode())?;
            tracing::debug!(step, %observation, "players");
        }
        if done {
            outcome = Some(result);
            break;
        }
    }

    if args.quiet {
        print_game(&game);
    }
    match outcome {
        Some(1) => println!("{}", "Player 1 wins".green().bold()),
        Some(-1) => println!("{}", "Player 2 wins".red().bold()),
        Some(_) => println!("{}", "Draw".yellow().bold()),
        None => println!("No winner after {} steps", args.max_steps),
    }
    println!("Net garbage sent by player 1: {}", sent_total);
    Ok(())
}

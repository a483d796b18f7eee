use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mdp_solvers::world::{GridWorld, DEFAULT_MAP};
use mdp_solvers::{q_value_iteration, value_iteration, Guide, PolicyExecutor, SolverConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TableChoice {
    /// Value iteration, then execute the greedy policy from V
    V,
    /// Q-value iteration, then execute the greedy policy from Q
    Q,
    /// Both, one after the other
    Both,
    /// No solver; every action is typed in by hand
    Manual,
}

/// Solve a grid world with dynamic programming and step through the greedy policy.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Map file (`#` wall, `.` floor, `S` start, `G` goal). Uses a built-in map if omitted.
    #[arg(long)]
    map: Option<PathBuf>,

    /// Discount factor, in (0, 1]
    #[arg(long, default_value_t = 1.0)]
    gamma: f64,

    /// Convergence threshold
    #[arg(long, default_value_t = 0.001)]
    theta: f64,

    /// Sweep ceiling; 0 sweeps until convergence with no limit
    #[arg(long, default_value_t = 10_000)]
    max_sweeps: usize,

    #[arg(long, value_enum, default_value_t = TableChoice::Both)]
    table: TableChoice,
}

fn pause(message: &str) -> Result<()> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(())
}

/// Stdin is locked only for the duration of one session so `pause` can read it too.
fn execute(world: &mut GridWorld, guide: Guide<'_>) -> Result<()> {
    let steps = PolicyExecutor::new(io::stdin().lock(), io::stdout()).run(world, guide)?;
    println!("Session finished after {steps} steps");
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let mut world = match &args.map {
        Some(path) => GridWorld::load(path)
            .with_context(|| format!("loading map {}", path.display()))?,
        None => GridWorld::parse(DEFAULT_MAP)?,
    };

    let config = SolverConfig::new(args.gamma, args.theta);
    let config = if args.max_sweeps == 0 {
        config.unbounded()
    } else {
        config.with_max_sweeps(args.max_sweeps)
    };

    if matches!(args.table, TableChoice::V | TableChoice::Both) {
        pause("Press enter to run value iteration")?;
        println!("Starting Value Iteration (VI)");
        let v = value_iteration(&world, &config).context("value iteration")?;
        println!("Converged after {} sweeps", v.sweeps());
        pause("Press enter to start execution of optimal policy according to V")?;
        execute(&mut world, Guide::from(&v))?;
    }

    if matches!(args.table, TableChoice::Q | TableChoice::Both) {
        pause("Press enter to run Q-value iteration")?;
        println!("Starting Q-value Iteration (QI)");
        let q = q_value_iteration(&world, &config).context("Q-value iteration")?;
        println!("Converged after {} sweeps", q.sweeps());
        pause("Press enter to start execution of optimal policy according to Q")?;
        execute(&mut world, Guide::from(&q))?;
    }

    if args.table == TableChoice::Manual {
        execute(&mut world, Guide::Manual)?;
    }

    Ok(())
}

//! Promissory CLI
//!
//! Runs promise scenarios on a fresh event loop and prints their outcomes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use promissory::{EventLoop, EventLoopConfig, Promise, SettledOutcome, Value, VERSION};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "promissory")]
#[command(author, version, about = "Promises/A+ deferred values on a FIFO task queue", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Maximum microtasks drained per event loop tick
    #[arg(long, value_name = "N", default_value_t = 10_000, global = true)]
    microtask_budget: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the canonical promise scenarios and print their outcomes
    Scenarios {
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },

    /// Build a chain of `then` hops and report the final outcome
    Chain {
        /// Number of `then` hops
        #[arg(short, long, default_value_t = 1000)]
        depth: u32,
        /// Start from a rejected promise instead of a fulfilled one
        #[arg(long)]
        reject: bool,
        /// Print a JSON report instead of text
        #[arg(long)]
        json: bool,
    },
}

/// Outcome of one scenario; `None` if it never settled
#[derive(Serialize)]
struct ScenarioReport {
    name: &'static str,
    outcome: Option<SettledOutcome>,
}

#[derive(Serialize)]
struct ChainReport {
    depth: u32,
    outcome: Option<SettledOutcome>,
    stats: promissory::event_loop::EventLoopStats,
}

type Scenario = fn(&EventLoop) -> Promise;

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    tracing::info!(version = VERSION, "promissory starting");

    let config = EventLoopConfig {
        microtask_budget: cli.microtask_budget.max(1),
    };

    match cli.command {
        Commands::Scenarios { json } => run_scenarios(config, json),
        Commands::Chain {
            depth,
            reject,
            json,
        } => run_chain(config, depth, reject, json),
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn scenarios() -> Vec<(&'static str, Scenario)> {
    vec![
        ("then adds one", scenario_then as Scenario),
        ("catch recovers", scenario_catch),
        ("all keeps order", scenario_all),
        ("race picks fastest", scenario_race),
        ("all settled", scenario_all_settled),
    ]
}

fn scenario_then(el: &EventLoop) -> Promise {
    Promise::new(&el.scheduler(), |resolve, _| {
        resolve.call(1);
        Ok(())
    })
    .then(|v| Ok(Value::from(v.as_number().unwrap_or(f64::NAN) + 1.0)))
}

fn scenario_catch(el: &EventLoop) -> Promise {
    Promise::new(&el.scheduler(), |_, reject| {
        reject.call("E");
        Ok(())
    })
    .catch(Ok)
}

fn scenario_all(el: &EventLoop) -> Promise {
    let scheduler = el.scheduler();
    Promise::all(
        &scheduler,
        vec![Promise::resolve(&scheduler, 1), Promise::resolve(&scheduler, 2)],
    )
}

fn scenario_race(el: &EventLoop) -> Promise {
    let scheduler = el.scheduler();
    let delayed = |delay: u64, value: i32| {
        let timers = el.clone();
        Promise::new(&scheduler, move |resolve, _| {
            timers.set_timeout(delay, move || resolve.call(value));
            Ok(())
        })
    };
    Promise::race(&scheduler, vec![delayed(100, 1), delayed(10, 2)])
}

fn scenario_all_settled(el: &EventLoop) -> Promise {
    let scheduler = el.scheduler();
    Promise::all_settled(
        &scheduler,
        vec![Promise::resolve(&scheduler, 1), Promise::reject(&scheduler, "E")],
    )
}

fn run_scenarios(config: EventLoopConfig, json: bool) -> Result<()> {
    let mut reports = Vec::new();
    for (name, scenario) in scenarios() {
        let el = EventLoop::with_config(config.clone());
        let promise = scenario(&el);
        let run = el.run_to_completion();
        tracing::debug!(scenario = name, microtasks = run.microtasks_processed, "scenario finished");
        reports.push(ScenarioReport {
            name,
            outcome: promise.outcome(),
        });
    }

    if json {
        let out = serde_json::to_string_pretty(&reports).context("failed to serialize scenario report")?;
        println!("{}", out);
        return Ok(());
    }

    for report in &reports {
        println!("{:<20} {}", report.name, describe(report.outcome.as_ref())?);
    }
    Ok(())
}

fn run_chain(config: EventLoopConfig, depth: u32, reject: bool, json: bool) -> Result<()> {
    let el = EventLoop::with_config(config);
    let scheduler = el.scheduler();

    let mut promise = if reject {
        Promise::reject(&scheduler, "E")
    } else {
        Promise::resolve(&scheduler, 0)
    };
    for _ in 0..depth {
        promise = promise.then(|v| Ok(Value::from(v.as_number().unwrap_or(0.0) + 1.0)));
    }
    el.run_to_completion();

    let report = ChainReport {
        depth,
        outcome: promise.outcome(),
        stats: el.stats(),
    };

    if json {
        let out = serde_json::to_string_pretty(&report).context("failed to serialize chain report")?;
        println!("{}", out);
        return Ok(());
    }

    println!("depth:      {}", report.depth);
    println!("outcome:    {}", describe(report.outcome.as_ref())?);
    println!("microtasks: {}", report.stats.total_microtasks);
    println!("ticks:      {}", report.stats.total_ticks);
    Ok(())
}

fn describe(outcome: Option<&SettledOutcome>) -> Result<String> {
    let Some(outcome) = outcome else {
        return Ok("pending".to_string());
    };
    let status = if outcome.is_fulfilled() { "fulfilled" } else { "rejected" };
    let value = serde_json::to_string(outcome.value()).context("failed to serialize value")?;
    Ok(format!("{} {}", status, value))
}

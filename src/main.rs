//! paramate - parallel helpmate solving harness.

use std::io;
use std::time::Duration;

use clap::Parser;
use owo_colors::{OwoColorize, Stream::Stderr};

use paramate::cli::Cli;
use paramate::engine::SweepEngine;
use paramate::error::Result;
use paramate::logging::{self, parse_level, LogConfig};
use paramate::parallel::worker::solve_with_protocol;
use paramate::parallel::{
    run_probe, run_rebalance, Pool, PoolOptions, ProbeOptions, RebalanceOptions, WorkerSetup,
};

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = run(&cli) {
        eprintln!(
            "{}: {}",
            "error"
                .if_supports_color(Stderr, |text| text.red())
                .if_supports_color(Stderr, |text| text.bold()),
            e
        );
        let mut source = std::error::Error::source(&e);
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn init_logging(cli: &Cli) {
    let mut config = LogConfig::default();
    if let Some(level) = cli.log_level.as_deref().and_then(parse_level) {
        config = config.with_level(level);
    }
    if let Some(format) = cli.log_format.as_deref().and_then(|s| s.parse().ok()) {
        config = config.with_format(format);
    }
    if let Some(path) = &cli.log_file {
        config = config.with_file(path.clone());
    }
    logging::init(config.with_env_overrides());
}

fn run(cli: &Cli) -> Result<()> {
    let mut engine = SweepEngine::new(cli.moves_per_target);
    let order = cli.partition_order;

    if let Some(secs) = cli.probe {
        let workers = require_pool_size(cli)?;
        run_probe(
            &ProbeOptions {
                workers,
                timeout: Duration::from_secs(secs),
            },
            &mut engine,
        )?;
        return Ok(());
    }

    if let Some(secs) = cli.rebalance {
        let workers = require_pool_size(cli)?;
        run_rebalance(
            &RebalanceOptions {
                workers,
                order,
                solution_cap: cli.max_solutions,
                show_move_numbers: cli.move_numbers,
                timeout: Duration::from_secs(secs),
            },
            &mut engine,
        )?;
        return Ok(());
    }

    if let Some(workers) = cli.first_move_queue {
        let mut pool = Pool::new(
            PoolOptions {
                workers,
                order,
                solution_cap: cli.max_solutions,
                show_move_numbers: cli.move_numbers,
            },
            io::stdout(),
        );
        pool.run_queue(cli.resolve_partition()?, &mut engine)?;
        return Ok(());
    }

    if let Some(workers) = cli.parallel {
        let mut pool = Pool::new(
            PoolOptions {
                workers,
                order,
                solution_cap: cli.max_solutions,
                show_move_numbers: cli.move_numbers,
            },
            io::stdout(),
        );
        pool.run(&mut engine)?;
        return Ok(());
    }

    // Standalone run: a single in-process solve, with the structured
    // protocol on stderr when running under an external coordinator.
    let setup = WorkerSetup {
        id: 1,
        order,
        partition: cli.resolve_partition()?,
        first_move: cli.resolve_first_move(),
        queue_path: None,
    };
    solve_with_protocol(&setup, &mut engine, cli.worker)
}

fn require_pool_size(cli: &Cli) -> Result<u32> {
    cli.parallel.ok_or_else(|| {
        paramate::error::Error::Worker(
            "probe/rebalance modes need a pool size; pass --parallel N".into(),
        )
    })
}

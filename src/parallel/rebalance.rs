//! Rebalance mode: redistribute heavy outliers onto idle workers.
//!
//! The run starts exactly like normal mode. Once the watch timeout passes
//! with stragglers still going, each free slot (a finished worker) is
//! refilled with a helper aimed at one straggler's combo, the helpers for a
//! given combo splitting its first moves statically among themselves. The
//! original workers keep running, so overlapping helpers can produce
//! duplicate solutions; that is the accepted trade-off for not preempting
//! in-flight work.
//!
//! Phases: `InitialPool -> Watchful (t >= T) -> Rebalanced -> Draining ->
//! Done`. Helpers are only created in the watchful window.

use std::collections::HashMap;
use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::Result;
use crate::partition::first_move::FirstMoveFilter;
use crate::partition::{ComboPartition, PartitionOrder};

use super::coordinator::{
    install_signal_handlers, reraise_if_interrupted, LoopExit, Pool, PoolOptions, Spawned,
};
use super::worker::{run_worker, WorkerSetup};

/// Rebalance configuration.
#[derive(Debug, Clone)]
pub struct RebalanceOptions {
    pub workers: u32,
    pub order: PartitionOrder,
    pub solution_cap: Option<u32>,
    pub show_move_numbers: bool,
    /// How long the initial pool runs before helpers are considered.
    pub timeout: Duration,
}

/// Coordinator phases of a rebalance run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    InitialPool,
    Watchful,
    Rebalanced,
    Draining,
    Done,
}

/// One helper assignment produced by [`plan_helpers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct HelperPlan {
    /// Combo index the helper is restricted to.
    pub combo: u32,
    /// This helper's position among the helpers on the same combo.
    pub ordinal: u32,
    /// Total helpers on that combo (the first-move partition divisor).
    pub group_size: u32,
}

/// Distribute `free_slots` helpers round-robin over the still-running
/// combos, then split each combo's first moves evenly among its helpers.
pub(crate) fn plan_helpers(free_slots: usize, running: &[u32]) -> Vec<HelperPlan> {
    if free_slots == 0 || running.is_empty() {
        return Vec::new();
    }

    let targets: Vec<u32> = (0..free_slots).map(|j| running[j % running.len()]).collect();

    let mut group_size: HashMap<u32, u32> = HashMap::new();
    for &combo in &targets {
        *group_size.entry(combo).or_insert(0) += 1;
    }

    let mut next_ordinal: HashMap<u32, u32> = HashMap::new();
    targets
        .into_iter()
        .map(|combo| {
            let ordinal = next_ordinal.entry(combo).or_insert(0);
            let plan = HelperPlan {
                combo,
                ordinal: *ordinal,
                group_size: group_size[&combo],
            };
            *ordinal += 1;
            plan
        })
        .collect()
}

/// Run rebalance mode. Returns `true` in the coordinating parent; forked
/// children (initial workers and helpers alike) never return.
pub fn run_rebalance<E: Engine>(options: &RebalanceOptions, engine: &mut E) -> Result<bool> {
    install_signal_handlers();
    let mut pool = Pool::new(
        PoolOptions {
            workers: options.workers,
            order: options.order,
            solution_cap: options.solution_cap,
            show_move_numbers: options.show_move_numbers,
        },
        io::stdout(),
    );
    let n = pool.requested();
    eprintln!(
        "\nUsing {} parallel workers (partition order: {}, rebalance after {}s)",
        n,
        options.order,
        options.timeout.as_secs()
    );

    let mut phase = Phase::InitialPool;
    debug!(?phase, workers = n, "pool starting");
    let setups = pool.strided_setups(n)?;
    if let Some(setup) = pool.spawn_pool(setups)? {
        run_worker(setup, engine);
    }
    pool.warn_short_pool();

    let deadline = Instant::now() + options.timeout;
    let exit = pool.multiplex_until(Some(deadline))?;

    if exit == LoopExit::Deadline {
        phase = Phase::Watchful;
        debug!(?phase, "watch timeout reached");

        let free_slots = pool.finished_count();
        let running = pool.running_combo_indices();
        let plans = plan_helpers(free_slots, &running);
        if !plans.is_empty() {
            eprintln!(
                "\n[rebalance: {} helpers onto {} heavy combos]",
                plans.len(),
                running.len().min(plans.len())
            );
        }

        let mut next_id = n;
        for plan in plans {
            next_id += 1;
            let setup = WorkerSetup {
                id: next_id,
                order: options.order,
                partition: ComboPartition::single(plan.combo)?,
                first_move: Some(FirstMoveFilter::Static {
                    index: plan.ordinal,
                    total: plan.group_size,
                }),
                queue_path: None,
            };
            match pool.spawn_worker(setup) {
                Ok(Spawned::Parent) => {}
                Ok(Spawned::Child(setup)) => run_worker(setup, engine),
                Err(e) => warn!(helper = next_id, error = %e, "failed to start helper"),
            }
        }

        phase = Phase::Rebalanced;
        debug!(?phase, "helper window closed");
        pool.multiplex_until(None)?;
    }

    phase = Phase::Draining;
    debug!(?phase, "draining");
    pool.drain()?;
    phase = Phase::Done;
    debug!(?phase, solutions = pool.solutions_found(), "rebalance complete");
    reraise_if_interrupted();
    Ok(true)
}

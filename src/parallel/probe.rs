//! Probe mode: discover heavy combos by cycling partition orders.
//!
//! Each of the six orders gets a bounded phase: fork the pool, multiplex
//! until the timeout, then record the combo every still-running worker is
//! stuck on, SIGTERM the pool and reap it. Combos that fail to finish under
//! several orders are genuinely heavy (not an artefact of one clustering),
//! which is what the final summary ranks by.

use std::io;
use std::time::{Duration, Instant};

use crate::engine::Engine;
use crate::error::Result;
use crate::partition::{PartitionOrder, COMBO_COUNT};

use super::coordinator::{
    install_signal_handlers, interrupted, leading_number, reraise_if_interrupted, LoopExit, Pool,
    PoolOptions,
};
use super::worker::run_worker;

/// Upper bound on tracked heavy combos.
pub const MAX_HEAVY_COMBOS: usize = 256;

/// One combo that failed to complete within a probe phase's timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeavyCombo {
    /// The worker's combo label at timeout, e.g.
    /// `30212 king=c8 checker=Pd6 checksq=d7`.
    pub label: String,
    /// How many phase observations saw this combo still running.
    pub seen_count: u32,
    /// Deepest `m*100+k` any observation had reached.
    pub max_depth: u32,
}

/// Heavy-combo accumulator, keyed by the leading integer of the label and
/// capped at [`MAX_HEAVY_COMBOS`] entries.
#[derive(Debug, Default)]
pub struct HeavyComboTable {
    entries: Vec<HeavyCombo>,
}

impl HeavyComboTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one observation. A label with the same leading combo number as
    /// an existing entry merges into it; new entries past the cap are
    /// dropped.
    pub fn record(&mut self, label: &str, depth: u32) {
        let combo = leading_number(label);
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| leading_number(&e.label) == combo)
        {
            entry.seen_count += 1;
            if depth > entry.max_depth {
                entry.max_depth = depth;
            }
            return;
        }
        if self.entries.len() < MAX_HEAVY_COMBOS {
            self.entries.push(HeavyCombo {
                label: label.to_string(),
                seen_count: 1,
                max_depth: depth,
            });
        }
    }

    /// Entries sorted by `seen_count` descending (stable within ties).
    pub fn into_sorted(mut self) -> Vec<HeavyCombo> {
        self.entries
            .sort_by(|a, b| b.seen_count.cmp(&a.seen_count));
        self.entries
    }
}

/// Probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    pub workers: u32,
    /// Per-order phase timeout.
    pub timeout: Duration,
}

/// Run the probe cycle. Returns `true` in the coordinating parent; forked
/// children never return.
pub fn run_probe<E: Engine>(options: &ProbeOptions, engine: &mut E) -> Result<bool> {
    install_signal_handlers();
    eprintln!("\n=== PROBE MODE ===");
    eprintln!(
        "Workers: {}, Timeout per order: {}s\n",
        options.workers,
        options.timeout.as_secs()
    );

    let mut heavy = HeavyComboTable::new();

    for order in PartitionOrder::ALL {
        if interrupted() {
            break;
        }
        eprintln!(
            "  Probing with partition order '{}' (timeout {}s)...",
            order,
            options.timeout.as_secs()
        );

        let phase_start = Instant::now();
        let mut pool = Pool::new(
            PoolOptions {
                workers: options.workers,
                order,
                solution_cap: None,
                show_move_numbers: false,
            },
            io::stdout(),
        );
        let setups = pool.strided_setups(pool.requested())?;
        if let Some(setup) = pool.spawn_pool(setups)? {
            run_worker(setup, engine);
        }
        pool.warn_short_pool();

        let exit = pool.multiplex_until(Some(phase_start + options.timeout))?;
        if exit == LoopExit::Deadline {
            for slot in &pool.slots {
                if !slot.is_finished() && !slot.current_combo().is_empty() {
                    heavy.record(slot.current_combo(), slot.last_depth());
                }
            }
        }
        let completed = pool.finished_count();
        pool.kill_all();
        pool.drain()?;

        eprintln!(
            "    Completed: {} workers, still running at timeout: {} ({:.1}s)",
            completed,
            pool.requested() as usize - completed,
            phase_start.elapsed().as_secs_f64()
        );
    }

    print_summary(heavy);
    reraise_if_interrupted();
    Ok(true)
}

fn print_summary(heavy: HeavyComboTable) {
    eprintln!("\n=== PROBE SUMMARY ===");
    eprintln!("Total combos: {}", COMBO_COUNT);
    eprintln!("Heavy combos identified: {}\n", heavy.len());

    if heavy.is_empty() {
        eprintln!("(No heavy combos found - all work completed quickly)");
    } else {
        for entry in heavy.into_sorted() {
            eprintln!(
                "HEAVY {} (seen {} times, max depth {}+{})",
                entry.label,
                entry.seen_count,
                entry.max_depth / 100,
                entry.max_depth % 100
            );
        }
    }
    eprintln!();
}

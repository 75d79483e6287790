//! Post-fork worker runtime.
//!
//! By the time control reaches [`run_worker`] the child's stdout and stderr
//! already point into the coordinator pipe and its signal dispositions are
//! back to the defaults, so SIGTERM kills it promptly; process exit reclaims
//! the solver's hash/arena state, no clean shutdown is attempted.

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug;

use super::emitter::Emitter;
use super::queue::WorkQueue;
use crate::engine::{Engine, SolveContext};
use crate::error::Result;
use crate::partition::first_move::{FirstMoveFilter, FirstMoveState};
use crate::partition::{ComboPartition, PartitionOrder};

/// Everything a worker needs to know, materialised in the child after fork
/// (or built from CLI flags in standalone `--worker` mode).
#[derive(Debug, Clone)]
pub struct WorkerSetup {
    /// 1-based partition id, used in labels and status lines.
    pub id: u32,
    pub order: PartitionOrder,
    pub partition: ComboPartition,
    /// Static ply-1 filter, if configured.
    pub first_move: Option<FirstMoveFilter>,
    /// Path of the shared counter file; presence selects queue mode.
    pub queue_path: Option<PathBuf>,
}

/// Resolve the ply-1 filter, acquiring a queue index when in queue mode.
///
/// Queue I/O failure is survivable: the worker falls back to an unfiltered
/// search (slow but correct) and says so with a `DEBUG` record.
fn resolve_first_move<W: Write>(
    setup: &WorkerSetup,
    emitter: &mut Emitter<W>,
) -> FirstMoveState {
    let path = match &setup.queue_path {
        Some(path) => path,
        None => {
            return match setup.first_move {
                Some(filter) => FirstMoveState::new(filter),
                None => FirstMoveState::unfiltered(),
            };
        }
    };

    let acquired = WorkQueue::open(path).and_then(|mut queue| {
        let index = queue.acquire_worker_index()?;
        let total = queue.read_total()?;
        Ok((index, total))
    });

    match acquired {
        Ok((index, total)) if total > 0 && index < total => {
            let _ = emitter.debug(&format!("queue worker {}/{}", index, total));
            FirstMoveState::new(FirstMoveFilter::Rotation {
                self_index: index,
                total,
            })
        }
        Ok((index, total)) => {
            let _ = emitter.debug(&format!(
                "queue assignment {}/{} unusable; searching unfiltered",
                index, total
            ));
            FirstMoveState::unfiltered()
        }
        Err(e) => {
            let _ = emitter.debug(&format!("work queue unavailable ({}); searching unfiltered", e));
            FirstMoveState::unfiltered()
        }
    }
}

/// Drive the engine over this worker's share of the search space, framed by
/// the protocol lifecycle records. With `protocol` false every record is
/// suppressed (plain, non-worker runs).
pub fn solve_with_protocol<E: Engine>(
    setup: &WorkerSetup,
    engine: &mut E,
    protocol: bool,
) -> Result<()> {
    let started = Instant::now();
    let mut stderr = io::stderr();
    let sink: &mut dyn Write = &mut stderr;
    let mut emitter = Emitter::new(sink, protocol);

    let _ = emitter.debug(&format!("worker {} started", setup.id));
    let first_move = resolve_first_move(setup, &mut emitter);

    let mut ctx = SolveContext::new(setup.order, setup.partition, first_move, emitter);
    let _ = ctx.emitter().ready();
    let _ = ctx.emitter().solving();
    let outcome = engine.solve(&mut ctx);
    match outcome {
        Ok(()) => {
            let _ = ctx.emitter().time(started.elapsed().as_secs_f64());
            let _ = ctx.emitter().finished();
            Ok(())
        }
        Err(e) => {
            let _ = ctx.emitter().error(&e.to_string());
            Err(e)
        }
    }
}

/// Forked-child entry point: solve, then exit without returning to the
/// coordinator's stack. The coordinator never inspects the exit status; the
/// pipe-EOF/`waitpid` pair is authoritative.
pub fn run_worker<E: Engine>(setup: WorkerSetup, engine: &mut E) -> ! {
    debug!(worker = setup.id, "forked worker running");
    let code = match solve_with_protocol(&setup, engine, true) {
        Ok(()) => 0,
        Err(_) => 1,
    };
    std::process::exit(code);
}

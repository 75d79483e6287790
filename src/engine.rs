//! The seam between the coordination layer and the solver proper.
//!
//! The solver is an external collaborator; this crate only depends on the
//! three hooks it exposes: a combo-space iterator that honours a partition
//! predicate, a first-move filter at forward-search ply 1, and a protocol
//! emitter. [`SolveContext`] packages those hooks and an [`Engine`] drives
//! them to completion inside a worker process.
//!
//! [`SweepEngine`] is the built-in harness implementation: it walks the combo
//! space, exercises the predicate and ply-1 filter, and emits protocol
//! records, without doing any chess search. The binary and the end-to-end
//! tests run on it.

use std::io::Write;

use crate::error::Result;
use crate::parallel::emitter::Emitter;
use crate::partition::first_move::FirstMoveState;
use crate::partition::{ComboPartition, PartitionOrder, COMBO_COUNT};

/// Everything a worker hands its engine: the partition predicate, the ply-1
/// filter, and the protocol emitter.
pub struct SolveContext<'a> {
    order: PartitionOrder,
    partition: ComboPartition,
    first_move: FirstMoveState,
    emitter: Emitter<&'a mut dyn Write>,
}

impl<'a> SolveContext<'a> {
    pub fn new(
        order: PartitionOrder,
        partition: ComboPartition,
        first_move: FirstMoveState,
        emitter: Emitter<&'a mut dyn Write>,
    ) -> Self {
        Self { order, partition, first_move, emitter }
    }

    pub fn order(&self) -> PartitionOrder {
        self.order
    }

    /// The combo predicate. Deterministic and side-effect free.
    pub fn in_partition(&self, king: u32, checker: u32, check_sq: u32) -> bool {
        self.partition.contains(self.order, king, checker, check_sq)
    }

    pub fn combo_index(&self, king: u32, checker: u32, check_sq: u32) -> u32 {
        self.order.index(king, checker, check_sq)
    }

    /// The ply-1 filter for the next target position. Each call consumes one
    /// target ordinal.
    pub fn filter_first_moves<T: Clone>(&mut self, moves: &[T]) -> Vec<T> {
        self.first_move.filter_moves(moves)
    }

    pub fn emitter(&mut self) -> &mut Emitter<&'a mut dyn Write> {
        &mut self.emitter
    }
}

/// A solver driven by the coordination layer.
pub trait Engine {
    /// Solve to completion over the combos the context's partition owns.
    fn solve(&mut self, ctx: &mut SolveContext<'_>) -> Result<()>;
}

/// Algebraic name of a board square index in `[0, 64)`.
fn square_name(sq: u32) -> String {
    let file = (b'a' + (sq % 8) as u8) as char;
    let rank = (b'1' + (sq / 8) as u8) as char;
    format!("{}{}", file, rank)
}

/// Combo-sweep harness engine.
///
/// Visits every combo the partition owns in index order, announces each with
/// a `COMBO` record, runs the ply-1 filter over a nominal move list per
/// combo, and reports totals as `PROGRESS` records at depths `1+0` (combos
/// visited) and `1+1` (first moves kept).
pub struct SweepEngine {
    moves_per_target: u32,
}

impl SweepEngine {
    pub fn new(moves_per_target: u32) -> Self {
        Self { moves_per_target }
    }
}

impl Default for SweepEngine {
    fn default() -> Self {
        Self::new(8)
    }
}

impl Engine for SweepEngine {
    fn solve(&mut self, ctx: &mut SolveContext<'_>) -> Result<()> {
        let moves: Vec<u32> = (0..self.moves_per_target).collect();
        let mut visited: u64 = 0;
        let mut kept: u64 = 0;

        for index in 0..COMBO_COUNT {
            let (king, checker, check_sq) = ctx.order().decompose(index);
            if !ctx.in_partition(king, checker, check_sq) {
                continue;
            }
            visited += 1;
            let label = format!(
                "{} king={} checker={} checksq={}",
                index,
                square_name(king),
                checker,
                square_name(check_sq)
            );
            ctx.emitter().combo(&label)?;
            kept += ctx.filter_first_moves(&moves).len() as u64;
        }

        ctx.emitter().progress(1, 0, visited)?;
        ctx.emitter().progress(1, 1, kept)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::first_move::{FirstMoveFilter, FirstMoveState};

    fn run_sweep(
        partition: ComboPartition,
        first_move: FirstMoveState,
        moves_per_target: u32,
    ) -> String {
        let mut out = Vec::new();
        {
            let sink: &mut dyn Write = &mut out;
            let mut ctx = SolveContext::new(
                PartitionOrder::default(),
                partition,
                first_move,
                Emitter::new(sink, true),
            );
            SweepEngine::new(moves_per_target).solve(&mut ctx).unwrap();
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_single_combo_sweep() {
        let out = run_sweep(
            ComboPartition::single(30212).unwrap(),
            FirstMoveState::unfiltered(),
            4,
        );
        assert!(out.contains("@@COMBO:30212 "));
        assert!(out.contains("@@PROGRESS:1+0:1\n"));
        assert!(out.contains("@@PROGRESS:1+1:4\n"));
    }

    #[test]
    fn test_strided_sweep_visits_its_share() {
        let out = run_sweep(
            ComboPartition::simple(1, 64).unwrap(),
            FirstMoveState::unfiltered(),
            1,
        );
        let expected = COMBO_COUNT / 64;
        assert!(out.contains(&format!("@@PROGRESS:1+0:{}\n", expected)));
    }

    #[test]
    fn test_first_move_filter_reduces_kept_moves() {
        let out = run_sweep(
            ComboPartition::single(7).unwrap(),
            FirstMoveState::new(FirstMoveFilter::Static { index: 0, total: 4 }),
            8,
        );
        // 8 moves, every 4th kept.
        assert!(out.contains("@@PROGRESS:1+1:2\n"));
    }

    #[test]
    fn test_square_name() {
        assert_eq!(square_name(0), "a1");
        assert_eq!(square_name(7), "h1");
        assert_eq!(square_name(63), "h8");
        assert_eq!(square_name(26), "c4");
    }
}

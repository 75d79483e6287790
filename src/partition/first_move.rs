//! Ply-1 first-move filtering.
//!
//! At ply 1 of the forward solve the engine generates an ordered list of
//! candidate first moves. A worker may narrow that list by either a static
//! modulo rule or, in work-queue mode, a rotation rule that shifts the
//! assignment at every target position so the cost of any individual
//! expensive move is spread over all workers.

/// Which moves a worker owns at ply 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstMoveFilter {
    /// Keep `move_idx` iff `move_idx % total == index`.
    Static { index: u32, total: u32 },
    /// Keep `move_idx` at the k-th target iff
    /// `(move_idx + k) % total == self_index`.
    ///
    /// Full coverage of the move list holds only summed over `total`
    /// consecutive targets; when the engine emits fewer targets than workers,
    /// some moves of a given target are never explored. The host tolerates
    /// this; use [`FirstMoveFilter::Static`] when per-target coverage must be
    /// exact.
    Rotation { self_index: u32, total: u32 },
}

impl FirstMoveFilter {
    /// Whether this worker owns `move_idx` at the given target ordinal.
    /// The ordinal is ignored by the static rule.
    pub fn keeps(&self, move_idx: usize, target_ordinal: u64) -> bool {
        match *self {
            FirstMoveFilter::Static { index, total } => {
                move_idx as u64 % total as u64 == index as u64
            }
            FirstMoveFilter::Rotation { self_index, total } => {
                (move_idx as u64 + target_ordinal % total as u64) % total as u64
                    == self_index as u64
            }
        }
    }

    /// Pure form of the filter: the sub-list of `moves` this worker owns at
    /// `target_ordinal`.
    pub fn filter_at<T: Clone>(&self, moves: &[T], target_ordinal: u64) -> Vec<T> {
        moves
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.keeps(*idx, target_ordinal))
            .map(|(_, m)| m.clone())
            .collect()
    }
}

/// Per-worker filtering state: the configured rule plus the running target
/// counter the rotation rule keys off, and the first-move count recorded the
/// first time the filter runs (diagnostics).
#[derive(Debug, Default)]
pub struct FirstMoveState {
    filter: Option<FirstMoveFilter>,
    targets_seen: u64,
    total_first_moves: Option<u32>,
}

impl FirstMoveState {
    /// No filtering: every move is kept. Also the fallback when work-queue
    /// I/O fails (slow but correct).
    pub fn unfiltered() -> Self {
        Self::default()
    }

    pub fn new(filter: FirstMoveFilter) -> Self {
        Self {
            filter: Some(filter),
            targets_seen: 0,
            total_first_moves: None,
        }
    }

    pub fn filter(&self) -> Option<FirstMoveFilter> {
        self.filter
    }

    /// Number of first moves seen on the first invocation, once known.
    pub fn total_first_moves(&self) -> Option<u32> {
        self.total_first_moves
    }

    /// Filter the ply-1 move list for the next target position.
    ///
    /// Each call consumes one target ordinal, so the rotation advances even
    /// for targets where the result happens to be empty.
    pub fn filter_moves<T: Clone>(&mut self, moves: &[T]) -> Vec<T> {
        if self.total_first_moves.is_none() {
            self.total_first_moves = Some(moves.len() as u32);
        }
        let ordinal = self.targets_seen;
        self.targets_seen += 1;
        match self.filter {
            None => moves.to_vec(),
            Some(f) => f.filter_at(moves, ordinal),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// R2: the static rule splits `[0, M*Q)` into M disjoint sets of Q.
    #[test]
    fn test_static_partition_is_exact() {
        let m = 4;
        let q = 6;
        let moves: Vec<u32> = (0..m * q).collect();

        let mut union = Vec::new();
        for index in 0..m {
            let f = FirstMoveFilter::Static { index, total: m };
            let kept = f.filter_at(&moves, 0);
            assert_eq!(kept.len(), q as usize);
            union.extend(kept);
        }
        union.sort_unstable();
        assert_eq!(union, moves);
    }

    /// Spec scenario: W=3, self-index 1, targets 0..3, moves [A..F].
    #[test]
    fn test_rotation_per_target() {
        let f = FirstMoveFilter::Rotation { self_index: 1, total: 3 };
        let moves = ['A', 'B', 'C', 'D', 'E', 'F'];

        assert_eq!(f.filter_at(&moves, 0), vec!['B', 'E']);
        assert_eq!(f.filter_at(&moves, 1), vec!['A', 'D']);
        assert_eq!(f.filter_at(&moves, 2), vec!['C', 'F']);
    }

    /// At any single target ordinal the rotation is a disjoint exact cover.
    #[test]
    fn test_rotation_covers_each_target() {
        let total = 5;
        let moves: Vec<u32> = (0..17).collect();
        for target in 0..7u64 {
            let mut union = Vec::new();
            for self_index in 0..total {
                let f = FirstMoveFilter::Rotation { self_index, total };
                union.extend(f.filter_at(&moves, target));
            }
            union.sort_unstable();
            assert_eq!(union, moves, "target {}", target);
        }
    }

    #[test]
    fn test_state_advances_target_ordinal() {
        let mut state = FirstMoveState::new(FirstMoveFilter::Rotation {
            self_index: 1,
            total: 3,
        });
        let moves = ['A', 'B', 'C', 'D', 'E', 'F'];
        assert_eq!(state.filter_moves(&moves), vec!['B', 'E']);
        assert_eq!(state.filter_moves(&moves), vec!['A', 'D']);
        assert_eq!(state.filter_moves(&moves), vec!['C', 'F']);
        // Wraps around after `total` targets.
        assert_eq!(state.filter_moves(&moves), vec!['B', 'E']);
    }

    #[test]
    fn test_unfiltered_keeps_everything() {
        let mut state = FirstMoveState::unfiltered();
        let moves = [10, 20, 30];
        assert_eq!(state.filter_moves(&moves), vec![10, 20, 30]);
        assert_eq!(state.total_first_moves(), Some(3));
    }

    #[test]
    fn test_first_move_count_recorded_once() {
        let mut state = FirstMoveState::new(FirstMoveFilter::Static { index: 0, total: 2 });
        state.filter_moves(&[1, 2, 3, 4]);
        state.filter_moves(&[1, 2]);
        assert_eq!(state.total_first_moves(), Some(4));
    }
}

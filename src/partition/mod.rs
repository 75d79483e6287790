//! Combo-space partitioning for intelligent-mode search.
//!
//! The intelligent-mode search space is the Cartesian product of a black king
//! square, a checking piece and a check square:
//!
//! ```text
//!   king_square (64) x checker_piece (15) x check_square (64) = 61,440 combos
//! ```
//!
//! A combo is identified by a scalar index computed from a three-letter
//! partition order (a permutation of `k`, `p`, `c`) naming which dimension
//! varies fastest. Different orderings cluster heavy combos differently
//! across workers; `kpc` (king fastest) is the default because it makes
//! progress visible across all king squares early in the search.
//!
//! Workers hold a [`ComboPartition`] predicate over this index space; the
//! ply-1 first-move filters live in [`first_move`].

pub mod first_move;

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Number of king squares.
pub const KING_CARD: u32 = 64;
/// Number of checking-piece slots.
pub const CHECKER_CARD: u32 = 15;
/// Number of check squares.
pub const CHECK_SQ_CARD: u32 = 64;
/// Total number of combos.
pub const COMBO_COUNT: u32 = KING_CARD * CHECKER_CARD * CHECK_SQ_CARD;

/// One dimension of the combo space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim {
    King,
    Checker,
    CheckSquare,
}

impl Dim {
    fn cardinality(self) -> u32 {
        match self {
            Dim::King => KING_CARD,
            Dim::Checker => CHECKER_CARD,
            Dim::CheckSquare => CHECK_SQ_CARD,
        }
    }

    fn letter(self) -> char {
        match self {
            Dim::King => 'k',
            Dim::Checker => 'p',
            Dim::CheckSquare => 'c',
        }
    }

    fn from_letter(c: char) -> Option<Self> {
        match c {
            'k' => Some(Dim::King),
            'p' => Some(Dim::Checker),
            'c' => Some(Dim::CheckSquare),
            _ => None,
        }
    }
}

/// A permutation of the three combo dimensions, fastest-varying first.
///
/// `index` and `decompose` are inverse bijections between `(king, checker,
/// check_sq)` triples and `[0, COMBO_COUNT)` for any fixed order; switching
/// orders permutes indices but never changes their cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionOrder {
    /// dims[0] varies fastest, dims[2] slowest.
    dims: [Dim; 3],
}

impl PartitionOrder {
    /// The six valid orders, in the cycle the probe mode uses.
    pub const ALL: [PartitionOrder; 6] = [
        PartitionOrder { dims: [Dim::King, Dim::Checker, Dim::CheckSquare] }, // kpc
        PartitionOrder { dims: [Dim::King, Dim::CheckSquare, Dim::Checker] }, // kcp
        PartitionOrder { dims: [Dim::Checker, Dim::King, Dim::CheckSquare] }, // pkc
        PartitionOrder { dims: [Dim::Checker, Dim::CheckSquare, Dim::King] }, // pck
        PartitionOrder { dims: [Dim::CheckSquare, Dim::King, Dim::Checker] }, // ckp
        PartitionOrder { dims: [Dim::CheckSquare, Dim::Checker, Dim::King] }, // cpk
    ];

    /// Scalar index of a combo under this order.
    pub fn index(&self, king: u32, checker: u32, check_sq: u32) -> u32 {
        let value = |d: Dim| match d {
            Dim::King => king,
            Dim::Checker => checker,
            Dim::CheckSquare => check_sq,
        };
        let [fast, mid, slow] = self.dims;
        value(slow) * (mid.cardinality() * fast.cardinality())
            + value(mid) * fast.cardinality()
            + value(fast)
    }

    /// Inverse of [`index`](Self::index): `(king, checker, check_sq)`.
    pub fn decompose(&self, index: u32) -> (u32, u32, u32) {
        let [fast, mid, slow] = self.dims;
        let fast_v = index % fast.cardinality();
        let mid_v = (index / fast.cardinality()) % mid.cardinality();
        let slow_v = index / (fast.cardinality() * mid.cardinality());

        let mut king = 0;
        let mut checker = 0;
        let mut check_sq = 0;
        for (dim, v) in [(fast, fast_v), (mid, mid_v), (slow, slow_v)] {
            match dim {
                Dim::King => king = v,
                Dim::Checker => checker = v,
                Dim::CheckSquare => check_sq = v,
            }
        }
        (king, checker, check_sq)
    }
}

impl Default for PartitionOrder {
    fn default() -> Self {
        // kpc: king varies fastest
        PartitionOrder { dims: [Dim::King, Dim::Checker, Dim::CheckSquare] }
    }
}

impl FromStr for PartitionOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 3 {
            return Err(Error::BadOrder(s.to_string()));
        }
        let mut dims = [Dim::King; 3];
        for (i, c) in chars.iter().enumerate() {
            dims[i] = Dim::from_letter(*c).ok_or_else(|| Error::BadOrder(s.to_string()))?;
        }
        if dims[0] == dims[1] || dims[1] == dims[2] || dims[0] == dims[2] {
            return Err(Error::BadOrder(s.to_string()));
        }
        Ok(PartitionOrder { dims })
    }
}

impl fmt::Display for PartitionOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in self.dims {
            write!(f, "{}", d.letter())?;
        }
        Ok(())
    }
}

/// A worker's share of the combo space, as a predicate over combo indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComboPartition {
    /// Every combo (partitioning disabled).
    All,
    /// `index >= start && (index - start) % stride == 0 && index < max`.
    ///
    /// The primary form; the coordinator assigns worker `i` of `N` the
    /// partition `(i, N, COMBO_COUNT)` so heavy combos are striped across
    /// the pool rather than handed to one worker in a block.
    Strided { start: u32, stride: u32, max: u32 },
    /// Exactly one combo (used by rebalance helpers).
    Single(u32),
}

impl ComboPartition {
    /// Strided assignment. Fails unless `stride > 0`, `max > 0`, `start < max`.
    pub fn strided(start: u32, stride: u32, max: u32) -> Result<Self> {
        if stride == 0 || max == 0 || start >= max {
            return Err(Error::BadPartition(format!(
                "range {}/{}/{} (need stride > 0, max > 0, start < max)",
                start, stride, max
            )));
        }
        Ok(ComboPartition::Strided { start, stride, max })
    }

    /// Simple `index mod m == n` assignment, zero-indexed. Sugar for
    /// `strided(n, m, COMBO_COUNT)`.
    pub fn simple(n: u32, m: u32) -> Result<Self> {
        if m == 0 || n >= m {
            return Err(Error::BadPartition(format!(
                "{}/{} (need 0 <= n < m)",
                n, m
            )));
        }
        Self::strided(n, m, COMBO_COUNT)
    }

    /// Restriction to a single combo index.
    pub fn single(index: u32) -> Result<Self> {
        if index >= COMBO_COUNT {
            return Err(Error::BadPartition(format!(
                "combo {} out of range [0, {})",
                index, COMBO_COUNT
            )));
        }
        Ok(ComboPartition::Single(index))
    }

    /// Whether a combo index belongs to this partition.
    pub fn contains_index(&self, index: u32) -> bool {
        match *self {
            ComboPartition::All => true,
            ComboPartition::Strided { start, stride, max } => {
                index >= start && (index - start) % stride == 0 && index < max
            }
            ComboPartition::Single(single) => index == single,
        }
    }

    /// Whether a combo belongs to this partition under `order`.
    /// Deterministic and side-effect free.
    pub fn contains(&self, order: PartitionOrder, king: u32, checker: u32, check_sq: u32) -> bool {
        self.contains_index(order.index(king, checker, check_sq))
    }
}

impl Default for ComboPartition {
    fn default() -> Self {
        ComboPartition::All
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_order_round_trip() {
        for s in ["kpc", "kcp", "pkc", "pck", "ckp", "cpk"] {
            let order: PartitionOrder = s.parse().unwrap();
            assert_eq!(order.to_string(), s);
        }
    }

    #[test]
    fn test_order_rejects_non_permutations() {
        for s in ["", "kp", "kpcc", "kkp", "xyz", "kpq"] {
            assert!(s.parse::<PartitionOrder>().is_err(), "accepted {:?}", s);
        }
    }

    #[test]
    fn test_all_orders_parse() {
        for order in PartitionOrder::ALL {
            let reparsed: PartitionOrder = order.to_string().parse().unwrap();
            assert_eq!(reparsed, order);
        }
    }

    #[test]
    fn test_default_order_formula() {
        // kpc: king fastest, checker middle, check square slowest.
        let order = PartitionOrder::default();
        assert_eq!(order.index(0, 0, 0), 0);
        assert_eq!(order.index(5, 0, 0), 5);
        assert_eq!(order.index(0, 1, 0), 64);
        assert_eq!(order.index(0, 0, 1), 64 * 15);
        assert_eq!(
            order.index(63, 14, 63),
            COMBO_COUNT - 1
        );
    }

    /// P1: for every order and every combo, the index is in range and unique.
    #[test]
    fn test_index_is_a_bijection_for_every_order() {
        for order in PartitionOrder::ALL {
            let mut seen = HashSet::with_capacity(COMBO_COUNT as usize);
            for king in 0..KING_CARD {
                for checker in 0..CHECKER_CARD {
                    for check_sq in 0..CHECK_SQ_CARD {
                        let idx = order.index(king, checker, check_sq);
                        assert!(idx < COMBO_COUNT);
                        assert!(seen.insert(idx), "duplicate index {} in {}", idx, order);
                        assert_eq!(order.decompose(idx), (king, checker, check_sq));
                    }
                }
            }
        }
    }

    /// P2: strided partitions with stride W tile the index space exactly.
    #[test]
    fn test_strided_partitions_tile_the_space() {
        let w = 7;
        let mut covered = vec![0u8; COMBO_COUNT as usize];
        for start in 0..w {
            let p = ComboPartition::strided(start, w, COMBO_COUNT).unwrap();
            for idx in 0..COMBO_COUNT {
                if p.contains_index(idx) {
                    covered[idx as usize] += 1;
                }
            }
        }
        assert!(covered.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_simple_is_strided_sugar() {
        let simple = ComboPartition::simple(2, 5).unwrap();
        let strided = ComboPartition::strided(2, 5, COMBO_COUNT).unwrap();
        assert_eq!(simple, strided);
    }

    #[test]
    fn test_partition_validation() {
        assert!(ComboPartition::strided(0, 0, 10).is_err());
        assert!(ComboPartition::strided(0, 1, 0).is_err());
        assert!(ComboPartition::strided(10, 1, 10).is_err());
        assert!(ComboPartition::simple(5, 5).is_err());
        assert!(ComboPartition::simple(0, 0).is_err());
        assert!(ComboPartition::single(COMBO_COUNT).is_err());
        assert!(ComboPartition::single(COMBO_COUNT - 1).is_ok());
    }

    #[test]
    fn test_single_combo() {
        let p = ComboPartition::single(30212).unwrap();
        assert!(p.contains_index(30212));
        assert!(!p.contains_index(30213));
        assert!(!p.contains_index(0));
    }

    #[test]
    fn test_contains_respects_order() {
        // Index 5 under kpc is king=5; under pkc it is checker=0,king=0
        // only when 5 < CHECKER_CARD maps to checker=5.
        let kpc: PartitionOrder = "kpc".parse().unwrap();
        let pkc: PartitionOrder = "pkc".parse().unwrap();
        let p = ComboPartition::single(5).unwrap();
        assert!(p.contains(kpc, 5, 0, 0));
        assert!(!p.contains(pkc, 5, 0, 0));
        assert!(p.contains(pkc, 0, 5, 0));
    }
}

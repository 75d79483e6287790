//! paramate - fork-based parallel coordination for a helpmate problem solver.
//!
//! The intelligent-mode search space of the host solver is the product of a
//! king square, a checking piece and a check square (61,440 combos); each
//! combo is followed by a forward search whose runtime is wildly uneven.
//! This crate partitions that space across forked workers, multiplexes their
//! line-framed output into one user-facing stream, detects stragglers and
//! can redistribute work from heavy outliers onto idle workers.
//!
//! The solver itself stays behind the [`engine::Engine`] trait: the
//! coordination layer only relies on a combo-space iterator that honours a
//! partition predicate, a first-move filter at forward-search ply 1, and a
//! protocol emitter.

pub mod cli;
pub mod engine;
pub mod error;
pub mod logging;
pub mod parallel;
pub mod partition;

//! Command-line interface definitions using clap.
//!
//! The partition arguments keep the host solver's grammar: `N/M` for simple
//! and first-move partitions (1-indexed on the command line, 0-indexed
//! internally), `START/STRIDE/MAX` for strided ranges (0-indexed), and an
//! optional seconds argument on `--probe`/`--rebalance`.

use std::path::PathBuf;

use clap::Parser;

use crate::error::Result;
use crate::partition::first_move::FirstMoveFilter;
use crate::partition::{ComboPartition, PartitionOrder, COMBO_COUNT};

/// paramate - parallel helpmate solving harness
#[derive(Parser, Debug)]
#[command(name = "paramate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Spawn N workers and coordinate their output (coordinator mode).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=1024))]
    pub parallel: Option<u32>,

    /// Run as a worker under an external coordinator: suppress decorations,
    /// emit the structured @@ protocol on stderr.
    #[arg(long)]
    pub worker: bool,

    /// Simple combo assignment N/M (1-indexed): work combos where
    /// index mod M == N-1.
    #[arg(long, value_name = "N/M", value_parser = parse_simple_partition)]
    pub partition: Option<SimplePartition>,

    /// Strided combo assignment START/STRIDE/MAX (0-indexed).
    #[arg(long = "partition-range", value_name = "START/STRIDE/MAX",
          value_parser = parse_range_partition)]
    pub partition_range: Option<RangePartition>,

    /// Combo-index ordering: a permutation of 'kpc', fastest dimension first.
    #[arg(long = "partition-order", value_name = "ORDER", default_value = "kpc")]
    pub partition_order: PartitionOrder,

    /// Static ply-1 filter N/M (1-indexed): keep first moves where
    /// move index mod M == N-1.
    #[arg(long = "first-move-partition", value_name = "N/M",
          value_parser = parse_simple_partition)]
    pub first_move_partition: Option<SimplePartition>,

    /// Dynamic ply-1 filter: N workers rotating over a shared counter file.
    #[arg(long = "first-move-queue", value_name = "N",
          value_parser = clap::value_parser!(u32).range(1..=1024))]
    pub first_move_queue: Option<u32>,

    /// Restrict the search to one combo index (used with --first-move-*).
    #[arg(long = "single-combo", value_name = "IDX",
          value_parser = clap::value_parser!(u32).range(0..61440))]
    pub single_combo: Option<u32>,

    /// Probe mode: cycle partition orders to identify heavy combos.
    /// Optional per-order timeout in seconds.
    #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "60",
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub probe: Option<u64>,

    /// Rebalance mode: after the timeout, refill idle slots with helpers
    /// aimed at straggling combos. Optional timeout in seconds.
    #[arg(long, value_name = "SECS", num_args = 0..=1, default_missing_value = "60",
          value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub rebalance: Option<u64>,

    /// Stop all workers once this many solutions have been printed.
    #[arg(long = "max-solutions", value_name = "N")]
    pub max_solutions: Option<u32>,

    /// Print one aggregated progress line per search depth.
    #[arg(long = "move-numbers")]
    pub move_numbers: bool,

    /// First moves the sweep harness generates per target position.
    #[arg(long = "moves-per-target", value_name = "N", default_value_t = 8)]
    pub moves_per_target: u32,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long = "log-level", env = "PARAMATE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format: pretty, compact, json.
    #[arg(long = "log-format", env = "PARAMATE_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Log to file (in addition to stderr).
    #[arg(long = "log-file", env = "PARAMATE_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

/// A parsed `N/M` argument, already converted to 0-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimplePartition {
    pub index: u32,
    pub total: u32,
}

/// A parsed `START/STRIDE/MAX` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePartition {
    pub start: u32,
    pub stride: u32,
    pub max: u32,
}

fn parse_simple_partition(s: &str) -> std::result::Result<SimplePartition, String> {
    let (n, m) = s
        .split_once('/')
        .ok_or_else(|| format!("'{}' is not of the form N/M", s))?;
    let n: u32 = n.parse().map_err(|_| format!("bad N in '{}'", s))?;
    let m: u32 = m.parse().map_err(|_| format!("bad M in '{}'", s))?;
    if m == 0 || n == 0 || n > m {
        return Err(format!("'{}' must satisfy 1 <= N <= M", s));
    }
    Ok(SimplePartition { index: n - 1, total: m })
}

fn parse_range_partition(s: &str) -> std::result::Result<RangePartition, String> {
    let mut parts = s.splitn(3, '/');
    let mut next = |name: &str| -> std::result::Result<u32, String> {
        parts
            .next()
            .ok_or_else(|| format!("'{}' is not of the form START/STRIDE/MAX", s))?
            .parse()
            .map_err(|_| format!("bad {} in '{}'", name, s))
    };
    let start = next("START")?;
    let stride = next("STRIDE")?;
    let max = next("MAX")?;
    if stride == 0 || max == 0 || start >= max {
        return Err(format!(
            "'{}' must satisfy STRIDE > 0, MAX > 0, START < MAX",
            s
        ));
    }
    Ok(RangePartition { start, stride, max })
}

impl Cli {
    /// The combo partition selected by the flags. `--single-combo` wins over
    /// `--partition-range` over `--partition`; none of them means the full
    /// space.
    pub fn resolve_partition(&self) -> Result<ComboPartition> {
        if let Some(idx) = self.single_combo {
            return ComboPartition::single(idx);
        }
        if let Some(range) = self.partition_range {
            return ComboPartition::strided(range.start, range.stride, range.max.min(COMBO_COUNT));
        }
        if let Some(simple) = self.partition {
            return ComboPartition::simple(simple.index, simple.total);
        }
        Ok(ComboPartition::All)
    }

    /// The static ply-1 filter, if configured.
    pub fn resolve_first_move(&self) -> Option<FirstMoveFilter> {
        self.first_move_partition.map(|p| FirstMoveFilter::Static {
            index: p.index,
            total: p.total,
        })
    }
}

//! The coordinator: a single-threaded event loop over worker pipes.
//!
//! The parent forks N workers, each with stdout/stderr duplicated onto the
//! write end of a pipe, then multiplexes the read ends with `select` on a
//! one-second tick. Frames are reassembled per worker, dispatched through
//! the protocol, and aggregated into a single user-facing stream on stdout;
//! human status lines go to stderr. A worker is finished when its pipe
//! reports EOF or a non-retriable error; `waitpid` during the drain phase is
//! the authoritative end of its lifecycle.
//!
//! SIGINT/SIGTERM are forwarded to every live child, then the default
//! disposition is restored and the signal re-raised so the shell sees the
//! real exit status.

use std::io::{self, Write};
use std::os::fd::{AsFd, AsRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::select::{select, FdSet};
use nix::sys::signal::{self, kill, SigHandler, Signal};
use nix::sys::time::{TimeVal, TimeValLike};
use nix::sys::wait::waitpid;
use nix::unistd::{fork, pipe, ForkResult, Pid};
use tracing::{debug, warn};

use super::ipc::{read_pipe, set_nonblocking, FrameBuffer, ReadOutcome, READ_CHUNK};
use super::protocol::{decode_frame, Frame, Record};
use super::queue::WorkQueue;
use super::worker::{run_worker, WorkerSetup};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::partition::{ComboPartition, PartitionOrder, COMBO_COUNT};

/// Hard ceiling on pool size.
pub const MAX_WORKERS: usize = 1024;

/// Progress table size: supports `m*100 + k` for m, k up to 99.
pub(crate) const DEPTH_SLOTS: usize = 10_000;

/// Combo labels are capped at this many bytes in the worker record.
const COMBO_LABEL_MAX: usize = 63;

/// Interval between human status lines on stderr.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

// Signal state shared with the handler. The handler only touches atomics and
// async-signal-safe libc calls; the interruption itself is handled as a
// cooperative poll in the multiplex loop, and the signal is re-raised only
// after the drain completes so buffered frames are not lost.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);
static INTERRUPT_SIGNAL: AtomicI32 = AtomicI32::new(0);
static CHILD_PIDS: [AtomicI32; MAX_WORKERS] = [const { AtomicI32::new(0) }; MAX_WORKERS];

extern "C" fn forward_signal(sig: libc::c_int) {
    INTERRUPTED.store(true, Ordering::SeqCst);
    INTERRUPT_SIGNAL.store(sig, Ordering::SeqCst);
    for slot in CHILD_PIDS.iter() {
        let pid = slot.load(Ordering::SeqCst);
        if pid > 0 {
            // SAFETY: kill is async-signal-safe.
            unsafe {
                libc::kill(pid, sig);
            }
        }
    }
}

/// Whether SIGINT/SIGTERM arrived; polled cooperatively each loop tick.
pub fn interrupted() -> bool {
    INTERRUPTED.load(Ordering::SeqCst)
}

pub(crate) fn install_signal_handlers() {
    INTERRUPTED.store(false, Ordering::SeqCst);
    INTERRUPT_SIGNAL.store(0, Ordering::SeqCst);
    // SAFETY: installing a handler that only performs async-signal-safe work.
    unsafe {
        let handler = SigHandler::Handler(forward_signal);
        let _ = signal::signal(Signal::SIGINT, handler);
        let _ = signal::signal(Signal::SIGTERM, handler);
    }
}

/// After the drain: restore the default disposition and re-raise the pending
/// signal so the process reports the real termination status.
pub(crate) fn reraise_if_interrupted() {
    let sig = INTERRUPT_SIGNAL.load(Ordering::SeqCst);
    if sig != 0 {
        // SAFETY: resetting the disposition and re-raising a standard signal.
        unsafe {
            libc::signal(sig, libc::SIG_DFL);
            libc::raise(sig);
        }
    }
}

fn register_child(pid: i32) {
    for slot in CHILD_PIDS.iter() {
        if slot
            .compare_exchange(0, pid, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return;
        }
    }
}

fn unregister_child(pid: i32) {
    if pid <= 0 {
        return;
    }
    for slot in CHILD_PIDS.iter() {
        if slot
            .compare_exchange(pid, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            return;
        }
    }
}

/// Post-fork child housekeeping: forget the parent's bookkeeping and go back
/// to default signal dispositions so SIGTERM kills the worker promptly.
fn reset_child_signal_state() {
    INTERRUPTED.store(false, Ordering::SeqCst);
    for slot in CHILD_PIDS.iter() {
        slot.store(0, Ordering::SeqCst);
    }
    // SAFETY: restoring default dispositions.
    unsafe {
        let _ = signal::signal(Signal::SIGINT, SigHandler::SigDfl);
        let _ = signal::signal(Signal::SIGTERM, SigHandler::SigDfl);
    }
}

/// Coordinator-side record of one worker.
pub(crate) struct WorkerSlot {
    pid: Pid,
    fd: Option<OwnedFd>,
    partition_id: u32,
    frames: FrameBuffer,
    finished: bool,
    last_depth: u32,
    positions_at_depth: Vec<u64>,
    current_combo: String,
}

impl WorkerSlot {
    fn new(pid: Pid, fd: OwnedFd, partition_id: u32) -> Self {
        Self {
            pid,
            fd: Some(fd),
            partition_id,
            frames: FrameBuffer::new(),
            finished: false,
            last_depth: 0,
            positions_at_depth: vec![0; DEPTH_SLOTS],
            current_combo: String::new(),
        }
    }

    /// Fd-less slot for dispatch tests.
    #[cfg(test)]
    pub(crate) fn stub(partition_id: u32) -> Self {
        Self {
            pid: Pid::from_raw(0),
            fd: None,
            partition_id,
            frames: FrameBuffer::new(),
            finished: false,
            last_depth: 0,
            positions_at_depth: vec![0; DEPTH_SLOTS],
            current_combo: String::new(),
        }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    pub(crate) fn last_depth(&self) -> u32 {
        self.last_depth
    }

    pub(crate) fn current_combo(&self) -> &str {
        &self.current_combo
    }
}

/// Outcome of a fork: the parent keeps coordinating, the child carries its
/// setup back up to be solved.
pub(crate) enum Spawned {
    Parent,
    Child(WorkerSetup),
}

/// How a multiplex pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopExit {
    /// Every worker reached EOF.
    Idle,
    /// SIGINT/SIGTERM observed; children have already been signalled.
    Interrupted,
    /// The caller-supplied deadline passed with workers still running.
    Deadline,
}

/// Pool configuration shared by all coordinator modes.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Requested worker count; clamped to `[1, MAX_WORKERS]`.
    pub workers: u32,
    pub order: PartitionOrder,
    /// Global cap on solutions across all workers.
    pub solution_cap: Option<u32>,
    /// Host `movenumbers` option: print aggregated progress lines.
    pub show_move_numbers: bool,
}

/// The worker pool. `W` is the user-facing output stream (stdout in
/// production; a buffer in tests).
pub struct Pool<W: Write> {
    order: PartitionOrder,
    requested: u32,
    solution_cap: Option<u32>,
    show_move_numbers: bool,
    pub(crate) slots: Vec<WorkerSlot>,
    last_printed_depth: u32,
    solutions_found: u32,
    started: Instant,
    last_status: Instant,
    out: W,
}

impl<W: Write> Pool<W> {
    pub fn new(options: PoolOptions, out: W) -> Self {
        let now = Instant::now();
        Self {
            order: options.order,
            requested: options.workers.clamp(1, MAX_WORKERS as u32),
            solution_cap: options.solution_cap,
            show_move_numbers: options.show_move_numbers,
            slots: Vec::new(),
            last_printed_depth: 0,
            solutions_found: 0,
            started: now,
            last_status: now,
            out,
        }
    }

    pub fn solutions_found(&self) -> u32 {
        self.solutions_found
    }

    pub(crate) fn requested(&self) -> u32 {
        self.requested
    }

    pub(crate) fn active(&self) -> usize {
        self.slots.iter().filter(|s| !s.finished).count()
    }

    pub(crate) fn finished_count(&self) -> usize {
        self.slots.iter().filter(|s| s.finished).count()
    }

    /// Normal mode: stripe the combo space over the pool and run to
    /// completion. Returns `true` in the coordinating parent; the forked
    /// children never return from this call.
    pub fn run<E: Engine>(&mut self, engine: &mut E) -> Result<bool> {
        install_signal_handlers();
        let n = self.requested;
        eprintln!(
            "\nUsing {} parallel workers (partition order: {})",
            n, self.order
        );

        let setups = self.strided_setups(n)?;
        if let Some(setup) = self.spawn_pool(setups)? {
            run_worker(setup, engine);
        }
        self.warn_short_pool();

        self.multiplex_until(None)?;
        self.drain()?;
        reraise_if_interrupted();
        Ok(true)
    }

    /// First-move queue mode: W workers share one combo restriction and split
    /// ply-1 moves through the rotation rule backed by the shared counter
    /// file. The file is created here and unlinked after the reap.
    pub fn run_queue<E: Engine>(
        &mut self,
        partition: ComboPartition,
        engine: &mut E,
    ) -> Result<bool> {
        install_signal_handlers();
        let n = self.requested;
        let queue_path =
            std::env::temp_dir().join(format!("paramate-queue-{}", std::process::id()));
        let queue = WorkQueue::create(&queue_path, n)?;
        eprintln!(
            "\nUsing {} queue workers on first moves (rotation)",
            n
        );

        let order = self.order;
        let setups: Vec<WorkerSetup> = (1..=n)
            .map(|i| WorkerSetup {
                id: i,
                order,
                partition,
                first_move: None,
                queue_path: Some(queue_path.clone()),
            })
            .collect();
        if let Some(setup) = self.spawn_pool(setups)? {
            // The child opens the queue by path; close the inherited creator
            // handle without unlinking.
            drop(queue);
            run_worker(setup, engine);
        }
        self.warn_short_pool();

        self.multiplex_until(None)?;
        self.drain()?;
        if let Err(e) = queue.destroy() {
            warn!(error = %e, "failed to remove work-queue file");
        }
        reraise_if_interrupted();
        Ok(true)
    }

    pub(crate) fn strided_setups(&self, n: u32) -> Result<Vec<WorkerSetup>> {
        let order = self.order;
        (1..=n)
            .map(|i| {
                Ok(WorkerSetup {
                    id: i,
                    order,
                    partition: ComboPartition::strided(i - 1, n, COMBO_COUNT)?,
                    first_move: None,
                    queue_path: None,
                })
            })
            .collect()
    }

    pub(crate) fn warn_short_pool(&self) {
        let active = self.active() as u32;
        if active < self.requested {
            eprintln!(
                "Warning: only {} of {} workers started (fork/pipe limit?)",
                active, self.requested
            );
        }
    }

    /// Fork one worker. In the parent the read end is registered
    /// non-blocking; in the child both stdio streams point into the pipe and
    /// the parent's bookkeeping is released.
    pub(crate) fn spawn_worker(&mut self, setup: WorkerSetup) -> Result<Spawned> {
        if self.slots.len() >= MAX_WORKERS {
            return Err(Error::Worker("worker table full".into()));
        }
        let (read_fd, write_fd) = pipe()?;

        // SAFETY: single-threaded coordinator; the child only runs
        // fork-safe setup before exec-free solving.
        match unsafe { fork() } {
            Ok(ForkResult::Child) => {
                drop(read_fd);
                // SAFETY: duplicating onto the standard descriptors.
                unsafe {
                    libc::dup2(write_fd.as_raw_fd(), libc::STDOUT_FILENO);
                    libc::dup2(write_fd.as_raw_fd(), libc::STDERR_FILENO);
                }
                drop(write_fd);
                reset_child_signal_state();
                // Release the parent's worker array (closes inherited read
                // ends of earlier siblings).
                self.slots.clear();
                Ok(Spawned::Child(setup))
            }
            Ok(ForkResult::Parent { child }) => {
                drop(write_fd);
                set_nonblocking(&read_fd, true)?;
                register_child(child.as_raw());
                debug!(worker = setup.id, pid = child.as_raw(), "worker forked");
                self.slots.push(WorkerSlot::new(child, read_fd, setup.id));
                Ok(Spawned::Parent)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Fork a batch, tolerating per-worker failures: a failed slot is logged
    /// and left empty, and its partition is not reassigned.
    pub(crate) fn spawn_pool(
        &mut self,
        setups: Vec<WorkerSetup>,
    ) -> Result<Option<WorkerSetup>> {
        for setup in setups {
            let id = setup.id;
            match self.spawn_worker(setup) {
                Ok(Spawned::Parent) => {}
                Ok(Spawned::Child(setup)) => return Ok(Some(setup)),
                Err(e) => {
                    warn!(worker = id, error = %e, "failed to start worker");
                }
            }
        }
        Ok(None)
    }

    /// Multiplex worker pipes until the pool is idle, a signal arrives, or
    /// the deadline (if any) passes.
    pub(crate) fn multiplex_until(&mut self, deadline: Option<Instant>) -> Result<LoopExit> {
        while self.active() > 0 {
            if interrupted() {
                return Ok(LoopExit::Interrupted);
            }
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Ok(LoopExit::Deadline);
                }
            }

            let mut ready_idx: Vec<usize> = Vec::new();
            {
                let mut readfds = FdSet::new();
                for slot in &self.slots {
                    if !slot.finished {
                        if let Some(fd) = &slot.fd {
                            readfds.insert(fd.as_fd());
                        }
                    }
                }
                let mut timeout = TimeVal::seconds(1);
                match select(None, &mut readfds, None, None, &mut timeout) {
                    Ok(n) if n > 0 => {
                        for (idx, slot) in self.slots.iter().enumerate() {
                            if !slot.finished {
                                if let Some(fd) = &slot.fd {
                                    if readfds.contains(fd.as_fd()) {
                                        ready_idx.push(idx);
                                    }
                                }
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(Errno::EINTR) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            self.maybe_status_line();
            for idx in ready_idx {
                self.handle_readable(idx);
            }
        }
        Ok(LoopExit::Idle)
    }

    /// One pipe became readable: pull a chunk, dispatch completed frames.
    fn handle_readable(&mut self, idx: usize) {
        let mut buf = [0u8; READ_CHUNK];
        let outcome = match &self.slots[idx].fd {
            Some(fd) => read_pipe(fd, &mut buf),
            None => ReadOutcome::Closed,
        };
        match outcome {
            ReadOutcome::Data(n) => {
                let frames = self.slots[idx].frames.push(&buf[..n]);
                for frame in frames {
                    self.handle_frame(idx, &frame);
                }
            }
            ReadOutcome::WouldBlock => {}
            ReadOutcome::Closed => self.finish_worker(idx, true),
        }
    }

    /// Transition a worker to FINISHED: flush its partial line, close the
    /// pipe, drop it from the signal-forwarding table.
    fn finish_worker(&mut self, idx: usize, notify: bool) {
        if let Some(frame) = self.slots[idx].frames.take_partial() {
            self.handle_frame(idx, &frame);
        }
        {
            let slot = &mut self.slots[idx];
            slot.finished = true;
            slot.fd = None;
            unregister_child(slot.pid.as_raw());
        }
        if notify {
            let elapsed = self.started.elapsed().as_secs_f64();
            let active = self.active();
            eprint!(
                "\n[{:.0}s: Worker {}/{} finished. Still running ({}): ",
                elapsed, self.slots[idx].partition_id, self.requested, active
            );
            for slot in &self.slots {
                if !slot.finished {
                    eprint!("{} ", slot.partition_id);
                }
            }
            eprint!("]");
            let _ = io::stderr().flush();
            self.last_status = Instant::now();
        }
    }

    /// Dispatch one complete frame from worker `idx`.
    pub(crate) fn handle_frame(&mut self, idx: usize, line: &str) {
        match decode_frame(line) {
            Frame::Record(Record::Progress { m, k, positions }) => {
                self.handle_progress(idx, m, k, positions);
            }
            Frame::Record(Record::Text(body)) => self.handle_text(&body),
            Frame::Record(Record::Combo(label)) => {
                let slot = &mut self.slots[idx];
                slot.current_combo = truncate_label(&label);
            }
            Frame::Record(Record::Debug(msg)) => {
                debug!(worker = self.slots[idx].partition_id, "{}", msg);
            }
            // Accepted and consumed; reserved for future aggregation.
            Frame::Record(_) => {}
            Frame::Unknown(_) => {}
            Frame::Opaque(text) => self.handle_opaque(text),
        }
    }

    /// `PROGRESS` path: record per-worker state, then advance the aggregated
    /// frontier. The frontier is the largest depth every non-finished worker
    /// has reported; one user-visible line is printed per depth, stamped with
    /// elapsed wall time. Printing is gated on the move-numbers option but
    /// the state is retained regardless.
    fn handle_progress(&mut self, idx: usize, m: u32, k: u32, positions: u64) {
        let depth = m.saturating_mul(100).saturating_add(k);
        if (depth as usize) < DEPTH_SLOTS {
            let slot = &mut self.slots[idx];
            slot.positions_at_depth[depth as usize] = positions;
            slot.last_depth = depth;
        }

        if !self.show_move_numbers {
            return;
        }

        let min_depth = self
            .slots
            .iter()
            .filter(|s| !s.finished)
            .map(|s| s.last_depth)
            .min()
            .unwrap_or(self.last_printed_depth);

        while self.last_printed_depth < min_depth {
            let d = self.last_printed_depth + 1;
            let total: u64 = self
                .slots
                .iter()
                .map(|s| s.positions_at_depth[d as usize])
                .sum();
            if total > 0 {
                let elapsed = self.started.elapsed().as_secs_f64();
                let _ = write!(
                    self.out,
                    "\n{} potential positions in {}+{}  (Time = {:.3} s)",
                    total,
                    d / 100,
                    d % 100,
                    elapsed
                );
                let _ = self.out.flush();
            }
            self.last_printed_depth = d;
        }
    }

    /// `TEXT` path: pass the body through to user stdout (legacy look:
    /// leading newline) and count solution headers against the global cap.
    fn handle_text(&mut self, body: &str) {
        let trimmed = body.trim_start_matches([' ', '\t']);
        if trimmed.is_empty() {
            return;
        }

        let _ = write!(self.out, "\n{}", body);
        let _ = self.out.flush();

        let bytes = trimmed.as_bytes();
        if bytes.len() >= 2 && (b'1'..=b'9').contains(&bytes[0]) && bytes[1] == b'.' {
            self.solutions_found += 1;
            if let Some(cap) = self.solution_cap {
                if self.solutions_found >= cap {
                    self.kill_all();
                }
            }
        }
    }

    /// Opaque solver output: suppress the stipulation echo, blank lines and
    /// completion noise; print everything else verbatim.
    fn handle_opaque(&mut self, line: &str) {
        if line.starts_with("ser-") || line.starts_with("  ser-") {
            return;
        }
        if line.trim_start_matches([' ', '\t']).is_empty() {
            return;
        }
        if line.starts_with("solution finished") {
            return;
        }
        let _ = writeln!(self.out, "{}", line);
        let _ = self.out.flush();
    }

    /// SIGTERM every live worker. The slots stay RUNNING; pipe EOF is what
    /// moves them to FINISHED, so frames already in flight still drain.
    pub(crate) fn kill_all(&mut self) {
        for slot in &self.slots {
            if !slot.finished && slot.pid.as_raw() > 0 {
                let _ = kill(slot.pid, Signal::SIGTERM);
            }
        }
    }

    /// Periodic stderr status: running count, and per-worker combo labels
    /// once few enough workers remain to list.
    fn maybe_status_line(&mut self) {
        let active = self.active();
        if active == 0 || self.last_status.elapsed() < STATUS_INTERVAL {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64();
        eprint!(
            "\n[{:.0}s: {}/{} workers running",
            elapsed, active, self.requested
        );
        if active <= 16 {
            eprintln!("]");
            for slot in &self.slots {
                if !slot.finished {
                    if slot.current_combo.is_empty() {
                        eprintln!("  W{}: (starting)", slot.partition_id);
                    } else {
                        eprintln!("  W{}: {}", slot.partition_id, slot.current_combo);
                    }
                }
            }
        } else {
            eprint!("]");
        }
        let _ = io::stderr().flush();
        self.last_status = Instant::now();
    }

    /// Reap every child and flush whatever its pipe still holds. Blocking
    /// reads are safe here: the children are gone, so EOF is imminent.
    pub(crate) fn drain(&mut self) -> Result<()> {
        for idx in 0..self.slots.len() {
            let pid = self.slots[idx].pid;
            if pid.as_raw() > 0 {
                let _ = waitpid(pid, None);
                unregister_child(pid.as_raw());
            }
            if self.slots[idx].fd.is_some() {
                if let Some(fd) = &self.slots[idx].fd {
                    let _ = set_nonblocking(fd, false);
                }
                while !self.slots[idx].finished {
                    let mut buf = [0u8; READ_CHUNK];
                    let outcome = match &self.slots[idx].fd {
                        Some(fd) => read_pipe(fd, &mut buf),
                        None => ReadOutcome::Closed,
                    };
                    match outcome {
                        ReadOutcome::Data(n) => {
                            let frames = self.slots[idx].frames.push(&buf[..n]);
                            for frame in frames {
                                self.handle_frame(idx, &frame);
                            }
                        }
                        ReadOutcome::WouldBlock | ReadOutcome::Closed => {
                            self.finish_worker(idx, false);
                        }
                    }
                }
            } else if !self.slots[idx].finished {
                self.finish_worker(idx, false);
            }
        }
        Ok(())
    }

    /// Combo indices of still-running workers, parsed from the leading
    /// integer of their combo labels (rebalance input).
    pub(crate) fn running_combo_indices(&self) -> Vec<u32> {
        self.slots
            .iter()
            .filter(|s| !s.finished && !s.current_combo.is_empty())
            .filter_map(|s| leading_number(&s.current_combo))
            .filter(|&n| n < COMBO_COUNT)
            .collect()
    }
}

/// Leading decimal integer of a combo label, if any.
pub(crate) fn leading_number(label: &str) -> Option<u32> {
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn truncate_label(label: &str) -> String {
    if label.len() <= COMBO_LABEL_MAX {
        return label.to_string();
    }
    let mut end = COMBO_LABEL_MAX;
    while !label.is_char_boundary(end) {
        end -= 1;
    }
    label[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool(workers: u32, cap: Option<u32>, show: bool) -> Pool<Vec<u8>> {
        let mut pool = Pool::new(
            PoolOptions {
                workers,
                order: PartitionOrder::default(),
                solution_cap: cap,
                show_move_numbers: show,
            },
            Vec::new(),
        );
        for i in 1..=workers {
            pool.slots.push(WorkerSlot::stub(i));
        }
        pool
    }

    fn output(pool: &Pool<Vec<u8>>) -> String {
        String::from_utf8_lossy(&pool.out).into_owned()
    }

    /// Scenario 1: two workers, aggregated lines for 1+0 and 1+1.
    #[test]
    fn test_aggregated_progress_frontier() {
        let mut pool = test_pool(2, None, true);

        pool.handle_frame(0, "@@PROGRESS:1+0:3");
        assert_eq!(output(&pool), "", "frontier must wait for worker 2");
        pool.handle_frame(1, "@@PROGRESS:1+0:3");
        assert!(output(&pool).contains("6 potential positions in 1+0"));

        pool.handle_frame(0, "@@PROGRESS:1+1:7");
        pool.handle_frame(1, "@@PROGRESS:1+1:7");
        let out = output(&pool);
        assert!(out.contains("14 potential positions in 1+1"));

        // P3: the frontier never went backwards.
        let pos_10 = out.find("in 1+0").unwrap();
        let pos_11 = out.find("in 1+1").unwrap();
        assert!(pos_10 < pos_11);
    }

    #[test]
    fn test_progress_gated_on_move_numbers() {
        let mut pool = test_pool(2, None, false);
        pool.handle_frame(0, "@@PROGRESS:1+0:3");
        pool.handle_frame(1, "@@PROGRESS:1+0:3");
        assert_eq!(output(&pool), "");
        // State is retained even while printing is suppressed.
        assert_eq!(pool.slots[0].last_depth, 100);
        assert_eq!(pool.slots[0].positions_at_depth[100], 3);
    }

    #[test]
    fn test_progress_beyond_table_is_dropped() {
        let mut pool = test_pool(1, None, true);
        pool.handle_frame(0, "@@PROGRESS:100+0:5");
        assert_eq!(pool.slots[0].last_depth, 0);
        assert_eq!(output(&pool), "");
    }

    /// Scenario 2: the cap fires on a solution header.
    #[test]
    fn test_solution_cap_counts_headers() {
        let mut pool = test_pool(4, Some(1), false);
        pool.handle_frame(1, "@@TEXT:  1.e2-e4 e7-e5 #");
        assert_eq!(pool.solutions_found(), 1);
        assert!(output(&pool).contains("1.e2-e4 e7-e5 #"));

        // Further headers still print but the cap already fired.
        pool.handle_frame(2, "@@TEXT:  1.d2-d4 d7-d5 #");
        assert_eq!(pool.solutions_found(), 2);
    }

    #[test]
    fn test_non_header_text_is_not_counted() {
        let mut pool = test_pool(1, Some(1), false);
        pool.handle_frame(0, "@@TEXT:add_to_move_generation_stack:");
        pool.handle_frame(0, "@@TEXT:   ");
        assert_eq!(pool.solutions_found(), 0);
        let out = output(&pool);
        assert!(out.contains("add_to_move_generation_stack:"));
        // Whitespace-only TEXT is suppressed entirely.
        assert!(!out.contains("   \n"));
    }

    /// Scenario 5: leading noise before the marker, trailing bytes buffered.
    #[test]
    fn test_malformed_frame_recovery() {
        let mut pool = test_pool(1, None, true);
        pool.handle_frame(0, "XYZ@@PROGRESS:2+3:100");
        assert_eq!(pool.slots[0].last_depth, 203);
        assert_eq!(pool.slots[0].positions_at_depth[203], 100);
        pool.handle_frame(0, "TRAIL");
        assert!(output(&pool).contains("TRAIL\n"));
    }

    #[test]
    fn test_opaque_suppressions() {
        let mut pool = test_pool(1, None, false);
        pool.handle_frame(0, "ser-h#14");
        pool.handle_frame(0, "  ser-h#14");
        pool.handle_frame(0, "solution finished");
        pool.handle_frame(0, "   \t ");
        pool.handle_frame(0, "");
        assert_eq!(output(&pool), "");

        pool.handle_frame(0, "  1.Kb2-a3 Qd8-d2 #");
        assert_eq!(output(&pool), "  1.Kb2-a3 Qd8-d2 #\n");
    }

    #[test]
    fn test_combo_record_updates_slot() {
        let mut pool = test_pool(1, None, false);
        pool.handle_frame(0, "@@COMBO:30212 king=c8 checker=Pd6 checksq=d7");
        assert_eq!(
            pool.slots[0].current_combo(),
            "30212 king=c8 checker=Pd6 checksq=d7"
        );
        assert_eq!(pool.running_combo_indices(), vec![30212]);
    }

    #[test]
    fn test_combo_label_truncated() {
        let mut pool = test_pool(1, None, false);
        let long = format!("@@COMBO:7 {}", "x".repeat(200));
        pool.handle_frame(0, &long);
        assert_eq!(pool.slots[0].current_combo().len(), COMBO_LABEL_MAX);
    }

    #[test]
    fn test_lifecycle_records_are_consumed() {
        let mut pool = test_pool(1, None, false);
        for line in [
            "@@READY",
            "@@SOLVING",
            "@@FINISHED",
            "@@PARTIAL",
            "@@SOLUTION_START",
            "@@SOLUTION_END",
            "@@TIME:1.234",
            "@@HEARTBEAT:10",
            "@@PROBLEM_START:1",
            "@@PROBLEM_END:1",
            "@@DEBUG:noise",
            "@@ERROR:bad",
            "@@SOME_FUTURE_RECORD:xyz",
        ] {
            pool.handle_frame(0, line);
        }
        assert_eq!(output(&pool), "");
    }

    /// P4-adjacent: a straggler holds the frontier back until it reports.
    #[test]
    fn test_frontier_is_lower_bound() {
        let mut pool = test_pool(3, None, true);
        pool.handle_frame(0, "@@PROGRESS:1+0:10");
        pool.handle_frame(0, "@@PROGRESS:1+1:20");
        pool.handle_frame(1, "@@PROGRESS:1+0:1");
        pool.handle_frame(1, "@@PROGRESS:1+1:2");
        // Worker 2 has said nothing: no lines yet.
        assert_eq!(output(&pool), "");

        pool.handle_frame(2, "@@PROGRESS:1+1:100");
        let out = output(&pool);
        // 1+0 sums only what was reported (worker 2 skipped it).
        assert!(out.contains("11 potential positions in 1+0"));
        assert!(out.contains("122 potential positions in 1+1"));
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number("30212 king=c8"), Some(30212));
        assert_eq!(leading_number("512"), Some(512));
        assert_eq!(leading_number("king=c8"), None);
        assert_eq!(leading_number(""), None);
    }

    #[test]
    fn test_pool_clamps_worker_count() {
        let pool: Pool<Vec<u8>> = Pool::new(
            PoolOptions {
                workers: 0,
                order: PartitionOrder::default(),
                solution_cap: None,
                show_move_numbers: false,
            },
            Vec::new(),
        );
        assert_eq!(pool.requested(), 1);

        let pool: Pool<Vec<u8>> = Pool::new(
            PoolOptions {
                workers: 40_000,
                order: PartitionOrder::default(),
                solution_cap: None,
                show_move_numbers: false,
            },
            Vec::new(),
        );
        assert_eq!(pool.requested(), MAX_WORKERS as u32);
    }
}

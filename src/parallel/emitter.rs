//! Worker-side protocol emission.
//!
//! Inside a forked worker both stdout and stderr have been duplicated onto
//! the coordinator pipe; records go to stderr so they interleave with the
//! solver's own prints at line granularity. Every record is flushed
//! immediately, one per line.
//!
//! The emitter is gated: when disabled (plain, non-worker runs) every emit is
//! a no-op, so engine code can emit unconditionally.

use std::io::{self, Write};

use super::protocol::Record;

pub struct Emitter<W: Write> {
    out: W,
    enabled: bool,
}

impl<W: Write> Emitter<W> {
    pub fn new(out: W, enabled: bool) -> Self {
        Self { out, enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Write one record as a flushed line. No-op when disabled.
    pub fn emit(&mut self, record: &Record) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        writeln!(self.out, "{}", record.encode())?;
        self.out.flush()
    }

    pub fn ready(&mut self) -> io::Result<()> {
        self.emit(&Record::Ready)
    }

    pub fn solving(&mut self) -> io::Result<()> {
        self.emit(&Record::Solving)
    }

    pub fn finished(&mut self) -> io::Result<()> {
        self.emit(&Record::Finished)
    }

    pub fn partial(&mut self) -> io::Result<()> {
        self.emit(&Record::Partial)
    }

    pub fn problem_start(&mut self, index: u32) -> io::Result<()> {
        self.emit(&Record::ProblemStart(index))
    }

    pub fn problem_end(&mut self, index: u32) -> io::Result<()> {
        self.emit(&Record::ProblemEnd(index))
    }

    pub fn solution_start(&mut self) -> io::Result<()> {
        self.emit(&Record::SolutionStart)
    }

    pub fn solution_end(&mut self) -> io::Result<()> {
        self.emit(&Record::SolutionEnd)
    }

    pub fn text(&mut self, line: &str) -> io::Result<()> {
        self.emit(&Record::Text(line.to_string()))
    }

    pub fn time(&mut self, seconds: f64) -> io::Result<()> {
        self.emit(&Record::Time(seconds))
    }

    pub fn heartbeat(&mut self, seconds: u64) -> io::Result<()> {
        self.emit(&Record::Heartbeat(seconds))
    }

    pub fn progress(&mut self, m: u32, k: u32, positions: u64) -> io::Result<()> {
        self.emit(&Record::Progress { m, k, positions })
    }

    pub fn combo(&mut self, label: &str) -> io::Result<()> {
        self.emit(&Record::Combo(label.to_string()))
    }

    pub fn debug(&mut self, message: &str) -> io::Result<()> {
        self.emit(&Record::Debug(message.to_string()))
    }

    pub fn error(&mut self, message: &str) -> io::Result<()> {
        self.emit(&Record::Error(message.to_string()))
    }
}

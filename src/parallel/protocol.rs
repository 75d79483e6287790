//! The line-framed `@@` control protocol between workers and coordinator.
//!
//! A frame is one newline-terminated line on a worker's pipe. A frame that
//! contains the two-byte marker `@@` is a protocol record, parsed starting at
//! the marker (anything before it is noise, e.g. carriage-return artefacts);
//! a frame without the marker is opaque solver output that the coordinator
//! passes through. Records are the only channel for progress and lifecycle;
//! solution body lines travel inside `TEXT` records.
//!
//! Unknown `@@...` records are consumed without error so old coordinators
//! keep working against newer workers.

use std::fmt;

/// The record marker.
pub const MARKER: &str = "@@";

/// A parsed protocol record. All records are emitted by workers; the
/// coordinator never writes to worker stdin.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Ready,
    Solving,
    Finished,
    Partial,
    ProblemStart(u32),
    ProblemEnd(u32),
    SolutionStart,
    SolutionEnd,
    /// One line of solver output (solutions, warnings, echoes).
    Text(String),
    /// Solving time in seconds.
    Time(f64),
    /// Seconds since the worker started.
    Heartbeat(u64),
    /// Positions searched at depth `m+k`.
    Progress { m: u32, k: u32, positions: u64 },
    /// Free-form label of the combo currently being worked on.
    Combo(String),
    /// Ignored by the coordinator.
    Debug(String),
    Error(String),
}

impl Record {
    /// Wire form of the record, marker included, no trailing newline.
    pub fn encode(&self) -> String {
        match self {
            Record::Ready => "@@READY".to_string(),
            Record::Solving => "@@SOLVING".to_string(),
            Record::Finished => "@@FINISHED".to_string(),
            Record::Partial => "@@PARTIAL".to_string(),
            Record::ProblemStart(i) => format!("@@PROBLEM_START:{}", i),
            Record::ProblemEnd(i) => format!("@@PROBLEM_END:{}", i),
            Record::SolutionStart => "@@SOLUTION_START".to_string(),
            Record::SolutionEnd => "@@SOLUTION_END".to_string(),
            Record::Text(s) => format!("@@TEXT:{}", s),
            Record::Time(secs) => format!("@@TIME:{:.3}", secs),
            Record::Heartbeat(secs) => format!("@@HEARTBEAT:{}", secs),
            Record::Progress { m, k, positions } => {
                format!("@@PROGRESS:{}+{}:{}", m, k, positions)
            }
            Record::Combo(label) => format!("@@COMBO:{}", label),
            Record::Debug(s) => format!("@@DEBUG:{}", s),
            Record::Error(s) => format!("@@ERROR:{}", s),
        }
    }

    /// Parse a record from text starting at the `@@` marker.
    ///
    /// Returns `None` for records this coordinator does not know (dropped for
    /// forward compatibility) and for records whose payload does not parse.
    pub fn parse(s: &str) -> Option<Record> {
        let body = s.strip_prefix(MARKER)?;
        let (keyword, payload) = match body.find(':') {
            Some(pos) => (&body[..pos], Some(&body[pos + 1..])),
            None => (body, None),
        };

        match (keyword, payload) {
            ("READY", None) => Some(Record::Ready),
            ("SOLVING", None) => Some(Record::Solving),
            ("FINISHED", None) => Some(Record::Finished),
            ("PARTIAL", None) => Some(Record::Partial),
            ("SOLUTION_START", None) => Some(Record::SolutionStart),
            ("SOLUTION_END", None) => Some(Record::SolutionEnd),
            ("PROBLEM_START", Some(p)) => p.parse().ok().map(Record::ProblemStart),
            ("PROBLEM_END", Some(p)) => p.parse().ok().map(Record::ProblemEnd),
            ("TEXT", Some(p)) => Some(Record::Text(p.to_string())),
            ("TIME", Some(p)) => p.parse().ok().map(Record::Time),
            ("HEARTBEAT", Some(p)) => p.parse().ok().map(Record::Heartbeat),
            ("PROGRESS", Some(p)) => parse_progress(p),
            ("COMBO", Some(p)) => Some(Record::Combo(p.to_string())),
            ("DEBUG", Some(p)) => Some(Record::Debug(p.to_string())),
            ("ERROR", Some(p)) => Some(Record::Error(p.to_string())),
            _ => None,
        }
    }
}

/// `<m>+<k>:<positions>`
fn parse_progress(payload: &str) -> Option<Record> {
    let (depth, positions) = payload.split_once(':')?;
    let (m, k) = depth.split_once('+')?;
    Some(Record::Progress {
        m: m.parse().ok()?,
        k: k.parse().ok()?,
        positions: positions.parse().ok()?,
    })
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Classification of one frame read off a worker pipe.
#[derive(Debug, PartialEq)]
pub enum Frame<'a> {
    /// A record this coordinator understands.
    Record(Record),
    /// An `@@` line of an unknown or malformed kind; consumed silently.
    Unknown(&'a str),
    /// Opaque solver output, printed through the non-protocol path.
    Opaque(&'a str),
}

/// Decode a complete frame (no trailing newline). Tolerates leading noise
/// before the marker.
pub fn decode_frame(line: &str) -> Frame<'_> {
    match line.find(MARKER) {
        Some(pos) => match Record::parse(&line[pos..]) {
            Some(record) => Frame::Record(record),
            None => Frame::Unknown(line),
        },
        None => Frame::Opaque(line),
    }
}

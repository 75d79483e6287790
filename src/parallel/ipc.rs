//! Pipe-side primitives: line framing and non-blocking reads.
//!
//! Worker output arrives in arbitrary-size chunks; [`FrameBuffer`]
//! reassembles newline-terminated frames, stripping carriage returns and
//! truncating runaway lines at [`MAX_FRAME`] bytes so a worker that never
//! writes a newline cannot wedge the coordinator.

use std::os::fd::{AsFd, AsRawFd};

use nix::errno::Errno;

/// Per-worker line buffer limit. Bytes past the limit are dropped and the
/// frame is parsed as if the limit were the newline.
pub const MAX_FRAME: usize = 8192;

/// Upper bound on a single pipe read in the multiplex loop.
pub const READ_CHUNK: usize = 4096;

/// Reassembles newline-delimited frames from a stream of byte chunks.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self { buf: Vec::with_capacity(256) }
    }

    /// Feed a chunk; returns every frame it completed, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        for &b in bytes {
            if b == b'\n' {
                frames.push(String::from_utf8_lossy(&self.buf).into_owned());
                self.buf.clear();
            } else if b != b'\r' && self.buf.len() < MAX_FRAME {
                self.buf.push(b);
            }
        }
        frames
    }

    /// Flush an unterminated trailing frame (pipe EOF with no final newline).
    pub fn take_partial(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            let frame = String::from_utf8_lossy(&self.buf).into_owned();
            self.buf.clear();
            Some(frame)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Result of one read attempt on a worker pipe.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// `n` bytes landed in the buffer.
    Data(usize),
    /// Non-blocking read with nothing available; try again after select.
    WouldBlock,
    /// EOF or a non-retriable error: the worker is done.
    Closed,
}

/// Read once from a pipe, retrying on EINTR.
pub fn read_pipe<F: AsFd>(fd: &F, buf: &mut [u8]) -> ReadOutcome {
    loop {
        match nix::unistd::read(fd.as_fd().as_raw_fd(), buf) {
            Ok(0) => return ReadOutcome::Closed,
            Ok(n) => return ReadOutcome::Data(n),
            Err(Errno::EINTR) => continue,
            Err(Errno::EAGAIN) => return ReadOutcome::WouldBlock,
            Err(_) => return ReadOutcome::Closed,
        }
    }
}

/// Switch a descriptor's O_NONBLOCK flag.
pub fn set_nonblocking<F: AsFd>(fd: &F, nonblocking: bool) -> std::io::Result<()> {
    let raw = fd.as_fd().as_raw_fd();
    // SAFETY: fcntl on a descriptor we own; F_GETFL/F_SETFL do not touch memory.
    unsafe {
        let flags = libc::fcntl(raw, libc::F_GETFL);
        if flags < 0 {
            return Err(std::io::Error::last_os_error());
        }
        let flags = if nonblocking {
            flags | libc::O_NONBLOCK
        } else {
            flags & !libc::O_NONBLOCK
        };
        if libc::fcntl(raw, libc::F_SETFL, flags) < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_split_on_newline() {
        let mut fb = FrameBuffer::new();
        assert_eq!(fb.push(b"hello\nwor"), vec!["hello".to_string()]);
        assert_eq!(fb.push(b"ld\n\n"), vec!["world".to_string(), String::new()]);
        assert!(fb.is_empty());
    }

    #[test]
    fn test_carriage_returns_stripped() {
        let mut fb = FrameBuffer::new();
        assert_eq!(fb.push(b"line1\r\nli\rne2\n"), vec!["line1", "line2"]);
    }

    #[test]
    fn test_partial_flush() {
        let mut fb = FrameBuffer::new();
        assert!(fb.push(b"TRAIL").is_empty());
        assert_eq!(fb.take_partial(), Some("TRAIL".to_string()));
        assert_eq!(fb.take_partial(), None);
    }

    /// B3: an oversize line is delivered truncated, with no hang.
    #[test]
    fn test_oversize_frame_truncated() {
        let mut fb = FrameBuffer::new();
        let big = vec![b'x'; MAX_FRAME + 500];
        assert!(fb.push(&big).is_empty());
        let frames = fb.push(b"tail\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].len(), MAX_FRAME);
        assert!(frames[0].bytes().all(|b| b == b'x'));
    }

    /// Scenario 5: a record frame followed by trailing bytes with no newline.
    #[test]
    fn test_malformed_split() {
        let mut fb = FrameBuffer::new();
        let frames = fb.push(b"XYZ@@PROGRESS:2+3:100\nTRAIL");
        assert_eq!(frames, vec!["XYZ@@PROGRESS:2+3:100".to_string()]);
        assert_eq!(fb.take_partial(), Some("TRAIL".to_string()));
    }

    #[test]
    fn test_read_pipe_eof_and_data() {
        let (r, w) = nix::unistd::pipe().expect("pipe");
        let mut buf = [0u8; 64];
        nix::unistd::write(&w, b"abc").unwrap();
        assert_eq!(read_pipe(&r, &mut buf), ReadOutcome::Data(3));
        drop(w);
        assert_eq!(read_pipe(&r, &mut buf), ReadOutcome::Closed);
    }

    #[test]
    fn test_read_pipe_would_block() {
        let (r, _w) = nix::unistd::pipe().expect("pipe");
        set_nonblocking(&r, true).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(read_pipe(&r, &mut buf), ReadOutcome::WouldBlock);
    }
}

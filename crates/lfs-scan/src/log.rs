//! History log scanning and streaming diff parsing.
//!
//! `git log` output is line-oriented, but a pointer body spans several lines
//! and may be split across context and change lines of a diff hunk. The
//! parser here is a small state machine that reassembles full pointer bodies
//! per changed file, across commit and file boundaries, without ever holding
//! more than one body in memory.

use std::io::BufRead;
use std::thread;

use bstr::{BString, ByteSlice};
use crossbeam_channel::{bounded, Sender};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use lfs_utils::filter::PathFilter;
use lfs_utils::pipe::Pipe;

use crate::{Completion, PointerStream, ScanError, WrappedPointer, CHAN_BUF_SIZE};

/// Which side of a two-sided diff to reconstruct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDiffDirection {
    /// Lines added by the commit (`+`).
    Addition,
    /// Lines removed by the commit (`-`).
    Deletion,
}

impl LogDiffDirection {
    fn marker(self) -> u8 {
        match self {
            LogDiffDirection::Addition => b'+',
            LogDiffDirection::Deletion => b'-',
        }
    }
}

/// Arguments narrowing `git log` to pointer-touching commits and formatting
/// its output for [`LogDiffParser`].
///
/// The 12-line context window guarantees a whole pointer body (version line,
/// up to ten extension lines, oid, size) lands inside a single hunk even when
/// only the oid changed.
const LOG_SEARCH_ARGS: &[&str] = &[
    "-G",
    "oid sha256:",
    "-p",
    "-U12",
    "--format=lfs-commit-sha: %H %P",
];

/// Predictable per-commit boundary emitted by our `--format`.
static COMMIT_HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^lfs-commit-sha: [0-9a-fA-F]{40}( [0-9a-fA-F]{40})*").unwrap());

static FILE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"diff --git a/(.+?) b/(.+)").unwrap());

/// Merge (combined) diffs report a single path.
static MERGE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"diff --cc (.+)").unwrap());

/// A diff line carrying one pointer-body field: change marker, then one of
/// the recognized field markers.
static POINTER_DATA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+\- ])(version https://git-lfs|oid sha256|size|ext-).*$").unwrap());

/// Scan history for pointers added by commits reachable from local branches
/// and tags but from no remote, streaming results as they are parsed.
pub(crate) fn log_unpushed_pointers(filter: PathFilter) -> Result<PointerStream, ScanError> {
    let mut args = vec!["log", "--branches", "--tags", "--not", "--remotes"];
    args.extend_from_slice(LOG_SEARCH_ARGS);

    let mut pipe = Pipe::start("git", args)?;
    pipe.close_input();

    let (tx, rx) = bounded(CHAN_BUF_SIZE);
    let parser = LogDiffParser::new(LogDiffDirection::Addition, filter);
    let task = thread::spawn(move || {
        let completion = parser.parse(pipe.output(), &tx);
        drop(tx);
        if completion == Completion::Complete {
            // Drained to EOF, so the child has exited; safe to reap.
            let _ = pipe.wait();
        }
        // On an early out the child may still be writing; dropping the
        // handle closes our read end and it exits on its own failed writes.
        completion
    });

    Ok(PointerStream { rx, task })
}

/// Streaming parser over `git log -p` output formatted per
/// [`LOG_SEARCH_ARGS`].
///
/// Matching patterns are compiled once at first use and shared across calls;
/// the parser itself only carries immutable configuration, so one instance
/// may serve any number of `parse` calls.
pub struct LogDiffParser {
    direction: LogDiffDirection,
    filter: PathFilter,
}

struct ParseState {
    /// Reconstructed pointer body for the file currently being collected.
    body: Vec<u8>,
    /// Path the body belongs to.
    filename: BString,
    /// Cached filter verdict for `filename`.
    included: bool,
}

impl LogDiffParser {
    pub fn new(direction: LogDiffDirection, filter: PathFilter) -> Self {
        LogDiffParser { direction, filter }
    }

    /// Parse diff text from `input`, sending one [`WrappedPointer`] per
    /// successfully reconstructed and decoded body.
    ///
    /// The caller observes end of stream by the channel closing (drop the
    /// sender after this returns). A read fault mid-stream stops parsing;
    /// whatever was already sent stands.
    pub fn parse<R: BufRead>(&self, mut input: R, results: &Sender<WrappedPointer>) -> Completion {
        let mut state = ParseState {
            body: Vec::new(),
            filename: BString::default(),
            included: true,
        };

        let mut line = Vec::new();
        loop {
            line.clear();
            match input.read_until(b'\n', &mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => {
                    // Emit anything already whole, then report the cut.
                    let _ = self.finish_pointer(&mut state, results);
                    return Completion::Truncated;
                }
            }
            if !self.feed_line(trim_newline(&line), &mut state, results) {
                return Completion::Truncated;
            }
        }

        // Final body still in progress when the log ended.
        if !self.finish_pointer(&mut state, results) {
            return Completion::Truncated;
        }
        Completion::Complete
    }

    /// Dispatch one line. Returns false only when the result channel is gone.
    fn feed_line(&self, line: &[u8], state: &mut ParseState, results: &Sender<WrappedPointer>) -> bool {
        if COMMIT_HEADER.is_match(line) {
            // Pure boundary marker; no commit grouping is retained.
            return self.finish_pointer(state, results);
        }
        if let Some(caps) = FILE_HEADER.captures(line) {
            if !self.finish_pointer(state, results) {
                return false;
            }
            // Which side's name is pertinent depends on the direction.
            let idx = match self.direction {
                LogDiffDirection::Addition => 2,
                LogDiffDirection::Deletion => 1,
            };
            if let Some(m) = caps.get(idx) {
                self.track_file(m.as_bytes(), state);
            }
            return true;
        }
        if let Some(caps) = MERGE_HEADER.captures(line) {
            if !self.finish_pointer(state, results) {
                return false;
            }
            if let Some(m) = caps.get(1) {
                self.track_file(m.as_bytes(), state);
            }
            return true;
        }
        if state.included {
            if let Some(caps) = POINTER_DATA.captures(line) {
                let marker = caps[1][0];
                // Context lines are always taken: the version line is
                // normally identical on both sides of a change and would
                // otherwise be lost.
                if marker == self.direction.marker() || marker == b' ' {
                    state.body.extend_from_slice(&line[1..]);
                    state.body.push(b'\n');
                }
            }
        }
        true
    }

    fn track_file(&self, name: &[u8], state: &mut ParseState) {
        state.filename = BString::from(name);
        state.included = self.filter.included(state.filename.as_bstr());
    }

    /// Finalize the body in progress: decode and emit if the file passed the
    /// filter, drop with a trace note otherwise. The buffer is always left
    /// empty. Returns false only when the result channel is gone.
    fn finish_pointer(&self, state: &mut ParseState, results: &Sender<WrappedPointer>) -> bool {
        if state.body.is_empty() {
            return true;
        }
        let mut sent_ok = true;
        if state.included {
            match lfs_pointer::decode(&state.body) {
                Ok(pointer) => {
                    let wrapped = WrappedPointer {
                        sha1: None,
                        size: pointer.size,
                        pointer,
                        name: state.filename.clone(),
                    };
                    sent_ok = results.send(wrapped).is_ok();
                }
                Err(err) => {
                    tracing::debug!(
                        target: "lfsr::scan",
                        error = %err,
                        file = %state.filename,
                        "unable to parse pointer from log"
                    );
                }
            }
        }
        state.body.clear();
        sent_ok
    }
}

fn trim_newline(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

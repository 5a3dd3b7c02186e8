//! Pointer discovery over git subprocess pipes.
//!
//! Two scans are provided: [`scan_tree`] lists every pointer file present in
//! the tree at a revision, and [`scan_unpushed`] finds pointers introduced by
//! commits not yet reachable from any remote. Both run as streaming pipelines:
//! stage tasks communicate over bounded channels, subprocess output is parsed
//! as it arrives, and the full history or tree is never held in memory.
//!
//! Neither scan fetches, stores, or verifies large content, and neither
//! deduplicates by content hash: two paths sharing identical content each
//! yield their own result.

pub mod catfile;
pub mod log;
pub mod tree;

use bstr::BString;
use crossbeam_channel::Receiver;
use serde::Serialize;
use std::thread::JoinHandle;

use lfs_pointer::Pointer;
use lfs_utils::filter::PathFilter;
use lfs_utils::perf::PerfTimer;

pub use log::{LogDiffDirection, LogDiffParser};
pub use tree::TreeBlob;

/// Capacity of the bounded channels between pipeline stages.
pub(crate) const CHAN_BUF_SIZE: usize = 100;

/// Errors fatal to a scan call.
///
/// Only start-up failures (the git binary cannot be launched) are fatal.
/// Per-record failures are dropped and mid-stream I/O faults surface as
/// [`Completion::Truncated`] instead.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Start(#[from] lfs_utils::UtilError),
}

/// One discovered pointer reference at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WrappedPointer {
    /// Blob id of the pointer file. Present for tree scans; log-derived
    /// pointers carry none.
    pub sha1: Option<String>,
    /// Byte length of the referenced content, always equal to `pointer.size`.
    pub size: u64,
    /// The decoded pointer body.
    pub pointer: Pointer,
    /// Repo-relative path the pointer was found at.
    pub name: BString,
}

/// Whether a scan ran to the end of its input.
///
/// Mid-stream I/O faults (broken pipe, unexpected end of stream) stop the
/// affected stage without raising an error; already-produced results are
/// kept. This flag is how callers tell a complete result set from one cut
/// short.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Completion {
    Complete,
    Truncated,
}

impl Completion {
    /// Combine stage outcomes: the pipeline is complete only if every stage is.
    pub(crate) fn and(self, other: Completion) -> Completion {
        match (self, other) {
            (Completion::Complete, Completion::Complete) => Completion::Complete,
            _ => Completion::Truncated,
        }
    }
}

/// Collected scan output.
#[derive(Debug)]
pub struct Scan {
    pub pointers: Vec<WrappedPointer>,
    pub completion: Completion,
}

/// A running pipeline producing pointers.
///
/// The channel closing is the sole end-of-stream signal; after draining,
/// [`PointerStream::collect`] (or `finish`) reports the pipeline outcome.
pub struct PointerStream {
    pub(crate) rx: Receiver<WrappedPointer>,
    pub(crate) task: JoinHandle<Completion>,
}

impl PointerStream {
    /// Receiver end of the pipeline, for streaming consumers.
    pub fn receiver(&self) -> &Receiver<WrappedPointer> {
        &self.rx
    }

    /// Abandon the stream and report the pipeline outcome.
    ///
    /// Closes the receiving end first, so a producer blocked on a full
    /// channel gets unblocked rather than deadlocking the join. Results not
    /// yet drained are dropped; a stage cut off mid-send reports
    /// [`Completion::Truncated`].
    pub fn finish(self) -> Completion {
        drop(self.rx);
        self.task.join().unwrap_or(Completion::Truncated)
    }

    /// Drain the stream to completion and collect everything.
    pub fn collect(self) -> Scan {
        let pointers: Vec<WrappedPointer> = self.rx.iter().collect();
        let completion = self.task.join().unwrap_or(Completion::Truncated);
        Scan {
            pointers,
            completion,
        }
    }
}

/// Return every pointer file in the tree at `rev`.
///
/// Multiple paths with the same content are all reported. Results follow the
/// tree listing's path order.
pub fn scan_tree(rev: &str) -> Result<Scan, ScanError> {
    let _timer = PerfTimer::start("scan_tree");
    Ok(stream_tree(rev)?.collect())
}

/// Start a tree scan, returning the stream for incremental consumption.
pub fn stream_tree(rev: &str) -> Result<PointerStream, ScanError> {
    let blobs = tree::ls_tree_blobs(rev)?;
    catfile::cat_file_batch(blobs)
}

/// Return every pointer introduced by commits reachable from a local branch
/// or tag but not from any remote-tracking reference.
///
/// `filter` restricts results by path; use [`PathFilter::accept_all`] for no
/// restriction. Results follow commit order as produced by `git log` and,
/// within a commit, file-diff order.
pub fn scan_unpushed(filter: PathFilter) -> Result<Scan, ScanError> {
    let _timer = PerfTimer::start("scan_unpushed");
    Ok(stream_unpushed(filter)?.collect())
}

/// Start an unpushed-history scan, returning the stream for incremental
/// consumption.
pub fn stream_unpushed(filter: PathFilter) -> Result<PointerStream, ScanError> {
    log::log_unpushed_pointers(filter)
}

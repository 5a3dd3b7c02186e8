//! Tree blob listing: enumerate candidate pointer blobs at a revision.

use std::io::BufRead;
use std::thread::{self, JoinHandle};

use bstr::{BString, ByteSlice};
use crossbeam_channel::{bounded, Receiver, Sender};
use once_cell::sync::Lazy;
use regex::bytes::Regex;

use lfs_pointer::MAX_POINTER_BYTES;
use lfs_utils::pipe::Pipe;

use crate::{Completion, ScanError, CHAN_BUF_SIZE};

/// One `ls-tree` entry naming a candidate blob and its tree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeBlob {
    /// 40-hex blob id.
    pub sha1: String,
    /// Repo-relative path.
    pub filename: BString,
}

/// A running listing task feeding candidate blobs.
pub struct BlobStream {
    pub(crate) rx: Receiver<TreeBlob>,
    pub(crate) task: JoinHandle<Completion>,
}

/// `ls-tree -r -l` long format: `<mode> blob <sha> <size>\t<path>`.
/// Non-blob entries (trees, commits for submodules) fall through.
static LS_TREE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s+blob\s+([0-9a-f]{40})\s+(\d+)\t(.*)$").unwrap());

/// How a listing pump ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PumpOutcome {
    /// Subprocess output drained to EOF.
    Drained,
    /// The blob channel's receiver hung up.
    ConsumerGone,
    /// A read fault on the subprocess stream.
    ReadFault,
}

/// Enumerate blobs in the tree at `rev` that are small enough to be pointer
/// files, streaming them on a bounded channel.
///
/// The listing is recursive and rooted at the full tree, so results are
/// path-lexicographic and independent of the current working subdirectory.
/// The channel closes once the subprocess output is exhausted.
pub(crate) fn ls_tree_blobs(rev: &str) -> Result<BlobStream, ScanError> {
    let mut pipe = Pipe::start("git", ["ls-tree", "-r", "-l", "--full-tree", rev])?;
    pipe.close_input();

    let (tx, rx) = bounded(CHAN_BUF_SIZE);
    let task = thread::spawn(move || {
        let outcome = pump_listing(pipe.output(), &tx);
        drop(tx);
        match outcome {
            PumpOutcome::Drained => {
                let _ = pipe.wait();
                Completion::Complete
            }
            // The child may still be mid-write on these paths; waiting
            // would block against a full pipe buffer. Dropping the handle
            // closes our read end and the child exits on its own failed
            // writes.
            PumpOutcome::ConsumerGone => Completion::Complete,
            PumpOutcome::ReadFault => Completion::Truncated,
        }
    });

    Ok(BlobStream { rx, task })
}

/// Drive one listing stream into the blob channel.
pub(crate) fn pump_listing<R: BufRead>(reader: &mut R, tx: &Sender<TreeBlob>) -> PumpOutcome {
    let mut line = Vec::new();
    loop {
        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => return PumpOutcome::Drained,
            Ok(_) => {}
            Err(_) => return PumpOutcome::ReadFault,
        }
        if let Some(blob) = parse_listing_line(line.trim()) {
            if tx.send(blob).is_err() {
                // Consumer hung up; it owns the outcome from here.
                return PumpOutcome::ConsumerGone;
            }
        }
    }
}

/// Parse one listing line into a candidate, or `None` to drop it.
///
/// Dropped non-fatally: non-blob entries, malformed size fields, and blobs
/// too large to be pointer files.
pub(crate) fn parse_listing_line(line: &[u8]) -> Option<TreeBlob> {
    let caps = LS_TREE_LINE.captures(line)?;
    let size: u64 = caps.get(2)?.as_bytes().to_str().ok()?.parse().ok()?;
    if size >= MAX_POINTER_BYTES as u64 {
        return None;
    }
    let sha1 = caps.get(1)?.as_bytes().to_str().ok()?.to_string();
    let filename = BString::from(caps.get(3)?.as_bytes());
    Some(TreeBlob { sha1, filename })
}

//! Batch object reading: materialize candidate blobs and keep the pointers.
//!
//! A single long-lived `cat-file --batch` pipe serves the whole scan. For
//! each candidate we write its id, read the response header and exactly the
//! announced number of content bytes, then probe the bytes with the pointer
//! decoder. Non-pointers are silently dropped; any I/O fault ends the loop
//! and the stream reports itself truncated.

use std::io::BufRead;
use std::thread;

use bstr::ByteSlice;
use crossbeam_channel::{bounded, Receiver, Sender};

use lfs_utils::pipe::Pipe;

use crate::tree::{BlobStream, TreeBlob};
use crate::{Completion, PointerStream, ScanError, WrappedPointer, CHAN_BUF_SIZE};

/// Start the batch-read stage over `blobs`.
///
/// Emitted pointers carry the blob id the content was read from. The output
/// channel closes when the candidate stream ends or on the first I/O fault;
/// records already emitted remain valid either way.
pub(crate) fn cat_file_batch(blobs: BlobStream) -> Result<PointerStream, ScanError> {
    let mut pipe = Pipe::start("git", ["cat-file", "--batch"])?;

    let (tx, rx) = bounded(CHAN_BUF_SIZE);
    let task = thread::spawn(move || {
        let mine = batch_read_loop(&mut pipe, &blobs.rx, &tx);
        drop(tx);
        pipe.close_input();
        // Listing outcome folds in even when we stopped reading early.
        drop(blobs.rx);
        let upstream = blobs.task.join().unwrap_or(Completion::Truncated);
        mine.and(upstream)
    });

    Ok(PointerStream { rx, task })
}

fn batch_read_loop(
    pipe: &mut Pipe,
    blobs: &Receiver<TreeBlob>,
    results: &Sender<WrappedPointer>,
) -> Completion {
    for blob in blobs.iter() {
        let mut request = blob.sha1.clone().into_bytes();
        request.push(b'\n');
        if pipe.send(&request).is_err() {
            return Completion::Truncated;
        }
        match read_batch_object(pipe.output()) {
            Ok(content) => {
                // Best-effort probe: a small blob that isn't a pointer is
                // simply not our business.
                if let Ok(pointer) = lfs_pointer::decode(&content) {
                    let wrapped = WrappedPointer {
                        sha1: Some(blob.sha1),
                        size: pointer.size,
                        pointer,
                        name: blob.filename,
                    };
                    if results.send(wrapped).is_err() {
                        return Completion::Truncated;
                    }
                }
            }
            Err(_) => return Completion::Truncated,
        }
    }
    Completion::Complete
}

/// Read one `cat-file --batch` response: a `<sha> <type> <size>` header,
/// `<size>` content bytes, and the protocol's trailing newline.
pub(crate) fn read_batch_object<R: BufRead>(output: &mut R) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::new();
    let n = output.read_until(b'\n', &mut header)?;
    if n == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "batch stream closed before header",
        ));
    }

    let size = header
        .fields()
        .nth(2)
        .and_then(|f| f.to_str().ok())
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed batch header: {:?}", header.as_bstr()),
            )
        })?;

    let mut content = vec![0u8; size];
    output.read_exact(&mut content)?;

    // cat-file appends one newline after each object's content.
    let mut newline = [0u8; 1];
    output.read_exact(&mut newline)?;

    Ok(content)
}

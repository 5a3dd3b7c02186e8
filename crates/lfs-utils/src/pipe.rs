use std::ffi::OsStr;
use std::io::{BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, ExitStatus, Stdio};

use crate::error::UtilError;
use crate::Result;

/// A spawned subprocess held open as a long-lived I/O peer.
///
/// The handle exposes the child's stdin as a write end and its stdout as a
/// buffered read end. Stderr is discarded. Callers must close the write end
/// (`close_input`) once no further input will be sent, so the child observes
/// end-of-input, drains, and exits.
#[derive(Debug)]
pub struct Pipe {
    child: Child,
    input: Option<ChildStdin>,
    output: BufReader<ChildStdout>,
}

impl Pipe {
    /// Spawn `program` with `args`, stdin and stdout piped.
    ///
    /// A spawn failure (binary missing, fork failure) is reported immediately;
    /// no partial handle is ever returned.
    pub fn start<I, S>(program: &str, args: I) -> Result<Pipe>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = cmd.spawn().map_err(|e| UtilError::Spawn {
            command: command_string(&cmd),
            source: e,
        })?;

        // Both ends were requested piped above, so they are always present.
        let input = child.stdin.take();
        let output = match child.stdout.take() {
            Some(out) => BufReader::new(out),
            None => {
                return Err(UtilError::Spawn {
                    command: command_string(&cmd),
                    source: std::io::Error::other("child stdout not captured"),
                })
            }
        };

        Ok(Pipe {
            child,
            input,
            output,
        })
    }

    /// Write bytes to the child's stdin.
    pub fn send(&mut self, data: &[u8]) -> std::io::Result<()> {
        match self.input.as_mut() {
            Some(stdin) => {
                stdin.write_all(data)?;
                stdin.flush()
            }
            None => Err(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "pipe input already closed",
            )),
        }
    }

    /// Close the write end so the child sees end-of-input.
    ///
    /// Safe to call more than once.
    pub fn close_input(&mut self) {
        self.input.take();
    }

    /// Buffered read end over the child's stdout.
    pub fn output(&mut self) -> &mut BufReader<ChildStdout> {
        &mut self.output
    }

    /// Reap the child. Call after the output stream has been drained.
    pub fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.close_input();
        self.child.wait()
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        self.close_input();
        // Reap if already exited; never block here.
        let _ = self.child.try_wait();
    }
}

/// Render a command line for error messages.
fn command_string(cmd: &Command) -> String {
    let mut s = cmd.get_program().to_string_lossy().to_string();
    for arg in cmd.get_args() {
        s.push(' ');
        s.push_str(&arg.to_string_lossy());
    }
    s
}

//! Long-lived `exiftool` subprocess client
//!
//! One child per process, spawned lazily with `-stay_open True -@ -` and fed
//! requests over stdin. Every request ends with `-execute<seq>`; the tool
//! answers on stdout and terminates the answer with `{ready<seq>}`. Stderr is
//! advisory and discarded.
//!
//! The child cannot be used concurrently, so all access goes through
//! [`with_shared`], which serializes callers behind a process-wide mutex and
//! respawns the child if it has died since the last call.

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, PoisonError};

/// A running `exiftool -stay_open` child.
pub struct ExifTool {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    seq: u64,
}

impl ExifTool {
    /// Spawn the child process. Fails when `exiftool` is not on PATH.
    pub fn spawn() -> Result<Self> {
        let mut child = Command::new("exiftool")
            .args(["-stay_open", "True", "-@", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::MetadataTool(format!("exiftool not available: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::MetadataTool("exiftool stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .ok_or_else(|| Error::MetadataTool("exiftool stdout not captured".to_string()))?;

        tracing::debug!(pid = child.id(), "Spawned exiftool child");

        Ok(Self {
            child,
            stdin,
            stdout,
            seq: 0,
        })
    }

    /// True while the child has not exited.
    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// One request/response round-trip. Returns the raw output block.
    fn execute(&mut self, args: &[String]) -> Result<String> {
        self.seq += 1;
        let mut request = String::new();
        for arg in args {
            request.push_str(arg);
            request.push('\n');
        }
        request.push_str(&format!("-execute{}\n", self.seq));

        self.stdin
            .write_all(request.as_bytes())
            .and_then(|_| self.stdin.flush())
            .map_err(|e| Error::MetadataTool(format!("exiftool request failed: {}", e)))?;

        let marker = format!("{{ready{}}}", self.seq);
        let mut output = String::new();
        let mut line = String::new();
        loop {
            line.clear();
            let n = self
                .stdout
                .read_line(&mut line)
                .map_err(|e| Error::MetadataTool(format!("exiftool response failed: {}", e)))?;
            if n == 0 {
                return Err(Error::MetadataTool(
                    "exiftool exited mid-request".to_string(),
                ));
            }
            if line.trim_end() == marker {
                break;
            }
            output.push_str(&line);
        }
        Ok(output)
    }

    /// Extract the named tags for one file.
    ///
    /// Returns a map of tag name to raw value for every requested tag the
    /// file actually carries. Tag names match exiftool's `-S` short output.
    pub fn tags(&mut self, path: &Path, tags: &[&str]) -> Result<HashMap<String, String>> {
        let mut args: Vec<String> = vec!["-S".to_string()];
        args.extend(tags.iter().map(|t| format!("-{}", t)));
        args.push(path.display().to_string());

        let output = self.execute(&args)?;

        let mut values = HashMap::new();
        for line in output.lines() {
            if let Some((name, value)) = line.split_once(':') {
                let value = value.trim();
                if !value.is_empty() {
                    values.insert(name.trim().to_string(), value.to_string());
                }
            }
        }
        Ok(values)
    }

    /// Ask the child to exit and reap it.
    pub fn close(mut self) {
        let _ = self.stdin.write_all(b"-stay_open\nFalse\n");
        let _ = self.stdin.flush();
        let _ = self.child.wait();
        tracing::debug!("Closed exiftool child");
    }
}

/// Process-wide shared instance. `None` until first use and after [`close_shared`].
static SHARED: Mutex<Option<ExifTool>> = Mutex::new(None);

/// Run `f` against the shared child, spawning or respawning it as needed.
///
/// The mutex is held for the whole call, which is what serializes use of the
/// child between callers.
pub fn with_shared<T>(f: impl FnOnce(&mut ExifTool) -> Result<T>) -> Result<T> {
    let mut guard = SHARED.lock().unwrap_or_else(PoisonError::into_inner);

    if guard.as_mut().is_some_and(|tool| !tool.is_alive()) {
        tracing::warn!("exiftool child died, respawning");
        *guard = None;
    }
    if guard.is_none() {
        *guard = Some(ExifTool::spawn()?);
    }

    // Just checked / just assigned.
    f(guard.as_mut().expect("exiftool instance present"))
}

/// Close the shared child if one is running. Called on driver teardown.
pub fn close_shared() {
    let mut guard = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(tool) = guard.take() {
        tool.close();
    }
}

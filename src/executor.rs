use std::io::{self, Read};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::unbounded;
use tracing::{info, warn};

/// How a single invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    /// Exited with a nonzero code.
    Failed(i32),
    /// Exited without a code (killed by a signal).
    Terminated,
    /// The process could not be started at all.
    LaunchFailed(String),
}

impl RunStatus {
    fn from_exit(status: ExitStatus) -> Self {
        match status.code() {
            Some(0) => RunStatus::Success,
            Some(code) => RunStatus::Failed(code),
            None => RunStatus::Terminated,
        }
    }
}

/// Outcome of one run: status plus interleaved stdout/stderr.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub status: RunStatus,
    pub output: Vec<u8>,
    pub elapsed: Duration,
}

impl RunResult {
    /// Bytes shown to the user: a one-line diagnostic for anything other
    /// than success, followed by the captured output.
    pub fn render(&self) -> Vec<u8> {
        let mut out = match &self.status {
            RunStatus::Success => Vec::new(),
            RunStatus::Failed(code) => {
                format!("command returned nonzero exit status: {code}\n").into_bytes()
            }
            RunStatus::Terminated => b"command terminated by signal\n".to_vec(),
            RunStatus::LaunchFailed(err) => format!("invoking command: {err}\n").into_bytes(),
        };
        out.extend_from_slice(&self.output);
        out
    }
}

/// The configured command. Runs synchronously on the caller's thread.
#[derive(Debug, Clone)]
pub struct Executor {
    program: String,
    args: Vec<String>,
}

impl Executor {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// `program arg1 arg2`, for display.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn run(&self) -> RunResult {
        let started = Instant::now();
        let (status, output) = match self.spawn_and_collect() {
            Ok((status, output)) => (RunStatus::from_exit(status), output),
            Err(err) => {
                warn!(command = %self.program, error = %err, "failed to launch command");
                (RunStatus::LaunchFailed(err.to_string()), Vec::new())
            }
        };
        let elapsed = started.elapsed();
        info!(command = %self.command_line(), ?status, ?elapsed, "run finished");
        RunResult {
            status,
            output,
            elapsed,
        }
    }

    fn spawn_and_collect(&self) -> io::Result<(ExitStatus, Vec<u8>)> {
        // The terminal is usually in raw mode; the command must not read it.
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Both pipes drain into one channel so chunks keep their arrival order.
        let (tx, rx) = unbounded::<Vec<u8>>();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || pump(stdout, tx)));
        }
        if let Some(stderr) = child.stderr.take() {
            let tx = tx.clone();
            readers.push(thread::spawn(move || pump(stderr, tx)));
        }
        drop(tx);

        let mut output = Vec::new();
        for chunk in rx {
            output.extend_from_slice(&chunk);
        }
        for reader in readers {
            let _ = reader.join();
        }

        let status = child.wait()?;
        Ok((status, output))
    }
}

fn pump(mut src: impl Read, tx: crossbeam_channel::Sender<Vec<u8>>) {
    let mut buf = [0u8; 8192];
    loop {
        match src.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }
}

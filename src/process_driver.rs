//! Child process running the program under test.
//!
//! The program is started with piped stdin/stdout and a discarded stderr. A reader thread
//! forwards every chunk written on stdout through a channel, so waiting for a guess is a
//! `recv_timeout` with the per-guess deadline rather than a blocking read.
//!
//! The process is killed on drop if [`ProcessDriver::quit`] was not called.

use std::{
    collections::VecDeque,
    ffi::OsStr,
    io::{self, Read, Write},
    process::{Child, ChildStdin, ChildStdout, Command, Stdio},
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError},
    thread,
    time::{Duration, Instant},
};

use anyhow::{bail, Context};
use tracing::{debug, instrument, trace, warn};

use crate::{
    position::Position,
    protocol::{parse_response, Candidate, DriverFailure, Message, SpawnError},
};

/// Time given to the program to exit on its own after `Q`.
const QUIT_GRACE_PERIOD: Duration = Duration::from_secs(1);
const KILL_WAIT: Duration = Duration::from_millis(100);

enum ReadEvent {
    Chunk(Vec<u8>),
    Eof,
    Error(io::Error),
}

#[derive(Debug)]
pub struct ProcessDriver {
    program: String,
    child: Child,
    stdin: Option<ChildStdin>,
    output: Receiver<ReadEvent>,
    pending: VecDeque<String>,
    output_closed: bool,
    cleaned_up: bool,
}

impl std::fmt::Debug for ReadEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadEvent::Chunk(bytes) => write!(f, "Chunk({} bytes)", bytes.len()),
            ReadEvent::Eof => f.write_str("Eof"),
            ReadEvent::Error(e) => write!(f, "Error({e})"),
        }
    }
}

impl ProcessDriver {
    /// Starts `<program> run --ai <ai_id>`.
    #[instrument]
    pub fn initialize(program: &str, ai_id: usize) -> Result<ProcessDriver, SpawnError> {
        let mut command = Command::new(program);
        command.arg("run").arg("--ai").arg(ai_id.to_string());
        Self::spawn(command)
    }

    /// Starts an arbitrary command speaking the protocol.
    pub fn spawn(mut command: Command) -> Result<ProcessDriver, SpawnError> {
        let program = command.get_program().to_string_lossy().into_owned();
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        let mut child = command.spawn().map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                SpawnError::NotFound(program.clone())
            } else {
                SpawnError::Io {
                    program: program.clone(),
                    source,
                }
            }
        })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SpawnError::Io {
                    program,
                    source: io::Error::other("standard streams were not captured"),
                });
            }
        };

        let (tx, rx) = mpsc::channel();
        let reader = thread::Builder::new()
            .name(format!("{}-stdout", short_name(&program)))
            .spawn(move || forward_output(stdout, tx));
        if let Err(source) = reader {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SpawnError::Io { program, source });
        }

        debug!(%program, pid = child.id(), "program started");
        Ok(ProcessDriver {
            program,
            child,
            stdin: Some(stdin),
            output: rx,
            pending: VecDeque::new(),
            output_closed: false,
            cleaned_up: false,
        })
    }

    /// Waits up to `timeout` for the next non-empty output line.
    pub fn poll_line(&mut self, timeout: Duration) -> Result<String, DriverFailure> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(line);
            }
            if self.output_closed {
                return Err(DriverFailure::UnableToReadOutput(
                    "program closed its output".to_owned(),
                ));
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.output.recv_timeout(remaining) {
                Ok(ReadEvent::Chunk(bytes)) => self.queue_lines(&bytes),
                Ok(ReadEvent::Eof) => self.output_closed = true,
                Ok(ReadEvent::Error(e)) => {
                    self.output_closed = true;
                    return Err(DriverFailure::UnableToReadOutput(e.to_string()));
                }
                Err(RecvTimeoutError::Timeout) => return Err(DriverFailure::Timeout),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(DriverFailure::Other("output reader stopped".to_owned()))
                }
            }
        }
    }

    /// A chunk is split on newlines; text after the last newline still counts as a line, since a
    /// program may answer without one.
    fn queue_lines(&mut self, bytes: &[u8]) {
        let text = String::from_utf8_lossy(bytes);
        self.pending.extend(
            text.split('\n')
                .map(|line| line.trim_end_matches('\r'))
                .filter(|line| !line.trim().is_empty())
                .map(str::to_owned),
        );
    }

    /// Kills the process and waits up to `max_duration` for it to be reaped.
    pub fn try_kill(&mut self, max_duration: Duration) -> anyhow::Result<()> {
        self.stdin = None;
        if self.child.try_wait().context("could not query process")?.is_none() {
            self.child.kill().context("could not kill process")?;
        }
        wait_for_exit(&mut self.child, max_duration).context("process cleanup timed out")?;
        self.cleaned_up = true;
        Ok(())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl Candidate for ProcessDriver {
    fn send(&mut self, message: Message) -> Result<(), DriverFailure> {
        trace!(%message, "send");
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| DriverFailure::Other("input already closed".to_owned()))?;
        stdin
            .write_all(message.to_line().as_bytes())
            .and_then(|_| stdin.flush())
            .map_err(DriverFailure::ProgramError)
    }

    fn poll_guess(&mut self, timeout: Duration) -> Result<Position, DriverFailure> {
        let line = self.poll_line(timeout)?;
        trace!(%line, "received");
        parse_response(&line)
    }

    fn discard_pending_output(&mut self) {
        if !self.pending.is_empty() {
            debug!(lines = self.pending.len(), "discarding stale output");
            self.pending.clear();
        }
        loop {
            match self.output.try_recv() {
                Ok(ReadEvent::Chunk(bytes)) => {
                    debug!(bytes = bytes.len(), "discarding stale output");
                }
                Ok(ReadEvent::Eof) | Ok(ReadEvent::Error(_)) => self.output_closed = true,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn quit(&mut self) -> anyhow::Result<()> {
        if let Err(e) = self.send(Message::Quit) {
            debug!("could not send quit: {e}");
        }
        self.stdin = None;
        match wait_for_exit(&mut self.child, QUIT_GRACE_PERIOD) {
            Ok(status) => {
                debug!(%status, "program exited");
                self.cleaned_up = true;
                Ok(())
            }
            Err(_) => {
                warn!(
                    program = %self.program,
                    "program still running {QUIT_GRACE_PERIOD:?} after quit, killing it"
                );
                self.try_kill(KILL_WAIT)
            }
        }
    }
}

impl Drop for ProcessDriver {
    fn drop(&mut self) {
        if !self.cleaned_up {
            if let Err(e) = self.try_kill(KILL_WAIT) {
                warn!(program = %self.program, "could not clean up process: {e:#}");
            }
        }
    }
}

/// Asks the program how many AIs it has, running `<program> ai` and reading a decimal count
/// from the beginning of its output.
#[instrument]
pub fn query_ai_count(program: &str, timeout: Duration) -> anyhow::Result<usize> {
    let mut command = Command::new(program);
    command.arg("ai");
    let mut driver = ProcessDriver::spawn(command)?;
    let line = driver
        .poll_line(timeout)
        .context("could not read the number of AIs")?;
    if let Err(e) = driver.try_kill(KILL_WAIT) {
        debug!("{e:#}");
    }

    let text = line.trim_start();
    let digits = text
        .find(|c: char| !c.is_ascii_digit())
        .map_or(text, |end| &text[..end]);
    if digits.is_empty() {
        bail!("expected a number of AIs, got '{}'", line.trim_end());
    }
    digits
        .parse()
        .with_context(|| format!("invalid number of AIs '{digits}'"))
}

fn forward_output(mut stdout: ChildStdout, tx: Sender<ReadEvent>) {
    let mut buf = [0; 4096];
    loop {
        let event = match stdout.read(&mut buf) {
            Ok(0) => ReadEvent::Eof,
            Ok(n) => ReadEvent::Chunk(buf[..n].to_vec()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => ReadEvent::Error(e),
        };
        let last = !matches!(event, ReadEvent::Chunk(_));
        if tx.send(event).is_err() || last {
            return;
        }
    }
}

fn wait_for_exit(
    child: &mut Child,
    max_duration: Duration,
) -> io::Result<std::process::ExitStatus> {
    let deadline = Instant::now() + max_duration;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() > deadline {
            return Err(io::ErrorKind::TimedOut.into());
        }
        thread::sleep(Duration::from_millis(10).min(max_duration / 10));
    }
}

fn short_name(program: &str) -> &str {
    std::path::Path::new(program)
        .file_name()
        .and_then(OsStr::to_str)
        .unwrap_or(program)
}

//! Child process launching and output forwarding

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::warn;

/// Longest line re-emitted in one piece; longer lines are split
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Where a child's stdout goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Share the supervisor's stdout
    Inherit,
    /// Read line by line and re-emit as `[NAME] line`, the name padded to `width`
    Tagged { width: usize },
}

/// Everything needed to launch one incarnation of a child
#[derive(Debug, Clone)]
pub struct ChildSpec {
    /// Identity used in logs, events and output tags
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    /// Added on top of the supervisor's own environment
    pub envs: Vec<(String, String)>,
    pub output: OutputMode,
}

/// Why a child is gone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitCause {
    Code(i32),
    Signal(i32),
    Unknown,
    /// The program never started
    SpawnFailed(String),
}

impl From<ExitStatus> for ExitCause {
    fn from(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Self::Code(code);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::ExitStatusExt;
            if let Some(signal) = status.signal() {
                return Self::Signal(signal);
            }
        }

        Self::Unknown
    }
}

impl fmt::Display for ExitCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "exit code {code}"),
            Self::Signal(signal) => write!(f, "signal {signal}"),
            Self::Unknown => write!(f, "unknown cause"),
            Self::SpawnFailed(reason) => write!(f, "failed to start: {reason}"),
        }
    }
}

/// A launched child
pub struct RunningChild {
    child: Child,
    pid: Option<u32>,
    started: Instant,
}

impl RunningChild {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait for the child to exit; returns the cause and how long it ran
    pub async fn wait(mut self) -> (ExitCause, Duration) {
        let cause = match self.child.wait().await {
            Ok(status) => ExitCause::from(status),
            Err(e) => {
                warn!(pid = ?self.pid, "Failed to wait for child: {}", e);
                ExitCause::Unknown
            }
        };
        (cause, self.started.elapsed())
    }
}

/// Launch one incarnation of `spec`. The child is killed if its handle is dropped.
pub fn launch(spec: &ChildSpec) -> std::io::Result<RunningChild> {
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(spec.envs.iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::null())
        .stderr(Stdio::inherit())
        .kill_on_drop(true);

    match spec.output {
        OutputMode::Inherit => command.stdout(Stdio::inherit()),
        OutputMode::Tagged { .. } => command.stdout(Stdio::piped()),
    };

    let mut child = command.spawn()?;
    let pid = child.id();

    if let OutputMode::Tagged { width } = spec.output {
        if let Some(stdout) = child.stdout.take() {
            let name = spec.name.clone();
            // Detached: descendants may keep the pipe open after the child exits
            tokio::spawn(async move {
                if let Err(e) = forward_lines(&name, width, stdout, tokio::io::stdout()).await {
                    warn!("Output forwarding for {} stopped: {}", name, e);
                }
            });
        }
    }

    Ok(RunningChild {
        child,
        pid,
        started: Instant::now(),
    })
}

/// `[NAME   ] line`, with the name left-aligned to `width`
pub fn format_tagged(name: &str, width: usize, line: &str) -> String {
    format!("[{name:<width$}] {}", line.trim())
}

/// Copy `reader` to `sink` line by line, tagging each line with `name`.
///
/// Lines are written whole, so output of several children interleaves only
/// at line boundaries. Bytes that are not UTF-8 are replaced, and lines over
/// [`MAX_LINE_BYTES`] are emitted in pieces. Once the sink fails the reader
/// is still drained to the end, so the child never writes into a closed pipe.
/// Returns the sink once the reader is exhausted.
pub async fn forward_lines<R, W>(name: &str, width: usize, reader: R, mut sink: W) -> std::io::Result<W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::with_capacity(256);
    let mut sink_open = true;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_BYTES as u64)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            break;
        }
        if !sink_open {
            continue;
        }

        let mut tagged = format_tagged(name, width, &String::from_utf8_lossy(&buf));
        tagged.push('\n');
        let written = match sink.write_all(tagged.as_bytes()).await {
            Ok(()) => sink.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            warn!("Dropping output of {}: {}", name, e);
            sink_open = false;
        }
    }

    Ok(sink)
}

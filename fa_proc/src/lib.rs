//! ABOUTME: Process runner for external commands with cancellation and log streaming
//! ABOUTME: Supervises ffmpeg and yt-dlp invocations for the download pipeline

use fa_core::{Error, Result};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub mod lines;

pub use lines::{classify, extract_progress, LineKind, LogLine};

/// Maximum bytes to capture from stdout/stderr in collected mode
const DEFAULT_OUTPUT_LIMIT: usize = 1024 * 1024; // 1MB

/// Command specification for process execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Path to the program to execute
    pub program: PathBuf,
    /// Command line arguments
    pub args: Vec<String>,
    /// Environment variables to set
    pub env: Vec<(String, String)>,
    /// Working directory for the command
    pub cwd: Option<PathBuf>,
    /// Grace period between the termination request and a forced kill
    pub kill_after: Duration,
    /// Maximum bytes to capture per stream in collected mode
    pub output_limit: usize,
}

impl CommandSpec {
    /// Create a new command spec with default shutdown settings
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: None,
            kill_after: Duration::from_secs(5),
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    /// Add command line arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add a single command line argument
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Set environment variables from a HashMap
    pub fn env_map(mut self, env: HashMap<String, String>) -> Self {
        self.env = env.into_iter().collect();
        self
    }

    /// Add a single environment variable
    pub fn env_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.env
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Set working directory
    pub fn cwd<P: Into<PathBuf>>(mut self, cwd: P) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the kill grace period used during cancellation
    pub fn kill_after(mut self, kill_after: Duration) -> Self {
        self.kill_after = kill_after;
        self
    }

    fn program_name(&self) -> String {
        self.program
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unknown")
            .to_string()
    }

    fn build(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

/// Outcome of a streamed subprocess run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Process exited with code zero
    Completed { exit_code: i32 },
    /// Process exited non-zero; carries the last error-classified line seen
    Failed {
        exit_code: Option<i32>,
        last_error_line: Option<String>,
    },
    /// Run was stopped by the cancellation token
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed { .. })
    }
}

/// Result of a collected (non-streamed) command execution
#[derive(Debug)]
pub struct CollectedOutput {
    /// Captured stdout (bounded)
    pub stdout: String,
    /// Captured stderr (bounded)
    pub stderr: String,
    /// Exit code when the process exited on its own
    pub exit_code: Option<i32>,
    /// Whether the run was stopped by the deadline
    pub timed_out: bool,
    /// Whether the run was stopped by the cancellation token
    pub cancelled: bool,
    /// Whether either stream hit the capture limit and lost output
    pub truncated: bool,
}

impl CollectedOutput {
    /// Check if the command succeeded (exit code 0)
    pub fn success(&self) -> bool {
        self.exit_code == Some(0) && !self.timed_out && !self.cancelled
    }
}

/// Run a command, streaming classified output lines to the caller as they
/// arrive. Stdout and stderr are interleaved in arrival order. The run has no
/// wall-clock deadline; it ends when the process exits or the token fires.
#[instrument(skip(spec, cancel, on_line), fields(program = %spec.program.display()))]
pub async fn run_streaming<F>(
    spec: CommandSpec,
    cancel: &CancellationToken,
    mut on_line: F,
) -> Result<RunOutcome>
where
    F: FnMut(LogLine),
{
    let start = Instant::now();
    let program = spec.program_name();

    info!(program = %program, args = ?spec.args, "Starting supervised command");

    let mut child = spec.build().spawn().map_err(|e| {
        Error::Process(format!(
            "Failed to spawn command {}: {}",
            spec.program.display(),
            e
        ))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Process("Failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Process("Failed to capture stderr".to_string()))?;

    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let mut out_done = false;
    let mut err_done = false;
    let mut last_error_line: Option<String> = None;

    let mut handle = |text: String| {
        if text.trim().is_empty() {
            return;
        }
        let line = classify(&text);
        if line.kind == LineKind::Error {
            last_error_line = Some(line.text.clone());
        }
        on_line(line);
    };

    while !(out_done && err_done) {
        tokio::select! {
            _ = cancel.cancelled() => {
                warn!(program = %program, "Cancellation requested, terminating subprocess");
                shutdown(&mut child, spec.kill_after).await;
                counter!("subprocess_cancelled_total", "program" => program.clone()).increment(1);
                return Ok(RunOutcome::Cancelled);
            }
            line = out_lines.next_line(), if !out_done => match line {
                Ok(Some(text)) => handle(text),
                Ok(None) => out_done = true,
                Err(e) => {
                    debug!(stream = "stdout", error = %e, "Error reading from stream");
                    out_done = true;
                }
            },
            line = err_lines.next_line(), if !err_done => match line {
                Ok(Some(text)) => handle(text),
                Ok(None) => err_done = true,
                Err(e) => {
                    debug!(stream = "stderr", error = %e, "Error reading from stream");
                    err_done = true;
                }
            },
        }
    }

    let status = child
        .wait()
        .await
        .map_err(|e| Error::Process(format!("Failed to wait for command: {}", e)))?;

    let duration = start.elapsed();
    histogram!("subprocess_duration_seconds", "program" => program.clone())
        .record(duration.as_secs_f64());

    if cancel.is_cancelled() {
        counter!("subprocess_cancelled_total", "program" => program).increment(1);
        return Ok(RunOutcome::Cancelled);
    }

    if status.success() {
        info!(
            program = %program,
            duration_ms = duration.as_millis(),
            "Command completed successfully"
        );
        counter!("subprocess_success_total", "program" => program).increment(1);
        Ok(RunOutcome::Completed { exit_code: 0 })
    } else {
        warn!(
            program = %program,
            exit_code = status.code(),
            duration_ms = duration.as_millis(),
            "Command exited non-zero"
        );
        counter!("subprocess_failure_total", "program" => program).increment(1);
        Ok(RunOutcome::Failed {
            exit_code: status.code(),
            last_error_line,
        })
    }
}

/// Run a command to completion with a deadline, capturing bounded output.
/// Used for short probes (metadata queries, version checks) where streaming
/// is unnecessary but a stuck process must not hang the pipeline.
#[instrument(skip(spec, cancel), fields(program = %spec.program.display()))]
pub async fn run_collected(
    spec: CommandSpec,
    deadline: Duration,
    cancel: &CancellationToken,
) -> Result<CollectedOutput> {
    let start = Instant::now();
    let program = spec.program_name();
    let limit = spec.output_limit;

    debug!(program = %program, args = ?spec.args, deadline_secs = deadline.as_secs(), "Starting collected command");

    let mut child = spec.build().spawn().map_err(|e| {
        Error::Process(format!(
            "Failed to spawn command {}: {}",
            spec.program.display(),
            e
        ))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Process("Failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Process("Failed to capture stderr".to_string()))?;

    let work = async {
        let (status, stdout_output, stderr_output) = tokio::join!(
            child.wait(),
            capture_output(stdout, limit, "stdout"),
            capture_output(stderr, limit, "stderr"),
        );
        (status, stdout_output, stderr_output)
    };
    tokio::pin!(work);

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            warn!(program = %program, "Cancellation requested during collected run");
            // The child handle is inside `work`; kill_on_drop reaps it.
            counter!("subprocess_cancelled_total", "program" => program.clone()).increment(1);
            return Ok(CollectedOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                timed_out: false,
                cancelled: true,
                truncated: false,
            });
        }
        result = timeout(deadline, &mut work) => result,
    };

    let output = match outcome {
        Ok((status, stdout_output, stderr_output)) => {
            let status =
                status.map_err(|e| Error::Process(format!("Failed to wait for command: {}", e)))?;
            let (stdout, stdout_truncated) = stdout_output;
            let (stderr, stderr_truncated) = stderr_output;
            CollectedOutput {
                stdout,
                stderr,
                exit_code: status.code(),
                timed_out: false,
                cancelled: false,
                truncated: stdout_truncated || stderr_truncated,
            }
        }
        Err(_) => {
            warn!(
                program = %program,
                deadline_secs = deadline.as_secs(),
                "Command exceeded deadline, terminating"
            );
            counter!("subprocess_timeout_total", "program" => program.clone()).increment(1);
            CollectedOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: None,
                timed_out: true,
                cancelled: false,
                truncated: false,
            }
        }
    };

    histogram!("subprocess_duration_seconds", "program" => program)
        .record(start.elapsed().as_secs_f64());

    Ok(output)
}

/// Request termination, wait out the grace period, then force-kill and reap.
async fn shutdown(child: &mut Child, grace: Duration) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "Failed to send kill signal to process");
    }
    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => {
            debug!(exit_code = status.code(), "Subprocess terminated within grace period");
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to reap terminated subprocess");
        }
        Err(_) => {
            warn!("Subprocess did not terminate within grace period, force killing");
            if let Err(e) = child.kill().await {
                warn!(error = %e, "Force kill failed, process may still be running");
            }
        }
    }
}

/// Capture output from a stream with a size limit. Returns the captured
/// text and whether anything past the limit was dropped.
async fn capture_output<R>(stream: R, limit: usize, stream_name: &str) -> (String, bool)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut output = String::new();
    let mut buffer = String::new();
    let mut truncated = false;

    while output.len() < limit {
        buffer.clear();
        match reader.read_line(&mut buffer).await {
            Ok(0) => break, // EOF
            Ok(_) => {
                let remaining = limit - output.len();
                if buffer.len() > remaining {
                    // Back off to a char boundary so the cut is never mid-rune
                    let mut cut = remaining;
                    while cut > 0 && !buffer.is_char_boundary(cut) {
                        cut -= 1;
                    }
                    output.push_str(&buffer[..cut]);
                    truncated = true;
                    break;
                }
                output.push_str(&buffer);
            }
            Err(e) => {
                debug!(stream = stream_name, error = %e, "Error reading from stream");
                break;
            }
        }
    }

    if truncated {
        debug!(
            stream = stream_name,
            captured_bytes = output.len(),
            limit,
            "Output truncated due to size limit"
        );
    }

    (output, truncated)
}

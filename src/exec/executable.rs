//! Child process execution with idle timeout
//!
//! A command may run as long as it likes while it keeps talking. When it
//! goes quiet (no output and no exit) for longer than the idle timeout, its
//! whole process tree is killed and [`ExecError::IdleTimeout`] is returned.

use super::environment::EnvironmentBlock;
use crate::config::Platform;
use super::error::{CommandOutput, ExecError};
use crate::progress::{NoOpHandler, OutputStream, ProgressEvent, ProgressHandler};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// A program bound to a working directory, environment and idle timeout
#[derive(Debug, Clone)]
pub struct Executable {
    program: PathBuf,
    working_dir: PathBuf,
    idle_timeout: Duration,
    environment: Option<EnvironmentBlock>,
}

impl Executable {
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>, idle_timeout: Duration) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
            idle_timeout,
            environment: None,
        }
    }

    /// Runs with exactly this environment instead of inheriting the engine's
    pub fn with_environment(mut self, environment: EnvironmentBlock) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Runs to completion, buffering output
    pub async fn execute<I, S>(&self, args: I) -> Result<CommandOutput, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.execute_streaming(args, &NoOpHandler).await
    }

    /// Runs to completion, forwarding each output line to `progress` as it arrives
    pub async fn execute_streaming<I, S>(
        &self,
        args: I,
        progress: &dyn ProgressHandler,
    ) -> Result<CommandOutput, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = self.program.display().to_string();

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(environment) = &self.environment {
            environment.apply(&mut command);
        }
        #[cfg(unix)]
        command.process_group(0);

        debug!(program = %program, working_dir = %self.working_dir.display(), "Spawning process");

        let mut child = command.spawn().map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, OutputStream::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, OutputStream::Stderr, tx.clone()));
        }
        drop(tx);

        let mut output = CommandOutput::default();
        loop {
            match timeout(self.idle_timeout, rx.recv()).await {
                Ok(Some(PipeEvent::Activity)) => {}
                Ok(Some(PipeEvent::Line(stream, line))) => {
                    let buffer = match stream {
                        OutputStream::Stdout => &mut output.stdout,
                        OutputStream::Stderr => &mut output.stderr,
                    };
                    buffer.push_str(&line);
                    buffer.push('\n');
                    progress.on_progress(&ProgressEvent::OutputLine { stream, line });
                }
                Ok(None) => break,
                Err(_) => return Err(self.abort(&mut child, program).await),
            }
        }

        let status = match timeout(self.idle_timeout, child.wait()).await {
            Ok(status) => status.map_err(|source| ExecError::Io {
                program: program.clone(),
                source,
            })?,
            Err(_) => return Err(self.abort(&mut child, program).await),
        };

        // Killed by a signal counts as failure.
        output.exit_code = status.code().unwrap_or(-1);
        if output.exit_code != 0 {
            return Err(ExecError::NonZeroExit {
                program,
                code: output.exit_code,
                output,
            });
        }

        Ok(output)
    }

    async fn abort(&self, child: &mut Child, program: String) -> ExecError {
        warn!(
            program = %program,
            idle_secs = self.idle_timeout.as_secs(),
            "Command went idle, killing process tree"
        );
        if let Some(pid) = child.id() {
            kill_process_tree(pid);
        }
        if let Err(e) = child.kill().await {
            debug!(error = %e, "Process already gone");
        }
        ExecError::IdleTimeout {
            program,
            timeout: self.idle_timeout,
        }
    }
}

/// What a pipe reader reports back to the idle watchdog
enum PipeEvent {
    Line(OutputStream, String),
    /// Bytes arrived but no line is complete yet
    Activity,
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim_end_matches(['\r', '\n']).to_string()
}

/// Forwards lines from one pipe until it closes; invalid UTF-8 is replaced.
///
/// Every read counts as activity, so output without newlines (progress
/// dots, carriage-return spinners) keeps the process alive.
async fn pump<R>(mut reader: R, stream: OutputStream, tx: mpsc::UnboundedSender<PipeEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];
    let mut pending = Vec::new();
    loop {
        let read = match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!(error = %e, "Output pipe closed with error");
                break;
            }
        };
        pending.extend_from_slice(&chunk[..read]);

        let mut sent_line = false;
        while let Some(end) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=end).collect();
            if tx.send(PipeEvent::Line(stream, decode_line(&line))).is_err() {
                return;
            }
            sent_line = true;
        }
        if !sent_line && tx.send(PipeEvent::Activity).is_err() {
            return;
        }
    }

    if !pending.is_empty() {
        let _ = tx.send(PipeEvent::Line(stream, decode_line(&pending)));
    }
}

#[cfg(unix)]
fn kill_process_tree(pid: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    // The child leads its own process group, so the group id is its pid.
    if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        debug!(pid, error = %e, "Failed to signal process group");
    }
}

#[cfg(windows)]
fn kill_process_tree(pid: u32) {
    let result = std::process::Command::new("taskkill")
        .args(["/T", "/F", "/PID", &pid.to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = result {
        debug!(pid, error = %e, "Failed to run taskkill");
    }
}

#[cfg(not(any(unix, windows)))]
fn kill_process_tree(_pid: u32) {}

/// Shell and flag used to run a command line on `platform`
pub fn platform_shell(platform: Platform) -> (&'static str, &'static str) {
    match platform {
        Platform::Windows => ("cmd.exe", "/c"),
        Platform::Linux | Platform::Other => ("/bin/sh", "-c"),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::progress::CollectingHandler;
    use std::time::Instant;
    use tempfile::TempDir;

    fn sh(dir: &Path, idle: Duration) -> Executable {
        Executable::new("/bin/sh", dir, idle)
    }

    #[tokio::test]
    async fn test_execute_captures_output() {
        let temp = TempDir::new().unwrap();
        let output = sh(temp.path(), Duration::from_secs(10))
            .execute(["-c", "echo out; echo err >&2"])
            .await
            .unwrap();

        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_distinct() {
        let temp = TempDir::new().unwrap();
        let err = sh(temp.path(), Duration::from_secs(10))
            .execute(["-c", "echo partial; exit 3"])
            .await
            .unwrap_err();

        match err {
            ExecError::NonZeroExit { code, output, .. } => {
                assert_eq!(code, 3);
                assert_eq!(output.stdout, "partial\n");
            }
            other => panic!("expected non-zero exit, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_idle_timeout_kills_process() {
        let temp = TempDir::new().unwrap();
        let started = Instant::now();
        let err = sh(temp.path(), Duration::from_millis(300))
            .execute(["-c", "echo starting; sleep 30"])
            .await
            .unwrap_err();

        assert!(matches!(err, ExecError::IdleTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_chatty_process_is_not_idle() {
        let temp = TempDir::new().unwrap();
        let output = sh(temp.path(), Duration::from_millis(800))
            .execute(["-c", "for i in 1 2 3 4; do echo $i; sleep 0.3; done"])
            .await
            .unwrap();
        assert_eq!(output.stdout.lines().count(), 4);
    }

    #[tokio::test]
    async fn test_output_without_newlines_is_not_idle() {
        let temp = TempDir::new().unwrap();
        let output = sh(temp.path(), Duration::from_millis(800))
            .execute(["-c", "for i in 1 2 3 4 5 6; do printf .; sleep 0.3; done; echo"])
            .await
            .unwrap();
        assert_eq!(output.stdout, "......\n");
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_kept() {
        let temp = TempDir::new().unwrap();
        let handler = CollectingHandler::new();
        let output = sh(temp.path(), Duration::from_secs(10))
            .execute_streaming(["-c", "echo first; printf last"], &handler)
            .await
            .unwrap();

        assert_eq!(output.stdout, "first\nlast\n");
        assert_eq!(handler.output_lines(), vec!["first", "last"]);
    }

    #[tokio::test]
    async fn test_streaming_forwards_lines() {
        let temp = TempDir::new().unwrap();
        let handler = CollectingHandler::new();
        sh(temp.path(), Duration::from_secs(10))
            .execute_streaming(["-c", "echo one; echo two"], &handler)
            .await
            .unwrap();

        assert_eq!(handler.output_lines(), vec!["one", "two"]);
    }

    #[tokio::test]
    async fn test_environment_and_working_dir() {
        let temp = TempDir::new().unwrap();
        let mut environment = EnvironmentBlock::empty();
        environment.set("GREETING", "hello");

        let output = sh(temp.path(), Duration::from_secs(10))
            .with_environment(environment)
            .execute(["-c", "echo $GREETING; pwd; echo ${HOME:-unset}"])
            .await
            .unwrap();

        let lines: Vec<&str> = output.stdout.lines().collect();
        assert_eq!(lines[0], "hello");
        assert_eq!(
            Path::new(lines[1]).canonicalize().unwrap(),
            temp.path().canonicalize().unwrap()
        );
        assert_eq!(lines[2], "unset");
    }

    #[test]
    fn test_platform_shell() {
        assert_eq!(platform_shell(Platform::Linux), ("/bin/sh", "-c"));
        assert_eq!(platform_shell(Platform::Windows), ("cmd.exe", "/c"));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let temp = TempDir::new().unwrap();
        let err = Executable::new("/nonexistent/tool", temp.path(), Duration::from_secs(1))
            .execute(Vec::<String>::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Spawn { .. }));
    }
}

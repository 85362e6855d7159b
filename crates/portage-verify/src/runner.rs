//! Running generated programs on the target toolchain.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Files making up one runnable target program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// `(file name, contents)`; the last file is the entry point.
    pub files: Vec<(String, String)>,
}

impl Program {
    pub fn entry(&self) -> Option<&str> {
        self.files.last().map(|(name, _)| name.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("program has no files")]
    Empty,
    #[error("failed to prepare run directory: {0}")]
    Workspace(#[source] std::io::Error),
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("failed while waiting for the target program: {0}")]
    Wait(#[source] std::io::Error),
    #[error("timed out after {millis}ms")]
    Timeout { millis: u64 },
}

/// Runs a target program and captures its output.
pub trait TargetRunner: Send + Sync {
    fn run(&self, program: &Program, timeout: Duration) -> Result<RunOutput, RunError>;
}

/// Runs programs with `crystal run`, each in its own temporary directory.
#[derive(Debug, Clone)]
pub struct CrystalRunner {
    crystal: PathBuf,
}

impl Default for CrystalRunner {
    fn default() -> Self {
        Self::new("crystal")
    }
}

impl CrystalRunner {
    pub fn new(crystal: impl Into<PathBuf>) -> Self {
        Self {
            crystal: crystal.into(),
        }
    }
}

impl TargetRunner for CrystalRunner {
    fn run(&self, program: &Program, timeout: Duration) -> Result<RunOutput, RunError> {
        let entry = program.entry().ok_or(RunError::Empty)?;
        let dir = tempfile::tempdir().map_err(RunError::Workspace)?;
        for (name, contents) in &program.files {
            std::fs::write(dir.path().join(name), contents).map_err(RunError::Workspace)?;
        }
        let mut command = Command::new(&self.crystal);
        command
            .args(["run", "--no-color", entry])
            .current_dir(dir.path())
            .env("CRYSTAL_CACHE_DIR", dir.path().join(".cache"));
        tracing::debug!(dir = %dir.path().display(), entry, "running target program");
        run_with_timeout(command, timeout)
    }
}

/// Run `command`, killing it once `timeout` elapses.
pub fn run_with_timeout(mut command: Command, timeout: Duration) -> Result<RunOutput, RunError> {
    let name = format!("{:?}", command.get_program());
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Spawn {
            command: name,
            source,
        })?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status: ExitStatus = loop {
        if let Some(status) = child.try_wait().map_err(RunError::Wait)? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RunError::Timeout {
                millis: timeout.as_millis() as u64,
            });
        }
        thread::sleep(Duration::from_millis(10));
    };

    let collect = |handle: Option<thread::JoinHandle<String>>| {
        handle
            .and_then(|h| h.join().ok())
            .unwrap_or_default()
    };
    Ok(RunOutput {
        success: status.success(),
        code: status.code(),
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        String::from_utf8_lossy(&bytes).into_owned()
    })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_output_and_status() {
        let mut command = Command::new("sh");
        command.args(["-c", "echo out; echo err >&2; exit 3"]);
        let output = run_with_timeout(command, Duration::from_secs(5)).unwrap();
        assert!(!output.success);
        assert_eq!(output.code, Some(3));
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn test_kills_on_timeout() {
        let mut command = Command::new("sleep");
        command.arg("5");
        let started = Instant::now();
        let err = run_with_timeout(command, Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, RunError::Timeout { millis: 100 }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_missing_tool_is_a_spawn_error() {
        let runner = CrystalRunner::new("/nonexistent/crystal");
        let program = Program {
            files: vec![("main.cr".into(), "puts 1".into())],
        };
        let err = runner.run(&program, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RunError::Spawn { .. }));
    }
}

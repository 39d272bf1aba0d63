//! Running the `git` executable.
//!
//! Commit, pull and push shell out so that user hooks, credential helpers and
//! ssh configuration behave exactly as they do on the command line.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::SyncError;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Clone, Debug)]
pub struct GitRunner {
    cwd: PathBuf,
    timeout: Option<Duration>,
}

#[derive(Clone, Debug, Default)]
pub struct GitOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl GitRunner {
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            timeout: None,
        }
    }

    /// Kill any git process still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Run git and fail on a non-zero exit.
    pub fn run(&self, args: &[&str]) -> Result<GitOutput, SyncError> {
        let output = self.output(args)?;
        if output.success() {
            Ok(output)
        } else {
            Err(SyncError::Command {
                args: args.join(" "),
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// Run git and hand back whatever it exited with.
    pub fn output(&self, args: &[&str]) -> Result<GitOutput, SyncError> {
        let joined = args.join(" ");
        tracing::debug!(args = %joined, cwd = %self.cwd.display(), "running git");
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.cwd)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let spawn_err = |source| SyncError::Spawn {
            args: joined.clone(),
            source,
        };

        let Some(timeout) = self.timeout else {
            let out = cmd.output().map_err(spawn_err)?;
            return Ok(GitOutput {
                code: out.status.code(),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            });
        };

        let mut child = cmd.spawn().map_err(spawn_err)?;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let status = match wait_until(&mut child, Instant::now() + timeout).map_err(spawn_err)? {
            Some(status) => status,
            None => {
                match child.kill() {
                    Ok(()) => tracing::debug!(args = %joined, "git killed after timeout"),
                    Err(err) => tracing::debug!(args = %joined, "failed to kill git after timeout: {err}"),
                }
                if let Err(err) = child.wait() {
                    tracing::debug!(args = %joined, "failed to reap git after timeout: {err}");
                }
                return Err(SyncError::Timeout {
                    args: joined,
                    secs: timeout.as_secs(),
                });
            }
        };
        Ok(GitOutput {
            code: status.code(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

fn wait_until(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read a pipe on its own thread so a chatty child cannot fill it and stall.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_failures_with_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = GitRunner::new(tmp.path());
        let err = runner.run(&["rev-parse", "HEAD"]).unwrap_err();
        assert!(matches!(err, SyncError::Command { .. }));
    }

    #[test]
    fn timed_runs_capture_output() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = GitRunner::new(tmp.path()).with_timeout(Some(Duration::from_secs(20)));
        let out = runner.run(&["--version"]).unwrap();
        assert!(out.stdout.starts_with("git version"));
    }

    #[test]
    fn slow_git_is_killed_at_the_timeout() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = GitRunner::new(tmp.path()).with_timeout(Some(Duration::from_millis(200)));
        let started = Instant::now();
        let err = runner.run(&["-c", "alias.nap=!sleep 5", "nap"]).unwrap_err();
        assert!(matches!(err, SyncError::Timeout { .. }), "{err}");
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}

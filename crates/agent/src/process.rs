//! Process runner shared by the git and patch-agent adapters.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use pipeline::ProcessError;
use tokio::process::Command;
use tracing::{debug, warn};

/// Replacement text for scrubbed secrets.
pub const REDACTED: &str = "***";

/// One external command invocation.
///
/// Every string registered through [`CommandLine::secrets`] is replaced by
/// [`REDACTED`] in log lines and in captured output.
#[derive(Clone)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    dir: PathBuf,
    secrets: Vec<String>,
    timeout: Option<Duration>,
}

impl std::fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandLine")
            .field("command", &self.display())
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

impl CommandLine {
    pub fn new(program: impl Into<String>, dir: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            dir: dir.to_path_buf(),
            secrets: Vec::new(),
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn secrets<I>(mut self, secrets: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.secrets
            .extend(secrets.into_iter().filter(|s| !s.is_empty()));
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Program and arguments joined by spaces, secrets scrubbed.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        redact(&line, &self.secrets)
    }

    /// Runs the command to completion and returns its combined output.
    ///
    /// All of stdout comes first, then all of stderr; the two streams are not
    /// interleaved in the order they were written. A non-zero exit is an error
    /// carrying the same combined output. On timeout the child is killed.
    pub async fn run(self) -> Result<String, ProcessError> {
        let shown = self.display();
        debug!(dir = %self.dir.display(), command = %shown, "executing command");

        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in &self.envs {
            command.env(key, value);
        }

        let child = spawn_with_text_file_busy_retry(&mut command, &self.program).await?;

        // Dropping the pending future drops the child, and kill_on_drop
        // terminates it.
        let waited = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(command = %shown, timeout_secs = limit.as_secs(), "command timed out");
                    return Err(ProcessError::TimedOut {
                        program: self.program,
                        after: limit,
                    });
                }
            },
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| ProcessError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        let combined = redact(&combined, &self.secrets);

        if !output.status.success() {
            warn!(
                command = %shown,
                status = ?output.status.code(),
                output = %combined,
                "command failed"
            );
            return Err(ProcessError::Exited {
                program: self.program,
                status: output.status.code(),
                output: combined,
            });
        }
        Ok(combined)
    }
}

/// Spawns `command`, retrying briefly when the executable was written so
/// recently that another thread still holds it open for writing.
async fn spawn_with_text_file_busy_retry(
    command: &mut Command,
    program: &str,
) -> Result<tokio::process::Child, ProcessError> {
    const MAX_TEXT_FILE_BUSY_RETRIES: u32 = 5;
    const TEXT_FILE_BUSY_ERRNO: i32 = 26;
    let mut attempt = 0;
    loop {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(error)
                if error.raw_os_error() == Some(TEXT_FILE_BUSY_ERRNO)
                    && attempt < MAX_TEXT_FILE_BUSY_RETRIES =>
            {
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
            Err(error) => {
                return Err(ProcessError::Spawn {
                    program: program.to_string(),
                    message: error.to_string(),
                })
            }
        }
    }
}

/// Replaces every occurrence of each non-empty secret with [`REDACTED`].
pub fn redact(text: &str, secrets: &[String]) -> String {
    let mut scrubbed = text.to_string();
    // Longest first, so a secret that contains another is scrubbed whole.
    let mut ordered: Vec<&String> = secrets.iter().filter(|s| !s.is_empty()).collect();
    ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));
    for secret in ordered {
        scrubbed = scrubbed.replace(secret.as_str(), REDACTED);
    }
    scrubbed
}

#[cfg(all(test, unix))]
#[path = "process_tests.rs"]
mod tests;

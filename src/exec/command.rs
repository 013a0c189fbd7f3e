// src/exec/command.rs

//! Subprocess executor.
//!
//! Every change is written to a fresh temp file in the configured work
//! directory and the command runs through the configured shell with
//! [`DATA_ENV_VAR`] pointing at that file. The payload never goes through
//! argv, so its size and content cannot break the command line.
//!
//! stdout/stderr are streamed line by line to the log while the process runs.
//! `stop` kills the running process, along with anything it forked (the
//! command runs in its own process group on unix), and makes `execute` return
//! `Ok(())` right away instead of waiting for the process to exit on its own.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::Context;
use tempfile::TempPath;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::config::CommandExecutorConfig;
use crate::errors::{OverseerError, Result};
use crate::exec::{ExecuteFuture, Executor};
use crate::types::Change;

/// Environment variable holding the absolute path of the staged payload.
pub const DATA_ENV_VAR: &str = "OVERSEER_DATA";

const STAGING_PREFIX: &str = "overseer-";

#[derive(Debug)]
pub struct CommandExecutor {
    command: String,
    /// Shell program followed by its leading arguments.
    shell: Vec<String>,
    work_dir: PathBuf,
    persist_data: bool,
    stop: CancellationToken,
    span: Span,
}

impl CommandExecutor {
    pub fn new(cfg: &CommandExecutorConfig, span: Span) -> Result<Self> {
        let shell: Vec<String> = cfg.shell.split_whitespace().map(str::to_string).collect();
        if shell.is_empty() {
            return Err(OverseerError::ConfigError(
                "shell must not be empty".to_string(),
            ));
        }

        let work_dir = std::path::absolute(&cfg.work_dir)
            .with_context(|| format!("resolving work_dir {:?}", cfg.work_dir))?;

        Ok(Self {
            command: cfg.command.clone(),
            shell,
            work_dir,
            persist_data: cfg.persist_data,
            stop: CancellationToken::new(),
            span,
        })
    }

    /// Write the payload to a uniquely named file in the work directory.
    ///
    /// The write happens on the blocking pool so a large payload does not
    /// stall a runtime worker. The returned `TempPath` removes the file when
    /// dropped.
    async fn stage(&self, change: &Change) -> Result<TempPath> {
        let work_dir = self.work_dir.clone();
        let data = change.as_bytes();

        tokio::task::spawn_blocking(move || -> Result<TempPath> {
            let mut file = tempfile::Builder::new()
                .prefix(STAGING_PREFIX)
                .tempfile_in(&work_dir)
                .with_context(|| format!("creating temp file in {work_dir:?}"))?;

            file.write_all(&data).context("writing data to temp file")?;
            file.flush().context("flushing temp file")?;

            Ok(file.into_temp_path())
        })
        .await
        .context("staging task failed")?
    }

    async fn run_command(&self, data_path: &Path) -> Result<()> {
        let (program, shell_args) = match self.shell.split_first() {
            Some(parts) => parts,
            None => {
                return Err(OverseerError::ConfigError(
                    "shell must not be empty".to_string(),
                ));
            }
        };

        info!(command = %self.command, shell = %program, "starting command");

        let mut cmd = Command::new(program);
        cmd.args(shell_args)
            .arg(&self.command)
            .env(DATA_ENV_VAR, data_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so stop can take down everything the shell forked.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning '{program}' for command '{}'", self.command))?;

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(stream_output(stdout, OutputStream::Stdout, self.stop.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(stream_output(stderr, OutputStream::Stderr, self.stop.clone()));
        }

        // Either the process exits on its own, or the executor is stopped and
        // the process is killed. Being stopped is not a failure.
        let status = tokio::select! {
            biased;
            _ = self.stop.cancelled() => {
                info!(command = %self.command, "executor stopped; killing command");
                kill_process_tree(&mut child).await;
                return Ok(());
            }
            status = child.wait() => status.context("waiting for command to exit")?,
        };

        // Let the readers log whatever the process wrote before exiting.
        for reader in readers {
            if let Err(e) = reader.await {
                warn!(error = %e, "command output reader failed");
            }
        }

        let code = status.code();
        info!(exit_code = code.unwrap_or(-1), success = status.success(), "command exited");

        if status.success() {
            return Ok(());
        }

        Err(OverseerError::CommandFailed(match code {
            Some(code) => format!("'{}' exited with status {code}", self.command),
            None => format!("'{}' was terminated by a signal", self.command),
        }))
    }
}

impl Executor for CommandExecutor {
    fn execute(&self, change: Change) -> ExecuteFuture<'_> {
        Box::pin(
            async move {
                if self.stop.is_cancelled() {
                    debug!("executor stopped; ignoring change");
                    return Ok(());
                }

                let staged = self.stage(&change).await?;
                let data_path = staged.to_path_buf();
                info!(path = %data_path.display(), "wrote data to work dir");

                // Held until the end of this block so the file is removed on
                // every exit path, including cancellation.
                let _staged = if self.persist_data {
                    let kept = staged.keep().map_err(|e| e.error)?;
                    warn!(path = %kept.display(), "persisting data");
                    None
                } else {
                    Some(staged)
                };

                self.run_command(&data_path).await
            }
            .instrument(self.span.clone()),
        )
    }

    fn stop(&self) {
        self.span.in_scope(|| info!("shutting down executor"));
        self.stop.cancel();
    }
}

/// Kill the command together with every process in its group, then reap it.
#[cfg(unix)]
async fn kill_process_tree(child: &mut Child) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return;
    };

    match killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(errno) => {
            warn!(pid, error = %errno, "failed to kill process group; killing command only");
            if let Err(e) = child.start_kill() {
                warn!(error = %e, "failed to kill command on stop");
            }
        }
    }

    if let Err(e) = child.wait().await {
        warn!(error = %e, "failed to reap command after kill");
    }
}

#[cfg(not(unix))]
async fn kill_process_tree(child: &mut Child) {
    if let Err(e) = child.kill().await {
        warn!(error = %e, "failed to kill command on stop");
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

/// Log a child pipe line by line until EOF or stop.
fn stream_output<R>(pipe: R, stream: OutputStream, stop: CancellationToken) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(
        async move {
            let mut lines = BufReader::new(pipe).lines();

            loop {
                let line = tokio::select! {
                    _ = stop.cancelled() => {
                        debug!(?stream, "stopping output reader");
                        break;
                    }
                    line = lines.next_line() => line,
                };

                match line {
                    Ok(Some(line)) => match stream {
                        OutputStream::Stdout => info!(output = %line, "command"),
                        OutputStream::Stderr => warn!(output = %line, "command"),
                    },
                    Ok(None) => break,
                    Err(err) => {
                        error!(?stream, error = %err, "error reading command output");
                        break;
                    }
                }
            }
        }
        .instrument(Span::current()),
    )
}

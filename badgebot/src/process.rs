// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Local command execution used to clone forks.
//!
//! Output of the child process is streamed to the log line by line as it
//! arrives. Once both output streams close, the child gets a bounded grace
//! period to exit; a child still running after it is killed and reported as
//! [`Error::CommandTimeout`].
use std::{future::Future, path::Path, process::Stdio, time::Duration};

use tokio::{
    io::{AsyncBufReadExt, BufReader},
    process::Command,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::error::Error;

/// Grace period between end-of-output and process exit.
pub const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(1,);

/// Runs command lines and reports their exit code.
pub trait CommandRunner
{
    /// Runs `argv` to completion, streaming combined output to the log.
    fn run(&self, argv: &[String],) -> impl Future<Output = Result<i32, Error,>,>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone,)]
pub struct SystemCommandRunner
{
    exit_timeout: Duration,
}

impl Default for SystemCommandRunner
{
    fn default() -> Self
    {
        Self::new(DEFAULT_EXIT_TIMEOUT,)
    }
}

impl SystemCommandRunner
{
    /// Creates a runner granting `exit_timeout` between end-of-output and
    /// process exit.
    pub fn new(exit_timeout: Duration,) -> Self
    {
        Self {
            exit_timeout,
        }
    }
}

impl CommandRunner for SystemCommandRunner
{
    async fn run(&self, argv: &[String],) -> Result<i32, Error,>
    {
        let command_line = argv.join(" ",);
        let failure = |message: String| Error::Command {
            command: command_line.clone(),
            message,
        };

        let (program, args,) =
            argv.split_first().ok_or_else(|| Error::validation("command line cannot be empty",),)?;

        info!("$ {}", command_line);
        let mut child = Command::new(program,)
            .args(args,)
            .stdin(Stdio::null(),)
            .stdout(Stdio::piped(),)
            .stderr(Stdio::piped(),)
            .kill_on_drop(true,)
            .spawn()
            .map_err(|e| failure(format!("spawn failed: {e}"),),)?;

        let stdout = child.stdout.take().ok_or_else(|| failure("stdout not captured".to_owned(),),)?;
        let stderr = child.stderr.take().ok_or_else(|| failure("stderr not captured".to_owned(),),)?;
        let mut stdout = BufReader::new(stdout,).lines();
        let mut stderr = BufReader::new(stderr,).lines();
        let mut stdout_open = true;
        let mut stderr_open = true;

        while stdout_open || stderr_open {
            tokio::select! {
                line = stdout.next_line(), if stdout_open => match line {
                    Ok(Some(line,),) => info!("  {}", line),
                    Ok(None,) => stdout_open = false,
                    Err(e,) => return Err(failure(format!("reading stdout failed: {e}"),),),
                },
                line = stderr.next_line(), if stderr_open => match line {
                    Ok(Some(line,),) => info!("  {}", line),
                    Ok(None,) => stderr_open = false,
                    Err(e,) => return Err(failure(format!("reading stderr failed: {e}"),),),
                },
            }
        }

        let waited = timeout(self.exit_timeout, child.wait(),).await;
        match waited {
            Ok(Ok(status,),) => {
                let code = status.code().unwrap_or(-1,);
                debug!("`{}` exited with {}", command_line, code);
                Ok(code,)
            }
            Ok(Err(e,),) => Err(failure(format!("wait failed: {e}"),),),
            Err(_,) => {
                if let Err(e,) = child.kill().await {
                    warn!("failed to kill `{}`: {}", command_line, e);
                }
                Err(Error::CommandTimeout {
                    command: command_line.clone(), timeout: self.exit_timeout,
                },)
            }
        }
    }
}

/// Builds the `git clone` command line for a fork.
pub fn clone_command(clone_url: &str, destination: &Path,) -> Vec<String,>
{
    vec![
        "git".to_owned(),
        "clone".to_owned(),
        "--depth".to_owned(),
        "1".to_owned(),
        clone_url.to_owned(),
        destination.display().to_string(),
    ]
}

#[cfg(test)]
pub(crate) mod fake
{
    use std::cell::RefCell;

    use super::*;

    /// Runner that records command lines instead of executing them.
    #[derive(Debug, Default,)]
    pub(crate) struct RecordingRunner
    {
        pub calls:     RefCell<Vec<Vec<String,>,>,>,
        pub exit_code: i32,
    }

    impl CommandRunner for RecordingRunner
    {
        async fn run(&self, argv: &[String],) -> Result<i32, Error,>
        {
            self.calls.borrow_mut().push(argv.to_vec(),);
            Ok(self.exit_code,)
        }
    }
}

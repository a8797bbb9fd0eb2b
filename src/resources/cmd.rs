// src/resources/cmd.rs

//! Runs an external program as a resource.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context as _, bail};
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::context::Context;
use crate::resource::{BoxFuture, Resource};

/// Executes `command` with `arguments` when materialized.
///
/// No shell is involved. `environment` is added on top of the inherited
/// environment. The child is killed if the run is canceled while it is
/// still running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdResource {
    pub command: String,
    pub arguments: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub environment: BTreeMap<String, String>,
}

impl CmdResource {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// `command arg1 arg2`, for log lines.
    pub fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.arguments.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    async fn run(&self, ctx: &Context) -> anyhow::Result<()> {
        let command_line = self.command_line();
        info!(command = %command_line, "running command");

        let mut cmd = Command::new(&self.command);
        cmd.args(&self.arguments)
            .envs(&self.environment)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("could not run command {command_line}"))?;

        // Dropping the child on cancellation kills it.
        let Some(output) = ctx.run_until_cancelled(child.wait_with_output()).await else {
            warn!(command = %command_line, "run canceled; killed command");
            bail!("command {command_line} was canceled");
        };
        let output = output.with_context(|| format!("waiting for command {command_line}"))?;

        if !output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let stdout = stdout.trim();
            if !stdout.is_empty() {
                error!(command = %command_line, "command stdout:\n{stdout}");
            }
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if !stderr.is_empty() {
                error!(command = %command_line, "command stderr:\n{stderr}");
            }
            bail!("command {command_line} failed: {}", output.status);
        }

        info!(command = %command_line, "command exited successfully");
        Ok(())
    }
}

impl Resource for CmdResource {
    fn materialize<'a>(&'a self, ctx: &'a Context) -> BoxFuture<'a, anyhow::Result<()>> {
        Box::pin(self.run(ctx))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn successful_command() {
        let ctx = Context::background();
        CmdResource::new("true").materialize(&ctx).await.unwrap();
    }

    #[tokio::test]
    async fn failing_command_reports_status() {
        let ctx = Context::background();
        let err = CmdResource::new("sh")
            .args(["-c", "echo oops >&2; exit 3"])
            .materialize(&ctx)
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("failed"), "{msg}");
    }

    #[tokio::test]
    async fn missing_program_is_an_error() {
        let ctx = Context::background();
        let err = CmdResource::new("/definitely/not/a/program")
            .materialize(&ctx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("could not run command"));
    }

    #[tokio::test]
    async fn environment_and_cwd_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::background();
        CmdResource::new("sh")
            .args(["-c", "test \"$GREETING\" = hi && test \"$(pwd -P)\" = \"$EXPECTED\""])
            .env("GREETING", "hi")
            .env(
                "EXPECTED",
                dir.path().canonicalize().unwrap().to_string_lossy(),
            )
            .cwd(dir.path())
            .materialize(&ctx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancellation_kills_the_command() {
        let ctx = Context::background();
        let cmd = CmdResource::new("sleep").arg("30");

        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = tokio::time::timeout(Duration::from_secs(5), cmd.materialize(&ctx))
            .await
            .expect("cancellation should stop the command")
            .unwrap_err();
        assert!(err.to_string().contains("canceled"));
    }

    #[test]
    fn command_line_joins_arguments() {
        let cmd = CmdResource::new("systemctl").args(["restart", "app"]);
        assert_eq!(cmd.command_line(), "systemctl restart app");
    }
}

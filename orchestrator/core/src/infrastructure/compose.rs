// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Compose CLI invoker.
//!
//! Runs `up -d`, `down` or `stop` with the space directory as working
//! directory. Stdout and stderr are read concurrently into a single buffer in
//! arrival order. Each run is bounded by a timeout; the child is killed when
//! the timeout fires.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::runtime::{ComposeAction, ComposeInvoker, InvocationOutput, InvokerError};

pub struct ComposeCli {
    program: String,
    base_args: Vec<String>,
    timeout: Duration,
}

impl ComposeCli {
    /// `command` is the program followed by fixed leading arguments, e.g.
    /// `["docker", "compose"]`.
    pub fn new(command: &[String], timeout: Duration) -> Self {
        let (program, base_args) = match command.split_first() {
            Some((program, rest)) => (program.clone(), rest.to_vec()),
            None => ("docker-compose".to_string(), vec![]),
        };
        Self {
            program,
            base_args,
            timeout,
        }
    }

    /// Full argument list after the program: fixed arguments, the project
    /// name, then the action.
    fn args(&self, project: &str, action: ComposeAction) -> Vec<String> {
        let mut args = self.base_args.clone();
        args.push("-p".to_string());
        args.push(project.to_string());
        args.extend(action.args().iter().map(|a| a.to_string()));
        args
    }

    fn describe(&self, project: &str, action: ComposeAction) -> String {
        let mut parts = vec![self.program.clone()];
        parts.extend(self.args(project, action));
        parts.join(" ")
    }
}

async fn read_interleaved<O, E>(mut stdout: O, mut stderr: E, combined: &mut Vec<u8>) -> std::io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        tokio::select! {
            n = stdout.read(&mut out_buf), if !out_done => match n? {
                0 => out_done = true,
                n => combined.extend_from_slice(&out_buf[..n]),
            },
            n = stderr.read(&mut err_buf), if !err_done => match n? {
                0 => err_done = true,
                n => combined.extend_from_slice(&err_buf[..n]),
            },
        }
    }
    Ok(())
}

#[async_trait]
impl ComposeInvoker for ComposeCli {
    async fn invoke(
        &self,
        project: &str,
        dir: &Path,
        action: ComposeAction,
    ) -> Result<InvocationOutput, InvokerError> {
        let command = self.describe(project, action);
        info!("Running `{}` in {}", command, dir.display());

        let mut child = Command::new(&self.program)
            .args(self.args(project, action))
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| InvokerError::Spawn {
                command: command.clone(),
                source,
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            return Err(InvokerError::Io {
                command,
                source: std::io::Error::other("child stdio was not captured"),
            });
        };

        let mut combined = Vec::new();
        let run = async {
            read_interleaved(stdout, stderr, &mut combined).await?;
            child.wait().await
        };

        let status = match tokio::time::timeout(self.timeout, run).await {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => return Err(InvokerError::Io { command, source }),
            Err(_) => {
                return Err(InvokerError::Timeout {
                    command,
                    timeout: self.timeout,
                    output: String::from_utf8_lossy(&combined).into_owned(),
                })
            }
        };

        debug!("`{}` exited with {:?}", command, status.code());

        Ok(InvocationOutput {
            exit_code: status.code(),
            output: String::from_utf8_lossy(&combined).into_owned(),
        })
    }
}

//! Remote execution via SSH

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::CommandOutcome;

/// Exit code the OpenSSH client reserves for its own failures
const SSH_CLIENT_ERROR: i32 = 255;

/// Runs one command on one host
///
/// Implementations never retry and never turn a non-zero exit into an
/// error; the caller interprets the [`CommandOutcome`].
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, host: &str, command: &str) -> CommandOutcome;

    /// Runner name for logs
    fn name(&self) -> &str;
}

/// SSH client implementation to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SshTransport {
    /// The system `ssh` binary
    #[default]
    OpenSsh,
    /// In-process client (`async-ssh2-tokio`)
    Native,
}

/// SSH connection settings shared by all hosts of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    pub transport: SshTransport,
    /// Login user; `None` leaves it to the SSH client (OpenSSH) or `root` (native)
    pub user: Option<String>,
    pub port: u16,
    pub key_path: Option<String>,
    pub connect_timeout_secs: u64,
    /// Upper bound for a single command; `None` waits indefinitely
    pub command_timeout_secs: Option<u64>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            transport: SshTransport::OpenSsh,
            user: None,
            port: 22,
            key_path: None,
            connect_timeout_secs: 30,
            command_timeout_secs: None,
        }
    }
}

impl SshSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout_secs.map(Duration::from_secs)
    }

    /// `user@host`, or just `host` without a configured user
    pub fn destination(&self, host: &str) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, host),
            None => host.to_string(),
        }
    }
}

/// Await `fut`, reporting `Unreachable` once `limit` elapses
pub(crate) async fn within<F>(limit: Option<Duration>, fut: F) -> CommandOutcome
where
    F: Future<Output = CommandOutcome>,
{
    match limit {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(outcome) => outcome,
            Err(_) => CommandOutcome::Unreachable {
                reason: format!("command timed out after {}s", limit.as_secs()),
            },
        },
        None => fut.await,
    }
}

/// Remote command executor backed by the system `ssh` client
#[derive(Debug, Clone, Default)]
pub struct RemoteExecutor {
    settings: SshSettings,
}

impl RemoteExecutor {
    /// Create a new remote executor
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Arguments passed to `ssh` for one invocation
    pub fn ssh_args(&self, host: &str, command: &str) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout_secs),
        ];

        if self.settings.port != 22 {
            args.push("-p".to_string());
            args.push(self.settings.port.to_string());
        }

        if let Some(key_path) = &self.settings.key_path {
            args.push("-i".to_string());
            args.push(key_path.clone());
        }

        args.push(self.settings.destination(host));
        args.push(command.to_string());
        args
    }

    async fn spawn(&self, host: &str, command: &str) -> CommandOutcome {
        let outcome = execute("ssh", &self.ssh_args(host, command)).await;
        if let CommandOutcome::Unreachable { reason } = &outcome {
            warn!(host = %host, reason = %reason, "Host unreachable");
        }
        outcome
    }
}

/// Spawn `program` and map how it ended
async fn execute(program: &str, args: &[String]) -> CommandOutcome {
    let output = tokio::process::Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await;

    match output {
        Ok(output) => outcome_from_status(output.status.code(), &output.stderr),
        Err(e) => CommandOutcome::Unreachable {
            reason: format!("failed to spawn {}: {}", program, e),
        },
    }
}

/// Map an `ssh` exit status to an outcome
///
/// 255 is the client's own error (connection, auth); `None` means the
/// client was killed by a signal. Both leave the remote state unknown.
fn outcome_from_status(code: Option<i32>, stderr: &[u8]) -> CommandOutcome {
    match code {
        Some(SSH_CLIENT_ERROR) => CommandOutcome::Unreachable {
            reason: String::from_utf8_lossy(stderr).trim().to_string(),
        },
        Some(code) => CommandOutcome::from_exit_code(code),
        None => CommandOutcome::Unreachable {
            reason: "ssh terminated by signal".to_string(),
        },
    }
}

#[async_trait]
impl CommandRunner for RemoteExecutor {
    #[instrument(skip(self, command), fields(runner = "openssh"))]
    async fn run(&self, host: &str, command: &str) -> CommandOutcome {
        debug!(command = %command, "Executing remotely via SSH");

        let outcome = within(self.settings.command_timeout(), self.spawn(host, command)).await;

        debug!(outcome = %outcome, "Remote command finished");
        outcome
    }

    fn name(&self) -> &str {
        "openssh"
    }
}

//! In-process SSH runner
//!
//! Alternative to [`crate::RemoteExecutor`] for hosts without an OpenSSH
//! client installed. Every command opens its own session, matching the
//! one-shot semantics of `ssh host 'cmd'`.

use async_ssh2_tokio::{client::Client, AuthMethod, ServerCheckMethod};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, instrument};

use crate::remote::{within, CommandRunner, SshSettings};
use crate::CommandOutcome;

/// Default login when the settings leave the user unset
const DEFAULT_USER: &str = "root";

/// [`CommandRunner`] backed by `async-ssh2-tokio`
#[derive(Debug, Clone, Default)]
pub struct NativeSshRunner {
    settings: SshSettings,
}

impl NativeSshRunner {
    pub fn new(settings: SshSettings) -> Self {
        Self { settings }
    }

    /// Key files tried in order when no key is configured
    pub fn default_keys() -> Vec<String> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| "/root".to_string());

        ["id_ed25519", "id_rsa", "id_ecdsa"]
            .iter()
            .map(|name| format!("{}/.ssh/{}", home, name))
            .collect()
    }

    fn candidate_keys(&self) -> Vec<String> {
        match &self.settings.key_path {
            Some(key_path) => vec![key_path.clone()],
            None => Self::default_keys()
                .into_iter()
                .filter(|path| Path::new(path).exists())
                .collect(),
        }
    }

    /// Connect with the first key that authenticates
    async fn connect(&self, host: &str) -> Result<Client, String> {
        let user = self.settings.user.as_deref().unwrap_or(DEFAULT_USER);
        let keys = self.candidate_keys();
        if keys.is_empty() {
            return Err("no SSH keys found".to_string());
        }

        let mut last_error = None;
        for key_path in &keys {
            let auth_method = AuthMethod::with_key_file(key_path, None);
            let attempt = Client::connect(
                (host.to_string(), self.settings.port),
                user,
                auth_method,
                ServerCheckMethod::NoCheck,
            );

            match tokio::time::timeout(self.settings.connect_timeout(), attempt).await {
                Ok(Ok(client)) => {
                    debug!(host = %host, key = %key_path, "SSH session established");
                    return Ok(client);
                }
                Ok(Err(e)) => {
                    info!(host = %host, key = %key_path, error = %e, "SSH key rejected");
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    return Err(format!(
                        "connection timeout after {} seconds",
                        self.settings.connect_timeout_secs
                    ));
                }
            }
        }

        Err(format!(
            "connection failed with keys {}: {}",
            keys.join(", "),
            last_error.unwrap_or_else(|| "unknown".to_string())
        ))
    }

    async fn exec(&self, host: &str, command: &str) -> CommandOutcome {
        let client = match self.connect(host).await {
            Ok(client) => client,
            Err(reason) => return CommandOutcome::Unreachable { reason },
        };

        match client.execute(command).await {
            Ok(result) => CommandOutcome::from_exit_code(result.exit_status as i32),
            Err(e) => CommandOutcome::Unreachable {
                reason: format!("session failed: {}", e),
            },
        }
    }
}

#[async_trait]
impl CommandRunner for NativeSshRunner {
    #[instrument(skip(self, command), fields(runner = "native"))]
    async fn run(&self, host: &str, command: &str) -> CommandOutcome {
        debug!(command = %command, "Executing via native SSH");

        let outcome = within(self.settings.command_timeout(), self.exec(host, command)).await;

        debug!(outcome = %outcome, "Remote command finished");
        outcome
    }

    fn name(&self) -> &str {
        "native"
    }
}

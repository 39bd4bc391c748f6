//! Notification backends: local mail client, Gotify and ntfy.sh

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::{Error, Result};

/// Notification message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Message title (mail subject)
    pub title: String,
    /// Message body
    pub body: String,
    /// Priority (1-5, default 3)
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_priority() -> u8 {
    3
}

impl NotificationMessage {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: default_priority(),
        }
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority.clamp(1, 5);
        self
    }
}

/// Mask sensitive tokens/keys for safe logging
///
/// Masks all but the first and last 3 characters of tokens longer than 8 characters.
/// Tokens 8 characters or shorter are completely masked.
///
/// # Examples
///
/// ```
/// use wasctl_core::mask_token;
///
/// assert_eq!(mask_token("abc123def456ghi789"), "abc***789");
/// assert_eq!(mask_token("secret"), "***");
/// ```
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        "***".to_string()
    } else {
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 3..].iter().collect();
        format!("{}***{}", head, tail)
    }
}

/// Notification backend trait
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Send a notification
    async fn send(&self, message: &NotificationMessage) -> Result<()>;

    /// Backend name
    fn name(&self) -> &str;
}

/// Backend settings, usually read from the `[alerting]` config section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertingSettings {
    /// Mail client invoked as `<mail_command> -s <subject> <recipients...>`
    pub mail_command: Option<String>,
    pub mail_recipients: Vec<String>,
    pub gotify_url: Option<String>,
    pub gotify_key: Option<String>,
    pub ntfy_url: Option<String>,
    pub ntfy_topic: Option<String>,
    pub ntfy_token: Option<String>,
}

// ============================================================================
// Mail Backend
// ============================================================================

/// Default mail client
pub const DEFAULT_MAIL_COMMAND: &str = "mutt";

/// Sends mail through a local command-line mail client
#[derive(Debug, Clone)]
pub struct MailBackend {
    command: String,
    recipients: Vec<String>,
}

impl MailBackend {
    pub fn new(command: impl Into<String>, recipients: Vec<String>) -> Self {
        Self {
            command: command.into(),
            recipients,
        }
    }

    /// Arguments after the program name
    pub fn args(&self, subject: &str) -> Vec<String> {
        let mut args = vec!["-s".to_string(), subject.to_string(), "--".to_string()];
        args.extend(self.recipients.iter().cloned());
        args
    }
}

#[async_trait]
impl NotificationBackend for MailBackend {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        if self.recipients.is_empty() {
            debug!("No mail recipients configured; skipping notification");
            return Ok(());
        }

        info!(
            command = %self.command,
            recipients = self.recipients.len(),
            title = %message.title,
            "Sending alert mail"
        );

        let mut child = tokio::process::Command::new(&self.command)
            .args(self.args(&message.title))
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::NotificationError(format!("Failed to start {}: {}", self.command, e))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(message.body.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::NotificationError(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "mail"
    }
}

// ============================================================================
// Gotify Backend
// ============================================================================

/// Gotify notification backend
#[derive(Debug, Clone)]
pub struct GotifyBackend {
    client: Client,
    base_url: String,
    key: String,
}

impl GotifyBackend {
    /// Create a new Gotify backend with explicit URL and application key
    pub fn new(client: Client, url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: url.into(),
            key: key.into(),
        }
    }

    /// `/message` endpoint under the configured base URL
    pub fn endpoint(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.ends_with("/message") {
            base.to_string()
        } else {
            format!("{}/message", base)
        }
    }
}

#[async_trait]
impl NotificationBackend for GotifyBackend {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        let url = self.endpoint();
        debug!(
            url = %url,
            key = %mask_token(&self.key),
            title_bytes = message.title.len(),
            body_bytes = message.body.len(),
            "Sending Gotify notification"
        );

        let response = self
            .client
            .post(&url)
            .header("X-Gotify-Key", &self.key)
            .json(&serde_json::json!({
                "title": message.title,
                "message": message.body,
                "priority": message.priority
            }))
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("Gotify request failed: {}", e)))?;

        response
            .error_for_status()
            .map_err(|e| Error::NotificationError(format!("Gotify error: {}", e)))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "gotify"
    }
}

// ============================================================================
// ntfy Backend
// ============================================================================

/// ntfy.sh notification backend
#[derive(Debug, Clone)]
pub struct NtfyBackend {
    client: Client,
    base_url: String,
    topic: String,
    token: Option<String>,
}

impl NtfyBackend {
    /// Create a new ntfy backend with explicit URL and topic
    pub fn new(client: Client, url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            client,
            base_url: url.into(),
            topic: topic.into(),
            token: None,
        }
    }

    /// Set bearer token authentication
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

#[async_trait]
impl NotificationBackend for NtfyBackend {
    async fn send(&self, message: &NotificationMessage) -> Result<()> {
        info!(
            topic = %self.topic,
            title = %message.title,
            priority = message.priority,
            "Sending ntfy notification"
        );

        // Topic travels in the JSON body, so post to the base URL
        let url = self.base_url.trim_end_matches('/');
        let mut request = self.client.post(url).json(&serde_json::json!({
            "topic": self.topic,
            "title": message.title,
            "message": message.body,
            "priority": message.priority,
        }));

        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::HttpError(format!("ntfy request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            return Err(Error::NotificationError(format!(
                "ntfy error: {} - {}",
                status, error_body
            )));
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "ntfy"
    }
}

// ============================================================================
// Notification Manager
// ============================================================================

/// Fans a message out to every configured backend
#[derive(Debug, Clone, Default)]
pub struct NotificationManager {
    mail: Option<MailBackend>,
    gotify: Option<GotifyBackend>,
    ntfy: Option<NtfyBackend>,
}

impl NotificationManager {
    /// Build the backends the settings fully describe
    pub fn from_settings(client: Client, settings: &AlertingSettings) -> Self {
        let mail = if settings.mail_recipients.is_empty() {
            None
        } else {
            let command = settings
                .mail_command
                .clone()
                .unwrap_or_else(|| DEFAULT_MAIL_COMMAND.to_string());
            Some(MailBackend::new(command, settings.mail_recipients.clone()))
        };

        let gotify = match (&settings.gotify_url, &settings.gotify_key) {
            (Some(url), Some(key)) => Some(GotifyBackend::new(client.clone(), url, key)),
            _ => None,
        };

        let ntfy = match (&settings.ntfy_url, &settings.ntfy_topic) {
            (Some(url), Some(topic)) => {
                let backend = NtfyBackend::new(client, url, topic);
                Some(match &settings.ntfy_token {
                    Some(token) => backend.with_token(token),
                    None => backend,
                })
            }
            _ => None,
        };

        Self { mail, gotify, ntfy }
    }

    /// Create a new notification manager from pre-configured backends
    pub fn from_backends(
        mail: Option<MailBackend>,
        gotify: Option<GotifyBackend>,
        ntfy: Option<NtfyBackend>,
    ) -> Self {
        Self { mail, gotify, ntfy }
    }

    /// Names of the configured backends
    pub fn backend_names(&self) -> Vec<&str> {
        self.backends().iter().map(|b| b.name()).collect()
    }

    fn backends(&self) -> Vec<&dyn NotificationBackend> {
        let mut backends: Vec<&dyn NotificationBackend> = Vec::new();
        if let Some(backend) = &self.mail {
            backends.push(backend);
        }
        if let Some(backend) = &self.gotify {
            backends.push(backend);
        }
        if let Some(backend) = &self.ntfy {
            backends.push(backend);
        }
        backends
    }

    /// Send via all configured backends
    ///
    /// Every backend is tried; the error lists the ones that failed.
    pub async fn send(&self, message: &NotificationMessage) -> Result<()> {
        let backends = self.backends();
        if backends.is_empty() {
            warn!(title = %message.title, "No notification backend configured");
            return Ok(());
        }

        let mut errors = Vec::new();
        for backend in backends {
            if let Err(e) = backend.send(message).await {
                warn!(backend = backend.name(), error = %e, "Notification failed");
                errors.push(format!("{}: {}", backend.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(Error::NotificationError(errors.join("; ")));
        }

        Ok(())
    }
}

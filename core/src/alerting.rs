//! Operator alerts for states the run cannot repair itself

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::inventory::EnvName;
use crate::notifications::{NotificationManager, NotificationMessage};
use crate::Result;

/// Why manual action is needed on a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AlertReason {
    /// Node agent absent after the startup grace period
    NodeAgentDown,
    /// Sync refused because the profile's JVMs are still running
    SyncRefusedWhileRunning,
    /// Sync could not be confirmed within the retry budget
    SyncUnconfirmed { attempts: u32 },
    /// Server JVM absent after the application grace period
    ServerNotRunning { server: String },
    /// A check could not tell the host's state (unreachable, unexpected exit)
    StateUnknown { detail: String },
}

/// One alert raised during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub host: String,
    #[serde(flatten)]
    pub reason: AlertReason,
}

impl Alert {
    pub fn new(host: impl Into<String>, reason: AlertReason) -> Self {
        Self {
            host: host.into(),
            reason,
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            AlertReason::NodeAgentDown => write!(f, "Node on {} is NOT running", self.host),
            AlertReason::SyncRefusedWhileRunning => {
                write!(f, "Sync cannot be started on {}: JVM is running", self.host)
            }
            AlertReason::SyncUnconfirmed { attempts } => write!(
                f,
                "Sync on {} not confirmed after {} attempts",
                self.host, attempts
            ),
            AlertReason::ServerNotRunning { server } => {
                write!(f, "JVM {} on {} is NOT running", server, self.host)
            }
            AlertReason::StateUnknown { detail } => {
                write!(f, "State of {} is unknown: {}", self.host, detail)
            }
        }
    }
}

/// Delivers alerts to operators
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}

/// [`Alerter`] that sends the fixed deployment warning through a
/// [`NotificationManager`]
#[derive(Debug, Clone)]
pub struct NotificationAlerter {
    env: EnvName,
    manager: NotificationManager,
}

impl NotificationAlerter {
    pub fn new(env: EnvName, manager: NotificationManager) -> Self {
        Self { env, manager }
    }

    pub fn message(&self, alert: &Alert) -> NotificationMessage {
        let label = self.env.alert_label();
        NotificationMessage::new(
            format!("[WARN]: eComm {} Deployment: Action required", label),
            format!(
                "Please check {} Deployment log. Manual action required.\n\n{}",
                label, alert
            ),
        )
        .with_priority(4)
    }
}

#[async_trait]
impl Alerter for NotificationAlerter {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        self.manager.send(&self.message(alert)).await
    }
}

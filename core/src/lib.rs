//! Core library for wasctl
//!
//! Environment inventory, subsystem descriptors, the SSH command runners,
//! and the controller that stops, starts and syncs WebSphere nodes and
//! their server JVMs.

pub mod alerting;
pub mod commands;
pub mod controller;
pub mod error;
pub mod inventory;
pub mod notifications;
pub mod pacing;
pub mod remote;
pub mod run;
pub mod ssh;
pub mod status;
pub mod subsystem;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports
pub use alerting::{Alert, AlertReason, Alerter, NotificationAlerter};
pub use commands::RemoteCommand;
pub use controller::ActionController;
pub use error::{Error, Result};
pub use inventory::{resolve, EnvName, Environment};
pub use notifications::{
    mask_token, AlertingSettings, GotifyBackend, MailBackend, NotificationBackend,
    NotificationManager, NotificationMessage, NtfyBackend,
};
pub use pacing::{Clock, Pacer, SystemClock, Timings, TokioPacer};
pub use remote::{CommandRunner, RemoteExecutor, SshSettings, SshTransport};
pub use run::{Collaborators, RunReport};
pub use ssh::NativeSshRunner;
pub use status::{check_status, Severity, StatusChecker};
pub use subsystem::{describe, HostAssignment, SubsystemDescriptor, SubsystemKind};
pub use types::{Action, CommandOutcome};

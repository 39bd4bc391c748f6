//! Shared types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Result of running one command on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Command ran and exited 0
    Success,
    /// Command ran and exited non-zero
    Failure { code: i32 },
    /// Host could not be reached, or the command never finished
    Unreachable { reason: String },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }

    /// Exit code if the command actually ran
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            CommandOutcome::Success => Some(0),
            CommandOutcome::Failure { code } => Some(*code),
            CommandOutcome::Unreachable { .. } => None,
        }
    }

    /// True for a `grep` pipeline that ran and matched nothing
    pub fn is_no_match(&self) -> bool {
        self.exit_code() == Some(1)
    }

    /// Map a process exit code
    pub fn from_exit_code(code: i32) -> Self {
        if code == 0 {
            CommandOutcome::Success
        } else {
            CommandOutcome::Failure { code }
        }
    }
}

impl fmt::Display for CommandOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutcome::Success => f.write_str("success"),
            CommandOutcome::Failure { code } => write!(f, "exit {}", code),
            CommandOutcome::Unreachable { reason } => write!(f, "unreachable: {}", reason),
        }
    }
}

/// Lifecycle action applied to a subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Stop,
    Start,
    Sync,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Stop => "stop",
            Action::Start => "start",
            Action::Sync => "sync",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(Action::Stop),
            "start" => Ok(Action::Start),
            "sync" => Ok(Action::Sync),
            other => Err(Error::ConfigError(format!(
                "wrong action specified: {}",
                other
            ))),
        }
    }
}

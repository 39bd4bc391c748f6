//! Post-action state checks
//!
//! `sync_stat` confirms a node sync finished (bounded retry per host);
//! `app_stat` confirms every server JVM came up (single check).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{error, info, instrument, warn};

use crate::alerting::{Alert, AlertReason};
use crate::commands::RemoteCommand;
use crate::pacing::{log_date_stamp, poll, PollResult, Timings};
use crate::run::{Collaborators, RunReport};
use crate::subsystem::{HostAssignment, SubsystemDescriptor};
use crate::{CommandOutcome, Error, Result};

/// Severity tag for [`check_status`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        })
    }
}

/// Return code that, tagged [`Severity::Error`], ends the run
pub const FATAL_RC: i32 = 1;

/// Log a status line; severity `Error` with rc 1 is fatal
///
/// Anything else is logged and the run continues.
pub fn check_status(rc: i32, message: &str, severity: Severity) -> Result<()> {
    let line = format!("{}: {} ({})", severity, message, rc);
    match severity {
        Severity::Error => error!("{}", line),
        Severity::Warning => warn!("{}", line),
        Severity::Info => info!("{}", line),
    }

    if severity == Severity::Error && rc == FATAL_RC {
        return Err(Error::Fatal {
            code: rc,
            message: message.to_string(),
        });
    }
    Ok(())
}

/// Confirms the effect of start and sync actions
pub struct StatusChecker {
    collab: Collaborators,
    timings: Timings,
}

impl StatusChecker {
    pub fn new(collab: Collaborators, timings: Timings) -> Self {
        Self { collab, timings }
    }

    /// Wait for each host's node sync to finish successfully
    ///
    /// Returns the hosts whose sync was confirmed. Every other host gets
    /// exactly one alert.
    #[instrument(skip_all, fields(subsystem = %desc.kind))]
    pub async fn sync_stat(
        &self,
        desc: &SubsystemDescriptor,
        report: &mut RunReport,
    ) -> Vec<String> {
        let mut confirmed = Vec::new();

        for host in desc.hosts() {
            let issued = AtomicUsize::new(0);
            let (subsystem, action) = (report.subsystem, report.action);

            let result = poll(
                self.collab.pacer.as_ref(),
                self.timings.sync_attempts,
                self.timings.sync_backoff(),
                "node sync to finish",
                |attempt| {
                    let issued = &issued;
                    async move {
                        // Attempts count into a scratch report, merged below
                        let mut scratch = RunReport::new(subsystem, action);
                        let done = self.sync_finished(desc, host, attempt, &mut scratch).await;
                        issued.fetch_add(scratch.commands_issued, Ordering::Relaxed);
                        done
                    }
                },
            )
            .await;

            report.commands_issued += issued.into_inner();
            match result {
                PollResult::Ready { .. } => {
                    info!(host = %host, "Sync on {} completed successfully", host);
                    confirmed.push(host.to_string());
                }
                PollResult::Exhausted { attempts } => {
                    let alert = Alert::new(host, AlertReason::SyncUnconfirmed { attempts });
                    self.collab.raise(alert, report).await;
                }
            }
        }

        confirmed
    }

    /// One confirmation attempt: no `syncNode.sh` running and today's
    /// log has the success marker
    async fn sync_finished(
        &self,
        desc: &SubsystemDescriptor,
        host: &str,
        attempt: u32,
        report: &mut RunReport,
    ) -> bool {
        info!(host = %host, attempt, "Checking Sync Node process status");

        let process = self
            .collab
            .issue(host, RemoteCommand::SyncProcessCheck, report)
            .await;
        let date = log_date_stamp(self.collab.clock.today());
        let log = self
            .collab
            .issue(
                host,
                RemoteCommand::SyncLogCheck {
                    log_dir: &desc.log_dir,
                    date: &date,
                },
                report,
            )
            .await;

        let done = process.is_no_match() && log.is_success();
        if !done {
            warn!(
                host = %host,
                attempt,
                sync_process = %process,
                sync_log = %log,
                "Sync failed or process still running"
            );
        }
        done
    }

    /// Check every server JVM on the given hosts once
    #[instrument(skip_all, fields(subsystem = %desc.kind))]
    pub async fn app_stat(
        &self,
        desc: &SubsystemDescriptor,
        assignments: &[&HostAssignment],
        report: &mut RunReport,
    ) {
        for assignment in assignments {
            let host = assignment.host.as_str();
            for server in &assignment.servers {
                info!(host = %host, server = %server, "Checking JVM status");

                let outcome = self
                    .collab
                    .issue(
                        host,
                        RemoteCommand::ServerProcessCheck {
                            filter: &desc.process_filter,
                            server,
                        },
                        report,
                    )
                    .await;

                match outcome {
                    CommandOutcome::Success => {
                        info!(host = %host, server = %server, "JVM {} on {} is running", server, host);
                    }
                    CommandOutcome::Failure { .. } => {
                        let reason = AlertReason::ServerNotRunning {
                            server: server.clone(),
                        };
                        self.collab.raise(Alert::new(host, reason), report).await;
                    }
                    CommandOutcome::Unreachable { reason } => {
                        let reason = AlertReason::StateUnknown {
                            detail: format!("JVM check for {}: {}", server, reason),
                        };
                        self.collab.raise(Alert::new(host, reason), report).await;
                    }
                }
            }
        }
    }
}

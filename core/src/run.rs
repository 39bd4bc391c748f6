//! Per-run collaborators and the summary they fill in

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::alerting::{Alert, Alerter};
use crate::commands::RemoteCommand;
use crate::pacing::{Clock, Pacer};
use crate::remote::CommandRunner;
use crate::subsystem::SubsystemKind;
use crate::{Action, CommandOutcome};

/// Out-of-process collaborators used by a run
#[derive(Clone)]
pub struct Collaborators {
    pub runner: Arc<dyn CommandRunner>,
    pub pacer: Arc<dyn Pacer>,
    pub clock: Arc<dyn Clock>,
    pub alerter: Arc<dyn Alerter>,
}

impl Collaborators {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        pacer: Arc<dyn Pacer>,
        clock: Arc<dyn Clock>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self {
            runner,
            pacer,
            clock,
            alerter,
        }
    }

    /// Run `command` on `host` and count it
    pub(crate) async fn issue(
        &self,
        host: &str,
        command: RemoteCommand<'_>,
        report: &mut RunReport,
    ) -> CommandOutcome {
        report.commands_issued += 1;
        self.runner.run(host, &command.to_string()).await
    }

    /// Like [`Self::issue`] for fire-and-forget commands; only logs problems
    pub(crate) async fn dispatch(
        &self,
        host: &str,
        command: RemoteCommand<'_>,
        report: &mut RunReport,
    ) {
        let outcome = self.issue(host, command, report).await;
        if !outcome.is_success() {
            warn!(host = %host, command = command.name(), outcome = %outcome, "Command did not succeed");
        }
    }

    /// Log `alert` and hand it to the alerter
    ///
    /// Delivery failures are logged and counted, never propagated.
    pub(crate) async fn raise(&self, alert: Alert, report: &mut RunReport) {
        error!(host = %alert.host, "{}. Please check manually.", alert);

        if let Err(e) = self.alerter.notify(&alert).await {
            error!(host = %alert.host, error = %e, "Alert could not be delivered");
            report.failed_deliveries += 1;
        }
        report.alerts.push(alert);
    }
}

/// Summary of one orchestration run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub subsystem: SubsystemKind,
    pub action: Action,
    pub commands_issued: usize,
    pub alerts: Vec<Alert>,
    /// Alerts the alerter failed to deliver
    pub failed_deliveries: usize,
}

impl RunReport {
    pub fn new(subsystem: SubsystemKind, action: Action) -> Self {
        Self {
            subsystem,
            action,
            commands_issued: 0,
            alerts: Vec::new(),
            failed_deliveries: 0,
        }
    }

    /// No alert was raised
    pub fn is_clean(&self) -> bool {
        self.alerts.is_empty()
    }

    /// Alerts raised for `host`
    pub fn alerts_for<'a>(&'a self, host: &'a str) -> impl Iterator<Item = &'a Alert> + 'a {
        self.alerts.iter().filter(move |a| a.host == host)
    }
}

//! Action controller
//!
//! Sequences stop, start and sync across a subsystem's hosts. Hosts are
//! visited strictly in order and every remote call is awaited before the
//! next one is issued.
//!
//! - **stop** is fire and forget: node stop, then the host's servers.
//! - **start** is gated on a confirmed sync, then on a live node agent.
//! - **sync** is refused on hosts whose JVMs are still running.

use std::time::Duration;
use tracing::{error, info, instrument, warn};

use crate::alerting::{Alert, AlertReason};
use crate::commands::RemoteCommand;
use crate::inventory;
use crate::pacing::Timings;
use crate::run::{Collaborators, RunReport};
use crate::status::StatusChecker;
use crate::subsystem::{describe, HostAssignment, SubsystemDescriptor, COORDINATOR_PORT};
use crate::{Action, CommandOutcome, Result};

/// Drives one action over one subsystem
pub struct ActionController {
    collab: Collaborators,
    timings: Timings,
    checker: StatusChecker,
}

impl ActionController {
    pub fn new(collab: Collaborators, timings: Timings) -> Self {
        let checker = StatusChecker::new(collab.clone(), timings.clone());
        Self {
            collab,
            timings,
            checker,
        }
    }

    /// Resolve names and run the action
    ///
    /// Unknown environment, subsystem or action names fail with
    /// [`crate::Error::ConfigError`] before any remote command is issued.
    pub async fn run_request(
        &self,
        env: &str,
        subsystem: &str,
        action: &str,
        app_grace: Option<Duration>,
    ) -> Result<RunReport> {
        let env = inventory::resolve(env)?;
        let desc = describe(subsystem.parse()?, &env)?;
        let action: Action = action.parse()?;
        Ok(self.execute(&desc, action, app_grace).await)
    }

    /// Run `action` over every host of `desc`
    ///
    /// `app_grace` overrides the configured wait between server start
    /// and the JVM check.
    #[instrument(skip_all, fields(subsystem = %desc.kind, action = %action))]
    pub async fn execute(
        &self,
        desc: &SubsystemDescriptor,
        action: Action,
        app_grace: Option<Duration>,
    ) -> RunReport {
        let mut report = RunReport::new(desc.kind, action);

        match action {
            Action::Stop => self.stop(desc, &mut report).await,
            Action::Start => {
                let grace = app_grace.unwrap_or_else(|| self.timings.app_startup());
                info!(seconds = grace.as_secs(), "Using application grace period");
                self.start(desc, grace, &mut report).await
            }
            Action::Sync => self.sync(desc, &mut report).await,
        }

        info!(
            commands = report.commands_issued,
            alerts = report.alerts.len(),
            "Action finished"
        );
        report
    }

    async fn stop(&self, desc: &SubsystemDescriptor, report: &mut RunReport) {
        for assignment in &desc.assignments {
            let host = assignment.host.as_str();
            info!(host = %host, "Stopping Node on {}", host);
            self.collab
                .dispatch(host, RemoteCommand::StopNode { bin_dir: &desc.bin_dir }, report)
                .await;

            for server in &assignment.servers {
                info!(host = %host, server = %server, "Stopping App {}", server);
                self.collab
                    .dispatch(
                        host,
                        RemoteCommand::StopServer {
                            bin_dir: &desc.bin_dir,
                            server,
                        },
                        report,
                    )
                    .await;
            }
        }
    }

    async fn start(&self, desc: &SubsystemDescriptor, grace: Duration, report: &mut RunReport) {
        let synced = self.checker.sync_stat(desc, report).await;
        let eligible: Vec<&HostAssignment> = desc
            .assignments
            .iter()
            .filter(|a| {
                let ok = synced.contains(&a.host);
                if !ok {
                    error!(host = %a.host, "Skipping start on {}: sync not confirmed", a.host);
                }
                ok
            })
            .collect();

        if eligible.is_empty() {
            error!("No host passed the sync check; nothing to start");
            return;
        }

        for assignment in &eligible {
            let host = assignment.host.as_str();
            info!(host = %host, "Starting Node on {}", host);
            self.collab
                .dispatch(host, RemoteCommand::StartNode { bin_dir: &desc.bin_dir }, report)
                .await;
        }

        self.collab
            .pacer
            .wait(self.timings.node_startup(), "node agent startup")
            .await;

        let mut started = Vec::new();
        for assignment in eligible {
            if self.node_agent_running(desc, assignment, report).await {
                for server in &assignment.servers {
                    info!(host = %assignment.host, server = %server, "Starting App {}", server);
                    self.collab
                        .dispatch(
                            &assignment.host,
                            RemoteCommand::StartServer {
                                bin_dir: &desc.bin_dir,
                                server,
                            },
                            report,
                        )
                        .await;
                }
                started.push(assignment);
            }
        }

        if started.is_empty() {
            error!("No node agent came up; skipping application checks");
            return;
        }

        self.collab.pacer.wait(grace, "application startup").await;
        self.checker.app_stat(desc, &started, report).await;
    }

    /// Node agent check; alerts once when the agent is not confirmed
    async fn node_agent_running(
        &self,
        desc: &SubsystemDescriptor,
        assignment: &HostAssignment,
        report: &mut RunReport,
    ) -> bool {
        let host = assignment.host.as_str();
        info!(host = %host, "Checking Node agent status on {}", host);

        let outcome = self
            .collab
            .issue(
                host,
                RemoteCommand::NodeAgentCheck {
                    filter: &desc.process_filter,
                },
                report,
            )
            .await;

        let reason = match outcome {
            CommandOutcome::Success => {
                info!(host = %host, "Node on {} is running", host);
                return true;
            }
            CommandOutcome::Failure { .. } => AlertReason::NodeAgentDown,
            CommandOutcome::Unreachable { reason } => AlertReason::StateUnknown {
                detail: format!("node agent check: {}", reason),
            },
        };
        self.collab.raise(Alert::new(host, reason), report).await;
        false
    }

    async fn sync(&self, desc: &SubsystemDescriptor, report: &mut RunReport) {
        for host in desc.hosts() {
            info!(host = %host, "Checking JVM processes on {}", host);

            let outcome = self
                .collab
                .issue(
                    host,
                    RemoteCommand::ProcessCheck {
                        filter: &desc.process_filter,
                    },
                    report,
                )
                .await;

            let reason = match outcome {
                // grep matched nothing: safe to sync
                CommandOutcome::Failure { code: 1 } => {
                    info!(host = %host, "JVM process on {} is NOT running. Syncing Node", host);
                    self.collab
                        .dispatch(
                            host,
                            RemoteCommand::SyncNode {
                                bin_dir: &desc.bin_dir,
                                coordinator: &desc.coordinator_host,
                                port: COORDINATOR_PORT,
                            },
                            report,
                        )
                        .await;
                    continue;
                }
                CommandOutcome::Success => AlertReason::SyncRefusedWhileRunning,
                CommandOutcome::Failure { code } => {
                    warn!(host = %host, code, "Process check exited unexpectedly");
                    AlertReason::StateUnknown {
                        detail: format!("process check exited {}", code),
                    }
                }
                CommandOutcome::Unreachable { reason } => AlertReason::StateUnknown {
                    detail: format!("process check: {}", reason),
                },
            };
            self.collab.raise(Alert::new(host, reason), report).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::resolve;
    use crate::subsystem::SubsystemKind;
    use crate::testing::Harness;
    use crate::Error;

    fn controller(harness: &Harness) -> ActionController {
        ActionController::new(harness.collaborators(), Timings::default())
    }

    fn app(env: &str) -> SubsystemDescriptor {
        describe(SubsystemKind::Application, &resolve(env).unwrap()).unwrap()
    }

    /// Scripts a healthy start: sync finished, agents and JVMs up
    fn healthy_start(harness: &Harness) {
        harness
            .runner
            .on("grep syncNode.sh", CommandOutcome::Failure { code: 1 });
    }

    #[tokio::test]
    async fn test_stop_stg_command_sequence() {
        let harness = Harness::new();
        let report = controller(&harness)
            .execute(&app("stg"), Action::Stop, None)
            .await;

        let bin = "/usr/opt/app/IBM/WebSphere/AppServer/profiles/stg01/bin";
        assert_eq!(
            harness.runner.calls(),
            vec![
                (
                    "stgsrv601".to_string(),
                    format!("{}/stopNode.sh > /dev/null 2>&1 &", bin)
                ),
                (
                    "stgsrv601".to_string(),
                    format!("{}/stopServer.sh server1 > /dev/null 2>&1 &", bin)
                ),
            ]
        );
        assert!(report.is_clean());
        assert!(harness.alerter.alerts().is_empty());
        assert!(harness.pacer.waits().is_empty());
    }

    #[tokio::test]
    async fn test_stop_is_host_major_and_unchecked() {
        let harness = Harness::new();
        // Failures are ignored on stop
        harness.runner.on("stopServer.sh", CommandOutcome::Failure { code: 3 });
        let report = controller(&harness)
            .execute(&app("prd2"), Action::Stop, None)
            .await;

        let calls = harness.runner.calls();
        // stopNode.sh runs on every host, so 5 node stops + 9 server stops
        // rather than a single node stop plus the servers
        assert_eq!(calls.len(), 14);
        assert_eq!(report.commands_issued, 14);
        assert!(calls[0].1.contains("stopNode.sh"));
        assert!(calls[1].1.contains("stopServer.sh app1sc01"));
        assert_eq!(calls[2].0, "hostname611");
        assert!(calls[2].1.contains("stopNode.sh"));
        assert!(calls[3].1.contains("stopServer.sh app111"));
        assert!(calls[4].1.contains("stopServer.sh app211"));
        assert!(calls.iter().all(|(_, c)| !c.starts_with("ps -ef")));
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_start_happy_path() {
        let harness = Harness::new();
        healthy_start(&harness);
        let report = controller(&harness)
            .execute(&app("stg"), Action::Start, None)
            .await;

        let commands = harness.runner.commands();
        assert!(commands[0].contains("grep syncNode.sh"));
        assert!(commands[1].contains("syncNode.log"));
        assert!(commands[2].contains("startNode.sh"));
        assert!(commands[3].contains("grep nodeagent | grep stg01_node"));
        assert!(commands[4].contains("startServer.sh server1"));
        assert!(commands[5].contains("grep java | grep stg01_node | grep server1"));
        assert_eq!(commands.len(), 6);

        assert_eq!(
            harness.pacer.waits(),
            vec![Duration::from_secs(150), Duration::from_secs(900)]
        );
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_start_grace_period_override() {
        let harness = Harness::new();
        healthy_start(&harness);
        controller(&harness)
            .execute(&app("stg"), Action::Start, Some(Duration::from_secs(60)))
            .await;

        assert_eq!(
            harness.pacer.waits(),
            vec![Duration::from_secs(150), Duration::from_secs(60)]
        );
    }

    #[tokio::test]
    async fn test_start_skips_servers_when_node_agent_down() {
        let harness = Harness::new();
        healthy_start(&harness);
        harness
            .runner
            .on_host("hostname612", "grep nodeagent", CommandOutcome::Failure { code: 1 });
        let report = controller(&harness)
            .execute(&app("prd1"), Action::Start, None)
            .await;

        let on_612: Vec<String> = harness
            .runner
            .calls()
            .into_iter()
            .filter(|(h, _)| h == "hostname612")
            .map(|(_, c)| c)
            .collect();
        assert!(on_612.iter().all(|c| !c.contains("startServer.sh")));
        assert!(on_612.iter().all(|c| !c.contains("grep java")));

        let alerts = harness.alerter.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0], Alert::new("hostname612", AlertReason::NodeAgentDown));
        assert_eq!(report.alerts_for("hostname612").count(), 1);

        let server_starts = harness
            .runner
            .commands()
            .iter()
            .filter(|c| c.contains("startServer.sh"))
            .count();
        assert_eq!(server_starts, 6);
    }

    #[tokio::test]
    async fn test_start_gated_on_sync() {
        let harness = Harness::new();
        // syncNode.sh still running everywhere
        harness.runner.on("grep syncNode.sh", CommandOutcome::Success);
        let report = controller(&harness)
            .execute(&app("stg"), Action::Start, None)
            .await;

        assert!(harness
            .runner
            .commands()
            .iter()
            .all(|c| !c.contains("startNode.sh") && !c.contains("startServer.sh")));
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(
            report.alerts[0].reason,
            AlertReason::SyncUnconfirmed { attempts: 3 }
        );
        // Only the two sync backoffs; no grace periods
        assert_eq!(harness.pacer.waits(), vec![Duration::from_secs(300); 2]);
    }

    #[tokio::test]
    async fn test_start_checks_only_started_hosts() {
        let harness = Harness::new();
        healthy_start(&harness);
        harness.runner.on_host(
            "hostname610",
            "grep nodeagent",
            CommandOutcome::Unreachable {
                reason: "connection refused".into(),
            },
        );
        let report = controller(&harness)
            .execute(&app("prd1"), Action::Start, None)
            .await;

        let jvm_checks: Vec<(String, String)> = harness
            .runner
            .calls()
            .into_iter()
            .filter(|(_, c)| c.contains("grep java"))
            .collect();
        assert_eq!(jvm_checks.len(), 6);
        assert!(jvm_checks.iter().all(|(h, _)| h != "hostname610"));
        assert_eq!(report.alerts.len(), 1);
        assert!(matches!(
            report.alerts[0].reason,
            AlertReason::StateUnknown { .. }
        ));
    }

    #[tokio::test]
    async fn test_sync_issues_command_when_not_running() {
        let harness = Harness::new();
        harness
            .runner
            .on("ps -ef | grep stg01_search", CommandOutcome::Failure { code: 1 });
        let desc = describe(SubsystemKind::Search, &resolve("stg").unwrap()).unwrap();
        let report = controller(&harness).execute(&desc, Action::Sync, None).await;

        let commands = harness.runner.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands[1],
            "/usr/opt/app/IBM/WebSphere/AppServer/profiles/stg01_solr/bin/syncNode.sh stg601 8879 > /dev/null 2>&1 &"
        );
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_sync_refused_while_running() {
        let harness = Harness::new();
        harness.runner.on_host(
            "hostname612",
            "ps -ef | grep prod01_node",
            CommandOutcome::Failure { code: 1 },
        );
        let report = controller(&harness)
            .execute(&app("prd1"), Action::Sync, None)
            .await;

        let syncs: Vec<(String, String)> = harness
            .runner
            .calls()
            .into_iter()
            .filter(|(_, c)| c.contains("syncNode.sh hostname601 8879"))
            .collect();
        assert_eq!(syncs.len(), 1);
        assert_eq!(syncs[0].0, "hostname612");

        let alerts = harness.alerter.alerts();
        assert_eq!(alerts.len(), 3);
        assert!(alerts
            .iter()
            .all(|a| a.reason == AlertReason::SyncRefusedWhileRunning));
        assert_eq!(report.alerts_for("hostname612").count(), 0);
    }

    #[tokio::test]
    async fn test_sync_unreachable_host_is_not_synced() {
        let harness = Harness::new();
        harness.runner.on(
            "ps -ef | grep stg01_node",
            CommandOutcome::Unreachable {
                reason: "timeout".into(),
            },
        );
        let report = controller(&harness)
            .execute(&app("stg"), Action::Sync, None)
            .await;

        assert_eq!(harness.runner.calls().len(), 1);
        assert_eq!(report.alerts.len(), 1);
        assert!(matches!(
            report.alerts[0].reason,
            AlertReason::StateUnknown { .. }
        ));
    }

    #[tokio::test]
    async fn test_run_request_rejects_unknown_names_before_any_command() {
        let harness = Harness::new();
        let controller = controller(&harness);

        for (env, subsystem, action) in [
            ("prd9", "application", "stop"),
            ("stg", "web", "stop"),
            ("stg", "application", "restart"),
        ] {
            let err = controller
                .run_request(env, subsystem, action, None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::ConfigError(_)));
        }
        assert!(harness.runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_request_stop_stg() {
        let harness = Harness::new();
        let report = controller(&harness)
            .run_request("stg", "wc", "stop", None)
            .await
            .unwrap();

        assert_eq!(report.action, Action::Stop);
        assert_eq!(report.subsystem, SubsystemKind::Application);
        assert_eq!(report.commands_issued, 2);
    }
}

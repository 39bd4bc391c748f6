//! Scripted collaborators for unit tests

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::alerting::{Alert, Alerter};
use crate::pacing::{Clock, Pacer};
use crate::remote::CommandRunner;
use crate::run::Collaborators;
use crate::{CommandOutcome, Error, Result};

struct Rule {
    host: Option<String>,
    needle: String,
    /// Popped in order; the last one repeats
    outcomes: VecDeque<CommandOutcome>,
}

/// Runner answering from rules; the first matching rule wins, otherwise `Success`
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedRunner {
    fn push(&self, host: Option<&str>, needle: &str, outcomes: Vec<CommandOutcome>) {
        self.rules.lock().unwrap().push(Rule {
            host: host.map(str::to_string),
            needle: needle.to_string(),
            outcomes: outcomes.into(),
        });
    }

    /// Any command containing `needle`, on any host
    pub fn on(&self, needle: &str, outcome: CommandOutcome) {
        self.push(None, needle, vec![outcome]);
    }

    /// Commands containing `needle` on `host` only
    pub fn on_host(&self, host: &str, needle: &str, outcome: CommandOutcome) {
        self.push(Some(host), needle, vec![outcome]);
    }

    /// Successive answers for `needle`, repeating the last
    pub fn on_seq(&self, needle: &str, outcomes: Vec<CommandOutcome>) {
        self.push(None, needle, outcomes);
    }

    /// Every `(host, command)` pair, in issue order
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.calls().into_iter().map(|(_, c)| c).collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, host: &str, command: &str) -> CommandOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((host.to_string(), command.to_string()));

        let mut rules = self.rules.lock().unwrap();
        let rule = rules.iter_mut().find(|rule| {
            rule.host.as_deref().map_or(true, |h| h == host) && command.contains(&rule.needle)
        });

        match rule {
            Some(rule) if rule.outcomes.len() > 1 => rule.outcomes.pop_front().unwrap(),
            Some(rule) => rule.outcomes[0].clone(),
            None => CommandOutcome::Success,
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Pacer that records waits and returns immediately
#[derive(Default)]
pub struct RecordingPacer {
    waits: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    async fn wait(&self, duration: Duration, _reason: &str) {
        self.waits.lock().unwrap().push(duration);
    }
}

/// Alerter that records alerts, optionally failing every delivery
#[derive(Default)]
pub struct RecordingAlerter {
    alerts: Mutex<Vec<Alert>>,
    fail: Mutex<bool>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn fail_deliveries(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        if *self.fail.lock().unwrap() {
            return Err(Error::NotificationError("mail client missing".into()));
        }
        Ok(())
    }
}

/// Clock pinned to one date
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// One of each recording collaborator, dated 2026-10-17
pub struct Harness {
    pub runner: Arc<ScriptedRunner>,
    pub pacer: Arc<RecordingPacer>,
    pub alerter: Arc<RecordingAlerter>,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            runner: Arc::new(ScriptedRunner::default()),
            pacer: Arc::new(RecordingPacer::default()),
            alerter: Arc::new(RecordingAlerter::default()),
            clock: Arc::new(FixedClock(NaiveDate::from_ymd_opt(2026, 10, 17).unwrap())),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new(
            self.runner.clone(),
            self.pacer.clone(),
            self.clock.clone(),
            self.alerter.clone(),
        )
    }
}

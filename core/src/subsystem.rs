//! Process-group descriptors
//!
//! A descriptor selects one subsystem (application servers or search
//! servers) out of an [`Environment`] and pairs every host with the
//! server instances it runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::inventory::Environment;
use crate::{Error, Result};

/// Port the deployment manager accepts node syncs on
pub const COORDINATOR_PORT: u16 = 8879;

/// Managed subsystem type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubsystemKind {
    /// Commerce application servers
    Application,
    /// Search (Solr) servers
    Search,
}

impl SubsystemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubsystemKind::Application => "application",
            SubsystemKind::Search => "search",
        }
    }
}

impl fmt::Display for SubsystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubsystemKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "application" | "app" | "wc" => Ok(SubsystemKind::Application),
            "search" | "solr" => Ok(SubsystemKind::Search),
            other => Err(Error::ConfigError(format!(
                "wrong subsystem type specified: {}",
                other
            ))),
        }
    }
}

/// One host and the server instances assigned to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAssignment {
    pub host: String,
    pub servers: Vec<String>,
}

/// Operational parameters for one subsystem of an environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsystemDescriptor {
    pub kind: SubsystemKind,
    pub bin_dir: String,
    pub log_dir: String,
    /// Substring identifying this subsystem's processes in `ps -ef`
    pub process_filter: String,
    pub cache_ports: Vec<u16>,
    pub protocol: String,
    pub coordinator_host: String,
    pub assignments: Vec<HostAssignment>,
}

impl SubsystemDescriptor {
    /// Build a descriptor, pairing hosts with servers positionally
    ///
    /// Host `i` takes the next `quantities[i]` names from `servers`.
    /// Fails unless there is one quantity per host and the quantities
    /// account for every server name exactly.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: SubsystemKind,
        bin_dir: String,
        log_dir: String,
        process_filter: String,
        hosts: &[String],
        servers: &[String],
        quantities: &[usize],
        cache_ports: Vec<u16>,
        protocol: &str,
        coordinator_host: String,
    ) -> Result<Self> {
        if quantities.len() != hosts.len() {
            return Err(Error::ConfigError(format!(
                "{}: {} quantities for {} hosts",
                kind,
                quantities.len(),
                hosts.len()
            )));
        }

        let total: usize = quantities.iter().sum();
        if total != servers.len() {
            return Err(Error::ConfigError(format!(
                "{}: quantities add up to {} but {} server names are listed",
                kind,
                total,
                servers.len()
            )));
        }

        let mut remaining = servers;
        let assignments = hosts
            .iter()
            .zip(quantities)
            .map(|(host, &qty)| {
                let (taken, rest) = remaining.split_at(qty);
                remaining = rest;
                HostAssignment {
                    host: host.clone(),
                    servers: taken.to_vec(),
                }
            })
            .collect();

        Ok(Self {
            kind,
            bin_dir,
            log_dir,
            process_filter,
            cache_ports,
            protocol: protocol.to_string(),
            coordinator_host,
            assignments,
        })
    }

    /// Hosts in visiting order
    pub fn hosts(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.host.as_str())
    }

    /// Total number of server instances across all hosts
    pub fn server_count(&self) -> usize {
        self.assignments.iter().map(|a| a.servers.len()).sum()
    }
}

/// Describe one subsystem of an environment
pub fn describe(kind: SubsystemKind, env: &Environment) -> Result<SubsystemDescriptor> {
    match kind {
        SubsystemKind::Search => SubsystemDescriptor::new(
            kind,
            env.search_bin(),
            env.search_logs(),
            format!("{}_search", env.instance),
            &env.search_hosts,
            &env.search_servers,
            &env.search_quantities,
            vec![10116],
            "http",
            env.coordinator_host.clone(),
        ),
        SubsystemKind::Application => SubsystemDescriptor::new(
            kind,
            env.was_bin(),
            env.was_logs(),
            format!("{}_node", env.instance),
            &env.app_hosts,
            &env.app_servers,
            &env.app_quantities,
            vec![10117, 10147],
            "https",
            env.coordinator_host.clone(),
        ),
    }
}

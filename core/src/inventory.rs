//! Environment registry
//!
//! Maps an environment name to its fixed host inventory and the profile
//! paths derived from its instance name. Resolution is a pure lookup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// WebSphere installation root shared by every environment
pub const WAS_ROOT: &str = "/usr/opt/app/IBM/WebSphere/AppServer";

/// Known deployment environments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvName {
    Prd1,
    Prd2,
    Stg,
}

impl EnvName {
    /// All known environments
    pub fn all() -> [EnvName; 3] {
        [EnvName::Prd1, EnvName::Prd2, EnvName::Stg]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvName::Prd1 => "prd1",
            EnvName::Prd2 => "prd2",
            EnvName::Stg => "stg",
        }
    }

    /// Label used in alert titles ("PROD" / "STG")
    pub fn alert_label(&self) -> &'static str {
        match self {
            EnvName::Prd1 | EnvName::Prd2 => "PROD",
            EnvName::Stg => "STG",
        }
    }
}

impl fmt::Display for EnvName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnvName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prd1" => Ok(EnvName::Prd1),
            "prd2" => Ok(EnvName::Prd2),
            "stg" => Ok(EnvName::Stg),
            other => Err(Error::ConfigError(format!(
                "Incorrect environment name: {}",
                other
            ))),
        }
    }
}

/// Resolved environment inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: EnvName,
    pub app_hosts: Vec<String>,
    pub web_hosts: Vec<String>,
    pub search_hosts: Vec<String>,
    /// Deployment manager host that nodes sync against
    pub coordinator_host: String,
    pub app_quantities: Vec<usize>,
    pub search_quantities: Vec<usize>,
    pub app_servers: Vec<String>,
    pub search_servers: Vec<String>,
    /// Profile instance name, e.g. `prod01`
    pub instance: String,
}

impl Environment {
    /// `<WAS_ROOT>/profiles/<instance>`
    pub fn profile_dir(&self) -> String {
        profile_dir(&self.instance)
    }

    pub fn was_bin(&self) -> String {
        format!("{}/bin", self.profile_dir())
    }

    pub fn was_logs(&self) -> String {
        format!("{}/logs", self.profile_dir())
    }

    /// Search profile instance name, `<instance>_solr`
    pub fn search_instance(&self) -> String {
        format!("{}_solr", self.instance)
    }

    pub fn search_bin(&self) -> String {
        format!("{}/bin", profile_dir(&self.search_instance()))
    }

    pub fn search_logs(&self) -> String {
        format!("{}/logs", profile_dir(&self.search_instance()))
    }
}

fn profile_dir(instance: &str) -> String {
    format!("{}/profiles/{}", WAS_ROOT, instance)
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Resolve an environment by name
///
/// Fails with [`Error::ConfigError`] for names outside [`EnvName`].
pub fn resolve(name: &str) -> Result<Environment> {
    Ok(inventory(name.parse()?))
}

/// Built-in inventory for a known environment
pub fn inventory(name: EnvName) -> Environment {
    match name {
        EnvName::Prd1 => Environment {
            name,
            app_hosts: names(&["hostname610", "hostname612", "hostname614", "hostname616"]),
            web_hosts: names(&[
                "hostnameweb601",
                "hostnameweb602",
                "hostnameweb603",
                "hostnameweb604",
                "hostnameweb605",
            ]),
            search_hosts: names(&["hostnamesrch601", "hostnamesrch603", "hostnamesrch608"]),
            coordinator_host: "hostname601".to_string(),
            app_quantities: vec![2, 2, 2, 2],
            search_quantities: vec![1, 1, 1],
            app_servers: names(&[
                "app110", "app210", "app112", "app212", "app114", "app214", "app116", "app216",
            ]),
            search_servers: names(&["srchapp1", "srchapp3", "srchapp8"]),
            instance: "prod01".to_string(),
        },
        EnvName::Prd2 => Environment {
            name,
            app_hosts: names(&[
                "ws8sc601",
                "hostname611",
                "hostname613",
                "hostname615",
                "hostname617",
            ]),
            web_hosts: names(&[
                "hostnameweb601",
                "hostnameweb602",
                "hostnameweb603",
                "hostnameweb604",
                "hostnameweb605",
            ]),
            search_hosts: names(&["hostnamesrch602", "hostnamesrch604"]),
            coordinator_host: "hostname601".to_string(),
            app_quantities: vec![1, 2, 2, 2, 2],
            search_quantities: vec![1, 1],
            app_servers: names(&[
                "app1sc01", "app111", "app211", "app113", "app213", "app115", "app215", "app117",
                "app217",
            ]),
            search_servers: names(&["srchapp2", "srchapp4"]),
            instance: "prod01".to_string(),
        },
        EnvName::Stg => Environment {
            name,
            app_hosts: names(&["stgsrv601"]),
            web_hosts: names(&["stgsrveb601"]),
            search_hosts: names(&["stgsrch601"]),
            coordinator_host: "stg601".to_string(),
            app_quantities: vec![1],
            search_quantities: vec![1],
            app_servers: names(&["server1"]),
            search_servers: names(&["srchapp1"]),
            instance: "stg01".to_string(),
        },
    }
}

//! Configuration management

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use wasctl_core::{AlertingSettings, Error, Result, SshSettings, SshTransport, Timings};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SSH transport and connection settings
    pub ssh: SshSettings,

    /// Grace periods and sync retry budget
    pub timings: Timings,

    /// Alert delivery backends
    pub alerting: AlertingSettings,
}

impl Config {
    /// Load configuration from file or environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(p) = path {
            Self::load_from_file(p)
        } else {
            Self::load_from_env()
        }
    }

    /// Load from configuration file
    fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigError(format!("Failed to read config: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Load from environment variables
    fn load_from_env() -> Result<Self> {
        Self::from_lookup(get_secret)
    }

    /// Build from a variable lookup; unset variables keep their defaults
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(transport) = lookup("WASCTL_SSH_TRANSPORT") {
            config.ssh.transport = parse_transport(&transport)?;
        }
        config.ssh.user = lookup("WASCTL_SSH_USER");
        if let Some(port) = parse_var(&lookup, "WASCTL_SSH_PORT")? {
            config.ssh.port = port;
        }
        config.ssh.key_path = lookup("SSH_KEY_PATH");
        if let Some(secs) = parse_var(&lookup, "WASCTL_CONNECT_TIMEOUT")? {
            config.ssh.connect_timeout_secs = secs;
        }
        config.ssh.command_timeout_secs = parse_var(&lookup, "WASCTL_COMMAND_TIMEOUT")?;

        if let Some(secs) = parse_var(&lookup, "WASCTL_NODE_STARTUP_SECS")? {
            config.timings.node_startup_secs = secs;
        }
        if let Some(secs) = parse_var(&lookup, "WASCTL_APP_STARTUP_SECS")? {
            config.timings.app_startup_secs = secs;
        }

        config.alerting = AlertingSettings {
            mail_command: lookup("WASCTL_MAIL_COMMAND"),
            mail_recipients: lookup("WASCTL_MAIL_TO")
                .map(|s| parse_recipients(&s))
                .unwrap_or_default(),
            gotify_url: lookup("GOTIFY_URL"),
            gotify_key: lookup("GOTIFY_KEY"),
            ntfy_url: lookup("NTFY_URL"),
            ntfy_topic: lookup("NTFY_TOPIC"),
            ntfy_token: lookup("NTFY_TOKEN"),
        };

        Ok(config)
    }
}

fn parse_transport(input: &str) -> Result<SshTransport> {
    match input.trim().to_ascii_lowercase().as_str() {
        "openssh" | "ssh" => Ok(SshTransport::OpenSsh),
        "native" => Ok(SshTransport::Native),
        other => Err(Error::ConfigError(format!("Invalid SSH transport: {}", other))),
    }
}

fn parse_var<F, T>(lookup: &F, name: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::ConfigError(format!("Invalid value for {}: {}", name, raw))),
        None => Ok(None),
    }
}

/// Parse a comma-separated recipient list
fn parse_recipients(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

/// Get secret from environment variable or file
///
/// If `VAR_NAME` is not set, tries `VAR_NAME_FILE`, which should point to a
/// file containing the value (Docker/Kubernetes secrets).
pub fn get_secret(var_name: &str) -> Option<String> {
    // Try environment variable first
    if let Ok(value) = std::env::var(var_name) {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }

    // Try file-based secret
    let file_var = format!("{}_FILE", var_name);
    if let Ok(path) = std::env::var(&file_var) {
        if let Ok(contents) = std::fs::read_to_string(&path) {
            return Some(contents.trim().to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.timings.app_startup_secs, 900);
        assert_eq!(config.ssh.transport, SshTransport::OpenSsh);
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("WASCTL_SSH_TRANSPORT", "native"),
            ("WASCTL_SSH_USER", "wasadmin"),
            ("WASCTL_COMMAND_TIMEOUT", "600"),
            ("WASCTL_MAIL_TO", "ops@example.com, ,dev@example.com"),
            ("NTFY_URL", "https://ntfy.sh"),
            ("NTFY_TOPIC", "deploys"),
        ]))
        .unwrap();

        assert_eq!(config.ssh.transport, SshTransport::Native);
        assert_eq!(config.ssh.user.as_deref(), Some("wasadmin"));
        assert_eq!(config.ssh.command_timeout_secs, Some(600));
        assert_eq!(
            config.alerting.mail_recipients,
            vec!["ops@example.com", "dev@example.com"]
        );
        assert_eq!(config.alerting.ntfy_topic.as_deref(), Some("deploys"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = Config::from_lookup(lookup(&[("WASCTL_SSH_PORT", "ssh")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));

        let err = Config::from_lookup(lookup(&[("WASCTL_SSH_TRANSPORT", "telnet")])).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[ssh]
transport = "openssh"
key_path = "/keys/deploy"
connect_timeout_secs = 10

[timings]
app_startup_secs = 1200

[alerting]
mail_recipients = ["ops@example.com"]
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str()).unwrap();
        assert_eq!(config.ssh.key_path.as_deref(), Some("/keys/deploy"));
        assert_eq!(config.ssh.connect_timeout_secs, 10);
        assert_eq!(config.ssh.port, 22);
        assert_eq!(config.timings.app_startup_secs, 1200);
        assert_eq!(config.timings.node_startup_secs, 150);
        assert_eq!(config.alerting.mail_recipients, vec!["ops@example.com"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load(Some("/nonexistent/wasctl.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_parse_recipients() {
        assert!(parse_recipients("").is_empty());
        assert_eq!(parse_recipients("a@x, b@y"), vec!["a@x", "b@y"]);
    }
}

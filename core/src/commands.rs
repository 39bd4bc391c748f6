//! Remote command catalogue
//!
//! Every shell command the orchestrator sends to a host. Rendering goes
//! through `Display` so the exact strings live in one place.

use std::fmt;

/// Log line the deployment manager writes after a successful sync
pub const SYNC_SUCCESS_MARKER: &str = "The configuration synchronization completed successfully";

/// A command issued against one host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCommand<'a> {
    StopNode { bin_dir: &'a str },
    StopServer { bin_dir: &'a str, server: &'a str },
    StartNode { bin_dir: &'a str },
    StartServer { bin_dir: &'a str, server: &'a str },
    SyncNode { bin_dir: &'a str, coordinator: &'a str, port: u16 },
    /// Node agent process for this profile
    NodeAgentCheck { filter: &'a str },
    /// Any process of this profile (node agent or server JVMs)
    ProcessCheck { filter: &'a str },
    /// A `syncNode.sh` still in flight
    SyncProcessCheck,
    /// Success marker in today's `syncNode.log`
    SyncLogCheck { log_dir: &'a str, date: &'a str },
    /// The JVM of one server instance
    ServerProcessCheck { filter: &'a str, server: &'a str },
}

impl RemoteCommand<'_> {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            RemoteCommand::StopNode { .. } => "stop_node",
            RemoteCommand::StopServer { .. } => "stop_server",
            RemoteCommand::StartNode { .. } => "start_node",
            RemoteCommand::StartServer { .. } => "start_server",
            RemoteCommand::SyncNode { .. } => "sync_node",
            RemoteCommand::NodeAgentCheck { .. } => "node_agent_check",
            RemoteCommand::ProcessCheck { .. } => "process_check",
            RemoteCommand::SyncProcessCheck => "sync_process_check",
            RemoteCommand::SyncLogCheck { .. } => "sync_log_check",
            RemoteCommand::ServerProcessCheck { .. } => "server_process_check",
        }
    }
}

impl fmt::Display for RemoteCommand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Lifecycle scripts detach on the remote side so the SSH session returns at once
        match self {
            RemoteCommand::StopNode { bin_dir } => {
                write!(f, "{}/stopNode.sh > /dev/null 2>&1 &", bin_dir)
            }
            RemoteCommand::StopServer { bin_dir, server } => {
                write!(f, "{}/stopServer.sh {} > /dev/null 2>&1 &", bin_dir, server)
            }
            RemoteCommand::StartNode { bin_dir } => {
                write!(f, "{}/startNode.sh > /dev/null 2>&1 &", bin_dir)
            }
            RemoteCommand::StartServer { bin_dir, server } => {
                write!(f, "{}/startServer.sh {} > /dev/null 2>&1 &", bin_dir, server)
            }
            RemoteCommand::SyncNode {
                bin_dir,
                coordinator,
                port,
            } => write!(
                f,
                "{}/syncNode.sh {} {} > /dev/null 2>&1 &",
                bin_dir, coordinator, port
            ),
            RemoteCommand::NodeAgentCheck { filter } => write!(
                f,
                "ps -ef | grep nodeagent | grep {} | grep -v grep",
                filter
            ),
            RemoteCommand::ProcessCheck { filter } => {
                write!(f, "ps -ef | grep {} | grep -v grep", filter)
            }
            RemoteCommand::SyncProcessCheck => {
                f.write_str("ps -ef | grep syncNode.sh | grep -v grep")
            }
            RemoteCommand::SyncLogCheck { log_dir, date } => write!(
                f,
                "grep '{}' {}/syncNode.log | grep '{}'",
                date, log_dir, SYNC_SUCCESS_MARKER
            ),
            RemoteCommand::ServerProcessCheck { filter, server } => write!(
                f,
                "ps -ef | grep java | grep {} | grep {} | grep -v grep",
                filter, server
            ),
        }
    }
}

use crate::config::{AUTOSSH, ConfigDocument, TUNNEL_PREFIX};

use super::tunnel::TunnelError;

pub const DEFAULT_MONITOR_PORT: &str = "10000";
pub const DEFAULT_SSH_INTERVAL: &str = "15";
pub const DEFAULT_SSH_COUNT: &str = "3";

/// What the caller wants done with a compiled tunnel command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// check the profile, build nothing observable
    Validate,
    /// write the command line to stdout
    Print,
    /// replace this process with the tunnel
    Execute,
    /// open a throwaway session as the unprivileged account
    Test,
}

/// Keepalive strategy of the auto-reconnecting launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MonitoringStrategy {
    /// autossh probes a dedicated monitor port
    Port { port: String },
    /// autossh relies on ssh's own ServerAlive messages
    SshKeepalive { interval: String, count: String },
    /// monitoring disabled
    Disabled,
}
impl MonitoringStrategy {
    pub fn from_config(config: &ConfigDocument) -> Result<Self, TunnelError> {
        match config.get_value_or(AUTOSSH, "monitoring", "ssh") {
            "port" => Ok(MonitoringStrategy::Port {
                port: config
                    .get_value_or(AUTOSSH, "monitor_port", DEFAULT_MONITOR_PORT)
                    .to_string(),
            }),
            "ssh" => Ok(MonitoringStrategy::SshKeepalive {
                interval: config
                    .get_value_or(AUTOSSH, "monitor_ssh_interval", DEFAULT_SSH_INTERVAL)
                    .to_string(),
                count: config
                    .get_value_or(AUTOSSH, "monitor_ssh_count", DEFAULT_SSH_COUNT)
                    .to_string(),
            }),
            "none" => Ok(MonitoringStrategy::Disabled),
            other => Err(TunnelError::InvalidMonitoring(other.to_string())),
        }
    }

    pub fn flags(&self) -> Vec<String> {
        match self {
            MonitoringStrategy::Port { port } => vec![String::from("-M"), port.clone()],
            MonitoringStrategy::SshKeepalive { interval, count } => vec![
                String::from("-M"),
                String::from("0"),
                String::from("-o"),
                format!("ServerAliveInterval={interval}"),
                String::from("-o"),
                format!("ServerAliveCountMax={count}"),
            ],
            MonitoringStrategy::Disabled => vec![String::from("-M"), String::from("0")],
        }
    }
}

/// A `tunnel.<name>` section with its required keys checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TunnelProfile {
    pub name: String,
    /// the machine ssh connects to
    pub host: String,
    /// login on `host`, ssh picks its own default when unset
    pub user: Option<String>,
    /// ssh port on `host`
    pub port: Option<String>,
    /// raw forwarding flags (`-L ...`, `-R ...`, `-D ...`), word-split later
    pub tunnel: String,
    /// extra ssh flags appended after the global ones
    pub ssh_options: Option<String>,
}
impl TunnelProfile {
    /// Checks `tunnel` before `host`, the order the compiler reports them in.
    pub fn resolve(config: &ConfigDocument, name: &str) -> Result<Self, TunnelError> {
        let section = format!("{TUNNEL_PREFIX}{name}");
        let lookup = |key: &str| {
            config
                .get_value(&section, key)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let tunnel =
            lookup("tunnel").ok_or_else(|| TunnelError::MissingTunnelSpec(name.to_string()))?;
        let host = lookup("host").ok_or_else(|| TunnelError::MissingHost(name.to_string()))?;
        Ok(TunnelProfile {
            name: name.to_string(),
            host,
            user: lookup("user"),
            port: lookup("port"),
            tunnel,
            ssh_options: lookup("ssh_options"),
        })
    }

    /// `user@host`, or the bare host when no user is configured
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }
}

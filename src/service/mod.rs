use std::fmt;

#[cfg(test)]
use mockall::automock;
use systemd::SystemdManager;
use thiserror::Error;

use crate::tunneling::tunnel::TunnelError;
pub(crate) mod systemd;

/// default unit template prefix, units are named `<prefix>@<tunnel>`
pub const DEFAULT_SERVICE: &str = "ssh-tunnel";

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("could not run {0}: {1}")]
    Spawn(String, String),
    #[error("`{0}` exited with {1}")]
    CommandFailed(String, String),
}

/// Operations on a single unit that map one to one onto the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnitAction {
    Start,
    Stop,
    Restart,
    Enable,
    Disable,
    Status,
}
impl UnitAction {
    pub fn verb(&self) -> &'static str {
        match self {
            UnitAction::Start => "start",
            UnitAction::Stop => "stop",
            UnitAction::Restart => "restart",
            UnitAction::Enable => "enable",
            UnitAction::Disable => "disable",
            UnitAction::Status => "status",
        }
    }
}
impl fmt::Display for UnitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

#[cfg_attr(test, automock)]
pub(crate) trait ServiceManager {
    fn control(&self, action: UnitAction, unit: &str) -> Result<(), ServiceError>;
    /// active units whose name starts with `<prefix>@`
    fn list_active(&self, prefix: &str) -> Result<Vec<String>, ServiceError>;
    fn show_log(&self, unit: &str, lines: u32, follow: bool) -> Result<(), ServiceError>;
}

pub fn unit_name(prefix: &str, tunnel: &str) -> String {
    format!("{prefix}@{tunnel}")
}

/// Inverse of [`unit_name`], tolerating the `.service` suffix listings add.
pub fn tunnel_of_unit<'a>(prefix: &str, unit: &'a str) -> Option<&'a str> {
    let tunnel = unit.strip_prefix(prefix)?.strip_prefix('@')?;
    let tunnel = tunnel.strip_suffix(".service").unwrap_or(tunnel);
    (!tunnel.is_empty()).then_some(tunnel)
}

pub fn get_service_manager() -> Box<dyn ServiceManager> {
    Box::new(SystemdManager::new())
}

impl From<ServiceError> for TunnelError {
    fn from(err: ServiceError) -> Self {
        TunnelError::ServiceLayer(err.to_string())
    }
}

use std::process::Command;

use tracing::{debug, info};

use super::{ServiceError, ServiceManager, UnitAction};

/// Drives units through `systemctl`, logs through `journalctl`.
pub struct SystemdManager {
    systemctl: String,
    journalctl: String,
}
impl Default for SystemdManager {
    fn default() -> Self {
        SystemdManager {
            systemctl: String::from("systemctl"),
            journalctl: String::from("journalctl"),
        }
    }
}
impl SystemdManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn run(&self, program: &str, args: &[&str]) -> Result<(), ServiceError> {
        let line = command_line(program, args);
        info!("running {line}");
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|e| ServiceError::Spawn(program.to_string(), e.to_string()))?;
        if !status.success() {
            return Err(ServiceError::CommandFailed(line, status.to_string()));
        }
        Ok(())
    }
}
impl ServiceManager for SystemdManager {
    fn control(&self, action: UnitAction, unit: &str) -> Result<(), ServiceError> {
        self.run(&self.systemctl, &[action.verb(), unit])
    }

    fn list_active(&self, prefix: &str) -> Result<Vec<String>, ServiceError> {
        let pattern = format!("{prefix}@*");
        let args = [
            "list-units",
            "--type=service",
            "--state=active",
            "--no-legend",
            "--plain",
            pattern.as_str(),
        ];
        let output = Command::new(&self.systemctl)
            .args(args)
            .output()
            .map_err(|e| ServiceError::Spawn(self.systemctl.clone(), e.to_string()))?;
        if !output.status.success() {
            return Err(ServiceError::CommandFailed(
                command_line(&self.systemctl, &args),
                output.status.to_string(),
            ));
        }
        let units = parse_unit_list(&String::from_utf8_lossy(&output.stdout));
        debug!("{} active units for {prefix}", units.len());
        Ok(units)
    }

    fn show_log(&self, unit: &str, lines: u32, follow: bool) -> Result<(), ServiceError> {
        let lines = lines.to_string();
        let mut args = vec!["--unit", unit, "--lines", lines.as_str()];
        if follow {
            args.push("--follow");
        }
        self.run(&self.journalctl, &args)
    }
}

fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// first column of `systemctl list-units --plain --no-legend`
fn parse_unit_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

use std::{io::Write, process::Command};

#[cfg(test)]
use mockall::automock;
use tracing::info;

use super::{command::CommandVector, tunnel::TunnelError, tunnel_config::Mode};

/// shell `su` starts for the unprivileged account
const RESTRICTED_SHELL: &str = "/bin/sh";

/// Launches compiled commands on the host.
#[cfg_attr(test, automock)]
pub(crate) trait ProcessExecutor {
    /// Replaces the current process with `command`; only returns on failure.
    fn exec(&self, command: &CommandVector) -> Result<(), TunnelError>;
    /// Runs `line` through a shell as the local account `user` and waits for it.
    fn run_as(&self, user: &str, line: &str) -> Result<(), TunnelError>;
}

pub(crate) struct SystemExecutor;
impl ProcessExecutor for SystemExecutor {
    fn exec(&self, command: &CommandVector) -> Result<(), TunnelError> {
        let mut process = Command::new(command.program());
        process
            .args(command.args().iter().skip(1))
            .envs(command.env().iter().map(|(k, v)| (k, v)));
        info!("starting {}", command);

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            Err(process.exec().into())
        }
        #[cfg(not(unix))]
        {
            let status = process.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(TunnelError::CommandFailed(format!(
                    "{} exited with {}",
                    command.program(),
                    status
                )))
            }
        }
    }

    fn run_as(&self, user: &str, line: &str) -> Result<(), TunnelError> {
        info!("running as {user}: {line}");
        let status = Command::new("su")
            .args(["-s", RESTRICTED_SHELL, "-c", line, user])
            .status()?;
        if !status.success() {
            return Err(TunnelError::CommandFailed(format!(
                "`{line}` as {user} exited with {status}"
            )));
        }
        Ok(())
    }
}

/// Hands a compiled command to whatever its mode asks for.
pub(crate) struct TunnelRunner<'a> {
    executor: &'a dyn ProcessExecutor,
}
impl<'a> TunnelRunner<'a> {
    pub fn new(executor: &'a dyn ProcessExecutor) -> Self {
        TunnelRunner { executor }
    }

    /// `unprivileged_user` is only consulted in [`Mode::Test`].
    pub fn run(
        &self,
        mode: Mode,
        command: &CommandVector,
        unprivileged_user: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(), TunnelError> {
        match mode {
            Mode::Validate => Ok(()),
            Mode::Print => {
                writeln!(out, "{command}")?;
                Ok(())
            }
            Mode::Execute => self.executor.exec(command),
            Mode::Test => {
                let user = unprivileged_user
                    .filter(|u| !u.is_empty())
                    .ok_or(TunnelError::MissingUser)?;
                self.executor.run_as(user, &command.render())
            }
        }
    }
}

use thiserror::Error;

use crate::config::{AUTOSSH, ConfigDocument, ConfigError, SSH};

use super::{
    command::{CommandVector, split_words},
    launcher::{AUTO, Launcher, LauncherKind, LauncherResolver},
    tunnel_config::{Mode, MonitoringStrategy, TunnelProfile},
};

/// ssh flag: forward only, no remote command
const NO_REMOTE_COMMAND: &str = "-N";
/// remote command of a test connection, exits right after authentication
const NOOP_REMOTE_COMMAND: &str = "true";
const AUTOSSH_ENV_PREFIX: &str = "AUTOSSH_";

#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("{0}")]
    ConfigUnreadable(String),
    #[error("unknown tunnel: {0}")]
    UnknownTunnel(String),
    #[error("invalid tunnel name {0:?}: allowed characters are A-Z a-z 0-9 . _ / :")]
    InvalidName(String),
    #[error("tunnel {0} has no `tunnel` forwarding spec")]
    MissingTunnelSpec(String),
    #[error("tunnel {0} has no `host`")]
    MissingHost(String),
    #[error("`user` is not set in the [general] section")]
    MissingUser,
    #[error("launcher not found: {0}")]
    LauncherNotFound(String),
    #[error("invalid monitoring {0:?}: expected port, ssh or none")]
    InvalidMonitoring(String),
    #[error("io error: {1}")]
    Io(std::io::Error, String),
    #[error("{0}")]
    CommandFailed(String),
    #[error("service manager error: {0}")]
    ServiceLayer(String),
}
impl From<std::io::Error> for TunnelError {
    fn from(value: std::io::Error) -> Self {
        let str = value.to_string();
        Self::Io(value, str)
    }
}
impl From<ConfigError> for TunnelError {
    fn from(value: ConfigError) -> Self {
        Self::ConfigUnreadable(value.to_string())
    }
}

/// A tunnel name is later interpolated into a unit name and a shell line,
/// nothing outside `[A-Za-z0-9._/:]` gets through.
pub(crate) fn validate_name(name: &str) -> Result<(), TunnelError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | ':');
    if name.is_empty() || !name.chars().all(allowed) {
        return Err(TunnelError::InvalidName(name.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CompileRequest<'a> {
    pub name: &'a str,
    pub mode: Mode,
}

/// Turns a `tunnel.<name>` section into the launcher invocation. Every check
/// runs before the first token is pushed.
pub(crate) struct ProfileCompiler<'a> {
    config: &'a ConfigDocument,
    resolver: &'a dyn LauncherResolver,
}
impl<'a> ProfileCompiler<'a> {
    pub fn new(config: &'a ConfigDocument, resolver: &'a dyn LauncherResolver) -> Self {
        ProfileCompiler { config, resolver }
    }

    pub fn compile(&self, request: CompileRequest) -> Result<CommandVector, TunnelError> {
        let CompileRequest { name, mode } = request;
        validate_name(name)?;
        if !self.config.has_tunnel(name) {
            return Err(TunnelError::UnknownTunnel(name.to_string()));
        }

        let setting = self.config.get_value_or(SSH, "ssh", AUTO);
        let launcher = Launcher::resolve(setting, self.resolver)?;
        let (env, monitoring) = match launcher.kind {
            LauncherKind::AutoSsh => (
                self.autossh_environment(),
                MonitoringStrategy::from_config(self.config)?.flags(),
            ),
            LauncherKind::Ssh => (Vec::new(), Vec::new()),
        };
        let profile = TunnelProfile::resolve(self.config, name)?;

        let mut args = vec![launcher.program];
        args.extend(monitoring);
        if mode != Mode::Test {
            args.push(NO_REMOTE_COMMAND.to_string());
        }
        if let Some(port) = &profile.port {
            args.push(String::from("-p"));
            args.push(port.clone());
        }
        // a test connection checks reachability and keys, it forwards nothing
        if mode != Mode::Test {
            args.extend(split_words(&profile.tunnel));
        }
        args.extend(split_words(self.config.get_value_or(SSH, "ssh_options", "")));
        if let Some(options) = &profile.ssh_options {
            args.extend(split_words(options));
        }
        args.push(profile.destination());
        if mode == Mode::Test {
            args.push(NOOP_REMOTE_COMMAND.to_string());
        }

        let command = CommandVector::new(args, env);
        tracing::debug!("compiled tunnel {} ({mode:?}): {command}", profile.name);
        Ok(command)
    }

    /// `AUTOSSH_*` keys of the autossh section, first occurrence of each key
    fn autossh_environment(&self) -> Vec<(String, String)> {
        let Some(section) = self.config.section(AUTOSSH) else {
            return Vec::new();
        };
        let mut env: Vec<(String, String)> = Vec::new();
        for entry in &section.entries {
            if entry.key.starts_with(AUTOSSH_ENV_PREFIX)
                && !env.iter().any(|(key, _)| *key == entry.key)
            {
                env.push((entry.key.clone(), entry.value.clone()));
            }
        }
        env
    }
}

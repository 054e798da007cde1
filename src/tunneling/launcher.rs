use std::{
    env,
    path::{Path, PathBuf},
};

#[cfg(test)]
use mockall::automock;

use super::tunnel::TunnelError;

/// `ssh.ssh` value that picks autossh when installed, plain ssh otherwise
pub const AUTO: &str = "auto";
pub const SSH_PROGRAM: &str = "ssh";
pub const AUTOSSH_PROGRAM: &str = "autossh";

/// Finds executables. The compiler only asks questions through this trait so
/// the host's PATH never leaks into tests.
#[cfg_attr(test, automock)]
pub(crate) trait LauncherResolver {
    /// Where `program` would be executed from, if it is executable at all.
    /// Names containing a `/` are fixed paths and are checked as they are.
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Probes the directories of a search path, in order.
pub(crate) struct SearchPathResolver {
    dirs: Vec<PathBuf>,
}
impl SearchPathResolver {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        SearchPathResolver { dirs }
    }
    pub fn from_env() -> Self {
        let dirs = env::var_os("PATH")
            .map(|path| env::split_paths(&path).collect())
            .unwrap_or_default();
        SearchPathResolver::new(dirs)
    }
}
impl LauncherResolver for SearchPathResolver {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        if program.contains('/') {
            let path = PathBuf::from(program);
            return is_executable(&path).then_some(path);
        }
        self.dirs
            .iter()
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LauncherKind {
    Ssh,
    /// the auto-reconnecting wrapper, takes monitoring flags and `AUTOSSH_*` variables
    AutoSsh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Launcher {
    /// first token of the command, as configured or as picked by `auto`
    pub program: String,
    pub kind: LauncherKind,
}
impl Launcher {
    pub fn resolve(setting: &str, resolver: &dyn LauncherResolver) -> Result<Self, TunnelError> {
        if setting == AUTO {
            return [AUTOSSH_PROGRAM, SSH_PROGRAM]
                .into_iter()
                .find(|program| resolver.locate(program).is_some())
                .map(Launcher::from_program)
                .ok_or_else(|| {
                    TunnelError::LauncherNotFound(format!("{AUTOSSH_PROGRAM} or {SSH_PROGRAM}"))
                });
        }
        match resolver.locate(setting) {
            Some(_) => Ok(Launcher::from_program(setting)),
            None => Err(TunnelError::LauncherNotFound(setting.to_string())),
        }
    }

    fn from_program(program: &str) -> Self {
        let kind = match Path::new(program).file_name() {
            Some(name) if name == AUTOSSH_PROGRAM => LauncherKind::AutoSsh,
            _ => LauncherKind::Ssh,
        };
        tracing::debug!("using launcher {program} ({kind:?})");
        Launcher {
            program: program.to_string(),
            kind,
        }
    }
}

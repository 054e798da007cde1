use std::io::Write;

use tracing::{error, info};

use crate::{
    cli::KeyType,
    config::{ConfigDocument, GENERAL, TUNNEL_PREFIX},
    service::{DEFAULT_SERVICE, ServiceManager, UnitAction, tunnel_of_unit, unit_name},
    tunneling::{
        command::CommandVector,
        launcher::LauncherResolver,
        tunnel::{CompileRequest, ProfileCompiler, TunnelError},
        tunnel_config::Mode,
        tunnel_runner::{ProcessExecutor, TunnelRunner},
    },
};

/// Everything a subcommand may touch, loaded once per invocation.
pub(crate) struct Commands<'a> {
    pub config: &'a ConfigDocument,
    pub services: &'a dyn ServiceManager,
    pub resolver: &'a dyn LauncherResolver,
    pub executor: &'a dyn ProcessExecutor,
}
impl Commands<'_> {
    fn service_prefix(&self) -> &str {
        self.config.get_value_or(GENERAL, "service", DEFAULT_SERVICE)
    }

    fn compile(&self, name: &str, mode: Mode) -> Result<CommandVector, TunnelError> {
        ProfileCompiler::new(self.config, self.resolver).compile(CompileRequest { name, mode })
    }

    /// print, connect and test
    pub fn run_profile(
        &self,
        name: &str,
        mode: Mode,
        out: &mut dyn Write,
    ) -> Result<(), TunnelError> {
        let command = self.compile(name, mode)?;
        TunnelRunner::new(self.executor).run(
            mode,
            &command,
            self.config.get_value(GENERAL, "user"),
            out,
        )
    }

    /// Checks the profile, then passes `action` on to its unit.
    pub fn control(&self, action: UnitAction, name: &str) -> Result<(), TunnelError> {
        self.compile(name, Mode::Validate)?;
        let unit = unit_name(self.service_prefix(), name);
        info!("{action} {unit}");
        Ok(self.services.control(action, &unit)?)
    }

    pub fn log(&self, name: &str, lines: u32, follow: bool) -> Result<(), TunnelError> {
        self.compile(name, Mode::Validate)?;
        let unit = unit_name(self.service_prefix(), name);
        Ok(self.services.show_log(&unit, lines, follow)?)
    }

    /// Starts every configured tunnel, carrying on past failures.
    pub fn start_all(&self) -> Result<(), TunnelError> {
        let names = self.config.tunnel_names();
        let failed = names
            .iter()
            .filter(|name| match self.control(UnitAction::Start, name) {
                Ok(()) => false,
                Err(e) => {
                    error!("tunnel {name}: {e}");
                    true
                }
            })
            .count();
        if failed > 0 {
            return Err(TunnelError::CommandFailed(format!(
                "{failed} of {} tunnels failed to start",
                names.len()
            )));
        }
        Ok(())
    }

    /// Stops every active unit of this service, configured or not.
    pub fn stop_all(&self) -> Result<(), TunnelError> {
        let units = self.services.list_active(self.service_prefix())?;
        let failed = units
            .iter()
            .filter(|unit| match self.services.control(UnitAction::Stop, unit) {
                Ok(()) => false,
                Err(e) => {
                    error!("{unit}: {e}");
                    true
                }
            })
            .count();
        if failed > 0 {
            return Err(TunnelError::CommandFailed(format!(
                "{failed} of {} tunnels failed to stop",
                units.len()
            )));
        }
        Ok(())
    }

    pub fn list(&self, out: &mut dyn Write) -> Result<(), TunnelError> {
        let prefix = self.service_prefix();
        let active = self.services.list_active(prefix)?;
        let active: Vec<&str> = active
            .iter()
            .filter_map(|unit| tunnel_of_unit(prefix, unit))
            .collect();
        for name in self.config.tunnel_names() {
            let state = if active.contains(&name) { "active" } else { "inactive" };
            writeln!(out, "{name}\t{state}")?;
        }
        Ok(())
    }

    /// the tunnel's own section as `key=value` lines
    pub fn show(&self, name: &str, out: &mut dyn Write) -> Result<(), TunnelError> {
        let lines = self
            .config
            .read_section(&format!("{TUNNEL_PREFIX}{name}"))
            .ok_or_else(|| TunnelError::UnknownTunnel(name.to_string()))?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    /// `ssh-keygen` as the unprivileged user, keys end up in its home
    pub fn keygen(&self, key_type: KeyType) -> Result<(), TunnelError> {
        let user = self
            .config
            .get_value(GENERAL, "user")
            .filter(|u| !u.is_empty())
            .ok_or(TunnelError::MissingUser)?;
        self.executor
            .run_as(user, &format!("ssh-keygen -t {}", key_type.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use mockall::predicate::*;

    use super::*;
    use crate::{
        service::{MockServiceManager, ServiceError},
        tunneling::{launcher::MockLauncherResolver, tunnel_runner::MockProcessExecutor},
    };

    const CONFIG: &str = r#"
        [general]
        user = tunnel
        [ssh]
        ssh = ssh
        [tunnel.web]
        host = example.com
        tunnel = -L 8080:localhost:80
        [tunnel.db]
        host = db.example.com
        user = alice
        tunnel = -L 5432:localhost:5432
    "#;

    fn ssh_resolver() -> MockLauncherResolver {
        let mut resolver = MockLauncherResolver::new();
        resolver
            .expect_locate()
            .with(eq("ssh"))
            .returning(|_| Some(PathBuf::from("/usr/bin/ssh")));
        resolver
    }

    #[test]
    fn print_writes_one_line() {
        let config = ConfigDocument::parse(CONFIG);
        let services = MockServiceManager::new();
        let resolver = ssh_resolver();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        let mut out = Vec::new();
        commands.run_profile("db", Mode::Print, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ssh -N -L 5432:localhost:5432 alice@db.example.com\n"
        );
    }

    #[test]
    fn test_mode_uses_general_user() {
        let config = ConfigDocument::parse(CONFIG);
        let services = MockServiceManager::new();
        let resolver = ssh_resolver();
        let mut executor = MockProcessExecutor::new();
        executor
            .expect_run_as()
            .with(eq("tunnel"), eq("ssh example.com true"))
            .times(1)
            .returning(|_, _| Ok(()));
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        commands.run_profile("web", Mode::Test, &mut Vec::new()).unwrap();
    }

    #[test]
    fn control_validates_first() {
        let config = ConfigDocument::parse(CONFIG);
        let mut services = MockServiceManager::new();
        services
            .expect_control()
            .with(eq(UnitAction::Restart), eq("ssh-tunnel@web"))
            .times(1)
            .returning(|_, _| Ok(()));
        let resolver = ssh_resolver();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        commands.control(UnitAction::Restart, "web").unwrap();
        // never reaches the service manager
        assert!(matches!(
            commands.control(UnitAction::Start, "nope"),
            Err(TunnelError::UnknownTunnel(_))
        ));
    }

    #[test]
    fn custom_service_prefix() {
        let config = ConfigDocument::parse(&format!("{CONFIG}\n[general]\nservice = tun\n"));
        let mut services = MockServiceManager::new();
        services
            .expect_show_log()
            .with(eq("tun@db"), eq(20u32), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let resolver = ssh_resolver();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        commands.log("db", 20, true).unwrap();
    }

    #[test]
    fn start_all_keeps_going() {
        let config = ConfigDocument::parse(CONFIG);
        let mut services = MockServiceManager::new();
        services
            .expect_control()
            .with(eq(UnitAction::Start), eq("ssh-tunnel@web"))
            .times(1)
            .returning(|_, unit| {
                Err(ServiceError::CommandFailed(
                    format!("systemctl start {unit}"),
                    String::from("exit status: 1"),
                ))
            });
        services
            .expect_control()
            .with(eq(UnitAction::Start), eq("ssh-tunnel@db"))
            .times(1)
            .returning(|_, _| Ok(()));
        let resolver = ssh_resolver();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        let result = commands.start_all();
        assert!(matches!(
            result,
            Err(TunnelError::CommandFailed(m)) if m == "1 of 2 tunnels failed to start"
        ));
    }

    #[test]
    fn stop_all_stops_active_units() {
        let config = ConfigDocument::parse(CONFIG);
        let mut services = MockServiceManager::new();
        services
            .expect_list_active()
            .with(eq("ssh-tunnel"))
            .times(1)
            .returning(|_| {
                Ok(vec![
                    String::from("ssh-tunnel@web.service"),
                    String::from("ssh-tunnel@gone.service"),
                ])
            });
        services
            .expect_control()
            .with(eq(UnitAction::Stop), always())
            .times(2)
            .returning(|_, _| Ok(()));
        let resolver = MockLauncherResolver::new();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        commands.stop_all().unwrap();
    }

    #[test]
    fn list_marks_active_tunnels() {
        let config = ConfigDocument::parse(CONFIG);
        let mut services = MockServiceManager::new();
        services
            .expect_list_active()
            .returning(|_| Ok(vec![String::from("ssh-tunnel@db.service")]));
        let resolver = MockLauncherResolver::new();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        let mut out = Vec::new();
        commands.list(&mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "web\tinactive\ndb\tactive\n");
    }

    #[test]
    fn show_prints_section() {
        let config = ConfigDocument::parse(CONFIG);
        let services = MockServiceManager::new();
        let resolver = MockLauncherResolver::new();
        let executor = MockProcessExecutor::new();
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        let mut out = Vec::new();
        commands.show("web", &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "host=example.com\ntunnel=-L 8080:localhost:80\n"
        );
        assert!(matches!(
            commands.show("nope", &mut Vec::new()),
            Err(TunnelError::UnknownTunnel(_))
        ));
    }

    #[test]
    fn keygen_runs_as_user() {
        let config = ConfigDocument::parse(CONFIG);
        let services = MockServiceManager::new();
        let resolver = MockLauncherResolver::new();
        let mut executor = MockProcessExecutor::new();
        executor
            .expect_run_as()
            .with(eq("tunnel"), eq("ssh-keygen -t ed25519"))
            .times(1)
            .returning(|_, _| Ok(()));
        let commands = Commands {
            config: &config,
            services: &services,
            resolver: &resolver,
            executor: &executor,
        };
        commands.keygen(KeyType::Ed25519).unwrap();

        let no_user = ConfigDocument::parse("[general]\n");
        let commands = Commands {
            config: &no_user,
            ..commands
        };
        assert!(matches!(
            commands.keygen(KeyType::Rsa),
            Err(TunnelError::MissingUser)
        ));
    }
}

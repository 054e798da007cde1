use std::{io, process::ExitCode};

use clap::Parser;
use cli::{TunnelCli, TunnelCommand};
use commands::Commands;
use config::ConfigStore;
use service::UnitAction;
use tracing_subscriber::EnvFilter;
use tunneling::{
    launcher::SearchPathResolver, tunnel_config::Mode, tunnel_runner::SystemExecutor,
};

mod cli;
mod commands;
mod config;
mod service;
mod tunneling;

pub fn main() -> ExitCode {
    let cli = TunnelCli::parse();
    init_tracing(cli.verbose);
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so `print` output stays clean. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: TunnelCli) -> anyhow::Result<()> {
    let store = ConfigStore::new(cli.config);
    let config = store.load()?;
    tracing::debug!(
        "{} tunnels configured in {}",
        config.tunnel_names().len(),
        store.path().display()
    );

    let services = service::get_service_manager();
    let resolver = SearchPathResolver::from_env();
    let commands = Commands {
        config: &config,
        services: &*services,
        resolver: &resolver,
        executor: &SystemExecutor,
    };
    let mut stdout = io::stdout().lock();

    match cli.command {
        TunnelCommand::Start { name } => commands.control(UnitAction::Start, &name)?,
        TunnelCommand::Stop { name } => commands.control(UnitAction::Stop, &name)?,
        TunnelCommand::Restart { name } => commands.control(UnitAction::Restart, &name)?,
        TunnelCommand::Enable { name } => commands.control(UnitAction::Enable, &name)?,
        TunnelCommand::Disable { name } => commands.control(UnitAction::Disable, &name)?,
        TunnelCommand::Status { name } => commands.control(UnitAction::Status, &name)?,
        TunnelCommand::Log {
            name,
            lines,
            follow,
        } => commands.log(&name, lines, follow)?,
        TunnelCommand::StartAll => commands.start_all()?,
        TunnelCommand::StopAll => commands.stop_all()?,
        TunnelCommand::List => commands.list(&mut stdout)?,
        TunnelCommand::Show { name } => commands.show(&name, &mut stdout)?,
        TunnelCommand::Print { name } => commands.run_profile(&name, Mode::Print, &mut stdout)?,
        TunnelCommand::Connect { name } => {
            commands.run_profile(&name, Mode::Execute, &mut stdout)?
        }
        TunnelCommand::Test { name } => commands.run_profile(&name, Mode::Test, &mut stdout)?,
        TunnelCommand::SshKeygen { key_type } => commands.keygen(key_type)?,
    }
    Ok(())
}

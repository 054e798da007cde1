use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::config::DEFAULT_PATH;

#[derive(Parser, Debug)]
#[command(version, about = "tunnelctl runs SSH tunnels described in a config file as system services", long_about = None)]
pub(crate) struct TunnelCli {
    /// custom config file
    #[arg(short, long, env = "TUNNELCTL_CONFIG", default_value = DEFAULT_PATH, global = true)]
    pub config: PathBuf,
    /// more log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: TunnelCommand,
}

#[derive(Subcommand, Debug, PartialEq)]
pub(crate) enum TunnelCommand {
    /// Start the tunnel service
    Start { name: String },
    /// Stop the tunnel service
    Stop { name: String },
    /// Restart the tunnel service
    Restart { name: String },
    /// Start the tunnel at boot
    Enable { name: String },
    /// Do not start the tunnel at boot
    Disable { name: String },
    /// Show the service status
    Status { name: String },
    /// Show the service log
    Log {
        name: String,
        /// number of journal lines to show
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: u32,
        /// keep printing new entries
        #[arg(short, long)]
        follow: bool,
    },
    /// Start every configured tunnel
    StartAll,
    /// Stop every running tunnel
    StopAll,
    /// List configured tunnels and whether they are running
    List,
    /// Show the settings of a tunnel
    Show { name: String },
    /// Print the command a tunnel runs
    Print { name: String },
    /// Run the tunnel in the foreground (used by the service unit)
    Connect { name: String },
    /// Open a test connection as the unprivileged user, e.g. to accept the host key
    Test { name: String },
    /// Generate a key pair for the unprivileged user
    SshKeygen {
        #[arg(short = 't', long = "type", value_enum, default_value_t = KeyType::Ed25519)]
        key_type: KeyType,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum KeyType {
    Ed25519,
    Ecdsa,
    Rsa,
}
impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Ed25519 => "ed25519",
            KeyType::Ecdsa => "ecdsa",
            KeyType::Rsa => "rsa",
        }
    }
}

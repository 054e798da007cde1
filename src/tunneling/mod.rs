pub(crate) mod command;
pub(crate) mod launcher;
pub(crate) mod tunnel;
pub(crate) mod tunnel_config;
pub(crate) mod tunnel_runner;

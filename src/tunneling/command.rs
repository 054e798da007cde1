use std::fmt;

/// The exact invocation of a tunnel: the launcher followed by its arguments,
/// plus environment overrides for the launcher process. Built once by the
/// compiler and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CommandVector {
    args: Vec<String>,
    env: Vec<(String, String)>,
}
impl CommandVector {
    pub(super) fn new(args: Vec<String>, env: Vec<(String, String)>) -> Self {
        CommandVector { args, env }
    }
    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }
    /// every token including the program itself
    pub fn args(&self) -> &[String] {
        &self.args
    }
    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }
    /// Single command line, `KEY=value` overrides first. Tokens are joined
    /// as they are, without quoting, so the result carries the same trust
    /// level as the config file it came from.
    pub fn render(&self) -> String {
        self.env
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}
impl fmt::Display for CommandVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Whitespace-only word splitting, no quote handling. Lets one config value
/// carry several flags.
pub(crate) fn split_words(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split_whitespace().map(str::to_string)
}

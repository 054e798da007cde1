use std::{
    fs,
    path::{Path, PathBuf},
};

use thiserror::Error;

pub const DEFAULT_PATH: &str = "/etc/tunnelctl/tunnelctl.conf";
/// sections named `tunnel.<name>` describe one tunnel profile each
pub const TUNNEL_PREFIX: &str = "tunnel.";

pub const GENERAL: &str = "general";
pub const SSH: &str = "ssh";
pub const AUTOSSH: &str = "autossh";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config file {0}: {1}")]
    Unreadable(String, String),
}

/// Reads the configuration file. Every call opens, consumes and closes the
/// file, nothing is cached between loads.
#[derive(Debug, Clone)]
pub(crate) struct ConfigStore {
    path: PathBuf,
}
impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn load(&self) -> Result<ConfigDocument, ConfigError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            ConfigError::Unreadable(self.path.display().to_string(), e.to_string())
        })?;
        tracing::debug!("loaded config from {}", self.path.display());
        Ok(ConfigDocument::parse(&contents))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Entry {
    pub key: String,
    pub value: String,
}
impl Entry {
    /// the entry as it appears once comments and quotes are gone
    pub fn line(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Section {
    pub name: String,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct ConfigDocument {
    sections: Vec<Section>,
}
impl ConfigDocument {
    pub fn parse(input: &str) -> Self {
        let mut sections: Vec<Section> = Vec::new();
        let mut open: Option<usize> = None;

        for (number, raw) in input.lines().enumerate() {
            let stripped = strip_comment(raw);
            let line = stripped.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(name) = section_header(line) {
                // a repeated header reopens the section it names
                open = match sections.iter().position(|s| s.name == name) {
                    Some(index) => Some(index),
                    None => {
                        sections.push(Section {
                            name: name.to_string(),
                            entries: Vec::new(),
                        });
                        Some(sections.len() - 1)
                    }
                };
                continue;
            }
            let Some(index) = open else {
                tracing::debug!("line {}: outside of any section, skipped", number + 1);
                continue;
            };
            match parse_entry(line) {
                Some(entry) => sections[index].entries.push(entry),
                None => tracing::warn!("line {}: no `=` in {:?}, skipped", number + 1, line),
            }
        }
        ConfigDocument { sections }
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// `None` when the section does not occur at all, `Some(vec![])` when it
    /// exists but is empty
    pub fn read_section(&self, name: &str) -> Option<Vec<String>> {
        self.section(name)
            .map(|s| s.entries.iter().map(Entry::line).collect())
    }

    /// First entry whose key matches wins. `None` means the key is missing,
    /// which is different from `Some("")`.
    pub fn get_value(&self, section: &str, key: &str) -> Option<&str> {
        self.section(section)?
            .entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    pub fn get_value_or<'a>(&'a self, section: &str, key: &str, default: &'a str) -> &'a str {
        self.get_value(section, key).unwrap_or(default)
    }

    /// names of all `tunnel.<name>` sections, in file order
    pub fn tunnel_names(&self) -> Vec<&str> {
        self.section_names()
            .into_iter()
            .filter_map(|name| name.strip_prefix(TUNNEL_PREFIX))
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn has_tunnel(&self, name: &str) -> bool {
        self.tunnel_names().contains(&name)
    }
}

/// Truncates `line` at the first `;` or `#` that is not escaped with a
/// backslash. Escaped ones are kept without their backslash.
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if matches!(chars.peek(), Some(';' | '#')) => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            ';' | '#' => break,
            _ => out.push(c),
        }
    }
    out
}

fn section_header(line: &str) -> Option<&str> {
    let name = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    if name.is_empty() || name.contains(&['[', ']'][..]) {
        return None;
    }
    Some(name)
}

fn parse_entry(line: &str) -> Option<Entry> {
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some(Entry {
        key: key.to_string(),
        value: strip_quotes(value.trim()).to_string(),
    })
}

/// removes one layer of `'`/`"` at each end of a value
fn strip_quotes(value: &str) -> &str {
    const QUOTES: &[char] = &['\'', '"'];
    let value = value.strip_prefix(QUOTES).unwrap_or(value);
    value.strip_suffix(QUOTES).unwrap_or(value)
}

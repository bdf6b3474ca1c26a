//! Configuration loading and compilation.
//!
//! ## File precedence (highest to lowest)
//!
//! 1. The file named by `$KEYMUX_CONFIG`
//! 2. `~/.config/keymux/config.toml` (XDG config dir)
//! 3. Built-in defaults (no file at all)
//!
//! A missing file is not an error; a present-but-unreadable or malformed
//! file is fatal, as is an invalid regex in any option, since silently
//! falling back to defaults would select the wrong identity or keys.

pub mod schema;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::identity::Identity;
use crate::rules::MatchRule;
use crate::{Error, Result};
use schema::RawConfig;

/// Environment variable naming an alternate config file.
pub const KEYMUX_CONFIG_ENV: &str = "KEYMUX_CONFIG";

/// Default pattern a path must match to count as a key file.
///
/// Matches the conventional OpenSSH key file names (`id_rsa`,
/// `id_ed25519`, `identity`, `ssh2-...`) anywhere under a key directory.
pub const DEFAULT_KEY_PATTERN: &str = r"/(id_.*|identity.*|ssh[0-9]-.*)";

/// Fully compiled runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Binary to delegate to once the agent is ready.
    pub ssh_binary: String,
    /// Root directory with one subdirectory of keys per identity.
    pub identities_dir: PathBuf,
    /// Directory of agent descriptor files, one per (identity, host).
    pub agents_dir: PathBuf,
    /// Compiled key-file pattern.
    pub key_pattern: Regex,
    /// Identity used when no rule matches (login name when `None`).
    pub default_identity: Option<Identity>,
    /// `ssh-add` arguments for identities without a specific entry.
    pub ssh_add_default_options: String,
    /// Ordered rules over the argument vector.
    pub match_argv: Vec<MatchRule>,
    /// Ordered rules over the working directory.
    pub match_path: Vec<MatchRule>,
    /// Per-identity `ssh-add` argument overrides.
    pub ssh_add_options: HashMap<String, String>,
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load() -> Result<Self> {
        match config_file_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Self::from_raw(RawConfig::default()),
        }
    }

    /// Load and compile configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let raw = RawConfig::from_toml(&text).map_err(|e| {
            Error::Config(format!("invalid config {}: {}", path.display(), e))
        })?;
        Self::from_raw(raw)
    }

    /// Compile the raw schema into runtime types.
    pub fn from_raw(raw: RawConfig) -> Result<Self> {
        let key_pattern = raw.key_pattern.as_deref().unwrap_or(DEFAULT_KEY_PATTERN);
        Ok(Self {
            ssh_binary: raw.ssh_binary.unwrap_or_else(|| "ssh".to_string()),
            identities_dir: expand_tilde(
                raw.identities_dir.as_deref().unwrap_or("~/.ssh/identities"),
            ),
            agents_dir: expand_tilde(raw.agents_dir.as_deref().unwrap_or("~/.ssh/agents")),
            key_pattern: compile("key_pattern", key_pattern)?,
            default_identity: raw.default_identity.map(Identity::new),
            ssh_add_default_options: raw.ssh_add_default_options.unwrap_or_default(),
            match_argv: compile_rules("match_argv", &raw.match_argv)?,
            match_path: compile_rules("match_path", &raw.match_path)?,
            ssh_add_options: raw.ssh_add_options.into_iter().collect(),
        })
    }

    /// The `ssh-add` options string for an identity.
    ///
    /// Falls back to the global default options when the identity has no
    /// entry of its own.
    pub fn loader_options_for(&self, identity: &Identity) -> &str {
        self.ssh_add_options
            .get(identity.as_str())
            .map(String::as_str)
            .unwrap_or(&self.ssh_add_default_options)
    }
}

/// Resolve which config file to read, if any.
///
/// `$KEYMUX_CONFIG` always wins, even if the file it names is absent
/// (yielding pure defaults) - an explicit override must never silently
/// fall through to the user-level file.
fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(KEYMUX_CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|d| d.join("keymux").join("config.toml"))
}

fn compile(option: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        option: option.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_rules(option: &str, raw: &[schema::RawRule]) -> Result<Vec<MatchRule>> {
    raw.iter()
        .map(|r| Ok(MatchRule::new(compile(option, &r.pattern)?, Identity::new(r.identity.as_str()))))
        .collect()
}

/// Expand a leading `~/` against the home directory.
///
/// A bare `~` or an unexpandable home leaves the path as written.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}

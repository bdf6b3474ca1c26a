//! TOML schema for the keymux configuration file.
//!
//! This module holds the serde-facing representation of the file exactly as
//! written by the user. Compilation into runtime types (regexes, expanded
//! paths) happens in [`crate::config`], so the raw schema stays a plain
//! data mirror that round-trips cleanly.
//!
//! # TOML Schema
//!
//! ```toml
//! ssh_binary = "ssh"
//! identities_dir = "~/.ssh/identities"
//! agents_dir = "~/.ssh/agents"
//! key_pattern = '/(id_.*|identity.*|ssh[0-9]-.*)'
//! default_identity = "work"
//! ssh_add_default_options = "-t 7200"
//!
//! [[match_argv]]
//! pattern = 'corp\.example\.com'
//! identity = "work"
//!
//! [[match_path]]
//! pattern = "/personal/"
//! identity = "home"
//!
//! [ssh_add_options]
//! work = "-c -t 3600"
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

/// One pattern-to-identity rule as written in the config file.
///
/// Rules live in TOML arrays of tables, so file order is preserved all the
/// way into the compiled rule list - order is precedence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawRule {
    /// Regex matched anywhere within a candidate string.
    pub pattern: String,
    /// Identity selected when the pattern matches.
    pub identity: String,
}

/// The configuration file as deserialized, before validation.
///
/// Every field is optional; built-in defaults cover a bare or absent file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    /// Path or name of the ssh binary to delegate to.
    pub ssh_binary: Option<String>,

    /// Root directory holding one key subdirectory per identity.
    pub identities_dir: Option<String>,

    /// Directory holding one agent descriptor file per (identity, host).
    pub agents_dir: Option<String>,

    /// Regex a file path must match to be considered a key file.
    pub key_pattern: Option<String>,

    /// Identity used when no match rule fires (login name if unset).
    pub default_identity: Option<String>,

    /// Extra `ssh-add` arguments for identities without their own entry.
    pub ssh_add_default_options: Option<String>,

    /// Ordered rules evaluated against the ssh argument vector.
    #[serde(default)]
    pub match_argv: Vec<RawRule>,

    /// Ordered rules evaluated against the working directory.
    #[serde(default)]
    pub match_path: Vec<RawRule>,

    /// Per-identity extra `ssh-add` arguments, overriding the default.
    #[serde(default)]
    pub ssh_add_options: BTreeMap<String, String>,
}

impl RawConfig {
    /// Parse a TOML document into the raw schema.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let raw = RawConfig::from_toml("").unwrap();
        assert_eq!(raw, RawConfig::default());
    }

    #[test]
    fn test_full_document_parses() {
        let raw = RawConfig::from_toml(
            r#"
            ssh_binary = "/usr/bin/ssh"
            identities_dir = "~/.ssh/identities"
            agents_dir = "~/.ssh/agents"
            key_pattern = "id_.*"
            default_identity = "work"
            ssh_add_default_options = "-t 7200"

            [[match_argv]]
            pattern = "corp"
            identity = "work"

            [[match_argv]]
            pattern = "lab"
            identity = "research"

            [[match_path]]
            pattern = "/personal/"
            identity = "home"

            [ssh_add_options]
            work = "-c"
            "#,
        )
        .unwrap();

        assert_eq!(raw.ssh_binary.as_deref(), Some("/usr/bin/ssh"));
        assert_eq!(raw.default_identity.as_deref(), Some("work"));
        assert_eq!(raw.match_argv.len(), 2);
        assert_eq!(raw.match_path.len(), 1);
        assert_eq!(raw.ssh_add_options.get("work").map(String::as_str), Some("-c"));
    }

    #[test]
    fn test_rule_order_is_file_order() {
        let raw = RawConfig::from_toml(
            r#"
            [[match_argv]]
            pattern = "b"
            identity = "second"

            [[match_argv]]
            pattern = "a"
            identity = "first"
            "#,
        )
        .unwrap();
        assert_eq!(raw.match_argv[0].identity, "second");
        assert_eq!(raw.match_argv[1].identity, "first");
    }

    #[test]
    fn test_unknown_key_is_rejected() {
        let err = RawConfig::from_toml("unknown_option = 1");
        assert!(err.is_err());
    }

    #[test]
    fn test_rule_missing_identity_is_rejected() {
        let err = RawConfig::from_toml(
            r#"
            [[match_argv]]
            pattern = "corp"
            "#,
        );
        assert!(err.is_err());
    }
}

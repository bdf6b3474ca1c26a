//! CLI argument definitions for keymux.
//!
//! Keymux is a drop-in stand-in for ssh: the entire argument vector
//! belongs to the delegated tool, so the parser does no option handling of
//! its own - even `-h`/`-V` pass through, because they are valid ssh
//! arguments. The same vector doubles as the candidate list for the
//! argument match rules.

use clap::Parser;
use std::ffi::OsString;

/// Keymux - run ssh through the right identity's agent.
#[derive(Parser, Debug)]
#[command(name = "keymux")]
#[command(disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Arguments passed through verbatim to the ssh binary.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<OsString>,
}

impl Cli {
    /// The arguments as strings, for rule matching.
    ///
    /// Non-UTF-8 arguments are lossily converted for matching only; the
    /// original `OsString`s are what get passed to ssh.
    pub fn match_candidates(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }
}

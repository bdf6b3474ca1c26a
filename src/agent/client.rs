//! Commands executed inside an agent's environment.
//!
//! Every agent-side tool invocation builds on [`agent_command`]: a child
//! process with a minimized base environment (PATH, HOME, and the
//! terminal variables `ssh-add` needs for its passphrase prompt) plus the
//! descriptor's `SSH_AUTH_SOCK`/`SSH_AGENT_PID` merged on top. Starting
//! from a clean slate keeps an unrelated agent inherited from the calling
//! shell from hijacking the query.

use std::collections::HashSet;
use std::process::{Command, Stdio};

use super::descriptor::AgentDescriptor;

/// Environment variables carried over from the caller into agent-side
/// commands. Everything else is dropped.
const BASE_ENV: &[&str] = &["PATH", "HOME", "TERM", "DISPLAY", "SSH_ASKPASS", "LANG"];

/// Build a command running `tool` against the descriptor's agent.
pub fn agent_command(tool: &str, descriptor: &AgentDescriptor) -> Command {
    let mut command = Command::new(tool);
    command.env_clear();
    for keep in BASE_ENV {
        if let Ok(value) = std::env::var(keep) {
            command.env(keep, value);
        }
    }
    for (name, value) in descriptor.env_vars() {
        command.env(name, value);
    }
    command
}

/// Fingerprints of the keys currently loaded in the agent.
///
/// Always queried live - another session may have loaded keys, or the
/// agent may have dropped them through a `-t` lifetime. Exit status 1 is
/// the agent's "no identities" answer and yields an empty set; a failed
/// query also yields an empty set, deliberately: treating nothing as
/// loaded at worst re-adds keys the agent already holds, which the agent
/// deduplicates, while the opposite mistake would skip keys that are
/// genuinely missing.
pub fn list_loaded(descriptor: &AgentDescriptor) -> HashSet<String> {
    let output = agent_command("ssh-add", descriptor)
        .arg("-l")
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            parse_fingerprints(&String::from_utf8_lossy(&output.stdout))
        }
        Ok(output) if output.status.code() == Some(1) => HashSet::new(),
        Ok(output) => {
            tracing::debug!(status = %output.status, "fingerprint listing failed, assuming none loaded");
            HashSet::new()
        }
        Err(e) => {
            tracing::debug!("could not run ssh-add -l: {e}, assuming none loaded");
            HashSet::new()
        }
    }
}

/// Parse `ssh-add -l` output into a fingerprint set.
///
/// Each line reads `<bits> <fingerprint> <comment> (<type>)`; the
/// fingerprint is the second whitespace-separated field. Lines without a
/// second field are skipped individually rather than failing the listing.
pub fn parse_fingerprints(text: &str) -> HashSet<String> {
    text.lines()
        .filter_map(|line| {
            let fingerprint = line.split_whitespace().nth(1);
            if fingerprint.is_none() && !line.trim().is_empty() {
                tracing::debug!(line, "skipping malformed fingerprint line");
            }
            fingerprint.map(str::to_string)
        })
        .collect()
}

//! Terminal delegation to the real ssh binary.
//!
//! Delegation is not an ordinary subprocess call: on success the current
//! process is replaced (`execvp`) and never resumes, so ssh's exit status
//! becomes the invocation's exit status with no wrapper in between. The
//! function's signature reflects that - it returns only the failure case.

use std::ffi::OsString;
use std::process::Command;

use crate::Error;
use crate::agent::descriptor::AgentDescriptor;

/// Replace the current process with `ssh_binary` running `args`.
///
/// The child sees the caller's full environment - ssh needs the terminal,
/// locale, and so on - with the agent's variables merged over it so that
/// ssh picks up the per-identity agent instead of whatever agent the
/// calling shell had. Returns only when the exec itself fails.
#[cfg(unix)]
pub fn delegate(ssh_binary: &str, args: &[OsString], descriptor: &AgentDescriptor) -> Error {
    use std::os::unix::process::CommandExt;

    let mut command = Command::new(ssh_binary);
    command.args(args);
    for (name, value) in descriptor.env_vars() {
        command.env(name, value);
    }

    tracing::debug!(binary = ssh_binary, args = args.len(), "delegating to ssh");
    let source = command.exec();
    Error::Exec { tool: ssh_binary.to_string(), source }
}

/// Spawn-and-wait fallback where process replacement is unavailable.
///
/// Exits with the child's status, so the observable contract (exit status
/// equals ssh's) still holds.
#[cfg(not(unix))]
pub fn delegate(ssh_binary: &str, args: &[OsString], descriptor: &AgentDescriptor) -> Error {
    let status = Command::new(ssh_binary)
        .args(args)
        .envs(descriptor.env_vars().iter().map(|(k, v)| (*k, *v)))
        .status();
    match status {
        Ok(status) => std::process::exit(status.code().unwrap_or(1)),
        Err(source) => Error::Exec { tool: ssh_binary.to_string(), source },
    }
}

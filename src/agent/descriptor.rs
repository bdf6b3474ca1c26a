//! Agent descriptor files and the get-or-create lifecycle.
//!
//! A descriptor file is the POSIX-sourceable snippet `ssh-agent -s` prints
//! on startup, captured verbatim at
//! `<agents_dir>/agent-<identity>-<host>`. Keeping the host in the file
//! name means a home directory shared over NFS never causes one machine to
//! reuse another machine's agent socket.
//!
//! The file stays sourceable for humans (`. ~/.ssh/agents/agent-work-box`),
//! but keymux itself parses the two variables out of it rather than
//! shelling through `sh`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use super::client;

use crate::config::Config;
use crate::identity::Identity;
use crate::{Error, Result};

/// Permissions for the agents directory (owner only).
#[cfg(unix)]
pub const AGENTS_DIR_MODE: u32 = 0o700;

/// Permissions for a descriptor file (owner read/write only).
#[cfg(unix)]
pub const DESCRIPTOR_FILE_MODE: u32 = 0o600;

/// A parsed, probe-checked handle to a running agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    /// Identity this agent serves.
    pub identity: Identity,
    /// Host label the descriptor is keyed by.
    pub host: String,
    /// Path of the backing descriptor file.
    pub path: PathBuf,
    /// Value of `SSH_AUTH_SOCK` from the snippet.
    pub auth_sock: String,
    /// Value of `SSH_AGENT_PID` from the snippet.
    pub agent_pid: String,
}

impl AgentDescriptor {
    /// The environment variables a child process needs to reach the agent.
    pub fn env_vars(&self) -> [(&'static str, &str); 2] {
        [
            ("SSH_AUTH_SOCK", self.auth_sock.as_str()),
            ("SSH_AGENT_PID", self.agent_pid.as_str()),
        ]
    }
}

/// Host label used to key descriptor files.
///
/// Kernel hostname first, `$HOSTNAME` as fallback, then a fixed label for
/// environments that have neither.
pub fn host_label() -> String {
    #[cfg(unix)]
    {
        if let Ok(name) = nix::unistd::gethostname() {
            let name = name.to_string_lossy();
            if !name.is_empty() {
                return name.into_owned();
            }
        }
    }
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

/// Deterministic descriptor path for an (identity, host) pair.
pub fn descriptor_path(agents_dir: &Path, identity: &Identity, host: &str) -> PathBuf {
    agents_dir.join(format!("agent-{identity}-{host}"))
}

/// Locate a valid agent for the identity, spawning one if needed.
///
/// Repeated calls with an already-valid descriptor only pay for the probe;
/// a new agent is spawned only when the descriptor is absent, unparseable,
/// or its agent no longer answers. That idempotency is what keeps many
/// terminal sessions from breeding one agent each.
pub fn get_or_create(identity: &Identity, config: &Config, host: &str) -> Result<AgentDescriptor> {
    ensure_agents_dir(&config.agents_dir)?;
    let path = descriptor_path(&config.agents_dir, identity, host);

    if let Some(existing) = read_descriptor(&path, identity, host) {
        if probe(&existing) {
            tracing::debug!(path = %path.display(), "reusing running agent");
            return Ok(existing);
        }
        tracing::info!(
            identity = %identity,
            path = %path.display(),
            "agent from descriptor is unreachable, starting a new one"
        );
    }

    spawn_agent(identity, host, &path)
}

/// Create the agents directory with owner-only permissions.
fn ensure_agents_dir(agents_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(agents_dir).map_err(|e| Error::AgentsDir {
        path: agents_dir.to_path_buf(),
        reason: format!("{e}; create it manually (mode 0700) if a parent is not writable"),
    })?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(agents_dir, std::fs::Permissions::from_mode(AGENTS_DIR_MODE))
            .map_err(|e| Error::AgentsDir {
                path: agents_dir.to_path_buf(),
                reason: format!("could not set permissions: {e}"),
            })?;
    }
    Ok(())
}

/// Read and parse an existing descriptor file.
///
/// Any failure (missing file, unreadable, no variables in the snippet)
/// yields `None`; the caller treats that the same as an unreachable agent.
fn read_descriptor(path: &Path, identity: &Identity, host: &str) -> Option<AgentDescriptor> {
    let text = std::fs::read_to_string(path).ok()?;
    let (auth_sock, agent_pid) = parse_snippet(&text)?;
    Some(AgentDescriptor {
        identity: identity.clone(),
        host: host.to_string(),
        path: path.to_path_buf(),
        auth_sock,
        agent_pid,
    })
}

/// Extract `SSH_AUTH_SOCK` and `SSH_AGENT_PID` from an agent startup
/// snippet.
///
/// The snippet looks like:
///
/// ```text
/// SSH_AUTH_SOCK=/tmp/ssh-abc/agent.123; export SSH_AUTH_SOCK;
/// SSH_AGENT_PID=124; export SSH_AGENT_PID;
/// echo Agent pid 124;
/// ```
///
/// `export` clauses and the echo line are ignored; both variables must be
/// present for the parse to succeed.
pub fn parse_snippet(text: &str) -> Option<(String, String)> {
    let mut auth_sock = None;
    let mut agent_pid = None;
    for line in text.lines() {
        for clause in line.split(';') {
            let clause = clause.trim();
            if let Some(value) = clause.strip_prefix("SSH_AUTH_SOCK=") {
                auth_sock = Some(value.to_string());
            } else if let Some(value) = clause.strip_prefix("SSH_AGENT_PID=") {
                agent_pid = Some(value.to_string());
            }
        }
    }
    Some((auth_sock?, agent_pid?))
}

/// Probe whether the descriptor's agent still answers.
///
/// `ssh-add -l` exits 0 (keys listed) or 1 (reachable, zero keys) when the
/// agent is alive; exit 2, any other status, or a spawn failure means the
/// socket is dead and the descriptor is stale.
pub fn probe(descriptor: &AgentDescriptor) -> bool {
    let result = client::agent_command("ssh-add", descriptor)
        .arg("-l")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) => matches!(status.code(), Some(0) | Some(1)),
        Err(e) => {
            tracing::debug!("agent probe failed to run ssh-add: {e}");
            false
        }
    }
}

/// Spawn a fresh agent and write its startup snippet as the descriptor.
///
/// The agent gets a minimized environment so it cannot inherit another
/// agent's variables from the calling shell; `-s` forces Bourne-style
/// output regardless of the caller's `$SHELL`. Blocks until the startup
/// output is fully captured.
fn spawn_agent(identity: &Identity, host: &str, path: &Path) -> Result<AgentDescriptor> {
    let mut command = Command::new("ssh-agent");
    command.arg("-s").env_clear().stdin(Stdio::null());
    for keep in ["PATH", "HOME"] {
        if let Ok(value) = std::env::var(keep) {
            command.env(keep, value);
        }
    }

    let output = command
        .output()
        .map_err(|e| Error::AgentSpawn(format!("could not run ssh-agent: {e}")))?;
    if !output.status.success() {
        return Err(Error::AgentSpawn(format!(
            "ssh-agent exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let snippet = String::from_utf8_lossy(&output.stdout).into_owned();
    write_descriptor_file(path, &snippet)?;

    let (auth_sock, agent_pid) = parse_snippet(&snippet).ok_or_else(|| {
        Error::Descriptor(format!(
            "ssh-agent output at {} contains no SSH_AUTH_SOCK/SSH_AGENT_PID",
            path.display()
        ))
    })?;

    tracing::info!(identity = %identity, host, pid = %agent_pid, "started new ssh-agent");
    Ok(AgentDescriptor {
        identity: identity.clone(),
        host: host.to_string(),
        path: path.to_path_buf(),
        auth_sock,
        agent_pid,
    })
}

/// Write the descriptor file with owner-only permissions.
fn write_descriptor_file(path: &Path, snippet: &str) -> Result<()> {
    std::fs::write(path, snippet)
        .map_err(|e| Error::Descriptor(format!("cannot write {}: {e}", path.display())))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(DESCRIPTOR_FILE_MODE))
            .map_err(|e| {
                Error::Descriptor(format!("cannot set mode on {}: {e}", path.display()))
            })?;
    }
    Ok(())
}

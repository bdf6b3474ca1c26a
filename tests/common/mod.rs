//! Common test utilities for keymux integration tests.
//!
//! Provides `TestEnv`: an isolated HOME with a keymux config and a private
//! bin directory of fake `ssh`/`ssh-agent`/`ssh-add`/`ssh-keygen` scripts,
//! so tests exercise the real binary end to end without touching the
//! user's agents or keys.
//!
//! The fake tools keep their state under `$HOME/.teststate`:
//! - `agent-count` - how many agents were spawned (and the next fake pid)
//! - `agent-<n>.sock` - marker file standing in for the agent socket;
//!   deleting it makes the fake agent unreachable (probe exits 2)
//! - `loaded-<pid>` - `ssh-add -l` style lines for keys loaded into agent n
//! - `ssh-add.log` / `ssh.log` - one line per fake tool invocation

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

const FAKE_SSH_AGENT: &str = r#"#!/bin/sh
state="$HOME/.teststate"
mkdir -p "$state"
count=$(cat "$state/agent-count" 2>/dev/null || echo 0)
count=$((count + 1))
echo "$count" > "$state/agent-count"
sock="$state/agent-$count.sock"
: > "$sock"
echo "SSH_AUTH_SOCK=$sock; export SSH_AUTH_SOCK;"
echo "SSH_AGENT_PID=$count; export SSH_AGENT_PID;"
echo "echo Agent pid $count;"
"#;

const FAKE_SSH_ADD: &str = r#"#!/bin/sh
state="$HOME/.teststate"
mkdir -p "$state"
[ -n "$SSH_AUTH_SOCK" ] && [ -e "$SSH_AUTH_SOCK" ] || exit 2
loaded="$state/loaded-$SSH_AGENT_PID"
if [ "$1" = "-l" ]; then
  if [ -s "$loaded" ]; then
    cat "$loaded"
    exit 0
  fi
  echo "The agent has no identities." >&2
  exit 1
fi
echo "$@" >> "$state/ssh-add.log"
for arg in "$@"; do
  case "$arg" in
    -*) continue ;;
  esac
  [ -f "$arg" ] || continue
  base=$(basename "$arg")
  echo "256 SHA256:fp-$base $arg (ED25519)" >> "$loaded"
done
exit 0
"#;

const FAKE_SSH_KEYGEN: &str = r#"#!/bin/sh
# invoked as: ssh-keygen -l -f <path>
path="$3"
[ -f "$path" ] || exit 1
base=$(basename "$path" .pub)
echo "256 SHA256:fp-$base $path (ED25519)"
"#;

const FAKE_SSH: &str = r#"#!/bin/sh
state="$HOME/.teststate"
mkdir -p "$state"
echo "args: $*" >> "$state/ssh.log"
echo "sock: $SSH_AUTH_SOCK" >> "$state/ssh.log"
echo "delegated-to-ssh"
exit "${KEYMUX_TEST_SSH_EXIT:-0}"
"#;

/// Isolated test environment with fake OpenSSH tools.
pub struct TestEnv {
    pub home: TempDir,
    pub bin: TempDir,
}

impl TestEnv {
    /// Create a new environment with default config and fake tools.
    pub fn new() -> Self {
        let env = Self {
            home: TempDir::new().unwrap(),
            bin: TempDir::new().unwrap(),
        };
        env.install_fake_tool("ssh-agent", FAKE_SSH_AGENT);
        env.install_fake_tool("ssh-add", FAKE_SSH_ADD);
        env.install_fake_tool("ssh-keygen", FAKE_SSH_KEYGEN);
        env.install_fake_tool("ssh", FAKE_SSH);
        env.write_config(&format!(
            r#"
            identities_dir = "{identities}"
            agents_dir = "{agents}"
            default_identity = "testid"
            "#,
            identities = env.home.path().join("identities").display(),
            agents = env.home.path().join("agents").display(),
        ));
        env
    }

    /// Overwrite the config file with the given TOML body.
    pub fn write_config(&self, body: &str) {
        fs::write(self.config_path(), body).unwrap();
    }

    /// Path of the config file handed to keymux via KEYMUX_CONFIG.
    pub fn config_path(&self) -> PathBuf {
        self.home.path().join("config.toml")
    }

    /// Get a Command for the keymux binary with fully isolated env.
    ///
    /// PATH contains the fake tool directory first, so every external
    /// process keymux spawns is one of the scripts above.
    pub fn keymux(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_keymux"));
        cmd.current_dir(self.home.path());
        cmd.env_clear();
        cmd.env("PATH", format!("{}:/usr/bin:/bin", self.bin.path().display()));
        cmd.env("HOME", self.home.path());
        cmd.env("KEYMUX_CONFIG", self.config_path());
        cmd
    }

    /// Create a private/public key pair for an identity.
    pub fn write_key_pair(&self, identity: &str, name: &str) -> PathBuf {
        let dir = self.home.path().join("identities").join(identity);
        fs::create_dir_all(&dir).unwrap();
        let private = dir.join(name);
        fs::write(&private, "fake private key\n").unwrap();
        fs::write(dir.join(format!("{name}.pub")), "fake public key\n").unwrap();
        private
    }

    /// Create only the public half of a key.
    pub fn write_public_only(&self, identity: &str, name: &str) {
        let dir = self.home.path().join("identities").join(identity);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{name}.pub")), "fake public key\n").unwrap();
    }

    /// Number of fake agents spawned so far.
    pub fn agent_count(&self) -> u32 {
        fs::read_to_string(self.state_dir().join("agent-count"))
            .map(|s| s.trim().parse().unwrap())
            .unwrap_or(0)
    }

    /// Kill fake agent `n` by removing its socket marker.
    pub fn kill_agent(&self, n: u32) {
        fs::remove_file(self.state_dir().join(format!("agent-{n}.sock"))).unwrap();
    }

    /// Lines logged by the fake ssh-add (load invocations only).
    pub fn ssh_add_log(&self) -> Vec<String> {
        read_lines(&self.state_dir().join("ssh-add.log"))
    }

    /// Lines logged by the fake ssh.
    pub fn ssh_log(&self) -> Vec<String> {
        read_lines(&self.state_dir().join("ssh.log"))
    }

    /// Contents of the descriptor file for (identity, host).
    pub fn descriptor(&self, identity: &str) -> Option<String> {
        let agents = self.home.path().join("agents");
        let entries = fs::read_dir(&agents).ok()?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&format!("agent-{identity}-")) {
                return fs::read_to_string(entry.path()).ok();
            }
        }
        None
    }

    fn state_dir(&self) -> PathBuf {
        self.home.path().join(".teststate")
    }

    fn install_fake_tool(&self, name: &str, script: &str) {
        let path = self.bin.path().join(name);
        fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        }
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

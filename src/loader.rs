//! Loading missing keys into an agent.
//!
//! The loader computes the set difference between the key records found on
//! disk and the fingerprints the agent already holds, then loads the
//! deficit with a single batched `ssh-add` call - one confirmation or
//! passphrase cycle per invocation instead of one per key. Fingerprints
//! are computed from the public half only; the private half is never read
//! by keymux itself.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::agent::client;
use crate::agent::descriptor::AgentDescriptor;
use crate::config::Config;
use crate::identity::Identity;
use crate::keys::KeyRecord;
use crate::{Error, Result};

/// Fingerprint of a public key file, via `ssh-keygen -l -f`.
///
/// Output reads `<bits> <fingerprint> <comment> (<type>)`; the fingerprint
/// is the second field - the same column `ssh-add -l` reports, so the two
/// sides of the set difference always compare like for like. `None` means
/// the fingerprint could not be computed; the caller then loads the key
/// unconditionally, since it cannot prove the key is already present.
pub fn public_key_fingerprint(public: &Path) -> Option<String> {
    let output = std::process::Command::new("ssh-keygen")
        .args(["-l", "-f"])
        .arg(public)
        .stdin(Stdio::null())
        .output();

    match output {
        Ok(output) if output.status.success() => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let fingerprint = stdout.split_whitespace().nth(1).map(str::to_string);
            if fingerprint.is_none() {
                tracing::debug!(path = %public.display(), "unparseable ssh-keygen output");
            }
            fingerprint
        }
        Ok(output) => {
            tracing::debug!(
                path = %public.display(),
                status = %output.status,
                "ssh-keygen failed for public key"
            );
            None
        }
        Err(e) => {
            tracing::debug!(path = %public.display(), "could not run ssh-keygen: {e}");
            None
        }
    }
}

/// Load the private keys the agent does not already hold.
///
/// Only fully-paired records participate; a record with one half missing
/// was already excluded by the locator's contract. All missing keys go
/// into one `ssh-add` invocation with the identity's configured options
/// (or the global default), stdio inherited so ssh-add can prompt for
/// passphrases itself. Returns the private paths that were handed to
/// ssh-add, in deterministic record order.
pub fn load_missing(
    records: &BTreeMap<String, KeyRecord>,
    descriptor: &AgentDescriptor,
    identity: &Identity,
    config: &Config,
) -> Result<Vec<PathBuf>> {
    let loaded = client::list_loaded(descriptor);

    let mut missing = Vec::new();
    for record in records.values() {
        let (Some(public), Some(private)) = (record.public.as_deref(), record.private.as_deref())
        else {
            continue;
        };
        match public_key_fingerprint(public) {
            Some(fingerprint) if loaded.contains(&fingerprint) => {
                tracing::debug!(key = %private.display(), %fingerprint, "already loaded");
            }
            _ => missing.push(private.to_path_buf()),
        }
    }

    if missing.is_empty() {
        tracing::info!(identity = %identity, "no keys need loading");
        return Ok(Vec::new());
    }

    let options = config.loader_options_for(identity);
    tracing::info!(
        identity = %identity,
        count = missing.len(),
        options,
        "loading keys into agent"
    );

    let mut command = client::agent_command("ssh-add", descriptor);
    command.args(options.split_whitespace());
    command.args(&missing);
    // Inherited stdio: the passphrase/confirmation dialogue belongs to
    // ssh-add, and it blocks this invocation until answered.
    let status = command
        .status()
        .map_err(|source| Error::Exec { tool: "ssh-add".to_string(), source })?;
    if !status.success() {
        tracing::warn!(%status, "ssh-add did not load all keys");
    }

    Ok(missing)
}

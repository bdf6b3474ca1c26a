//! Per-identity ssh-agent lifecycle.
//!
//! One long-lived `ssh-agent` runs per (identity, host) pair, located
//! through a descriptor file that persists the agent's environment
//! variables. The store in [`descriptor`] owns that file's lifecycle -
//! probe, reuse, or respawn - while [`client`] runs agent-side commands
//! (`ssh-add`) inside the environment a descriptor describes.
//!
//! Descriptors never expire on their own; a reboot or a killed agent is
//! discovered lazily when the validity probe fails, which triggers a
//! respawn and an overwrite of the descriptor file. Concurrent invocations
//! need no locking: the probe re-verifies live state instead of trusting
//! the file, so the worst race outcome is one redundant agent whose
//! descriptor is immediately superseded.

pub mod client;
pub mod descriptor;

pub use descriptor::{AgentDescriptor, get_or_create, host_label};

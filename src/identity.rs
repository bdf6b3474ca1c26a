//! Identity selection for an invocation.
//!
//! An identity is an opaque label naming one credential set and one
//! long-lived agent. It is chosen exactly once per invocation and is
//! immutable afterwards.
//!
//! ## Resolution precedence (highest to lowest)
//!
//! 1. Argument match rules over the ssh argument vector
//! 2. Path match rules over the working directory (raw, absolute, and
//!    canonicalized forms)
//! 3. The configured default identity
//! 4. The invoking user's login name
//!
//! Explicit per-invocation intent (what the user typed) outranks ambient
//! context (where the user is standing); the order above is policy, not an
//! implementation accident.

use std::path::Path;

use crate::rules::{MatchRule, find_match};

/// An opaque identity label. Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identity(String);

impl Identity {
    /// Create an identity from any string-like label.
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The label as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Resolve the identity for one invocation.
///
/// `args` is the verbatim ssh argument vector; `cwd` is the working
/// directory the tool was started from. The first resolution step that
/// produces a result short-circuits the rest.
pub fn resolve(
    args: &[String],
    cwd: &Path,
    argv_rules: &[MatchRule],
    path_rules: &[MatchRule],
    default_identity: Option<&Identity>,
) -> Identity {
    if let Some(identity) = find_match(args.iter(), argv_rules) {
        tracing::debug!(identity = %identity, "identity matched from arguments");
        return identity.clone();
    }

    if let Some(identity) = find_match(cwd_candidates(cwd), path_rules) {
        tracing::debug!(identity = %identity, "identity matched from working directory");
        return identity.clone();
    }

    if let Some(identity) = default_identity {
        tracing::debug!(identity = %identity, "using configured default identity");
        return identity.clone();
    }

    let identity = Identity::new(login_name());
    tracing::debug!(identity = %identity, "using login name as identity");
    identity
}

/// String forms of the working directory tried against path rules.
///
/// The raw form matches rules written against relative paths or symlinked
/// locations; the absolute and canonicalized forms match rules written
/// against the real tree. Canonicalization failure (directory removed
/// under us) just drops that candidate.
fn cwd_candidates(cwd: &Path) -> Vec<String> {
    let mut candidates = vec![cwd.to_string_lossy().into_owned()];
    if let Ok(abs) = std::path::absolute(cwd) {
        candidates.push(abs.to_string_lossy().into_owned());
    }
    if let Ok(real) = cwd.canonicalize() {
        candidates.push(real.to_string_lossy().into_owned());
    }
    candidates.dedup();
    candidates
}

/// The invoking user's login name.
///
/// Uses the passwd entry for the real uid, falling back to `$USER` then
/// `$LOGNAME`. The final `"default"` fallback only applies in stripped
/// environments (no passwd entry, no login env vars), where any fixed
/// label is as good as another.
pub fn login_name() -> String {
    #[cfg(unix)]
    {
        if let Ok(Some(user)) = nix::unistd::User::from_uid(nix::unistd::getuid()) {
            return user.name;
        }
    }
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "default".to_string())
}

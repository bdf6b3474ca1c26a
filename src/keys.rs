//! Key discovery and public/private pairing.
//!
//! Key files are found by scanning the identity's directory (plus `~/.ssh`
//! when the identity is the invoking user's own login name, treating the
//! ambient default key directory as that user's identity store). The two
//! halves of a key pair are correlated purely by filename: classify each
//! file with a fixed substring table, strip the matched substring, and
//! merge files sharing the stripped name into one [`KeyRecord`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;

use crate::config::Config;
use crate::identity::{Identity, login_name};
use crate::{Error, Result};

/// Which half of a key pair a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Public,
    Private,
}

/// Ordered filename classification table; the first matching substring
/// wins. The order is load-bearing: a `private`-tagged name must classify
/// as private even when a later public tag would also match, and the empty
/// suffix makes any remaining file the private (bare) half.
const CLASSIFICATION: &[(&str, Side)] = &[
    ("private", Side::Private),
    ("public", Side::Public),
    (".pub", Side::Public),
    ("", Side::Private),
];

/// A public/private key pair correlated by filename.
///
/// Either side may be missing; only records with both halves present are
/// eligible for loading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRecord {
    /// Correlation key: the file path with the classification substring
    /// stripped.
    pub name: String,
    /// Path of the public half, if found.
    pub public: Option<PathBuf>,
    /// Path of the private half, if found.
    pub private: Option<PathBuf>,
}

impl KeyRecord {
    /// Whether both halves are present and the record can be loaded.
    pub fn is_loadable(&self) -> bool {
        self.public.is_some() && self.private.is_some()
    }
}

/// Classify a path and derive its correlation key.
///
/// Returns `(stripped_name, side)`. The empty-substring fallback always
/// matches, so every candidate path classifies.
fn classify(path: &str) -> (String, Side) {
    for (tag, side) in CLASSIFICATION {
        if path.contains(tag) {
            return (path.replacen(tag, "", 1), *side);
        }
    }
    unreachable!("empty substring always matches");
}

/// Locate the key records for an identity.
///
/// Scans `<identities_dir>/<identity>` and, when the identity is the
/// invoking user's login name, `~/.ssh` as well. A directory that does not
/// exist is skipped; any other filesystem failure is fatal. An empty result
/// (no fully-paired records) is reported as a warning but is not an error.
pub fn locate(identity: &Identity, config: &Config) -> Result<BTreeMap<String, KeyRecord>> {
    let mut search_dirs = vec![config.identities_dir.join(identity.as_str())];
    if identity.as_str() == login_name()
        && let Some(home) = dirs::home_dir()
    {
        search_dirs.push(home.join(".ssh"));
    }

    let records = locate_in_dirs(&search_dirs, &config.key_pattern)?;
    if !records.values().any(KeyRecord::is_loadable) {
        tracing::warn!(
            identity = %identity,
            searched = ?search_dirs,
            "no key pairs found for identity; nothing will be loaded"
        );
    }
    Ok(records)
}

/// Scan a fixed list of directories for key files matching `pattern`.
pub fn locate_in_dirs(dirs: &[PathBuf], pattern: &Regex) -> Result<BTreeMap<String, KeyRecord>> {
    let mut records: BTreeMap<String, KeyRecord> = BTreeMap::new();

    for dir in dirs {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(dir = %dir.display(), "key directory absent, skipping");
                continue;
            }
            Err(source) => return Err(Error::KeyScan { path: dir.clone(), source }),
        };

        for entry in entries {
            let entry = entry.map_err(|source| Error::KeyScan { path: dir.clone(), source })?;
            let path = entry.path();
            if !is_regular_file(&path) {
                continue;
            }
            merge(&mut records, &path, pattern);
        }
    }

    Ok(records)
}

/// Merge one file into the record set, if it matches the key pattern.
fn merge(records: &mut BTreeMap<String, KeyRecord>, path: &Path, pattern: &Regex) {
    let path_str = path.to_string_lossy();
    if !pattern.is_match(&path_str) {
        return;
    }

    let (name, side) = classify(&path_str);
    let record = records.entry(name.clone()).or_insert_with(|| KeyRecord {
        name,
        ..KeyRecord::default()
    });
    match side {
        Side::Public => record.public = Some(path.to_path_buf()),
        Side::Private => record.private = Some(path.to_path_buf()),
    }
}

/// Regular-file check, following symlinks the way a key directory full of
/// dotfile-managed links expects.
fn is_regular_file(path: &Path) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

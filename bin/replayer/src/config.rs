//! Configuration

use std::{env, path::PathBuf};

use tracing::warn;

/// Hash function the witness was committed with
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) enum HasherKind {
    /// Keccak-256
    #[default]
    Keccak256,
    /// SHA-256
    Sha256,
}

impl HasherKind {
    /// Whether `s` names a supported hash function
    pub(crate) fn is_known(s: &str) -> bool {
        matches!(
            s.to_lowercase().as_str(),
            "keccak256" | "keccak-256" | "keccak" | "sha256" | "sha-256"
        )
    }
}

impl From<&str> for HasherKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sha256" | "sha-256" => Self::Sha256,
            _ => Self::Keccak256,
        }
    }
}

/// Replayer configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Config {
    /// Witness JSON file
    pub(crate) witness_path: PathBuf,
    /// Tree hash function
    pub(crate) hasher: HasherKind,
}

impl Default for Config {
    fn default() -> Self {
        Self { witness_path: PathBuf::from("witness.json"), hasher: HasherKind::default() }
    }
}

impl Config {
    /// Load from environment variables
    pub(crate) fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let witness_path = var("SMT_WITNESS").map_or(defaults.witness_path, PathBuf::from);
        let hasher = var("SMT_HASHER").map_or_else(HasherKind::default, |s| {
            let kind = HasherKind::from(s.as_str());
            if !HasherKind::is_known(&s) {
                warn!(value = %s, fallback = ?kind, "unknown SMT_HASHER, falling back");
            }
            kind
        });

        Self { witness_path, hasher }
    }
}

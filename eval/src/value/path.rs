//! The two path-shaped value variants: literal filesystem paths, and
//! `<...>`-style search-path lookups.

use std::path::PathBuf;

/// A `LiteralPath`, e.g. `./foo.nix` or `/etc/nixos/configuration.nix`.
/// Canonicalization is deferred: the text is kept as written until
/// something actually needs to resolve it against the filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LiteralPath(pub PathBuf);

impl LiteralPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LiteralPath(path.into())
    }
}

impl std::fmt::Display for LiteralPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// An `EnvPath`, e.g. `<nixpkgs>`. Resolution against `NIX_PATH` is
/// deferred to the force path, performed by the
/// [`crate::nix_search_path::NixSearchPath`] collaborator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvPath(pub String);

impl std::fmt::Display for EnvPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

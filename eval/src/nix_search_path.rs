//! Resolution rules for `NIX_PATH` and `<...>`-style environment paths
//! (spec.md §6, `EnvPath`). This is deliberately the minimal subset of
//! the real Nix `NIX_PATH` semantics: local directory and
//! `prefix=path` entries, resolved against the injected [`EvalIO`].
//! Fetching remote channels or tarballs is out of scope (spec.md §1).

use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use path_clean::PathClean;

use crate::errors::ErrorKind;
use crate::io::EvalIO;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Entry {
    /// A bare directory entry: `<subdir>` resolves to `dir/subdir`.
    Path(PathBuf),
    /// A `prefix=path` entry: `<prefix/rest>` resolves to `path/rest`.
    Prefix { prefix: PathBuf, path: PathBuf },
}

fn canonicalize(path: PathBuf) -> Result<PathBuf, ErrorKind> {
    let absolute = if path.is_absolute() {
        path
    } else {
        std::env::current_dir()
            .map_err(|e| ErrorKind::Io {
                path: Some(path.clone()),
                error: std::rc::Rc::new(e),
            })?
            .join(path)
    }
    .clean();

    Ok(absolute)
}

impl Entry {
    fn resolve(&self, io: &dyn EvalIO, lookup: &Path) -> Result<Option<PathBuf>, ErrorKind> {
        let path = match self {
            Entry::Path(dir) => canonicalize(dir.join(lookup))?,
            Entry::Prefix { prefix, path } => match lookup.strip_prefix(prefix) {
                Ok(rest) => canonicalize(path.join(rest))?,
                Err(_) => return Ok(None),
            },
        };

        if io.path_exists(&path)? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

impl FromStr for Entry {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((prefix, path)) => Ok(Entry::Prefix {
                prefix: prefix.into(),
                path: path.into(),
            }),
            None => Ok(Entry::Path(s.into())),
        }
    }
}

/// Implements `NIX_PATH`'s colon-separated entry format and `<...>`
/// lookup resolution.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct NixSearchPath {
    entries: Vec<Entry>,
}

impl NixSearchPath {
    pub fn resolve(&self, io: &dyn EvalIO, path: impl AsRef<Path>) -> Result<PathBuf, ErrorKind> {
        let path = path.as_ref();
        for entry in &self.entries {
            if let Some(p) = entry.resolve(io, path)? {
                return Ok(p);
            }
        }

        Err(ErrorKind::NixPathResolution(format!(
            "path '{}' was not found in the Nix search path",
            path.display()
        )))
    }
}

impl FromStr for NixSearchPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let entries = s.split(':').map(|s| s.parse()).collect::<Result<_, _>>()?;
        Ok(NixSearchPath { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_paths_parse() {
        let path = NixSearchPath::from_str("/foo/bar:/baz").unwrap();
        assert_eq!(
            path.entries,
            vec![Entry::Path("/foo/bar".into()), Entry::Path("/baz".into())]
        );
    }

    #[test]
    fn mixed_prefix_and_paths_parse() {
        let path = NixSearchPath::from_str("nixpkgs=/my/nixpkgs:/etc/nixos").unwrap();
        assert_eq!(
            path.entries,
            vec![
                Entry::Prefix {
                    prefix: "nixpkgs".into(),
                    path: "/my/nixpkgs".into()
                },
                Entry::Path("/etc/nixos".into()),
            ]
        );
    }

    #[test]
    fn failed_resolution_reports_the_path() {
        let path = NixSearchPath::from_str("/nonexistent-root-for-tests").unwrap();
        let io = crate::io::StdIO;
        let err = path.resolve(&io, "nope").unwrap_err();
        assert!(matches!(err, ErrorKind::NixPathResolution(..)));
    }
}

//! Interface for injecting filesystem interaction into the evaluator.
//!
//! A handful of language features — `import`, path string-coercion,
//! `builtins.readDir` and friends — touch the filesystem. Rather than
//! hard-coding `std::fs` calls throughout the evaluator, all such
//! access goes through this trait, so that callers can substitute an
//! in-memory or sandboxed filesystem (store/build integration is out
//! of scope here, spec.md §1, but this is the seam such a caller would
//! use).
//!
//! Errors are returned as bare [`ErrorKind`], without a [`codemap::Span`]
//! attached: the call site (e.g. [`crate::eval::Evaluator::import_file`])
//! knows which expression triggered the I/O and attaches the span.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use smol_str::SmolStr;

use crate::errors::ErrorKind;

/// Types of files as represented by `builtins.readDir`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Directory,
    Regular,
    Symlink,
    Unknown,
}

pub trait EvalIO {
    fn path_exists(&self, path: &Path) -> Result<bool, ErrorKind>;

    fn read_to_string(&self, path: &Path) -> Result<String, ErrorKind>;

    fn read_dir(&self, path: &Path) -> Result<Vec<(SmolStr, FileType)>, ErrorKind>;

    /// Resolves a path to the location `import`/path-coercion should
    /// actually use (a store-backed implementation might copy it in;
    /// the standard implementation is a no-op).
    fn import_path(&self, path: &Path) -> Result<PathBuf, ErrorKind>;
}

/// Real filesystem access via `std::fs`.
pub struct StdIO;

impl EvalIO for StdIO {
    fn path_exists(&self, path: &Path) -> Result<bool, ErrorKind> {
        path.try_exists().map_err(|e| ErrorKind::Io {
            path: Some(path.to_path_buf()),
            error: Rc::new(e),
        })
    }

    fn read_to_string(&self, path: &Path) -> Result<String, ErrorKind> {
        std::fs::read_to_string(path).map_err(|e| ErrorKind::Io {
            path: Some(path.to_path_buf()),
            error: Rc::new(e),
        })
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<(SmolStr, FileType)>, ErrorKind> {
        let mk_err = |err| ErrorKind::Io {
            path: Some(path.to_path_buf()),
            error: Rc::new(err),
        };

        let mut result = Vec::new();
        for entry in path.read_dir().map_err(mk_err)? {
            let entry = entry.map_err(mk_err)?;
            let file_type = entry
                .metadata()
                .map_err(|err| ErrorKind::Io {
                    path: Some(entry.path()),
                    error: Rc::new(err),
                })?
                .file_type();

            let kind = if file_type.is_dir() {
                FileType::Directory
            } else if file_type.is_file() {
                FileType::Regular
            } else if file_type.is_symlink() {
                FileType::Symlink
            } else {
                FileType::Unknown
            };

            result.push((SmolStr::new(entry.file_name().to_string_lossy()), kind));
        }

        Ok(result)
    }

    fn import_path(&self, path: &Path) -> Result<PathBuf, ErrorKind> {
        Ok(path.to_path_buf())
    }
}

/// An [`EvalIO`] that fails every call. Used where the evaluator must
/// run but no real filesystem access should ever happen (e.g. checking
/// pure-expression evaluation).
pub struct DummyIO;

impl EvalIO for DummyIO {
    fn path_exists(&self, _path: &Path) -> Result<bool, ErrorKind> {
        Err(ErrorKind::NotImplemented("filesystem access is disabled"))
    }

    fn read_to_string(&self, _path: &Path) -> Result<String, ErrorKind> {
        Err(ErrorKind::NotImplemented("filesystem access is disabled"))
    }

    fn read_dir(&self, _path: &Path) -> Result<Vec<(SmolStr, FileType)>, ErrorKind> {
        Err(ErrorKind::NotImplemented("filesystem access is disabled"))
    }

    fn import_path(&self, _path: &Path) -> Result<PathBuf, ErrorKind> {
        Err(ErrorKind::NotImplemented("filesystem access is disabled"))
    }
}

//! Per-run copies of a Terraform module tree.
//!
//! Modules commonly reference siblings with relative `source` paths, so the
//! whole root is copied and the path of the requested sub-directory inside
//! the copy is returned. Hidden entries (including `.terraform`), state
//! files and variable files are left behind so no run inherits another's
//! state. The provider lock file is the one hidden entry that is copied.
//!
//! A copy lives in a [`ModuleCopy`] guard and is deleted when the guard is
//! dropped unless [`ModuleCopy::keep`] is called.

use std::io;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};
use tempfile::TempDir;
use thiserror::Error;
use tracing::debug;

/// Prefix of every copy directory created under the parent.
pub const TEMP_PREFIX: &str = "ecsprobe-";

const LOCK_FILE: &str = ".terraform.lock.hcl";

const SKIPPED_FILES: [&str; 4] = [
    "terraform.tfstate",
    "terraform.tfstate.backup",
    "terraform.tfvars",
    "terraform.tfvars.json",
];

/// Errors raised while copying a module tree.
#[derive(Debug, Error)]
pub enum ModuleCopyError {
    /// Raised when the requested module directory does not exist.
    #[error("module directory {path} does not exist")]
    MissingModule {
        /// Module path that was requested.
        path: Utf8PathBuf,
    },
    /// Raised when the system temp directory is not valid UTF-8.
    #[error("temporary directory path is not valid UTF-8")]
    NonUtf8TempDir,
    /// Raised when the copy fails.
    #[error("failed to copy {path}: {message}")]
    Io {
        /// Path being copied.
        path: Utf8PathBuf,
        /// Underlying error message.
        message: String,
    },
}

/// Owned temporary copy of a module tree.
#[derive(Debug)]
pub struct ModuleCopy {
    dir: TempDir,
    root: Utf8PathBuf,
    module_dir: Utf8PathBuf,
}

impl ModuleCopy {
    /// Root of the copied tree.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Requested module directory inside the copy.
    #[must_use]
    pub fn module_dir(&self) -> &Utf8Path {
        &self.module_dir
    }

    /// Disables cleanup and returns the root of the copy, which then
    /// outlives the guard.
    #[must_use]
    pub fn keep(self) -> Utf8PathBuf {
        let Self { dir, root, .. } = self;
        let _kept = dir.keep();
        root
    }
}

/// Copies `root` into a fresh directory under the system temp directory.
///
/// # Errors
///
/// Returns [`ModuleCopyError::MissingModule`] when `root/module` is not a
/// directory, and [`ModuleCopyError::Io`] when any entry cannot be copied.
pub fn copy_module_to_temp(root: &Utf8Path, module: &str) -> Result<ModuleCopy, ModuleCopyError> {
    let temp_root = Utf8PathBuf::from_path_buf(std::env::temp_dir())
        .map_err(|_| ModuleCopyError::NonUtf8TempDir)?;
    copy_module_into(root, module, &temp_root)
}

/// Same as [`copy_module_to_temp`] with an explicit parent for the copy.
///
/// # Errors
///
/// See [`copy_module_to_temp`].
pub fn copy_module_into(
    root: &Utf8Path,
    module: &str,
    parent: &Utf8Path,
) -> Result<ModuleCopy, ModuleCopyError> {
    let io_error = |failed: &Utf8Path| {
        let path = failed.to_path_buf();
        move |err: io::Error| ModuleCopyError::Io {
            path,
            message: err.to_string(),
        }
    };

    let source = Dir::open_ambient_dir(root, ambient_authority()).map_err(io_error(root))?;
    let module_path = root.join(module);
    if !source.is_dir(module) {
        return Err(ModuleCopyError::MissingModule { path: module_path });
    }

    let dir = tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempdir_in(parent)
        .map_err(io_error(parent))?;
    let copy_root = Utf8Path::from_path(dir.path())
        .ok_or(ModuleCopyError::NonUtf8TempDir)?
        .to_path_buf();
    let destination =
        Dir::open_ambient_dir(&copy_root, ambient_authority()).map_err(io_error(&copy_root))?;

    copy_tree(&source, &destination).map_err(io_error(root))?;
    debug!(source = %module_path, destination = %copy_root, "copied module tree");
    Ok(ModuleCopy {
        dir,
        module_dir: copy_root.join(module),
        root: copy_root,
    })
}

fn is_skipped(name: &str) -> bool {
    if name == LOCK_FILE {
        return false;
    }
    name.starts_with('.') || SKIPPED_FILES.contains(&name)
}

fn copy_tree(source: &Dir, destination: &Dir) -> io::Result<()> {
    for listed in source.entries()? {
        let entry = listed?;
        let name = entry.file_name()?;
        if is_skipped(&name) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            destination.create_dir(&name)?;
            copy_tree(&entry.open_dir()?, &destination.open_dir(&name)?)?;
        } else if file_type.is_file() {
            source.copy(&name, destination, &name)?;
        }
    }
    Ok(())
}

//! Locating the external OpenPGP tool
//!
//! The search is directory-major: every `PATH` entry is checked for `gpg`
//! and then `gpg2` before moving on to the next entry, so the first
//! directory that holds either binary wins.

use crate::error::{ErrorCategory, ErrorKind, GpgsymError, Result};
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Which generation of gpg was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolVariant {
    /// Classic `gpg`. Must be told not to talk to a running agent.
    ///
    /// On most current systems `gpg` is GnuPG 2.x, which ignores
    /// `--no-use-agent` and warns that it is obsolete on stderr every run.
    /// That warning shows up under decryption failures.
    Gpg,
    /// `gpg2`. Only honors a descriptor-supplied passphrase in loopback
    /// pinentry mode.
    Gpg2,
}

impl ToolVariant {
    /// Candidates in the order they are tried within one directory.
    pub const CANDIDATES: [ToolVariant; 2] = [ToolVariant::Gpg, ToolVariant::Gpg2];

    pub fn binary_name(self) -> &'static str {
        match self {
            ToolVariant::Gpg => "gpg",
            ToolVariant::Gpg2 => "gpg2",
        }
    }

    /// Flags placed before any mode-specific flags.
    fn prefix(self) -> &'static [&'static str] {
        match self {
            ToolVariant::Gpg => &["--no-use-agent"],
            ToolVariant::Gpg2 => &["--pinentry-mode", "loopback"],
        }
    }
}

/// The resolved tool. Created once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolBinding {
    program: PathBuf,
    variant: ToolVariant,
    prefix: Vec<String>,
}

impl ToolBinding {
    pub fn new(program: impl Into<PathBuf>, variant: ToolVariant) -> Self {
        Self {
            program: program.into(),
            variant,
            prefix: variant.prefix().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Absolute path of the executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn variant(&self) -> ToolVariant {
        self.variant
    }

    /// Variant-specific flags every invocation starts with.
    pub fn prefix(&self) -> &[String] {
        &self.prefix
    }
}

/// Locate gpg using the process's `PATH`.
pub fn locate() -> Result<ToolBinding> {
    let path = env::var_os("PATH").unwrap_or_default();
    locate_in(&path)
}

/// Locate gpg within an explicit search path (same syntax as `PATH`).
///
/// Empty entries are skipped, not treated as the current directory.
pub fn locate_in(search_path: &OsStr) -> Result<ToolBinding> {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));

    for dir in env::split_paths(search_path) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        for variant in ToolVariant::CANDIDATES {
            if let Ok(found) = which::which_in(variant.binary_name(), Some(&dir), &cwd) {
                log::info!("using {} at {}", variant.binary_name(), found.display());
                return Ok(ToolBinding::new(found, variant));
            }
        }
    }

    Err(GpgsymError::with_kind(
        ErrorCategory::Internal,
        ErrorKind::ToolNotFound,
        "this program requires either gpg or gpg2 to work",
    ))
}

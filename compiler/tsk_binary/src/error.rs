//! Fatal compile and load errors.
//!
//! Unlike front-end diagnostics these are single and final: a failed
//! compile publishes nothing, a failed load returns no data.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::cancel::Interrupt;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("cannot compile {shape} at `{location}`")]
    Unsupported { shape: &'static str, location: String },

    #[error("I/O error while {action}: {source}")]
    Io {
        action: String,
        #[source]
        source: io::Error,
    },

    #[error("compilation cancelled")]
    Cancelled,

    #[error("compilation timed out")]
    TimedOut,

    #[error("{what} exceeds the artifact size limit")]
    TooLarge { what: &'static str },
}

impl CompileError {
    #[cold]
    pub(crate) fn io(action: impl Into<String>, source: io::Error) -> Self {
        CompileError::Io {
            action: action.into(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, CompileError::Cancelled | CompileError::TimedOut)
    }
}

impl From<Interrupt> for CompileError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => CompileError::Cancelled,
            Interrupt::TimedOut => CompileError::TimedOut,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("not a .pnt artifact (bad magic)")]
    Format,

    #[error("unsupported artifact version {found} (this build reads version {supported})")]
    VersionMismatch { found: u16, supported: u16 },

    #[error("corrupt artifact: {detail}")]
    Corruption { detail: String },

    #[error("failed to read `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("load cancelled")]
    Cancelled,

    #[error("load timed out")]
    TimedOut,
}

impl LoadError {
    #[cold]
    pub(crate) fn corruption(detail: impl Into<String>) -> Self {
        LoadError::Corruption {
            detail: detail.into(),
        }
    }

    #[cold]
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, LoadError::Cancelled | LoadError::TimedOut)
    }
}

impl From<Interrupt> for LoadError {
    fn from(interrupt: Interrupt) -> Self {
        match interrupt {
            Interrupt::Cancelled => LoadError::Cancelled,
            Interrupt::TimedOut => LoadError::TimedOut,
        }
    }
}

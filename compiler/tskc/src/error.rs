use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tsk_binary::{CompileError, LoadError};
use tsk_diagnostic::Diagnostic;

/// Why the factory could not produce a configuration.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// The source has lexical, syntax, semantic or resolution errors.
    #[error("`{}` has {} error(s)", path.display(), error_count(diagnostics))]
    Diagnostics {
        path: PathBuf,
        diagnostics: Vec<Diagnostic>,
    },

    #[error("no source at `{}` and no usable artifact", path.display())]
    SourceMissing { path: PathBuf },

    #[error("failed to compile `{}`: {source}", path.display())]
    Compile {
        path: PathBuf,
        #[source]
        source: CompileError,
    },

    #[error("failed to load `{}`: {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("I/O error on `{}`: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn error_count(diagnostics: &[Diagnostic]) -> usize {
    diagnostics.iter().filter(|d| d.is_error()).count()
}

impl FactoryError {
    /// Diagnostics carried by [`FactoryError::Diagnostics`], else empty.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            FactoryError::Diagnostics { diagnostics, .. } => diagnostics,
            _ => &[],
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            FactoryError::Compile {
                source: CompileError::Cancelled,
                ..
            } | FactoryError::Load {
                source: LoadError::Cancelled,
                ..
            }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            FactoryError::Compile {
                source: CompileError::TimedOut,
                ..
            } | FactoryError::Load {
                source: LoadError::TimedOut,
                ..
            }
        )
    }
}

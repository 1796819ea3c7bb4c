//! Factory configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use tsk_binary::Compression;
use tsk_diagnostic::DiagnosticConfig;

/// Environment variable naming a directory for compiled artifacts.
pub const ARTIFACT_DIR_VAR: &str = "TSK_ARTIFACT_DIR";
/// Environment variable selecting artifact compression (`none` | `deflate`).
pub const COMPRESSION_VAR: &str = "TSK_COMPRESSION";

#[derive(Clone, Debug, PartialEq)]
pub struct FactoryConfig {
    /// Where artifacts go. `None` puts `<name>.pnt` beside each source.
    pub artifact_dir: Option<PathBuf>,
    pub compression: Compression,
    /// Applied to each compile and each load separately.
    pub timeout: Option<Duration>,
    pub diagnostics: DiagnosticConfig,
    /// Window over which repeated recompiles of one source are counted.
    pub recompile_window: Duration,
    /// Recompiles within the window that trigger a recommendation.
    pub recompile_warn_threshold: usize,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        FactoryConfig {
            artifact_dir: None,
            compression: Compression::None,
            timeout: None,
            diagnostics: DiagnosticConfig::default(),
            recompile_window: Duration::from_secs(10 * 60),
            recompile_warn_threshold: 5,
        }
    }
}

impl FactoryConfig {
    pub fn new() -> Self {
        FactoryConfig::default()
    }

    /// Defaults overridden by `TSK_ARTIFACT_DIR` and `TSK_COMPRESSION`.
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Like [`FactoryConfig::from_env`], reading variables through `var`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = FactoryConfig::default();
        if let Some(dir) = var(ARTIFACT_DIR_VAR).filter(|d| !d.trim().is_empty()) {
            config.artifact_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = var(COMPRESSION_VAR) {
            match value.parse::<Compression>() {
                Ok(compression) => config.compression = compression,
                Err(message) => warn!(var = COMPRESSION_VAR, "{message}; using none"),
            }
        }
        config
    }

    #[must_use]
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: DiagnosticConfig) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    #[must_use]
    pub fn with_recompile_warning(mut self, threshold: usize, window: Duration) -> Self {
        self.recompile_warn_threshold = threshold;
        self.recompile_window = window;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides() {
        let config = FactoryConfig::from_vars(|name| match name {
            ARTIFACT_DIR_VAR => Some("/var/cache/tsk".to_owned()),
            COMPRESSION_VAR => Some("Deflate".to_owned()),
            _ => None,
        });
        assert_eq!(config.artifact_dir, Some(PathBuf::from("/var/cache/tsk")));
        assert_eq!(config.compression, Compression::Deflate);
    }

    #[test]
    fn bad_or_empty_values_keep_defaults() {
        let config = FactoryConfig::from_vars(|name| match name {
            ARTIFACT_DIR_VAR => Some("  ".to_owned()),
            COMPRESSION_VAR => Some("zstd".to_owned()),
            _ => None,
        });
        assert_eq!(config, FactoryConfig::default());
    }

    #[test]
    fn builder() {
        let config = FactoryConfig::new()
            .with_timeout(Duration::from_secs(2))
            .with_recompile_warning(3, Duration::from_secs(60));
        assert_eq!(config.timeout, Some(Duration::from_secs(2)));
        assert_eq!(config.recompile_warn_threshold, 3);
    }
}

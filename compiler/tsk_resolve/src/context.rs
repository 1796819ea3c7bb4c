//! The context object passed to every resolution.

use std::sync::Arc;

use tsk_diagnostic::DiagnosticConfig;
use tsk_sema::{Environment, ExecContext, OperatorRegistry};

/// Operators and environment for one resolution.
///
/// Resolution never consults process state directly: `@env` calls are
/// substituted only from `environment`, and without one they stay deferred.
#[derive(Clone, Debug)]
pub struct ResolveContext {
    pub registry: Arc<OperatorRegistry>,
    pub environment: Option<Environment>,
    pub limits: DiagnosticConfig,
}

impl Default for ResolveContext {
    fn default() -> Self {
        Self::new(Arc::new(OperatorRegistry::builtin()))
    }
}

impl ResolveContext {
    pub fn new(registry: Arc<OperatorRegistry>) -> Self {
        ResolveContext {
            registry,
            environment: None,
            limits: DiagnosticConfig::default(),
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = Some(environment);
        self
    }

    #[must_use]
    pub fn with_limits(mut self, limits: DiagnosticConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn exec_context(&self) -> ExecContext<'_> {
        ExecContext {
            environment: self.environment.as_ref(),
        }
    }
}

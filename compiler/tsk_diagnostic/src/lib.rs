//! Diagnostics for the TSK pipeline.
//!
//! Every recoverable problem found while lexing, parsing, analysing or
//! resolving a `.tsk` file becomes a [`Diagnostic`] carrying an
//! [`ErrorCode`], a [`Severity`], the originating [`Stage`] and a source
//! position. Stages collect into a capped [`DiagnosticQueue`]; the
//! [`Emitter`] renders the result for humans.

mod diagnostic;
mod emitter;
mod error_code;
mod queue;

pub use diagnostic::{has_errors, Diagnostic, Severity, Stage};
pub use emitter::Emitter;
pub use error_code::ErrorCode;
pub use queue::{DiagnosticConfig, DiagnosticQueue};

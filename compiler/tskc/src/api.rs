//! One-call entry points for each pipeline stage.

use std::path::Path;

use tracing::debug;
use tsk_diagnostic::{has_errors, Diagnostic, DiagnosticConfig};
use tsk_ir::{Config, ConfigTree, Value};
use tsk_parse::ParseOptions;
use tsk_resolve::ResolveContext;
use tsk_sema::OperatorRegistry;

use crate::error::FactoryError;
use crate::factory::BinaryFactory;

/// Lex and parse `text`. The syntax tree holds every section that parsed.
pub fn parse(text: &str) -> (Config, Vec<Diagnostic>) {
    let parsed = tsk_parse::parse_source(text);
    let diagnostics = parsed.diagnostics();
    (parsed.config, diagnostics)
}

/// Check operator usage, references and literal coherence.
pub fn analyze(config: &Config, registry: &OperatorRegistry) -> Vec<Diagnostic> {
    tsk_sema::analyze(config, registry).diagnostics()
}

pub fn resolve(config: &Config, context: &ResolveContext) -> (ConfigTree, Vec<Diagnostic>) {
    let resolution = tsk_resolve::resolve(config, context);
    let diagnostics = resolution.diagnostics();
    (resolution.tree, diagnostics)
}

/// Load `path` through a default [`BinaryFactory`], compiling it when its
/// artifact is missing or stale.
pub fn load(path: &Path) -> Result<ConfigTree, FactoryError> {
    BinaryFactory::default().load_configuration(path)
}

pub fn get<'t>(tree: &'t ConfigTree, dotted: &str) -> Option<&'t Value> {
    tree.get(dotted)
}

/// Run source bytes through every front-end stage.
///
/// Succeeds when no stage reported an error; warnings alone do not fail.
/// On failure every diagnostic gathered so far is returned, capped by
/// `limits`.
pub(crate) fn front_end(
    bytes: &[u8],
    context: &ResolveContext,
    limits: &DiagnosticConfig,
) -> Result<ConfigTree, Vec<Diagnostic>> {
    let (text, decode_errors) = tsk_lexer::decode_source(bytes);
    let options = ParseOptions {
        max_errors: limits.limit,
        ..ParseOptions::default()
    };
    let parsed = tsk_parse::parse_source_with(&text, &options);
    let mut diagnostics: Vec<Diagnostic> = decode_errors
        .iter()
        .map(tsk_lexer::LexError::to_diagnostic)
        .collect();
    diagnostics.extend(parsed.diagnostics());

    let analysis = tsk_sema::analyze_with(&parsed.config, &context.registry, limits);
    diagnostics.extend(analysis.diagnostics());
    if has_errors(&diagnostics) {
        return Err(capped(diagnostics, limits));
    }

    let resolution = tsk_resolve::resolve(&parsed.config, context);
    diagnostics.extend(resolution.diagnostics());
    if has_errors(&diagnostics) {
        return Err(capped(diagnostics, limits));
    }
    debug!(warnings = diagnostics.len(), "front end passed");
    Ok(resolution.tree)
}

fn capped(mut diagnostics: Vec<Diagnostic>, limits: &DiagnosticConfig) -> Vec<Diagnostic> {
    diagnostics.sort_by_key(|d| (d.pos.offset, d.code));
    if limits.limit > 0 {
        diagnostics.truncate(limits.limit);
    }
    diagnostics
}

//! The TSK configuration pipeline.
//!
//! ```text
//! text -> tokens -> syntax tree -> analysed tree -> ConfigTree -> .pnt -> loaded tree
//! ```
//!
//! The stage crates do the work; this crate ties them together:
//!
//! - [`parse`], [`analyze`], [`resolve`], [`compile`], [`load`] and [`get`]
//!   run one stage each
//! - [`BinaryFactory`] compiles a source only when its artifact is stale
//!   and otherwise loads the artifact, optionally in parallel batches
//! - [`LiveConfig`] and [`Watcher`] swap in a reloaded tree without
//!   blocking readers
//! - [`TelemetrySink`] receives compile and load events

mod api;
mod config;
mod error;
mod factory;
mod reload;
mod stats;
mod telemetry;

pub use api::{analyze, get, load, parse, resolve};
pub use config::{FactoryConfig, ARTIFACT_DIR_VAR, COMPRESSION_VAR};
pub use error::FactoryError;
pub use factory::{BinaryFactory, CacheEntry, CompileReport, CompileResult, HIERARCHY_FILE};
pub use reload::{LiveConfig, ReloadConfig, Watcher};
pub use stats::{FactoryStats, StatsSnapshot};
pub use telemetry::{init_tracing, RecordingSink, TelemetryEvent, TelemetrySink, TracingSink};

pub use tsk_binary::{
    compile, CancelToken, CompileError, CompileOptions, Compression, LoadError, LoadedConfig,
};
pub use tsk_diagnostic::{Diagnostic, DiagnosticConfig, Severity};
pub use tsk_ir::{Config, ConfigTree, Value};
pub use tsk_resolve::ResolveContext;
pub use tsk_sema::{Environment, OperatorRegistry};

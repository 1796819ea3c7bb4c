//! Compile-if-stale loading of `.tsk` sources.
//!
//! For each source the factory decides between three paths:
//!
//! - artifact missing, unreadable or of another format version: compile,
//!   publish, load
//! - source content changed since the artifact was written: compile,
//!   publish, load
//! - otherwise: load the artifact directly
//!
//! Size and mtime matching the last validation skip hashing the source.
//! Otherwise the content hash decides, so touching a file without changing
//! it does not trigger a recompile. The fingerprint also carries a hash of
//! the factory's resolution context (environment, operator set and
//! compression), so an artifact built under another context is stale.

use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::FxHasher;
use tracing::{debug, info, warn};
use tsk_binary::{
    compile_to_file, hash_bytes, read_header, CancelToken, CompileOptions, Compression,
    Fingerprint, LoadedConfig,
};
use tsk_ir::ConfigTree;
use tsk_resolve::ResolveContext;

use crate::api::front_end;
use crate::config::FactoryConfig;
use crate::error::FactoryError;
use crate::stats::FactoryStats;
use crate::telemetry::{TelemetryEvent, TelemetrySink, TracingSink};

/// File name collected by [`BinaryFactory::load_hierarchy`].
pub const HIERARCHY_FILE: &str = "peanu.tsk";

/// What the factory last validated for one source.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub source: PathBuf,
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub artifact: PathBuf,
    pub validated_at: SystemTime,
}

impl CacheEntry {
    fn matches(&self, size: u64, mtime: Option<SystemTime>) -> bool {
        mtime.is_some() && self.size == size && self.mtime == mtime
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompileReport {
    pub artifact: PathBuf,
    pub bytes: usize,
    pub duration: std::time::Duration,
}

/// Outcome of compiling one source in a batch.
#[derive(Debug)]
pub struct CompileResult {
    pub source: PathBuf,
    pub outcome: Result<CompileReport, FactoryError>,
}

pub struct BinaryFactory {
    config: FactoryConfig,
    context: ResolveContext,
    /// [`context_hash`] of `context` under `config.compression`.
    context_hash: u64,
    sink: Arc<dyn TelemetrySink>,
    entries: DashMap<PathBuf, CacheEntry>,
    stats: FactoryStats,
}

impl Default for BinaryFactory {
    fn default() -> Self {
        BinaryFactory::new(FactoryConfig::default())
    }
}

impl BinaryFactory {
    pub fn new(config: FactoryConfig) -> Self {
        let context = ResolveContext::default().with_limits(config.diagnostics.clone());
        BinaryFactory {
            context_hash: context_hash(&context, config.compression),
            context,
            config,
            sink: Arc::new(TracingSink),
            entries: DashMap::new(),
            stats: FactoryStats::default(),
        }
    }

    /// Operators and environment used when compiling sources.
    #[must_use]
    pub fn with_context(mut self, context: ResolveContext) -> Self {
        self.context = context.with_limits(self.config.diagnostics.clone());
        self.context_hash = context_hash(&self.context, self.config.compression);
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    pub fn stats(&self) -> &FactoryStats {
        &self.stats
    }

    pub fn recommendations(&self) -> Vec<String> {
        self.stats.recommendations(
            self.config.recompile_window,
            self.config.recompile_warn_threshold,
        )
    }

    pub fn cache_entry(&self, source: &Path) -> Option<CacheEntry> {
        self.entries.get(source).map(|e| e.value().clone())
    }

    /// `<source stem>.pnt` beside the source, or
    /// `<artifact_dir>/<stem>-<path hash>.pnt`.
    pub fn artifact_path(&self, source: &Path) -> PathBuf {
        match &self.config.artifact_dir {
            None => source.with_extension("pnt"),
            Some(dir) => {
                let stem = source
                    .file_stem()
                    .map_or_else(|| "config".into(), |s| s.to_string_lossy());
                let absolute = fs::canonicalize(source).unwrap_or_else(|_| source.to_path_buf());
                let hash = hash_bytes(absolute.to_string_lossy().as_bytes());
                dir.join(format!("{stem}-{hash:016x}.pnt"))
            }
        }
    }

    fn cancel_token(&self) -> CancelToken {
        match self.config.timeout {
            Some(timeout) => CancelToken::new().with_timeout(timeout),
            None => CancelToken::new(),
        }
    }

    /// Load `source`, compiling it first when its artifact is stale.
    pub fn load_configuration(&self, source: &Path) -> Result<ConfigTree, FactoryError> {
        let loaded = self.load_artifact(source)?;
        loaded
            .to_tree_with(&self.cancel_token())
            .map_err(|e| FactoryError::Load {
                path: self.artifact_path(source),
                source: e,
            })
    }

    /// Like [`BinaryFactory::load_configuration`] but keeps the mapped
    /// artifact, decoding sections only as they are read.
    pub fn load_artifact(&self, source: &Path) -> Result<LoadedConfig, FactoryError> {
        self.sink.record(&TelemetryEvent::LoadStarted {
            source: source.to_path_buf(),
        });
        let started = Instant::now();
        let artifact = self.artifact_path(source);

        let Ok(meta) = fs::metadata(source) else {
            return self.load_without_source(source, &artifact, started);
        };
        let size = meta.len();
        let mtime = meta.modified().ok();

        let cached = self
            .entries
            .get(source)
            .filter(|e| e.artifact == artifact && e.matches(size, mtime) && artifact.exists())
            .map(|e| e.fingerprint);

        let (fingerprint, fresh) = match cached {
            Some(fingerprint) => (fingerprint, true),
            None => {
                let bytes = fs::read(source).map_err(|e| FactoryError::Io {
                    path: source.to_path_buf(),
                    source: e,
                })?;
                let fingerprint = Fingerprint::new(&bytes, mtime).with_context(self.context_hash);
                let fresh = match read_header(&artifact) {
                    Ok(header) => header.fingerprint.same_content(&fingerprint),
                    Err(e) => {
                        debug!(artifact = %artifact.display(), error = %e, "artifact unusable");
                        false
                    }
                };
                (fingerprint, fresh)
            }
        };

        let mut compiled = false;
        if !fresh {
            info!(source = %source.display(), "recompiling stale artifact");
            self.compile_source_with(source, fingerprint)?;
            compiled = true;
        }

        let loaded = match self.open(&artifact) {
            Ok(loaded) => loaded,
            Err(e) if !compiled && !e.is_interrupted() => {
                warn!(
                    artifact = %artifact.display(),
                    error = %e,
                    "artifact failed to load; recompiling from source"
                );
                self.compile_source_with(source, fingerprint)?;
                compiled = true;
                self.open(&artifact).map_err(|e| FactoryError::Load {
                    path: artifact.clone(),
                    source: e,
                })?
            }
            Err(e) => {
                return Err(FactoryError::Load {
                    path: artifact,
                    source: e,
                })
            }
        };

        self.entries.insert(
            source.to_path_buf(),
            CacheEntry {
                source: source.to_path_buf(),
                fingerprint,
                size,
                mtime,
                artifact,
                validated_at: SystemTime::now(),
            },
        );
        self.finish_load(source, started, !compiled);
        Ok(loaded)
    }

    fn open(&self, artifact: &Path) -> Result<LoadedConfig, tsk_binary::LoadError> {
        LoadedConfig::open_with(artifact, &self.cancel_token())
    }

    /// Without a source the artifact is all there is; its errors are final.
    fn load_without_source(
        &self,
        source: &Path,
        artifact: &Path,
        started: Instant,
    ) -> Result<LoadedConfig, FactoryError> {
        if !artifact.exists() {
            return Err(FactoryError::SourceMissing {
                path: source.to_path_buf(),
            });
        }
        warn!(source = %source.display(), "source missing; loading artifact as is");
        let loaded = self.open(artifact).map_err(|e| FactoryError::Load {
            path: artifact.to_path_buf(),
            source: e,
        })?;
        self.finish_load(source, started, true);
        Ok(loaded)
    }

    fn finish_load(&self, source: &Path, started: Instant, cache_hit: bool) {
        let duration = started.elapsed();
        self.stats.record_load(duration, cache_hit);
        self.sink.record(&TelemetryEvent::LoadFinished {
            source: source.to_path_buf(),
            duration,
            cache_hit,
        });
    }

    /// Compile and publish `source` unconditionally.
    pub fn compile_source(&self, source: &Path) -> Result<CompileReport, FactoryError> {
        let fingerprint = Fingerprint::of_file(source)
            .map_err(|e| source_error(source, e))?
            .with_context(self.context_hash);
        self.compile_source_with(source, fingerprint)
    }

    fn compile_source_with(
        &self,
        source: &Path,
        fingerprint: Fingerprint,
    ) -> Result<CompileReport, FactoryError> {
        self.sink.record(&TelemetryEvent::CompileStarted {
            source: source.to_path_buf(),
        });
        let started = Instant::now();
        let bytes = fs::read(source).map_err(|e| source_error(source, e))?;
        let tree = front_end(&bytes, &self.context, &self.config.diagnostics).map_err(
            |diagnostics| FactoryError::Diagnostics {
                path: source.to_path_buf(),
                diagnostics,
            },
        )?;

        let artifact = self.artifact_path(source);
        if let Some(dir) = &self.config.artifact_dir {
            fs::create_dir_all(dir).map_err(|e| FactoryError::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        let options = CompileOptions::default()
            .with_compression(self.config.compression)
            .with_fingerprint(fingerprint)
            .with_cancel(self.cancel_token());
        let written =
            compile_to_file(&tree, &artifact, &options).map_err(|e| FactoryError::Compile {
                path: source.to_path_buf(),
                source: e,
            })?;

        let duration = started.elapsed();
        self.stats.record_compile(source, self.config.recompile_window);
        self.sink.record(&TelemetryEvent::CompileFinished {
            source: source.to_path_buf(),
            duration,
            bytes_out: written,
        });
        info!(
            source = %source.display(),
            artifact = %artifact.display(),
            bytes = written,
            "published artifact"
        );
        Ok(CompileReport {
            artifact,
            bytes: written,
            duration,
        })
    }

    /// Compile every source on the rayon pool, one source per task.
    pub fn precompile_all(&self, sources: &[PathBuf]) -> Vec<CompileResult> {
        let results: Vec<CompileResult> = sources
            .par_iter()
            .map(|source| CompileResult {
                source: source.clone(),
                outcome: self.compile_source(source),
            })
            .collect();
        let failed = results.iter().filter(|r| r.outcome.is_err()).count();
        info!(sources = sources.len(), failed, "precompiled sources");
        results
    }

    /// Merge every `peanu.tsk` from the filesystem root down to `dir`.
    ///
    /// Files closer to `dir` override individual keys of files above them.
    pub fn load_hierarchy(&self, dir: &Path) -> Result<ConfigTree, FactoryError> {
        let mut sources: Vec<PathBuf> = dir
            .ancestors()
            .map(|d| d.join(HIERARCHY_FILE))
            .filter(|p| p.is_file())
            .collect();
        if sources.is_empty() {
            return Err(FactoryError::SourceMissing {
                path: dir.join(HIERARCHY_FILE),
            });
        }
        sources.reverse();
        let mut tree = ConfigTree::new();
        for source in &sources {
            tree = tree.merged(&self.load_configuration(source)?);
        }
        debug!(files = sources.len(), keys = tree.key_count(), "loaded hierarchy");
        Ok(tree)
    }
}

fn source_error(source: &Path, error: std::io::Error) -> FactoryError {
    if error.kind() == std::io::ErrorKind::NotFound {
        FactoryError::SourceMissing {
            path: source.to_path_buf(),
        }
    } else {
        FactoryError::Io {
            path: source.to_path_buf(),
            source: error,
        }
    }
}

/// Hash of everything besides the source text that shapes an artifact.
fn context_hash(context: &ResolveContext, compression: Compression) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(compression.name().as_bytes());
    for name in context.registry.names() {
        hasher.write(name.as_bytes());
        if let Some(schema) = context.registry.schema(name) {
            hasher.write_u8(u8::from(schema.pure) | (u8::from(schema.env_sourced) << 1));
        }
    }
    match &context.environment {
        None => hasher.write_u8(0),
        Some(environment) => {
            hasher.write_u8(1);
            for (name, value) in environment.iter() {
                hasher.write(name.as_bytes());
                hasher.write_u8(b'=');
                hasher.write(value.as_bytes());
                hasher.write_u8(0);
            }
        }
    }
    hasher.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

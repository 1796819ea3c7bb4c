//! Compile and load events for an external sink.

use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryEvent {
    CompileStarted {
        source: PathBuf,
    },
    CompileFinished {
        source: PathBuf,
        duration: Duration,
        bytes_out: usize,
    },
    LoadStarted {
        source: PathBuf,
    },
    LoadFinished {
        source: PathBuf,
        duration: Duration,
        cache_hit: bool,
    },
}

impl TelemetryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            TelemetryEvent::CompileStarted { .. } => "CompileStarted",
            TelemetryEvent::CompileFinished { .. } => "CompileFinished",
            TelemetryEvent::LoadStarted { .. } => "LoadStarted",
            TelemetryEvent::LoadFinished { .. } => "LoadFinished",
        }
    }

    pub fn source(&self) -> &PathBuf {
        match self {
            TelemetryEvent::CompileStarted { source }
            | TelemetryEvent::CompileFinished { source, .. }
            | TelemetryEvent::LoadStarted { source }
            | TelemetryEvent::LoadFinished { source, .. } => source,
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &TelemetryEvent);
}

/// Forwards events to `tracing` under the `tsk::telemetry` target.
#[derive(Copy, Clone, Debug, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record(&self, event: &TelemetryEvent) {
        let source = event.source().display();
        match event {
            TelemetryEvent::CompileStarted { .. } | TelemetryEvent::LoadStarted { .. } => {
                info!(target: "tsk::telemetry", event = event.name(), source = %source);
            }
            TelemetryEvent::CompileFinished {
                duration,
                bytes_out,
                ..
            } => {
                info!(
                    target: "tsk::telemetry",
                    event = event.name(),
                    source = %source,
                    duration_ms = millis(*duration),
                    bytes_out,
                );
            }
            TelemetryEvent::LoadFinished {
                duration,
                cache_hit,
                ..
            } => {
                info!(
                    target: "tsk::telemetry",
                    event = event.name(),
                    source = %source,
                    duration_ms = millis(*duration),
                    cache_hit,
                );
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        RecordingSink::default()
    }

    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events.lock().clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(TelemetryEvent::name).collect()
    }
}

impl TelemetrySink for RecordingSink {
    fn record(&self, event: &TelemetryEvent) {
        self.events.lock().push(event.clone());
    }
}

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set. Safe to call more than once.
/// `RUST_LOG=tsk::telemetry=info` shows telemetry only.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

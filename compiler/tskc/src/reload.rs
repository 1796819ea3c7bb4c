//! Live reload.
//!
//! [`LiveConfig`] holds the current tree behind an atomically swapped
//! pointer. Readers take a snapshot without locking and keep using it for
//! as long as they like; a reload builds the new tree completely before
//! swapping the pointer, so nobody observes a partial update.
//!
//! A [`Watcher`] is fed change notifications through
//! [`Watcher::on_change`], waits for the burst to settle and reloads
//! through a [`BinaryFactory`] on its own thread.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use arc_swap::ArcSwap;
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, info, warn};
use tsk_ir::ConfigTree;

use crate::factory::BinaryFactory;

#[derive(Debug)]
pub struct LiveConfig {
    current: ArcSwap<ConfigTree>,
    generation: AtomicU64,
}

impl LiveConfig {
    pub fn new(tree: ConfigTree) -> Self {
        LiveConfig {
            current: ArcSwap::from_pointee(tree),
            generation: AtomicU64::new(0),
        }
    }

    /// The current tree. Neither taking nor holding it blocks a reload.
    pub fn snapshot(&self) -> Arc<ConfigTree> {
        self.current.load_full()
    }

    /// Publish `tree`, returning the one it replaced.
    pub fn swap(&self, tree: ConfigTree) -> Arc<ConfigTree> {
        let old = self.current.swap(Arc::new(tree));
        self.generation.fetch_add(1, Ordering::AcqRel);
        old
    }

    /// Number of swaps so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ReloadConfig {
    /// Quiet period after the last notification before reloading.
    pub debounce: Duration,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        ReloadConfig {
            debounce: Duration::from_millis(200),
        }
    }
}

enum Message {
    Changed(PathBuf),
    Shutdown,
}

/// Background reloader for one source.
pub struct Watcher {
    sender: Sender<Message>,
    worker: Option<JoinHandle<()>>,
}

impl Watcher {
    pub fn spawn(
        factory: Arc<BinaryFactory>,
        source: PathBuf,
        live: Arc<LiveConfig>,
        config: ReloadConfig,
    ) -> Self {
        let (sender, receiver) = unbounded();
        let worker = thread::Builder::new()
            .name("tsk-reload".into())
            .spawn(move || run(&factory, &source, &live, &receiver, config.debounce));
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "could not start the reload thread; live reload disabled");
                None
            }
        };
        Watcher { sender, worker }
    }

    /// Notify the watcher that `path` changed.
    pub fn on_change(&self, path: &Path) {
        // A send only fails once the worker is gone.
        let _ = self.sender.send(Message::Changed(path.to_path_buf()));
    }

    /// Stop the worker and wait for it. Pending changes are dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.sender.send(Message::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("reload thread panicked");
            }
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(
    factory: &BinaryFactory,
    source: &Path,
    live: &LiveConfig,
    receiver: &Receiver<Message>,
    debounce: Duration,
) {
    while let Ok(Message::Changed(first)) = receiver.recv() {
        let mut burst = 1usize;
        loop {
            match receiver.recv_timeout(debounce) {
                Ok(Message::Changed(_)) => burst += 1,
                Err(RecvTimeoutError::Timeout) => break,
                Ok(Message::Shutdown) | Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        debug!(path = %first.display(), burst, "reloading after change");
        match factory.load_configuration(source) {
            Ok(tree) => {
                live.swap(tree);
                info!(
                    source = %source.display(),
                    generation = live.generation(),
                    "configuration reloaded"
                );
            }
            Err(e) => warn!(
                source = %source.display(),
                error = %e,
                "reload failed; keeping the previous configuration"
            ),
        }
    }
}

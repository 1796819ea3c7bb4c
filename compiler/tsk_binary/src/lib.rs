//! Binary `.pnt` artifacts for resolved configurations.
//!
//! [`compile`] turns a [`ConfigTree`](tsk_ir::ConfigTree) into a
//! deterministic byte stream with deduplicated string and value tables and
//! a section index. [`write_artifact`] publishes those bytes atomically.
//! [`LoadedConfig`] maps an artifact into memory and decodes sections on
//! first access; [`load`] decodes a whole artifact at once.
//!
//! Compile and load are all-or-nothing. Both take a [`CancelToken`] that is
//! checked between sections and can carry a deadline.

mod cancel;
mod compiler;
mod error;
mod format;
mod intern;
mod loader;
mod publish;

pub use cancel::{CancelToken, Interrupt};
pub use compiler::{compile, compile_ast, CompileOptions};
pub use error::{CompileError, LoadError};
pub use format::{
    body_checksum, hash_bytes, read_header, Compression, Fingerprint, Header, FORMAT_VERSION,
    MAGIC,
};
pub use loader::{load, load_with, LoadedConfig};
pub use publish::{compile_to_file, write_artifact};

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests;

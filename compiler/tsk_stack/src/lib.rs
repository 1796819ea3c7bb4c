//! Stack growth for recursive walks over TSK values.
//!
//! Configuration values nest arbitrarily: arrays of objects of operator
//! calls whose arguments are objects again. The parser, the analyzer, the
//! resolver and the binary codec all recurse over that structure, so every
//! recursive step goes through [`ensure_sufficient_stack`].
//!
//! On native targets the stack is grown with `stacker` once fewer than
//! [`RED_ZONE`] bytes remain. On wasm the closure is called directly.

/// Remaining stack below which a new segment is allocated.
const RED_ZONE: usize = 96 * 1024;

/// Size of each newly allocated stack segment.
const SEGMENT_SIZE: usize = 1024 * 1024;

/// Run `f`, growing the stack first if it is close to exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Run `f` directly; wasm manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

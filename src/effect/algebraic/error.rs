//! Fatal errors: the core's only error-handling concern.
//!
//! Per the crate's error model, a value an effect module produces (a `Left` in
//! an error effect, an empty `Option`) is never the core's business — it
//! passes through `Eff` construction unchanged, same as any other value. What
//! the core itself can detect is a row-discipline violation: a caller handed
//! [`super::run::run`] a program that still had effects left, or a batch's
//! zipper received a payload that doesn't match what the batch promised. Both
//! are programmer mistakes, not recoverable conditions, so they are raised by
//! panicking immediately — there is no fallible return type to thread through
//! every combinator for errors that should never happen in a well-typed
//! program.

/// Panics identifying which row-discipline invariant was violated.
///
/// Centralized so every fatal site in the core produces a message in the same
/// recognizable shape, instead of each call site writing its own `panic!`.
#[cold]
#[track_caller]
pub(crate) fn fatal(what: &str) -> ! {
    panic!("effrow: fatal row-discipline violation: {what}")
}

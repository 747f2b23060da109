//! Low-level plumbing shared by the effect runtime: a two-sided value type
//! and the type-erased deque the continuation machinery is built on.

mod continuation_queue;
mod either;

pub use either::Either;
pub(crate) use continuation_queue::{ContinuationQueue, TypeErasedArrow};

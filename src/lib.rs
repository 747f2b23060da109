//! # effrow
//!
//! An extensible-effects runtime: a free monad over a type-indexed, open effect
//! row, interpreted by a single stack-safe trampoline.
//!
//! ## Overview
//!
//! A program is an [`effect::algebraic::Eff`] value built out of [`effect::algebraic::send`],
//! `map`, and `flat_map`. Which effects it may perform is tracked in its row
//! type — a compile-time binary tree of effect markers built from
//! [`effect::algebraic::NoFx`], [`effect::algebraic::Fx1`], and [`effect::algebraic::FxAppend`]
//! (or the [`EffRow!`] macro). Handlers peel one effect out of the row at a
//! time via [`effect::algebraic::interpret`] and friends, until nothing is left
//! to run via [`effect::algebraic::run`].
//!
//! This crate is the core of that runtime only: the row algebra, the
//! interpreter kernel, and the handler combinators. Concrete effects (state,
//! reader, writer, error, non-determinism, and so on) are built on top of it,
//! not included in it.
//!
//! ## Example
//!
//! ```rust
//! use effrow::prelude::*;
//!
//! struct Ask;
//! impl EffectOp for Ask {
//!     type Op<X: 'static> = X;
//!     fn erase<X: 'static>(op: X) -> Box<dyn std::any::Any> {
//!         Box::new(op)
//!     }
//! }
//!
//! let program: Eff<Fx1<Ask>, i32> = send::<Ask, Fx1<Ask>, AtLeaf, i32>(0).map(|x| x + 1);
//! let result: Eff<NoFx, i32> =
//!     interpret::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32>(program, Eff::Pure, |_op| {
//!         Box::new(41_i32)
//!     });
//! assert_eq!(run(result), 42);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// Note: Disabling redundant_closure_for_method_calls due to clippy 0.1.92 panic bug
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod control;
pub mod effect;

/// Prelude module for convenient imports.
///
/// Re-exports the public surface of the effect row runtime.
///
/// # Usage
///
/// ```rust
/// use effrow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::effect::algebraic::{
        ap, detach, interpret, interpret_state, interpret_unsafe, intercept, intercept_state,
        product, run, run_pure, send, sequence, transform, translate, traverse, AtLeaf,
        CollectedUnions, Eff, EffectOp, Fx1, Fx2, Fx3, Fx4, Fx5, FxAppend, InLeft, InRight,
        IntoPoly, Loop, Member, Monadic, NoFx, Row, Step, Unions,
    };
}

//! Effect rows: the compile-time set of effect constructors a program may invoke.
//!
//! Rust has no higher-kinded types, so an effect family such as "read an `R`" or
//! "write an `O` and answer with `()`" cannot be written as a type constructor
//! `M[_]` applied to an answer type. [`EffectOp`] closes that gap with a generic
//! associated type: each effect declares, for every possible answer type `X`, the
//! concrete operation payload `Op<X>` that produces it.
//!
//! A row is a compile-time binary tree built from two primitives: [`NoFx`] (the
//! empty row) and [`Fx1`] (a row containing exactly one effect). [`FxAppend`]
//! combines two rows. `Fx2`, `Fx3`, … are convenience aliases over `FxAppend` and
//! `Fx1` rather than distinct primitives — the tree shape is what the membership
//! search in [`super::member`] walks, so collapsing every arity onto the same two
//! building blocks keeps that search to a single generic recursion instead of one
//! hand-written case per arity.

use std::any::Any;
use std::marker::PhantomData;

/// A family of effect operations, indexed by the answer type each operation produces.
///
/// # Examples
///
/// ```rust
/// use effrow::effect::algebraic::EffectOp;
/// use std::any::Any;
///
/// struct Ask;
///
/// impl EffectOp for Ask {
///     type Op<X: 'static> = std::marker::PhantomData<fn() -> X>;
///
///     fn erase<X: 'static>(_op: Self::Op<X>) -> Self::Op<Box<dyn Any>> {
///         std::marker::PhantomData
///     }
/// }
/// ```
pub trait EffectOp: 'static {
    /// The payload of one concrete operation of this effect, parameterized by the
    /// answer type `X` the interpreter must eventually hand back to the program.
    type Op<X: 'static>: 'static;

    /// Converts an operation into the representation the core actually stores
    /// once it enters an `Impure`/`ImpureAp` node: the answer-type marker
    /// erased to `Box<dyn Any>`.
    ///
    /// This exists because `Op<X1>` and `Op<X2>` are different concrete types
    /// whenever `X1 != X2` — even when `Op<X> = X` for every `X` — so a stored
    /// payload can only ever be recovered via [`std::any::Any::downcast`] into
    /// the *exact* type it was boxed as. Every operation is run through this
    /// once, at construction (see `send`), so that the type every downcast
    /// site expects — `Op<Box<dyn Any>>` — is the type that was genuinely
    /// boxed, not a relabeling of some other one.
    ///
    /// For the common shape — `Op<X>` carries no data that depends on `X`, or
    /// carries exactly one `X`-typed value — this is a direct, cheap
    /// reconstruction (see the example below).
    fn erase<X: 'static>(op: Self::Op<X>) -> Self::Op<Box<dyn Any>>;
}

/// A compile-time effect row.
///
/// Implemented only by [`NoFx`], [`Fx1`], and [`FxAppend`]; user code never
/// implements it directly.
pub trait Row: 'static {}

/// The empty effect row — a program with no remaining effects.
///
/// No effect is ever a member of `NoFx`; a well-typed program can reach it only
/// via `pure`, never via `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoFx;

impl Row for NoFx {}

/// A row containing exactly one effect `M`.
#[derive(Debug)]
pub struct Fx1<M>(PhantomData<M>);

impl<M: EffectOp> Row for Fx1<M> {}

/// The append of two rows, forming one branch of the binary-tree row.
#[derive(Debug)]
pub struct FxAppend<L, R>(PhantomData<(L, R)>);

impl<L: Row, R: Row> Row for FxAppend<L, R> {}

/// A row of exactly two effects, in declaration order.
pub type Fx2<A, B> = FxAppend<Fx1<A>, Fx1<B>>;
/// A row of exactly three effects, in declaration order.
pub type Fx3<A, B, C> = FxAppend<Fx1<A>, Fx2<B, C>>;
/// A row of exactly four effects, in declaration order.
pub type Fx4<A, B, C, D> = FxAppend<Fx1<A>, Fx3<B, C, D>>;
/// A row of exactly five effects, in declaration order.
pub type Fx5<A, B, C, D, E> = FxAppend<Fx1<A>, Fx4<B, C, D, E>>;

/// Builds a row type from a list of effect types, right-leaning over [`FxAppend`].
///
/// ```rust
/// use effrow::EffRow;
/// use effrow::effect::algebraic::{EffectOp, Row};
///
/// use std::any::Any;
///
/// struct A;
/// struct B;
/// struct C;
/// impl EffectOp for A {
///     type Op<X: 'static> = X;
///     fn erase<X: 'static>(op: X) -> Box<dyn Any> { Box::new(op) }
/// }
/// impl EffectOp for B {
///     type Op<X: 'static> = X;
///     fn erase<X: 'static>(op: X) -> Box<dyn Any> { Box::new(op) }
/// }
/// impl EffectOp for C {
///     type Op<X: 'static> = X;
///     fn erase<X: 'static>(op: X) -> Box<dyn Any> { Box::new(op) }
/// }
///
/// type Three = EffRow![A, B, C];
///
/// fn assert_row<R: Row>() {}
/// assert_row::<Three>();
/// ```
#[macro_export]
macro_rules! EffRow {
    [$single:ty] => {
        $crate::effect::algebraic::row::Fx1<$single>
    };
    [$head:ty, $($tail:ty),+ $(,)?] => {
        $crate::effect::algebraic::row::FxAppend<
            $crate::effect::algebraic::row::Fx1<$head>,
            $crate::EffRow![$($tail),+]
        >
    };
}

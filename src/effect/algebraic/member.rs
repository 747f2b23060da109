//! Membership witnesses: compile-time proof that an effect `M` occurs in a row `R`.
//!
//! [`Member`] is the trait every row-shape operation (`send`, `project`,
//! `intercept*`, applicative batching) is built on. Its three operations —
//! `inject`, `project`, `accept` — never need to inspect the row's shape at
//! runtime, because [`Union`] is already fully type-erased: finding `M` in `R` is
//! purely a type-level search over [`FxAppend`] trees, resolved by trait
//! resolution before the program runs.
//!
//! The `Index` marker parameter (`AtLeaf`, `InLeft`, `InRight`) disambiguates
//! which occurrence of `M` a particular `impl` targets, mirroring how de Bruijn
//! indices disambiguate repeated bindings. It carries no information at runtime;
//! it exists only so two different positions of the same effect type in a row
//! can each get their own `Member` impl without coherence conflicts.

use std::any::Any;
use std::marker::PhantomData;

use crate::control::Either;

use super::row::{EffectOp, Fx1, FxAppend, NoFx, Row};
use super::union::Union;

/// Marks that `M` was found directly at a [`Fx1`] leaf.
pub struct AtLeaf;

/// Marks that `M` was found in the left branch of a [`FxAppend`], at index `I`.
pub struct InLeft<I>(PhantomData<I>);

/// Marks that `M` was found in the right branch of a [`FxAppend`], at index `I`.
pub struct InRight<I>(PhantomData<I>);

/// Proof that effect `M` occurs in row `R`, located via `Index`.
///
/// `Out` is the row that remains after `M` is removed — the row a handler for
/// `M` hands the rest of the program back in.
pub trait Member<R: Row, Index = AtLeaf>: EffectOp + Sized {
    /// The row remaining once `M` is interpreted away from `R`.
    type Out: Row;

    /// Tags an operation of `M` as a member of `R`.
    fn inject<X: 'static>(op: Self::Op<X>) -> Union<R, X>;

    /// Attempts to recover an operation of `M` from a union in `R`.
    ///
    /// On mismatch, returns the union reinterpreted in the smaller row `Out`,
    /// so the search can continue against whatever remains.
    fn project<X: 'static>(u: Union<R, X>) -> Either<Union<Self::Out, X>, Self::Op<X>>;

    /// Widens a union from the smaller row `Out` back into `R`.
    fn accept<X: 'static>(u: Union<Self::Out, X>) -> Union<R, X>;
}

impl<M: EffectOp> Member<Fx1<M>, AtLeaf> for M {
    type Out = NoFx;

    fn inject<X: 'static>(op: Self::Op<X>) -> Union<Fx1<M>, X> {
        Union::tagged::<M>(op)
    }

    fn project<X: 'static>(u: Union<Fx1<M>, X>) -> Either<Union<NoFx, X>, Self::Op<X>> {
        match u.downcast::<M>() {
            Ok(op) => Either::Right(op),
            Err(u) => Either::Left(u.retag()),
        }
    }

    fn accept<X: 'static>(u: Union<NoFx, X>) -> Union<Fx1<M>, X> {
        u.retag()
    }
}

impl<L: Row, R: Row, M: EffectOp, I> Member<FxAppend<L, R>, InLeft<I>> for M
where
    M: Member<L, I>,
{
    type Out = FxAppend<<M as Member<L, I>>::Out, R>;

    fn inject<X: 'static>(op: Self::Op<X>) -> Union<FxAppend<L, R>, X> {
        Union::tagged::<M>(op)
    }

    fn project<X: 'static>(
        u: Union<FxAppend<L, R>, X>,
    ) -> Either<Union<Self::Out, X>, Self::Op<X>> {
        match u.downcast::<M>() {
            Ok(op) => Either::Right(op),
            Err(u) => Either::Left(u.retag()),
        }
    }

    fn accept<X: 'static>(u: Union<Self::Out, X>) -> Union<FxAppend<L, R>, X> {
        u.retag()
    }
}

impl<L: Row, R: Row, M: EffectOp, I> Member<FxAppend<L, R>, InRight<I>> for M
where
    M: Member<R, I>,
{
    type Out = FxAppend<L, <M as Member<R, I>>::Out>;

    fn inject<X: 'static>(op: Self::Op<X>) -> Union<FxAppend<L, R>, X> {
        Union::tagged::<M>(op)
    }

    fn project<X: 'static>(
        u: Union<FxAppend<L, R>, X>,
    ) -> Either<Union<Self::Out, X>, Self::Op<X>> {
        match u.downcast::<M>() {
            Ok(op) => Either::Right(op),
            Err(u) => Either::Left(u.retag()),
        }
    }

    fn accept<X: 'static>(u: Union<Self::Out, X>) -> Union<FxAppend<L, R>, X> {
        u.retag()
    }
}

/// A weaker membership witness used by `intercept*`: it can find and replace an
/// `M` operation without changing the row, unlike [`Member`] which always
/// shrinks to `Out`.
///
/// Blanket-implemented for anything that already implements [`Member`], since
/// `extract`/`inject` never need to touch the row type — only `project`'s
/// `Left` arm, which `Member` already discards, would have required it.
pub trait MemberInPlace<R: Row, Index = AtLeaf>: EffectOp {
    /// Recovers an operation of `M`, or `None` if this union is some other effect.
    fn extract<X: 'static>(u: Union<R, X>) -> Option<Self::Op<X>>;

    /// Tags an operation of `M` as a member of `R`.
    fn inject<X: 'static>(op: Self::Op<X>) -> Union<R, X>;
}

impl<R: Row, Index, M> MemberInPlace<R, Index> for M
where
    M: Member<R, Index>,
{
    fn extract<X: 'static>(u: Union<R, X>) -> Option<Self::Op<X>> {
        <M as Member<R, Index>>::project(u).right()
    }

    fn inject<X: 'static>(op: Self::Op<X>) -> Union<R, X> {
        <M as Member<R, Index>>::inject(op)
    }
}

/// Re-tags a union whose answer type has already been erased to `Box<dyn Any>`
/// from one row into another, without attempting to inspect its payload.
///
/// A thin public wrapper around [`Union::retag`] for call sites in sibling
/// modules that only ever operate on already-erased unions.
pub(crate) fn retag_erased<R: Row, U: Row>(u: Union<R, Box<dyn Any>>) -> Union<U, Box<dyn Any>> {
    u.retag()
}

//! The type-erased disjoint union that backs every effect row.
//!
//! A [`Union<R, X>`] tags a boxed operation payload with the [`TypeId`] of the
//! effect it belongs to. Walking the row `R` at compile time (see
//! [`super::member`]) only ever needs to compare that tag and retag the
//! `PhantomData` marker — the payload itself never moves or gets re-allocated as
//! it threads through nested [`super::row::FxAppend`] trees. This keeps every
//! row-shape operation (`inject`, `project`, `accept`) a constant-time retag, at
//! the cost of confining unchecked downcasts to this one file.

use std::any::{Any, TypeId};
use std::marker::PhantomData;

use super::error::fatal;
use super::row::{EffectOp, Row};

/// A tagged, type-erased effect operation living in row `R`, answering with `X`.
///
/// `X` only ever changes, at runtime, between two concrete types that are
/// actually identical — retagging an already-`Box<dyn Any>`-erased payload as
/// `Box<dyn Any>` again, or moving between rows without touching `X` at all.
/// [`Union::retag`] never inspects `X`, so it is always free; [`Union::erase`]
/// is free too, but only because every caller of it already holds a payload
/// that was boxed as `Box<dyn Any>` by [`EffectOp::erase`] before being
/// tagged — see that method's documentation for why downcasting into a
/// merely *relabeled* `X` would not be sound.
pub struct Union<R: Row, X: 'static> {
    tag: TypeId,
    payload: Box<dyn Any>,
    _marker: PhantomData<(R, X)>,
}

impl<R: Row, X: 'static> Union<R, X> {
    /// Tags `op` as belonging to effect `M`, in row `R`.
    ///
    /// This is the only constructor: every `Union` is born from a concrete
    /// effect's operation payload.
    pub(crate) fn tagged<M: EffectOp>(op: M::Op<X>) -> Self {
        Self {
            tag: TypeId::of::<M>(),
            payload: Box::new(op),
            _marker: PhantomData,
        }
    }

    /// Attempts to recover the payload as belonging to effect `M`.
    ///
    /// Returns the original union unchanged on tag mismatch, so the caller can
    /// keep searching the row.
    ///
    /// # Panics
    ///
    /// Panics if the stored tag matches `M` but the boxed payload cannot be
    /// downcast to `M::Op<X>`. That can only happen if a `Union` was built with
    /// a tag that does not match its payload's true type, which would be a bug
    /// in this module, not in caller code.
    pub(crate) fn downcast<M: EffectOp>(self) -> Result<M::Op<X>, Self> {
        if self.tag == TypeId::of::<M>() {
            Ok(*self.payload.downcast::<M::Op<X>>().unwrap_or_else(|_| {
                fatal("Union: tag matched but payload downcast failed")
            }))
        } else {
            Err(self)
        }
    }

    /// Reinterprets this union as living in a different row `U`.
    ///
    /// A no-op at runtime: row membership is a static property, so widening or
    /// narrowing the row a union is tagged with never touches the payload.
    pub(crate) fn retag<U: Row>(self) -> Union<U, X> {
        Union {
            tag: self.tag,
            payload: self.payload,
            _marker: PhantomData,
        }
    }

    /// Reinterprets this union's answer-type marker as `Y`.
    ///
    /// Used to place a union into a heterogeneous batch (see
    /// [`super::unions::Unions`]) where only the head element keeps its true
    /// answer type at the Rust type level. Sound only when the payload has
    /// already been produced via [`EffectOp::erase`] for the target `Y` (in
    /// practice, every caller in this crate erases to `Box<dyn Any>` a
    /// payload that was already boxed to `Box<dyn Any>` at construction, in
    /// [`super::eff::send`]) — relabeling `X` never reboxes the payload, so
    /// calling this on a payload still boxed under its true concrete type
    /// would make later downcasts fail.
    pub(crate) fn erase<Y: 'static>(self) -> Union<R, Y> {
        Union {
            tag: self.tag,
            payload: self.payload,
            _marker: PhantomData,
        }
    }
}

// A Union holds a bare `Box<dyn Any>`, not `Box<dyn Any + Send>`, so it can
// never cross a thread boundary — the single-threaded design this whole
// crate commits to, made a compile-time fact rather than a doc claim.
static_assertions::assert_not_impl_any!(Union<crate::effect::algebraic::row::NoFx, i32>: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    struct Get;
    impl EffectOp for Get {
        type Op<X: 'static> = X;
        fn erase<X: 'static>(op: X) -> Box<dyn Any> {
            Box::new(op)
        }
    }

    struct Put;
    impl EffectOp for Put {
        type Op<X: 'static> = X;
        fn erase<X: 'static>(op: X) -> Box<dyn Any> {
            Box::new(op)
        }
    }

    use crate::effect::algebraic::row::Fx1;

    #[rstest]
    fn downcast_succeeds_for_matching_tag() {
        let union: Union<Fx1<Get>, i32> = Union::tagged::<Get>(42);
        let recovered = union.downcast::<Get>();
        assert_eq!(recovered.ok(), Some(42));
    }

    #[rstest]
    fn downcast_fails_for_mismatched_tag_and_returns_original() {
        let union: Union<Fx1<Get>, i32> = Union::tagged::<Get>(42);
        let result = union.downcast::<Put>();
        assert!(result.is_err());
        let Err(returned) = result else {
            unreachable!();
        };
        assert_eq!(returned.downcast::<Get>().ok(), Some(42));
    }

    #[rstest]
    fn retag_preserves_payload() {
        let union: Union<Fx1<Get>, i32> = Union::tagged::<Get>(7);
        let retagged: Union<Fx1<Put>, i32> = union.retag();
        assert_eq!(retagged.downcast::<Get>().ok(), Some(7));
    }

    #[rstest]
    fn erase_is_a_no_op_once_the_payload_is_already_boxed() {
        let already_erased: Box<dyn Any> = Get::erase(9);
        let union: Union<Fx1<Get>, Box<dyn Any>> = Union::tagged::<Get>(already_erased);
        let reerased: Union<Fx1<Get>, Box<dyn Any>> = union.erase();
        let recovered = reerased
            .downcast::<Get>()
            .ok()
            .and_then(|b| b.downcast::<i32>().ok());
        assert_eq!(recovered.map(|b| *b), Some(9));
    }
}

//! Applicative batches: an ordered, non-empty list of effect unions collected by
//! `ap`, plus the machinery to partition and reorder them by effect.
//!
//! [`Unions`] is what an [`super::eff::Eff::ImpureAp`] node carries: several
//! independent effect operations whose continuations have not been sequenced
//! monadically, so a handler is free to run them as a batch (e.g. one round
//! trip instead of many). [`CollectedUnions`] is the result of asking "which of
//! these belong to effect `M`?" — it keeps enough positional bookkeeping
//! (`indices`/`other_indices`) to zip the handler's per-`M` answers back into
//! the original left-to-right order once the non-`M` entries are filled back
//! in by some other handler.

use std::any::Any;
use std::rc::Rc;

use super::arrs::{once_as_fn, Arrs};
use super::eff::Eff;
use super::error::fatal;
use super::member::Member;
use super::row::Row;
use super::union::Union;

/// A non-empty, ordered batch of effect unions, all answering with `Box<dyn
/// Any>` except the head, whose true answer type `X` is kept at the type level.
pub struct Unions<R: Row, X: 'static> {
    head: Union<R, X>,
    rest: Vec<Union<R, Box<dyn Any>>>,
}

impl<R: Row, X: 'static> Unions<R, X> {
    /// Wraps a single union as a one-element batch.
    pub(crate) fn singleton(head: Union<R, X>) -> Self {
        Self {
            head,
            rest: Vec::new(),
        }
    }

    /// Rebuilds a batch from an already-split head and tail, e.g. after
    /// retagging every element into a different row.
    pub(crate) fn from_parts(head: Union<R, X>, rest: Vec<Union<R, Box<dyn Any>>>) -> Self {
        Self { head, rest }
    }

    /// Number of effect operations in this batch.
    pub(crate) fn size(&self) -> usize {
        1 + self.rest.len()
    }

    /// Reinterprets every union in this batch as living in a different row `U`.
    pub(crate) fn retag<U: Row>(self) -> Unions<U, X> {
        Unions {
            head: self.head.retag(),
            rest: self.rest.into_iter().map(Union::retag::<U>).collect(),
        }
    }

    /// Appends another batch after this one, preserving left-to-right order.
    pub(crate) fn append<Y: 'static>(self, other: Unions<R, Y>) -> Unions<R, X> {
        let mut rest = self.rest;
        rest.push(other.head.erase());
        rest.extend(other.rest);
        Unions {
            head: self.head,
            rest,
        }
    }

    /// Partitions this batch into operations belonging to `M` and everything
    /// else, recording the original index of every element so the split can be
    /// undone later.
    pub(crate) fn project<M, Idx>(self) -> CollectedUnions<<M as Member<R, Idx>>::Out>
    where
        M: Member<R, Idx>,
    {
        let mut effects = Vec::new();
        let mut others = Vec::new();
        let mut indices = Vec::new();
        let mut other_indices = Vec::new();

        match <M as Member<R, Idx>>::project(self.head) {
            crate::control::Either::Right(op) => {
                effects.push(Box::new(op) as Box<dyn Any>);
                indices.push(0);
            }
            crate::control::Either::Left(u) => {
                others.push(u);
                other_indices.push(0);
            }
        }

        for (offset, u) in self.rest.into_iter().enumerate() {
            let position = offset + 1;
            match <M as Member<R, Idx>>::project(u) {
                crate::control::Either::Right(op) => {
                    effects.push(Box::new(op) as Box<dyn Any>);
                    indices.push(position);
                }
                crate::control::Either::Left(out_u) => {
                    others.push(out_u);
                    other_indices.push(position);
                }
            }
        }

        CollectedUnions {
            effects,
            others,
            indices,
            other_indices,
        }
    }

    /// Converts this batch back into a monadic program: the head effect is run
    /// first, and if a tail remains, the zipper is rebuilt as a nested
    /// `ImpureAp` over that tail which prepends the head's value before
    /// calling `map`.
    ///
    /// The single-element case (every `send` starts this way) resumes via a
    /// genuinely multi-shot arrow: `map` is only ever called, never consumed,
    /// so a non-deterministic handler can call `apply` again for each
    /// candidate answer to the head effect. The multi-element case still
    /// normalizes through a continuation that captures its `boxed` head
    /// answer by move and can only run once — batching a *second* independent
    /// effect behind a non-deterministic head is not something any handler in
    /// this crate needs to replay today, so it is left single-shot rather than
    /// forced into a shape with no caller.
    pub(crate) fn continue_with<A: 'static>(
        self,
        map: Rc<dyn Fn(Vec<Box<dyn Any>>) -> A>,
    ) -> Eff<R, A> {
        let head = self.head;
        if self.rest.is_empty() {
            Eff::Impure(
                head.erase(),
                Arrs::singleton(move |boxed: Box<dyn Any>| Eff::Pure(map(vec![boxed]))),
            )
        } else {
            let mut rest = self.rest;
            let new_head = rest.remove(0);
            let tail = Unions {
                head: new_head,
                rest,
            };
            Eff::Impure(
                head.erase(),
                Arrs::singleton(once_as_fn(move |boxed: Box<dyn Any>| {
                    Eff::ImpureAp(
                        tail,
                        Rc::new(once_as_fn(move |mut xs: Vec<Box<dyn Any>>| {
                            xs.insert(0, boxed);
                            map(xs)
                        })),
                    )
                })),
            )
        }
    }
}

/// The result of partitioning a [`Unions`] batch by a single effect `M`.
pub struct CollectedUnions<U: Row> {
    /// The `M`-tagged operations, each boxed as its own concrete `M::Op<X>`, in
    /// original left-to-right order.
    pub effects: Vec<Box<dyn Any>>,
    /// Everything that was not `M`, reinterpreted in the smaller row `U`.
    pub others: Vec<Union<U, Box<dyn Any>>>,
    /// The original batch position of each entry in `effects`.
    pub indices: Vec<usize>,
    /// The original batch position of each entry in `others`.
    pub other_indices: Vec<usize>,
}

impl<U: Row> CollectedUnions<U> {
    /// Builds the continuation a handler resumes with once it has produced one
    /// answer per collected `M` operation: if nothing else remains, the batch
    /// collapses straight to `map`'s result; otherwise the handler's answers
    /// are reunited with the other effects' eventual answers in original
    /// positional order before `map` runs.
    ///
    /// Takes the already-split pieces rather than `self` so that callers which
    /// also need `effects` (the interpreter kernel) aren't forced to clone it
    /// first just to satisfy a by-value receiver.
    ///
    /// Like [`Unions::continue_with`], the empty-`others` case is genuinely
    /// multi-shot (`map` is only ever called, never consumed); the
    /// non-empty-`others` case captures its pieces by move and can only be
    /// resumed once, for the same reason.
    pub(crate) fn continuation<R: Row, A: 'static>(
        others: Vec<Union<U, Box<dyn Any>>>,
        indices: Vec<usize>,
        other_indices: Vec<usize>,
        map: Rc<dyn Fn(Vec<Box<dyn Any>>) -> A>,
    ) -> Arrs<R, Vec<Box<dyn Any>>, A> {
        if others.is_empty() {
            Arrs::singleton(move |ls: Vec<Box<dyn Any>>| {
                Eff::Pure(map(reorder(ls, &indices, Vec::new(), &other_indices)))
            })
        } else {
            Arrs::singleton(once_as_fn(move |ls: Vec<Box<dyn Any>>| {
                let mut iter = others.into_iter().map(Union::retag::<R>);
                let head = iter.next().expect("others is non-empty, just checked");
                let rest: Vec<_> = iter.collect();
                Eff::ImpureAp(
                    Unions { head, rest },
                    Rc::new(once_as_fn(move |xs: Vec<Box<dyn Any>>| {
                        map(reorder(ls, &indices, xs, &other_indices))
                    })),
                )
            }))
        }
    }
}

/// Interleaves `ls` (values at `indices`) and `xs` (values at `other_indices`)
/// back into a single vector in original positional order.
fn reorder(
    ls: Vec<Box<dyn Any>>,
    indices: &[usize],
    xs: Vec<Box<dyn Any>>,
    other_indices: &[usize],
) -> Vec<Box<dyn Any>> {
    let total = indices.len() + other_indices.len();
    let mut slots: Vec<Option<Box<dyn Any>>> = (0..total).map(|_| None).collect();
    for (value, &position) in ls.into_iter().zip(indices) {
        slots[position] = Some(value);
    }
    for (value, &position) in xs.into_iter().zip(other_indices) {
        slots[position] = Some(value);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| fatal("reorder: indices/other_indices did not cover every position")))
        .collect()
}

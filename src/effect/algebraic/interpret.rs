//! The interpreter kernel: a single trampoline, `interpret_loop`, that every
//! handler combinator is built from.
//!
//! A [`Loop`] implementation decides what happens at each of the three shapes a
//! program can take (`Pure`, an effect matching `M`, or an applicative batch
//! containing `M`); the driver itself owns the one behavior every handler
//! shares — what to do when the *current* node is not `M` at all. In that case
//! the node is retagged into the smaller row `Out` and the rest of the program
//! is wrapped in a fresh call to `interpret_loop`, deferred inside a single
//! continuation arrow. That deferral, not any unbounded recursion, is what
//! keeps handler composition stack-safe: `interpret_loop` never calls itself
//! synchronously, only from inside a closure that some *other* handler invokes
//! later, once it resumes the continuation.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::control::Either;

use super::arrs::{once_as_fn, Arrs};
use super::eff::Eff;
use super::error::fatal;
use super::member::Member;
use super::row::{EffectOp, Row};
use super::union::Union;
use super::unions::{CollectedUnions, Unions};

/// What a [`Loop`] step decides: keep driving the same handler over a new
/// program/state pair, or stop and hand back a finished result.
pub enum Step<R: Row, A: 'static, S, Out> {
    /// Keep interpreting `next`, with updated state `state`.
    Continue(Eff<R, A>, S),
    /// Stop here; `out` is the final result of this interpretation.
    Done(Out),
}

/// A handler's response to every shape effect `M` can take inside row `R`.
///
/// `OutRow` is the row that remains once `M` is handled; `FinalA` is the
/// answer type of the terminal program this handler produces.
pub trait Loop<M: EffectOp, R: Row, A: 'static, OutRow: Row, FinalA: 'static> {
    /// State threaded across every step of this interpretation.
    type State;

    /// Called when the program has reduced to a plain value.
    fn on_pure(
        &mut self,
        a: A,
        state: Self::State,
    ) -> Step<R, A, Self::State, Eff<OutRow, FinalA>>;

    /// Called when the next effect is an `M` operation.
    fn on_effect(
        &mut self,
        op: M::Op<Box<dyn Any>>,
        k: Arrs<R, Box<dyn Any>, A>,
        state: Self::State,
    ) -> Step<R, A, Self::State, Eff<OutRow, FinalA>>;

    /// Called when the next node is an applicative batch containing at least
    /// one `M` operation. `ops` holds every collected `M` payload, in original
    /// order; `k` resumes with one answer per collected operation, already
    /// wired to fold in whatever other effects remain in the batch.
    fn on_applicative_effect(
        &mut self,
        ops: Vec<Box<dyn Any>>,
        k: Arrs<R, Vec<Box<dyn Any>>, A>,
        state: Self::State,
    ) -> Step<R, A, Self::State, Eff<OutRow, FinalA>>;
}

/// Drives `handler` over `eff`, peeling `M` out of row `R` one step at a time
/// and handing back a program over the smaller row `OutRow`.
pub fn interpret_loop<M, R, Idx, A, OutRow, FinalA, H>(
    mut eff: Eff<R, A>,
    mut handler: H,
    mut state: H::State,
) -> Eff<OutRow, FinalA>
where
    M: Member<R, Idx, Out = OutRow>,
    R: Row,
    OutRow: Row,
    A: 'static,
    FinalA: 'static,
    H: Loop<M, R, A, OutRow, FinalA> + 'static,
    H::State: 'static,
{
    loop {
        match eff {
            Eff::Pure(a) => match handler.on_pure(a, state) {
                Step::Continue(next, s) => {
                    eff = next;
                    state = s;
                }
                Step::Done(out) => return out,
            },
            Eff::Impure(u, k) => match <M as Member<R, Idx>>::project(u) {
                Either::Right(op) => match handler.on_effect(op, k, state) {
                    Step::Continue(next, s) => {
                        eff = next;
                        state = s;
                    }
                    Step::Done(out) => return out,
                },
                Either::Left(u_out) => {
                    return Eff::Impure(
                        u_out,
                        Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                            interpret_loop::<M, R, Idx, A, OutRow, FinalA, H>(
                                k.apply(x),
                                handler,
                                state,
                            )
                        })),
                    );
                }
            },
            Eff::ImpureAp(us, f) => {
                let CollectedUnions {
                    effects,
                    others,
                    indices,
                    other_indices,
                } = us.project::<M, Idx>();
                if effects.is_empty() {
                    let mut iter = others.into_iter().map(Union::retag::<OutRow>);
                    let head = iter.next().expect("Unions is non-empty by construction");
                    let rest: Vec<_> = iter.collect();
                    let rebuilt: Eff<OutRow, A> = Eff::ImpureAp(Unions::from_parts(head, rest), f);
                    return finalize_without_m::<M, R, Idx, A, OutRow, FinalA, H>(
                        rebuilt, handler, state,
                    );
                }
                let k = CollectedUnions::<OutRow>::continuation::<R, A>(
                    others,
                    indices,
                    other_indices,
                    f,
                );
                match handler.on_applicative_effect(effects, k, state) {
                    Step::Continue(next, s) => {
                        eff = next;
                        state = s;
                    }
                    Step::Done(out) => return out,
                }
            }
        }
    }
}

/// Finishes interpreting a program that is now known to contain no more `M`
/// effects at all: every remaining node belongs to some other effect, so this
/// just waits (lazily, via `flat_map`) for the eventual `Pure` and hands it to
/// `on_pure`.
fn finalize_without_m<M, R, Idx, A, OutRow, FinalA, H>(
    rebuilt: Eff<OutRow, A>,
    mut handler: H,
    state: H::State,
) -> Eff<OutRow, FinalA>
where
    M: EffectOp,
    R: Row,
    OutRow: Row,
    A: 'static,
    FinalA: 'static,
    H: Loop<M, R, A, OutRow, FinalA> + 'static,
    H::State: 'static,
{
    match rebuilt {
        Eff::Pure(a) => match handler.on_pure(a, state) {
            Step::Done(out) => out,
            Step::Continue(..) => panic!(
                "extensible-effects kernel: a handler tried to keep interpreting {} \
                 after every one of its operations had already left the row",
                std::any::type_name::<M>()
            ),
        },
        other => other.flat_map(once_as_fn(move |a| {
            finalize_without_m::<M, R, Idx, A, OutRow, FinalA, H>(Eff::Pure(a), handler, state)
        })),
    }
}

/// Peels `M` out of row `R`, turning every operation into a plain value via
/// `step` and the final answer into the handler's result via `pure`.
///
/// This is the common case of the fully general [`Loop`] protocol: `step`
/// always resumes the continuation with an inline value rather than handing
/// back an alternate sub-program. Handlers that need that escape hatch (e.g. a
/// short-circuiting `Option` effect) should implement [`Loop`] directly against
/// [`interpret_loop`] instead.
pub fn interpret<M, R, Idx, A, OutRow, FinalA>(
    eff: Eff<R, A>,
    pure: impl FnOnce(A) -> Eff<OutRow, FinalA> + 'static,
    step: impl FnMut(M::Op<Box<dyn Any>>) -> Box<dyn Any> + 'static,
) -> Eff<OutRow, FinalA>
where
    M: Member<R, Idx, Out = OutRow>,
    R: Row,
    OutRow: Row,
    A: 'static,
    FinalA: 'static,
{
    struct Adapter<P, S> {
        pure: Option<P>,
        step: S,
    }

    impl<M, R, A, OutRow, FinalA, P, S> Loop<M, R, A, OutRow, FinalA> for Adapter<P, S>
    where
        M: EffectOp,
        R: Row,
        OutRow: Row,
        A: 'static,
        FinalA: 'static,
        P: FnOnce(A) -> Eff<OutRow, FinalA>,
        S: FnMut(M::Op<Box<dyn Any>>) -> Box<dyn Any>,
    {
        type State = ();

        fn on_pure(&mut self, a: A, _state: ()) -> Step<R, A, (), Eff<OutRow, FinalA>> {
            let pure = self.pure.take().expect("Adapter::on_pure called twice");
            Step::Done(pure(a))
        }

        fn on_effect(
            &mut self,
            op: M::Op<Box<dyn Any>>,
            k: Arrs<R, Box<dyn Any>, A>,
            _state: (),
        ) -> Step<R, A, (), Eff<OutRow, FinalA>> {
            let x = (self.step)(op);
            Step::Continue(k.apply(x), ())
        }

        fn on_applicative_effect(
            &mut self,
            ops: Vec<Box<dyn Any>>,
            k: Arrs<R, Vec<Box<dyn Any>>, A>,
            _state: (),
        ) -> Step<R, A, (), Eff<OutRow, FinalA>> {
            let xs: Vec<Box<dyn Any>> = ops
                .into_iter()
                .map(|op_box| {
                    let op = *op_box
                        .downcast::<M::Op<Box<dyn Any>>>()
                        .expect("interpret: applicative payload type mismatch");
                    (self.step)(op)
                })
                .collect();
            Step::Continue(k.apply(xs), ())
        }
    }

    interpret_loop::<M, R, Idx, A, OutRow, FinalA, _>(
        eff,
        Adapter {
            pure: Some(pure),
            step,
        },
        (),
    )
}

/// Like [`interpret`], but threads an explicit state `S` through every step and
/// into the final answer.
pub fn interpret_state<M, R, Idx, A, OutRow, FinalA, S>(
    eff: Eff<R, A>,
    init: S,
    pure: impl FnOnce(A, S) -> Eff<OutRow, FinalA> + 'static,
    step: impl FnMut(M::Op<Box<dyn Any>>, S) -> (Box<dyn Any>, S) + 'static,
) -> Eff<OutRow, FinalA>
where
    M: Member<R, Idx, Out = OutRow>,
    R: Row,
    OutRow: Row,
    A: 'static,
    FinalA: 'static,
    S: 'static,
{
    struct Adapter<P, St> {
        pure: Option<P>,
        step: St,
    }

    impl<M, R, A, OutRow, FinalA, S, P, St> Loop<M, R, A, OutRow, FinalA> for Adapter<P, St>
    where
        M: EffectOp,
        R: Row,
        OutRow: Row,
        A: 'static,
        FinalA: 'static,
        S: 'static,
        P: FnOnce(A, S) -> Eff<OutRow, FinalA>,
        St: FnMut(M::Op<Box<dyn Any>>, S) -> (Box<dyn Any>, S),
    {
        type State = S;

        fn on_pure(&mut self, a: A, state: S) -> Step<R, A, S, Eff<OutRow, FinalA>> {
            let pure = self.pure.take().expect("Adapter::on_pure called twice");
            Step::Done(pure(a, state))
        }

        fn on_effect(
            &mut self,
            op: M::Op<Box<dyn Any>>,
            k: Arrs<R, Box<dyn Any>, A>,
            state: S,
        ) -> Step<R, A, S, Eff<OutRow, FinalA>> {
            let (x, next_state) = (self.step)(op, state);
            Step::Continue(k.apply(x), next_state)
        }

        fn on_applicative_effect(
            &mut self,
            ops: Vec<Box<dyn Any>>,
            k: Arrs<R, Vec<Box<dyn Any>>, A>,
            state: S,
        ) -> Step<R, A, S, Eff<OutRow, FinalA>> {
            let mut current_state = state;
            let mut xs = Vec::with_capacity(ops.len());
            for op_box in ops {
                let op = *op_box
                    .downcast::<M::Op<Box<dyn Any>>>()
                    .expect("interpret_state: applicative payload type mismatch");
                let (x, next_state) = (self.step)(op, current_state);
                xs.push(x);
                current_state = next_state;
            }
            Step::Continue(k.apply(xs), current_state)
        }
    }

    interpret_loop::<M, R, Idx, A, OutRow, FinalA, _>(
        eff,
        Adapter {
            pure: Some(pure),
            step,
        },
        init,
    )
}

/// Convenience wrapper over [`interpret`] for handlers that don't need to
/// rewrite the final `Pure` answer.
pub fn interpret_unsafe<M, R, Idx, A, OutRow>(
    eff: Eff<R, A>,
    step: impl FnMut(M::Op<Box<dyn Any>>) -> Box<dyn Any> + 'static,
) -> Eff<OutRow, A>
where
    M: Member<R, Idx, Out = OutRow>,
    R: Row,
    OutRow: Row,
    A: 'static,
{
    interpret::<M, R, Idx, A, OutRow, A>(eff, Eff::Pure, step)
}

/// Rewrites every `M` operation in place via `step`, without removing `M` from
/// the row.
///
/// Unlike [`interpret`], the rewritten program stays in `R`: this is what
/// `intercept*` is for — adjusting how an effect behaves without committing to
/// a final interpretation of it yet.
pub fn intercept<M, R, Idx, A, F>(eff: Eff<R, A>, mut step: F) -> Eff<R, A>
where
    M: Member<R, Idx>,
    R: Row,
    A: 'static,
    F: FnMut(M::Op<Box<dyn Any>>) -> M::Op<Box<dyn Any>> + 'static,
{
    match eff {
        Eff::Pure(a) => Eff::Pure(a),
        Eff::Impure(u, k) => match <M as Member<R, Idx>>::project(u) {
            Either::Right(op) => {
                let rewritten = step(op);
                let reinjected = <M as Member<R, Idx>>::inject(rewritten);
                Eff::Impure(
                    reinjected,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        intercept::<M, R, Idx, A, F>(k.apply(x), step)
                    })),
                )
            }
            Either::Left(u_out) => {
                let widened = <M as Member<R, Idx>>::accept(u_out);
                Eff::Impure(
                    widened,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        intercept::<M, R, Idx, A, F>(k.apply(x), step)
                    })),
                )
            }
        },
        Eff::ImpureAp(us, f) => {
            let CollectedUnions {
                effects,
                others,
                indices,
                other_indices,
            } = us.project::<M, Idx>();
            let rewritten: Vec<Union<R, Box<dyn Any>>> = effects
                .into_iter()
                .map(|op_box| {
                    let op = *op_box
                        .downcast::<M::Op<Box<dyn Any>>>()
                        .expect("intercept: applicative payload type mismatch");
                    <M as Member<R, Idx>>::inject(step(op))
                })
                .collect();
            let widened_others: Vec<Union<R, Box<dyn Any>>> = others
                .into_iter()
                .map(<M as Member<R, Idx>>::accept)
                .collect();
            let rebuilt = reassemble_unions(rewritten, indices, widened_others, other_indices);
            Eff::ImpureAp(rebuilt, f)
        }
    }
}

/// Like [`intercept`], but threads an explicit state `S` shared across every
/// rewritten operation.
pub fn intercept_state<M, R, Idx, A, S, F>(eff: Eff<R, A>, state: S, step: F) -> Eff<R, A>
where
    M: Member<R, Idx>,
    R: Row,
    A: 'static,
    S: 'static,
    F: FnMut(M::Op<Box<dyn Any>>, &mut S) -> M::Op<Box<dyn Any>> + 'static,
{
    let shared = Rc::new(RefCell::new(state));
    intercept_state_inner::<M, R, Idx, A, S, F>(eff, shared, step)
}

fn intercept_state_inner<M, R, Idx, A, S, F>(
    eff: Eff<R, A>,
    state: Rc<RefCell<S>>,
    mut step: F,
) -> Eff<R, A>
where
    M: Member<R, Idx>,
    R: Row,
    A: 'static,
    S: 'static,
    F: FnMut(M::Op<Box<dyn Any>>, &mut S) -> M::Op<Box<dyn Any>> + 'static,
{
    match eff {
        Eff::Pure(a) => Eff::Pure(a),
        Eff::Impure(u, k) => match <M as Member<R, Idx>>::project(u) {
            Either::Right(op) => {
                let rewritten = step(op, &mut state.borrow_mut());
                let reinjected = <M as Member<R, Idx>>::inject(rewritten);
                let state_for_rest = Rc::clone(&state);
                Eff::Impure(
                    reinjected,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        intercept_state_inner::<M, R, Idx, A, S, F>(k.apply(x), state_for_rest, step)
                    })),
                )
            }
            Either::Left(u_out) => {
                let widened = <M as Member<R, Idx>>::accept(u_out);
                let state_for_rest = Rc::clone(&state);
                Eff::Impure(
                    widened,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        intercept_state_inner::<M, R, Idx, A, S, F>(k.apply(x), state_for_rest, step)
                    })),
                )
            }
        },
        Eff::ImpureAp(us, f) => {
            let CollectedUnions {
                effects,
                others,
                indices,
                other_indices,
            } = us.project::<M, Idx>();
            let rewritten: Vec<Union<R, Box<dyn Any>>> = effects
                .into_iter()
                .map(|op_box| {
                    let op = *op_box
                        .downcast::<M::Op<Box<dyn Any>>>()
                        .expect("intercept_state: applicative payload type mismatch");
                    <M as Member<R, Idx>>::inject(step(op, &mut state.borrow_mut()))
                })
                .collect();
            let widened_others: Vec<Union<R, Box<dyn Any>>> = others
                .into_iter()
                .map(<M as Member<R, Idx>>::accept)
                .collect();
            let rebuilt = reassemble_unions(rewritten, indices, widened_others, other_indices);
            Eff::ImpureAp(rebuilt, f)
        }
    }
}

/// Swaps effect `TS` for `TB` throughout a program, leaving every other effect
/// untouched: `TS` and `TB` must leave the same row `Out` once removed, so the
/// rest of the row is unaffected by the swap.
///
/// An applicative batch containing `TS` is always normalized to a plain
/// sequential `Impure` node first, losing that one node's applicative
/// structure — the same tradeoff [`translate`] makes, and for the same reason:
/// a type-changing rewrite of a batch would need `nat` to be re-appliable
/// independently per element while still producing one coherent target row,
/// which the direct recursion here does not attempt.
pub fn transform<TS, TB, R, Idx, R2, Idx2, A, F>(eff: Eff<R, A>, mut nat: F) -> Eff<R2, A>
where
    TS: Member<R, Idx>,
    TB: Member<R2, Idx2, Out = <TS as Member<R, Idx>>::Out>,
    R: Row,
    R2: Row,
    A: 'static,
    F: FnMut(TS::Op<Box<dyn Any>>) -> TB::Op<Box<dyn Any>> + 'static,
{
    match eff {
        Eff::Pure(a) => Eff::Pure(a),
        Eff::Impure(u, k) => match <TS as Member<R, Idx>>::project(u) {
            Either::Right(op) => {
                let reinjected = <TB as Member<R2, Idx2>>::inject(nat(op));
                Eff::Impure(
                    reinjected,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        transform::<TS, TB, R, Idx, R2, Idx2, A, F>(k.apply(x), nat)
                    })),
                )
            }
            Either::Left(u_out) => {
                let widened = <TB as Member<R2, Idx2>>::accept(u_out);
                Eff::Impure(
                    widened,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        transform::<TS, TB, R, Idx, R2, Idx2, A, F>(k.apply(x), nat)
                    })),
                )
            }
        },
        Eff::ImpureAp(us, f) => {
            transform::<TS, TB, R, Idx, R2, Idx2, A, F>(us.continue_with(f), nat)
        }
    }
}

/// Replaces every `M` operation with an equivalent `Eff<R, X>` program built
/// from `nat`, keeping the same row `R` — `M` and whatever `nat` uses to
/// reimplement it are expected to coexist in `R`.
///
/// This is a deliberately narrower reading of translation than "remove `M`
/// entirely and splice in a different effect's row": expressing that in
/// general would need a row-rewrite operation beyond `Member`'s subtraction,
/// which this crate does not model. Compiling one effect down to calls on
/// another already present in the row is the common case and is what this
/// covers.
pub fn translate<M, R, Idx, A, F>(eff: Eff<R, A>, mut nat: F) -> Eff<R, A>
where
    M: Member<R, Idx>,
    R: Row,
    A: 'static,
    F: FnMut(M::Op<Box<dyn Any>>) -> Eff<R, Box<dyn Any>> + 'static,
{
    match eff {
        Eff::Pure(a) => Eff::Pure(a),
        Eff::Impure(u, k) => match <M as Member<R, Idx>>::project(u) {
            Either::Right(op) => {
                let replacement = nat(op);
                replacement.flat_map(once_as_fn(move |x| {
                    translate::<M, R, Idx, A, F>(k.apply(x), nat)
                }))
            }
            Either::Left(u_out) => {
                let widened = <M as Member<R, Idx>>::accept(u_out);
                Eff::Impure(
                    widened,
                    Arrs::singleton(once_as_fn(move |x: Box<dyn Any>| {
                        translate::<M, R, Idx, A, F>(k.apply(x), nat)
                    })),
                )
            }
        },
        Eff::ImpureAp(us, f) => translate::<M, R, Idx, A, F>(us.continue_with(f), nat),
    }
}

/// Rebuilds a batch from already-rewritten `M` operations and widened
/// `others`, restoring their original positions via `indices`/`other_indices`.
fn reassemble_unions<R: Row>(
    rewritten: Vec<Union<R, Box<dyn Any>>>,
    indices: Vec<usize>,
    widened_others: Vec<Union<R, Box<dyn Any>>>,
    other_indices: Vec<usize>,
) -> Unions<R, Box<dyn Any>> {
    let total = indices.len() + other_indices.len();
    let mut slots: Vec<Option<Union<R, Box<dyn Any>>>> = (0..total).map(|_| None).collect();
    for (u, &position) in rewritten.into_iter().zip(&indices) {
        slots[position] = Some(u);
    }
    for (u, &position) in widened_others.into_iter().zip(&other_indices) {
        slots[position] = Some(u);
    }
    let mut ordered: Vec<Union<R, Box<dyn Any>>> = slots
        .into_iter()
        .map(|slot| {
            slot.unwrap_or_else(|| fatal("reassemble_unions: indices/other_indices missed a position"))
        })
        .collect();
    let head = ordered.remove(0);
    Unions::from_parts(head, ordered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::algebraic::member::{AtLeaf, InLeft, InRight};
    use crate::effect::algebraic::row::{Fx1, Fx2, NoFx};
    use rstest::rstest;

    struct Ask;
    impl EffectOp for Ask {
        type Op<X: 'static> = X;
        fn erase<X: 'static>(op: X) -> Box<dyn Any> {
            Box::new(op)
        }
    }

    struct ConstantHandler {
        value: i32,
    }

    impl Loop<Ask, Fx1<Ask>, i32, NoFx, i32> for ConstantHandler {
        type State = ();

        fn on_pure(&mut self, a: i32, _state: ()) -> Step<Fx1<Ask>, i32, (), Eff<NoFx, i32>> {
            Step::Done(Eff::Pure(a))
        }

        fn on_effect(
            &mut self,
            _op: <Ask as EffectOp>::Op<Box<dyn Any>>,
            k: Arrs<Fx1<Ask>, Box<dyn Any>, i32>,
            state: (),
        ) -> Step<Fx1<Ask>, i32, (), Eff<NoFx, i32>> {
            Step::Continue(k.apply(Box::new(self.value)), state)
        }

        fn on_applicative_effect(
            &mut self,
            _ops: Vec<Box<dyn Any>>,
            _k: Arrs<Fx1<Ask>, Vec<Box<dyn Any>>, i32>,
            _state: (),
        ) -> Step<Fx1<Ask>, i32, (), Eff<NoFx, i32>> {
            unreachable!("this test never batches Ask via ap")
        }
    }

    #[rstest]
    fn interpret_loop_resolves_a_single_effect_to_pure() {
        let program: Eff<Fx1<Ask>, i32> =
            super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0).map(|x| x + 1);
        let result = interpret_loop::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32, _>(
            program,
            ConstantHandler { value: 41 },
            (),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 42),
            _ => panic!("fully interpreted program must be Pure"),
        }
    }

    #[rstest]
    fn interpret_loop_on_pure_program_short_circuits() {
        let program: Eff<Fx1<Ask>, i32> = Eff::Pure(9);
        let result = interpret_loop::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32, _>(
            program,
            ConstantHandler { value: 41 },
            (),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 9),
            _ => panic!(),
        }
    }

    #[rstest]
    fn interpret_resolves_every_ask_to_a_constant() {
        let program: Eff<Fx1<Ask>, i32> =
            super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0).map(|x| x + 1);
        let result: Eff<NoFx, i32> = interpret::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32>(
            program,
            Eff::Pure,
            |_op| Box::new(41_i32),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 42),
            _ => panic!(),
        }
    }

    #[rstest]
    fn interpret_state_threads_state_across_every_ask() {
        let program: Eff<Fx1<Ask>, i32> = super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0)
            .flat_map(|_| super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0));
        let result: Eff<NoFx, i32> = interpret_state::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32, i32>(
            program,
            0,
            |a, s| Eff::Pure(a + s),
            |_op, s| (Box::new(s) as Box<dyn Any>, s + 1),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 2),
            _ => panic!("two Asks starting at state 0 should answer 0 then 1, landing at 1 + 1"),
        }
    }

    #[rstest]
    fn intercept_rewrites_every_ask_without_changing_the_row() {
        let program: Eff<Fx1<Ask>, i32> =
            super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0).map(|x| x + 1);
        let rewritten: Eff<Fx1<Ask>, i32> =
            intercept::<Ask, Fx1<Ask>, AtLeaf, i32, _>(program, |_op| Box::new(99_i32));
        let result = interpret_loop::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32, _>(
            rewritten,
            ConstantHandler { value: -1 },
            (),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 100),
            _ => panic!("intercept should have already resolved Ask's payload to 99"),
        }
    }

    #[rstest]
    fn intercept_rewrites_every_ask_behind_a_multi_arrow_continuation() {
        // Builds a continuation with more than one queued arrow before the
        // second Ask is even reached: the `.map` after the first send and the
        // `.map` after the second send both land on the same `Arrs` queue as
        // the `flat_map` body that produces the second `send`. A rewrap that
        // only touched the queue's last arrow would leave the second Ask's
        // payload unrewritten.
        let program: Eff<Fx1<Ask>, i32> = super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0)
            .map(|x| x + 100)
            .flat_map(|x: i32| {
                super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0).map(move |y| x + y)
            })
            .map(|x| x + 1);

        let calls = Rc::new(RefCell::new(0));
        let calls_for_step = Rc::clone(&calls);
        let rewritten: Eff<Fx1<Ask>, i32> =
            intercept::<Ask, Fx1<Ask>, AtLeaf, i32, _>(program, move |_op| {
                *calls_for_step.borrow_mut() += 1;
                Box::new(-1_i32)
            });
        let result = interpret_loop::<Ask, Fx1<Ask>, AtLeaf, i32, NoFx, i32, _>(
            rewritten,
            ConstantHandler { value: -1 },
            (),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 99),
            _ => panic!("both Asks behind the multi-arrow continuation must resolve"),
        }
        assert_eq!(
            *calls.borrow(),
            2,
            "step must run once per Ask, including the one reached through the continuation's later arrows"
        );
    }

    struct Say;
    impl EffectOp for Say {
        type Op<X: 'static> = X;
        fn erase<X: 'static>(op: X) -> Box<dyn Any> {
            Box::new(op)
        }
    }

    #[rstest]
    fn transform_swaps_one_effect_for_another_across_the_whole_program() {
        let program: Eff<Fx1<Ask>, i32> =
            super::super::eff::send::<Ask, Fx1<Ask>, AtLeaf, i32>(0).map(|x| x + 1);
        let swapped: Eff<Fx1<Say>, i32> =
            transform::<Ask, Say, Fx1<Ask>, AtLeaf, Fx1<Say>, AtLeaf, i32, _>(
                program,
                |_op: Box<dyn Any>| Box::new(7_i32) as Box<dyn Any>,
            );

        struct SayHandler;
        impl Loop<Say, Fx1<Say>, i32, NoFx, i32> for SayHandler {
            type State = ();
            fn on_pure(&mut self, a: i32, _s: ()) -> Step<Fx1<Say>, i32, (), Eff<NoFx, i32>> {
                Step::Done(Eff::Pure(a))
            }
            fn on_effect(
                &mut self,
                _op: <Say as EffectOp>::Op<Box<dyn Any>>,
                k: Arrs<Fx1<Say>, Box<dyn Any>, i32>,
                state: (),
            ) -> Step<Fx1<Say>, i32, (), Eff<NoFx, i32>> {
                Step::Continue(k.apply(Box::new(7_i32)), state)
            }
            fn on_applicative_effect(
                &mut self,
                _ops: Vec<Box<dyn Any>>,
                _k: Arrs<Fx1<Say>, Vec<Box<dyn Any>>, i32>,
                _state: (),
            ) -> Step<Fx1<Say>, i32, (), Eff<NoFx, i32>> {
                unreachable!("this test never batches Say via ap")
            }
        }

        let result =
            interpret_loop::<Say, Fx1<Say>, AtLeaf, i32, NoFx, i32, _>(swapped, SayHandler, ());
        match result {
            Eff::Pure(v) => assert_eq!(v, 8),
            _ => panic!(),
        }
    }

    #[rstest]
    fn translate_inlines_one_effect_as_a_program_over_another() {
        let program: Eff<Fx2<Ask, Say>, i32> =
            super::super::eff::send::<Ask, Fx2<Ask, Say>, InLeft<AtLeaf>, i32>(0)
                .map(|x| x + 1);
        let translated: Eff<Fx2<Ask, Say>, i32> =
            translate::<Ask, Fx2<Ask, Say>, InLeft<AtLeaf>, i32, _>(program, |_op| {
                super::super::eff::send::<Say, Fx2<Ask, Say>, InRight<AtLeaf>, i32>(5)
                    .map(|v| Box::new(v) as Box<dyn Any>)
            });

        struct BothHandler;
        impl Loop<Ask, Fx2<Ask, Say>, i32, Fx1<Say>, i32> for BothHandler {
            type State = ();
            fn on_pure(&mut self, a: i32, _s: ()) -> Step<Fx2<Ask, Say>, i32, (), Eff<Fx1<Say>, i32>> {
                Step::Done(Eff::Pure(a))
            }
            fn on_effect(
                &mut self,
                _op: <Ask as EffectOp>::Op<Box<dyn Any>>,
                k: Arrs<Fx2<Ask, Say>, Box<dyn Any>, i32>,
                state: (),
            ) -> Step<Fx2<Ask, Say>, i32, (), Eff<Fx1<Say>, i32>> {
                Step::Continue(k.apply(Box::new(0_i32)), state)
            }
            fn on_applicative_effect(
                &mut self,
                _ops: Vec<Box<dyn Any>>,
                _k: Arrs<Fx2<Ask, Say>, Vec<Box<dyn Any>>, i32>,
                _state: (),
            ) -> Step<Fx2<Ask, Say>, i32, (), Eff<Fx1<Say>, i32>> {
                unreachable!("this test never batches Ask via ap")
            }
        }

        let after_ask: Eff<Fx1<Say>, i32> =
            interpret_loop::<Ask, Fx2<Ask, Say>, InLeft<AtLeaf>, i32, Fx1<Say>, i32, _>(
                translated,
                BothHandler,
                (),
            );
        let result = interpret::<Say, Fx1<Say>, AtLeaf, i32, NoFx, i32>(
            after_ask,
            Eff::Pure,
            |_op| Box::new(5_i32),
        );
        match result {
            Eff::Pure(v) => assert_eq!(v, 6),
            _ => panic!("Ask was translated into a Say carrying 5, then mapped with +1"),
        }
    }
}

//! Terminal runners: the only combinators that consume an `Eff` entirely
//! rather than handing back a smaller row.
//!
//! Every program that reaches one of these has, by construction, no more use
//! for the row-tracking machinery: [`run`] and [`run_pure`] expect a program
//! with nothing left to interpret, and [`detach`] expects exactly one effect
//! remaining whose operations are themselves values of some monad the caller
//! already knows how to run.

use std::any::Any;

use crate::control::Either;

use super::eff::Eff;
use super::error::fatal;
use super::member::{AtLeaf, Member};
use super::row::{EffectOp, Fx1, NoFx, Row};

/// Runs a program whose row has already been fully interpreted away.
///
/// # Panics
///
/// A well-typed program over [`NoFx`] can only ever reduce to `Pure`, since
/// there is no effect left in the row to build an `Impure`/`ImpureAp` node
/// from. Seeing one anyway means some handler built an ill-formed `Eff`
/// value, which is a row-discipline violation this function reports as fatal.
#[must_use]
pub fn run<A: 'static>(eff: Eff<NoFx, A>) -> A {
    match eff {
        Eff::Pure(a) => a,
        Eff::Impure(_, _) | Eff::ImpureAp(_, _) => {
            fatal("run: a program over NoFx produced a non-Pure node")
        }
    }
}

/// `Some(a)` iff `eff` is already `Pure(a)`; `None` for a program that still
/// has effects left to interpret.
///
/// Unlike [`run`], this is never fatal: checking "is this already done?" is a
/// legitimate question to ask of a program in any row.
#[must_use]
pub fn run_pure<R: Row, A: 'static>(eff: Eff<R, A>) -> Option<A> {
    match eff {
        Eff::Pure(a) => Some(a),
        Eff::Impure(_, _) | Eff::ImpureAp(_, _) => None,
    }
}

/// An effect whose own operations, for every answer type `X`, are already a
/// value of some monad `M[X]` the caller can run directly — a writer action,
/// a future, anything with its own `pure`/`bind`.
///
/// [`detach`] is built on this: peeling the single remaining effect out of an
/// `Eff` by delegating entirely to the monad's own `pure`/`bind`, instead of
/// going through a handler.
pub trait Monadic: EffectOp {
    /// Lifts a plain value into this monad.
    fn pure<X: 'static>(x: X) -> Self::Op<X>;

    /// Sequences a monadic value into a function producing another.
    fn bind<X: 'static, Y: 'static>(
        m: Self::Op<X>,
        f: impl FnOnce(X) -> Self::Op<Y> + 'static,
    ) -> Self::Op<Y>;
}

/// Peels a single-effect program directly into that effect's own monad, using
/// `M::pure`/`M::bind` in place of this crate's own continuation machinery.
///
/// `ImpureAp` is normalized to `Impure` first, the same tradeoff every other
/// row-walking combinator here makes: true sequencing is unavoidable once
/// values have to be threaded through an arbitrary external `bind`.
#[must_use]
pub fn detach<M, A>(eff: Eff<Fx1<M>, A>) -> M::Op<A>
where
    M: Monadic,
    A: 'static,
{
    match eff {
        Eff::Pure(a) => M::pure(a),
        Eff::Impure(u, k) => {
            let op = match <M as Member<Fx1<M>, AtLeaf>>::project(u) {
                Either::Right(op) => op,
                Either::Left(_) => fatal("detach: Fx1<M> produced a union that wasn't M"),
            };
            M::bind(op, move |x: Box<dyn Any>| detach::<M, A>(k.apply(x)))
        }
        Eff::ImpureAp(us, f) => detach::<M, A>(us.continue_with(f)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::algebraic::eff::send;
    use rstest::rstest;

    struct Noop;
    impl EffectOp for Noop {
        type Op<X: 'static> = X;
        fn erase<X: 'static>(op: X) -> Box<dyn Any> {
            Box::new(op)
        }
    }

    #[rstest]
    fn run_returns_the_value_of_a_pure_program() {
        let program: Eff<NoFx, i32> = Eff::pure(42);
        assert_eq!(run(program), 42);
    }

    #[rstest]
    #[should_panic(expected = "fatal row-discipline violation")]
    fn run_panics_on_anything_other_than_pure() {
        let program: Eff<NoFx, i32> = send::<Noop, NoFx, AtLeaf, i32>(1);
        let _ = run(program);
    }

    #[rstest]
    fn run_pure_is_some_only_for_an_already_pure_program() {
        let done: Eff<Fx1<Noop>, i32> = Eff::pure(7);
        assert_eq!(run_pure(done), Some(7));

        let pending: Eff<Fx1<Noop>, i32> = send::<Noop, Fx1<Noop>, AtLeaf, i32>(0);
        assert_eq!(run_pure(pending), None);
    }

    /// A minimal "identity-ish" accumulator monad: `Op<X>` pairs a log with a
    /// value, the way a writer's underlying representation would.
    struct Logged;
    impl EffectOp for Logged {
        type Op<X: 'static> = (Vec<&'static str>, X);

        fn erase<X: 'static>(op: Self::Op<X>) -> Self::Op<Box<dyn Any>> {
            let (log, x) = op;
            (log, Box::new(x) as Box<dyn Any>)
        }
    }
    impl Monadic for Logged {
        fn pure<X: 'static>(x: X) -> Self::Op<X> {
            (Vec::new(), x)
        }

        fn bind<X: 'static, Y: 'static>(
            m: Self::Op<X>,
            f: impl FnOnce(X) -> Self::Op<Y> + 'static,
        ) -> Self::Op<Y> {
            let (mut log, x) = m;
            let (more, y) = f(x);
            log.extend(more);
            (log, y)
        }
    }

    #[rstest]
    fn detach_peels_a_single_effect_into_its_own_monad() {
        let program: Eff<Fx1<Logged>, i32> =
            send::<Logged, Fx1<Logged>, AtLeaf, i32>((vec!["one"], 1))
                .flat_map(|x| send::<Logged, Fx1<Logged>, AtLeaf, i32>((vec!["two"], x + 1)));
        let (log, value) = detach::<Logged, i32>(program);
        assert_eq!(value, 2);
        assert_eq!(log, vec!["one", "two"]);
    }
}

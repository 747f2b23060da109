//! The effect program type: a free monad over an open, type-indexed effect row.
//!
//! `Eff<R, A>` is either a finished value (`Pure`), one effect followed by a
//! stack-safe continuation (`Impure`), or an independent batch of effects
//! followed by a function combining all their answers (`ImpureAp`). Keeping
//! `ImpureAp` as its own constructor — rather than always sequencing through
//! `Impure` — is what lets `ap` preserve "these effects don't depend on each
//! other" information for handlers that can exploit it (batched I/O, combined
//! non-determinism), while `flat_map` can always fall back to normalizing an
//! `ImpureAp` into an `Impure` node when true sequencing is unavoidable.
//!
//! Both the continuation and the applicative zipper are stored as `Fn`, not
//! `FnOnce` — a handler for a non-deterministic effect resumes the same
//! continuation once per candidate value, so neither can be consumed on first
//! use. [`super::arrs::once_as_fn`] adapts the few call sites below (and in
//! [`super::interpret`]) that build a closure around a single owned value
//! which genuinely can only run once; those remain single-shot by design.

use std::any::Any;
use std::rc::Rc;

use super::arrs::{once_as_fn, Arrs};
use super::error::fatal;
use super::member::Member;
use super::row::Row;
use super::union::Union;
use super::unions::Unions;

/// A program that produces an `A`, possibly performing effects drawn from `R`.
pub enum Eff<R: Row, A: 'static> {
    /// A finished value, with no remaining effects to run.
    Pure(A),
    /// One effect operation, followed by the stack-safe continuation that
    /// consumes its answer.
    Impure(Union<R, Box<dyn Any>>, Arrs<R, Box<dyn Any>, A>),
    /// An independent batch of effect operations, followed by the function
    /// that combines all of their answers, in order, into the final value.
    ImpureAp(Unions<R, Box<dyn Any>>, Rc<dyn Fn(Vec<Box<dyn Any>>) -> A>),
}

impl<R: Row, A: 'static> Eff<R, A> {
    /// Lifts a plain value into a program that performs no effects.
    #[must_use]
    pub fn pure(a: A) -> Self {
        Eff::Pure(a)
    }

    /// Builds a program out of a raw union and continuation.
    ///
    /// Handler-internal: ordinary programs are built with [`send`], never with
    /// a hand-assembled `Union`.
    pub(crate) fn impure(u: Union<R, Box<dyn Any>>, k: Arrs<R, Box<dyn Any>, A>) -> Self {
        Eff::Impure(u, k)
    }

    /// Re-erases this program's answer type to `Box<dyn Any>`, for storage
    /// inside an [`Arrs`] deque.
    pub(crate) fn map_erased(self) -> Eff<R, Box<dyn Any>> {
        self.map(|a| Box::new(a) as Box<dyn Any>)
    }

    /// Transforms the eventual answer with `f`.
    ///
    /// On `Impure`, this appends `pure . f` to the continuation rather than
    /// mutating it, keeping the deque's shape canonical. On `ImpureAp`, it
    /// composes directly with the zipper, preserving the applicative batch —
    /// unlike [`Eff::flat_map`], `map` never needs to normalize `ImpureAp` away.
    #[must_use]
    pub fn map<B: 'static>(self, f: impl Fn(A) -> B + 'static) -> Eff<R, B> {
        match self {
            Eff::Pure(a) => Eff::Pure(f(a)),
            Eff::Impure(u, k) => Eff::Impure(u, k.append(move |a: A| Eff::Pure(f(a)))),
            Eff::ImpureAp(us, zip) => Eff::ImpureAp(us, Rc::new(move |xs| f(zip(xs)))),
        }
    }

    /// Sequences this program into `f`, the only primitive operation monadic
    /// chaining is built from.
    ///
    /// `ImpureAp` is normalized into `Impure` first (see
    /// [`Unions::continue_with`]) — true sequencing forces evaluation order, so
    /// the applicative batch can no longer be preserved past this point.
    #[must_use]
    pub fn flat_map<B: 'static>(self, f: impl Fn(A) -> Eff<R, B> + 'static) -> Eff<R, B> {
        match self {
            Eff::Pure(a) => f(a),
            Eff::Impure(u, k) => Eff::Impure(u, k.append(f)),
            Eff::ImpureAp(us, zip) => us.continue_with(zip).flat_map(f),
        }
    }

    /// Runs this program, then `next`, discarding this program's answer.
    ///
    /// `next` is a single already-built program, not a factory, so it can only
    /// ever run once: resuming the combined continuation more than once (a
    /// non-deterministic choice upstream, say) panics. Callers who need a
    /// per-resumption successor should use `flat_map(|_| build_next())`
    /// instead, with `build_next` constructing a fresh program each call.
    #[must_use]
    pub fn then<B: 'static>(self, next: Eff<R, B>) -> Eff<R, B> {
        self.flat_map(once_as_fn(move |_: A| next))
    }

    /// Reinterprets this program as running over a different row `U`.
    ///
    /// A structural retag all the way down: every payload a program carries is
    /// already type-erased, so widening or narrowing which row it is said to
    /// run over never touches a single byte of it. [`super::into_poly::IntoPoly`]
    /// is the public-facing, type-checked entry point to this; callers outside
    /// this crate should use that instead of reaching for `retag` directly.
    pub(crate) fn retag<U: Row>(self) -> Eff<U, A> {
        match self {
            Eff::Pure(a) => Eff::Pure(a),
            Eff::Impure(u, k) => Eff::Impure(u.retag(), k.retag()),
            Eff::ImpureAp(us, zip) => Eff::ImpureAp(us.retag(), zip),
        }
    }

    /// Converts an applicative batch's zipper into the Impure representation
    /// used when a continuation's remaining arrows need to be lazily prepended
    /// (see [`Arrs::apply`]): the batch's head effect becomes the `Union`, and
    /// the rest of the batch is folded into the continuation.
    pub(crate) fn applicative_to_impure(
        unions: Unions<R, Box<dyn Any>>,
        zip: Rc<dyn Fn(Vec<Box<dyn Any>>) -> A>,
    ) -> (Union<R, Box<dyn Any>>, Arrs<R, Box<dyn Any>, A>) {
        match unions.continue_with(zip) {
            Eff::Impure(u, k) => (u, k),
            _ => unreachable!("Unions::continue_with always produces an Impure node"),
        }
    }
}

/// Injects one operation of effect `M` into a program over row `R`.
///
/// Always constructed as a single-element applicative batch, so that adjacent
/// `send` calls merged under [`ap`] don't force monadic sequencing between
/// them.
#[must_use]
pub fn send<M, R, Idx, X>(op: M::Op<X>) -> Eff<R, X>
where
    M: Member<R, Idx>,
    R: Row,
    X: 'static,
{
    let erased_op: M::Op<Box<dyn Any>> = M::erase(op);
    let erased_head: Union<R, Box<dyn Any>> = M::inject(erased_op);
    Eff::ImpureAp(
        Unions::singleton(erased_head),
        Rc::new(|mut xs: Vec<Box<dyn Any>>| {
            *xs.remove(0).downcast::<X>().unwrap_or_else(|_| {
                fatal("send: applicative zipper received a payload of the wrong type")
            })
        }),
    )
}

/// Combines an effectful function with an effectful argument.
///
/// Follows the fixed ordering law: `fa`'s effects run before `ff`'s in the
/// combined batch. When both sides are already applicative batches, they are
/// merged into one larger batch, and the combined zipper only ever calls
/// `zip_fa`/`zip_ff` by shared reference — never consumes them — so the merged
/// batch can be resumed once per candidate by a non-deterministic handler.
/// Otherwise this falls back to `fa.flat_map(|a| ff.map(|f| f(a)))`; since `ff`
/// or `fa` is a single `Pure`/`Impure` program rather than a batch in that
/// case, the function value it carries is consumed on first use (via
/// [`super::arrs::once_as_fn`]), so those mixed shapes stay single-shot.
#[must_use]
pub fn ap<R: Row, A: 'static, B: 'static>(
    ff: Eff<R, Box<dyn FnOnce(A) -> B>>,
    fa: Eff<R, A>,
) -> Eff<R, B> {
    match fa {
        Eff::Pure(a) => match ff {
            Eff::Pure(f) => Eff::Pure(f(a)),
            Eff::Impure(u, k) => Eff::Impure(
                u,
                k.append(once_as_fn(move |f: Box<dyn FnOnce(A) -> B>| {
                    Eff::Pure(f(a))
                })),
            ),
            Eff::ImpureAp(us, zip) => {
                Eff::ImpureAp(us, Rc::new(once_as_fn(move |xs| zip(xs)(a))))
            }
        },
        Eff::Impure(u, k) => match ff {
            Eff::Pure(f) => Eff::Impure(u, k.append(once_as_fn(move |a: A| Eff::Pure(f(a))))),
            other_ff => {
                let fa_again = Eff::Impure(u, k);
                fa_again.flat_map(once_as_fn(move |a| {
                    other_ff.map(once_as_fn(move |f: Box<dyn FnOnce(A) -> B>| f(a)))
                }))
            }
        },
        Eff::ImpureAp(us_fa, zip_fa) => match ff {
            Eff::Pure(f) => Eff::ImpureAp(us_fa, Rc::new(once_as_fn(move |xs| f(zip_fa(xs))))),
            Eff::ImpureAp(us_ff, zip_ff) => {
                let size_fa = us_fa.size();
                let combined = us_fa.append(us_ff);
                Eff::ImpureAp(
                    combined,
                    Rc::new(move |mut xs: Vec<Box<dyn Any>>| {
                        let rest = xs.split_off(size_fa);
                        let a = zip_fa(xs);
                        let f = zip_ff(rest);
                        f(a)
                    }),
                )
            }
            Eff::Impure(u, k) => {
                let fa_again = Eff::ImpureAp(us_fa, zip_fa);
                let ff_again = Eff::Impure(u, k);
                fa_again.flat_map(once_as_fn(move |a| {
                    ff_again.map(once_as_fn(move |f: Box<dyn FnOnce(A) -> B>| f(a)))
                }))
            }
        },
    }
}

/// Pairs the answers of two programs, running `fa`'s effects before `fb`'s.
#[must_use]
pub fn product<R: Row, A: 'static, B: 'static>(fa: Eff<R, A>, fb: Eff<R, B>) -> Eff<R, (A, B)> {
    let ff: Eff<R, Box<dyn FnOnce(A) -> (A, B)>> =
        fb.map(|b| -> Box<dyn FnOnce(A) -> (A, B)> { Box::new(move |a| (a, b)) });
    ap(ff, fa)
}

/// Runs `f` over every element of `items`, collecting the answers in order.
#[must_use]
pub fn traverse<R, T, B>(items: Vec<T>, mut f: impl FnMut(T) -> Eff<R, B>) -> Eff<R, Vec<B>>
where
    R: Row,
    T: 'static,
    B: 'static,
{
    let mut acc: Eff<R, Vec<B>> = Eff::Pure(Vec::with_capacity(items.len()));
    for item in items {
        let step = f(item);
        acc = acc.flat_map(once_as_fn(move |collected: Vec<B>| {
            step.map(once_as_fn(move |b: B| {
                let mut collected = collected;
                collected.push(b);
                collected
            }))
        }));
    }
    acc
}

/// Runs every program in `items` in order, collecting the answers.
#[must_use]
pub fn sequence<R: Row, A: 'static>(items: Vec<Eff<R, A>>) -> Eff<R, Vec<A>> {
    traverse(items, |eff| eff)
}

//! `Arrs`: a stack-safe queue of composed Kleisli arrows `A -> Eff<R, B>`.
//!
//! Every [`super::eff::Eff::Impure`] node carries one of these instead of a bare
//! closure so that long `flat_map` chains compose by pushing onto a deque rather
//! than by nesting closures, which is what keeps [`Arrs::apply`] safe for
//! programs with millions of sequential steps. The deque itself is the same
//! [`ContinuationQueue`] the rest of the control machinery uses for O(1)
//! push/pop with amortized FIFO ordering; `Arrs` only adds the effect-aware
//! `apply` loop on top.
//!
//! Every stored arrow is a plain `Fn`, not `FnOnce`, and `apply` borrows rather
//! than consumes: a handler that needs to resume the same continuation for
//! several candidate values (a non-deterministic choice effect, say) can call
//! `apply` once per candidate without giving up ownership of the continuation.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::control::continuation_queue::{ContinuationQueue, TypeErasedArrow};

use super::eff::Eff;
use super::error::fatal;
use super::row::Row;

pub(crate) type ErasedEff<R> = Eff<R, Box<dyn Any>>;

/// Adapts a `FnOnce` into an `Fn` by deferring through interior mutability,
/// panicking if the result is ever invoked more than once.
///
/// Used at the handful of call sites inside the interpreter kernel
/// ([`super::interpret`]) where a continuation is rebuilt once per recursive
/// step and is never itself a replay point — the multi-shot machinery those
/// steps rely on lives one level down, in the `Arrs` queue they thread
/// through. Genuine multi-shot replay (list/non-determinism handlers resuming
/// the same `Arrs` several times) never goes through this adapter.
pub(crate) fn once_as_fn<Args, Out>(
    f: impl FnOnce(Args) -> Out + 'static,
) -> impl Fn(Args) -> Out + 'static {
    let cell = Rc::new(std::cell::RefCell::new(Some(f)));
    move |args: Args| {
        let f = cell
            .borrow_mut()
            .take()
            .expect("once_as_fn: continuation invoked more than once");
        f(args)
    }
}

struct ErasedArrow<R: Row, F> {
    function: F,
    _marker: PhantomData<R>,
}

impl<R, F> TypeErasedArrow<ErasedEff<R>> for ErasedArrow<R, F>
where
    R: Row,
    F: Fn(Box<dyn Any>) -> ErasedEff<R>,
{
    fn apply(&self, input: Box<dyn Any>) -> ErasedEff<R> {
        (self.function)(input)
    }
}

/// A composed, stack-safe, multi-shot continuation from `A` to `Eff<R, B>`.
pub struct Arrs<R: Row, A, B> {
    queue: ContinuationQueue<ErasedEff<R>>,
    _marker: PhantomData<(A, B)>,
}

impl<R: Row, A, B> Clone for Arrs<R, A, B> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            _marker: PhantomData,
        }
    }
}

impl<R: Row, A: 'static> Arrs<R, A, A> {
    /// The identity continuation: hands its input straight back via `pure`.
    #[must_use]
    pub fn unit() -> Self {
        Self {
            queue: ContinuationQueue::new(),
            _marker: PhantomData,
        }
    }
}

impl<R: Row, A: 'static, B: 'static> Arrs<R, A, B> {
    /// Builds a continuation out of a single Kleisli arrow.
    #[must_use]
    pub fn singleton<F>(f: F) -> Self
    where
        F: Fn(A) -> Eff<R, B> + 'static,
    {
        let mut queue = ContinuationQueue::new();
        queue.push_arrow(Rc::new(ErasedArrow {
            function: move |input: Box<dyn Any>| {
                let a = *input
                    .downcast::<A>()
                    .unwrap_or_else(|_| fatal("Arrs: singleton input type mismatch"));
                f(a).map_erased()
            },
            _marker: PhantomData,
        }));
        Self {
            queue,
            _marker: PhantomData,
        }
    }

    /// Appends one more arrow to the end of the continuation.
    #[must_use]
    pub fn append<C: 'static, F>(mut self, f: F) -> Arrs<R, A, C>
    where
        F: Fn(B) -> Eff<R, C> + 'static,
    {
        self.queue.push_arrow(Rc::new(ErasedArrow {
            function: move |input: Box<dyn Any>| {
                let b = *input
                    .downcast::<B>()
                    .unwrap_or_else(|_| fatal("Arrs: append input type mismatch"));
                f(b).map_erased()
            },
            _marker: PhantomData,
        }));
        Arrs {
            queue: self.queue,
            _marker: PhantomData,
        }
    }

    /// Prepends a pure transformation of the input, widening `A` to `C`.
    ///
    /// Since the underlying deque only supports pushing to the back, this
    /// rebuilds the queue once: the new front arrow is pushed first, then every
    /// existing arrow is drained (in order) from the old queue and re-pushed
    /// behind it.
    #[must_use]
    pub fn contramap<C: 'static, F>(self, f: F) -> Arrs<R, C, B>
    where
        F: Fn(C) -> A + 'static,
    {
        let mut new_queue = ContinuationQueue::new();
        new_queue.push_arrow(Rc::new(ErasedArrow {
            function: move |input: Box<dyn Any>| {
                let c = *input
                    .downcast::<C>()
                    .unwrap_or_else(|_| fatal("Arrs: contramap input type mismatch"));
                Eff::<R, A>::Pure(f(c)).map_erased()
            },
            _marker: PhantomData,
        }));
        let mut old_queue = self.queue;
        while let Some(arrow) = old_queue.pop() {
            new_queue.push_arrow(arrow);
        }
        Arrs {
            queue: new_queue,
            _marker: PhantomData,
        }
    }

    /// Reinterprets this continuation as producing programs over a different
    /// row `U`, by wrapping every arrow so its result is retagged once it runs.
    pub(crate) fn retag<U: Row>(self) -> Arrs<U, A, B> {
        let mut old_queue = self.queue;
        let mut new_queue = ContinuationQueue::new();
        while let Some(arrow) = old_queue.pop() {
            new_queue.push_arrow(Rc::new(RetagArrow::<R, U> {
                inner: arrow,
                _marker: PhantomData,
            }));
        }
        Arrs {
            queue: new_queue,
            _marker: PhantomData,
        }
    }

    /// Concatenates `rest` onto the end of this continuation, without forcing
    /// evaluation of either side. Used by the interpreter kernel to lazily
    /// prepend the remaining steps of a deque onto an inner effect's own
    /// continuation.
    pub(crate) fn concat<C: 'static>(self, rest: Arrs<R, B, C>) -> Arrs<R, A, C> {
        let mut queue = self.queue;
        let mut rest_queue = rest.queue;
        while let Some(arrow) = rest_queue.pop() {
            queue.push_arrow(arrow);
        }
        Arrs {
            queue,
            _marker: PhantomData,
        }
    }

    /// Runs the continuation on `a`, stepping through `Pure` results in place
    /// and returning as soon as an `Impure`/`ImpureAp` node is reached — with
    /// the remaining arrows lazily prepended onto that node's own continuation.
    ///
    /// This loop never recurses: each step either keeps looping (bounded work)
    /// or returns, which is what keeps long monadic chains stack-safe. Takes
    /// `&self` rather than consuming the continuation, so a handler can call
    /// `apply` again with a different `a` — the queue is cloned (a handful of
    /// `Rc` bumps) and walked, leaving the original untouched.
    pub fn apply(&self, a: A) -> Eff<R, B> {
        let mut queue = self.queue.clone();
        let mut current: Box<dyn Any> = Box::new(a);
        loop {
            match queue.pop() {
                None => {
                    return Eff::Pure(
                        *current
                            .downcast::<B>()
                            .unwrap_or_else(|_| fatal("Arrs: apply result type mismatch")),
                    );
                }
                Some(arrow) => match arrow.apply(current) {
                    Eff::Pure(v) => current = v,
                    Eff::Impure(u, k) => {
                        let rest: Arrs<R, Box<dyn Any>, B> = Arrs {
                            queue,
                            _marker: PhantomData,
                        };
                        return Eff::Impure(u, k.concat(rest));
                    }
                    Eff::ImpureAp(unions, zip) => {
                        let (u, k) = Eff::<R, Box<dyn Any>>::applicative_to_impure(unions, zip);
                        let rest: Arrs<R, Box<dyn Any>, B> = Arrs {
                            queue,
                            _marker: PhantomData,
                        };
                        return Eff::Impure(u, k.concat(rest));
                    }
                },
            }
        }
    }
}

struct RetagArrow<R: Row, U: Row> {
    inner: Rc<dyn TypeErasedArrow<ErasedEff<R>>>,
    _marker: PhantomData<U>,
}

impl<R: Row, U: Row> TypeErasedArrow<ErasedEff<U>> for RetagArrow<R, U> {
    fn apply(&self, input: Box<dyn Any>) -> ErasedEff<U> {
        let produced: ErasedEff<R> = self.inner.apply(input);
        produced.retag()
    }
}

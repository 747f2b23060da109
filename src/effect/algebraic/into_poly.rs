//! Row weakening: embedding a program written against a small row into a
//! larger one that is known to contain every effect the small row does.
//!
//! [`IntoPoly`] mirrors [`Row`]'s own three-shape structure (`NoFx`, `Fx1`,
//! `FxAppend`) rather than searching `U`'s shape: `R`'s own shape already
//! determines, case by case, what witnesses are needed to prove each of its
//! effects also occurs in `U`. Since every payload a program carries is
//! already type-erased (see [`super::union::Union`]), the actual runtime work
//! in every case is the same structural retag — these impls exist purely to
//! make the Rust type system vouch for the retag being sound, not because the
//! three cases behave differently at runtime.

use super::eff::Eff;
use super::member::Member;
use super::row::{EffectOp, Fx1, FxAppend, NoFx, Row};

/// Witnesses that every effect in row `Self` also occurs in row `U`, so a
/// program over `Self` can be widened into one over `U`.
///
/// # Examples
///
/// ```rust
/// use effrow::effect::algebraic::{send, EffectOp, Eff, Fx2, Fx1, IntoPoly};
/// use effrow::effect::algebraic::member::AtLeaf;
///
/// struct Ask;
/// impl EffectOp for Ask {
///     type Op<X: 'static> = X;
///     fn erase<X: 'static>(op: X) -> Box<dyn std::any::Any> { Box::new(op) }
/// }
/// struct Log;
/// impl EffectOp for Log {
///     type Op<X: 'static> = X;
///     fn erase<X: 'static>(op: X) -> Box<dyn std::any::Any> { Box::new(op) }
/// }
///
/// let small: Eff<Fx1<Ask>, i32> = send::<Ask, Fx1<Ask>, AtLeaf, i32>(41);
/// let widened: Eff<Fx2<Ask, Log>, i32> = small.into_poly();
/// ```
pub trait IntoPoly<U: Row>: Row {
    /// Widens a program over `Self` into one over the larger row `U`.
    fn widen<A: 'static>(eff: Eff<Self, A>) -> Eff<U, A>
    where
        Self: Sized;
}

/// The empty row embeds into anything: a `NoFx` program can only ever be
/// `Pure`, since there is no effect left in it to construct an `Impure` or
/// `ImpureAp` node from.
impl<U: Row> IntoPoly<U> for NoFx {
    fn widen<A: 'static>(eff: Eff<NoFx, A>) -> Eff<U, A> {
        match eff {
            Eff::Pure(a) => Eff::Pure(a),
            Eff::Impure(_, _) | Eff::ImpureAp(_, _) => {
                unreachable!("NoFx carries no effect, so no program over it can be non-Pure")
            }
        }
    }
}

/// A single-effect row embeds into `U` whenever `M` itself is a member of `U`,
/// at whatever position `Idx` locates it.
impl<M, U, Idx> IntoPoly<U> for Fx1<M>
where
    M: EffectOp,
    U: Row,
    M: Member<U, Idx>,
{
    fn widen<A: 'static>(eff: Eff<Fx1<M>, A>) -> Eff<U, A> {
        eff.retag()
    }
}

/// An append embeds into `U` whenever both of its branches do.
impl<L, R, U> IntoPoly<U> for FxAppend<L, R>
where
    L: IntoPoly<U>,
    R: IntoPoly<U>,
    U: Row,
{
    fn widen<A: 'static>(eff: Eff<FxAppend<L, R>, A>) -> Eff<U, A> {
        eff.retag()
    }
}

impl<R: Row, A: 'static> Eff<R, A> {
    /// Widens this program into the larger row `U`, inferred from context.
    ///
    /// A convenience method over [`IntoPoly::widen`], so callers don't have to
    /// name the trait at every use site.
    #[must_use]
    pub fn into_poly<U: Row>(self) -> Eff<U, A>
    where
        R: IntoPoly<U>,
    {
        R::widen(self)
    }
}

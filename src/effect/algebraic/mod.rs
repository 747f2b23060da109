//! The extensible-effects core: an open, type-indexed effect row, the free
//! monad built over it, and the interpreter kernel that drives handlers.
//!
//! Submodules follow the same seams the design itself has: [`row`] is the
//! type-level algebra (what a row *is*), [`union`] and [`member`] are the
//! runtime and compile-time machinery that make row search a constant-time
//! retag, [`arrs`]/[`unions`] are the two continuation shapes a program can
//! carry, [`eff`] is the program type itself, [`interpret`] is the
//! trampoline every handler combinator shares, [`into_poly`] is row
//! weakening, and [`run`] is where a program's story ends.

pub mod arrs;
pub mod eff;
pub(crate) mod error;
pub mod interpret;
pub mod into_poly;
pub mod member;
pub mod row;
pub mod run;
pub mod union;
pub mod unions;

pub use arrs::Arrs;
pub use eff::{ap, product, send, sequence, traverse, Eff};
pub use interpret::{
    intercept, intercept_state, interpret, interpret_loop, interpret_state, interpret_unsafe,
    transform, translate, Loop, Step,
};
pub use into_poly::IntoPoly;
pub use member::{AtLeaf, InLeft, InRight, Member, MemberInPlace};
pub use row::{EffectOp, Fx1, Fx2, Fx3, Fx4, Fx5, FxAppend, NoFx, Row};
pub use run::{detach, run, run_pure, Monadic};
pub use union::Union;
pub use unions::{CollectedUnions, Unions};

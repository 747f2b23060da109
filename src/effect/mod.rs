//! The effect runtime: an open, type-indexed row of effects interpreted by a
//! single stack-safe trampoline.
//!
//! Everything lives under [`algebraic`]; this module exists as the stable
//! public path (`effrow::effect::algebraic::...`) independent of how the
//! implementation is split into files underneath it.

pub mod algebraic;

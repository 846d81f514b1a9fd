//! The derived-state engine.
//!
//! A [`State`] owns an expression, the cached value it last produced,
//! and a monitor listener attached to every observable the expression
//! read. Dependency edges are rewired on every replace and on every
//! recomputation, so conditional expressions track only the branch they
//! actually took.

mod state;

pub use state::State;

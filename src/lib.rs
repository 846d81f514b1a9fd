//! # Filament
//!
//! A fine-grained reactive properties library for Rust.
//!
//! Values are defined as expressions over other values; when an input
//! changes, every dependent recomputes and fires its new value, eagerly
//! and depth-first on the writing thread. Dependencies are discovered by
//! observing reads: while an expression runs, every state it reads
//! records itself, and the owning state keeps its subscription edges in
//! sync with what the expression actually read last time.
//!
//! ## Observables (multicast base)
//!
//! - [`Observable<T>`](Observable) - attach/detach listeners, one-shot
//!   and change-aware variants, distinct filtering
//! - [`Channel<T>`](Channel) - a write endpoint that fires values
//!   straight through
//!
//! ## Derived state
//!
//! - [`State<T>`](State) - a value derived from an expression,
//!   recomputed when any dependency fires
//! - [`Var<T>`](Var) - a state channel: a state that also accepts
//!   writes, either static values or new expressions (including
//!   self-referential ones)
//! - [`Binding`] - two-way synchronization between two vars with
//!   re-entry suppression

pub mod binding;
pub mod channel;
pub mod error;
pub mod observable;
pub mod runtime;
pub mod state;
pub mod var;

// Re-export main types for convenience
pub use binding::{BindSet, Binding};
pub use channel::Channel;
pub use error::ReactiveError;
pub use observable::{change_listener, FutureValue, Invocation, Listener, Observable};
pub use state::State;
pub use var::Var;

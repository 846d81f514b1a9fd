//! The multicast base: observables, listeners, and fire control.
//!
//! Everything reactive in this crate is built on [`Observable`]: channels
//! fire through it, states attach their monitors to it, and bindings are
//! pairs of listeners on it.

mod future;
mod invocation;
mod listener;
mod observable;

pub use future::FutureValue;
pub use invocation::Invocation;
pub use listener::{change_listener, Listener};
pub use observable::Observable;

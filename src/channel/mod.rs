//! Write endpoints.

mod channel;

pub use channel::Channel;

//! Two-way binding between vars.

mod binding;

pub use binding::{BindSet, Binding};

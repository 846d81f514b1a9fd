//! Runtime support for reactive primitives.
//!
//! This module provides the infrastructure for identity allocation,
//! implicit dependency capture, and the recursion slot used by
//! self-referential expressions.

mod context;

pub(crate) use context::{
    next_id, take_step, DependencyContext, DependencyRef, MonitorFn, RecursionScope,
};

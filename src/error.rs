use thiserror::Error;

/// Errors surfaced by the reactive core.
///
/// These indicate misuse of the evaluation machinery rather than user
/// failures. A panic raised by user code inside a listener or expression
/// is re-raised as a panic, not mapped into this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A capture set was requested while no dependency context is
    /// installed on the current thread.
    #[error("no dependency context is installed on this thread")]
    NoContext,

    /// An expression read its own state more times than the
    /// previous-function stack can supply.
    #[error("self-referential read exhausted the previous-function stack")]
    RecursionExhausted,
}

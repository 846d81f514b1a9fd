use std::fmt;
use std::ops::Deref;

use crate::binding::{BindSet, Binding};
use crate::state::State;

/// A state channel: a [`State`] that also accepts writes.
///
/// Writing a plain value with [`set`](Var::set) replaces the expression
/// with a pre-evaluated constant; [`define`](Var::define) replaces it
/// with a new expression that may read other observables, including the
/// var itself (resolved through the previous-function stack).
///
/// # Examples
///
/// ```
/// use filament::Var;
///
/// let count = Var::new(0);
/// count.define({
///     let count = count.clone();
///     move || count.get() + 1
/// });
/// assert_eq!(count.get(), 1);
/// ```
pub struct Var<T> {
    state: State<T>,
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Var<T> {
    /// A var holding a static value.
    pub fn new(value: T) -> Self {
        Self {
            state: State::new(move || value.clone()),
        }
    }

    /// A var whose initial contents are an expression over other
    /// observables.
    pub fn derived(function: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            state: State::new(function),
        }
    }

    /// A var with explicit duplicate-filtering and caching flags.
    pub fn with_options(value: T, distinct: bool, cache_enabled: bool) -> Self {
        Self {
            state: State::with_options(move || value.clone(), distinct, cache_enabled),
        }
    }

    /// Write a static value. The value is stored as-is; nothing on the
    /// right-hand side is re-evaluated or dependency-tracked.
    pub fn set(&self, value: T) {
        self.state.set_static(value);
    }

    /// Write a new expression; the var derives its value from it from
    /// now on.
    pub fn define(&self, function: impl Fn() -> T + Send + Sync + 'static) {
        self.state.replace(function);
    }

    /// Two-way link with `that`, with the initial synchronization
    /// direction chosen by `set_now`. The returned [`Binding`] detaches
    /// both listeners.
    pub fn bind(&self, that: &Var<T>, set_now: BindSet) -> Binding<T, T> {
        Binding::between(self, that, set_now)
    }

    /// Two-way link between vars of different types, converting in both
    /// directions.
    pub fn bind_map<U>(
        &self,
        that: &Var<U>,
        set_now: BindSet,
        to_that: impl Fn(&T) -> U + Send + Sync + 'static,
        to_this: impl Fn(&U) -> T + Send + Sync + 'static,
    ) -> Binding<T, U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
    {
        Binding::mapped(self, that, set_now, to_that, to_this)
    }
}

impl<T> Clone for Var<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Deref for Var<T> {
    type Target = State<T>;

    fn deref(&self) -> &Self::Target {
        &self.state
    }
}

impl<T> fmt::Debug for Var<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_get() {
        let value = Var::new(0);
        assert_eq!(value.get(), 0);

        value.set(42);
        assert_eq!(value.get(), 42);
    }

    #[test]
    fn define_derives_from_other_vars() {
        let base = Var::new(10);
        let value = Var::new(0);

        value.define({
            let base = base.clone();
            move || base.get() * 2
        });
        assert_eq!(value.get(), 20);

        base.set(50);
        assert_eq!(value.get(), 100);
    }

    #[test]
    fn set_overrides_a_definition() {
        let base = Var::new(1);
        let value = Var::derived({
            let base = base.clone();
            move || base.get() + 1
        });
        assert_eq!(value.get(), 2);

        value.set(7);
        assert_eq!(value.get(), 7);

        // The old dependency is gone: base no longer drives value.
        base.set(100);
        assert_eq!(value.get(), 7);
        assert!(value.observing().is_empty());
    }
}

use std::fmt;
use std::ops::Deref;

use crate::observable::Observable;

/// A write endpoint: no stored state, every write fires straight through
/// to the listeners.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use filament::Channel;
///
/// let clicks = Channel::new();
/// let last = Arc::new(AtomicI32::new(0));
/// let last_clone = Arc::clone(&last);
/// clicks.attach(move |value: &i32| {
///     last_clone.store(*value, Ordering::SeqCst);
/// });
///
/// clicks.set(7);
/// assert_eq!(last.load(Ordering::SeqCst), 7);
/// ```
pub struct Channel<T> {
    observable: Observable<T>,
}

impl<T: Send + Sync + 'static> Channel<T> {
    pub fn new() -> Self {
        Self {
            observable: Observable::new(),
        }
    }

    /// Fire `value` to all listeners. Nothing is stored; a channel has
    /// no value to read.
    pub fn set(&self, value: T) {
        self.observable.fire(&value);
    }
}

impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            observable: self.observable.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Channel<T> {
    type Target = Observable<T>;

    fn deref(&self) -> &Self::Target {
        &self.observable
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").finish_non_exhaustive()
    }
}

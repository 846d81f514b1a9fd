use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::Invocation;
use crate::runtime;

type ListenerFn<T> = Arc<dyn Fn(&T, &Invocation) + Send + Sync>;

/// An identity-bearing callable attached to an [`Observable`].
///
/// Identity is a unique id assigned at construction, so two listeners
/// built from the same closure are still distinct. The listener returned
/// by the attach methods doubles as the detach handle.
///
/// [`Observable`]: super::Observable
pub struct Listener<T> {
    id: usize,
    f: ListenerFn<T>,
}

impl<T> Listener<T> {
    /// Wrap a function receiving the fired value and the invocation
    /// token of the current fire.
    pub fn new(f: impl Fn(&T, &Invocation) + Send + Sync + 'static) -> Self {
        Self::with_id(runtime::next_id(), f)
    }

    pub(crate) fn with_id(id: usize, f: impl Fn(&T, &Invocation) + Send + Sync + 'static) -> Self {
        Self { id, f: Arc::new(f) }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn invoke(&self, value: &T, invocation: &Invocation) {
        (self.f)(value, invocation);
    }
}

impl<T> Clone for Listener<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            f: Arc::clone(&self.f),
        }
    }
}

impl<T> fmt::Debug for Listener<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener").field("id", &self.id).finish()
    }
}

/// Build a listener that tracks the previously fired value and hands
/// `(previous, current)` pairs to `f`.
///
/// The previous slot is absent on the first fire, so the first delivery
/// is `(None, value)`.
pub fn change_listener<T, F>(f: F) -> Listener<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Option<&T>, &T) + Send + Sync + 'static,
{
    let previous: Mutex<Option<T>> = Mutex::new(None);
    Listener::new(move |value: &T, _invocation| {
        let old = {
            let mut slot = previous.lock();
            let old = slot.take();
            *slot = Some(value.clone());
            old
        };
        f(old.as_ref(), value);
    })
}

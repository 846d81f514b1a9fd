use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{change_listener, FutureValue, Invocation, Listener};
use crate::runtime::{self, DependencyRef, MonitorFn};

/// A node that multicasts fired values to attached listeners.
///
/// Listeners are invoked in attachment order; each fire iterates over the
/// snapshot of listeners taken at fire entry, so listeners may attach or
/// detach during a fire without affecting the current delivery. Clones
/// share the node.
pub struct Observable<T> {
    inner: Arc<ObservableInner<T>>,
}

struct ObservableInner<T> {
    id: usize,
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Send + Sync + 'static> Observable<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                id: runtime::next_id(),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Stable identity of this node.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Attach a function listener. The returned listener is the handle
    /// to [`detach`](Observable::detach) with.
    pub fn attach(&self, f: impl Fn(&T) + Send + Sync + 'static) -> Listener<T> {
        let listener = Listener::new(move |value: &T, _invocation: &Invocation| f(value));
        self.observe(listener.clone());
        listener
    }

    /// Add an existing listener. Listeners are stored in insertion order.
    pub fn observe(&self, listener: Listener<T>) {
        self.inner.listeners.lock().push(listener);
    }

    /// Remove a listener by identity. No-op when it is not attached.
    pub fn detach(&self, listener: &Listener<T>) {
        self.inner.detach_id(listener.id());
    }

    /// Attach a listener that ignores the fired value.
    pub fn on(&self, body: impl Fn() + Send + Sync + 'static) -> Listener<T> {
        self.attach(move |_| body())
    }

    /// Attach a listener that detaches itself on the first fire, before
    /// its body runs.
    pub fn once(&self, f: impl FnOnce(&T) + Send + Sync + 'static) -> Listener<T> {
        self.once_when(|_| true, f)
    }

    /// Like [`once`](Observable::once), but only a fire for which
    /// `condition` holds triggers (and detaches) the listener.
    pub fn once_when(
        &self,
        condition: impl Fn(&T) -> bool + Send + Sync + 'static,
        f: impl FnOnce(&T) + Send + Sync + 'static,
    ) -> Listener<T> {
        let id = runtime::next_id();
        let weak = Arc::downgrade(&self.inner);
        let body = Mutex::new(Some(f));
        let listener = Listener::with_id(id, move |value: &T, _invocation: &Invocation| {
            if !condition(value) {
                return;
            }
            // Detach before the body runs, so a re-entrant fire from the
            // body cannot reach this listener again.
            if let Some(inner) = weak.upgrade() {
                inner.detach_id(id);
            }
            let body = body.lock().take();
            if let Some(body) = body {
                body(value);
            }
        });
        self.observe(listener.clone());
        listener
    }

    /// Attach a change listener receiving `(previous, current)` pairs.
    /// The first fire is delivered with no previous value.
    pub fn changes(&self, f: impl Fn(Option<&T>, &T) + Send + Sync + 'static) -> Listener<T>
    where
        T: Clone,
    {
        let listener = change_listener(f);
        self.observe(listener.clone());
        listener
    }

    /// One-shot completion token resolved by the next fire satisfying
    /// `condition`.
    pub fn future(&self, condition: impl Fn(&T) -> bool + Send + Sync + 'static) -> FutureValue<T>
    where
        T: Clone,
    {
        let future = FutureValue::new();
        let resolve = future.clone();
        self.once_when(condition, move |value| resolve.resolve(value.clone()));
        future
    }

    /// Derived observable that suppresses consecutive duplicate values.
    pub fn distinct(&self) -> Observable<T>
    where
        T: Clone + PartialEq,
    {
        let derived = Observable::new();
        let downstream = derived.clone();
        let last: Mutex<Option<T>> = Mutex::new(None);
        self.attach(move |value| {
            let changed = {
                let mut last = last.lock();
                if last.as_ref() == Some(value) {
                    false
                } else {
                    *last = Some(value.clone());
                    true
                }
            };
            if changed {
                downstream.fire(value);
            }
        });
        derived
    }

    /// Remove every listener.
    pub fn clear(&self) {
        self.inner.listeners.lock().clear();
    }

    /// Remove every listener. Infallible and idempotent.
    pub fn dispose(&self) {
        self.clear();
    }

    /// Deliver `value` to every listener attached at the moment of the
    /// call, in attachment order, sharing one [`Invocation`].
    ///
    /// A panicking listener does not rob the remaining listeners of the
    /// fire; the first panic payload is resumed after the snapshot is
    /// exhausted.
    pub(crate) fn fire(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self.inner.listeners.lock().clone();
        let invocation = Invocation::new();
        let mut panic: Option<Box<dyn Any + Send>> = None;
        for listener in &snapshot {
            if invocation.is_stopped() {
                break;
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| listener.invoke(value, &invocation)));
            if let Err(payload) = outcome {
                panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = panic {
            resume_unwind(payload);
        }
    }

    /// Type-erased handle for recording this node in a dependency
    /// context and wiring monitors to it.
    pub(crate) fn as_dependency(&self) -> DependencyRef {
        let attach_target = Arc::clone(&self.inner);
        let detach_target = Arc::clone(&self.inner);
        DependencyRef::new(
            self.inner.id,
            Arc::new(move |monitor: MonitorFn| {
                let listener =
                    Listener::new(move |_value: &T, _invocation: &Invocation| monitor());
                let id = listener.id();
                attach_target.listeners.lock().push(listener);
                id
            }),
            Arc::new(move |listener_id| detach_target.detach_id(listener_id)),
        )
    }
}

impl<T: Send + Sync + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.inner.id)
            .field("listeners", &self.inner.listeners.lock().len())
            .finish()
    }
}

impl<T> ObservableInner<T> {
    fn detach_id(&self, id: usize) {
        self.listeners.lock().retain(|listener| listener.id() != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn listeners_fire_in_attachment_order() {
        let observable = Observable::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&order);
        observable.attach(move |_: &i32| first.lock().push("first"));
        let second = Arc::clone(&order);
        observable.attach(move |_: &i32| second.lock().push("second"));

        observable.fire(&0);
        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn detach_is_idempotent() {
        let observable: Observable<i32> = Observable::new();
        let attached = observable.attach(|_| {});
        let never_attached: Listener<i32> = Listener::new(|_, _| {});

        observable.detach(&never_attached);
        observable.detach(&attached);
        observable.detach(&attached);

        observable.fire(&0);
    }

    #[test]
    fn stop_halts_later_listeners() {
        let observable: Observable<i32> = Observable::new();
        let count = Arc::new(AtomicUsize::new(0));

        observable.observe(Listener::new(|_, invocation: &Invocation| {
            invocation.stop();
        }));
        let count_clone = Arc::clone(&count);
        observable.attach(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        observable.fire(&0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn once_detaches_before_body() {
        let observable: Observable<i32> = Observable::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        let refire = observable.clone();
        observable.once(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            // Firing again from the body must not re-enter this listener.
            refire.fire(&1);
        });

        observable.fire(&0);
        observable.fire(&2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_when_waits_for_condition() {
        let observable: Observable<i32> = Observable::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        observable.once_when(|value| *value > 2, move |value| seen_clone.lock().push(*value));

        observable.fire(&1);
        observable.fire(&3);
        observable.fire(&4);
        assert_eq!(*seen.lock(), vec![3]);
    }

    #[test]
    fn changes_delivers_old_new_pairs() {
        let observable = Observable::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        observable.changes(move |old: Option<&i32>, new: &i32| {
            seen_clone.lock().push((old.copied(), *new));
        });

        observable.fire(&1);
        observable.fire(&2);
        assert_eq!(*seen.lock(), vec![(None, 1), (Some(1), 2)]);
    }

    #[test]
    fn future_resolves_on_matching_fire() {
        let observable = Observable::new();
        let future = observable.future(|value: &i32| *value > 10);

        observable.fire(&5);
        assert!(!future.is_resolved());

        observable.fire(&11);
        observable.fire(&12);
        assert_eq!(future.value(), Some(11));
    }

    #[test]
    fn distinct_filters_consecutive_duplicates() {
        let observable = Observable::new();
        let filtered = observable.distinct();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let seen_clone = Arc::clone(&seen);
        filtered.attach(move |value: &i32| seen_clone.lock().push(*value));

        observable.fire(&1);
        observable.fire(&1);
        observable.fire(&2);
        observable.fire(&1);
        assert_eq!(*seen.lock(), vec![1, 2, 1]);
    }

    #[test]
    fn panicking_listener_does_not_block_later_ones() {
        let observable: Observable<i32> = Observable::new();
        let count = Arc::new(AtomicUsize::new(0));

        observable.attach(|_| panic!("listener failure"));
        let count_clone = Arc::clone(&count);
        observable.attach(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = catch_unwind(AssertUnwindSafe(|| observable.fire(&0)));
        assert!(outcome.is_err());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mutation_during_fire_uses_entry_snapshot() {
        let observable: Observable<i32> = Observable::new();
        let count = Arc::new(AtomicUsize::new(0));

        let late = Arc::clone(&count);
        let target = observable.clone();
        observable.attach(move |_| {
            let late = Arc::clone(&late);
            // Attached mid-fire: must not run during this delivery.
            target.attach(move |_| {
                late.fetch_add(1, Ordering::SeqCst);
            });
        });

        observable.fire(&0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        observable.fire(&0);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clear_removes_all_listeners() {
        let observable: Observable<i32> = Observable::new();
        let count = Arc::new(AtomicUsize::new(0));

        let count_clone = Arc::clone(&count);
        observable.attach(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        observable.clear();

        observable.fire(&0);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}

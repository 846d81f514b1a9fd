use std::collections::{HashMap, HashSet};
use std::ops::Deref;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::ReactiveError;
use crate::observable::Observable;
use crate::runtime::{self, DependencyContext, DependencyRef, RecursionScope};

type Expr<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// One entry of the previous-function stack. Entries link to older ones,
/// so the stack survives repeated self-referential replaces.
struct PrevFunction<T> {
    function: Expr<T>,
    previous: Option<Arc<PrevFunction<T>>>,
}

struct StateData<T> {
    function: Expr<T>,
    previous: Option<Arc<PrevFunction<T>>>,
    // None only while the initial evaluation is still running.
    cached: Option<T>,
}

struct DependencyEdge {
    dependency: DependencyRef,
    monitor_id: usize,
}

struct StateInner<T> {
    observable: Observable<T>,
    data: Mutex<StateData<T>>,
    edges: Mutex<HashMap<usize, DependencyEdge>>,
    // Serializes replace/set on this node.
    write_lock: Mutex<()>,
    monitor: Arc<dyn Fn() + Send + Sync>,
    distinct: bool,
    cache_enabled: bool,
}

/// A value derived from an expression over other observables.
///
/// Dependencies are discovered implicitly: while the expression runs,
/// every [`State`] read records itself, and the state attaches a private
/// monitor to each recorded node. When any dependency fires, the state
/// re-evaluates, rewires its dependencies, and fires its own new value
/// downstream.
///
/// Duplicate filtering (`distinct`) compares values with `PartialEq`.
///
/// # Examples
///
/// ```
/// use filament::{State, Var};
///
/// let price = Var::new(10);
/// let tax = Var::new(2);
/// let total = State::new({
///     let price = price.clone();
///     let tax = tax.clone();
///     move || price.get() + tax.get()
/// });
/// assert_eq!(total.get(), 12);
///
/// price.set(20);
/// assert_eq!(total.get(), 22);
/// ```
pub struct State<T> {
    inner: Arc<StateInner<T>>,
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> State<T> {
    /// Create a derived state with duplicate filtering off and caching
    /// on.
    pub fn new(function: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::with_options(function, false, true)
    }

    /// Create a derived state choosing the duplicate-filtering and
    /// caching behavior.
    ///
    /// With `cache_enabled` off, every read re-evaluates the expression.
    pub fn with_options(
        function: impl Fn() -> T + Send + Sync + 'static,
        distinct: bool,
        cache_enabled: bool,
    ) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<StateInner<T>>| {
            let weak = weak.clone();
            StateInner {
                observable: Observable::new(),
                data: Mutex::new(StateData {
                    function: Arc::new(function),
                    previous: None,
                    cached: None,
                }),
                edges: Mutex::new(HashMap::new()),
                write_lock: Mutex::new(()),
                monitor: Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        StateInner::on_dependency_fired(&inner);
                    }
                }),
                distinct,
                cache_enabled,
            }
        });

        // The initial evaluation wires dependencies but does not fire.
        let (value, reads) = StateInner::evaluate_capturing(&inner);
        StateInner::rewire(&inner, reads);
        inner.data.lock().cached = Some(value);

        Self { inner }
    }

    /// Current value.
    ///
    /// Registers this state in any enclosing dependency capture, so an
    /// expression that calls `get` depends on this state.
    ///
    /// # Panics
    ///
    /// Panics when a self-referential read exhausts the
    /// previous-function stack; [`try_get`](State::try_get) is the
    /// fallible form.
    pub fn get(&self) -> T {
        match self.try_get() {
            Ok(value) => value,
            Err(err) => panic!("state read failed: {err}"),
        }
    }

    /// Alias of [`get`](State::get) for property-style call sites.
    pub fn value(&self) -> T {
        self.get()
    }

    pub fn try_get(&self) -> Result<T, ReactiveError> {
        StateInner::read(&self.inner)
    }

    /// Replace the expression. The new expression is evaluated once to
    /// capture its dependencies; the old expression is pushed onto the
    /// previous-function stack so the new one may read `self` through it.
    pub fn replace(&self, function: impl Fn() -> T + Send + Sync + 'static) {
        StateInner::replace_function(&self.inner, Arc::new(function));
    }

    /// Replace the expression with a pre-evaluated constant.
    ///
    /// The value is captured here, so nothing on the right-hand side is
    /// re-evaluated or dependency-tracked afterwards.
    pub fn set_static(&self, value: T) {
        StateInner::replace_function(&self.inner, Arc::new(move || value.clone()));
    }

    /// Ids of the observables the current expression reads, excluding
    /// this state itself.
    pub fn observing(&self) -> HashSet<usize> {
        self.inner.edges.lock().keys().copied().collect()
    }

    /// Detach every listener and drop every dependency edge.
    /// Infallible and idempotent.
    pub fn dispose(&self) {
        let drained: Vec<DependencyEdge> = {
            let mut edges = self.inner.edges.lock();
            edges.drain().map(|(_, edge)| edge).collect()
        };
        for edge in drained {
            edge.dependency.detach_monitor(edge.monitor_id);
        }
        self.inner.observable.dispose();
        trace!(node = self.inner.observable.id(), "state disposed");
    }
}

impl<T> Deref for State<T> {
    type Target = Observable<T>;

    fn deref(&self) -> &Self::Target {
        &self.inner.observable
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> StateInner<T> {
    /// A read from user code or from an enclosing evaluation.
    fn read(inner: &Arc<Self>) -> Result<T, ReactiveError> {
        DependencyContext::reference(inner.observable.as_dependency());

        // A read of `self` inside its own evaluation resolves one step
        // up the previous-function stack instead of recursing.
        if let Some(depth) = runtime::take_step(inner.observable.id()) {
            let function = {
                let data = inner.data.lock();
                let mut node = data.previous.clone();
                for _ in 0..depth {
                    node = node.and_then(|entry| entry.previous.clone());
                }
                node.map(|entry| Arc::clone(&entry.function))
            };
            return match function {
                Some(function) => Ok(function()),
                None => Err(ReactiveError::RecursionExhausted),
            };
        }

        if inner.cache_enabled {
            if let Some(value) = inner.data.lock().cached.clone() {
                return Ok(value);
            }
        }

        Ok(Self::evaluate(inner))
    }

    /// Run the current expression with this node's recursion frame
    /// installed. Does not touch the cache.
    fn evaluate(inner: &Arc<Self>) -> T {
        let function = inner.data.lock().function.clone();
        let _scope = RecursionScope::enter(inner.observable.id());
        function()
    }

    /// Evaluate under a fresh dependency context and return the value
    /// together with every observable read on the way.
    fn evaluate_capturing(inner: &Arc<Self>) -> (T, HashSet<DependencyRef>) {
        let scope = DependencyContext::push();
        let value = Self::evaluate(inner);
        let reads = scope.finish().unwrap_or_default();
        (value, reads)
    }

    /// Diff `reads` against the current edges: detach the monitor from
    /// dropped dependencies, attach it to new ones. Reads of `self` are
    /// discarded here.
    fn rewire(inner: &Arc<Self>, mut reads: HashSet<DependencyRef>) {
        let self_id = inner.observable.id();
        reads.retain(|dep| dep.id() != self_id);

        let keep: HashSet<usize> = reads.iter().map(|dep| dep.id()).collect();
        let mut added = 0;
        let mut removed = 0;

        let mut edges = inner.edges.lock();
        edges.retain(|id, edge| {
            if keep.contains(id) {
                return true;
            }
            edge.dependency.detach_monitor(edge.monitor_id);
            removed += 1;
            false
        });
        for dep in reads {
            if !edges.contains_key(&dep.id()) {
                let monitor_id = dep.attach_monitor(Arc::clone(&inner.monitor));
                edges.insert(dep.id(), DependencyEdge {
                    dependency: dep,
                    monitor_id,
                });
                added += 1;
            }
        }
        drop(edges);

        if added + removed > 0 {
            trace!(node = self_id, added, removed, "rewired dependencies");
        }
    }

    /// Monitor body: a dependency fired, so re-evaluate, rewire (the
    /// expression may read different nodes this time), and push the new
    /// value downstream.
    fn on_dependency_fired(inner: &Arc<Self>) {
        let (value, reads) = Self::evaluate_capturing(inner);
        Self::rewire(inner, reads);
        Self::update_value(inner, value);
    }

    /// Store `value` and fire it, unless distinct filtering suppresses
    /// the update.
    fn update_value(inner: &Arc<Self>, value: T) {
        let changed = {
            let mut data = inner.data.lock();
            if inner.distinct && data.cached.as_ref() == Some(&value) {
                false
            } else {
                data.cached = Some(value.clone());
                true
            }
        };
        if changed {
            inner.observable.fire(&value);
        }
    }

    fn replace_function(inner: &Arc<Self>, function: Expr<T>) {
        let guard = inner.write_lock.lock();

        {
            let mut data = inner.data.lock();
            let old = std::mem::replace(&mut data.function, function);
            let previous = data.previous.take();
            data.previous = Some(Arc::new(PrevFunction {
                function: old,
                previous,
            }));
        }

        let (value, reads) = Self::evaluate_capturing(inner);

        // Keep the previous-function stack only for self-referential
        // expressions.
        let recursive = reads.iter().any(|dep| dep.id() == inner.observable.id());
        if !recursive {
            inner.data.lock().previous = None;
        }

        Self::rewire(inner, reads);
        drop(guard);

        Self::update_value(inner, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::var::Var;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn derives_from_dependencies() {
        let a = Var::new(2);
        let b = Var::new(3);
        let sum = State::new({
            let a = a.clone();
            let b = b.clone();
            move || a.get() + b.get()
        });

        assert_eq!(sum.get(), 5);

        a.set(10);
        assert_eq!(sum.get(), 13);
    }

    #[test]
    fn observing_excludes_self() {
        let a = Var::new(1);
        let doubled = State::new({
            let a = a.clone();
            move || a.get() * 2
        });

        let observing = doubled.observing();
        assert_eq!(observing.len(), 1);
        assert!(observing.contains(&a.id()));
        assert!(!observing.contains(&doubled.id()));
    }

    #[test]
    fn replace_rewires_dependencies() {
        let a = Var::new(1);
        let b = Var::new(10);
        let state = State::new({
            let a = a.clone();
            move || a.get()
        });
        assert!(state.observing().contains(&a.id()));

        state.replace({
            let b = b.clone();
            move || b.get()
        });
        let observing = state.observing();
        assert!(!observing.contains(&a.id()));
        assert!(observing.contains(&b.id()));

        // The dropped dependency must not trigger recomputation.
        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = Arc::clone(&fires);
        state.on(move || {
            fires_clone.fetch_add(1, Ordering::SeqCst);
        });
        a.set(100);
        assert_eq!(fires.load(Ordering::SeqCst), 0);
        assert_eq!(state.get(), 10);
    }

    #[test]
    fn distinct_suppresses_equal_values() {
        let input = Var::new(1);
        let parity = State::with_options(
            {
                let input = input.clone();
                move || input.get() % 2
            },
            true,
            true,
        );

        let fires = Arc::new(AtomicUsize::new(0));
        let fires_clone = Arc::clone(&fires);
        parity.on(move || {
            fires_clone.fetch_add(1, Ordering::SeqCst);
        });

        input.set(3);
        assert_eq!(fires.load(Ordering::SeqCst), 0);

        input.set(4);
        assert_eq!(fires.load(Ordering::SeqCst), 1);
        assert_eq!(parity.get(), 0);
    }

    #[test]
    fn uncached_state_reevaluates_every_read() {
        let evaluations = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&evaluations);
        let state = State::with_options(
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                42
            },
            false,
            false,
        );

        let initial = evaluations.load(Ordering::SeqCst);
        state.get();
        state.get();
        assert_eq!(evaluations.load(Ordering::SeqCst), initial + 2);
    }

    #[test]
    fn self_reference_uses_previous_function() {
        let value = Var::new(0);
        value.define({
            let value = value.clone();
            move || value.get() + 1
        });

        assert_eq!(value.get(), 1);
        // Self is not a dependency of itself.
        assert!(value.observing().is_empty());
    }

    #[test]
    fn repeated_self_referential_replace_walks_the_stack() {
        let value = Var::new(1);
        value.define({
            let value = value.clone();
            move || value.get() * 10
        });
        assert_eq!(value.get(), 10);

        value.define({
            let value = value.clone();
            move || value.get() + 5
        });
        assert_eq!(value.get(), 15);
    }

    #[test]
    fn dispose_detaches_monitor_from_dependencies() {
        let a = Var::new(1);
        let evaluations = Arc::new(AtomicUsize::new(0));
        let derived = State::new({
            let a = a.clone();
            let evaluations = Arc::clone(&evaluations);
            move || {
                evaluations.fetch_add(1, Ordering::SeqCst);
                a.get() + 1
            }
        });

        derived.dispose();
        assert!(derived.observing().is_empty());

        let before = evaluations.load(Ordering::SeqCst);
        a.set(5);
        assert_eq!(evaluations.load(Ordering::SeqCst), before);
    }

    #[test]
    fn conditional_read_tracks_only_taken_branch() {
        let n = Var::new(0);
        let m = Var::new(100);
        let d = State::new({
            let n = n.clone();
            let m = m.clone();
            move || if n.get() < 3 { n.get() } else { m.get() }
        });

        assert!(d.observing().contains(&n.id()));
        assert!(!d.observing().contains(&m.id()));

        n.set(5);
        assert_eq!(d.get(), 100);
        assert!(d.observing().contains(&m.id()));

        n.set(2);
        assert_eq!(d.get(), 2);
        assert!(!d.observing().contains(&m.id()));
    }
}

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::ReactiveError;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

/// Allocate a process-unique id for a node or listener.
pub(crate) fn next_id() -> usize {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

pub(crate) type MonitorFn = Arc<dyn Fn() + Send + Sync>;

/// Type-erased handle to an observable recorded as a dependency.
///
/// Carries the node's identity plus the two operations the state engine
/// needs on a dependency of any value type: attaching a monitor and
/// detaching it again by listener id.
pub(crate) struct DependencyRef {
    id: usize,
    attach: Arc<dyn Fn(MonitorFn) -> usize + Send + Sync>,
    detach: Arc<dyn Fn(usize) + Send + Sync>,
}

impl DependencyRef {
    pub(crate) fn new(
        id: usize,
        attach: Arc<dyn Fn(MonitorFn) -> usize + Send + Sync>,
        detach: Arc<dyn Fn(usize) + Send + Sync>,
    ) -> Self {
        Self { id, attach, detach }
    }

    pub(crate) fn id(&self) -> usize {
        self.id
    }

    /// Attach `monitor` as a listener on the underlying observable and
    /// return the listener id to detach with later.
    pub(crate) fn attach_monitor(&self, monitor: MonitorFn) -> usize {
        (self.attach)(monitor)
    }

    pub(crate) fn detach_monitor(&self, listener_id: usize) {
        (self.detach)(listener_id);
    }
}

impl Clone for DependencyRef {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            attach: Arc::clone(&self.attach),
            detach: Arc::clone(&self.detach),
        }
    }
}

impl PartialEq for DependencyRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DependencyRef {}

impl Hash for DependencyRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyRef").field("id", &self.id).finish()
    }
}

thread_local! {
    // Stack of capture sets; the innermost set records reads.
    static CAPTURE: RefCell<Vec<HashSet<DependencyRef>>> = const { RefCell::new(Vec::new()) };
    // At most one recursion frame is active per thread at a time.
    static RECURSION: RefCell<Option<RecursionFrame>> = const { RefCell::new(None) };
}

/// Thread-local dependency capture.
///
/// A state evaluation installs a fresh capture set; every observable read
/// during the evaluation records itself into the innermost set. Without
/// an installed set, reads are not tracked.
pub(crate) struct DependencyContext;

impl DependencyContext {
    /// Install a fresh capture set. The returned scope pops it again,
    /// also on unwind.
    pub(crate) fn push() -> CaptureScope {
        CAPTURE.with(|stack| stack.borrow_mut().push(HashSet::new()));
        CaptureScope { finished: false }
    }

    /// Record a read of `dep` in the innermost capture set, if any.
    pub(crate) fn reference(dep: DependencyRef) {
        CAPTURE.with(|stack| {
            if let Some(set) = stack.borrow_mut().last_mut() {
                set.insert(dep);
            }
        });
    }

    fn pop() -> Result<HashSet<DependencyRef>, ReactiveError> {
        CAPTURE.with(|stack| stack.borrow_mut().pop().ok_or(ReactiveError::NoContext))
    }
}

/// Guard for one installed capture set.
///
/// [`finish`](CaptureScope::finish) pops the set and hands back everything
/// referenced while it was active; dropping the scope without finishing
/// (an unwinding evaluation) pops it silently.
pub(crate) struct CaptureScope {
    finished: bool,
}

impl CaptureScope {
    pub(crate) fn finish(mut self) -> Result<HashSet<DependencyRef>, ReactiveError> {
        self.finished = true;
        DependencyContext::pop()
    }
}

impl Drop for CaptureScope {
    fn drop(&mut self) {
        if !self.finished {
            let _ = DependencyContext::pop();
        }
    }
}

struct RecursionFrame {
    owner: usize,
    consumed: usize,
}

/// Installed around a state evaluation so reads of the owning state can
/// resolve one step up its previous-function stack instead of recursing.
/// The caller's frame is restored on every exit path.
pub(crate) struct RecursionScope {
    saved: Option<RecursionFrame>,
}

impl RecursionScope {
    pub(crate) fn enter(owner: usize) -> Self {
        let frame = RecursionFrame { owner, consumed: 0 };
        let saved = RECURSION.with(|slot| slot.borrow_mut().replace(frame));
        Self { saved }
    }
}

impl Drop for RecursionScope {
    fn drop(&mut self) {
        let saved = self.saved.take();
        RECURSION.with(|slot| *slot.borrow_mut() = saved);
    }
}

/// Consume one previous-function step for `owner`.
///
/// `Some(depth)` tells the owning state which entry of its
/// previous-function stack to evaluate; consecutive self-reads within one
/// evaluation walk deeper. `None` means no frame for `owner` is active on
/// this thread and the read is an ordinary one.
pub(crate) fn take_step(owner: usize) -> Option<usize> {
    RECURSION.with(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_mut() {
            Some(frame) if frame.owner == owner => {
                let depth = frame.consumed;
                frame.consumed += 1;
                Some(depth)
            }
            _ => None,
        }
    })
}

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::observable::Listener;
use crate::var::Var;

/// Which direction to synchronize when a binding is established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindSet {
    /// Copy the left value into the right var on bind.
    LeftToRight,
    /// Copy the right value into the left var on bind.
    RightToLeft,
    /// Leave both sides untouched.
    None,
}

/// Two-way link between two vars.
///
/// Holds both listener handles; [`detach`](Binding::detach) removes
/// both. The shared changing flag keeps a write on one side from
/// ping-ponging back: the symmetric listener sees the flag set and does
/// nothing, so each outer write triggers exactly one write on the other
/// side.
pub struct Binding<L, R> {
    left: Var<L>,
    right: Var<R>,
    left_listener: Listener<L>,
    right_listener: Listener<R>,
}

impl<L, R> Binding<L, R>
where
    L: Clone + PartialEq + Send + Sync + 'static,
    R: Clone + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn mapped(
        left: &Var<L>,
        right: &Var<R>,
        set_now: BindSet,
        to_right: impl Fn(&L) -> R + Send + Sync + 'static,
        to_left: impl Fn(&R) -> L + Send + Sync + 'static,
    ) -> Self {
        // Initial synchronization happens before the listeners exist, so
        // it needs no guard.
        match set_now {
            BindSet::LeftToRight => right.set(to_right(&left.get())),
            BindSet::RightToLeft => left.set(to_left(&right.get())),
            BindSet::None => {}
        }

        let changing = Arc::new(AtomicBool::new(false));

        let left_listener = {
            let flag = Arc::clone(&changing);
            let target = right.clone();
            left.attach(move |value: &L| {
                if let Some(_guard) = ChangeGuard::acquire(&flag) {
                    target.set(to_right(value));
                }
            })
        };
        let right_listener = {
            let flag = Arc::clone(&changing);
            let target = left.clone();
            right.attach(move |value: &R| {
                if let Some(_guard) = ChangeGuard::acquire(&flag) {
                    target.set(to_left(value));
                }
            })
        };

        trace!(left = left.id(), right = right.id(), "binding established");

        Self {
            left: left.clone(),
            right: right.clone(),
            left_listener,
            right_listener,
        }
    }

    /// Remove both listeners; the vars stay independent afterwards.
    /// Idempotent.
    pub fn detach(&self) {
        self.left.detach(&self.left_listener);
        self.right.detach(&self.right_listener);
        trace!(
            left = self.left.id(),
            right = self.right.id(),
            "binding detached"
        );
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> Binding<T, T> {
    pub(crate) fn between(left: &Var<T>, right: &Var<T>, set_now: BindSet) -> Self {
        Self::mapped(
            left,
            right,
            set_now,
            |value| value.clone(),
            |value| value.clone(),
        )
    }
}

/// Compare-and-swap guard around one propagation; resets the flag when
/// dropped, so a panicking write cannot leave the binding blocked.
struct ChangeGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ChangeGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
            .then(|| Self { flag })
    }
}

impl Drop for ChangeGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

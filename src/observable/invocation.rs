use std::sync::atomic::{AtomicBool, Ordering};

/// Per-fire control token shared by every listener of a single fire.
///
/// A listener may call [`stop`](Invocation::stop) to skip delivery to the
/// listeners attached after it. Tokens are not shared across fires.
#[derive(Debug, Default)]
pub struct Invocation {
    stopped: AtomicBool,
}

impl Invocation {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
        }
    }

    /// Halt delivery to the remaining listeners of this fire.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Return the token to its unstopped state for reuse.
    pub fn reset(&self) {
        self.stopped.store(false, Ordering::SeqCst);
    }
}

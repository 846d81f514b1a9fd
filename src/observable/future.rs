use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::sync::Arc;

use parking_lot::Mutex;

/// One-shot completion token resolved by a matching fire.
///
/// Returned by [`Observable::future`]; can be polled synchronously with
/// [`value`](FutureValue::value) or awaited as a [`std::future::Future`].
/// Only the first matching fire resolves the token.
///
/// [`Observable::future`]: super::Observable::future
pub struct FutureValue<T> {
    inner: Arc<Mutex<FutureState<T>>>,
}

struct FutureState<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

impl<T> Clone for FutureValue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> FutureValue<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FutureState {
                value: None,
                waker: None,
            })),
        }
    }

    pub(crate) fn resolve(&self, value: T) {
        let waker = {
            let mut state = self.inner.lock();
            if state.value.is_some() {
                return;
            }
            state.value = Some(value);
            state.waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// The resolved value, if the matching fire has happened.
    pub fn value(&self) -> Option<T> {
        self.inner.lock().value.clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.lock().value.is_some()
    }
}

impl<T: Clone> Future for FutureValue<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.inner.lock();
        match state.value.clone() {
            Some(value) => Poll::Ready(value),
            None => {
                state.waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }
}

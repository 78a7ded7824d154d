use crate::call::{CallHandle, Outcome};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

/// Future-style view of a submitted call.
///
/// Can be awaited on any executor, or queried and waited on synchronously.
#[derive(Debug)]
pub struct CallFuture<Z: Clone + Send + 'static> {
    handle: CallHandle<Z>,
    waker_slot: Option<usize>,
}

impl<Z: Clone + Send + 'static> CallFuture<Z> {
    pub(crate) fn new(handle: CallHandle<Z>) -> Self {
        Self {
            handle,
            waker_slot: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_done()
    }

    /// Block until the outcome is available
    pub fn get(&self) -> Outcome<Z> {
        self.handle.wait()
    }

    /// Block for at most `timeout`; see [`CallHandle::wait_timeout`]
    pub fn get_timeout(&self, timeout: Duration) -> Outcome<Z> {
        self.handle.wait_timeout(timeout)
    }

    pub fn handle(&self) -> &CallHandle<Z> {
        &self.handle
    }
}

impl<Z: Clone + Send + 'static> Future for CallFuture<Z> {
    type Output = Outcome<Z>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        this.handle.completion.poll_value(cx, &mut this.waker_slot)
    }
}

impl<Z: Clone + Send + 'static> Clone for CallFuture<Z> {
    fn clone(&self) -> Self {
        Self::new(self.handle.clone())
    }
}

impl<Z: Clone + Send + 'static> Drop for CallFuture<Z> {
    fn drop(&mut self) {
        if let Some(slot) = self.waker_slot.take() {
            self.handle.completion.release_waker(slot);
        }
    }
}

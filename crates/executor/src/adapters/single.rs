use crate::adapters::CallFuture;
use crate::call::{CallHandle, Outcome};
use crate::completion::Completion;
use delaybatch_core::Error;
use futures::stream::{self, Stream};
use std::sync::Arc;

/// Single-value publisher for a submitted call.
///
/// Subscribers registered before completion are called when the outcome
/// arrives; subscribers registered afterwards are called immediately with the
/// stored outcome. Every subscriber sees the outcome exactly once.
#[derive(Debug, Clone)]
pub struct Single<Z> {
    handle: CallHandle<Z>,
}

impl<Z: Clone + Send + 'static> Single<Z> {
    pub(crate) fn new(handle: CallHandle<Z>) -> Self {
        Self { handle }
    }

    /// Receive the outcome, on the completing thread or the current one
    pub fn subscribe(&self, subscriber: impl FnOnce(Outcome<Z>) + Send + 'static) {
        self.handle.completion.on_complete(subscriber);
    }

    /// Receive the value or the error through separate callbacks
    pub fn subscribe_with(
        &self,
        on_value: impl FnOnce(Option<Z>) + Send + 'static,
        on_error: impl FnOnce(Error) + Send + 'static,
    ) {
        self.subscribe(move |outcome| match outcome {
            Ok(value) => on_value(value),
            Err(error) => on_error(error),
        });
    }

    /// Derived publisher; errors pass through untouched
    pub fn map<U>(&self, f: impl FnOnce(Option<Z>) -> Option<U> + Send + 'static) -> Single<U>
    where
        U: Clone + Send + 'static,
    {
        let mapped = Arc::new(Completion::new());
        let target = Arc::clone(&mapped);
        self.subscribe(move |outcome| {
            target.complete(outcome.map(f));
        });
        Single::new(CallHandle::from_completion(mapped))
    }

    /// The outcome as a one-item stream
    pub fn into_stream(self) -> impl Stream<Item = Outcome<Z>> {
        stream::once(CallFuture::new(self.handle))
    }

    pub fn handle(&self) -> &CallHandle<Z> {
        &self.handle
    }
}

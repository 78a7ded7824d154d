//! Pending calls and the handle their submitters keep.

use crate::completion::Completion;
use delaybatch_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// What a caller eventually observes: a value, `None` for a position the
/// batch function did not fill, or the batch's error.
pub type Outcome<Z> = Result<Option<Z>>;

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// One caller's request while it travels through a window and a dispatch.
///
/// Owned by exactly one window until flushed, then by exactly one dispatch,
/// which writes the outcome once.
pub(crate) struct PendingCall<A, Z> {
    id: u64,
    args: A,
    completion: Arc<Completion<Outcome<Z>>>,
}

impl<A, Z: Clone + Send + 'static> PendingCall<A, Z> {
    /// Create a call and the handle its submitter consumes the outcome through
    pub(crate) fn new(args: A) -> (Self, CallHandle<Z>) {
        let completion = Arc::new(Completion::new());
        let call = Self {
            id: NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed),
            args,
            completion: Arc::clone(&completion),
        };
        (call, CallHandle { completion })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn args(&self) -> &A {
        &self.args
    }

    pub(crate) fn completion(&self) -> &Arc<Completion<Outcome<Z>>> {
        &self.completion
    }

    pub(crate) fn into_parts(self) -> (A, Arc<Completion<Outcome<Z>>>) {
        (self.args, self.completion)
    }
}

/// Handle to a submitted call.
///
/// Cloning is cheap; every clone observes the same outcome. The consumption
/// adapters (`wait`, [`CallFuture`](crate::CallFuture),
/// [`Single`](crate::Single)) are thin views over this handle.
pub struct CallHandle<Z> {
    pub(crate) completion: Arc<Completion<Outcome<Z>>>,
}

impl<Z: Clone + Send + 'static> CallHandle<Z> {
    pub(crate) fn from_completion(completion: Arc<Completion<Outcome<Z>>>) -> Self {
        Self { completion }
    }

    /// Whether the outcome has been delivered
    pub fn is_done(&self) -> bool {
        self.completion.is_complete()
    }

    /// The outcome, if delivered, without blocking
    pub fn try_outcome(&self) -> Option<Outcome<Z>> {
        self.completion.peek()
    }
}

impl<Z> Clone for CallHandle<Z> {
    fn clone(&self) -> Self {
        Self {
            completion: Arc::clone(&self.completion),
        }
    }
}

impl<Z> std::fmt::Debug for CallHandle<Z> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("completion", &self.completion)
            .finish()
    }
}

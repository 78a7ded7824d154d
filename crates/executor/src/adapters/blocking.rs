use crate::call::{CallHandle, Outcome};
use delaybatch_core::Error;
use std::time::Duration;

impl<Z: Clone + Send + 'static> CallHandle<Z> {
    /// Block the current thread until the outcome is delivered
    pub fn wait(&self) -> Outcome<Z> {
        self.completion.wait()
    }

    /// Block for at most `timeout`.
    ///
    /// Expiry yields [`Error::Timeout`]; the call itself still completes
    /// later and other handles observe that outcome.
    pub fn wait_timeout(&self, timeout: Duration) -> Outcome<Z> {
        self.completion
            .wait_timeout(timeout)
            .unwrap_or_else(|| Err(Error::timeout("waiting for batched call", timeout)))
    }
}

#[cfg(test)]
mod tests {
    use crate::call::PendingCall;
    use std::time::Duration;

    #[test]
    fn test_timeout_does_not_cancel_call() {
        let (call, handle) = PendingCall::<(u8,), u8>::new((1,));

        let err = handle.wait_timeout(Duration::from_millis(10)).unwrap_err();
        assert!(err.is_timeout());

        call.completion().complete(Ok(Some(9)));
        assert_eq!(handle.wait().unwrap(), Some(9));
        assert_eq!(handle.wait_timeout(Duration::from_millis(10)).unwrap(), Some(9));
    }
}

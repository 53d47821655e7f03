//! Internal waiter records for queueing limiters.

use crate::LimitError;
use tokio::sync::oneshot;

/// One suspended `acquire` caller: a one-shot completion plus its queue
/// identity. The grant path and the deadline path race for the completion;
/// whichever loses sees the waiter already gone and becomes a no-op.
pub(crate) struct Waiter {
    pub(crate) id: u64,
    tx: oneshot::Sender<Result<(), LimitError>>,
}

impl Waiter {
    /// Create a waiter and the receiving half its caller awaits.
    pub(crate) fn new(id: u64) -> (Self, oneshot::Receiver<Result<(), LimitError>>) {
        let (tx, rx) = oneshot::channel();
        (Self { id, tx }, rx)
    }

    /// Resolve the waiter with a granted permit. Returns false when the
    /// caller is no longer listening (deadline fired or future dropped),
    /// in which case no capacity should be consumed on its behalf.
    pub(crate) fn grant(self) -> bool {
        self.tx.send(Ok(())).is_ok()
    }

    /// Fail the waiter. Delivery failure means the caller already gave up.
    pub(crate) fn fail(self, err: LimitError) {
        let _ = self.tx.send(Err(err));
    }
}

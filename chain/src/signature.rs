//! Background signature verification for a block's transactions.

use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use tokio_util::sync::CancellationToken;

use fluxvm_error::{Error, InternalErrorKind};
use fluxvm_traits::Workers;
use fluxvm_types::Transaction;

use crate::interrupted;

/// Handle to the data-parallel signature job of one block.
///
/// One task per transaction is dispatched at spawn time and left running
/// while the caller goes on to fetch state and execute; the handle is only
/// awaited once execution finished.
pub(crate) struct SignatureJob {
    rx: Receiver<Result<(), Error>>,
    pending: usize,
    cancel: CancellationToken,
}

impl SignatureJob {
    /// Dispatches one verification task per transaction onto the pool.
    /// Does not wait for any of them.
    pub(crate) fn spawn(
        workers: &dyn Workers,
        txs: &[Arc<Transaction>],
        stop: &CancellationToken,
    ) -> Self {
        let cancel = stop.child_token();
        let (done, rx) = bounded(txs.len());
        for tx in txs {
            let tx = Arc::clone(tx);
            let done = done.clone();
            let cancel = cancel.clone();
            workers.spawn(Box::new(move || {
                let result = if cancel.is_cancelled() {
                    Err(interrupted("signature verification"))
                } else {
                    tx.verify_auth()
                };
                let _ = done.send(result);
            }));
        }
        SignatureJob {
            rx,
            pending: txs.len(),
            cancel,
        }
    }

    /// Blocks until every task reported; returns the first failure.
    ///
    /// On the first failure the remaining tasks are signalled to stop, but
    /// their reports are still drained so no worker dangles.
    pub(crate) fn wait(mut self, stop: &CancellationToken) -> Result<(), Error> {
        let mut first_failure = None;
        while self.pending > 0 {
            if stop.is_cancelled() {
                self.cancel.cancel();
                return Err(interrupted("signature wait"));
            }
            let report = self.rx.recv().map_err(|_| {
                InternalErrorKind::System.other("signature workers disconnected")
            })?;
            self.pending -= 1;
            if let Err(failure) = report {
                if first_failure.is_none() {
                    self.cancel.cancel();
                    first_failure = Some(failure);
                }
            }
        }
        match first_failure {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Signals outstanding tasks to stop; used on reject.
    pub(crate) fn abort(&self) {
        self.cancel.cancel();
    }
}

use crate::error::GsError;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use gs2_data::RawScanFrame;
use std::time::Duration;

/// Creates the single-slot, latest-wins scan handoff between the
/// acquisition thread and the consumer.
pub(crate) fn scan_mailbox() -> (ScanPublisher, ScanReceiver) {
    let (tx, rx) = bounded(1);
    (
        ScanPublisher {
            drain: rx.clone(),
            tx,
        },
        ScanReceiver { rx },
    )
}

/// Producer half. A publish never blocks and never queues: an unread scan
/// is discarded in favor of the new one. The publisher keeps its own
/// receiver handle so it can drain the stale scan out of the slot.
pub(crate) struct ScanPublisher {
    tx: Sender<RawScanFrame>,
    drain: Receiver<RawScanFrame>,
}

impl ScanPublisher {
    pub(crate) fn publish(&self, scan: RawScanFrame) {
        match self.tx.try_send(scan) {
            Ok(()) => {}
            Err(TrySendError::Full(scan)) => {
                // Drop the unread scan; the single producer re-sends
                // immediately, so the slot holds the latest one.
                let _ = self.drain.try_recv();
                let _ = self.tx.try_send(scan);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

/// Consumer half, read by exactly one caller thread.
pub(crate) struct ScanReceiver {
    rx: Receiver<RawScanFrame>,
}

impl ScanReceiver {
    pub(crate) fn recv_timeout(&self, timeout: Duration) -> Result<RawScanFrame, GsError> {
        self.rx.recv_timeout(timeout).map_err(|e| match e {
            RecvTimeoutError::Timeout => GsError::Timeout,
            RecvTimeoutError::Disconnected => GsError::NotScanning,
        })
    }
}

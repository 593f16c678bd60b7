use crate::{
    model::index::IndexMetadata,
    repair::{RepairStrategy, StaleCandidate},
};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use parking_lot::Mutex;
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering},
    },
    thread,
    time::Duration,
};
use tracing::{debug, warn};

///
/// RepairState
///
/// `Accepting`: submissions enqueue or drop-on-full.
/// `Draining`: shutdown requested; no new submissions, workers drain.
/// `Stopped`: grace period expired or queue drained; workers cancelled.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RepairState {
    Accepting,
    Draining,
    Stopped,
}

impl RepairState {
    const fn to_u8(self) -> u8 {
        match self {
            Self::Accepting => 0,
            Self::Draining => 1,
            Self::Stopped => 2,
        }
    }

    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Accepting,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

struct RepairJob {
    entity: String,
    index: Arc<IndexMetadata>,
    candidates: Vec<StaleCandidate>,
}

///
/// OfflineRepair
///
/// Wraps an inner strategy and runs it on a fixed worker pool fed by a
/// bounded queue. Submission is non-blocking: when the queue is full (or the
/// pool is shutting down) the batch is dropped and counted. Repair is
/// strictly best-effort and must never apply backpressure to readers.
///

pub struct OfflineRepair {
    sender: Mutex<Option<Sender<RepairJob>>>,
    // Sentinel channel: workers hold clones of the sender side and never use
    // it. When the last worker exits, the receiver disconnects.
    worker_exit: Mutex<Option<(Sender<()>, Receiver<()>)>>,
    state: AtomicU8,
    dropped: AtomicU64,
    cancel: Arc<AtomicBool>,
    grace: Duration,
}

impl OfflineRepair {
    #[must_use]
    pub fn new(
        inner: Arc<dyn RepairStrategy>,
        workers: usize,
        queue_capacity: usize,
        grace: Duration,
    ) -> Self {
        let (tx, rx) = bounded::<RepairJob>(queue_capacity.max(1));
        let (exit_tx, exit_rx) = bounded::<()>(1);
        let cancel = Arc::new(AtomicBool::new(false));

        for n in 0..workers.max(1) {
            let rx = rx.clone();
            let inner = Arc::clone(&inner);
            let cancel = Arc::clone(&cancel);
            let exit_tx = exit_tx.clone();

            thread::Builder::new()
                .name(format!("sindex-repair-{n}"))
                .spawn(move || {
                    // Owning a sentinel clone ties worker lifetime to the
                    // receiver's disconnect.
                    let _exit = exit_tx;

                    while let Ok(job) = rx.recv() {
                        if cancel.load(Ordering::SeqCst) {
                            break;
                        }
                        inner.handle(&job.entity, &job.index, job.candidates);
                    }
                })
                .expect("repair worker thread must spawn");
        }

        Self {
            sender: Mutex::new(Some(tx)),
            worker_exit: Mutex::new(Some((exit_tx, exit_rx))),
            state: AtomicU8::new(RepairState::Accepting.to_u8()),
            dropped: AtomicU64::new(0),
            cancel,
            grace,
        }
    }

    #[must_use]
    pub fn state(&self) -> RepairState {
        RepairState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Number of repair batches dropped because the queue was full or the
    /// pool was no longer accepting.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Stop accepting work, wait up to the grace period for queued batches
    /// to drain, then force-cancel whatever remains.
    pub fn shutdown(&self) {
        let accepting = RepairState::Accepting.to_u8();
        let draining = RepairState::Draining.to_u8();
        if self
            .state
            .compare_exchange(accepting, draining, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        // Closing the job channel wakes idle workers and ends the drain once
        // the queue is empty.
        *self.sender.lock() = None;

        let exit = self.worker_exit.lock().take();
        if let Some((exit_tx, exit_rx)) = exit {
            drop(exit_tx);
            match exit_rx.recv_timeout(self.grace) {
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("offline repair drained before the grace period");
                }
                Ok(()) | Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        grace_secs = self.grace.as_secs(),
                        "offline repair grace period expired; cancelling remaining work"
                    );
                    self.cancel.store(true, Ordering::SeqCst);
                }
            }
        }

        self.state
            .store(RepairState::Stopped.to_u8(), Ordering::SeqCst);
    }

    fn drop_batch(&self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
        debug!(dropped = self.dropped(), "repair batch dropped");
    }
}

impl RepairStrategy for OfflineRepair {
    fn handle(&self, entity: &str, index: &Arc<IndexMetadata>, candidates: Vec<StaleCandidate>) {
        if candidates.is_empty() {
            return;
        }
        if self.state() != RepairState::Accepting {
            self.drop_batch();
            return;
        }

        let job = RepairJob {
            entity: entity.to_string(),
            index: Arc::clone(index),
            candidates,
        };

        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(tx) if tx.try_send(job).is_ok() => {}
            _ => self.drop_batch(),
        }
    }
}

impl Drop for OfflineRepair {
    fn drop(&mut self) {
        self.shutdown();
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        store::{ColumnKey, RowKey},
        test_support::item_schema,
    };
    use crossbeam_channel::unbounded;
    use parking_lot::Mutex as PlMutex;

    fn candidate(n: u64) -> StaleCandidate {
        StaleCandidate {
            row: RowKey::new(b"idx:item:category:0".to_vec()),
            column: ColumnKey::new(format!("c{n}").into_bytes()),
            observed_at: n,
        }
    }

    /// Inner strategy that blocks on a gate and records handled batches.
    struct GatedStrategy {
        gate: Receiver<()>,
        handled: PlMutex<Vec<usize>>,
    }

    impl RepairStrategy for GatedStrategy {
        fn handle(
            &self,
            _entity: &str,
            _index: &Arc<IndexMetadata>,
            candidates: Vec<StaleCandidate>,
        ) {
            let _ = self.gate.recv();
            self.handled.lock().push(candidates.len());
        }
    }

    #[test]
    fn backpressure_drops_and_counts_when_queue_is_full() {
        let schema = item_schema();
        let index = Arc::clone(&schema.indexes()[0]);

        let (gate_tx, gate_rx) = unbounded::<()>();
        let inner = Arc::new(GatedStrategy {
            gate: gate_rx,
            handled: PlMutex::new(Vec::new()),
        });
        let pool = OfflineRepair::new(
            Arc::clone(&inner) as Arc<dyn RepairStrategy>,
            1,
            1,
            Duration::from_millis(200),
        );

        // Plug the single worker so nothing is consumed from the queue.
        pool.handle("item", &index, vec![candidate(0)]);
        thread::sleep(Duration::from_millis(50));

        // Queue capacity 1: first batch is accepted, the next two drop.
        pool.handle("item", &index, vec![candidate(1)]);
        pool.handle("item", &index, vec![candidate(2)]);
        pool.handle("item", &index, vec![candidate(3)]);

        assert_eq!(pool.dropped(), 2);

        // Release the worker; plug + accepted batch drain.
        gate_tx.send(()).unwrap();
        gate_tx.send(()).unwrap();
        pool.shutdown();

        assert_eq!(pool.state(), RepairState::Stopped);
        assert_eq!(inner.handled.lock().len(), 2);
    }

    #[test]
    fn shutdown_drains_queued_work_within_grace() {
        let schema = item_schema();
        let index = Arc::clone(&schema.indexes()[0]);

        let (gate_tx, gate_rx) = unbounded::<()>();
        let inner = Arc::new(GatedStrategy {
            gate: gate_rx,
            handled: PlMutex::new(Vec::new()),
        });
        let pool = OfflineRepair::new(
            Arc::clone(&inner) as Arc<dyn RepairStrategy>,
            1,
            10,
            Duration::from_secs(5),
        );

        for n in 0..3 {
            pool.handle("item", &index, vec![candidate(n)]);
        }
        for _ in 0..3 {
            gate_tx.send(()).unwrap();
        }

        pool.shutdown();
        assert_eq!(pool.state(), RepairState::Stopped);
        assert_eq!(pool.dropped(), 0);
        assert_eq!(inner.handled.lock().len(), 3);
    }

    #[test]
    fn submissions_after_shutdown_are_dropped() {
        let schema = item_schema();
        let index = Arc::clone(&schema.indexes()[0]);

        let (gate_tx, gate_rx) = unbounded::<()>();
        drop(gate_tx);
        let inner = Arc::new(GatedStrategy {
            gate: gate_rx,
            handled: PlMutex::new(Vec::new()),
        });
        let pool = OfflineRepair::new(
            inner as Arc<dyn RepairStrategy>,
            1,
            4,
            Duration::from_millis(200),
        );

        pool.shutdown();
        pool.handle("item", &index, vec![candidate(1)]);

        assert_eq!(pool.dropped(), 1);
    }
}

// ABOUTME: Pending-reply table correlating outstanding sequence ids with their waiting callers
// ABOUTME: Each entry is a oneshot rendezvous fulfilled exactly once by a reply or a transport failure

use crate::client::error::TransportError;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;
use tracing::trace;

/// What a waiting caller eventually receives
pub type Reply = Result<Bytes, TransportError>;

struct Waiter {
    socket_id: u64,
    tx: oneshot::Sender<Reply>,
}

/// Outstanding requests keyed by sequence id
///
/// Entries also remember which socket they were sent on so a dying socket
/// can fail its own waiters without touching anyone else's.
#[derive(Default)]
pub struct PendingTable {
    waiters: Mutex<HashMap<u32, Waiter>>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u32, Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a waiter for `sequence`
    ///
    /// An existing entry is never replaced: a second registration for the
    /// same id fails with `DuplicateSequence`.
    pub fn register(
        &self,
        sequence: u32,
        socket_id: u64,
    ) -> Result<oneshot::Receiver<Reply>, TransportError> {
        let mut waiters = self.lock();
        if waiters.contains_key(&sequence) {
            return Err(TransportError::DuplicateSequence(sequence));
        }

        let (tx, rx) = oneshot::channel();
        waiters.insert(sequence, Waiter { socket_id, tx });
        Ok(rx)
    }

    /// Hand `frame` to the waiter for `sequence`
    ///
    /// The frame is given back when nobody is waiting for it.
    pub fn fulfil(&self, sequence: u32, frame: Bytes) -> Result<(), Bytes> {
        let waiter = self.lock().remove(&sequence);
        match waiter {
            Some(waiter) => {
                // The caller may have given up in the meantime.
                if waiter.tx.send(Ok(frame)).is_err() {
                    trace!(sequence, "reply arrived after its waiter left");
                }
                Ok(())
            }
            None => Err(frame),
        }
    }

    /// Tie the entry for `sequence` to a guard that removes it on drop
    pub fn guard(&self, sequence: u32) -> PendingGuard<'_> {
        PendingGuard {
            table: self,
            sequence,
        }
    }

    /// Drop the entry for `sequence`, if still present
    pub fn remove(&self, sequence: u32) -> bool {
        self.lock().remove(&sequence).is_some()
    }

    /// Fail every waiter registered on `socket_id` with `ConnectionLost`
    pub fn fail_socket(&self, socket_id: u64) -> usize {
        let failed: Vec<Waiter> = {
            let mut waiters = self.lock();
            let sequences: Vec<u32> = waiters
                .iter()
                .filter(|(_, waiter)| waiter.socket_id == socket_id)
                .map(|(sequence, _)| *sequence)
                .collect();
            sequences
                .into_iter()
                .filter_map(|sequence| waiters.remove(&sequence))
                .collect()
        };

        let count = failed.len();
        for waiter in failed {
            let _ = waiter.tx.send(Err(TransportError::ConnectionLost));
        }
        count
    }

    pub fn contains(&self, sequence: u32) -> bool {
        self.lock().contains_key(&sequence)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Removes one entry from a [`PendingTable`] when dropped
///
/// Keeps the table clean when the waiting task is cancelled.
pub struct PendingGuard<'a> {
    table: &'a PendingTable,
    sequence: u32,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.table.remove(self.sequence);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reply_reaches_only_its_waiter() {
        let table = PendingTable::new();
        let rx7 = table.register(7, 1).unwrap();
        let mut rx8 = table.register(8, 1).unwrap();

        assert!(table.fulfil(7, Bytes::from_static(b"seven")).is_ok());
        assert_eq!(rx7.await.unwrap().unwrap(), Bytes::from_static(b"seven"));

        assert!(rx8.try_recv().is_err());
        assert!(table.contains(8));
        assert!(!table.contains(7));
    }

    #[test]
    fn unmatched_reply_is_returned() {
        let table = PendingTable::new();
        let _rx = table.register(1, 1).unwrap();

        let frame = Bytes::from_static(b"late");
        assert_eq!(table.fulfil(99, frame.clone()), Err(frame));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn duplicate_sequence_is_refused() {
        let table = PendingTable::new();
        let _rx = table.register(5, 1).unwrap();

        assert!(matches!(
            table.register(5, 2),
            Err(TransportError::DuplicateSequence(5))
        ));
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn failing_a_socket_leaves_others_alone() {
        let table = PendingTable::new();
        let rx_a = table.register(1, 10).unwrap();
        let rx_b = table.register(2, 10).unwrap();
        let mut rx_c = table.register(3, 20).unwrap();

        assert_eq!(table.fail_socket(10), 2);
        assert!(matches!(rx_a.await.unwrap(), Err(TransportError::ConnectionLost)));
        assert!(matches!(rx_b.await.unwrap(), Err(TransportError::ConnectionLost)));

        assert!(rx_c.try_recv().is_err());
        assert!(table.contains(3));
    }

    #[tokio::test]
    async fn cancelled_waiter_leaves_no_entry() {
        let table = std::sync::Arc::new(PendingTable::new());
        let task_table = std::sync::Arc::clone(&table);
        let task = tokio::spawn(async move {
            let rx = task_table.register(9, 1).unwrap();
            let _entry = task_table.guard(9);
            let _ = rx.await;
        });

        while !table.contains(9) {
            tokio::task::yield_now().await;
        }
        task.abort();
        let _ = task.await;
        assert!(table.is_empty());
    }
}

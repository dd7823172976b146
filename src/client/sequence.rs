// ABOUTME: Sequence id allocator shared by every session of one gateway
// ABOUTME: Strictly increasing 32-bit ids that wrap from u32::MAX back to 1, never yielding 0

use std::sync::atomic::{AtomicU32, Ordering};

/// Lock-free allocator of request sequence ids
///
/// Zero is reserved for frames that do not take part in correlation, so the
/// counter skips it when it wraps.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    last: AtomicU32,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start so that the first call to `next` returns the id after `last`
    pub fn with_start(last: u32) -> Self {
        Self {
            last: AtomicU32::new(last),
        }
    }

    /// Allocate the next sequence id
    pub fn next(&self) -> u32 {
        match self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(successor(current))
            }) {
            Ok(previous) | Err(previous) => successor(previous),
        }
    }

    /// The most recently allocated id (0 before the first allocation)
    pub fn current(&self) -> u32 {
        self.last.load(Ordering::Acquire)
    }
}

fn successor(current: u32) -> u32 {
    match current {
        u32::MAX => 1,
        n => n + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_one_and_increases() {
        let seq = SequenceAllocator::new();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
        assert_eq!(seq.next(), 3);
        assert_eq!(seq.current(), 3);
    }

    #[test]
    fn wraps_to_one_skipping_zero() {
        let seq = SequenceAllocator::with_start(u32::MAX - 1);
        assert_eq!(seq.next(), u32::MAX);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn concurrent_allocations_are_distinct() {
        let seq = Arc::new(SequenceAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let seq = Arc::clone(&seq);
                std::thread::spawn(move || (0..1000).map(|_| seq.next()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert_ne!(id, 0);
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 8000);
    }
}

#![forbid(unsafe_code)]
//! A bounded, multi-producer/single-consumer ring buffer with preallocated
//! slots. Producers reserve a slot by advancing an atomic tail, write their
//! payload in place, then publish it by advancing the slot's stamp; the
//! single consumer polls stamps in order and never needs a lock of its own
//! to know what is ready. When the ring is full (or, for the consumer,
//! empty), callers wait per the ring's configured [`WaitStrategy`] — a
//! tight spin by default — rather than dropping a request.
//!
//! Slots hold their payload behind a `parking_lot::Mutex` rather than raw
//! unsafe aliasing: the claim/publish protocol below guarantees the
//! producer and consumer never touch a slot at the same time, so the lock
//! is never contended, but keeping it means every module in this crate stays
//! free of `unsafe`.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::config::WaitStrategy;

struct Slot<T> {
    /// Sequence number a producer must observe (== its reserved position)
    /// before it may write this slot; after publish, equals `position + 1`
    /// so the consumer can tell the write is visible.
    stamp: AtomicUsize,
    value: Mutex<Option<T>>,
}

/// A bounded MPSC ring buffer of preallocated slots. Capacity must be a
/// power of two.
pub struct Ring<T> {
    slots: Box<[Slot<T>]>,
    mask: usize,
    tail: AtomicUsize,
    head: AtomicUsize,
    strategy: WaitStrategy,
}

impl<T> Ring<T> {
    /// Builds a ring with room for `capacity` in-flight events, using the
    /// busy-spin wait strategy. `capacity` is rounded up to the next power
    /// of two (minimum 2).
    pub fn new(capacity: usize) -> Self {
        Self::with_strategy(capacity, WaitStrategy::BusySpin)
    }

    /// Builds a ring with room for `capacity` in-flight events, waiting on
    /// a full/empty ring per `strategy` instead of always busy-spinning.
    pub fn with_strategy(capacity: usize, strategy: WaitStrategy) -> Self {
        let capacity = capacity.max(2).next_power_of_two();
        let slots = (0..capacity)
            .map(|i| Slot {
                stamp: AtomicUsize::new(i),
                value: Mutex::new(None),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity - 1,
            tail: AtomicUsize::new(0),
            head: AtomicUsize::new(0),
            strategy,
        }
    }

    /// Capacity of the ring (always a power of two).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Waits one unit per the configured [`WaitStrategy`]: a tight spin hint
    /// for `BusySpin`, or a yield back to the scheduler for `Parked`.
    fn wait_once(&self) {
        match self.strategy {
            WaitStrategy::BusySpin => std::hint::spin_loop(),
            WaitStrategy::Parked => std::thread::yield_now(),
        }
    }

    /// Attempts to reserve a slot and publish `value` without blocking.
    /// Returns `value` back if the ring is currently full.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let mut pos = self.tail.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let stamp = slot.stamp.load(Ordering::Acquire);
            let diff = stamp as isize - pos as isize;
            if diff == 0 {
                if self
                    .tail
                    .compare_exchange_weak(
                        pos,
                        pos.wrapping_add(1),
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    )
                    .is_ok()
                {
                    *slot.value.lock() = Some(value);
                    slot.stamp.store(pos.wrapping_add(1), Ordering::Release);
                    return Ok(());
                }
                pos = self.tail.load(Ordering::Relaxed);
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.tail.load(Ordering::Relaxed);
            }
        }
    }

    /// Reserves a slot and publishes `value`, waiting per the configured
    /// [`WaitStrategy`] while the ring is full. This is the default
    /// backpressure policy: producers never drop a request.
    pub fn push_spin(&self, mut value: T) {
        loop {
            match self.try_push(value) {
                Ok(()) => return,
                Err(back) => {
                    value = back;
                    self.wait_once();
                }
            }
        }
    }

    /// Single-consumer pop. Returns `None` if nothing is ready yet.
    ///
    /// # Panics
    /// Panics if called from more than one thread concurrently; the ring
    /// offers no synchronization for multiple consumers by design (each
    /// pipeline stage owns exactly one consumer thread).
    pub fn try_pop(&self) -> Option<T> {
        let pos = self.head.load(Ordering::Relaxed);
        let slot = &self.slots[pos & self.mask];
        let stamp = slot.stamp.load(Ordering::Acquire);
        if stamp != pos.wrapping_add(1) {
            return None;
        }
        let value = slot.value.lock().take();
        slot.stamp
            .store(pos.wrapping_add(self.slots.len()).wrapping_add(1), Ordering::Release);
        self.head.store(pos.wrapping_add(1), Ordering::Relaxed);
        value
    }

    /// Single-consumer blocking pop: waits per the configured
    /// [`WaitStrategy`] until an event is available. Intended for the
    /// stage's consumer loop.
    pub fn pop_spin(&self) -> T {
        loop {
            if let Some(v) = self.try_pop() {
                return v;
            }
            self.wait_once();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_producer_single_consumer_preserves_order() {
        let ring: Ring<u64> = Ring::new(8);
        for i in 0..100u64 {
            ring.push_spin(i);
            assert_eq!(ring.pop_spin(), i);
        }
    }

    #[test]
    fn parked_strategy_still_delivers_every_item() {
        let ring: Ring<u64> = Ring::with_strategy(4, WaitStrategy::Parked);
        for i in 0..4u64 {
            ring.try_push(i).unwrap();
        }
        // Pushing a 5th item blocks until the consumer frees a slot; run it
        // on another thread so `pop_spin`'s yield-based wait has something
        // to yield to.
        let ring = Arc::new(ring);
        let pusher = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.push_spin(4))
        };
        assert_eq!(ring.pop_spin(), 0);
        pusher.join().unwrap();
        for expected in 1..5u64 {
            assert_eq!(ring.pop_spin(), expected);
        }
    }

    #[test]
    fn fills_and_reports_back_pressure() {
        let ring: Ring<u64> = Ring::new(4);
        for i in 0..4u64 {
            ring.try_push(i).unwrap();
        }
        assert_eq!(ring.try_push(99).unwrap_err(), 99);
        assert_eq!(ring.try_pop(), Some(0));
        ring.try_push(100).unwrap();
    }

    #[test]
    fn multi_producer_single_consumer_delivers_every_item() {
        let ring = Arc::new(Ring::<u64>::new(64));
        let producers: Vec<_> = (0..8)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..500u64 {
                        ring.push_spin(p * 10_000 + i);
                    }
                })
            })
            .collect();

        let mut received = Vec::with_capacity(4000);
        while received.len() < 4000 {
            if let Some(v) = ring.try_pop() {
                received.push(v);
            }
        }
        for p in producers {
            p.join().unwrap();
        }
        assert_eq!(received.len(), 4000);
        received.sort_unstable();
        received.dedup();
        assert_eq!(received.len(), 4000);
    }
}

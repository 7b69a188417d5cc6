//! Strict FIFO lock guarding the append critical section.
//!
//! Waiters are granted the lock in arrival order, so concurrent appends are
//! serialized and observably linearized in `seq` order. The guard releases
//! on every exit path, including panics, via `Drop`.

use parking_lot::{Condvar, Mutex};

#[derive(Default)]
struct Tickets {
    /// Next ticket to hand out.
    next: u64,
    /// Ticket currently allowed to hold the lock.
    serving: u64,
}

/// A ticket lock: each `lock()` call takes the next ticket and waits until
/// it is being served. Unlike an ordinary mutex there is no barging; grant
/// order is exactly arrival order.
#[derive(Default)]
pub struct FifoLock {
    tickets: Mutex<Tickets>,
    turn: Condvar,
}

impl FifoLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock, suspending the caller until every earlier ticket
    /// has been served.
    pub fn lock(&self) -> FifoGuard<'_> {
        let mut tickets = self.tickets.lock();
        let ticket = tickets.next;
        tickets.next += 1;
        while tickets.serving != ticket {
            self.turn.wait(&mut tickets);
        }
        FifoGuard { lock: self }
    }
}

/// Exclusive critical section. Dropping it serves the next ticket.
#[must_use = "the critical section ends when the guard is dropped"]
pub struct FifoGuard<'a> {
    lock: &'a FifoLock,
}

impl Drop for FifoGuard<'_> {
    fn drop(&mut self) {
        let mut tickets = self.lock.tickets.lock();
        tickets.serving += 1;
        // Every waiter checks its own ticket; only the next one proceeds.
        self.lock.turn.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_allows_one_holder_at_a_time() {
        let lock = Arc::new(FifoLock::new());
        let entered = Arc::new(AtomicBool::new(false));

        let guard = lock.lock();

        let handle = {
            let lock = Arc::clone(&lock);
            let entered = Arc::clone(&entered);
            thread::spawn(move || {
                let _guard = lock.lock();
                entered.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));

        drop(guard);
        handle.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_preserves_arrival_order() {
        let lock = Arc::new(FifoLock::new());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let first = lock.lock();
        order.lock().push(1);

        // Enqueue waiters one at a time so arrival order is known.
        let mut handles = Vec::new();
        for i in 2..=4u32 {
            let lock = Arc::clone(&lock);
            let order = Arc::clone(&order);
            handles.push(thread::spawn(move || {
                let _guard = lock.lock();
                order.lock().push(i);
            }));
            // Give the spawned thread time to take its ticket.
            thread::sleep(Duration::from_millis(50));
        }

        drop(first);
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*order.lock(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_immediate_relock_after_release() {
        let lock = FifoLock::new();
        drop(lock.lock());
        drop(lock.lock());
    }

    #[test]
    fn test_stress_rapid_lock_unlock() {
        let lock = Arc::new(FifoLock::new());
        let counter = Arc::new(parking_lot::Mutex::new(0u32));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = lock.lock();
                        *counter.lock() += 1;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(*counter.lock(), 800);
    }
}

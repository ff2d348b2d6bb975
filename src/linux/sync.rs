//! Concurrency primitives shared by the three pump threads and the main
//! supervisor loop (§5, §5.1).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};

/// One-shot counting semaphore with effective capacity 1: the main thread
/// posts exactly once, after it has finished any logic that depends on the
/// child being reachable; the input pump polls it non-blockingly while
/// still emitting EOTs, then waits on it once it has nothing left to do.
/// A small `Mutex<u32>` + `Condvar` wrapper rather than a dedicated
/// semaphore crate, since the only consumer here is this single
/// one-shot use.
pub struct EofSemaphore {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl EofSemaphore {
    pub const fn new() -> EofSemaphore {
        EofSemaphore {
            count: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }

    /// Called exactly once by the main thread.
    pub fn post(&self) {
        let mut count = self.count.lock().unwrap();
        *count += 1;
        self.condvar.notify_all();
    }

    /// Non-blocking decrement. Returns whether it succeeded.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock().unwrap();
        if *count > 0 {
            *count -= 1;
            true
        } else {
            false
        }
    }

    /// Blocking decrement, used by the mop-up reader.
    pub fn wait(&self) {
        let count = self.count.lock().unwrap();
        let mut count = self
            .condvar
            .wait_while(count, |c| *c == 0)
            .unwrap();
        *count -= 1;
    }
}

impl Default for EofSemaphore {
    fn default() -> Self {
        EofSemaphore::new()
    }
}

/// One-way latch (`true` -> `false`, never back): cleared by the main
/// thread once it decides the input pump should stop reading.
pub struct GoLatch(AtomicBool);

impl GoLatch {
    pub const fn new() -> GoLatch {
        GoLatch(AtomicBool::new(true))
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::Relaxed);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for GoLatch {
    fn default() -> Self {
        GoLatch::new()
    }
}

/// Set by the `SIGINT`/`SIGQUIT`/`SIGTERM` handler; polled by the main
/// wait loop. `Relaxed` throughout: the handler only ever stores, the
/// poll loop re-checks every 20ms regardless, so a torn-but-eventually-
/// consistent read costs nothing.
pub struct Interrupted(AtomicBool);

impl Interrupted {
    pub const fn new() -> Interrupted {
        Interrupted(AtomicBool::new(false))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for Interrupted {
    fn default() -> Self {
        Interrupted::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_semaphore_try_wait_before_post_fails() {
        let sem = EofSemaphore::new();
        assert!(!sem.try_wait());
    }

    #[test]
    fn eof_semaphore_post_then_try_wait_succeeds_once() {
        let sem = EofSemaphore::new();
        sem.post();
        assert!(sem.try_wait());
        assert!(!sem.try_wait());
    }

    #[test]
    fn go_latch_starts_open_and_closes_one_way() {
        let latch = GoLatch::new();
        assert!(latch.is_open());
        latch.close();
        assert!(!latch.is_open());
    }

    #[test]
    fn interrupted_starts_clear() {
        let flag = Interrupted::new();
        assert!(!flag.get());
        flag.set();
        assert!(flag.get());
    }
}

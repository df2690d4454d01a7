use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Wakes threads blocked until some stream has data.
///
/// Deliveries enqueue first and call [`notify`](Self::notify) afterwards.
/// Waiters evaluate readiness with the gate lock held, so a delivery that
/// lands between the check and the wait still wakes them.
#[derive(Debug, Default)]
pub(crate) struct WaitGate {
    generation: Mutex<u64>,
    ready: Condvar,
}

impl WaitGate {
    pub fn notify(&self) {
        let mut generation = self.generation.lock();
        *generation = generation.wrapping_add(1);
        self.ready.notify_all();
    }

    /// Block until `check` yields a value or `timeout` elapses.
    ///
    /// A timeout too large to express as an instant waits without a deadline.
    pub fn wait_until<T>(&self, timeout: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
        let deadline = Instant::now().checked_add(timeout);
        let mut generation = self.generation.lock();
        loop {
            if let Some(value) = check() {
                return Some(value);
            }
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut generation, deadline).timed_out() {
                        return check();
                    }
                }
                None => self.ready.wait(&mut generation),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn ready_check_returns_immediately() {
        let gate = WaitGate::default();
        let start = Instant::now();
        assert_eq!(gate.wait_until(Duration::from_secs(5), || Some(1)), Some(1));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn times_out_after_deadline() {
        let gate = WaitGate::default();
        let timeout = Duration::from_millis(60);
        let start = Instant::now();
        assert_eq!(gate.wait_until(timeout, || None::<()>), None);
        assert!(start.elapsed() >= timeout);
    }

    #[test]
    fn notify_wakes_waiter() {
        let gate = Arc::new(WaitGate::default());
        let flag = Arc::new(AtomicBool::new(false));

        let notifier = {
            let gate = gate.clone();
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(true, Ordering::SeqCst);
                gate.notify();
            })
        };

        let start = Instant::now();
        let woke = gate.wait_until(Duration::from_secs(10), || {
            flag.load(Ordering::SeqCst).then_some(())
        });
        assert!(woke.is_some());
        assert!(start.elapsed() < Duration::from_secs(5));
        notifier.join().unwrap();
    }

    #[test]
    fn unbounded_timeout_waits_for_notify() {
        let gate = Arc::new(WaitGate::default());
        let flag = Arc::new(AtomicBool::new(false));

        let notifier = {
            let gate = gate.clone();
            let flag = flag.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                flag.store(true, Ordering::SeqCst);
                gate.notify();
            })
        };

        let woke = gate.wait_until(Duration::MAX, || flag.load(Ordering::SeqCst).then_some(7));
        assert_eq!(woke, Some(7));
        notifier.join().unwrap();
    }
}

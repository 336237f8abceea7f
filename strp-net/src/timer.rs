//! Delayed and periodic event scheduling.
//!
//! Timers post [`Event`]s onto the node's queue rather than running work of
//! their own, preserving the single-threaded, run-to-completion execution
//! model. A periodic task re-arms itself after each firing until its handle
//! is cancelled; cancel-then-reschedule is how administrative interface
//! changes re-phase the cycles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::event::{Event, EventSender};

/// Cancellation token for a scheduled task. Dropping the handle does not
/// cancel the task; call [`TaskHandle::cancel`].
#[derive(Clone)]
pub struct TaskHandle {
    cancelled: Arc<AtomicBool>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Posts events onto an event queue after a delay or on a period.
#[derive(Clone)]
pub struct Scheduler {
    tx: EventSender,
}

impl Scheduler {
    pub fn new(tx: EventSender) -> Self {
        Scheduler { tx }
    }

    /// Post `event` once after `delay`, unless cancelled first.
    pub fn schedule_once(&self, delay: Duration, event: Event) -> TaskHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TaskHandle {
            cancelled: cancelled.clone(),
        };
        let tx = self.tx.clone();
        let _ = thread::Builder::new()
            .name("strp-timer".into())
            .spawn(move || {
                thread::sleep(delay);
                if !cancelled.load(Ordering::SeqCst) {
                    let _ = tx.send(event);
                }
            });
        handle
    }

    /// Post `make_event()` after `initial`, then every `period`, until the
    /// handle is cancelled or the queue's receiver is gone.
    pub fn schedule_periodic<F>(&self, initial: Duration, period: Duration, make_event: F) -> TaskHandle
    where
        F: Fn() -> Event + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let handle = TaskHandle {
            cancelled: cancelled.clone(),
        };
        let tx = self.tx.clone();
        let _ = thread::Builder::new()
            .name("strp-periodic".into())
            .spawn(move || {
                thread::sleep(initial);
                loop {
                    if cancelled.load(Ordering::SeqCst) {
                        return;
                    }
                    if tx.send(make_event()).is_err() {
                        return;
                    }
                    thread::sleep(period);
                }
            });
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;
    use std::time::Instant;

    #[test]
    fn test_schedule_once_fires() {
        let (tx, rx) = event::channel();
        let scheduler = Scheduler::new(tx);
        scheduler.schedule_once(Duration::from_millis(5), Event::BeaconTick);
        let evt = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(matches!(evt, Event::BeaconTick));
    }

    #[test]
    fn test_schedule_once_cancelled_does_not_fire() {
        let (tx, rx) = event::channel();
        let scheduler = Scheduler::new(tx);
        let handle = scheduler.schedule_once(Duration::from_millis(50), Event::BeaconTick);
        handle.cancel();
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }

    #[test]
    fn test_periodic_rearms() {
        let (tx, rx) = event::channel();
        let scheduler = Scheduler::new(tx);
        let handle = scheduler.schedule_periodic(
            Duration::from_millis(1),
            Duration::from_millis(5),
            || Event::AdvertiseTick,
        );
        for _ in 0..3 {
            let evt = rx.recv_timeout(Duration::from_secs(2)).unwrap();
            assert!(matches!(evt, Event::AdvertiseTick));
        }
        handle.cancel();
    }

    #[test]
    fn test_periodic_stops_after_cancel() {
        let (tx, rx) = event::channel();
        let scheduler = Scheduler::new(tx);
        let handle = scheduler.schedule_periodic(
            Duration::from_millis(1),
            Duration::from_millis(5),
            || Event::BeaconTick,
        );
        let _ = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        handle.cancel();
        // Drain anything already queued, then expect silence.
        let deadline = Instant::now() + Duration::from_millis(100);
        while Instant::now() < deadline {
            let _ = rx.try_recv();
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(20));
        assert!(rx.try_recv().is_err());
    }
}

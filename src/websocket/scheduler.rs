//! Generation-tagged timers shared by the controller and the heartbeat.
//!
//! Each timer is a sleeping task that posts a [`TimerFired`] event back to
//! the controller. The event carries the generation it was scheduled under
//! plus a per-timer sequence number, and [`Scheduler::accept`] rejects it
//! unless both still match. Aborting the task is best effort only.

use log::*;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum TimerKind {
    /// Backoff before the next automatic attempt.
    Retry,
    /// Pause before a caller-requested reconnect.
    Restart,
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerFired {
    pub kind: TimerKind,
    pub generation: u64,
    seq: u64,
}

struct PendingTimer {
    seq: u64,
    handle: JoinHandle<()>,
}

pub(crate) struct Scheduler<E> {
    generation: u64,
    next_seq: u64,
    events: mpsc::UnboundedSender<E>,
    pending: HashMap<TimerKind, PendingTimer>,
}

impl<E> Scheduler<E>
where
    E: From<TimerFired> + Send + 'static,
{
    pub fn new(events: mpsc::UnboundedSender<E>) -> Self {
        Self {
            generation: 0,
            next_seq: 0,
            events,
            pending: HashMap::new(),
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancels every timer and starts a new generation.
    pub fn advance(&mut self) -> u64 {
        self.cancel_all();
        self.generation += 1;
        trace!("Scheduler advanced to generation {}", self.generation);
        self.generation
    }

    /// Schedules `kind` after `delay`, replacing any pending timer of the same kind.
    pub fn schedule(&mut self, kind: TimerKind, delay: Duration) {
        self.next_seq += 1;
        let fired = TimerFired {
            kind,
            generation: self.generation,
            seq: self.next_seq,
        };
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(E::from(fired));
        });
        if let Some(previous) = self.pending.insert(
            kind,
            PendingTimer {
                seq: fired.seq,
                handle,
            },
        ) {
            previous.handle.abort();
        }
    }

    pub fn cancel(&mut self, kind: TimerKind) {
        if let Some(timer) = self.pending.remove(&kind) {
            timer.handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.pending.drain() {
            timer.handle.abort();
        }
    }

    pub fn is_pending(&self, kind: TimerKind) -> bool {
        self.pending.contains_key(&kind)
    }

    /// Returns true if `fired` is the live timer of its kind, consuming it.
    pub fn accept(&mut self, fired: &TimerFired) -> bool {
        if fired.generation != self.generation {
            debug!(
                "Ignoring stale {:?} timer from generation {} (current {})",
                fired.kind, fired.generation, self.generation
            );
            return false;
        }
        match self.pending.get(&fired.kind) {
            Some(timer) if timer.seq == fired.seq => {
                self.pending.remove(&fired.kind);
                true
            }
            _ => {
                debug!("Ignoring cancelled {:?} timer", fired.kind);
                false
            }
        }
    }
}

impl<E> Drop for Scheduler<E> {
    fn drop(&mut self) {
        for (_, timer) in self.pending.drain() {
            timer.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerFired>();
        let mut scheduler = Scheduler::new(tx);
        let start = tokio::time::Instant::now();
        scheduler.schedule(TimerKind::Retry, Duration::from_millis(2000));

        let fired = rx.recv().await.expect("timer should fire");
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        assert!(scheduler.accept(&fired));
        assert!(!scheduler.is_pending(TimerKind::Retry));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_rejected() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerFired>();
        let mut scheduler = Scheduler::new(tx);
        scheduler.schedule(TimerKind::Heartbeat, Duration::from_millis(10));
        // Let the timer post its event before the generation moves on.
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.advance();

        let fired = rx.recv().await.expect("event was already queued");
        assert!(!scheduler.accept(&fired));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_supersedes_previous_timer() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerFired>();
        let mut scheduler = Scheduler::new(tx);
        scheduler.schedule(TimerKind::Retry, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(20)).await;
        scheduler.schedule(TimerKind::Retry, Duration::from_millis(50));

        let first = rx.recv().await.unwrap();
        assert!(!scheduler.accept(&first));
        let second = rx.recv().await.unwrap();
        assert!(scheduler.accept(&second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_timers() {
        let (tx, mut rx) = mpsc::unbounded_channel::<TimerFired>();
        let mut scheduler = Scheduler::new(tx);
        scheduler.schedule(TimerKind::Retry, Duration::from_millis(100));
        scheduler.schedule(TimerKind::Heartbeat, Duration::from_millis(100));
        scheduler.cancel_all();

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}

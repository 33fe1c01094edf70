use super::scheduler::{Scheduler, TimerFired, TimerKind};
use super::transport::LinkSender;
use crate::types::OutboundFrame;
use log::*;
use std::time::Duration;

/// Fire-and-forget keep-alive pings while the connection is up.
///
/// Replies are neither required nor checked.
pub(crate) struct HeartbeatMonitor {
    interval: Duration,
    sent: u64,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self { interval, sent: 0 }
    }

    pub fn start<E>(&self, scheduler: &mut Scheduler<E>)
    where
        E: From<TimerFired> + Send + 'static,
    {
        scheduler.schedule(TimerKind::Heartbeat, self.interval);
    }

    pub fn stop<E>(&self, scheduler: &mut Scheduler<E>)
    where
        E: From<TimerFired> + Send + 'static,
    {
        scheduler.cancel(TimerKind::Heartbeat);
    }

    /// Sends one ping and arms the next beat.
    pub fn beat<E>(&mut self, link: &LinkSender, scheduler: &mut Scheduler<E>)
    where
        E: From<TimerFired> + Send + 'static,
    {
        match OutboundFrame::ping().to_text() {
            Ok(text) => {
                link.send_text(text);
                self.sent += 1;
                trace!("Heartbeat ping #{} sent", self.sent);
            }
            Err(e) => error!("Failed to encode heartbeat ping: {}", e),
        }
        self.start(scheduler);
    }
}

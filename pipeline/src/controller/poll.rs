use futures::future::{Fuse, FusedFuture, FutureExt, LocalBoxFuture};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::time::Duration;

use shared::TaskId;

use crate::client::RemoteTask;
use crate::error::ClientResult;
use crate::timer::Timer;

pub enum PollEvent {
    /// The interval elapsed; time to check every polling task.
    Tick,
    /// Outcomes of one round of status checks, in request order.
    Round(Vec<(TaskId, ClientResult<RemoteTask>)>),
}

/// The single timer shared by every polling task.
///
/// Alternates between sleeping for the interval and waiting on a round of
/// status checks. Resolves with the corresponding [`PollEvent`]; the owner
/// decides whether to start a round, re-arm or stop.
pub struct PollLoop {
    interval: Duration,
    timer: Rc<dyn Timer>,
    running: bool,
    slot: Fuse<LocalBoxFuture<'static, PollEvent>>,
}

impl PollLoop {
    pub fn new(interval: Duration, timer: Rc<dyn Timer>) -> Self {
        Self {
            interval,
            timer,
            running: false,
            slot: Fuse::terminated(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Start ticking. Returns `false` if the loop was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.running = true;
        self.arm();
        true
    }

    /// Stop ticking and drop any sleep or round in progress. Returns `false`
    /// if the loop was not running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        self.slot = Fuse::terminated();
        true
    }

    /// Sleep for another interval.
    pub fn rearm(&mut self) {
        if self.running {
            self.arm();
        }
    }

    /// Wait on a round of status checks instead of the timer.
    pub fn begin_round(&mut self, round: LocalBoxFuture<'static, PollEvent>) {
        if self.running {
            self.slot = round.fuse();
        }
    }

    fn arm(&mut self) {
        self.slot = self
            .timer
            .sleep(self.interval)
            .map(|()| PollEvent::Tick)
            .boxed_local()
            .fuse();
    }
}

impl Future for PollLoop {
    type Output = PollEvent;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<PollEvent> {
        self.slot.poll_unpin(cx)
    }
}

impl FusedFuture for PollLoop {
    fn is_terminated(&self) -> bool {
        self.slot.is_terminated()
    }
}

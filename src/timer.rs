// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Restartable periodic status polling.
//!
//! # State Machine
//!
//! ```text
//!            start()                 stop()
//!  Stopped ──────────► Running ─────────────► Stopped (terminal)
//!                      │    ▲
//!      reset_timer()   │    │  fire: read, feed sink, reschedule
//!      (reschedule)    └────┘
//! ```
//!
//! While running, the timer waits one full interval, performs the read and
//! hands a successful result to the sink. Failures are logged and never stop
//! the timer. [`PullTimerHandle::reset_timer`] pushes the next poll a full
//! interval into the future. Stopping cancels only the pending wait: a read
//! that is already in flight completes and its result still reaches the sink.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::Error;

/// Lifecycle state of a [`PullTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStatus {
    /// Not started yet, or stopped.
    Stopped,
    /// Polling.
    Running,
}

#[derive(Debug, Clone, Copy)]
enum TimerControl {
    Reset,
    Stop,
}

#[derive(Debug)]
struct TimerShared {
    status: TimerStatus,
    stopped: bool,
    last_reset_at: Option<Instant>,
}

/// Cheap handle used to defer or stop a [`PullTimer`] from elsewhere.
#[derive(Debug, Clone)]
pub struct PullTimerHandle {
    interval: Duration,
    control: mpsc::UnboundedSender<TimerControl>,
    shared: Arc<Mutex<TimerShared>>,
}

impl PullTimerHandle {
    /// Defers the next poll by a full interval from now.
    ///
    /// Does nothing unless the timer is running.
    pub fn reset_timer(&self) {
        let mut shared = self.shared.lock();
        if shared.status != TimerStatus::Running {
            return;
        }
        shared.last_reset_at = Some(Instant::now());
        let _ = self.control.send(TimerControl::Reset);
    }

    /// Stops the timer for good.
    pub fn stop(&self) {
        let mut shared = self.shared.lock();
        if shared.status == TimerStatus::Running {
            tracing::debug!("Stopping pull timer");
        }
        shared.status = TimerStatus::Stopped;
        shared.stopped = true;
        let _ = self.control.send(TimerControl::Stop);
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TimerStatus {
        self.shared.lock().status
    }

    /// Returns when the countdown was last restarted.
    #[must_use]
    pub fn last_reset_at(&self) -> Option<Instant> {
        self.shared.lock().last_reset_at
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Periodic poller owning its own task.
///
/// Dropping the timer aborts its task.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use http_outlet::timer::{PullTimer, TimerStatus};
///
/// # #[tokio::main]
/// # async fn main() {
/// let timer = PullTimer::new(Duration::from_secs(30));
/// timer.start(
///     || async { Ok(true) },
///     |on| println!("polled: {on}"),
/// );
/// assert_eq!(timer.status(), TimerStatus::Running);
///
/// timer.handle().reset_timer();
/// timer.stop();
/// assert_eq!(timer.status(), TimerStatus::Stopped);
/// # }
/// ```
#[derive(Debug)]
pub struct PullTimer {
    handle: PullTimerHandle,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<TimerControl>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PullTimer {
    /// Creates a stopped timer.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let (control, receiver) = mpsc::unbounded_channel();
        Self {
            handle: PullTimerHandle {
                interval,
                control,
                shared: Arc::new(Mutex::new(TimerShared {
                    status: TimerStatus::Stopped,
                    stopped: false,
                    last_reset_at: None,
                })),
            },
            receiver: Mutex::new(Some(receiver)),
            task: Mutex::new(None),
        }
    }

    /// Returns a handle to this timer.
    #[must_use]
    pub fn handle(&self) -> PullTimerHandle {
        self.handle.clone()
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.handle.interval
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn status(&self) -> TimerStatus {
        self.handle.status()
    }

    /// Starts polling: `read` runs one interval from now and then once per
    /// interval, and every successful result is passed to `sink`.
    ///
    /// Must be called from within a Tokio runtime. Calling it on a running
    /// or stopped timer does nothing.
    pub fn start<R, Fut, S>(&self, read: R, sink: S)
    where
        R: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, Error>> + Send + 'static,
        S: Fn(bool) + Send + Sync + 'static,
    {
        {
            let mut shared = self.handle.shared.lock();
            if shared.stopped || shared.status == TimerStatus::Running {
                tracing::debug!(status = ?shared.status, "Pull timer cannot be started again");
                return;
            }
            shared.status = TimerStatus::Running;
            shared.last_reset_at = Some(Instant::now());
        }

        let Some(receiver) = self.receiver.lock().take() else {
            return;
        };

        let interval = self.handle.interval;
        tracing::debug!(interval_ms = interval.as_millis(), "Starting pull timer");

        let task = tokio::spawn(run_timer(interval, receiver, read, sink));
        *self.task.lock() = Some(task);
    }

    /// Stops the timer for good.
    pub fn stop(&self) {
        self.handle.stop();
    }
}

impl Drop for PullTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

async fn run_timer<R, Fut, S>(
    interval: Duration,
    mut control: mpsc::UnboundedReceiver<TimerControl>,
    read: R,
    sink: S,
) where
    R: Fn() -> Fut,
    Fut: Future<Output = Result<bool, Error>>,
    S: Fn(bool),
{
    loop {
        let sleep = tokio::time::sleep(interval);
        tokio::pin!(sleep);

        // A pending reset wins over an expired deadline
        tokio::select! {
            biased;

            command = control.recv() => match command {
                Some(TimerControl::Reset) => {
                    tracing::trace!("Pull timer reset");
                }
                Some(TimerControl::Stop) | None => break,
            },
            () = &mut sleep => {
                tracing::trace!("Pull timer fired");
                match read().await {
                    Ok(value) => sink(value),
                    Err(err) => tracing::warn!(error = %err, "Pull timer status read failed"),
                }
            }
        }
    }

    tracing::debug!("Pull timer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::RequestError;

    fn counting_timer(
        interval: Duration,
        result: Result<bool, RequestError>,
    ) -> (PullTimer, Arc<AtomicUsize>, Arc<Mutex<Vec<bool>>>) {
        let timer = PullTimer::new(interval);
        let reads = Arc::new(AtomicUsize::new(0));
        let values = Arc::new(Mutex::new(Vec::new()));

        let read_count = reads.clone();
        let sink_values = values.clone();
        timer.start(
            move || {
                read_count.fetch_add(1, Ordering::SeqCst);
                let result = result.clone().map_err(Error::from);
                async move { result }
            },
            move |value| sink_values.lock().push(value),
        );

        (timer, reads, values)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_interval() {
        let (timer, reads, values) = counting_timer(Duration::from_secs(10), Ok(true));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(values.lock().as_slice(), &[true, true]);

        timer.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn reset_defers_next_poll_by_full_interval() {
        let (timer, reads, _values) = counting_timer(Duration::from_secs(10), Ok(false));

        tokio::time::sleep(Duration::from_secs(9)).await;
        timer.handle().reset_timer();

        // Original deadline (t=10) passes without a poll
        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_pending_at_deadline_wins() {
        let (timer, reads, _values) = counting_timer(Duration::from_secs(10), Ok(false));
        tokio::task::yield_now().await;

        // Reset is queued before the timer task sees its deadline expire
        timer.handle().reset_timer();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_timer() {
        let (timer, reads, values) = counting_timer(
            Duration::from_secs(5),
            Err(RequestError::HttpStatus {
                code: 500,
                body: String::new(),
            }),
        );

        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(reads.load(Ordering::SeqCst), 3);
        assert!(values.lock().is_empty());
        assert_eq!(timer.status(), TimerStatus::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_pending_poll() {
        let (timer, reads, _values) = counting_timer(Duration::from_secs(5), Ok(true));

        tokio::time::sleep(Duration::from_secs(4)).await;
        timer.stop();
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(timer.status(), TimerStatus::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_timer_cannot_restart() {
        let (timer, reads, _values) = counting_timer(Duration::from_secs(5), Ok(true));
        timer.stop();

        timer.start(|| async { Ok(true) }, |_| {});
        tokio::time::sleep(Duration::from_secs(20)).await;

        assert_eq!(timer.status(), TimerStatus::Stopped);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_on_stopped_timer_is_ignored() {
        let timer = PullTimer::new(Duration::from_secs(5));
        let handle = timer.handle();

        handle.reset_timer();

        assert_eq!(handle.status(), TimerStatus::Stopped);
        assert!(handle.last_reset_at().is_none());
        assert_eq!(handle.interval(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_records_time() {
        let (timer, _reads, _values) = counting_timer(Duration::from_secs(5), Ok(true));
        let started = timer.handle().last_reset_at().unwrap();

        tokio::time::sleep(Duration::from_secs(3)).await;
        timer.handle().reset_timer();

        let reset = timer.handle().last_reset_at().unwrap();
        assert_eq!(reset - started, Duration::from_secs(3));
    }
}

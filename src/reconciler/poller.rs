//! Scoped refresh timers.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::channel::Channel;

/// Shortest period a poller accepts.
pub const MIN_PERIOD: Duration = Duration::from_millis(10);

/// Owns one running poll loop. Dropping the handle stops the loop.
pub struct PollHandle {
    channel: Channel,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Stop scheduling ticks. A tick already running finishes on its own and
    /// is subject to the reconciler's apply-time checks.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Stop and wait for the loop task to exit.
    pub async fn join(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Run `tick` every `period` until `token` is cancelled. The first tick fires
/// one period after the call; the caller performs its own initial load.
///
/// Each tick runs in its own task so a slow fetch never delays the timer;
/// whether an overlapping tick may fetch is decided by the channel guard.
pub(crate) fn spawn<F, Fut>(
    channel: Channel,
    period: Duration,
    token: CancellationToken,
    tick: F,
) -> PollHandle
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let period = period.max(MIN_PERIOD);
    let loop_token = token.clone();

    let task = tokio::spawn(async move {
        let mut ticker = interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        debug!(channel = %channel, period_ms = period.as_millis() as u64, "Poller started");

        loop {
            tokio::select! {
                biased;
                _ = loop_token.cancelled() => break,
                _ = ticker.tick() => {
                    trace!(channel = %channel, "Poll tick");
                    tokio::spawn(tick());
                }
            }
        }

        debug!(channel = %channel, "Poller stopped");
    });

    PollHandle {
        channel,
        token,
        task: Some(task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() -> std::future::Ready<()> + Send + Sync + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_until_stopped() {
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            Channel::Jobs,
            Duration::from_secs(10),
            CancellationToken::new(),
            counting(&counter),
        );

        tokio::time::sleep(Duration::from_secs(35)).await;
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);

        handle.stop();
        assert!(handle.is_stopped());
        tokio::time::sleep(Duration::from_secs(60)).await;
        tokio::task::yield_now().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_loop() {
        let counter = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let handle = spawn(
            Channel::Notifications,
            Duration::from_secs(60),
            token.clone(),
            counting(&counter),
        );
        drop(handle);

        assert!(token.is_cancelled());
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}

// Resend cooldown countdown.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// A running countdown. Dropping it stops the ticks.
#[derive(Debug)]
pub struct Countdown {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Countdown {
    /// Call `on_tick` once per `period` until it returns `false` or `parent`
    /// (or this countdown) is cancelled. The first tick fires one period from now.
    pub fn start<F>(period: Duration, parent: &CancellationToken, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let token = parent.child_token();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        if !on_tick() {
                            break;
                        }
                    }
                }
            }
            tracing::trace!("Resend countdown finished");
        });
        Self { token, handle }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

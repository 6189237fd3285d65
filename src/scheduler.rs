// Tick scheduling for the long-running chart: owns the applet, the command runner and
// the interval timer, and applies configuration reloads to all three.
use crate::applet::{Applet, TickOutcome};
use crate::command::CommandRunner;
use crate::config::{ChartConfig, RefreshSet};
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// A ticker whose first tick is one full period away.
fn schedule(period: Duration) -> Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

pub struct Scheduler<'r> {
    applet: Applet,
    runner: &'r dyn CommandRunner,
    ticker: Interval,
}

impl<'r> Scheduler<'r> {
    /// Run the first tick right away, then schedule the next one a full period out.
    pub async fn start(mut applet: Applet, runner: &'r dyn CommandRunner) -> Self {
        applet.tick(runner).await;
        let ticker = schedule(applet.config().interval());
        Self {
            applet,
            runner,
            ticker,
        }
    }

    pub fn applet(&self) -> &Applet {
        &self.applet
    }

    /// Wait for the next scheduled tick and run it. Cancel safe.
    pub async fn next_tick(&mut self) -> TickOutcome {
        self.ticker.tick().await;
        self.applet.tick(self.runner).await
    }

    /// Apply a freshly loaded configuration. The caller repaints when `canvas` is set.
    pub async fn reconfigure(&mut self, next: ChartConfig) -> RefreshSet {
        let refresh = self.applet.reconfigure(next);
        if refresh.timer {
            // Replacing the interval drops the pending tick with it
            self.ticker = schedule(self.applet.config().interval());
            debug!("Rescheduled ticks every {:?}", self.applet.config().interval());
        }
        if refresh.command {
            self.applet.tick(self.runner).await;
        }
        refresh
    }
}

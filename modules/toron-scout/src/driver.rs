use std::future::Future;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::service::Toron;

/// Run a cycle every `interval` until `shutdown` resolves. A cycle always
/// finishes or is dropped before the next tick is awaited, so cycles never
/// overlap; a slow cycle pushes the schedule back instead of bunching ticks.
pub async fn run_forever(toron: &Toron, interval: Duration, shutdown: impl Future<Output = ()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = ticker.tick() => {}
        }

        let started = Instant::now();
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested mid-cycle");
                break;
            }
            result = toron.run_cycle() => match result {
                Ok(stats) => info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    shows = stats.shows,
                    "Cycle finished"
                ),
                Err(e) => error!(error = %e, "Cycle failed, will retry next interval"),
            },
        }
    }

    info!("Driver stopped");
}

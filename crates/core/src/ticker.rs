//! Fixed-rate animation driver: bumps the timestamp by one every period.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::{
    swap::{SwapError, SwapHandle},
    time::{SharedTimestamp, TimeControl},
};

/// Aborts the ticking task when dropped.
#[derive(Debug)]
pub struct TimestampTicker {
    task: JoinHandle<()>,
}

impl TimestampTicker {
    /// Starts ticking on the current tokio runtime. The first tick fires
    /// immediately.
    pub fn spawn(swaps: SwapHandle, clock: SharedTimestamp, period: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let next = clock.current_timestamp().next();
                match swaps.set_timestamp(next).await {
                    Ok(()) => {}
                    Err(SwapError::DriverStopped) => {
                        debug!("swap driver stopped, stopping timestamp ticker");
                        break;
                    }
                    // the controller is idle again, the next tick retries
                    Err(err) => warn!(%err, timestamp = %next, "animation step failed"),
                }
            }
        });

        Self { task }
    }

    /// Same as dropping the ticker.
    pub fn stop(self) {}

    /// Aborts the task and waits until it has stopped, so no timestamp
    /// update can be sent after this returns.
    pub async fn shutdown(mut self) {
        self.task.abort();
        let _ = (&mut self.task).await;
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for TimestampTicker {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::{SwapConfig, TileConfig},
        surface::{SurfaceError, memory::InMemorySurface},
        swap::{SwapController, SwapDriver},
        tile::AnimatedTileProvider,
        time::Timestamp,
    };

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_ticks_advance_timestamp() {
        let surface = Arc::new(InMemorySurface::new());
        let provider = Arc::new(AnimatedTileProvider::new(TileConfig::default()));
        let clock = provider.timestamps();
        let (driver, swaps) =
            SwapDriver::new(SwapController::new(surface.clone(), provider, SwapConfig::default()));
        tokio::spawn(driver.run());
        swaps.show().await.unwrap();

        let ticker = TimestampTicker::spawn(swaps.clone(), clock.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        // ticks at 0s, 1s, 2s and 3s starting from UNSET
        assert_eq!(clock.current_timestamp(), Timestamp::new(3));
        assert_eq!(swaps.snapshot().await.unwrap().swaps_completed, 4);

        ticker.stop();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(clock.current_timestamp(), Timestamp::new(3));
        assert_eq!(surface.live_count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_ticking_survives_failed_step() {
        let surface = Arc::new(InMemorySurface::new());
        let provider = Arc::new(AnimatedTileProvider::new(TileConfig::default()));
        let clock = provider.timestamps();
        let (driver, swaps) =
            SwapDriver::new(SwapController::new(surface.clone(), provider, SwapConfig::default()));
        tokio::spawn(driver.run());
        swaps.show().await.unwrap();
        surface.fail_next_add(SurfaceError::NotReady);

        let ticker = TimestampTicker::spawn(swaps.clone(), clock.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3500)).await;

        // the tick at 0s fails to add an overlay, 1s..3s swap normally
        assert!(!ticker.is_finished());
        assert_eq!(clock.current_timestamp(), Timestamp::new(3));
        let snapshot = swaps.snapshot().await.unwrap();
        assert_eq!(snapshot.swaps_started, 3);
        assert_eq!(snapshot.swaps_completed, 3);
        assert_eq!(surface.live_count(), 1);
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_ticker_stops_with_driver() {
        let provider = Arc::new(AnimatedTileProvider::new(TileConfig::default()));
        let clock = provider.timestamps();
        let (driver, swaps) = SwapDriver::new(SwapController::new(
            Arc::new(InMemorySurface::new()),
            provider,
            SwapConfig::default(),
        ));
        drop(driver);

        let ticker = TimestampTicker::spawn(swaps, clock, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(ticker.is_finished());
    }
}

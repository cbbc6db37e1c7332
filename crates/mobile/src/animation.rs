use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use animated_tile_core::{
    config::{AnimationConfig, ConfigError, SwapConfig, TickConfig, TileConfig},
    surface::MapSurface,
    swap::{SwapController, SwapDriver, SwapError, SwapHandle, SwapPhase, SwapSnapshot},
    ticker::TimestampTicker,
    tile::AnimatedTileProvider,
    time::{SharedTimestamp, TimeControl, Timestamp},
};
use eyre::WrapErr;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::{
    host::{HostSurface, MapHost},
    logging::setup_logging,
};

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct AnimationOptions {
    pub swap_interval_ms: u64,
    pub z_index: f32,
    pub tile_size: u32,
    pub density: f32,
    pub scale: f32,
    pub marker_size: u32,
    pub tick_interval_ms: u64,
}

impl From<AnimationOptions> for AnimationConfig {
    fn from(options: AnimationOptions) -> Self {
        AnimationConfig {
            swap: SwapConfig {
                swap_interval_ms: options.swap_interval_ms,
                z_index: options.z_index,
            },
            tile: TileConfig {
                tile_size: options.tile_size,
                density: options.density,
                scale: options.scale,
                marker_size: options.marker_size,
            },
            tick: TickConfig {
                tick_interval_ms: options.tick_interval_ms,
            },
        }
    }
}

impl From<AnimationConfig> for AnimationOptions {
    fn from(config: AnimationConfig) -> Self {
        AnimationOptions {
            swap_interval_ms: config.swap.swap_interval_ms,
            z_index: config.swap.z_index,
            tile_size: config.tile.tile_size,
            density: config.tile.density,
            scale: config.tile.scale,
            marker_size: config.tile.marker_size,
            tick_interval_ms: config.tick.tick_interval_ms,
        }
    }
}

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum AnimationError {
    #[error("invalid animation config: {0}")]
    Config(String),
    #[error("failed to start tile animation: {0}")]
    Startup(String),
    #[error("{0}")]
    Swap(String),
}

impl From<ConfigError> for AnimationError {
    fn from(error: ConfigError) -> Self {
        AnimationError::Config(error.to_string())
    }
}

impl From<SwapError> for AnimationError {
    fn from(error: SwapError) -> Self {
        AnimationError::Swap(error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, uniffi::Record)]
pub struct AnimationSnapshot {
    pub visible: bool,
    pub swapping: bool,
    pub held_overlays: u32,
    pub timestamp: i64,
    pub pending_timestamp: Option<i64>,
    pub swaps_started: u64,
    pub swaps_completed: u64,
}

impl From<SwapSnapshot> for AnimationSnapshot {
    fn from(snapshot: SwapSnapshot) -> Self {
        AnimationSnapshot {
            visible: snapshot.phase.is_visible(),
            swapping: snapshot.phase == SwapPhase::VisibleSwapping,
            held_overlays: snapshot.held_overlays() as u32,
            timestamp: snapshot.timestamp.get(),
            pending_timestamp: snapshot.pending.map(Timestamp::get),
            swaps_started: snapshot.swaps_started,
            swaps_completed: snapshot.swaps_completed,
        }
    }
}

/// An animated tile overlay on one platform map.
///
/// All methods block until the swap thread has applied them and may be
/// called from any thread, typically the UI thread.
#[derive(uniffi::Object)]
pub struct TileAnimation {
    runtime: Runtime,
    swaps: SwapHandle,
    timestamps: SharedTimestamp,
    tick_interval: Duration,
    ticker: Mutex<Option<TimestampTicker>>,
}

#[uniffi::export]
impl TileAnimation {
    #[uniffi::constructor]
    pub fn new(host: Arc<dyn MapHost>, options: AnimationOptions) -> Result<Arc<Self>, AnimationError> {
        Self::with_config(host, options.into())
    }

    #[uniffi::constructor]
    pub fn from_json(host: Arc<dyn MapHost>, json: String) -> Result<Arc<Self>, AnimationError> {
        let config: AnimationConfig =
            serde_json::from_str(&json).map_err(|e| AnimationError::Config(e.to_string()))?;
        Self::with_config(host, config)
    }

    pub fn show(&self) -> Result<(), AnimationError> {
        Ok(self.swaps.show_blocking()?)
    }

    /// Removes the overlay and stops any running animation.
    pub fn hide(&self) -> Result<(), AnimationError> {
        self.stop_animating();
        Ok(self.swaps.hide_blocking()?)
    }

    pub fn set_timestamp(&self, timestamp: i64) -> Result<(), AnimationError> {
        Ok(self.swaps.set_timestamp_blocking(timestamp)?)
    }

    pub fn current_timestamp(&self) -> i64 {
        self.timestamps.current_timestamp().get()
    }

    /// Advances the timestamp by one every tick interval until stopped.
    /// Restarts the ticker if it is already running.
    pub fn start_animating(&self) {
        let _guard = self.runtime.enter();
        let ticker = TimestampTicker::spawn(
            self.swaps.clone(),
            self.timestamps.clone(),
            self.tick_interval,
        );
        if let Some(previous) = self.ticker_slot().replace(ticker) {
            debug!(finished = previous.is_finished(), "restarting animation ticker");
        }
    }

    /// Returns once the ticker can no longer issue timestamps.
    pub fn stop_animating(&self) {
        let ticker = self.ticker_slot().take();
        if let Some(ticker) = ticker {
            self.runtime.block_on(ticker.shutdown());
        }
    }

    pub fn is_animating(&self) -> bool {
        self.ticker_slot()
            .as_ref()
            .is_some_and(|ticker| !ticker.is_finished())
    }

    pub fn snapshot(&self) -> Result<AnimationSnapshot, AnimationError> {
        Ok(self.swaps.snapshot_blocking()?.into())
    }
}

impl TileAnimation {
    fn with_config(host: Arc<dyn MapHost>, config: AnimationConfig) -> Result<Arc<Self>, AnimationError> {
        setup_logging();
        config.validate()?;

        Self::start(host, config)
            .map(Arc::new)
            .map_err(|e| AnimationError::Startup(format!("{e:#}")))
    }

    fn start(host: Arc<dyn MapHost>, config: AnimationConfig) -> eyre::Result<Self> {
        let runtime = Runtime::new().wrap_err("failed to create ticker runtime")?;

        let provider = Arc::new(AnimatedTileProvider::new(config.tile.clone()));
        let timestamps = provider.timestamps();
        let surface: Arc<dyn MapSurface> = Arc::new(HostSurface::new(host));
        let controller = SwapController::new(surface, provider, config.swap.clone());
        let swaps = SwapDriver::start(controller).wrap_err("failed to spawn swap thread")?;

        info!(?config, "tile animation ready");

        Ok(Self {
            runtime,
            swaps,
            timestamps,
            tick_interval: config.tick.tick_interval(),
            ticker: Mutex::new(None),
        })
    }

    fn ticker_slot(&self) -> std::sync::MutexGuard<'_, Option<TimestampTicker>> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::host::tests::FakeHost;

    /// Polls `done` on the real clock with a deadline generous enough for a
    /// loaded machine.
    fn wait_until(mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        done()
    }

    fn fast_options() -> AnimationOptions {
        AnimationOptions {
            swap_interval_ms: 10,
            tick_interval_ms: 20,
            ..AnimationOptions::from(AnimationConfig::default())
        }
    }

    #[test]
    fn test_options_round_trip_defaults() {
        let options: AnimationOptions = AnimationConfig::default().into();
        assert_eq!(options.swap_interval_ms, 100);
        assert_eq!(options.tile_size, 256);
        assert_eq!(AnimationConfig::from(options), AnimationConfig::default());
    }

    #[test]
    fn test_invalid_options_are_rejected() {
        let options = AnimationOptions {
            tile_size: 2,
            ..fast_options()
        };
        let error = TileAnimation::new(Arc::new(FakeHost::default()), options)
            .err()
            .unwrap();
        assert!(matches!(error, AnimationError::Config(_)));

        let error = TileAnimation::from_json(Arc::new(FakeHost::default()), "{ nope".into())
            .err()
            .unwrap();
        assert!(matches!(error, AnimationError::Config(_)));
    }

    #[test]
    fn test_show_swap_hide() {
        let host = Arc::new(FakeHost::default());
        let options = AnimationOptions {
            swap_interval_ms: 500,
            ..fast_options()
        };
        let animation = TileAnimation::new(host.clone(), options).unwrap();

        animation.set_timestamp(8).unwrap();
        assert_eq!(animation.current_timestamp(), 8);
        assert!(!animation.snapshot().unwrap().visible);

        animation.show().unwrap();
        assert!(matches!(animation.show(), Err(AnimationError::Swap(_))));

        animation.set_timestamp(9).unwrap();
        let snapshot = animation.snapshot().unwrap();
        assert!(snapshot.swapping);
        assert_eq!(snapshot.held_overlays, 2);

        assert!(wait_until(|| !animation.snapshot().unwrap().swapping));
        let snapshot = animation.snapshot().unwrap();
        assert!(snapshot.visible);
        assert_eq!(snapshot.swaps_completed, 1);
        assert_eq!(host.live.lock().unwrap().len(), 1);

        animation.hide().unwrap();
        assert!(host.live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_animating_advances_until_hidden() {
        let host = Arc::new(FakeHost::default());
        let animation = TileAnimation::from_json(
            host.clone(),
            r#"{ "swap": { "swap_interval_ms": 5 }, "tick": { "tick_interval_ms": 20 } }"#.into(),
        )
        .unwrap();

        animation.show().unwrap();
        animation.start_animating();
        assert!(animation.is_animating());
        assert!(wait_until(|| animation.current_timestamp() >= 2));

        animation.hide().unwrap();
        assert!(!animation.is_animating());
        let reached = animation.current_timestamp();

        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(animation.current_timestamp(), reached);
        assert!(host.live.lock().unwrap().is_empty());
    }
}

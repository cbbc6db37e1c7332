//! Tunables for tile rendering, overlay swapping and the animation ticker.
//!
//! Every field has a default, so partial documents deserialize:
//!
//! ```
//! use animated_tile_core::config::AnimationConfig;
//!
//! let config: AnimationConfig =
//!     serde_json::from_str(r#"{ "swap": { "swap_interval_ms": 150 } }"#).unwrap();
//! assert_eq!(config.swap.swap_interval_ms, 150);
//! assert_eq!(config.tile.tile_size, 256);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest bitmap edge a tile may be rendered at.
pub const MAX_BITMAP_SIZE: u32 = 4096;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwapConfig {
    /// How long the outgoing overlay stays on the map after its replacement
    /// has been added. Too short flickers, too long lags the animation.
    pub swap_interval_ms: u64,
    /// Paint order shared by both overlay slots.
    pub z_index: f32,
}

impl SwapConfig {
    pub fn swap_interval(&self) -> Duration {
        Duration::from_millis(self.swap_interval_ms)
    }
}

impl Default for SwapConfig {
    fn default() -> Self {
        Self {
            swap_interval_ms: 100,
            z_index: 99.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Logical tile edge reported to the map, in pixels.
    pub tile_size: u32,
    /// Display density of the device.
    pub density: f32,
    /// Bitmap scale relative to the logical tile at density 1.
    pub scale: f32,
    /// Edge of the frame marker before scaling.
    pub marker_size: u32,
}

impl TileConfig {
    pub fn scale_factor(&self) -> f32 {
        self.density * self.scale
    }

    /// Edge of the encoded bitmap in pixels.
    pub fn bitmap_size(&self) -> u32 {
        (self.tile_size as f32 * self.scale_factor()) as u32
    }
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            density: 1.0,
            scale: 0.6,
            marker_size: 20,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub swap: SwapConfig,
    pub tile: TileConfig,
    pub tick: TickConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Period of the timestamp ticker.
    pub tick_interval_ms: u64,
}

impl TickConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("tile_size must be larger than 4, got {0}")]
    TileTooSmall(u32),
    #[error("{field} must be a positive finite number, got {value}")]
    NotPositive { field: &'static str, value: f32 },
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
    #[error("tile bitmap would be empty at scale factor {0}")]
    EmptyBitmap(f32),
    #[error("tile bitmap edge {0} exceeds the {MAX_BITMAP_SIZE} px limit")]
    BitmapTooLarge(u32),
}

impl AnimationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tile.tile_size <= 4 {
            return Err(ConfigError::TileTooSmall(self.tile.tile_size));
        }

        for (field, value) in [("density", self.tile.density), ("scale", self.tile.scale)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::NotPositive { field, value });
            }
        }

        match self.tile.bitmap_size() {
            0 => return Err(ConfigError::EmptyBitmap(self.tile.scale_factor())),
            size if size > MAX_BITMAP_SIZE => return Err(ConfigError::BitmapTooLarge(size)),
            _ => {}
        }

        if self.swap.swap_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("swap_interval_ms"));
        }

        if self.tick.tick_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("tick_interval_ms"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnimationConfig::default();
        assert_eq!(config.swap.swap_interval(), Duration::from_millis(100));
        assert_eq!(config.swap.z_index, 99.0);
        assert_eq!(config.tile.bitmap_size(), 153);
        assert_eq!(config.tick.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_partial_json() {
        let config: AnimationConfig =
            serde_json::from_str(r#"{ "tile": { "density": 2.5 }, "tick": { "tick_interval_ms": 250 } }"#)
                .unwrap();

        assert_eq!(config.tile.density, 2.5);
        assert_eq!(config.tile.tile_size, 256);
        assert_eq!(config.tile.bitmap_size(), 384);
        assert_eq!(config.tick.tick_interval_ms, 250);
        assert_eq!(config.swap, SwapConfig::default());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = AnimationConfig::default();
        config.tile.tile_size = 4;
        assert_eq!(config.validate(), Err(ConfigError::TileTooSmall(4)));

        let mut config = AnimationConfig::default();
        config.tile.density = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::NotPositive { field: "density", .. })
        ));

        let mut config = AnimationConfig::default();
        config.tile.scale = 0.001;
        assert!(matches!(config.validate(), Err(ConfigError::EmptyBitmap(_))));

        let mut config = AnimationConfig::default();
        config.tile.tile_size = 200_000;
        config.tile.scale = 1.0;
        assert_eq!(config.validate(), Err(ConfigError::BitmapTooLarge(200_000)));

        let mut config = AnimationConfig::default();
        config.tile.tile_size = 4096;
        config.tile.scale = 1.0;
        assert_eq!(config.validate(), Ok(()));
        config.tile.density = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::BitmapTooLarge(6144)));

        let mut config = AnimationConfig::default();
        config.swap.swap_interval_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroInterval("swap_interval_ms"))
        );
    }
}

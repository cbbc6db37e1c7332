//! # animated-tile-core
//!
//! Flicker-free animated tile overlays for map surfaces that can only add and
//! remove overlays.
//!
//! A [`SwapController`] keeps the visible overlay current with a logical
//! [`Timestamp`] by adding a replacement overlay first and retiring the old
//! one after a short delay, so the map never shows an empty frame between
//! two animation steps. [`SwapDriver`] runs the controller on a single
//! designated thread and hands out cloneable [`SwapHandle`]s.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use animated_tile_core::prelude::*;
//!
//! let surface = Arc::new(InMemorySurface::new());
//! let provider = Arc::new(AnimatedTileProvider::new(TileConfig::default()));
//! let clock = provider.timestamps();
//!
//! let mut controller = SwapController::new(surface.clone(), provider, SwapConfig::default());
//! controller.show().unwrap();
//!
//! let ticket = controller.set_timestamp(Timestamp::new(1)).unwrap();
//! assert_eq!(surface.live_count(), 2); // old and new overlay overlap
//! assert_eq!(clock.current_timestamp(), Timestamp::new(1));
//!
//! let completion = controller.complete_swap(ticket.unwrap());
//! assert!(completion.warnings.is_empty());
//! assert_eq!(surface.live_count(), 1);
//! ```

pub mod config;
pub mod surface;
pub mod swap;
pub mod ticker;
pub mod tile;
pub mod time;

pub mod prelude {
    pub use crate::config::{AnimationConfig, ConfigError, SwapConfig, TickConfig, TileConfig};
    pub use crate::surface::{
        MapSurface, OverlayHandle, SurfaceError, TileOverlayOptions,
        memory::{InMemorySurface, SurfaceEvent},
    };
    pub use crate::swap::{
        RemovalTicket, SlotId, SwapCompletion, SwapController, SwapDriver, SwapError, SwapHandle,
        SwapPhase, SwapSnapshot,
    };
    pub use crate::ticker::TimestampTicker;
    pub use crate::tile::{
        AnimatedTileProvider, Tile, TileCoord, TileError, TileProvider, TimedTileProvider,
    };
    pub use crate::time::{SharedTimestamp, TimeControl, Timestamp};
}

pub use prelude::*;

pub mod animated;

use bytes::Bytes;

use crate::time::TimeControl;

pub use animated::AnimatedTileProvider;

/// Tile address as the map host asks for it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
    pub zoom: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32, zoom: i32) -> Self {
        Self { x, y, zoom }
    }
}

/// An encoded raster tile. `width`/`height` are the logical size the map
/// lays the tile out at; `data` is a PNG that may be larger on dense screens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum TileError {
    #[error("tile codec error: {0}")]
    Codec(#[from] image::ImageError),
    #[error("invalid tile bitmap size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// Pull-based tile source. The map host may call this from any thread, any
/// number of times, in any order relative to timestamp updates.
pub trait TileProvider: Send + Sync {
    fn get_tile(&self, coord: TileCoord) -> Result<Tile, TileError>;
}

/// A tile source whose content follows a logical timestamp.
pub trait TimedTileProvider: TileProvider + TimeControl {}

impl<T: TileProvider + TimeControl> TimedTileProvider for T {}

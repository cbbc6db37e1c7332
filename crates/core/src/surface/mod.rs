//! The map host's overlay lifecycle, as seen from the swap controller.
//!
//! Adding an overlay returns immediately; the host fetches and paints its
//! tiles later on its own schedule. Removing an overlay takes effect at once,
//! leaving a gap unless something else already covers that area.

pub mod memory;

use std::fmt;
use std::sync::Arc;

use crate::tile::TileProvider;

/// Ownership token for an overlay living on the map.
///
/// Deliberately not `Clone`: handing it back to [`MapSurface::remove_overlay`]
/// consumes it, so nothing can keep referring to a removed overlay.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct OverlayHandle {
    id: u64,
}

impl OverlayHandle {
    pub fn new(id: u64) -> Self {
        Self { id }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Clone)]
pub struct TileOverlayOptions {
    pub provider: Arc<dyn TileProvider>,
    pub z_index: f32,
    pub fade_in: bool,
}

impl TileOverlayOptions {
    pub fn new(provider: Arc<dyn TileProvider>) -> Self {
        Self {
            provider,
            z_index: 0.0,
            fade_in: true,
        }
    }

    pub fn z_index(mut self, z_index: f32) -> Self {
        self.z_index = z_index;
        self
    }

    pub fn fade_in(mut self, fade_in: bool) -> Self {
        self.fade_in = fade_in;
        self
    }
}

impl fmt::Debug for TileOverlayOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileOverlayOptions")
            .field("z_index", &self.z_index)
            .field("fade_in", &self.fade_in)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("map surface is not ready")]
    NotReady,
    #[error("overlay {0} is not on the map")]
    UnknownOverlay(u64),
    #[error("map host failed: {0}")]
    Host(String),
}

pub trait MapSurface: Send + Sync {
    fn add_tile_overlay(&self, options: TileOverlayOptions) -> Result<OverlayHandle, SurfaceError>;

    fn remove_overlay(&self, overlay: OverlayHandle) -> Result<(), SurfaceError>;
}

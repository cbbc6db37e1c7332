//! Bridges the platform map (Google Maps, MapLibre, ...) into the core
//! [`MapSurface`] contract.

use std::sync::Arc;

use animated_tile_core::{
    surface::{MapSurface, OverlayHandle, SurfaceError, TileOverlayOptions},
    tile::{TileCoord, TileProvider},
};

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum HostError {
    #[error("map is not ready")]
    NotReady,
    #[error("overlay {overlay_id} is not on the map")]
    UnknownOverlay { overlay_id: u64 },
    #[error("{message}")]
    Rejected { message: String },
    #[error("unexpected callback failure: {reason}")]
    Unexpected { reason: String },
}

impl From<uniffi::UnexpectedUniFFICallbackError> for HostError {
    fn from(error: uniffi::UnexpectedUniFFICallbackError) -> Self {
        HostError::Unexpected {
            reason: error.reason,
        }
    }
}

impl From<HostError> for SurfaceError {
    fn from(error: HostError) -> Self {
        match error {
            HostError::NotReady => SurfaceError::NotReady,
            HostError::UnknownOverlay { overlay_id } => SurfaceError::UnknownOverlay(overlay_id),
            other => SurfaceError::Host(other.to_string()),
        }
    }
}

/// Implemented on the platform side around the native map.
///
/// `add_tile_overlay` should add a tile overlay whose tile provider forwards
/// to `source.get_tile` and return an id for it; `remove_overlay` removes the
/// overlay with that id. Both are called from the swap thread.
#[uniffi::export(with_foreign)]
pub trait MapHost: Send + Sync {
    fn add_tile_overlay(
        &self,
        source: Arc<TileSource>,
        z_index: f32,
        fade_in: bool,
    ) -> Result<u64, HostError>;

    fn remove_overlay(&self, overlay_id: u64) -> Result<(), HostError>;
}

#[derive(uniffi::Record)]
pub struct TileData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum TileSourceError {
    #[error("{0}")]
    Generation(String),
}

/// Tile pull entry point for the platform's tile provider. Callable from any
/// thread.
#[derive(uniffi::Object)]
pub struct TileSource {
    provider: Arc<dyn TileProvider>,
}

#[uniffi::export]
impl TileSource {
    pub fn get_tile(&self, x: i32, y: i32, zoom: i32) -> Result<TileData, TileSourceError> {
        let tile = self
            .provider
            .get_tile(TileCoord::new(x, y, zoom))
            .map_err(|e| TileSourceError::Generation(e.to_string()))?;

        Ok(TileData {
            width: tile.width,
            height: tile.height,
            data: tile.data.to_vec(),
        })
    }
}

pub(crate) struct HostSurface {
    host: Arc<dyn MapHost>,
}

impl HostSurface {
    pub(crate) fn new(host: Arc<dyn MapHost>) -> Self {
        Self { host }
    }
}

impl MapSurface for HostSurface {
    fn add_tile_overlay(&self, options: TileOverlayOptions) -> Result<OverlayHandle, SurfaceError> {
        let source = Arc::new(TileSource {
            provider: options.provider,
        });

        self.host
            .add_tile_overlay(source, options.z_index, options.fade_in)
            .map(OverlayHandle::new)
            .map_err(SurfaceError::from)
    }

    fn remove_overlay(&self, overlay: OverlayHandle) -> Result<(), SurfaceError> {
        self.host
            .remove_overlay(overlay.id())
            .map_err(SurfaceError::from)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use animated_tile_core::{config::TileConfig, tile::AnimatedTileProvider};

    use super::*;

    /// Stands in for the platform map.
    #[derive(Default)]
    pub(crate) struct FakeHost {
        pub(crate) next_id: Mutex<u64>,
        pub(crate) live: Mutex<Vec<(u64, Arc<TileSource>)>>,
        pub(crate) refuse: Mutex<bool>,
    }

    impl MapHost for FakeHost {
        fn add_tile_overlay(
            &self,
            source: Arc<TileSource>,
            _z_index: f32,
            _fade_in: bool,
        ) -> Result<u64, HostError> {
            if *self.refuse.lock().unwrap() {
                return Err(HostError::NotReady);
            }
            let mut next_id = self.next_id.lock().unwrap();
            *next_id += 1;
            self.live.lock().unwrap().push((*next_id, source));
            Ok(*next_id)
        }

        fn remove_overlay(&self, overlay_id: u64) -> Result<(), HostError> {
            let mut live = self.live.lock().unwrap();
            let position = live
                .iter()
                .position(|(id, _)| *id == overlay_id)
                .ok_or(HostError::UnknownOverlay { overlay_id })?;
            live.remove(position);
            Ok(())
        }
    }

    #[test]
    fn test_host_errors_map_to_surface_errors() {
        assert_eq!(SurfaceError::from(HostError::NotReady), SurfaceError::NotReady);
        assert_eq!(
            SurfaceError::from(HostError::UnknownOverlay { overlay_id: 4 }),
            SurfaceError::UnknownOverlay(4)
        );
        assert_eq!(
            SurfaceError::from(HostError::Rejected {
                message: "paused".into()
            }),
            SurfaceError::Host("paused".into())
        );
    }

    #[test]
    fn test_surface_adapter_round_trip() {
        let host = Arc::new(FakeHost::default());
        let surface = HostSurface::new(host.clone());
        let provider = Arc::new(AnimatedTileProvider::new(TileConfig::default()));

        let overlay = surface
            .add_tile_overlay(TileOverlayOptions::new(provider).z_index(3.0))
            .unwrap();
        assert_eq!(overlay.id(), 1);

        let tile = host.live.lock().unwrap()[0].1.get_tile(0, 0, 2).unwrap();
        assert_eq!((tile.width, tile.height), (256, 256));
        assert!(tile.data.starts_with(b"\x89PNG"));

        surface.remove_overlay(overlay).unwrap();
        assert!(host.live.lock().unwrap().is_empty());
        assert_eq!(
            surface.remove_overlay(OverlayHandle::new(1)),
            Err(SurfaceError::UnknownOverlay(1))
        );
    }

    #[test]
    fn test_refused_add() {
        let host = Arc::new(FakeHost::default());
        *host.refuse.lock().unwrap() = true;
        let surface = HostSurface::new(host);
        let provider = Arc::new(AnimatedTileProvider::new(TileConfig::default()));

        assert_eq!(
            surface
                .add_tile_overlay(TileOverlayOptions::new(provider))
                .unwrap_err(),
            SurfaceError::NotReady
        );
    }
}

//! A map surface that lives entirely in memory.
//!
//! Records every overlay change, can be told to fail the next add or remove,
//! and can composite what a map would show at a tile address. Used by the
//! tests and by the preview tool.

use std::sync::{Mutex, MutexGuard, PoisonError};

use image::{ImageFormat, RgbaImage, imageops};

use crate::{
    surface::{MapSurface, OverlayHandle, SurfaceError, TileOverlayOptions},
    tile::{TileCoord, TileError},
};

#[derive(Clone, Debug, PartialEq)]
pub enum SurfaceEvent {
    Added { id: u64, z_index: f32, fade_in: bool },
    Removed { id: u64 },
    AddFailed(SurfaceError),
    RemoveFailed { id: u64, error: SurfaceError },
}

struct LiveOverlay {
    id: u64,
    options: TileOverlayOptions,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    live: Vec<LiveOverlay>,
    events: Vec<SurfaceEvent>,
    fail_next_add: Option<SurfaceError>,
    fail_next_remove: Option<SurfaceError>,
}

#[derive(Default)]
pub struct InMemorySurface {
    inner: Mutex<Inner>,
}

impl InMemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ids of overlays currently on the map, oldest first.
    pub fn live_overlays(&self) -> Vec<u64> {
        self.lock().live.iter().map(|overlay| overlay.id).collect()
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.lock().events.clone()
    }

    pub fn added_count(&self) -> usize {
        self.lock()
            .events
            .iter()
            .filter(|event| matches!(event, SurfaceEvent::Added { .. }))
            .count()
    }

    /// The next `add_tile_overlay` call fails with `error`.
    pub fn fail_next_add(&self, error: SurfaceError) {
        self.lock().fail_next_add = Some(error);
    }

    /// The next `remove_overlay` call fails with `error` and leaves the
    /// overlay on the map.
    pub fn fail_next_remove(&self, error: SurfaceError) {
        self.lock().fail_next_remove = Some(error);
    }

    /// Pulls `coord` from every live overlay and paints them in z order.
    /// Returns `None` when nothing is on the map.
    pub fn composite(&self, coord: TileCoord) -> Result<Option<RgbaImage>, TileError> {
        let mut layers: Vec<_> = self
            .lock()
            .live
            .iter()
            .map(|overlay| (overlay.options.z_index, overlay.options.provider.clone()))
            .collect();
        // stable, so equal z keeps insertion order
        layers.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut canvas: Option<RgbaImage> = None;
        for (_, provider) in layers {
            let tile = provider.get_tile(coord)?;
            let layer = image::load_from_memory_with_format(&tile.data, ImageFormat::Png)?.to_rgba8();
            canvas = Some(match canvas.take() {
                Some(mut below) => {
                    imageops::overlay(&mut below, &layer, 0, 0);
                    below
                }
                None => layer,
            });
        }

        Ok(canvas)
    }
}

impl MapSurface for InMemorySurface {
    fn add_tile_overlay(&self, options: TileOverlayOptions) -> Result<OverlayHandle, SurfaceError> {
        let mut inner = self.lock();
        if let Some(error) = inner.fail_next_add.take() {
            inner.events.push(SurfaceEvent::AddFailed(error.clone()));
            return Err(error);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.events.push(SurfaceEvent::Added {
            id,
            z_index: options.z_index,
            fade_in: options.fade_in,
        });
        inner.live.push(LiveOverlay { id, options });

        Ok(OverlayHandle::new(id))
    }

    fn remove_overlay(&self, overlay: OverlayHandle) -> Result<(), SurfaceError> {
        let mut inner = self.lock();
        let id = overlay.id();
        if let Some(error) = inner.fail_next_remove.take() {
            inner.events.push(SurfaceEvent::RemoveFailed {
                id,
                error: error.clone(),
            });
            return Err(error);
        }

        let Some(position) = inner.live.iter().position(|live| live.id == id) else {
            let error = SurfaceError::UnknownOverlay(id);
            inner.events.push(SurfaceEvent::RemoveFailed {
                id,
                error: error.clone(),
            });
            return Err(error);
        };

        inner.live.remove(position);
        inner.events.push(SurfaceEvent::Removed { id });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::TileConfig,
        tile::AnimatedTileProvider,
        time::{TimeControl, Timestamp},
    };

    fn options(z_index: f32) -> TileOverlayOptions {
        TileOverlayOptions::new(Arc::new(AnimatedTileProvider::new(TileConfig::default())))
            .z_index(z_index)
    }

    #[test]
    fn test_add_and_remove() {
        let surface = InMemorySurface::new();
        let first = surface.add_tile_overlay(options(1.0)).unwrap();
        let second = surface.add_tile_overlay(options(1.0).fade_in(false)).unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(surface.live_overlays(), vec![first.id(), second.id()]);

        let first_id = first.id();
        surface.remove_overlay(first).unwrap();
        assert_eq!(surface.live_count(), 1);
        assert_eq!(
            surface.events(),
            vec![
                SurfaceEvent::Added { id: 1, z_index: 1.0, fade_in: true },
                SurfaceEvent::Added { id: 2, z_index: 1.0, fade_in: false },
                SurfaceEvent::Removed { id: first_id },
            ]
        );
    }

    #[test]
    fn test_unknown_overlay() {
        let surface = InMemorySurface::new();
        assert_eq!(
            surface.remove_overlay(OverlayHandle::new(77)),
            Err(SurfaceError::UnknownOverlay(77))
        );
    }

    #[test]
    fn test_injected_failures_are_one_shot() {
        let surface = InMemorySurface::new();

        surface.fail_next_add(SurfaceError::NotReady);
        assert_eq!(surface.add_tile_overlay(options(0.0)).unwrap_err(), SurfaceError::NotReady);
        let overlay = surface.add_tile_overlay(options(0.0)).unwrap();

        surface.fail_next_remove(SurfaceError::Host("busy".into()));
        assert!(surface.remove_overlay(OverlayHandle::new(overlay.id())).is_err());
        assert_eq!(surface.live_count(), 1);
        assert!(surface.remove_overlay(overlay).is_ok());
        assert_eq!(surface.live_count(), 0);
    }

    #[test]
    fn test_composite() {
        let surface = InMemorySurface::new();
        assert!(surface.composite(TileCoord::new(0, 0, 0)).unwrap().is_none());

        let early = Arc::new(AnimatedTileProvider::new(TileConfig::default()));
        let late = Arc::new(AnimatedTileProvider::new(TileConfig::default()));
        early.set_current_timestamp(Timestamp::new(0));
        late.set_current_timestamp(Timestamp::new(100));

        surface.add_tile_overlay(TileOverlayOptions::new(early.clone())).unwrap();
        surface.add_tile_overlay(TileOverlayOptions::new(late.clone())).unwrap();

        let canvas = surface.composite(TileCoord::new(0, 0, 0)).unwrap().unwrap();
        let at_early = early.marker_bounds(Timestamp::new(0));
        let at_late = late.marker_bounds(Timestamp::new(100));

        // both frames are visible while two overlays overlap
        assert_eq!(canvas.get_pixel(at_early.x, at_early.y)[3], u8::MAX);
        assert_eq!(canvas.get_pixel(at_late.x, at_late.y)[3], u8::MAX);
    }
}

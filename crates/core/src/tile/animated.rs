use bytes::Bytes;
use image::{ExtendedColorType, ImageEncoder, Rgba, RgbaImage, codecs::png::PngEncoder};
use palette::{Hsv, IntoColor, Srgb};
use tracing::trace;

use crate::{
    config::TileConfig,
    tile::{Tile, TileCoord, TileError, TileProvider},
    time::{SharedTimestamp, TimeControl, Timestamp},
};

/// Keeps the marker from starting in the last few columns of the tile.
const EDGE_MARGIN: u32 = 4;
/// Coprime with 360 so consecutive frames never share a hue.
const HUE_STEP: i64 = 47;

/// Where the frame marker lands inside the bitmap, in bitmap pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerBounds {
    pub x: u32,
    pub y: u32,
    pub edge: u32,
}

/// Draws a square marker that walks across the tile one logical pixel per
/// frame, with a hue that rotates every frame. The image only depends on the
/// timestamp, never on the tile address.
#[derive(Debug)]
pub struct AnimatedTileProvider {
    config: TileConfig,
    timestamp: SharedTimestamp,
}

impl AnimatedTileProvider {
    pub fn new(config: TileConfig) -> Self {
        Self::with_timestamp(config, SharedTimestamp::default())
    }

    pub fn with_timestamp(config: TileConfig, timestamp: SharedTimestamp) -> Self {
        Self { config, timestamp }
    }

    /// A handle on the timestamp this provider renders from.
    pub fn timestamps(&self) -> SharedTimestamp {
        self.timestamp.clone()
    }

    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    pub fn marker_bounds(&self, timestamp: Timestamp) -> MarkerBounds {
        let scale = self.config.scale_factor();
        let travel = i64::from(self.config.tile_size.saturating_sub(EDGE_MARGIN).max(1));
        let column = timestamp.get().rem_euclid(travel);
        let edge = self.config.marker_size as f32 * scale;

        MarkerBounds {
            x: (column as f32 * scale) as u32,
            y: edge as u32,
            edge: (edge as u32).max(1),
        }
    }

    pub fn render(&self, timestamp: Timestamp) -> RgbaImage {
        let size = self.config.bitmap_size();
        let mut bitmap = RgbaImage::new(size, size);
        let marker = self.marker_bounds(timestamp);
        let color = marker_color(timestamp);

        for y in marker.y..marker.y.saturating_add(marker.edge).min(size) {
            for x in marker.x..marker.x.saturating_add(marker.edge).min(size) {
                bitmap.put_pixel(x, y, color);
            }
        }

        bitmap
    }
}

fn marker_color(timestamp: Timestamp) -> Rgba<u8> {
    let hue = (timestamp.get().rem_euclid(360) * HUE_STEP).rem_euclid(360) as f32;
    let hsv: Hsv = Hsv::new(hue, 1.0, 1.0);
    let rgb: Srgb = hsv.into_color();
    let rgb: Srgb<u8> = rgb.into_format();

    Rgba([rgb.red, rgb.green, rgb.blue, u8::MAX])
}

fn encode_png(bitmap: &RgbaImage) -> Result<Bytes, TileError> {
    let mut data = Vec::new();
    PngEncoder::new(&mut data).write_image(
        bitmap.as_raw(),
        bitmap.width(),
        bitmap.height(),
        ExtendedColorType::Rgba8,
    )?;

    Ok(Bytes::from(data))
}

impl TileProvider for AnimatedTileProvider {
    fn get_tile(&self, coord: TileCoord) -> Result<Tile, TileError> {
        let size = self.config.bitmap_size();
        if size == 0 {
            return Err(TileError::InvalidSize {
                width: size,
                height: size,
            });
        }

        // single read; a concurrent update lands in the next request
        let timestamp = self.timestamp.current_timestamp();
        let data = encode_png(&self.render(timestamp))?;

        trace!(
            x = coord.x,
            y = coord.y,
            zoom = coord.zoom,
            %timestamp,
            bytes = data.len(),
            "generated tile"
        );

        Ok(Tile {
            width: self.config.tile_size,
            height: self.config.tile_size,
            data,
        })
    }
}

impl TimeControl for AnimatedTileProvider {
    fn current_timestamp(&self) -> Timestamp {
        self.timestamp.current_timestamp()
    }

    fn set_current_timestamp(&self, timestamp: Timestamp) {
        self.timestamp.set_current_timestamp(timestamp);
    }
}

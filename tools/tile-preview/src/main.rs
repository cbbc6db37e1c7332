use std::{path::PathBuf, sync::Arc};

use animated_tile_core::prelude::*;
use anyhow::{Context, Result};
use clap::Parser;
use image::RgbaImage;
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(
    name = "tile-preview",
    author,
    version,
    about = "Render the animated tile overlay to PNG frames",
    long_about = "Drives the double-buffered swap controller against an in-memory map \
                  and writes the composited tile after every timestamp step. Useful for \
                  checking that consecutive frames never come out blank."
)]
struct Args {
    /// Number of frames to render
    #[arg(short, long, default_value_t = 12)]
    frames: u32,

    /// Delay between frames in milliseconds
    #[arg(long, default_value_t = 250)]
    tick_ms: u64,

    /// How long the old overlay stays on the map after a swap, in milliseconds
    #[arg(long, default_value_t = 100)]
    swap_interval_ms: u64,

    /// Tile edge in pixels before density scaling
    #[arg(long, default_value_t = 256)]
    tile_size: u32,

    /// Display density of the simulated screen
    #[arg(long, default_value_t = 1.0)]
    density: f32,

    /// Output directory for frame-NNNN.png files
    #[arg(short, long, default_value = "frames")]
    out: PathBuf,

    /// Verbose output (show debug messages)
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> AnimationConfig {
        AnimationConfig {
            swap: SwapConfig {
                swap_interval_ms: self.swap_interval_ms,
                ..SwapConfig::default()
            },
            tile: TileConfig {
                tile_size: self.tile_size,
                density: self.density,
                ..TileConfig::default()
            },
            tick: TickConfig {
                tick_interval_ms: self.tick_ms,
            },
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .without_time()
        .init();

    let config = args.config();
    config.validate().context("invalid preview options")?;
    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;

    let surface = Arc::new(InMemorySurface::new());
    let provider = Arc::new(AnimatedTileProvider::new(config.tile.clone()));
    let clock = provider.timestamps();
    let blank_size = provider.config().bitmap_size();

    let controller = SwapController::new(surface.clone(), provider, config.swap.clone());
    let (driver, swaps) = SwapDriver::new(controller);
    let driver = tokio::spawn(driver.run());

    swaps.show().await?;
    info!(frames = args.frames, out = %args.out.display(), "rendering preview");

    for frame in 0..args.frames {
        swaps.set_timestamp(clock.current_timestamp().next()).await?;

        let image = surface
            .composite(TileCoord::new(0, 0, 0))?
            .unwrap_or_else(|| RgbaImage::new(blank_size, blank_size));
        let path = args.out.join(format!("frame-{frame:04}.png"));
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!(
            frame,
            timestamp = %clock.current_timestamp(),
            live = surface.live_count(),
            "wrote {}",
            path.display()
        );

        tokio::time::sleep(config.tick.tick_interval()).await;
    }

    swaps.hide().await?;
    drop(swaps);
    driver.await.context("swap driver panicked")?;

    info!(overlays_added = surface.added_count(), "done");
    Ok(())
}

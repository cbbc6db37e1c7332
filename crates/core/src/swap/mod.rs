//! Double-buffered overlay swapping.
//!
//! The map can't replace an overlay's image in place, and removing an overlay
//! blanks its area immediately. To advance the animation the controller adds
//! the next overlay first, lets both overlap for [`SwapConfig::swap_interval`],
//! and only then removes the old one. While a swap is in flight further
//! timestamps are coalesced into a single pending value that starts the next
//! swap as soon as the current one finishes.
//!
//! [`SwapController`] is the synchronous state machine. It never sleeps: a
//! swap hands back a [`RemovalTicket`] and whoever drives the controller
//! delivers it to [`SwapController::complete_swap`] once the ticket's delay has
//! passed. [`SwapDriver`] does that on a dedicated thread.

pub mod driver;


use std::cell::OnceCell;
use std::mem;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::{
    config::SwapConfig,
    surface::{MapSurface, OverlayHandle, SurfaceError, TileOverlayOptions},
    tile::{TileProvider, TimedTileProvider},
    time::{TimeControl, Timestamp},
};

pub use driver::{SwapDriver, SwapHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotId {
    A,
    B,
}

impl SlotId {
    pub fn other(self) -> Self {
        match self {
            SlotId::A => SlotId::B,
            SlotId::B => SlotId::A,
        }
    }
}

#[derive(Debug)]
struct Slot {
    id: SlotId,
    overlay: OverlayHandle,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapId(u64);

#[derive(Debug)]
enum SwapState {
    Hidden,
    Idle {
        current: Slot,
    },
    Swapping {
        current: Slot,
        retiring: Slot,
        pending: Option<Timestamp>,
        swap: SwapId,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SwapPhase {
    Hidden,
    VisibleIdle,
    VisibleSwapping,
}

impl SwapPhase {
    pub fn is_visible(self) -> bool {
        !matches!(self, SwapPhase::Hidden)
    }
}

/// Must be handed back to [`SwapController::complete_swap`] after
/// [`RemovalTicket::delay`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub struct RemovalTicket {
    swap: SwapId,
    delay: Duration,
}

impl RemovalTicket {
    pub fn swap(&self) -> SwapId {
        self.swap
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[derive(Debug, Default)]
#[must_use]
pub struct SwapCompletion {
    /// Set when a pending timestamp started another swap.
    pub next: Option<RemovalTicket>,
    /// Surface failures hit while finishing; none of them keep the lock held.
    pub warnings: Vec<SwapError>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SwapSnapshot {
    pub phase: SwapPhase,
    /// Slots holding an overlay, newest first.
    pub slots: Vec<SlotId>,
    pub pending: Option<Timestamp>,
    pub timestamp: Timestamp,
    pub swaps_started: u64,
    pub swaps_completed: u64,
}

impl SwapSnapshot {
    pub fn held_overlays(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    #[error("tile overlay is already visible")]
    AlreadyVisible,
    #[error(transparent)]
    Surface(#[from] SurfaceError),
    #[error("swap driver has stopped")]
    DriverStopped,
}

/// Keeps an animated tile overlay on a [`MapSurface`] without ever leaving
/// the map blank between frames.
///
/// Bound to the first thread that calls a mutating method; calling from any
/// other thread afterwards panics.
pub struct SwapController {
    surface: Arc<dyn MapSurface>,
    provider: Arc<dyn TileProvider>,
    clock: Arc<dyn TimeControl>,
    config: SwapConfig,
    state: SwapState,
    last_swap: u64,
    swaps_completed: u64,
    context_thread: OnceCell<ThreadId>,
}

impl SwapController {
    pub fn new<P>(surface: Arc<dyn MapSurface>, provider: Arc<P>, config: SwapConfig) -> Self
    where
        P: TimedTileProvider + 'static,
    {
        Self {
            surface,
            provider: provider.clone(),
            clock: provider,
            config,
            state: SwapState::Hidden,
            last_swap: 0,
            swaps_completed: 0,
            context_thread: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn phase(&self) -> SwapPhase {
        match self.state {
            SwapState::Hidden => SwapPhase::Hidden,
            SwapState::Idle { .. } => SwapPhase::VisibleIdle,
            SwapState::Swapping { .. } => SwapPhase::VisibleSwapping,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.phase().is_visible()
    }

    pub fn snapshot(&self) -> SwapSnapshot {
        let (slots, pending) = match &self.state {
            SwapState::Hidden => (Vec::new(), None),
            SwapState::Idle { current } => (vec![current.id], None),
            SwapState::Swapping {
                current,
                retiring,
                pending,
                ..
            } => (vec![current.id, retiring.id], *pending),
        };

        SwapSnapshot {
            phase: self.phase(),
            slots,
            pending,
            timestamp: self.clock.current_timestamp(),
            swaps_started: self.last_swap,
            swaps_completed: self.swaps_completed,
        }
    }

    /// Puts the overlay on the map.
    ///
    /// Calling this while already visible is a caller bug and is rejected with
    /// [`SwapError::AlreadyVisible`]. A surface failure leaves the controller
    /// hidden.
    pub fn show(&mut self) -> Result<(), SwapError> {
        self.ensure_designated_context();
        if self.is_visible() {
            error!("show() called while the tile overlay is already visible");
            return Err(SwapError::AlreadyVisible);
        }

        let overlay = self
            .surface
            .add_tile_overlay(self.overlay_options(true))
            .inspect_err(|err| warn!(%err, "failed to show tile overlay"))?;

        info!(
            overlay = overlay.id(),
            timestamp = %self.clock.current_timestamp(),
            "tile overlay shown"
        );
        self.state = SwapState::Idle {
            current: Slot {
                id: SlotId::A,
                overlay,
            },
        };

        Ok(())
    }

    /// Removes every overlay and drops any pending timestamp. Idempotent.
    ///
    /// The controller is hidden afterwards even if the surface refused a
    /// removal; the first such failure is returned.
    pub fn hide(&mut self) -> Result<(), SwapError> {
        self.ensure_designated_context();
        let slots = match mem::replace(&mut self.state, SwapState::Hidden) {
            SwapState::Hidden => {
                debug!("tile overlay already hidden");
                return Ok(());
            }
            SwapState::Idle { current } => vec![current],
            SwapState::Swapping {
                current,
                retiring,
                pending,
                swap,
            } => {
                debug!(?swap, ?pending, "hiding during an in-flight swap");
                vec![retiring, current]
            }
        };

        let mut first_failure = None;
        for slot in slots {
            if let Err(err) = self.release(slot) {
                first_failure.get_or_insert(err);
            }
        }

        info!("tile overlay hidden");
        first_failure.map_or(Ok(()), |err| Err(err.into()))
    }

    /// Makes `timestamp` current and, if the overlay is visible, starts
    /// swapping to it.
    ///
    /// The tile provider sees the new timestamp before this returns, whatever
    /// the state. While a swap is in flight the value is parked as the
    /// pending timestamp, replacing any earlier one.
    pub fn set_timestamp(
        &mut self,
        timestamp: Timestamp,
    ) -> Result<Option<RemovalTicket>, SwapError> {
        self.ensure_designated_context();
        self.clock.set_current_timestamp(timestamp);

        match mem::replace(&mut self.state, SwapState::Hidden) {
            SwapState::Hidden => Ok(None),
            SwapState::Idle { current } => self.begin_swap(current).map(Some),
            SwapState::Swapping {
                current,
                retiring,
                pending,
                swap,
            } => {
                debug!(%timestamp, ?swap, "tile swapping is locked");
                if let Some(dropped) = pending {
                    debug!(%dropped, "pending timestamp superseded");
                }
                self.state = SwapState::Swapping {
                    current,
                    retiring,
                    pending: Some(timestamp),
                    swap,
                };
                Ok(None)
            }
        }
    }

    /// Retires the outgoing overlay of the swap `ticket` belongs to, unlocks,
    /// and starts the next swap if a timestamp is pending.
    ///
    /// Tickets from swaps that no longer exist, e.g. after [`Self::hide`], are
    /// ignored.
    pub fn complete_swap(&mut self, ticket: RemovalTicket) -> SwapCompletion {
        self.ensure_designated_context();
        let mut completion = SwapCompletion::default();

        let (retiring, pending) = match mem::replace(&mut self.state, SwapState::Hidden) {
            SwapState::Swapping {
                current,
                retiring,
                pending,
                swap,
            } if swap == ticket.swap => {
                self.state = SwapState::Idle { current };
                (retiring, pending)
            }
            state => {
                debug!(swap = ?ticket.swap, "ignoring stale swap completion");
                self.state = state;
                return completion;
            }
        };

        if let Err(err) = self.release(retiring) {
            completion.warnings.push(err.into());
        }
        self.swaps_completed += 1;

        if let Some(timestamp) = pending {
            debug!(%timestamp, "update pending timestamp");
            match self.set_timestamp(timestamp) {
                Ok(next) => completion.next = next,
                Err(err) => completion.warnings.push(err),
            }
        }

        completion
    }

    fn begin_swap(&mut self, current: Slot) -> Result<RemovalTicket, SwapError> {
        let overlay = match self.surface.add_tile_overlay(self.overlay_options(false)) {
            Ok(overlay) => overlay,
            Err(err) => {
                // keep the old frame rather than risk an empty map
                warn!(%err, "failed to add replacement overlay, skipping swap");
                self.state = SwapState::Idle { current };
                return Err(err.into());
            }
        };

        self.last_swap += 1;
        let swap = SwapId(self.last_swap);
        let incoming = Slot {
            id: current.id.other(),
            overlay,
        };
        debug!(
            ?swap,
            from = ?current.id,
            to = ?incoming.id,
            overlay = incoming.overlay.id(),
            "swapping tile overlays"
        );

        self.state = SwapState::Swapping {
            current: incoming,
            retiring: current,
            pending: None,
            swap,
        };

        Ok(RemovalTicket {
            swap,
            delay: self.config.swap_interval(),
        })
    }

    fn release(&self, slot: Slot) -> Result<(), SurfaceError> {
        let id = slot.overlay.id();
        self.surface
            .remove_overlay(slot.overlay)
            .inspect_err(|err| warn!(%err, overlay = id, slot = ?slot.id, "failed to remove overlay"))
    }

    fn overlay_options(&self, fade_in: bool) -> TileOverlayOptions {
        TileOverlayOptions::new(self.provider.clone())
            .z_index(self.config.z_index)
            .fade_in(fade_in)
    }

    fn ensure_designated_context(&self) {
        let bound = *self.context_thread.get_or_init(|| thread::current().id());
        if bound != thread::current().id() {
            panic!("swap controller accessed from a thread other than the one driving it")
        }
    }
}

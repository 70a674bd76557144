//! The contract every pluggable peripheral implements.
//!
//! A card only ever talks to the bus through this trait. Optional features
//! (memory inhibit, bus mastering, daisy-chained signals) live in separate
//! traits reached through the `as_*` accessors, so a card implements only
//! what its hardware actually has.

pub mod daisy;
pub mod inhibit;
pub mod master;

use bitflags::bitflags;

use crate::core::StateError;

pub use daisy::{DaisyChained, DaisyLatch, DaisyLine};
pub use inhibit::{Inhibit, InhibitClaim, InhibitLatch, InhibitMode};
pub use master::{BusCycle, BusMasterCard, DmaLatch};

/// Value read when nothing drives the data bus.
pub const FLOATING_BUS: u8 = 0xFF;

bitflags! {
    /// Bus features a card uses. The host layout must provide every one of
    /// them or configuration fails.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u8 {
        const IO_WINDOW       = 0x01;
        const EXTENDED_WINDOW = 0x02;
        const BROADCAST       = 0x04;
        const INHIBIT         = 0x08;
        const BUS_MASTER      = 0x10;
        const DAISY_CHAIN     = 0x20;
        const INTERRUPTS      = 0x40;
    }
}

/// Which decoded window an access arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The card's own per-slot I/O window.
    Io,
    /// The shared extended window, delivered only to its current owner.
    Extended,
}

pub trait Card {
    /// Human-readable label, e.g. "bank-ram".
    fn label(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Read a register. Must not fail: unmapped offsets return
    /// [`FLOATING_BUS`].
    fn read(&mut self, window: Window, offset: u16) -> u8;

    fn write(&mut self, window: Window, offset: u16, data: u8);

    /// Reinitialise local signal state: inhibit cleared, DMA request dropped,
    /// daisy latches cleared. The card itself stays in its slot.
    fn reset(&mut self);

    /// Access to the global broadcast window. `None` means the card does not
    /// drive the data bus for this offset.
    fn broadcast_read(&mut self, _offset: u16) -> Option<u8> {
        None
    }

    fn broadcast_write(&mut self, _offset: u16, _data: u8) {}

    /// True while the card wants exclusive use of the extended window.
    fn wants_extended_window(&self) -> bool {
        false
    }

    fn irq(&self) -> bool {
        false
    }

    fn nmi(&self) -> bool {
        false
    }

    fn as_inhibit(&self) -> Option<&dyn Inhibit> {
        None
    }

    fn as_inhibit_mut(&mut self) -> Option<&mut dyn Inhibit> {
        None
    }

    fn as_bus_master(&self) -> Option<&dyn BusMasterCard> {
        None
    }

    fn as_bus_master_mut(&mut self) -> Option<&mut dyn BusMasterCard> {
        None
    }

    fn as_daisy(&self) -> Option<&dyn DaisyChained> {
        None
    }

    fn as_daisy_mut(&mut self) -> Option<&mut dyn DaisyChained> {
        None
    }

    /// Serialise register and bank state. Cards without state return an
    /// empty vector.
    fn save_state(&self) -> Vec<u8> {
        Vec::new()
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        if data.is_empty() {
            Ok(())
        } else {
            Err(StateError::Invalid(format!(
                "{} carries no state but {} bytes were supplied",
                self.label(),
                data.len()
            )))
        }
    }
}

/// Capabilities a card declares whose trait object it does not provide.
pub(crate) fn undeclared_capabilities(card: &dyn Card) -> Capabilities {
    let caps = card.capabilities();
    let mut missing = Capabilities::empty();
    if caps.contains(Capabilities::INHIBIT) && card.as_inhibit().is_none() {
        missing |= Capabilities::INHIBIT;
    }
    if caps.contains(Capabilities::BUS_MASTER) && card.as_bus_master().is_none() {
        missing |= Capabilities::BUS_MASTER;
    }
    if caps.contains(Capabilities::DAISY_CHAIN) && card.as_daisy().is_none() {
        missing |= Capabilities::DAISY_CHAIN;
    }
    missing
}

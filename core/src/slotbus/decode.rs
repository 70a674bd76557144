//! Address decoding for the card windows.
//!
//! The layout partitions a slice of the 16-bit space into:
//!
//! | Window    | Address                         | Delivered to                       |
//! |-----------|---------------------------------|------------------------------------|
//! | I/O       | `io.base + slot * io.unit`      | the card in that slot              |
//! | Extended  | `extended.start..=extended.end` | the current owner (one card)       |
//! | Broadcast | `broadcast.start..=broadcast.end` | every card with `BROADCAST`      |
//!
//! Everything else belongs to the host. Decoding is a pure function of the
//! layout; resolving who owns the extended window is the bus's job.

use serde::{Deserialize, Serialize};

use crate::card::Capabilities;
use crate::core::ConfigError;

/// Hard limit on slots per bus. Slot masks are kept in a `u16`.
pub const MAX_SLOTS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoWindow {
    pub base: u16,
    pub unit: u16,
}

/// Inclusive address range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddrRange {
    pub start: u16,
    pub end: u16,
}

impl AddrRange {
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, addr: u16) -> bool {
        (self.start..=self.end).contains(&addr)
    }

    pub fn overlaps(&self, other: &AddrRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessWidth {
    Byte,
    Word,
}

/// Result of decoding one address against the layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    Io { slot: usize, offset: u16 },
    Extended { offset: u16 },
    Broadcast { offset: u16 },
    Unmapped,
}

fn enabled() -> bool {
    true
}

/// Window placement and host-architecture features of one backplane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeLayout {
    pub slot_count: usize,
    pub io: IoWindow,
    #[serde(default)]
    pub extended: Option<AddrRange>,
    #[serde(default)]
    pub broadcast: Option<AddrRange>,
    /// Host memory can be inhibited by cards.
    #[serde(default = "enabled")]
    pub inhibit: bool,
    /// Cards may take the bus (DMA / halt line wired).
    #[serde(default = "enabled")]
    pub bus_master: bool,
    /// Daisy-chained lines are routed through the slots.
    #[serde(default = "enabled")]
    pub daisy_chain: bool,
}

impl DecodeLayout {
    /// Apple II style backplane: eight slots with 16-byte device-select
    /// windows at `$C080`, a shared `$C800-$CFFE` expansion ROM window and
    /// `$CFFF` as the release strobe seen by every card.
    pub fn apple2() -> Self {
        Self {
            slot_count: 8,
            io: IoWindow {
                base: 0xC080,
                unit: 0x10,
            },
            extended: Some(AddrRange::new(0xC800, 0xCFFE)),
            broadcast: Some(AddrRange::new(0xCFFF, 0xCFFF)),
            inhibit: true,
            bus_master: true,
            daisy_chain: true,
        }
    }

    /// A bare backplane with only per-slot I/O windows at `$C000`.
    pub fn flat(slot_count: usize) -> Self {
        Self {
            slot_count,
            io: IoWindow {
                base: 0xC000,
                unit: 0x10,
            },
            extended: None,
            broadcast: None,
            inhibit: true,
            bus_master: true,
            daisy_chain: true,
        }
    }

    pub fn io_window(&self, slot: usize) -> AddrRange {
        let start = self.io.base as usize + slot * self.io.unit as usize;
        let end = start + self.io.unit as usize - 1;
        AddrRange::new(start as u16, end as u16)
    }

    /// Features this host offers to cards.
    pub fn supported_capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::IO_WINDOW | Capabilities::INTERRUPTS;
        caps.set(Capabilities::EXTENDED_WINDOW, self.extended.is_some());
        caps.set(Capabilities::BROADCAST, self.broadcast.is_some());
        caps.set(Capabilities::INHIBIT, self.inhibit);
        caps.set(Capabilities::BUS_MASTER, self.bus_master);
        caps.set(Capabilities::DAISY_CHAIN, self.daisy_chain);
        caps
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_count > MAX_SLOTS {
            return Err(ConfigError::TooManySlots {
                requested: self.slot_count,
                max: MAX_SLOTS,
            });
        }
        if self.slot_count == 0 {
            return Err(ConfigError::InvalidLayout("no slots".into()));
        }
        if self.io.unit == 0 {
            return Err(ConfigError::InvalidLayout("zero-sized I/O window".into()));
        }
        let io_end = self.io.base as usize + self.slot_count * self.io.unit as usize - 1;
        if io_end > 0xFFFF {
            return Err(ConfigError::InvalidLayout(format!(
                "I/O windows end at {io_end:#X}, past the address space"
            )));
        }
        let io = AddrRange::new(self.io.base, io_end as u16);

        let named = [("extended", self.extended), ("broadcast", self.broadcast)];
        for (name, range) in named {
            let Some(range) = range else { continue };
            if range.start > range.end {
                return Err(ConfigError::InvalidLayout(format!(
                    "{name} window starts after it ends"
                )));
            }
            if range.overlaps(&io) {
                return Err(ConfigError::InvalidLayout(format!(
                    "{name} window overlaps the I/O windows"
                )));
            }
        }
        if let (Some(ext), Some(bc)) = (self.extended, self.broadcast)
            && ext.overlaps(&bc)
        {
            return Err(ConfigError::InvalidLayout(
                "extended and broadcast windows overlap".into(),
            ));
        }
        Ok(())
    }

    /// Decode an access. Wider accesses are attributed to the target of
    /// their lowest byte; the bus splits them into byte cycles anyway.
    pub fn decode(&self, addr: u16, _width: AccessWidth) -> Decoded {
        if let Some(bc) = self.broadcast
            && bc.contains(addr)
        {
            return Decoded::Broadcast {
                offset: addr - bc.start,
            };
        }
        if let Some(ext) = self.extended
            && ext.contains(addr)
        {
            return Decoded::Extended {
                offset: addr - ext.start,
            };
        }
        if addr >= self.io.base {
            let rel = addr - self.io.base;
            let slot = (rel / self.io.unit) as usize;
            if slot < self.slot_count {
                return Decoded::Io {
                    slot,
                    offset: rel % self.io.unit,
                };
            }
        }
        Decoded::Unmapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apple2_windows() {
        let layout = DecodeLayout::apple2();
        assert_eq!(layout.validate(), Ok(()));
        assert_eq!(
            layout.decode(0xC0E3, AccessWidth::Byte),
            Decoded::Io { slot: 6, offset: 3 }
        );
        assert_eq!(
            layout.decode(0xC800, AccessWidth::Byte),
            Decoded::Extended { offset: 0 }
        );
        assert_eq!(
            layout.decode(0xCFFF, AccessWidth::Byte),
            Decoded::Broadcast { offset: 0 }
        );
        assert_eq!(layout.decode(0xC07F, AccessWidth::Byte), Decoded::Unmapped);
        assert_eq!(layout.decode(0xC100, AccessWidth::Byte), Decoded::Unmapped);
    }

    #[test]
    fn io_window_bounds() {
        let layout = DecodeLayout::apple2();
        assert_eq!(layout.io_window(0), AddrRange::new(0xC080, 0xC08F));
        assert_eq!(layout.io_window(7), AddrRange::new(0xC0F0, 0xC0FF));
    }

    #[test]
    fn rejects_overlapping_windows() {
        let mut layout = DecodeLayout::apple2();
        layout.extended = Some(AddrRange::new(0xC0F0, 0xC8FF));
        assert!(matches!(
            layout.validate(),
            Err(ConfigError::InvalidLayout(_))
        ));
    }

    #[test]
    fn rejects_too_many_slots() {
        let layout = DecodeLayout::flat(MAX_SLOTS + 1);
        assert_eq!(
            layout.validate(),
            Err(ConfigError::TooManySlots {
                requested: MAX_SLOTS + 1,
                max: MAX_SLOTS
            })
        );
    }

    #[test]
    fn rejects_io_past_address_space() {
        let mut layout = DecodeLayout::flat(16);
        layout.io.base = 0xFFF0;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn supported_capabilities_follow_layout() {
        let caps = DecodeLayout::flat(4).supported_capabilities();
        assert!(!caps.contains(Capabilities::EXTENDED_WINDOW));
        assert!(!caps.contains(Capabilities::BROADCAST));
        assert!(caps.contains(Capabilities::BUS_MASTER | Capabilities::INHIBIT));
        assert!(
            DecodeLayout::apple2()
                .supported_capabilities()
                .contains(Capabilities::EXTENDED_WINDOW | Capabilities::BROADCAST)
        );
    }
}

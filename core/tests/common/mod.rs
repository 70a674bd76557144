#![allow(dead_code)]

use backplane_core::card::{
    Capabilities, Card, DaisyChained, DaisyLatch, DaisyLine, FLOATING_BUS, Inhibit, InhibitClaim,
    InhibitLatch, InhibitMode, Window,
};
use backplane_core::core::{BusMaster, HostMemory, HostRam, StateError};
use backplane_core::slotbus::{DecodeLayout, OverlayChange, SlotBus, SlotBusBuilder};

pub const CPU: BusMaster = BusMaster::Cpu(0);

// Probe card registers (I/O window)
pub const REG_INHIBIT: u16 = 0; // bit 0 read, bit 1 write
pub const REG_LINES: u16 = 1; // bit 0 extended claim, bit 1 IRQ, bit 2 NMI
pub const REG_DAISY: u16 = 2; // write: request on the interrupt chain
pub const REG_ACCESSES: u16 = 3; // read: accesses seen (this read not counted)
pub const REG_LAST_OVERLAY: u16 = 4; // read: last byte written through the overlay
pub const REG_RELEASE: u16 = 5; // read: drops the inhibit claim (soft switch)

/// Configurable test card. Overlay reads return the card's tag, extended
/// window reads return `tag | 0x80` and the vector is the tag.
pub struct ProbeCard {
    tag: u8,
    caps: Capabilities,
    inhibit: InhibitLatch,
    lines: u8,
    chain: DaisyLatch,
    accesses: u8,
    last_overlay: u8,
    broadcast: Option<u8>,
}

impl ProbeCard {
    pub fn new(tag: u8) -> Self {
        Self {
            tag,
            caps: Capabilities::IO_WINDOW
                | Capabilities::INHIBIT
                | Capabilities::DAISY_CHAIN
                | Capabilities::INTERRUPTS,
            inhibit: InhibitLatch::new(0xD000, 0xFFFF),
            lines: 0,
            chain: DaisyLatch::new(),
            accesses: 0,
            last_overlay: 0,
            broadcast: None,
        }
    }

    pub fn overlay(mut self, start: u16, end: u16) -> Self {
        self.inhibit = InhibitLatch::new(start, end);
        self
    }

    pub fn extended(mut self) -> Self {
        self.caps |= Capabilities::EXTENDED_WINDOW;
        self
    }

    /// Answer broadcast reads with `data`.
    pub fn broadcast(mut self, data: Option<u8>) -> Self {
        self.caps |= Capabilities::BROADCAST;
        self.broadcast = data;
        self
    }

    pub fn with_caps(mut self, caps: Capabilities) -> Self {
        self.caps = caps;
        self
    }
}

impl Card for ProbeCard {
    fn label(&self) -> &str {
        "probe"
    }

    fn capabilities(&self) -> Capabilities {
        self.caps
    }

    fn read(&mut self, window: Window, offset: u16) -> u8 {
        if window == Window::Extended {
            self.accesses = self.accesses.wrapping_add(1);
            return self.tag | 0x80;
        }
        match offset {
            REG_ACCESSES => return self.accesses,
            REG_LAST_OVERLAY => return self.last_overlay,
            _ => {}
        }
        self.accesses = self.accesses.wrapping_add(1);
        match offset {
            REG_INHIBIT => {
                let mode = self.inhibit.mode();
                mode.reads() as u8 | (mode.writes() as u8) << 1
            }
            REG_LINES => self.lines,
            REG_RELEASE => {
                self.inhibit.clear();
                self.tag
            }
            _ => FLOATING_BUS,
        }
    }

    fn write(&mut self, window: Window, offset: u16, data: u8) {
        self.accesses = self.accesses.wrapping_add(1);
        if window == Window::Extended {
            return;
        }
        match offset {
            REG_INHIBIT => self
                .inhibit
                .assert_inhibit(InhibitMode::from_bits(data & 1 != 0, data & 2 != 0)),
            REG_LINES => self.lines = data,
            REG_DAISY => self.chain.request(),
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.inhibit.clear();
        self.lines = 0;
        self.chain.reset();
    }

    fn broadcast_read(&mut self, _offset: u16) -> Option<u8> {
        self.accesses = self.accesses.wrapping_add(1);
        self.broadcast
    }

    fn broadcast_write(&mut self, _offset: u16, _data: u8) {
        self.accesses = self.accesses.wrapping_add(1);
    }

    fn wants_extended_window(&self) -> bool {
        self.lines & 0x01 != 0
    }

    fn irq(&self) -> bool {
        self.lines & 0x02 != 0
    }

    fn nmi(&self) -> bool {
        self.lines & 0x04 != 0
    }

    fn as_inhibit(&self) -> Option<&dyn Inhibit> {
        Some(self)
    }

    fn as_inhibit_mut(&mut self) -> Option<&mut dyn Inhibit> {
        Some(self)
    }

    fn as_daisy(&self) -> Option<&dyn DaisyChained> {
        Some(self)
    }

    fn as_daisy_mut(&mut self) -> Option<&mut dyn DaisyChained> {
        Some(self)
    }

    fn save_state(&self) -> Vec<u8> {
        let mode = self.inhibit.mode();
        vec![
            mode.reads() as u8 | (mode.writes() as u8) << 1,
            self.lines,
            self.chain.to_bits(),
        ]
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let &[mode, lines, chain] = data else {
            return Err(StateError::Truncated {
                expected: 3,
                actual: data.len(),
            });
        };
        self.inhibit
            .assert_inhibit(InhibitMode::from_bits(mode & 1 != 0, mode & 2 != 0));
        self.lines = lines;
        self.chain = DaisyLatch::from_bits(chain);
        Ok(())
    }
}

impl Inhibit for ProbeCard {
    fn inhibit_claim(&self) -> Option<InhibitClaim> {
        self.inhibit.claim()
    }

    fn overlay_read(&mut self, _addr: u16) -> u8 {
        self.tag
    }

    fn overlay_write(&mut self, _addr: u16, data: u8) {
        self.last_overlay = data;
    }
}

impl DaisyChained for ProbeCard {
    fn daisy_pass(&mut self, line: DaisyLine, enable_in: bool) -> bool {
        match line {
            DaisyLine::InterruptAck => self.chain.pass(enable_in),
            DaisyLine::Config => enable_in,
        }
    }

    fn daisy_latched(&self, line: DaisyLine) -> bool {
        line == DaisyLine::InterruptAck && self.chain.is_latched()
    }

    fn daisy_vector(&mut self, _line: DaisyLine) -> u8 {
        self.tag
    }

    fn daisy_clear(&mut self, line: DaisyLine) {
        if line == DaisyLine::InterruptAck {
            self.chain.clear();
        }
    }
}

/// Host RAM that records every remap notification.
pub struct RecordingHost {
    pub ram: HostRam,
    pub changes: Vec<OverlayChange>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self {
            ram: HostRam::full(),
            changes: Vec::new(),
        }
    }
}

impl HostMemory for RecordingHost {
    fn read(&mut self, addr: u16) -> Option<u8> {
        self.ram.read(addr)
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.ram.write(addr, data);
    }

    fn remap(&mut self, change: &OverlayChange) {
        self.changes.push(*change);
    }
}

/// Apple II style bus over 64KB of host RAM.
pub fn apple2_bus(cards: Vec<(usize, Box<dyn Card>)>) -> SlotBus {
    build(DecodeLayout::apple2(), HostRam::full(), cards)
}

pub fn build<M: HostMemory>(
    layout: DecodeLayout,
    host: M,
    cards: Vec<(usize, Box<dyn Card>)>,
) -> SlotBus<M> {
    cards
        .into_iter()
        .fold(SlotBusBuilder::new(layout, host), |b, (slot, card)| {
            b.boxed_card(slot, card)
        })
        .build()
        .expect("test bus configuration")
}

/// Address of register `offset` in `slot`'s I/O window.
pub fn io<M: HostMemory>(bus: &SlotBus<M>, slot: usize, offset: u16) -> u16 {
    bus.layout().io_window(slot).start + offset
}

//! The slot bus controller.
//!
//! `SlotBus` owns the slot arena and the host memory behind it. Every access
//! runs the same path regardless of who issues it:
//!
//! 1. the overlay map (memory inhibit) redirects the address to a card,
//! 2. otherwise the decoder routes card windows to their slot (a window
//!    with no card behind it floats),
//! 3. otherwise host memory answers,
//! 4. otherwise the floating-bus value is returned.
//!
//! After any card sees an access the bus *settles*: the card's bus-master
//! request is polled, the extended-window owner is recomputed and the
//! overlay map is rebuilt from every card's claim. All of this happens
//! before the access returns, so the next cycle always sees the new state.

pub mod daisy;
pub mod decode;
pub mod dma;
pub mod inhibit;
pub mod slot;
pub mod state;

use log::{debug, info, trace, warn};

use crate::card::{
    self, BusCycle, Capabilities, Card, DaisyLine, FLOATING_BUS, InhibitClaim, Window,
};
use crate::core::{
    Bus, BusMaster, ConfigError, HostLines, HostMemory, HostRam, InterruptState, StateError,
};

pub use daisy::DaisyLatches;
pub use decode::{AccessWidth, AddrRange, DecodeLayout, Decoded, IoWindow, MAX_SLOTS};
pub use dma::{DmaGate, Grant};
pub use inhibit::{Arbitration, OverlayChange, OverlayMap, OverlayRegion, Suppressed};
pub use slot::Slot;
pub use state::{ArbitrationState, BusSnapshot, CardSnapshot};

/// Where an access lands once card windows are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Card {
        slot: usize,
        window: Window,
        offset: u16,
    },
    Broadcast {
        offset: u16,
    },
    /// A card window nobody answers for: an empty slot, or the extended
    /// window with no card able to claim it. Reads float, writes are lost.
    Floating,
    /// Not a card window.
    Host,
}

/// Assembles a [`SlotBus`]. Cards can only be bound here.
pub struct SlotBusBuilder<M: HostMemory = HostRam> {
    layout: DecodeLayout,
    host: M,
    cards: Vec<(usize, Box<dyn Card>)>,
}

impl<M: HostMemory> SlotBusBuilder<M> {
    pub fn new(layout: DecodeLayout, host: M) -> Self {
        Self {
            layout,
            host,
            cards: Vec::new(),
        }
    }

    pub fn card(self, slot: usize, card: impl Card + 'static) -> Self {
        self.boxed_card(slot, Box::new(card))
    }

    pub fn boxed_card(mut self, slot: usize, card: Box<dyn Card>) -> Self {
        self.cards.push((slot, card));
        self
    }

    pub fn build(self) -> Result<SlotBus<M>, ConfigError> {
        self.layout.validate()?;
        let supported = self.layout.supported_capabilities();
        let mut slots: Vec<Slot> = (0..self.layout.slot_count).map(Slot::empty).collect();

        for (index, card) in self.cards {
            let Some(slot) = slots.get_mut(index) else {
                return Err(ConfigError::SlotOutOfRange {
                    slot: index,
                    count: self.layout.slot_count,
                });
            };
            if let Some(label) = slot.label() {
                return Err(ConfigError::SlotOccupied {
                    slot: index,
                    label: label.to_owned(),
                });
            }
            let declared = card::undeclared_capabilities(card.as_ref());
            if !declared.is_empty() {
                return Err(ConfigError::CapabilityMismatch {
                    slot: index,
                    label: card.label().to_owned(),
                    declared,
                });
            }
            let missing = card.capabilities() - supported;
            if !missing.is_empty() {
                return Err(ConfigError::MissingCapability {
                    slot: index,
                    label: card.label().to_owned(),
                    missing,
                });
            }
            info!("slot {index}: {} ({:?})", card.label(), card.capabilities());
            slot.bind(card);
        }

        let mut bus = SlotBus {
            layout: self.layout,
            slots,
            host: self.host,
            overlay: OverlayMap::default(),
            extended_owner: None,
            gate: DmaGate::new(),
            lines: HostLines::default(),
        };
        bus.settle_all();
        Ok(bus)
    }
}

pub struct SlotBus<M: HostMemory = HostRam> {
    layout: DecodeLayout,
    slots: Vec<Slot>,
    host: M,
    overlay: OverlayMap,
    extended_owner: Option<usize>,
    gate: DmaGate,
    lines: HostLines,
}

impl<M: HostMemory> SlotBus<M> {
    pub fn layout(&self) -> &DecodeLayout {
        &self.layout
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn card(&self, slot: usize) -> Option<&dyn Card> {
        self.slots.get(slot)?.card()
    }

    /// Run `f` against the card in `slot`, then settle. Front-ends use this
    /// to drive card-side events (a key press, a disk change) that do not
    /// come from a bus access.
    pub fn with_card_mut<R>(
        &mut self,
        slot: usize,
        f: impl FnOnce(&mut dyn Card) -> R,
    ) -> Option<R> {
        let card = self.slots.get_mut(slot)?.card_mut()?;
        let result = f(card);
        self.settle(slot);
        Some(result)
    }

    pub fn host(&self) -> &M {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut M {
        &mut self.host
    }

    pub fn lines(&self) -> HostLines {
        self.lines
    }

    pub fn holder(&self) -> Option<usize> {
        self.gate.holder()
    }

    /// Who drives the bus right now.
    pub fn bus_master(&self) -> BusMaster {
        self.gate.holder().map_or(BusMaster::Cpu(0), BusMaster::Card)
    }

    pub fn overlay_map(&self) -> &OverlayMap {
        &self.overlay
    }

    /// Fresh arbitration of every card's current claim.
    pub fn arbitrate(&self) -> Arbitration {
        inhibit::arbitrate(self.claims())
    }

    pub fn extended_owner(&self) -> Option<usize> {
        self.extended_owner
    }

    pub fn daisy_latches(&self) -> DaisyLatches {
        daisy::latches(&self.slots)
    }

    /// Resolve an address to its target. Pure: no card sees the access.
    pub fn decode(&self, addr: u16, width: AccessWidth) -> Target {
        match self.layout.decode(addr, width) {
            Decoded::Io { slot, offset } if !self.slots[slot].is_empty() => Target::Card {
                slot,
                window: Window::Io,
                offset,
            },
            Decoded::Io { .. } => Target::Floating,
            Decoded::Extended { offset } => match self.extended_target() {
                Some(slot) => Target::Card {
                    slot,
                    window: Window::Extended,
                    offset,
                },
                None => Target::Floating,
            },
            Decoded::Broadcast { offset } => Target::Broadcast { offset },
            Decoded::Unmapped => Target::Host,
        }
    }

    /// Extended window owner: the claimant, else the lowest card able to
    /// claim it.
    fn extended_target(&self) -> Option<usize> {
        self.extended_owner.or_else(|| {
            self.slots
                .iter()
                .find(|s| s.capabilities().contains(Capabilities::EXTENDED_WINDOW))
                .map(Slot::index)
        })
    }

    /// Little-endian word read, split into two byte cycles.
    pub fn read_word(&mut self, master: BusMaster, addr: u16) -> u16 {
        let lo = self.read(master, addr);
        let hi = self.read(master, addr.wrapping_add(1));
        u16::from_le_bytes([lo, hi])
    }

    pub fn write_word(&mut self, master: BusMaster, addr: u16, data: u16) {
        let [lo, hi] = data.to_le_bytes();
        self.write(master, addr, lo);
        self.write(master, addr.wrapping_add(1), hi);
    }

    fn admits(&self, master: BusMaster) -> bool {
        match master {
            BusMaster::Cpu(_) => true,
            BusMaster::Card(slot) => self.gate.holder() == Some(slot),
        }
    }

    fn access_read(&mut self, addr: u16) -> u8 {
        if let Some(owner) = self.overlay.read_owner(addr) {
            let data = self.slots[owner]
                .card_mut()
                .and_then(|c| c.as_inhibit_mut())
                .map_or(FLOATING_BUS, |overlay| overlay.overlay_read(addr));
            self.settle(owner);
            return data;
        }
        match self.decode(addr, AccessWidth::Byte) {
            Target::Card {
                slot,
                window,
                offset,
            } => {
                let data = self.slots[slot].read(window, offset);
                self.settle(slot);
                data
            }
            Target::Broadcast { offset } => match self.broadcast_read(offset) {
                Some(data) => data,
                None => self.host_read(addr),
            },
            Target::Floating => {
                trace!("read {addr:#06X} from an empty card window");
                FLOATING_BUS
            }
            Target::Host => self.host_read(addr),
        }
    }

    fn access_write(&mut self, addr: u16, data: u8) {
        if let Some(owner) = self.overlay.write_owner(addr) {
            if let Some(overlay) = self.slots[owner].card_mut().and_then(|c| c.as_inhibit_mut()) {
                overlay.overlay_write(addr, data);
            }
            self.settle(owner);
            return;
        }
        match self.decode(addr, AccessWidth::Byte) {
            Target::Card {
                slot,
                window,
                offset,
            } => {
                self.slots[slot].write(window, offset, data);
                self.settle(slot);
            }
            Target::Broadcast { offset } => self.broadcast_write(offset, data),
            Target::Floating => trace!("write {addr:#06X} to an empty card window dropped"),
            Target::Host => self.host.write(addr, data),
        }
    }

    fn host_read(&mut self, addr: u16) -> u8 {
        self.host.read(addr).unwrap_or_else(|| {
            trace!("unmapped read {addr:#06X}");
            FLOATING_BUS
        })
    }

    /// Every broadcast card sees the read; the lowest slot that drives the
    /// bus wins.
    fn broadcast_read(&mut self, offset: u16) -> Option<u8> {
        self.walk_config_chain();
        let mut answer = None;
        for slot in self.slots.iter_mut() {
            if !slot.capabilities().contains(Capabilities::BROADCAST) {
                continue;
            }
            if let Some(card) = slot.card_mut() {
                let data = card.broadcast_read(offset);
                answer = answer.or(data);
            }
        }
        self.settle_all();
        answer
    }

    fn broadcast_write(&mut self, offset: u16, data: u8) {
        self.walk_config_chain();
        for slot in self.slots.iter_mut() {
            if !slot.capabilities().contains(Capabilities::BROADCAST) {
                continue;
            }
            if let Some(card) = slot.card_mut() {
                card.broadcast_write(offset, data);
            }
        }
        self.settle_all();
    }

    fn walk_config_chain(&mut self) {
        if self.layout.daisy_chain
            && let Some(slot) = daisy::propagate(&mut self.slots, DaisyLine::Config)
        {
            debug!("config chain selects slot {slot}");
        }
    }

    fn claims(&self) -> impl Iterator<Item = (usize, InhibitClaim)> + '_ {
        self.slots.iter().filter_map(|slot| {
            let claim = slot.card()?.as_inhibit()?.inhibit_claim()?;
            Some((slot.index(), claim))
        })
    }

    /// Post-access recomputation for the card in `slot`.
    fn settle(&mut self, slot: usize) {
        self.sync_bus_master(slot);
        self.refresh_extended();
        self.refresh_overlay();
    }

    fn settle_all(&mut self) {
        for slot in 0..self.slots.len() {
            self.sync_bus_master(slot);
        }
        self.refresh_extended();
        self.refresh_overlay();
    }

    fn sync_bus_master(&mut self, slot: usize) {
        let Some(wants) = self.slots[slot]
            .card()
            .and_then(|c| c.as_bus_master())
            .map(|m| m.dma_requested())
        else {
            return;
        };
        let holds = self.gate.holder() == Some(slot);
        if wants && !holds {
            self.request_bus_master(slot);
        } else if !wants && holds {
            self.release_bus_master(slot);
        }
    }

    /// Ask the gate for the bus on behalf of the card in `slot`. Returns
    /// `None` if the slot holds no bus-master card.
    pub fn request_bus_master(&mut self, slot: usize) -> Option<Grant> {
        let master = self
            .slots
            .get_mut(slot)?
            .card_mut()?
            .as_bus_master_mut()?;
        let grant = self.gate.request(slot);
        match grant {
            Grant::Granted => {
                master.dma_granted();
                self.lines = HostLines {
                    halt_request: true,
                    halt_acknowledge: true,
                };
                debug!("slot {slot} takes the bus");
            }
            Grant::Refused { holder } => {
                master.dma_refused();
                debug!("slot {slot} bus request refused, slot {holder} holds the bus");
            }
            Grant::AlreadyHeld => {}
        }
        Some(grant)
    }

    /// Release the grant held by `slot`. Ignored (false) for non-holders.
    pub fn release_bus_master(&mut self, slot: usize) -> bool {
        if !self.gate.release(slot) {
            return false;
        }
        self.revoke(slot);
        debug!("slot {slot} releases the bus");
        true
    }

    fn revoke(&mut self, slot: usize) {
        if let Some(master) = self.slots[slot]
            .card_mut()
            .and_then(|c| c.as_bus_master_mut())
        {
            master.dma_revoked();
        }
        self.lines = HostLines::default();
    }

    /// Run one cycle for the card holding the bus. Returns false when no
    /// card holds the bus or the holder had nothing to do.
    pub fn step_master(&mut self) -> bool {
        let Some(holder) = self.gate.holder() else {
            return false;
        };
        let cycle = self.slots[holder]
            .card_mut()
            .and_then(|c| c.as_bus_master_mut())
            .and_then(|m| m.next_cycle());
        let Some(cycle) = cycle else {
            self.settle(holder);
            return false;
        };

        let master = BusMaster::Card(holder);
        let data = match cycle {
            BusCycle::Read(addr) => self.read(master, addr),
            BusCycle::Write(addr, data) => {
                self.write(master, addr, data);
                data
            }
        };
        if let Some(m) = self.slots[holder]
            .card_mut()
            .and_then(|c| c.as_bus_master_mut())
        {
            m.cycle_complete(cycle, data);
        }
        self.settle(holder);
        true
    }

    /// Walk `line` once. Returns the slot that latched on this pass.
    pub fn propagate(&mut self, line: DaisyLine) -> Option<usize> {
        if !self.layout.daisy_chain {
            return None;
        }
        let winner = daisy::propagate(&mut self.slots, line);
        if let Some(slot) = winner {
            debug!("{line:?} chain latched slot {slot}");
        }
        self.settle_all();
        winner
    }

    /// Interrupt acknowledge cycle. Returns the serviced slot and the vector
    /// it drives; `None` means nobody answered and the CPU reads the
    /// floating bus.
    pub fn acknowledge_interrupt(&mut self) -> Option<(usize, u8)> {
        let slot = self.propagate(DaisyLine::InterruptAck)?;
        let vector = self.slots[slot]
            .card_mut()
            .and_then(|c| c.as_daisy_mut())
            .map_or(FLOATING_BUS, |d| d.daisy_vector(DaisyLine::InterruptAck));
        Some((slot, vector))
    }

    /// End of interrupt service (RETI): the highest-priority card in service
    /// clears its latch.
    pub fn return_from_interrupt(&mut self) -> Option<usize> {
        let slot = daisy::clear_first_latched(&mut self.slots, DaisyLine::InterruptAck)?;
        self.settle(slot);
        Some(slot)
    }

    /// Bus-wide reset. Revokes any grant, resets every card and rebuilds the
    /// arbitration state from the cards' power-up claims.
    pub fn reset(&mut self) {
        if let Some(holder) = self.gate.clear() {
            self.revoke(holder);
        }
        self.lines = HostLines::default();
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
        self.extended_owner = None;
        self.settle_all();
        debug!("bus reset");
    }

    fn refresh_extended(&mut self) {
        let wants = |slot: &Slot| {
            slot.capabilities().contains(Capabilities::EXTENDED_WINDOW)
                && slot.card().is_some_and(|c| c.wants_extended_window())
        };
        let owner = match self.extended_owner {
            Some(owner) if wants(&self.slots[owner]) => Some(owner),
            _ => self.slots.iter().find(|s| wants(s)).map(Slot::index),
        };
        if owner != self.extended_owner {
            debug!("extended window owner {:?} -> {owner:?}", self.extended_owner);
            self.extended_owner = owner;
        }
    }

    fn refresh_overlay(&mut self) {
        let arbitration = self.arbitrate();
        if arbitration.map == self.overlay {
            return;
        }
        for s in &arbitration.suppressed {
            debug!(
                "slot {} {} inhibit over {:#06X}-{:#06X} suppressed by slot {}",
                s.slot,
                if s.write { "write" } else { "read" },
                s.start,
                s.end,
                s.by
            );
        }
        for change in inhibit::changes(&self.overlay, &arbitration.map) {
            trace!("overlay {change:?}");
            self.host.remap(&change);
        }
        self.overlay = arbitration.map;
    }

    pub fn arbitration_state(&self) -> ArbitrationState {
        ArbitrationState {
            overlay: self.overlay.regions().to_vec(),
            daisy: self.daisy_latches(),
            extended_owner: self.extended_owner,
        }
    }

    pub fn save_state(&self) -> BusSnapshot {
        BusSnapshot {
            slots: self
                .slots
                .iter()
                .map(|slot| CardSnapshot {
                    label: slot.label().map(str::to_owned),
                    data: slot.card().map(|c| c.save_state()).unwrap_or_default(),
                })
                .collect(),
            arbitration: self.arbitration_state(),
        }
    }

    /// Load every card from `snapshot` and rebuild the controller state from
    /// them. A snapshot taken on a different slot population is rejected
    /// before any card is touched. If a card rejects its data the bus is
    /// reset so no half-loaded state survives.
    pub fn restore(&mut self, snapshot: &BusSnapshot) -> Result<(), StateError> {
        if snapshot.slots.len() != self.slots.len() {
            return Err(StateError::SlotCountMismatch {
                saved: snapshot.slots.len(),
                actual: self.slots.len(),
            });
        }
        for (slot, saved) in self.slots.iter().zip(&snapshot.slots) {
            if saved.label.as_deref() != slot.label() {
                return Err(StateError::CardMismatch {
                    slot: slot.index(),
                    saved: saved.label.clone(),
                    actual: slot.label().map(str::to_owned),
                });
            }
        }

        let mut failed = None;
        for (slot, saved) in self.slots.iter_mut().zip(&snapshot.slots) {
            let Some(card) = slot.card_mut() else {
                continue;
            };
            if let Err(e) = card.load_state(&saved.data) {
                failed = Some((slot.index(), e));
                break;
            }
        }
        if let Some((index, e)) = failed {
            warn!("slot {index} rejected its saved state: {e}");
            self.reset();
            return Err(e);
        }

        self.rebuild_gate();
        self.extended_owner = snapshot.arbitration.extended_owner.filter(|&owner| {
            self.slots
                .get(owner)
                .and_then(Slot::card)
                .is_some_and(|c| c.wants_extended_window())
        });
        self.settle_all();

        let rebuilt = self.arbitration_state();
        if rebuilt != snapshot.arbitration {
            warn!(
                "saved arbitration state {:?} disagrees with the cards, using {:?}",
                snapshot.arbitration, rebuilt
            );
        }
        Ok(())
    }

    /// The grant lives in the cards; the first card claiming to hold the bus
    /// gets it back and any other claimant loses it.
    fn rebuild_gate(&mut self) {
        self.gate = DmaGate::new();
        self.lines = HostLines::default();
        for index in 0..self.slots.len() {
            let holds = self.slots[index]
                .card()
                .and_then(|c| c.as_bus_master())
                .is_some_and(|m| m.holds_bus());
            if !holds {
                continue;
            }
            match self.gate.request(index) {
                Grant::Granted => {
                    self.lines = HostLines {
                        halt_request: true,
                        halt_acknowledge: true,
                    };
                }
                _ => {
                    warn!("slot {index} restored holding the bus while another card has it");
                    if let Some(m) = self.slots[index]
                        .card_mut()
                        .and_then(|c| c.as_bus_master_mut())
                    {
                        m.dma_revoked();
                    }
                }
            }
        }
    }
}

impl<M: HostMemory> Bus for SlotBus<M> {
    type Address = u16;
    type Data = u8;

    fn read(&mut self, master: BusMaster, addr: u16) -> u8 {
        if !self.admits(master) {
            trace!("{master:?} read {addr:#06X} refused, not the bus master");
            return FLOATING_BUS;
        }
        self.access_read(addr)
    }

    fn write(&mut self, master: BusMaster, addr: u16, data: u8) {
        if !self.admits(master) {
            trace!("{master:?} write {addr:#06X} refused, not the bus master");
            return;
        }
        self.access_write(addr, data);
    }

    fn is_halted_for(&self, master: BusMaster) -> bool {
        match master {
            BusMaster::Cpu(_) => self.gate.holder().is_some(),
            BusMaster::Card(slot) => self.gate.holder() != Some(slot),
        }
    }

    fn check_interrupts(&self, target: BusMaster) -> InterruptState {
        match target {
            BusMaster::Cpu(_) => InterruptState {
                irq: self.slots.iter().any(|s| s.card().is_some_and(|c| c.irq())),
                nmi: self.slots.iter().any(|s| s.card().is_some_and(|c| c.nmi())),
            },
            BusMaster::Card(_) => InterruptState::default(),
        }
    }
}

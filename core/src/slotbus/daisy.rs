//! Daisy-chain walks over the slot arena.
//!
//! The chain is the slot order itself: the walk starts at slot 0 with the
//! enable high and visits every slot by index. Slots without a
//! daisy-chained card pass the enable through untouched. Nothing about the
//! walk is remembered by the bus; each card keeps only its own latch.

use serde::{Deserialize, Serialize};

use super::slot::Slot;
use crate::card::DaisyLine;

/// First latched card per line, as seen from the head of the chain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaisyLatches {
    pub interrupt_ack: Option<usize>,
    pub config: Option<usize>,
}

impl DaisyLatches {
    pub fn get(&self, line: DaisyLine) -> Option<usize> {
        match line {
            DaisyLine::InterruptAck => self.interrupt_ack,
            DaisyLine::Config => self.config,
        }
    }
}

/// Walk `line` from the head. Returns the slot whose latch was set by this
/// walk; a card already latched blocks the chain without being reported.
pub fn propagate(slots: &mut [Slot], line: DaisyLine) -> Option<usize> {
    let mut enable = true;
    let mut latched = None;
    for slot in slots.iter_mut() {
        let index = slot.index();
        let Some(card) = slot.card_mut().and_then(|c| c.as_daisy_mut()) else {
            continue;
        };
        let was_latched = card.daisy_latched(line);
        enable = card.daisy_pass(line, enable);
        if !was_latched && card.daisy_latched(line) {
            latched.get_or_insert(index);
        }
    }
    latched
}

pub fn first_latched(slots: &[Slot], line: DaisyLine) -> Option<usize> {
    slots.iter().find_map(|slot| {
        let daisy = slot.card()?.as_daisy()?;
        daisy.daisy_latched(line).then_some(slot.index())
    })
}

pub fn latches(slots: &[Slot]) -> DaisyLatches {
    DaisyLatches {
        interrupt_ack: first_latched(slots, DaisyLine::InterruptAck),
        config: first_latched(slots, DaisyLine::Config),
    }
}

/// End of service for the highest-priority latched card (RETI).
pub fn clear_first_latched(slots: &mut [Slot], line: DaisyLine) -> Option<usize> {
    let index = first_latched(slots, line)?;
    if let Some(daisy) = slots[index].card_mut().and_then(|c| c.as_daisy_mut()) {
        daisy.daisy_clear(line);
    }
    Some(index)
}

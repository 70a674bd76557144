use crate::card::{Capabilities, Card, FLOATING_BUS, Window};

/// A connector position on the backplane. Owns at most one card for its
/// whole lifetime; the card is bound by [`SlotBusBuilder`](super::SlotBusBuilder)
/// and never replaced.
pub struct Slot {
    index: usize,
    card: Option<Box<dyn Card>>,
}

impl Slot {
    pub(crate) fn empty(index: usize) -> Self {
        Self { index, card: None }
    }

    pub(crate) fn bind(&mut self, card: Box<dyn Card>) {
        debug_assert!(self.card.is_none());
        self.card = Some(card);
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.card.is_none()
    }

    pub fn label(&self) -> Option<&str> {
        self.card.as_deref().map(|c| c.label())
    }

    pub fn capabilities(&self) -> Capabilities {
        self.card
            .as_deref()
            .map_or(Capabilities::empty(), |c| c.capabilities())
    }

    pub fn card(&self) -> Option<&dyn Card> {
        self.card.as_deref()
    }

    pub(crate) fn card_mut(&mut self) -> Option<&mut (dyn Card + 'static)> {
        self.card.as_deref_mut()
    }

    /// Empty slots answer every read with the floating-bus value.
    pub fn read(&mut self, window: Window, offset: u16) -> u8 {
        match self.card.as_deref_mut() {
            Some(card) => card.read(window, offset),
            None => FLOATING_BUS,
        }
    }

    /// Empty slots discard writes.
    pub fn write(&mut self, window: Window, offset: u16, data: u8) {
        if let Some(card) = self.card.as_deref_mut() {
            card.write(window, offset, data);
        }
    }

    pub fn reset(&mut self) {
        if let Some(card) = self.card.as_deref_mut() {
            card.reset();
        }
    }
}

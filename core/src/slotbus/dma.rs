//! Bus-master gate: one outstanding grant, no queue.

/// Outcome of a bus request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Granted,
    /// The requester already holds the bus.
    AlreadyHeld,
    /// Another card holds the bus. The request is dropped.
    Refused { holder: usize },
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DmaGate {
    holder: Option<usize>,
}

impl DmaGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holder(&self) -> Option<usize> {
        self.holder
    }

    pub fn request(&mut self, slot: usize) -> Grant {
        match self.holder {
            None => {
                self.holder = Some(slot);
                Grant::Granted
            }
            Some(holder) if holder == slot => Grant::AlreadyHeld,
            Some(holder) => Grant::Refused { holder },
        }
    }

    /// Release the grant. Returns false (and changes nothing) if `slot` is
    /// not the holder.
    pub fn release(&mut self, slot: usize) -> bool {
        if self.holder == Some(slot) {
            self.holder = None;
            true
        } else {
            false
        }
    }

    /// Drop any grant without asking the holder (bus reset).
    pub fn clear(&mut self) -> Option<usize> {
        self.holder.take()
    }
}

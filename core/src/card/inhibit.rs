use serde::{Deserialize, Serialize};

/// Which directions of host memory a card overlays.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InhibitMode {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl InhibitMode {
    pub fn from_bits(read: bool, write: bool) -> Self {
        match (read, write) {
            (false, false) => Self::None,
            (true, false) => Self::Read,
            (false, true) => Self::Write,
            (true, true) => Self::ReadWrite,
        }
    }

    pub fn reads(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    pub fn writes(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// An active inhibit request over the inclusive range `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InhibitClaim {
    pub mode: InhibitMode,
    pub start: u16,
    pub end: u16,
}

impl InhibitClaim {
    pub fn covers(&self, addr: u16) -> bool {
        (self.start..=self.end).contains(&addr)
    }
}

/// Memory-inhibit capability: the card can substitute its own storage for
/// host memory.
pub trait Inhibit {
    /// The card's current request, or `None` while its mode is `None`.
    fn inhibit_claim(&self) -> Option<InhibitClaim>;

    /// Host-path read of an address the card currently owns.
    fn overlay_read(&mut self, addr: u16) -> u8;

    /// Host-path write to an address the card currently owns.
    fn overlay_write(&mut self, addr: u16, data: u8);
}

/// Inhibit state a card keeps in its registers.
///
/// The bus never writes this; the card changes it from its own register
/// handlers and the arbitration picks up the new claim when the access
/// settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InhibitLatch {
    mode: InhibitMode,
    start: u16,
    end: u16,
}

impl InhibitLatch {
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            mode: InhibitMode::None,
            start: start.min(end),
            end: start.max(end),
        }
    }

    pub fn assert_inhibit(&mut self, mode: InhibitMode) {
        self.mode = mode;
    }

    pub fn clear(&mut self) {
        self.mode = InhibitMode::None;
    }

    pub fn mode(&self) -> InhibitMode {
        self.mode
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    pub fn end(&self) -> u16 {
        self.end
    }

    pub fn claim(&self) -> Option<InhibitClaim> {
        (self.mode != InhibitMode::None).then_some(InhibitClaim {
            mode: self.mode,
            start: self.start,
            end: self.end,
        })
    }
}

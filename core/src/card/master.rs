/// One bus cycle issued by a card that holds the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusCycle {
    Read(u16),
    Write(u16, u8),
}

impl BusCycle {
    pub fn addr(self) -> u16 {
        match self {
            Self::Read(addr) | Self::Write(addr, _) => addr,
        }
    }
}

/// Bus-master capability (DMA, co-processor cards).
///
/// The card never touches the bus directly. While it holds the grant the
/// controller pulls cycles from `next_cycle`, performs them through the
/// host memory path and hands the result back through `cycle_complete`.
pub trait BusMasterCard {
    /// True while the card asks for the bus (HRQ / BUSREQ).
    fn dma_requested(&self) -> bool;

    /// True while the card holds the grant. Used to rebuild the gate after
    /// a restore.
    fn holds_bus(&self) -> bool;

    fn dma_granted(&mut self);

    /// Another card holds the bus. The request is dropped, not queued.
    fn dma_refused(&mut self);

    /// The grant ended (release or bus reset).
    fn dma_revoked(&mut self);

    /// The next cycle to run, or `None` if the card has nothing to do.
    fn next_cycle(&mut self) -> Option<BusCycle>;

    /// Result of a cycle: the byte read, or the byte written.
    fn cycle_complete(&mut self, cycle: BusCycle, data: u8);
}

/// Request/grant handshake state a bus-master card keeps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DmaLatch {
    requested: bool,
    granted: bool,
    refused: bool,
}

impl DmaLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dma_request(&mut self) {
        self.requested = true;
        self.refused = false;
    }

    pub fn dma_release(&mut self) {
        self.requested = false;
    }

    pub fn grant(&mut self) {
        self.granted = true;
    }

    pub fn refuse(&mut self) {
        self.requested = false;
        self.refused = true;
    }

    pub fn revoke(&mut self) {
        self.granted = false;
    }

    pub fn is_requesting(&self) -> bool {
        self.requested
    }

    pub fn is_granted(&self) -> bool {
        self.granted
    }

    pub fn was_refused(&self) -> bool {
        self.refused
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Packed form for card snapshots: bit 0 requested, bit 1 granted,
    /// bit 2 refused.
    pub fn to_bits(self) -> u8 {
        self.requested as u8 | (self.granted as u8) << 1 | (self.refused as u8) << 2
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            requested: bits & 0x01 != 0,
            granted: bits & 0x02 != 0,
            refused: bits & 0x04 != 0,
        }
    }
}

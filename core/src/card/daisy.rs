use serde::{Deserialize, Serialize};

use super::FLOATING_BUS;

/// Signals wired in series through the slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DaisyLine {
    /// Interrupt priority chain (IEI/IEO). The first requesting card on an
    /// acknowledge cycle supplies the vector.
    InterruptAck,
    /// Autoconfiguration chain (CFGIN/CFGOUT). The first unconfigured card
    /// answers the configuration registers.
    Config,
}

impl DaisyLine {
    pub const ALL: [DaisyLine; 2] = [DaisyLine::InterruptAck, DaisyLine::Config];
}

/// Daisy-chain capability.
pub trait DaisyChained {
    /// Called once per walk with the enable coming from upstream; returns the
    /// enable passed downstream. A card may only assert (latch) when
    /// `enable_in` is true.
    fn daisy_pass(&mut self, line: DaisyLine, enable_in: bool) -> bool;

    fn daisy_latched(&self, line: DaisyLine) -> bool;

    /// Data the latched card drives during an acknowledge cycle.
    fn daisy_vector(&mut self, _line: DaisyLine) -> u8 {
        FLOATING_BUS
    }

    /// End of service (RETI, configuration done).
    fn daisy_clear(&mut self, line: DaisyLine);
}

/// The IEI/IEO logic of one card on one chained line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DaisyLatch {
    requesting: bool,
    latched: bool,
}

impl DaisyLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&mut self) {
        self.requesting = true;
    }

    pub fn withdraw(&mut self) {
        self.requesting = false;
    }

    /// Electrical pass rule: a low enable passes through unchanged, a
    /// latched card holds the chain low, and a requesting card latches only
    /// while enabled from upstream.
    pub fn pass(&mut self, enable_in: bool) -> bool {
        if !enable_in || self.latched {
            return false;
        }
        if self.requesting {
            self.requesting = false;
            self.latched = true;
            return false;
        }
        true
    }

    pub fn clear(&mut self) {
        self.latched = false;
    }

    pub fn is_requesting(&self) -> bool {
        self.requesting
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn to_bits(self) -> u8 {
        self.requesting as u8 | (self.latched as u8) << 1
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            requesting: bits & 0x01 != 0,
            latched: bits & 0x02 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_card_passes_enable() {
        let mut latch = DaisyLatch::new();
        assert!(latch.pass(true));
        assert!(!latch.pass(false));
        assert!(!latch.is_latched());
    }

    #[test]
    fn requesting_card_latches_only_when_enabled() {
        let mut latch = DaisyLatch::new();
        latch.request();
        assert!(!latch.pass(false));
        assert!(!latch.is_latched());
        assert!(!latch.pass(true));
        assert!(latch.is_latched());
        assert!(!latch.is_requesting());
    }

    #[test]
    fn latched_card_holds_chain_until_cleared() {
        let mut latch = DaisyLatch::new();
        latch.request();
        latch.pass(true);
        assert!(!latch.pass(true));
        latch.clear();
        assert!(latch.pass(true));
    }
}

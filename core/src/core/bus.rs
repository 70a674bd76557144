/// Identifies who is accessing the bus (host CPUs or a bus-mastering card)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BusMaster {
    Cpu(usize),  // host CPU 0, CPU 1, etc.
    Card(usize), // card in the given slot, only valid while it holds the DMA grant
}

/// Generic bus interface supporting halt/arbitration (HALT, DMA, RDY, etc.)
pub trait Bus {
    type Address: Copy + Into<u64>; // u16 for 8-bit backplanes
    type Data;

    fn read(&mut self, master: BusMaster, addr: Self::Address) -> Self::Data;
    fn write(&mut self, master: BusMaster, addr: Self::Address, data: Self::Data);

    /// Check if the bus is halted for this master (a card holds the bus).
    /// Returns true if the master must pause before the next bus cycle.
    fn is_halted_for(&self, master: BusMaster) -> bool;

    /// Generic interrupt query. CPUs pick what they need.
    fn check_interrupts(&self, target: BusMaster) -> InterruptState;
}

/// Shared interrupt lines seen by a host CPU. Every line is the wired-OR of
/// all asserting cards.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterruptState {
    pub nmi: bool,
    pub irq: bool,
}

use backplane_core::core::{Bus, BusMaster, HostCpu, HostMemory, HostRam};
use backplane_core::slotbus::SlotBus;

/// A host CPU wired to a slot bus.
///
/// Each tick is one bus cycle. While a card holds the bus master grant the
/// CPU is not stepped at all and the cycle goes to the card instead.
pub struct SlotSystem<C: HostCpu, M: HostMemory = HostRam> {
    pub cpu: C,
    pub bus: SlotBus<M>,
    clock: u64,
}

impl<C: HostCpu, M: HostMemory> SlotSystem<C, M> {
    pub fn new(cpu: C, bus: SlotBus<M>) -> Self {
        Self { cpu, bus, clock: 0 }
    }

    pub fn tick(&mut self) {
        if self.bus.is_halted_for(BusMaster::Cpu(0)) {
            self.bus.step_master();
        } else {
            self.cpu.step(&mut self.bus);
        }
        self.clock += 1;
    }

    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    /// Reset the bus before the CPU so the CPU fetches its vectors from a
    /// power-up memory map.
    pub fn reset(&mut self) {
        self.bus.reset();
        self.cpu.reset();
        self.clock = 0;
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }
}

use super::bus::Bus;
use crate::slotbus::inhibit::OverlayChange;

/// A host CPU that can be driven by a slot bus system.
///
/// The CPU never holds a reference to the bus. It receives the bus for the
/// duration of one step and must poll [`Bus::is_halted_for`] itself if it
/// models partial instructions; systems built on
/// [`SlotBus`](crate::slotbus::SlotBus) simply stop stepping the CPU while a
/// card holds the bus, which freezes it exactly where it was.
pub trait HostCpu {
    /// Execute one cycle (or one instruction) with bus access.
    fn step(&mut self, bus: &mut dyn Bus<Address = u16, Data = u8>);

    /// Reset to the power-on state.
    fn reset(&mut self);
}

/// Host-side memory behind the card windows.
///
/// The slot bus consults this after the overlay map and the card windows.
/// Returning `None` from `read` means the host does not decode the address
/// and the bus answers with the floating-bus value.
pub trait HostMemory {
    fn read(&mut self, addr: u16) -> Option<u8>;
    fn write(&mut self, addr: u16, data: u8);

    /// Called whenever the inhibit arbitration redirects a region to a card
    /// or restores it to host memory. Hosts that keep fast-path page tables
    /// invalidate them here.
    fn remap(&mut self, _change: &OverlayChange) {}
}

/// Flat host RAM covering `[base, base + len)`.
pub struct HostRam {
    base: u16,
    data: Vec<u8>,
}

impl HostRam {
    pub fn new(base: u16, len: usize) -> Self {
        let len = len.min(0x1_0000 - base as usize);
        Self {
            base,
            data: vec![0; len],
        }
    }

    /// 64KB of RAM covering the whole address space.
    pub fn full() -> Self {
        Self::new(0, 0x1_0000)
    }

    /// Copy `bytes` into RAM starting at `addr`, clipped to the RAM size.
    pub fn load(&mut self, addr: u16, bytes: &[u8]) {
        let Some(start) = self.offset(addr) else {
            return;
        };
        let end = (start + bytes.len()).min(self.data.len());
        self.data[start..end].copy_from_slice(&bytes[..end - start]);
    }

    fn offset(&self, addr: u16) -> Option<usize> {
        let offset = addr.checked_sub(self.base)? as usize;
        (offset < self.data.len()).then_some(offset)
    }
}

impl HostMemory for HostRam {
    fn read(&mut self, addr: u16) -> Option<u8> {
        self.offset(addr).map(|o| self.data[o])
    }

    fn write(&mut self, addr: u16, data: u8) {
        if let Some(o) = self.offset(addr) {
            self.data[o] = data;
        }
    }
}

/// Bus-master handshake lines driven toward the host CPU.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostLines {
    pub halt_request: bool,
    pub halt_acknowledge: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_outside_range_is_unmapped() {
        let mut ram = HostRam::new(0x1000, 0x100);
        assert_eq!(ram.read(0x0FFF), None);
        assert_eq!(ram.read(0x1100), None);
        ram.write(0x10FF, 0x5A);
        assert_eq!(ram.read(0x10FF), Some(0x5A));
    }

    #[test]
    fn load_clips_to_size() {
        let mut ram = HostRam::new(0, 4);
        ram.load(2, &[1, 2, 3, 4]);
        assert_eq!(ram.read(2), Some(1));
        assert_eq!(ram.read(3), Some(2));
        assert_eq!(ram.read(4), None);
    }

    #[test]
    fn full_ram_covers_top_byte() {
        let mut ram = HostRam::full();
        ram.write(0xFFFF, 0x42);
        assert_eq!(ram.read(0xFFFF), Some(0x42));
    }
}

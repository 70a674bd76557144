use crate::card::{BusCycle, BusMasterCard, Capabilities, Card, DmaLatch, FLOATING_BUS, Window};
use crate::core::StateError;

/// Bus-master copy/fill engine
///
/// Moves a block of memory through the host bus while it holds the
/// bus-master grant. Programming the registers and writing the control
/// register with the start bit raises the bus request; each granted cycle
/// moves (or fills) one byte and the card drops the request after the last
/// byte, which hands the bus back to the host CPU.
///
/// # Register map (I/O window, offsets 0-7)
///
/// | Offset | Read             | Write                          |
/// |--------|------------------|--------------------------------|
/// | 0      | Source low       | Source low                     |
/// | 1      | Source high      | Source high                    |
/// | 2      | Destination low  | Destination low                |
/// | 3      | Destination high | Destination high               |
/// | 4      | Count low        | Count low                      |
/// | 5      | Count high       | Count high                     |
/// | 6      | Fill byte        | Fill byte                      |
/// | 7      | Status           | Control (bit 0 starts a copy)  |
///
/// # Control bits
///
/// | Bit | Description                                      |
/// |-----|--------------------------------------------------|
/// | 0   | Start: latch the registers and request the bus   |
/// | 1   | Fill: write the fill byte instead of copying     |
/// | 2   | Raise IRQ when the transfer completes            |
///
/// # Status bits (reading clears DONE and the IRQ)
///
/// | Bit | Description                                 |
/// |-----|---------------------------------------------|
/// | 0   | Bus request pending                         |
/// | 1   | Holding the bus                             |
/// | 2   | Last request refused (another card had it)  |
/// | 7   | Done                                        |
pub struct DmaCard {
    // Registers
    src: u16,
    dst: u16,
    count: u16,
    fill: u8,
    control: u8,

    // Execution state
    latch: DmaLatch,
    cur_src: u16,
    cur_dst: u16,
    remaining: u16,
    pending: Option<u8>,
    done: bool,
    irq: bool,
}

const CTRL_START: u8 = 0x01;
const CTRL_FILL: u8 = 0x02;
const CTRL_IRQ: u8 = 0x04;

const STATUS_REQUEST: u8 = 0x01;
const STATUS_GRANTED: u8 = 0x02;
const STATUS_REFUSED: u8 = 0x04;
const STATUS_DONE: u8 = 0x80;

const STATE_LEN: usize = 18;

impl DmaCard {
    pub fn new() -> Self {
        Self {
            src: 0,
            dst: 0,
            count: 0,
            fill: 0,
            control: 0,
            latch: DmaLatch::new(),
            cur_src: 0,
            cur_dst: 0,
            remaining: 0,
            pending: None,
            done: false,
            irq: false,
        }
    }

    /// Bytes left in the current transfer.
    pub fn remaining(&self) -> u16 {
        self.remaining
    }

    fn start(&mut self) {
        self.cur_src = self.src;
        self.cur_dst = self.dst;
        self.remaining = self.count;
        self.pending = None;
        self.done = false;
        if self.remaining == 0 {
            self.finish();
        } else {
            self.latch.dma_request();
        }
    }

    fn finish(&mut self) {
        self.latch.dma_release();
        self.done = true;
        self.irq = self.control & CTRL_IRQ != 0;
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        if self.latch.is_requesting() {
            status |= STATUS_REQUEST;
        }
        if self.latch.is_granted() {
            status |= STATUS_GRANTED;
        }
        if self.latch.was_refused() {
            status |= STATUS_REFUSED;
        }
        if self.done {
            status |= STATUS_DONE;
        }
        status
    }
}

impl Default for DmaCard {
    fn default() -> Self {
        Self::new()
    }
}

fn set_lo(reg: &mut u16, data: u8) {
    *reg = (*reg & 0xFF00) | data as u16;
}

fn set_hi(reg: &mut u16, data: u8) {
    *reg = (*reg & 0x00FF) | (data as u16) << 8;
}

impl Card for DmaCard {
    fn label(&self) -> &str {
        "dma"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IO_WINDOW | Capabilities::BUS_MASTER | Capabilities::INTERRUPTS
    }

    fn read(&mut self, window: Window, offset: u16) -> u8 {
        if window != Window::Io {
            return FLOATING_BUS;
        }
        match offset {
            0 => self.src as u8,
            1 => (self.src >> 8) as u8,
            2 => self.dst as u8,
            3 => (self.dst >> 8) as u8,
            4 => self.count as u8,
            5 => (self.count >> 8) as u8,
            6 => self.fill,
            7 => {
                let status = self.status();
                self.done = false;
                self.irq = false;
                status
            }
            _ => FLOATING_BUS,
        }
    }

    fn write(&mut self, window: Window, offset: u16, data: u8) {
        if window != Window::Io {
            return;
        }
        match offset {
            0 => set_lo(&mut self.src, data),
            1 => set_hi(&mut self.src, data),
            2 => set_lo(&mut self.dst, data),
            3 => set_hi(&mut self.dst, data),
            4 => set_lo(&mut self.count, data),
            5 => set_hi(&mut self.count, data),
            6 => self.fill = data,
            7 => {
                self.control = data;
                // A start while a transfer is running is ignored.
                if data & CTRL_START != 0 && !self.latch.is_requesting() {
                    self.start();
                }
            }
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.latch.reset();
        self.control = 0;
        self.remaining = 0;
        self.pending = None;
        self.done = false;
        self.irq = false;
    }

    fn irq(&self) -> bool {
        self.irq
    }

    fn as_bus_master(&self) -> Option<&dyn BusMasterCard> {
        Some(self)
    }

    fn as_bus_master_mut(&mut self) -> Option<&mut dyn BusMasterCard> {
        Some(self)
    }

    fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STATE_LEN);
        for word in [self.src, self.dst, self.count] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.push(self.fill);
        out.push(self.control);
        for word in [self.cur_src, self.cur_dst, self.remaining] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.push(self.pending.is_some() as u8);
        out.push(self.pending.unwrap_or(0));
        out.push(self.latch.to_bits());
        out.push(self.done as u8 | (self.irq as u8) << 1);
        out
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        if data.len() != STATE_LEN {
            return Err(StateError::Truncated {
                expected: STATE_LEN,
                actual: data.len(),
            });
        }
        let word = |i: usize| u16::from_le_bytes([data[i], data[i + 1]]);
        self.src = word(0);
        self.dst = word(2);
        self.count = word(4);
        self.fill = data[6];
        self.control = data[7];
        self.cur_src = word(8);
        self.cur_dst = word(10);
        self.remaining = word(12);
        self.pending = (data[14] != 0).then_some(data[15]);
        self.latch = DmaLatch::from_bits(data[16]);
        self.done = data[17] & 0x01 != 0;
        self.irq = data[17] & 0x02 != 0;
        Ok(())
    }
}

impl BusMasterCard for DmaCard {
    fn dma_requested(&self) -> bool {
        self.latch.is_requesting()
    }

    fn holds_bus(&self) -> bool {
        self.latch.is_granted()
    }

    fn dma_granted(&mut self) {
        self.latch.grant();
    }

    fn dma_refused(&mut self) {
        self.latch.refuse();
    }

    fn dma_revoked(&mut self) {
        self.latch.revoke();
        self.latch.dma_release();
    }

    fn next_cycle(&mut self) -> Option<BusCycle> {
        if !self.latch.is_granted() || self.remaining == 0 {
            return None;
        }
        if self.control & CTRL_FILL != 0 {
            return Some(BusCycle::Write(self.cur_dst, self.fill));
        }
        Some(match self.pending {
            Some(data) => BusCycle::Write(self.cur_dst, data),
            None => BusCycle::Read(self.cur_src),
        })
    }

    fn cycle_complete(&mut self, cycle: BusCycle, data: u8) {
        match cycle {
            BusCycle::Read(_) => {
                self.pending = Some(data);
                self.cur_src = self.cur_src.wrapping_add(1);
            }
            BusCycle::Write(..) => {
                self.pending = None;
                self.cur_dst = self.cur_dst.wrapping_add(1);
                self.remaining -= 1;
                if self.remaining == 0 {
                    self.finish();
                }
            }
        }
    }
}

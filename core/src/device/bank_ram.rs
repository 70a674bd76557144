use crate::card::{
    Capabilities, Card, FLOATING_BUS, Inhibit, InhibitClaim, InhibitLatch, InhibitMode, Window,
};
use crate::core::StateError;

/// Banked overlay RAM (language-card style)
///
/// Holds one or more banks of RAM sized to the overlay range. When the
/// control register enables it, the card inhibits host memory over
/// `[start, end]` and serves those addresses from the selected bank.
///
/// # Register map (I/O window)
///
/// | Offset | Read                          | Write                 |
/// |--------|-------------------------------|-----------------------|
/// | 0      | Control                       | Control               |
/// | 1      | Bank select                   | Bank select           |
/// | 2      | Control, then overlay off     | -                     |
///
/// Control bits: bit 0 = overlay reads, bit 1 = overlay writes. Reading
/// offset 2 is a soft switch: it returns the control value and turns the
/// overlay off, so host memory is visible again from the next cycle.
pub struct BankRam {
    latch: InhibitLatch,
    bank: u8,
    banks: u8,
    data: Vec<u8>,
}

impl BankRam {
    pub fn new(start: u16, end: u16, banks: u8) -> Self {
        let latch = InhibitLatch::new(start, end);
        let size = latch.end() as usize - latch.start() as usize + 1;
        let banks = banks.max(1);
        Self {
            latch,
            bank: 0,
            banks,
            data: vec![0; size * banks as usize],
        }
    }

    fn bank_size(&self) -> usize {
        self.latch.end() as usize - self.latch.start() as usize + 1
    }

    fn offset(&self, addr: u16) -> usize {
        self.bank as usize * self.bank_size() + (addr - self.latch.start()) as usize
    }

    fn control(&self) -> u8 {
        let mode = self.latch.mode();
        mode.reads() as u8 | (mode.writes() as u8) << 1
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    pub fn mode(&self) -> InhibitMode {
        self.latch.mode()
    }

    /// Fill the current bank from a byte slice (e.g. preloaded firmware).
    /// Shorter slices fill only the start of the bank.
    pub fn load_from(&mut self, src: &[u8]) {
        let base = self.bank as usize * self.bank_size();
        let len = src.len().min(self.bank_size());
        self.data[base..base + len].copy_from_slice(&src[..len]);
    }
}

impl Card for BankRam {
    fn label(&self) -> &str {
        "bank-ram"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IO_WINDOW | Capabilities::INHIBIT
    }

    fn read(&mut self, window: Window, offset: u16) -> u8 {
        if window != Window::Io {
            return FLOATING_BUS;
        }
        match offset {
            0 => self.control(),
            1 => self.bank,
            2 => {
                let control = self.control();
                self.latch.clear();
                control
            }
            _ => FLOATING_BUS,
        }
    }

    fn write(&mut self, window: Window, offset: u16, data: u8) {
        if window != Window::Io {
            return;
        }
        match offset {
            0 => self
                .latch
                .assert_inhibit(InhibitMode::from_bits(data & 0x01 != 0, data & 0x02 != 0)),
            1 => self.bank = data % self.banks,
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.latch.clear();
        self.bank = 0;
    }

    fn as_inhibit(&self) -> Option<&dyn Inhibit> {
        Some(self)
    }

    fn as_inhibit_mut(&mut self) -> Option<&mut dyn Inhibit> {
        Some(self)
    }

    /// Layout: control, bank, then every bank's RAM.
    fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.data.len());
        out.push(self.control());
        out.push(self.bank);
        out.extend_from_slice(&self.data);
        out
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let expected = 2 + self.data.len();
        if data.len() != expected {
            return Err(StateError::Truncated {
                expected,
                actual: data.len(),
            });
        }
        if data[1] >= self.banks {
            return Err(StateError::Invalid(format!(
                "bank {} out of {}",
                data[1], self.banks
            )));
        }
        self.latch
            .assert_inhibit(InhibitMode::from_bits(data[0] & 0x01 != 0, data[0] & 0x02 != 0));
        self.bank = data[1];
        self.data.copy_from_slice(&data[2..]);
        Ok(())
    }
}

impl Inhibit for BankRam {
    fn inhibit_claim(&self) -> Option<InhibitClaim> {
        self.latch.claim()
    }

    fn overlay_read(&mut self, addr: u16) -> u8 {
        self.data[self.offset(addr)]
    }

    fn overlay_write(&mut self, addr: u16, data: u8) {
        let offset = self.offset(addr);
        self.data[offset] = data;
    }
}

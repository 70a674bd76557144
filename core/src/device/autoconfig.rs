use crate::card::{
    Capabilities, Card, DaisyChained, DaisyLatch, DaisyLine, FLOATING_BUS, Inhibit, InhibitClaim,
    InhibitLatch, InhibitMode, Window,
};
use crate::core::StateError;

/// Autoconfiguring memory card (Zorro style)
///
/// After reset the card is unconfigured and waits on the configuration
/// chain. The first unconfigured card in slot order latches the chain and
/// answers the configuration registers in the broadcast window; every card
/// behind it sees the enable low and stays quiet. Writing a base address
/// maps the card's RAM there (as a read/write overlay) and releases the
/// chain, so the next card is selected on the following access. Writing
/// the shut-up register releases the chain without mapping anything.
///
/// # Configuration registers (broadcast window, selected card only)
///
/// | Offset | Read                      | Write              |
/// |--------|---------------------------|--------------------|
/// | 0      | Product                   | -                  |
/// | 1      | Manufacturer high         | -                  |
/// | 2      | Manufacturer low          | -                  |
/// | 3      | Size in 256-byte pages    | -                  |
/// | 4      | -                         | Base address high  |
/// | 5      | -                         | Shut up            |
pub struct AutoconfigCard {
    product: u8,
    manufacturer: u16,
    pages: u8,
    chain: DaisyLatch,
    configured: bool,
    overlay: Option<InhibitLatch>,
    ram: Vec<u8>,
}

const STATE_HEADER: usize = 3;

impl AutoconfigCard {
    pub fn new(product: u8, manufacturer: u16, pages: u8) -> Self {
        let pages = pages.max(1);
        let mut card = Self {
            product,
            manufacturer,
            pages,
            chain: DaisyLatch::new(),
            configured: false,
            overlay: None,
            ram: vec![0; pages as usize * 0x100],
        };
        card.chain.request();
        card
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Base address assigned during configuration.
    pub fn base(&self) -> Option<u16> {
        self.overlay.map(|o| o.start())
    }

    fn selected(&self) -> bool {
        !self.configured && self.chain.is_latched()
    }

    fn configure(&mut self, base: Option<u16>) {
        self.overlay = base.map(|start| {
            let end = (start as u32 + self.ram.len() as u32 - 1).min(0xFFFF) as u16;
            let mut latch = InhibitLatch::new(start, end);
            latch.assert_inhibit(InhibitMode::ReadWrite);
            latch
        });
        self.configured = true;
        self.chain.clear();
        self.chain.withdraw();
    }
}

impl Card for AutoconfigCard {
    fn label(&self) -> &str {
        "autoconfig"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::BROADCAST | Capabilities::DAISY_CHAIN | Capabilities::INHIBIT
    }

    fn read(&mut self, _window: Window, _offset: u16) -> u8 {
        FLOATING_BUS
    }

    fn write(&mut self, _window: Window, _offset: u16, _data: u8) {}

    fn reset(&mut self) {
        self.configured = false;
        self.overlay = None;
        self.chain.reset();
        self.chain.request();
    }

    fn broadcast_read(&mut self, offset: u16) -> Option<u8> {
        if !self.selected() {
            return None;
        }
        Some(match offset {
            0 => self.product,
            1 => (self.manufacturer >> 8) as u8,
            2 => self.manufacturer as u8,
            3 => self.pages,
            _ => FLOATING_BUS,
        })
    }

    fn broadcast_write(&mut self, offset: u16, data: u8) {
        if !self.selected() {
            return;
        }
        match offset {
            4 => self.configure(Some((data as u16) << 8)),
            5 => self.configure(None),
            _ => {}
        }
    }

    fn as_inhibit(&self) -> Option<&dyn Inhibit> {
        Some(self)
    }

    fn as_inhibit_mut(&mut self) -> Option<&mut dyn Inhibit> {
        Some(self)
    }

    fn as_daisy(&self) -> Option<&dyn DaisyChained> {
        Some(self)
    }

    fn as_daisy_mut(&mut self) -> Option<&mut dyn DaisyChained> {
        Some(self)
    }

    /// Layout: flags, base high byte, chain latch, RAM.
    fn save_state(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(STATE_HEADER + self.ram.len());
        out.push(self.configured as u8 | (self.overlay.is_some() as u8) << 1);
        out.push(self.base().map_or(0, |b| (b >> 8) as u8));
        out.push(self.chain.to_bits());
        out.extend_from_slice(&self.ram);
        out
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let expected = STATE_HEADER + self.ram.len();
        if data.len() != expected {
            return Err(StateError::Truncated {
                expected,
                actual: data.len(),
            });
        }
        let configured = data[0] & 0x01 != 0;
        let mapped = data[0] & 0x02 != 0;
        if configured {
            self.configure(mapped.then_some((data[1] as u16) << 8));
        } else {
            self.configured = false;
            self.overlay = None;
        }
        self.chain = DaisyLatch::from_bits(data[2]);
        self.ram.copy_from_slice(&data[STATE_HEADER..]);
        Ok(())
    }
}

impl Inhibit for AutoconfigCard {
    fn inhibit_claim(&self) -> Option<InhibitClaim> {
        self.overlay.and_then(|o| o.claim())
    }

    fn overlay_read(&mut self, addr: u16) -> u8 {
        match self.base() {
            Some(base) => self.ram[(addr - base) as usize],
            None => FLOATING_BUS,
        }
    }

    fn overlay_write(&mut self, addr: u16, data: u8) {
        if let Some(base) = self.base() {
            self.ram[(addr - base) as usize] = data;
        }
    }
}

impl DaisyChained for AutoconfigCard {
    fn daisy_pass(&mut self, line: DaisyLine, enable_in: bool) -> bool {
        match line {
            DaisyLine::Config => self.chain.pass(enable_in),
            DaisyLine::InterruptAck => enable_in,
        }
    }

    fn daisy_latched(&self, line: DaisyLine) -> bool {
        line == DaisyLine::Config && self.chain.is_latched()
    }

    fn daisy_clear(&mut self, line: DaisyLine) {
        if line == DaisyLine::Config {
            self.chain.clear();
        }
    }
}

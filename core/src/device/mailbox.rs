use crate::card::{
    Capabilities, Card, DaisyChained, DaisyLatch, DaisyLine, FLOATING_BUS, Window,
};
use crate::core::StateError;

/// Doorbell mailbox on the interrupt priority chain
///
/// A one-byte mailbox with a doorbell. Ringing the doorbell raises IRQ and
/// arms the card on the interrupt-acknowledge chain; on the acknowledge
/// cycle the highest-priority ringing card latches and drives its vector.
/// The latch holds every lower card off the chain until the CPU ends
/// service (RETI).
///
/// # Register map (I/O window)
///
/// | Offset | Read                        | Write          |
/// |--------|-----------------------------|----------------|
/// | 0      | Mailbox byte                | Mailbox byte   |
/// | 1      | Status                      | Ring doorbell  |
/// | 2      | Vector                      | Vector         |
///
/// Status: bit 0 = ringing (request pending), bit 1 = in service.
pub struct Mailbox {
    data: u8,
    vector: u8,
    chain: DaisyLatch,
}

impl Mailbox {
    pub fn new(vector: u8) -> Self {
        Self {
            data: 0,
            vector,
            chain: DaisyLatch::new(),
        }
    }

    pub fn ring(&mut self) {
        self.chain.request();
    }

    pub fn in_service(&self) -> bool {
        self.chain.is_latched()
    }
}

impl Card for Mailbox {
    fn label(&self) -> &str {
        "mailbox"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IO_WINDOW | Capabilities::DAISY_CHAIN | Capabilities::INTERRUPTS
    }

    fn read(&mut self, window: Window, offset: u16) -> u8 {
        if window != Window::Io {
            return FLOATING_BUS;
        }
        match offset {
            0 => self.data,
            1 => self.chain.is_requesting() as u8 | (self.chain.is_latched() as u8) << 1,
            2 => self.vector,
            _ => FLOATING_BUS,
        }
    }

    fn write(&mut self, window: Window, offset: u16, data: u8) {
        if window != Window::Io {
            return;
        }
        match offset {
            0 => self.data = data,
            1 => self.ring(),
            2 => self.vector = data,
            _ => {}
        }
    }

    fn reset(&mut self) {
        self.chain.reset();
    }

    fn irq(&self) -> bool {
        self.chain.is_requesting()
    }

    fn as_daisy(&self) -> Option<&dyn DaisyChained> {
        Some(self)
    }

    fn as_daisy_mut(&mut self) -> Option<&mut dyn DaisyChained> {
        Some(self)
    }

    fn save_state(&self) -> Vec<u8> {
        vec![self.data, self.vector, self.chain.to_bits()]
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let &[mailbox, vector, chain] = data else {
            return Err(StateError::Truncated {
                expected: 3,
                actual: data.len(),
            });
        };
        self.data = mailbox;
        self.vector = vector;
        self.chain = DaisyLatch::from_bits(chain);
        Ok(())
    }
}

impl DaisyChained for Mailbox {
    fn daisy_pass(&mut self, line: DaisyLine, enable_in: bool) -> bool {
        match line {
            DaisyLine::InterruptAck => self.chain.pass(enable_in),
            DaisyLine::Config => enable_in,
        }
    }

    fn daisy_latched(&self, line: DaisyLine) -> bool {
        line == DaisyLine::InterruptAck && self.chain.is_latched()
    }

    fn daisy_vector(&mut self, line: DaisyLine) -> u8 {
        match line {
            DaisyLine::InterruptAck => self.vector,
            DaisyLine::Config => FLOATING_BUS,
        }
    }

    fn daisy_clear(&mut self, line: DaisyLine) {
        if line == DaisyLine::InterruptAck {
            self.chain.clear();
        }
    }
}

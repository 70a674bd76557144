use crate::card::{Capabilities, Card, FLOATING_BUS, Window};
use crate::core::StateError;

/// Expansion ROM in the shared extended window
///
/// Any access to the card's I/O window makes it claim the extended window;
/// any access to the broadcast window (the `$CFFF` strobe on an Apple II
/// backplane) releases the claim. Images larger than the window are split
/// into banks selected through the I/O window.
///
/// # Register map (I/O window)
///
/// | Offset | Read        | Write        |
/// |--------|-------------|--------------|
/// | 0      | Bank select | Bank select  |
pub struct ExpansionRom {
    image: Vec<u8>,
    bank_size: usize,
    bank: u8,
    claiming: bool,
}

impl ExpansionRom {
    pub fn new(image: Vec<u8>, bank_size: u16) -> Self {
        Self {
            image,
            bank_size: (bank_size as usize).max(1),
            bank: 0,
            claiming: false,
        }
    }

    fn banks(&self) -> usize {
        self.image.len().div_ceil(self.bank_size).max(1)
    }
}

impl Card for ExpansionRom {
    fn label(&self) -> &str {
        "expansion-rom"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::IO_WINDOW | Capabilities::EXTENDED_WINDOW | Capabilities::BROADCAST
    }

    fn read(&mut self, window: Window, offset: u16) -> u8 {
        match window {
            Window::Io => {
                self.claiming = true;
                match offset {
                    0 => self.bank,
                    _ => FLOATING_BUS,
                }
            }
            Window::Extended => {
                let offset = offset as usize;
                if offset >= self.bank_size {
                    return FLOATING_BUS;
                }
                let index = self.bank as usize * self.bank_size + offset;
                self.image.get(index).copied().unwrap_or(FLOATING_BUS)
            }
        }
    }

    fn write(&mut self, window: Window, offset: u16, data: u8) {
        if window != Window::Io {
            return;
        }
        self.claiming = true;
        if offset == 0 {
            self.bank = (data as usize % self.banks()) as u8;
        }
    }

    fn reset(&mut self) {
        self.claiming = false;
        self.bank = 0;
    }

    fn broadcast_read(&mut self, _offset: u16) -> Option<u8> {
        self.claiming = false;
        None
    }

    fn broadcast_write(&mut self, _offset: u16, _data: u8) {
        self.claiming = false;
    }

    fn wants_extended_window(&self) -> bool {
        self.claiming
    }

    fn save_state(&self) -> Vec<u8> {
        vec![self.claiming as u8, self.bank]
    }

    fn load_state(&mut self, data: &[u8]) -> Result<(), StateError> {
        let &[claiming, bank] = data else {
            return Err(StateError::Truncated {
                expected: 2,
                actual: data.len(),
            });
        };
        if bank as usize >= self.banks() {
            return Err(StateError::Invalid(format!(
                "bank {bank} out of {}",
                self.banks()
            )));
        }
        self.claiming = claiming != 0;
        self.bank = bank;
        Ok(())
    }
}

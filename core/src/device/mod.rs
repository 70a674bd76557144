pub mod autoconfig;
pub mod bank_ram;
pub mod dma_card;
pub mod expansion_rom;
pub mod mailbox;

pub use autoconfig::AutoconfigCard;
pub use bank_ram::BankRam;
pub use dma_card::DmaCard;
pub use expansion_rom::ExpansionRom;
pub use mailbox::Mailbox;

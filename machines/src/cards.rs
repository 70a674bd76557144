//! Registry entries for the reference cards in `backplane_core::device`.

use backplane_core::card::{Card, FLOATING_BUS};
use backplane_core::device::{AutoconfigCard, BankRam, DmaCard, ExpansionRom, Mailbox};

use crate::config::{CardParams, ConfigError};
use crate::registry::CardEntry;

fn create_bank_ram(params: &CardParams) -> Result<Box<dyn Card>, ConfigError> {
    params.expect_only(&["start", "end", "banks"])?;
    let start = params.u16_or("start", 0xD000)?;
    let end = params.u16_or("end", 0xFFFF)?;
    if end < start {
        return Err(ConfigError::InvalidParam {
            key: "end".into(),
            reason: format!("{end:#06X} is below start {start:#06X}"),
        });
    }
    let banks = params.u8_or("banks", 1)?;
    Ok(Box::new(BankRam::new(start, end, banks)))
}

fn create_dma(params: &CardParams) -> Result<Box<dyn Card>, ConfigError> {
    params.expect_only(&[])?;
    Ok(Box::new(DmaCard::new()))
}

fn create_mailbox(params: &CardParams) -> Result<Box<dyn Card>, ConfigError> {
    params.expect_only(&["vector"])?;
    Ok(Box::new(Mailbox::new(params.u8_or("vector", FLOATING_BUS)?)))
}

fn create_autoconfig(params: &CardParams) -> Result<Box<dyn Card>, ConfigError> {
    params.expect_only(&["product", "manufacturer", "pages"])?;
    Ok(Box::new(AutoconfigCard::new(
        params.u8_or("product", 0)?,
        params.u16_or("manufacturer", 0)?,
        params.u8_or("pages", 1)?,
    )))
}

fn create_expansion_rom(params: &CardParams) -> Result<Box<dyn Card>, ConfigError> {
    params.expect_only(&["image", "fill", "size", "bank_size"])?;
    let bank_size = params.u16_or("bank_size", 0x800)?;
    let image = match params.bytes("image")? {
        Some(image) => image,
        None => {
            let size = params.u16_or("size", bank_size)?;
            vec![params.u8_or("fill", FLOATING_BUS)?; size as usize]
        }
    };
    Ok(Box::new(ExpansionRom::new(image, bank_size)))
}

inventory::submit! {
    CardEntry::new("bank-ram", "banked RAM overlaying host memory", create_bank_ram)
}

inventory::submit! {
    CardEntry::new("dma", "bus-master block copy/fill engine", create_dma)
}

inventory::submit! {
    CardEntry::new("mailbox", "doorbell mailbox on the interrupt chain", create_mailbox)
}

inventory::submit! {
    CardEntry::new("autoconfig", "self-configuring RAM on the config chain", create_autoconfig)
}

inventory::submit! {
    CardEntry::new("expansion-rom", "ROM in the shared extended window", create_expansion_rom)
}

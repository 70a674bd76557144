//! TOML bus configuration.
//!
//! ```toml
//! [layout]
//! preset = "apple2"
//!
//! [[card]]
//! slot = 0
//! kind = "bank-ram"
//! [card.params]
//! start = 0xD000
//! end = 0xFFFF
//! ```
//!
//! The layout is either a preset (`apple2`, or `flat` with an optional
//! `slots` count) or a full [`DecodeLayout`] table.

use std::path::{Path, PathBuf};

use backplane_core::core::HostMemory;
use backplane_core::slotbus::{DecodeLayout, SlotBus, SlotBusBuilder};
use log::info;
use serde::Deserialize;
use thiserror::Error;

use crate::registry;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown card kind {0:?}")]
    UnknownCard(String),

    #[error("parameter {key:?} {reason}")]
    InvalidParam { key: String, reason: String },

    #[error("slot {slot} ({kind}): {source}")]
    Card {
        slot: usize,
        kind: String,
        source: Box<ConfigError>,
    },

    #[error(transparent)]
    Bus(#[from] backplane_core::ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Apple2,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LayoutConfig {
    Preset {
        preset: Preset,
        #[serde(default)]
        slots: Option<usize>,
    },
    Custom(DecodeLayout),
}

impl LayoutConfig {
    pub fn resolve(&self) -> DecodeLayout {
        match self {
            Self::Preset { preset, slots } => {
                let mut layout = match preset {
                    Preset::Apple2 => DecodeLayout::apple2(),
                    Preset::Flat => DecodeLayout::flat(8),
                };
                if let Some(slots) = slots {
                    layout.slot_count = *slots;
                }
                layout
            }
            Self::Custom(layout) => layout.clone(),
        }
    }
}

/// Fixed parameters of one card, straight from its `[card.params]` table.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct CardParams(toml::Table);

impl CardParams {
    pub fn new(table: toml::Table) -> Self {
        Self(table)
    }

    /// Reject keys a card kind does not know, so typos do not fall back to
    /// defaults silently.
    pub fn expect_only(&self, known: &[&str]) -> Result<(), ConfigError> {
        match self.0.keys().find(|k| !known.contains(&k.as_str())) {
            Some(key) => Err(invalid(key, "is not a parameter of this card")),
            None => Ok(()),
        }
    }

    fn integer(&self, key: &str) -> Result<Option<i64>, ConfigError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(n)) => Ok(Some(*n)),
            Some(other) => Err(invalid(
                key,
                &format!("must be an integer, got {}", other.type_str()),
            )),
        }
    }

    pub fn u8_or(&self, key: &str, default: u8) -> Result<u8, ConfigError> {
        match self.integer(key)? {
            None => Ok(default),
            Some(n) => u8::try_from(n).map_err(|_| not_a_byte(key, n)),
        }
    }

    pub fn u16_or(&self, key: &str, default: u16) -> Result<u16, ConfigError> {
        match self.integer(key)? {
            None => Ok(default),
            Some(n) => u16::try_from(n)
                .map_err(|_| invalid(key, &format!("{n} is not a 16-bit address"))),
        }
    }

    /// Byte array parameter (`image = [0xA9, 0x00, ...]`).
    pub fn bytes(&self, key: &str) -> Result<Option<Vec<u8>>, ConfigError> {
        let Some(value) = self.0.get(key) else {
            return Ok(None);
        };
        let toml::Value::Array(items) = value else {
            return Err(invalid(key, "must be an array of bytes"));
        };
        items
            .iter()
            .map(|item| match item {
                toml::Value::Integer(n) => u8::try_from(*n).map_err(|_| not_a_byte(key, *n)),
                other => Err(invalid(
                    key,
                    &format!("must hold integers, got {}", other.type_str()),
                )),
            })
            .collect::<Result<Vec<u8>, _>>()
            .map(Some)
    }
}

fn not_a_byte(key: &str, n: i64) -> ConfigError {
    invalid(key, &format!("{n} does not fit in a byte"))
}

fn invalid(key: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidParam {
        key: key.to_owned(),
        reason: reason.to_owned(),
    }
}

/// One `[[card]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CardConfig {
    pub slot: usize,
    pub kind: String,
    #[serde(default)]
    pub params: CardParams,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BusConfig {
    pub layout: LayoutConfig,
    #[serde(default, rename = "card")]
    pub cards: Vec<CardConfig>,
}

impl BusConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    pub fn layout(&self) -> DecodeLayout {
        self.layout.resolve()
    }

    /// Instantiate every card through the registry and assemble the bus.
    pub fn build<M: HostMemory>(&self, host: M) -> Result<SlotBus<M>, ConfigError> {
        let mut builder = SlotBusBuilder::new(self.layout(), host);
        for card in &self.cards {
            let entry = registry::find(&card.kind)?;
            let instance = entry.instantiate(&card.params).map_err(|e| ConfigError::Card {
                slot: card.slot,
                kind: card.kind.clone(),
                source: Box::new(e),
            })?;
            builder = builder.boxed_card(card.slot, instance);
        }
        let bus = builder.build()?;
        info!("bus configured with {} card(s)", self.cards.len());
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(source: &str) -> CardParams {
        CardParams::new(toml::from_str(source).unwrap())
    }

    #[test]
    fn preset_layouts() {
        let config = BusConfig::from_toml_str("[layout]\npreset = \"apple2\"\n").unwrap();
        assert_eq!(config.layout(), DecodeLayout::apple2());
        assert!(config.cards.is_empty());

        let config =
            BusConfig::from_toml_str("[layout]\npreset = \"flat\"\nslots = 4\n").unwrap();
        assert_eq!(config.layout(), DecodeLayout::flat(4));
    }

    #[test]
    fn custom_layout_table() {
        let source = r#"
            [layout]
            slot_count = 4
            io = { base = 0xC100, unit = 0x20 }
            broadcast = { start = 0xE800, end = 0xE8FF }
            bus_master = false
        "#;
        let layout = BusConfig::from_toml_str(source).unwrap().layout();
        assert_eq!(layout.io.base, 0xC100);
        assert_eq!(layout.extended, None);
        assert!(!layout.bus_master);
        assert!(layout.inhibit);
    }

    #[test]
    fn integer_params_are_range_checked() {
        let p = params("start = 0xD000\nbanks = 300\nname = \"x\"");
        assert_eq!(p.u16_or("start", 0).unwrap(), 0xD000);
        assert_eq!(p.u16_or("end", 0xFFFF).unwrap(), 0xFFFF);
        assert!(matches!(
            p.u8_or("banks", 1),
            Err(ConfigError::InvalidParam { key, .. }) if key == "banks"
        ));
        assert!(p.u8_or("name", 1).is_err());
    }

    #[test]
    fn byte_array_param() {
        let p = params("image = [1, 2, 255]");
        assert_eq!(p.bytes("image").unwrap(), Some(vec![1, 2, 255]));
        assert!(params("image = [256]").bytes("image").is_err());
        assert_eq!(p.bytes("missing").unwrap(), None);
    }

    #[test]
    fn unknown_param_rejected() {
        let p = params("strat = 1");
        assert!(p.expect_only(&["start", "end"]).is_err());
        assert!(params("start = 1").expect_only(&["start"]).is_ok());
    }
}

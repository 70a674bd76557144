//! Card kinds a configuration file can name.
//!
//! `cards.rs` submits one [`CardEntry`] per kind with [`inventory::submit!`];
//! the configuration loader resolves each `kind = "..."` here.

use backplane_core::card::Card;

use crate::config::{CardParams, ConfigError};

/// Builds a card from its `[card.params]` table.
pub type CardFactory = fn(&CardParams) -> Result<Box<dyn Card>, ConfigError>;

pub struct CardEntry {
    pub name: &'static str,
    /// Shown by `backplane --list-cards`.
    pub summary: &'static str,
    factory: CardFactory,
}

impl CardEntry {
    pub const fn new(name: &'static str, summary: &'static str, factory: CardFactory) -> Self {
        Self {
            name,
            summary,
            factory,
        }
    }

    pub fn instantiate(&self, params: &CardParams) -> Result<Box<dyn Card>, ConfigError> {
        (self.factory)(params)
    }
}

inventory::collect!(CardEntry);

/// Every registered kind, in name order.
pub fn all() -> Vec<&'static CardEntry> {
    let mut entries: Vec<_> = inventory::iter::<CardEntry>.into_iter().collect();
    entries.sort_unstable_by(|a, b| a.name.cmp(b.name));
    entries
}

pub fn find(kind: &str) -> Result<&'static CardEntry, ConfigError> {
    inventory::iter::<CardEntry>
        .into_iter()
        .find(|e| e.name == kind)
        .ok_or_else(|| ConfigError::UnknownCard(kind.to_owned()))
}

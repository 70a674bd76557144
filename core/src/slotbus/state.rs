use serde::{Deserialize, Serialize};

use super::daisy::DaisyLatches;
use super::inhibit::OverlayRegion;

/// One slot's saved card, identified by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub label: Option<String>,
    pub data: Vec<u8>,
}

/// Controller-side arbitration state. Every field can be rebuilt from card
/// state (the extended-window owner from the cards' claims plus the
/// first-come order); it is saved so a restore can be checked against it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArbitrationState {
    pub overlay: Vec<OverlayRegion>,
    pub daisy: DaisyLatches,
    pub extended_owner: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusSnapshot {
    pub slots: Vec<CardSnapshot>,
    pub arbitration: ArbitrationState,
}

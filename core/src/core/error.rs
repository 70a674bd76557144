use thiserror::Error;

use crate::card::Capabilities;

/// Configuration-time failures. These abort machine construction; nothing
/// at runtime produces them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("slot {slot} out of range (bus has {count} slots)")]
    SlotOutOfRange { slot: usize, count: usize },

    #[error("slot {slot} already holds card {label:?}")]
    SlotOccupied { slot: usize, label: String },

    #[error("bus supports at most {max} slots, layout asks for {requested}")]
    TooManySlots { requested: usize, max: usize },

    #[error("card {label:?} in slot {slot} requires {missing:?}, which this host does not provide")]
    MissingCapability {
        slot: usize,
        label: String,
        missing: Capabilities,
    },

    #[error("card {label:?} in slot {slot} declares {declared:?} but does not implement it")]
    CapabilityMismatch {
        slot: usize,
        label: String,
        declared: Capabilities,
    },

    #[error("invalid layout: {0}")]
    InvalidLayout(String),
}

/// Failures while restoring a saved bus snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("snapshot has {saved} slots, bus has {actual}")]
    SlotCountMismatch { saved: usize, actual: usize },

    #[error("slot {slot}: snapshot holds {saved:?}, bus holds {actual:?}")]
    CardMismatch {
        slot: usize,
        saved: Option<String>,
        actual: Option<String>,
    },

    #[error("card state truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    #[error("invalid card state: {0}")]
    Invalid(String),
}

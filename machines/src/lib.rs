pub mod cards;
pub mod config;
pub mod registry;
pub mod system;

pub use config::{BusConfig, ConfigError};
pub use system::SlotSystem;

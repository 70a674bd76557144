pub mod bus;
pub mod error;
pub mod host;

pub use bus::{Bus, BusMaster, InterruptState};
pub use error::{ConfigError, StateError};
pub use host::{HostCpu, HostLines, HostMemory, HostRam};

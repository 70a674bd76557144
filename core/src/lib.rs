pub mod card;
pub mod core;
pub mod device;
pub mod slotbus;

pub use crate::core::{ConfigError, StateError};

pub mod prelude {
    pub use crate::card::{
        BusCycle, BusMasterCard, Capabilities, Card, DaisyChained, DaisyLatch, DaisyLine,
        DmaLatch, FLOATING_BUS, Inhibit, InhibitClaim, InhibitLatch, InhibitMode, Window,
    };
    pub use crate::core::{
        Bus, BusMaster, ConfigError, HostCpu, HostLines, HostMemory, HostRam, InterruptState,
        StateError,
    };
    pub use crate::slotbus::{
        AccessWidth, BusSnapshot, DecodeLayout, Grant, OverlayChange, SlotBus, SlotBusBuilder,
        Target,
    };
}

//! strp-net: Network node for STRP.
//!
//! Drives the `strp-core` routing agent with real UDP sockets and threads:
//! every datagram, timer tick and lifecycle change becomes an [`Event`] on a
//! single queue, drained by one driver thread so the agent runs strictly
//! to completion per event.

pub mod config;
pub mod driver;
pub mod energy;
pub mod event;
pub mod interface;
pub mod node;
pub mod time;
pub mod timer;

pub use config::{InterfaceConfig, NodeConfig, RoleConfig};
pub use driver::Callbacks;
pub use energy::{ConstantEnergySource, EnergySource, LinearEnergySource};
pub use event::Event;
pub use node::StrpNode;

// Re-export commonly used engine types.
pub use strp_core::{DataPacket, InterfaceId, InterfaceInfo, Role};

//! strp-core: Sink-Tree Routing Protocol engine.
//!
//! Protocol engine for a three-tier sensor network: plain nodes organize
//! into a tree toward the nearest sink by listening to periodic beacons,
//! while sinks and the collection server learn downward routes from
//! advertisement traffic.
//!
//! The engine performs no I/O. Every externally visible operation takes the
//! current time as `f64` seconds and returns a list of
//! [`Action`](agent::types::Action)s the caller must execute, so the whole
//! protocol runs single-threaded and to completion per event.
//!
//! - [`wire`] - Control-message wire format
//! - [`tables`] - Ascending and descending route tables (re-export)
//! - [`agent`] - The role-aware routing agent
//! - [`constants`] - Protocol constants and defaults

#![cfg_attr(not(feature = "std"), no_std)]
extern crate alloc;

pub mod constants;
pub mod wire;

pub mod agent;

/// Route-table types live inside the agent module; re-exported here because
/// callers frequently need the entry types without the rest of the agent.
pub mod tables {
    pub use crate::agent::tables::{
        AscendingEntry, AscendingTable, DescendingEntry, DescendingTable, SelectionPolicy,
    };
}

pub use agent::types::{
    Action, AgentConfig, DataPacket, InterfaceId, InterfaceInfo, NetHeader, PacketBody, Role,
    RouteError, RouteTo,
};
pub use agent::RoutingAgent;
pub use wire::{ControlMessage, WireError};

//! Core types shared by the routing agent and its callers.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::net::Ipv4Addr;

use crate::constants;

/// Opaque identifier for a network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InterfaceId(pub u64);

/// Pseudo-interface carrying the permanent loopback route.
pub const LOOPBACK_INTERFACE: InterfaceId = InterfaceId(0);

/// Metadata about a network interface, registered via
/// [`RoutingAgent::interface_up`](crate::agent::RoutingAgent::interface_up).
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub id: InterfaceId,
    pub name: String,
    /// The single local address bound to this interface.
    pub addr: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Whether transit traffic may be forwarded out of this interface.
    pub forwarding: bool,
}

impl InterfaceInfo {
    /// Subnet-directed broadcast address for this interface.
    pub fn broadcast(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.addr) | !u32::from(self.netmask))
    }

    /// Beacon destination: all-hosts broadcast on /32 interfaces,
    /// subnet-directed broadcast otherwise.
    pub fn beacon_destination(&self) -> Ipv4Addr {
        if self.netmask == Ipv4Addr::BROADCAST {
            Ipv4Addr::BROADCAST
        } else {
            self.broadcast()
        }
    }
}

/// Node role, fixed for the node's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The external collection point. Never beacons; learns descending
    /// routes from relayed advertisements.
    Server,
    /// Gateway between the sensor mesh and the server.
    Sink {
        /// The dedicated device facing the server.
        uplink: InterfaceId,
        /// First hop toward the server on the uplink.
        gateway: Ipv4Addr,
    },
    /// Ordinary mesh node.
    Plain,
}

impl Role {
    pub fn is_sink(&self) -> bool {
        matches!(self, Role::Sink { .. })
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Role::Server)
    }

    /// The uplink interface, if this node is a sink.
    pub fn uplink(&self) -> Option<InterfaceId> {
        match self {
            Role::Sink { uplink, .. } => Some(*uplink),
            _ => None,
        }
    }
}

/// Agent configuration, consumed at construction and immutable thereafter.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub role: Role,
    pub server_addr: Ipv4Addr,
    pub policy: crate::agent::tables::SelectionPolicy,
    /// Lifetime granted to learned routes, seconds.
    pub active_route_timeout: f64,
    pub hello_interval: f64,
    pub advertise_interval: f64,
    pub max_hello_hops: u16,
    pub max_advertise_hops: u16,
    /// Whether broadcast data packets may be relayed onward.
    pub enable_broadcast: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            role: Role::Plain,
            server_addr: Ipv4Addr::UNSPECIFIED,
            policy: crate::agent::tables::SelectionPolicy::Basic,
            active_route_timeout: constants::ACTIVE_ROUTE_TIMEOUT,
            hello_interval: constants::HELLO_INTERVAL,
            advertise_interval: constants::ADVERTISE_INTERVAL,
            max_hello_hops: constants::MAX_HELLO_HOPS,
            max_advertise_hops: constants::MAX_ADVERTISE_HOPS,
            enable_broadcast: true,
        }
    }
}

/// Network-layer header of a data packet, as seen by the forwarding logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetHeader {
    pub src: Ipv4Addr,
    pub dst: Ipv4Addr,
    pub protocol: u8,
    pub ttl: u8,
}

/// Payload of a data packet. Tunnel encapsulation nests the original packet
/// whole under the outer header instead of flattening it to bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum PacketBody {
    Raw(Vec<u8>),
    Encapsulated(Box<DataPacket>),
}

/// A data-plane packet presented to the agent for a forwarding decision.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPacket {
    pub header: NetHeader,
    pub body: PacketBody,
    /// Destination port peeked from the transport header when the packet
    /// carries UDP; used to recognize protocol-own traffic.
    pub udp_dst_port: Option<u16>,
}

impl DataPacket {
    /// Wrap this packet under a tunnel header addressed `src -> dst`.
    pub fn encapsulate(self, src: Ipv4Addr, dst: Ipv4Addr) -> DataPacket {
        DataPacket {
            header: NetHeader {
                src,
                dst,
                protocol: constants::TUNNEL_PROTOCOL,
                ttl: 64,
            },
            body: PacketBody::Encapsulated(Box::new(self)),
            udp_dst_port: None,
        }
    }

    /// True if this is a tunnel packet with a nested inner packet.
    pub fn is_tunneled(&self) -> bool {
        self.header.protocol == constants::TUNNEL_PROTOCOL
            && matches!(self.body, PacketBody::Encapsulated(_))
    }
}

/// A resolved route for locally originated traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteTo {
    pub interface: InterfaceId,
    pub next_hop: Ipv4Addr,
    /// Local address to use as the packet source.
    pub local_addr: Ipv4Addr,
}

/// Data-plane errors surfaced to local senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteError {
    /// Neither table yields a way toward the destination.
    NoRouteToHost,
    /// The agent has no interfaces registered.
    NoInterfaces,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::NoRouteToHost => write!(f, "no route to host"),
            RouteError::NoInterfaces => write!(f, "no interfaces registered"),
        }
    }
}

/// Actions produced by the agent for the caller to execute.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Transmit an encoded control message on an interface, after a small
    /// random delay chosen by the caller.
    SendControl {
        interface: InterfaceId,
        dest: Ipv4Addr,
        raw: Vec<u8>,
    },
    /// Hand a data packet up to the local stack.
    DeliverLocal {
        interface: InterfaceId,
        packet: DataPacket,
    },
    /// Transmit a data packet toward a next hop.
    ForwardData {
        interface: InterfaceId,
        next_hop: Ipv4Addr,
        packet: DataPacket,
    },
    /// A route table entry was installed or replaced.
    RouteUpdated {
        destination: Ipv4Addr,
        next_hop: Ipv4Addr,
        hop_count: u16,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_id_ordering() {
        assert!(InterfaceId(1) < InterfaceId(2));
        assert_eq!(InterfaceId(3), InterfaceId(3));
    }

    #[test]
    fn test_broadcast_computation() {
        let info = InterfaceInfo {
            id: InterfaceId(1),
            name: "wlan0".into(),
            addr: Ipv4Addr::new(10, 1, 0, 5),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            forwarding: true,
        };
        assert_eq!(info.broadcast(), Ipv4Addr::new(10, 1, 0, 255));
        assert_eq!(info.beacon_destination(), Ipv4Addr::new(10, 1, 0, 255));
    }

    #[test]
    fn test_beacon_destination_host_route() {
        let info = InterfaceInfo {
            id: InterfaceId(1),
            name: "ptp0".into(),
            addr: Ipv4Addr::new(10, 1, 0, 5),
            netmask: Ipv4Addr::BROADCAST,
            forwarding: true,
        };
        assert_eq!(info.beacon_destination(), Ipv4Addr::BROADCAST);
    }

    #[test]
    fn test_encapsulation_nests_packet() {
        let inner = DataPacket {
            header: NetHeader {
                src: Ipv4Addr::new(10, 1, 0, 7),
                dst: Ipv4Addr::new(10, 1, 0, 9),
                protocol: 17,
                ttl: 64,
            },
            body: PacketBody::Raw(alloc::vec![1, 2, 3]),
            udp_dst_port: Some(9000),
        };
        let outer = inner
            .clone()
            .encapsulate(Ipv4Addr::new(10, 2, 0, 1), Ipv4Addr::new(10, 2, 0, 20));

        assert!(outer.is_tunneled());
        assert_eq!(outer.header.protocol, constants::TUNNEL_PROTOCOL);
        match outer.body {
            PacketBody::Encapsulated(boxed) => assert_eq!(*boxed, inner),
            PacketBody::Raw(_) => panic!("expected nested packet"),
        }
    }
}

//! The role-aware routing agent.
//!
//! One agent instance per node exclusively owns both route tables. Inbound
//! control messages, periodic cycle ticks and data-plane lookups all run to
//! completion on the caller's thread and return [`Action`]s; the agent never
//! performs I/O and never blocks.

pub mod decide;
pub mod tables;
pub mod types;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Write as _;
use core::net::Ipv4Addr;

use crate::constants;
use crate::wire::{AdvertiseHeader, ControlMessage, HelloHeader, SrvAdvertiseHeader};

use decide::{advertise_decision, beacon_decision, RouteDecision};
use tables::{AscendingEntry, AscendingTable, DescendingEntry, DescendingTable};
use types::{
    Action, AgentConfig, DataPacket, InterfaceId, InterfaceInfo, PacketBody, Role, RouteError,
    RouteTo, LOOPBACK_INTERFACE,
};

/// Hop counts are stored wide enough for the ceilings but travel as one byte.
fn wire_hops(hops: u16) -> u8 {
    hops.min(u8::MAX as u16) as u8
}

pub struct RoutingAgent {
    config: AgentConfig,
    up: AscendingTable,
    down: DescendingTable,
    interfaces: BTreeMap<InterfaceId, InterfaceInfo>,
    /// Beacon sequence counter, incremented once per emission cycle.
    hello_seq: u32,
    /// Advertise sequence counter, incremented once per cycle.
    advertise_seq: u32,
    /// Cached path-quality summary from the last accepted beacon.
    best_energy: f32,
    best_snr: f32,
}

impl RoutingAgent {
    pub fn new(config: AgentConfig) -> Self {
        let mut agent = RoutingAgent {
            up: AscendingTable::new(config.policy),
            down: DescendingTable::new(),
            interfaces: BTreeMap::new(),
            hello_seq: 0,
            advertise_seq: 0,
            best_energy: 0.0,
            best_snr: 0.0,
            config,
        };
        // Permanent loopback route.
        agent.down.add_or_replace(
            DescendingEntry {
                destination: Ipv4Addr::LOCALHOST,
                next_hop: Ipv4Addr::LOCALHOST,
                hop_count: 1,
                seq: 0,
                expires: f64::INFINITY,
                interface: LOOPBACK_INTERFACE,
                local_addr: Ipv4Addr::LOCALHOST,
            },
            0.0,
        );
        agent
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.config.role
    }

    /// Path energy summary cached from the last accepted beacon.
    pub fn best_energy(&self) -> f32 {
        self.best_energy
    }

    /// Path SNR summary cached from the last accepted beacon.
    pub fn best_snr(&self) -> f32 {
        self.best_snr
    }

    // =========================================================================
    // Interface lifecycle
    // =========================================================================

    /// Register an interface. Installs the permanent subnet-broadcast route
    /// and, on a sink's uplink, seeds the ascending route toward the server.
    pub fn interface_up(&mut self, info: InterfaceInfo, now: f64) {
        self.down.add_or_replace(
            DescendingEntry {
                destination: info.broadcast(),
                next_hop: info.broadcast(),
                hop_count: 1,
                seq: 0,
                expires: f64::INFINITY,
                interface: info.id,
                local_addr: info.addr,
            },
            now,
        );

        if let Role::Sink { uplink, gateway } = self.config.role {
            if info.id == uplink {
                self.up.clear();
                self.up.add_or_replace(
                    AscendingEntry {
                        destination: self.config.server_addr,
                        next_hop: gateway,
                        hop_count: 0,
                        seq: 0,
                        cum_energy: constants::SINK_SEED_ENERGY,
                        min_snr: 0.0,
                        expires: now
                            + self.config.active_route_timeout
                                * constants::SINK_ROUTE_LIFETIME_FACTOR,
                        interface: uplink,
                        local_addr: info.addr,
                    },
                    now,
                );
            }
        }

        self.interfaces.insert(info.id, info);
    }

    /// Deregister an interface and drop every route bound to it. Returns
    /// true when no interfaces remain, in which case both tables have been
    /// cleared and the caller must cancel the periodic cycles.
    pub fn interface_down(&mut self, id: InterfaceId) -> bool {
        self.interfaces.remove(&id);
        self.up.delete_all_from_interface(id);
        self.down.delete_all_from_interface(id);
        if self.interfaces.is_empty() {
            self.up.clear();
            self.down.clear();
            return true;
        }
        false
    }

    /// One address per interface, so an added address re-registers the
    /// interface with its broadcast route.
    pub fn address_added(&mut self, info: InterfaceInfo, now: f64) {
        self.interface_up(info, now);
    }

    /// Removing an interface's only address is equivalent to taking the
    /// interface down.
    pub fn address_removed(&mut self, id: InterfaceId) -> bool {
        self.interface_down(id)
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    fn is_own_address(&self, addr: Ipv4Addr) -> bool {
        self.interfaces.values().any(|i| i.addr == addr)
    }

    // =========================================================================
    // Control plane
    // =========================================================================

    /// Decode and process one inbound control datagram.
    ///
    /// `snr` is the physical-layer quality tag for the received frame, when
    /// the link layer provides one. `own_energy` is the node's remaining
    /// energy. Malformed datagrams are dropped silently.
    pub fn recv_control(
        &mut self,
        raw: &[u8],
        iface: InterfaceId,
        sender: Ipv4Addr,
        receiver: Ipv4Addr,
        snr: Option<f32>,
        own_energy: f32,
        now: f64,
    ) -> Vec<Action> {
        let msg = match ControlMessage::decode(raw) {
            Ok(m) => m,
            Err(_) => return Vec::new(),
        };
        match msg {
            ControlMessage::Hello(h) => {
                self.recv_hello(h, iface, sender, receiver, snr, own_energy, now)
            }
            ControlMessage::Advertise(h) => self.recv_advertise(h, iface, sender, receiver, now),
            ControlMessage::SrvAdvertise(h) => {
                self.recv_srv_advertise(h, iface, receiver, now)
            }
        }
    }

    fn recv_hello(
        &mut self,
        header: HelloHeader,
        iface: InterfaceId,
        sender: Ipv4Addr,
        receiver: Ipv4Addr,
        snr: Option<f32>,
        own_energy: f32,
        now: f64,
    ) -> Vec<Action> {
        // Sinks and the server are tree roots; they never climb.
        if self.config.role.is_sink() || self.config.role.is_server() {
            return Vec::new();
        }

        let hop_count = header.hop_count as u16 + 1;
        if hop_count > self.config.max_hello_hops {
            return Vec::new();
        }

        let effective_snr = match snr {
            Some(tag) => tag.min(header.min_snr),
            None => header.min_snr,
        };

        let best = self.up.lookup_best(now).cloned();
        let min_hops = self.up.min_hop_count(now);
        if beacon_decision(best.as_ref(), min_hops, header.origin, header.seq, hop_count)
            == RouteDecision::Reject
        {
            return Vec::new();
        }

        self.up.add_or_replace(
            AscendingEntry {
                destination: header.origin,
                next_hop: sender,
                hop_count,
                seq: header.seq,
                cum_energy: header.min_energy,
                min_snr: effective_snr,
                expires: now + self.config.active_route_timeout,
                interface: iface,
                local_addr: receiver,
            },
            now,
        );

        // Summary state the next beacon cycle will advertise onward.
        self.best_energy = header.min_energy + own_energy;
        self.best_snr = effective_snr;

        alloc::vec![Action::RouteUpdated {
            destination: header.origin,
            next_hop: sender,
            hop_count,
        }]
    }

    fn recv_advertise(
        &mut self,
        header: AdvertiseHeader,
        iface: InterfaceId,
        sender: Ipv4Addr,
        receiver: Ipv4Addr,
        now: f64,
    ) -> Vec<Action> {
        if self.config.role.is_server() {
            return Vec::new();
        }

        let hop_count = header.hop_count as u16 + 1;
        if hop_count > self.config.max_advertise_hops {
            return Vec::new();
        }

        if advertise_decision(self.down.peek(header.origin), header.seq, hop_count, now)
            == RouteDecision::Reject
        {
            return Vec::new();
        }

        self.down.add_or_replace(
            DescendingEntry {
                destination: header.origin,
                next_hop: sender,
                hop_count,
                seq: header.seq,
                expires: now + self.config.active_route_timeout,
                interface: iface,
                local_addr: receiver,
            },
            now,
        );

        let mut actions = alloc::vec![Action::RouteUpdated {
            destination: header.origin,
            next_hop: sender,
            hop_count,
        }];

        if self.config.role.is_sink() {
            // Register the origin at the server instead of relaying.
            if let Some(best) = self.up.lookup_best(now).cloned() {
                let srv = SrvAdvertiseHeader {
                    hop_count: wire_hops(hop_count),
                    reserved: 0,
                    origin: header.origin,
                    sink: best.local_addr,
                    seq: header.seq,
                };
                actions.push(Action::SendControl {
                    interface: best.interface,
                    dest: self.config.server_addr,
                    raw: ControlMessage::SrvAdvertise(srv).encode_to_vec(),
                });
            }
        } else {
            // Relay hop-incremented toward the sink on every interface.
            if let Some(best) = self.up.lookup_best(now).cloned() {
                let relay = AdvertiseHeader {
                    hop_count: wire_hops(hop_count),
                    reserved: 0,
                    origin: header.origin,
                    seq: header.seq,
                };
                let raw = ControlMessage::Advertise(relay).encode_to_vec();
                for info in self.interfaces.values() {
                    actions.push(Action::SendControl {
                        interface: info.id,
                        dest: best.next_hop,
                        raw: raw.clone(),
                    });
                }
            }
        }

        actions
    }

    fn recv_srv_advertise(
        &mut self,
        header: SrvAdvertiseHeader,
        iface: InterfaceId,
        receiver: Ipv4Addr,
        now: f64,
    ) -> Vec<Action> {
        if !self.config.role.is_server() {
            return Vec::new();
        }

        // The sink-to-server link is one hop by construction; no ceiling.
        let hop_count = header.hop_count as u16 + 1;

        if advertise_decision(self.down.peek(header.origin), header.seq, hop_count, now)
            == RouteDecision::Reject
        {
            return Vec::new();
        }

        self.down.delete(header.origin);
        self.down.add_or_replace(
            DescendingEntry {
                destination: header.origin,
                // The advertised sink, not the datagram sender, carries the
                // traffic back down.
                next_hop: header.sink,
                hop_count,
                seq: header.seq,
                expires: now + self.config.active_route_timeout,
                interface: iface,
                local_addr: receiver,
            },
            now,
        );

        alloc::vec![Action::RouteUpdated {
            destination: header.origin,
            next_hop: header.sink,
            hop_count,
        }]
    }

    // =========================================================================
    // Periodic cycles
    // =========================================================================

    /// Build this cycle's beacons. The caller applies per-transmission
    /// jitter before handing them to the transport.
    pub fn beacon_tick(&mut self, own_energy: f32, now: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.config.role {
            Role::Server => {}
            Role::Sink { uplink, .. } => {
                let hello = HelloHeader {
                    hop_count: 0,
                    reserved: 0,
                    min_energy: own_energy,
                    min_snr: constants::SNR_SENTINEL,
                    origin: Ipv4Addr::UNSPECIFIED,
                    seq: self.hello_seq,
                };
                for info in self.interfaces.values().filter(|i| i.id != uplink) {
                    let hello = HelloHeader {
                        origin: info.addr,
                        ..hello
                    };
                    actions.push(Action::SendControl {
                        interface: info.id,
                        dest: info.beacon_destination(),
                        raw: ControlMessage::Hello(hello).encode_to_vec(),
                    });
                }
                // One counter tick per cycle, not per interface.
                self.hello_seq = self.hello_seq.wrapping_add(1);
            }
            Role::Plain => {
                let best = match self.up.lookup_best(now).cloned() {
                    Some(b) => b,
                    None => return actions,
                };
                let hello = HelloHeader {
                    hop_count: wire_hops(best.hop_count),
                    reserved: 0,
                    min_energy: best.cum_energy.min(own_energy),
                    min_snr: best.min_snr,
                    origin: best.destination,
                    seq: best.seq,
                };
                for info in self.interfaces.values() {
                    actions.push(Action::SendControl {
                        interface: info.id,
                        dest: info.beacon_destination(),
                        raw: ControlMessage::Hello(hello).encode_to_vec(),
                    });
                }
            }
        }
        actions
    }

    /// Build this cycle's advertisements: plain nodes announce themselves
    /// toward the sink; a sink refreshes its registration at the server.
    pub fn advertise_tick(&mut self, now: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        match self.config.role {
            Role::Server => return actions,
            Role::Sink { uplink, .. } => {
                let uplink_addr = match self.interfaces.get(&uplink) {
                    Some(info) => info.addr,
                    None => return actions,
                };
                // Announce the mesh-facing address as the registered origin.
                let origin = self
                    .interfaces
                    .values()
                    .find(|i| i.id != uplink)
                    .map(|i| i.addr);
                if let Some(origin) = origin {
                    let srv = SrvAdvertiseHeader {
                        hop_count: 0,
                        reserved: 0,
                        origin,
                        sink: uplink_addr,
                        seq: self.advertise_seq,
                    };
                    actions.push(Action::SendControl {
                        interface: uplink,
                        dest: self.config.server_addr,
                        raw: ControlMessage::SrvAdvertise(srv).encode_to_vec(),
                    });
                }
            }
            Role::Plain => {
                if let Some(best) = self.up.lookup_best(now).cloned() {
                    for info in self.interfaces.values() {
                        let adv = AdvertiseHeader {
                            hop_count: 0,
                            reserved: 0,
                            origin: info.addr,
                            seq: self.advertise_seq,
                        };
                        actions.push(Action::SendControl {
                            interface: info.id,
                            dest: best.next_hop,
                            raw: ControlMessage::Advertise(adv).encode_to_vec(),
                        });
                    }
                }
            }
        }
        self.advertise_seq = self.advertise_seq.wrapping_add(1);
        actions
    }

    // =========================================================================
    // Data plane
    // =========================================================================

    /// Route a locally originated packet: a known descending route wins,
    /// otherwise anything that is not the server climbs the tree.
    pub fn route_output(&mut self, dst: Ipv4Addr, now: f64) -> Result<RouteTo, RouteError> {
        if self.interfaces.is_empty() {
            return Err(RouteError::NoInterfaces);
        }
        if let Some(e) = self.down.lookup(dst, now) {
            return Ok(RouteTo {
                interface: e.interface,
                next_hop: e.next_hop,
                local_addr: e.local_addr,
            });
        }
        if !self.config.role.is_server() {
            if let Some(b) = self.up.lookup_best(now) {
                return Ok(RouteTo {
                    interface: b.interface,
                    next_hop: b.next_hop,
                    local_addr: b.local_addr,
                });
            }
        }
        Err(RouteError::NoRouteToHost)
    }

    /// Process an inbound data packet: local delivery, broadcast handling,
    /// or transit forwarding. An empty result means the packet was dropped
    /// or absorbed.
    pub fn route_input(
        &mut self,
        packet: DataPacket,
        ingress: InterfaceId,
        now: f64,
    ) -> Vec<Action> {
        if self.interfaces.is_empty() {
            return Vec::new();
        }

        let from_uplink = self.config.role.uplink() == Some(ingress);

        // Tunnel decapsulation happens at the server, and at a sink for
        // traffic arriving over its uplink.
        let packet = if (self.config.role.is_server() || from_uplink) && packet.is_tunneled() {
            match packet.body {
                PacketBody::Encapsulated(inner) => *inner,
                PacketBody::Raw(_) => packet,
            }
        } else {
            packet
        };
        let from_server = self.config.role.is_sink() && from_uplink;

        // A packet claiming one of our own addresses as source is a stale
        // duplicate of our own traffic.
        if self.is_own_address(packet.header.src) {
            return Vec::new();
        }

        if packet.header.dst.is_multicast() {
            return Vec::new();
        }

        let dst = packet.header.dst;

        // Broadcast: deliver locally, then optionally relay.
        if let Some(info) = self.interfaces.get(&ingress) {
            if dst == info.broadcast() || dst == Ipv4Addr::BROADCAST {
                let mut actions = alloc::vec![Action::DeliverLocal {
                    interface: ingress,
                    packet: packet.clone(),
                }];
                if !self.config.enable_broadcast {
                    return actions;
                }
                if packet.header.protocol == constants::UDP_PROTOCOL
                    && packet.udp_dst_port == Some(constants::STRP_PORT)
                {
                    // Own control traffic is fully consumed, never relayed.
                    return actions;
                }
                if packet.header.ttl > 1 {
                    if let Some(e) = self.down.lookup(dst, now) {
                        let (interface, next_hop) = (e.interface, e.next_hop);
                        actions.push(Action::ForwardData {
                            interface,
                            next_hop,
                            packet,
                        });
                    }
                }
                return actions;
            }
        }

        // Unicast local delivery.
        if self.is_own_address(dst) {
            return alloc::vec![Action::DeliverLocal {
                interface: ingress,
                packet,
            }];
        }

        // Transit: the ingress interface must be forwarding-eligible.
        if let Some(info) = self.interfaces.get(&ingress) {
            if !info.forwarding {
                return Vec::new();
            }
        }

        self.forward(packet, from_server, now)
    }

    fn forward(&mut self, packet: DataPacket, from_server: bool, now: f64) -> Vec<Action> {
        self.up.purge(now);
        self.down.purge(now);
        let dst = packet.header.dst;

        match self.config.role {
            Role::Plain => {
                if let Some(e) = self.down.lookup(dst, now) {
                    let (interface, next_hop) = (e.interface, e.next_hop);
                    return alloc::vec![Action::ForwardData {
                        interface,
                        next_hop,
                        packet,
                    }];
                }
                if let Some(b) = self.up.lookup_best(now) {
                    let (interface, next_hop) = (b.interface, b.next_hop);
                    return alloc::vec![Action::ForwardData {
                        interface,
                        next_hop,
                        packet,
                    }];
                }
                Vec::new()
            }
            Role::Sink { .. } => {
                if let Some(e) = self.down.lookup(dst, now) {
                    let (interface, next_hop) = (e.interface, e.next_hop);
                    return alloc::vec![Action::ForwardData {
                        interface,
                        next_hop,
                        packet,
                    }];
                }
                // Unknown destination climbs to the server, unless the
                // packet itself came down from the server.
                if from_server {
                    return Vec::new();
                }
                if let Some(b) = self.up.lookup_best(now).cloned() {
                    let tunneled = packet.encapsulate(b.local_addr, self.config.server_addr);
                    return alloc::vec![Action::ForwardData {
                        interface: b.interface,
                        next_hop: b.next_hop,
                        packet: tunneled,
                    }];
                }
                Vec::new()
            }
            Role::Server => {
                if let Some(e) = self.down.lookup(dst, now) {
                    let (interface, next_hop) = (e.interface, e.next_hop);
                    // Re-wrap for the trip down: outer header names the true
                    // origin and destination under the tunnel marker, and the
                    // registered sink is the next hop.
                    let origin = packet.header.src;
                    let tunneled = packet.encapsulate(origin, dst);
                    return alloc::vec![Action::ForwardData {
                        interface,
                        next_hop,
                        packet: tunneled,
                    }];
                }
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub fn ascending_is_empty(&mut self, now: f64) -> bool {
        self.up.is_empty(now)
    }

    pub fn best_ascending(&mut self, now: f64) -> Option<AscendingEntry> {
        self.up.lookup_best(now).cloned()
    }

    pub fn min_ascending_hops(&mut self, now: f64) -> Option<u16> {
        self.up.min_hop_count(now)
    }

    pub fn ascending_count(&self) -> usize {
        self.up.len()
    }

    pub fn descending_route(&mut self, dst: Ipv4Addr, now: f64) -> Option<DescendingEntry> {
        self.down.lookup(dst, now).cloned()
    }

    pub fn descending_count(&self) -> usize {
        self.down.len()
    }

    /// Human-readable dump of both tables.
    pub fn format_tables(&self, now: f64) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Ascending routes:\nDestination\tNextHop\tInterface\tExpire\tHops\tSeq\tCumEnergy\tMinSnr"
        );
        out.push_str(&self.up.dump(now));
        let _ = writeln!(
            out,
            "Descending routes:\nDestination\tNextHop\tInterface\tExpire\tHops"
        );
        out.push_str(&self.down.dump(now));
        out
    }
}

//! Ascending and descending route tables.
//!
//! The ascending table holds candidate next hops toward the sink tree root,
//! keyed by next hop so that several candidate parents can coexist. The
//! descending table holds at most one route per previously heard origin,
//! keyed by destination. Both tables purge expired entries before every
//! operation; expiry is lazy, there is no timer per entry.

use alloc::collections::BTreeMap;
use alloc::string::String;
use core::fmt::Write as _;
use core::net::Ipv4Addr;

use super::types::InterfaceId;

/// Strategy for choosing the best ascending route among candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// Single-entry table: every insert wipes the previous candidates, so
    /// the most recently accepted beacon wins unconditionally.
    Basic = 0,
    /// Keep one candidate per neighbor; prefer the greatest remaining
    /// lifetime.
    MultiParent = 1,
    /// Prefer the greatest cumulative path energy.
    EnergyAware = 2,
    /// Prefer the greatest minimum path SNR.
    SnrAware = 3,
}

impl SelectionPolicy {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SelectionPolicy::Basic),
            1 => Some(SelectionPolicy::MultiParent),
            2 => Some(SelectionPolicy::EnergyAware),
            3 => Some(SelectionPolicy::SnrAware),
            _ => None,
        }
    }
}

/// Candidate next hop toward a sink or the server.
#[derive(Debug, Clone, PartialEq)]
pub struct AscendingEntry {
    /// Address this route ultimately leads to (the advertised tree root).
    pub destination: Ipv4Addr,
    /// Neighbor to transmit through. This is the table key.
    pub next_hop: Ipv4Addr,
    pub hop_count: u16,
    pub seq: u32,
    pub cum_energy: f32,
    pub min_snr: f32,
    /// Absolute expiry instant, seconds. `f64::INFINITY` never expires.
    pub expires: f64,
    pub interface: InterfaceId,
    /// Local address on the egress interface.
    pub local_addr: Ipv4Addr,
}

impl AscendingEntry {
    pub fn remaining_lifetime(&self, now: f64) -> f64 {
        self.expires - now
    }
}

/// Route to a previously heard origin.
#[derive(Debug, Clone, PartialEq)]
pub struct DescendingEntry {
    /// Table key; unique.
    pub destination: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    pub hop_count: u16,
    pub seq: u32,
    /// Absolute expiry instant, seconds. `f64::INFINITY` never expires.
    pub expires: f64,
    pub interface: InterfaceId,
    pub local_addr: Ipv4Addr,
}

impl DescendingEntry {
    pub fn remaining_lifetime(&self, now: f64) -> f64 {
        self.expires - now
    }

    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires
    }
}

/// The candidate-parent set, keyed by next hop.
#[derive(Debug)]
pub struct AscendingTable {
    entries: BTreeMap<Ipv4Addr, AscendingEntry>,
    policy: SelectionPolicy,
}

impl AscendingTable {
    pub fn new(policy: SelectionPolicy) -> Self {
        AscendingTable {
            entries: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }

    /// Drop entries whose lifetime has elapsed. Called before every other
    /// operation so readers always see a consistent snapshot.
    pub fn purge(&mut self, now: f64) {
        self.entries.retain(|_, e| now < e.expires);
    }

    pub fn is_empty(&mut self, now: f64) -> bool {
        self.purge(now);
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn lookup(&mut self, next_hop: Ipv4Addr, now: f64) -> Option<&AscendingEntry> {
        self.purge(now);
        self.entries.get(&next_hop)
    }

    /// Smallest hop count over the current candidates.
    pub fn min_hop_count(&mut self, now: f64) -> Option<u16> {
        self.purge(now);
        self.entries.values().map(|e| e.hop_count).min()
    }

    /// Insert a candidate. Under [`SelectionPolicy::Basic`] the table is
    /// collapsed to this single entry; under the multi-parent policies any
    /// previous entry through the same neighbor is replaced.
    pub fn add_or_replace(&mut self, entry: AscendingEntry, now: f64) {
        self.purge(now);
        if self.policy == SelectionPolicy::Basic {
            self.entries.clear();
        } else {
            self.entries.remove(&entry.next_hop);
        }
        self.entries.insert(entry.next_hop, entry);
    }

    /// Best route under the configured policy. Comparisons are strict, and
    /// the table iterates in next-hop address order, so among equals the
    /// lowest next-hop address wins.
    pub fn lookup_best(&mut self, now: f64) -> Option<&AscendingEntry> {
        self.purge(now);
        match self.policy {
            SelectionPolicy::Basic => self.entries.values().next(),
            SelectionPolicy::MultiParent => {
                pick_max(self.entries.values(), |e| e.expires)
            }
            SelectionPolicy::EnergyAware => {
                pick_max(self.entries.values(), |e| e.cum_energy as f64)
            }
            SelectionPolicy::SnrAware => {
                pick_max(self.entries.values(), |e| e.min_snr as f64)
            }
        }
    }

    pub fn delete_all_from_interface(&mut self, iface: InterfaceId) {
        self.entries.retain(|_, e| e.interface != iface);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &AscendingEntry> {
        self.entries.values()
    }

    /// Tab-separated dump rows: destination, next hop, local address,
    /// remaining lifetime, hops, seq, cumulative energy, min SNR.
    pub fn dump(&self, now: f64) -> String {
        let mut out = String::new();
        for e in self.entries.values() {
            if now >= e.expires {
                continue;
            }
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{:.2}\t{}\t{}\t{:.1}\t{:.1}",
                e.destination,
                e.next_hop,
                e.local_addr,
                e.remaining_lifetime(now),
                e.hop_count,
                e.seq,
                e.cum_energy,
                e.min_snr,
            );
        }
        out
    }
}

/// Strictly-greater maximum; ties keep the earliest (lowest-keyed) entry.
fn pick_max<'a, I, F>(entries: I, key: F) -> Option<&'a AscendingEntry>
where
    I: Iterator<Item = &'a AscendingEntry>,
    F: Fn(&AscendingEntry) -> f64,
{
    let mut best: Option<&AscendingEntry> = None;
    for e in entries {
        match best {
            None => best = Some(e),
            Some(b) if key(e) > key(b) => best = Some(e),
            Some(_) => {}
        }
    }
    best
}

/// Per-destination single-route table built from observed advertisements.
#[derive(Debug, Default)]
pub struct DescendingTable {
    entries: BTreeMap<Ipv4Addr, DescendingEntry>,
}

impl DescendingTable {
    pub fn new() -> Self {
        DescendingTable {
            entries: BTreeMap::new(),
        }
    }

    pub fn purge(&mut self, now: f64) {
        self.entries.retain(|_, e| now < e.expires);
    }

    pub fn is_empty(&mut self, now: f64) -> bool {
        self.purge(now);
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn lookup(&mut self, destination: Ipv4Addr, now: f64) -> Option<&DescendingEntry> {
        self.purge(now);
        self.entries.get(&destination)
    }

    /// Look up without purging, so callers can inspect an expired entry
    /// (the advertise acceptance rule treats expiry as grounds to replace).
    pub fn peek(&self, destination: Ipv4Addr) -> Option<&DescendingEntry> {
        self.entries.get(&destination)
    }

    /// Insert a route, replacing any prior entry for the same destination.
    pub fn add_or_replace(&mut self, entry: DescendingEntry, now: f64) {
        self.purge(now);
        self.entries.remove(&entry.destination);
        self.entries.insert(entry.destination, entry);
    }

    pub fn delete(&mut self, destination: Ipv4Addr) -> bool {
        self.entries.remove(&destination).is_some()
    }

    pub fn delete_all_from_interface(&mut self, iface: InterfaceId) {
        self.entries.retain(|_, e| e.interface != iface);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &DescendingEntry> {
        self.entries.values()
    }

    /// Tab-separated dump rows: destination, next hop, local address,
    /// remaining lifetime, hops.
    pub fn dump(&self, now: f64) -> String {
        let mut out = String::new();
        for e in self.entries.values() {
            if now >= e.expires {
                continue;
            }
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{:.2}\t{}",
                e.destination,
                e.next_hop,
                e.local_addr,
                e.remaining_lifetime(now),
                e.hop_count,
            );
        }
        out
    }
}

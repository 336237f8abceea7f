//! Accept/reject decision rules for inbound control messages.
//!
//! Kept as pure functions over table snapshots so the rules can be tested
//! case by case without an agent.

use core::net::Ipv4Addr;

use super::tables::{AscendingEntry, DescendingEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    Add,
    Reject,
}

/// Whether a beacon should update the ascending table.
///
/// `best` and `min_hops` reflect the table after purging. Acceptance:
/// - empty table: always add;
/// - if the current best route advertises the same root as the incoming
///   beacon and its sequence number is already >= the incoming one, reject
///   (freshness guard, scoped to coinciding destinations);
/// - otherwise add when the table's minimum hop count is >= the incoming
///   (already incremented) hop count.
pub fn beacon_decision(
    best: Option<&AscendingEntry>,
    min_hops: Option<u16>,
    origin: Ipv4Addr,
    seq: u32,
    hop_count: u16,
) -> RouteDecision {
    let best = match best {
        None => return RouteDecision::Add,
        Some(b) => b,
    };

    if best.destination == origin && best.seq >= seq {
        return RouteDecision::Reject;
    }

    match min_hops {
        Some(min) if min >= hop_count => RouteDecision::Add,
        Some(_) => RouteDecision::Reject,
        // min_hops is None only for an empty table, handled above.
        None => RouteDecision::Add,
    }
}

/// Whether an advertisement should update the descending table.
///
/// `existing` is the un-purged entry for the advertised origin, so an
/// expired entry is still visible here. Acceptance is a flat OR:
/// no entry, strictly fresher sequence, strictly better hop count, or the
/// stored entry has expired. Anything else is dropped without relay.
pub fn advertise_decision(
    existing: Option<&DescendingEntry>,
    seq: u32,
    hop_count: u16,
    now: f64,
) -> RouteDecision {
    let existing = match existing {
        None => return RouteDecision::Add,
        Some(e) => e,
    };

    if existing.seq < seq {
        return RouteDecision::Add;
    }
    if hop_count < existing.hop_count {
        return RouteDecision::Add;
    }
    if existing.is_expired(now) {
        return RouteDecision::Add;
    }
    RouteDecision::Reject
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::types::InterfaceId;

    fn addr(d: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 1, 0, d)
    }

    fn best_entry(destination: u8, seq: u32) -> AscendingEntry {
        AscendingEntry {
            destination: addr(destination),
            next_hop: addr(2),
            hop_count: 3,
            seq,
            cum_energy: 10.0,
            min_snr: 5.0,
            expires: 100.0,
            interface: InterfaceId(1),
            local_addr: addr(99),
        }
    }

    fn down(dest: u8, seq: u32, hops: u16, expires: f64) -> DescendingEntry {
        DescendingEntry {
            destination: addr(dest),
            next_hop: addr(1),
            hop_count: hops,
            seq,
            expires,
            interface: InterfaceId(1),
            local_addr: addr(99),
        }
    }

    // --- beacon_decision ---

    #[test]
    fn test_beacon_empty_table_accepts() {
        assert_eq!(
            beacon_decision(None, None, addr(20), 1, 7),
            RouteDecision::Add
        );
    }

    #[test]
    fn test_beacon_same_origin_stale_seq_rejected() {
        let best = best_entry(20, 10);
        assert_eq!(
            beacon_decision(Some(&best), Some(3), addr(20), 9, 2),
            RouteDecision::Reject
        );
        // Equal sequence is also stale.
        assert_eq!(
            beacon_decision(Some(&best), Some(3), addr(20), 10, 2),
            RouteDecision::Reject
        );
    }

    #[test]
    fn test_beacon_same_origin_fresher_seq_checked_against_hops() {
        let best = best_entry(20, 10);
        assert_eq!(
            beacon_decision(Some(&best), Some(3), addr(20), 11, 3),
            RouteDecision::Add
        );
        assert_eq!(
            beacon_decision(Some(&best), Some(3), addr(20), 11, 4),
            RouteDecision::Reject
        );
    }

    #[test]
    fn test_beacon_different_origin_skips_freshness_guard() {
        // Guard only fires when the destinations coincide; a stale sequence
        // from a different root is still judged on hop count alone.
        let best = best_entry(20, 10);
        assert_eq!(
            beacon_decision(Some(&best), Some(3), addr(30), 1, 3),
            RouteDecision::Add
        );
    }

    #[test]
    fn test_beacon_worse_hop_count_rejected() {
        let best = best_entry(20, 10);
        assert_eq!(
            beacon_decision(Some(&best), Some(2), addr(30), 1, 3),
            RouteDecision::Reject
        );
    }

    #[test]
    fn test_beacon_equal_hop_count_accepted() {
        let best = best_entry(20, 10);
        assert_eq!(
            beacon_decision(Some(&best), Some(3), addr(30), 1, 3),
            RouteDecision::Add
        );
    }

    // --- advertise_decision ---

    #[test]
    fn test_advertise_no_entry_accepts() {
        assert_eq!(
            advertise_decision(None, 1, 5, 0.0),
            RouteDecision::Add
        );
    }

    #[test]
    fn test_advertise_fresher_seq_accepts() {
        let e = down(7, 4, 2, 100.0);
        assert_eq!(advertise_decision(Some(&e), 5, 9, 0.0), RouteDecision::Add);
    }

    #[test]
    fn test_advertise_equal_seq_same_hops_rejected() {
        let e = down(7, 4, 2, 100.0);
        assert_eq!(
            advertise_decision(Some(&e), 4, 2, 0.0),
            RouteDecision::Reject
        );
    }

    #[test]
    fn test_advertise_better_hops_accepts_despite_stale_seq() {
        let e = down(7, 4, 5, 100.0);
        assert_eq!(advertise_decision(Some(&e), 2, 3, 0.0), RouteDecision::Add);
    }

    #[test]
    fn test_advertise_equal_hops_not_better() {
        let e = down(7, 4, 3, 100.0);
        assert_eq!(
            advertise_decision(Some(&e), 3, 3, 0.0),
            RouteDecision::Reject
        );
    }

    #[test]
    fn test_advertise_expired_entry_accepts() {
        let e = down(7, 4, 2, 50.0);
        assert_eq!(
            advertise_decision(Some(&e), 1, 9, 50.0),
            RouteDecision::Add
        );
        assert_eq!(
            advertise_decision(Some(&e), 1, 9, 60.0),
            RouteDecision::Add
        );
    }

    #[test]
    fn test_advertise_live_entry_stale_everything_rejected() {
        let e = down(7, 4, 2, 100.0);
        assert_eq!(
            advertise_decision(Some(&e), 3, 8, 10.0),
            RouteDecision::Reject
        );
    }
}

//! Protocol constants and defaults.

/// UDP port reserved for STRP control traffic.
pub const STRP_PORT: u16 = 651;

/// Default period during which a learned route is considered valid, seconds.
pub const ACTIVE_ROUTE_TIMEOUT: f64 = 6.0;

/// Default beacon (hello) interval, seconds.
pub const HELLO_INTERVAL: f64 = 5.0;

/// Default advertise interval, seconds.
pub const ADVERTISE_INTERVAL: f64 = 4.0;

/// Default hop ceiling for beacons. Hop counts travel as a single byte, so
/// the default is effectively unbounded.
pub const MAX_HELLO_HOPS: u16 = 1000;

/// Default hop ceiling for advertisements.
pub const MAX_ADVERTISE_HOPS: u16 = 1000;

/// Minimum-SNR sentinel carried in sink-originated beacons. A sink is the
/// tree root, so its advertised path quality is "infinite".
pub const SNR_SENTINEL: f32 = 9999.0;

/// Cumulative-energy value seeded into a sink's ascending route toward the
/// server. The wired uplink is not energy constrained.
pub const SINK_SEED_ENERGY: f32 = 99_999.0;

/// Lifetime multiplier for the sink's seeded ascending route. The seed must
/// outlive any plausible run; it is only torn down with its interface.
pub const SINK_ROUTE_LIFETIME_FACTOR: f64 = 1000.0;

/// IP protocol number used for sink/server tunnel encapsulation (IP-in-IP).
pub const TUNNEL_PROTOCOL: u8 = 4;

/// IP protocol number for UDP, used to recognize own control traffic when
/// deciding whether a broadcast may be relayed further.
pub const UDP_PROTOCOL: u8 = 17;

/// Upper bound of the uniform per-transmission jitter, milliseconds.
pub const JITTER_MAX_MS: u64 = 10;

/// Serialized size of the type discriminant header.
pub const TYPE_HEADER_SIZE: usize = 1;

/// Serialized size of a hello (beacon) body.
pub const HELLO_HEADER_SIZE: usize = 19;

/// Serialized size of an advertise body.
pub const ADVERTISE_HEADER_SIZE: usize = 11;

/// Serialized size of a server-advertise body.
pub const SRV_ADVERTISE_HEADER_SIZE: usize = 15;

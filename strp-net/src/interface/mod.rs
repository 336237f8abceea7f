//! Network interfaces feeding the event queue.

use std::io;
use std::net::Ipv4Addr;

pub mod udp;

/// Handle for transmitting raw datagrams out of an interface.
pub trait Writer {
    fn send_to(&mut self, dest: Ipv4Addr, data: &[u8]) -> io::Result<()>;
}

/// Per-interface traffic counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct InterfaceStats {
    pub rxb: u64,
    pub txb: u64,
    pub rx_packets: u64,
    pub tx_packets: u64,
}

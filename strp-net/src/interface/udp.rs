//! UDP interface bound to the protocol port.
//!
//! Connectionless; each datagram is one control message. A reader thread
//! feeds inbound datagrams into the node's event queue; the returned writer
//! is used by the driver for (jittered) control transmissions.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::thread;

use strp_core::InterfaceId;

use crate::event::{Event, EventSender};
use crate::interface::Writer;

/// Configuration for a UDP interface.
#[derive(Debug, Clone)]
pub struct UdpConfig {
    pub name: String,
    pub interface_id: InterfaceId,
    /// Local address to bind.
    pub bind_addr: Ipv4Addr,
    /// Protocol port; both the bind port and the destination port for sends.
    pub port: u16,
}

struct UdpWriter {
    socket: UdpSocket,
    port: u16,
}

impl Writer for UdpWriter {
    fn send_to(&mut self, dest: Ipv4Addr, data: &[u8]) -> io::Result<()> {
        self.socket.send_to(data, (dest, self.port))?;
        Ok(())
    }
}

/// Bind the socket, enable broadcast, and spawn the reader thread.
/// Returns the writer handle for outbound control traffic.
pub fn start(config: UdpConfig, tx: EventSender) -> io::Result<Box<dyn Writer + Send>> {
    let socket = UdpSocket::bind((config.bind_addr, config.port))?;
    socket.set_broadcast(true)?;

    log::info!(
        "[{}] UDP listening on {}:{}",
        config.name,
        config.bind_addr,
        config.port
    );

    let reader = socket.try_clone()?;
    let id = config.interface_id;
    let name = config.name.clone();
    thread::Builder::new()
        .name(format!("udp-reader-{}", id.0))
        .spawn(move || {
            reader_loop(reader, id, name, tx);
        })?;

    Ok(Box::new(UdpWriter {
        socket,
        port: config.port,
    }))
}

fn reader_loop(socket: UdpSocket, id: InterfaceId, name: String, tx: EventSender) {
    let mut buf = [0u8; 2048];

    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, src)) => {
                let src = match src {
                    SocketAddr::V4(v4) => *v4.ip(),
                    SocketAddr::V6(_) => continue,
                };
                if tx
                    .send(Event::Datagram {
                        interface: id,
                        src,
                        data: buf[..n].to_vec(),
                        snr: None,
                    })
                    .is_err()
                {
                    // Driver shut down.
                    return;
                }
            }
            Err(e) => {
                log::warn!("[{}] recv error: {}", name, e);
                let _ = tx.send(Event::InterfaceDown(id));
                return;
            }
        }
    }
}

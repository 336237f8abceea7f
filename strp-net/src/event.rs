//! Event types for the driver loop.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::mpsc;

use strp_core::{InterfaceId, InterfaceInfo};

use crate::interface::Writer;

/// Requests answerable by the driver without stopping the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRequest {
    /// Human-readable dump of both route tables.
    RouteTables,
    /// Route counts and cached link-quality summary.
    Summary,
}

/// Responses to [`QueryRequest`]s.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResponse {
    RouteTables(String),
    Summary {
        ascending: usize,
        descending: usize,
        best_energy: f32,
        best_snr: f32,
    },
}

/// Events sent to the driver thread.
pub enum Event {
    /// A datagram arrived on the protocol port of an interface.
    Datagram {
        interface: InterfaceId,
        src: Ipv4Addr,
        data: Vec<u8>,
        /// Physical-layer quality tag, when the link provides one.
        snr: Option<f32>,
    },
    /// Beacon cycle fired.
    BeaconTick,
    /// Advertise cycle fired.
    AdvertiseTick,
    /// A jittered control transmission is due.
    Transmit {
        interface: InterfaceId,
        dest: Ipv4Addr,
        raw: Vec<u8>,
    },
    /// An interface came up, carrying its metadata and send handle.
    InterfaceUp {
        info: InterfaceInfo,
        writer: Box<dyn Writer + Send>,
    },
    /// An interface went down (administratively or on socket error).
    InterfaceDown(InterfaceId),
    /// The energy source reported depletion.
    EnergyDepleted,
    /// Answer a diagnostic query through the provided channel.
    Query(QueryRequest, mpsc::Sender<QueryResponse>),
    /// Shut down the driver loop.
    Shutdown,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Datagram {
                interface,
                src,
                data,
                snr,
            } => f
                .debug_struct("Datagram")
                .field("interface", interface)
                .field("src", src)
                .field("data_len", &data.len())
                .field("snr", snr)
                .finish(),
            Event::BeaconTick => write!(f, "BeaconTick"),
            Event::AdvertiseTick => write!(f, "AdvertiseTick"),
            Event::Transmit {
                interface,
                dest,
                raw,
            } => f
                .debug_struct("Transmit")
                .field("interface", interface)
                .field("dest", dest)
                .field("raw_len", &raw.len())
                .finish(),
            Event::InterfaceUp { info, .. } => {
                f.debug_tuple("InterfaceUp").field(&info.id).finish()
            }
            Event::InterfaceDown(id) => f.debug_tuple("InterfaceDown").field(id).finish(),
            Event::EnergyDepleted => write!(f, "EnergyDepleted"),
            Event::Query(req, _) => f.debug_tuple("Query").field(req).finish(),
            Event::Shutdown => write!(f, "Shutdown"),
        }
    }
}

pub type EventSender = mpsc::Sender<Event>;
pub type EventReceiver = mpsc::Receiver<Event>;

pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::channel()
}

//! Driver loop: receives events, drives the routing agent, executes actions.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use rand::Rng;

use strp_core::constants;
use strp_core::{Action, DataPacket, InterfaceId, InterfaceInfo, RoutingAgent};

use crate::energy::{DepletionObserver, EnergySource};
use crate::event::{Event, EventReceiver, QueryRequest, QueryResponse};
use crate::interface::{InterfaceStats, Writer};
use crate::time;
use crate::timer::Scheduler;

/// Callbacks for events the driver produces.
pub trait Callbacks: Send {
    fn on_route_updated(&mut self, _destination: Ipv4Addr, _next_hop: Ipv4Addr, _hop_count: u16) {}

    fn on_local_delivery(&mut self, _packet: DataPacket) {}

    fn on_forward_data(&mut self, _interface: InterfaceId, _next_hop: Ipv4Addr, _packet: DataPacket) {
    }

    /// Called when an interface comes online.
    fn on_interface_up(&mut self, _id: InterfaceId) {}

    /// Called when an interface goes offline.
    fn on_interface_down(&mut self, _id: InterfaceId) {}

    /// Called once when the energy source reaches depletion.
    fn on_energy_depleted(&mut self) {}
}

pub(crate) struct InterfaceEntry {
    pub info: InterfaceInfo,
    pub writer: Box<dyn Writer + Send>,
    pub stats: InterfaceStats,
}

/// The driver loop. Owns the agent and all interface writers.
pub struct Driver {
    agent: RoutingAgent,
    interfaces: HashMap<InterfaceId, InterfaceEntry>,
    scheduler: Scheduler,
    rx: EventReceiver,
    callbacks: Box<dyn Callbacks>,
    energy: Box<dyn EnergySource>,
    depletion_observers: Vec<DepletionObserver>,
    depleted: bool,
}

impl Driver {
    pub fn new(
        agent: RoutingAgent,
        scheduler: Scheduler,
        rx: EventReceiver,
        callbacks: Box<dyn Callbacks>,
        energy: Box<dyn EnergySource>,
        depletion_observers: Vec<DepletionObserver>,
    ) -> Self {
        Driver {
            agent,
            interfaces: HashMap::new(),
            scheduler,
            rx,
            callbacks,
            energy,
            depletion_observers,
            depleted: false,
        }
    }

    /// Run the event loop. Blocks until Shutdown or all senders are dropped.
    pub fn run(&mut self) {
        loop {
            let event = match self.rx.recv() {
                Ok(e) => e,
                Err(_) => break, // all senders dropped
            };

            match event {
                Event::Datagram {
                    interface,
                    src,
                    data,
                    snr,
                } => {
                    let receiver = match self.interfaces.get_mut(&interface) {
                        Some(entry) => {
                            entry.stats.rxb += data.len() as u64;
                            entry.stats.rx_packets += 1;
                            entry.info.addr
                        }
                        None => continue,
                    };
                    // A node's own broadcasts loop back through the socket.
                    if src == receiver {
                        continue;
                    }
                    let energy = self.energy.remaining_energy();
                    let actions =
                        self.agent
                            .recv_control(&data, interface, src, receiver, snr, energy, time::now());
                    self.dispatch_all(actions);
                }
                Event::BeaconTick => {
                    self.check_depletion();
                    let energy = self.energy.remaining_energy();
                    let actions = self.agent.beacon_tick(energy, time::now());
                    self.dispatch_all(actions);
                }
                Event::AdvertiseTick => {
                    self.check_depletion();
                    let actions = self.agent.advertise_tick(time::now());
                    self.dispatch_all(actions);
                }
                Event::Transmit {
                    interface,
                    dest,
                    raw,
                } => {
                    if let Some(entry) = self.interfaces.get_mut(&interface) {
                        match entry.writer.send_to(dest, &raw) {
                            Ok(()) => {
                                entry.stats.txb += raw.len() as u64;
                                entry.stats.tx_packets += 1;
                            }
                            Err(e) => {
                                log::warn!("[{}] send to {} failed: {}", entry.info.name, dest, e);
                            }
                        }
                    }
                }
                Event::InterfaceUp { info, writer } => {
                    let id = info.id;
                    log::info!("[{}] interface up ({})", info.name, info.addr);
                    self.agent.interface_up(info.clone(), time::now());
                    self.interfaces.insert(
                        id,
                        InterfaceEntry {
                            info,
                            writer,
                            stats: InterfaceStats::default(),
                        },
                    );
                    self.callbacks.on_interface_up(id);
                }
                Event::InterfaceDown(id) => {
                    if let Some(entry) = self.interfaces.remove(&id) {
                        log::info!("[{}] interface down", entry.info.name);
                    }
                    if self.agent.interface_down(id) {
                        log::info!("last interface gone, route tables cleared");
                    }
                    self.callbacks.on_interface_down(id);
                }
                Event::EnergyDepleted => self.handle_depletion(),
                Event::Query(request, response_tx) => {
                    let response = self.handle_query(request);
                    let _ = response_tx.send(response);
                }
                Event::Shutdown => break,
            }
        }
    }

    fn dispatch_all(&mut self, actions: Vec<Action>) {
        for action in actions {
            self.dispatch(action);
        }
    }

    fn dispatch(&mut self, action: Action) {
        match action {
            Action::SendControl {
                interface,
                dest,
                raw,
            } => {
                // Independent small random delay per transmission, so
                // simultaneous neighbor replies desynchronize.
                let jitter = rand::thread_rng().gen_range(0..=constants::JITTER_MAX_MS);
                self.scheduler.schedule_once(
                    Duration::from_millis(jitter),
                    Event::Transmit {
                        interface,
                        dest,
                        raw,
                    },
                );
            }
            Action::RouteUpdated {
                destination,
                next_hop,
                hop_count,
            } => {
                log::debug!(
                    "route updated: {} via {} ({} hops)",
                    destination,
                    next_hop,
                    hop_count
                );
                self.callbacks.on_route_updated(destination, next_hop, hop_count);
            }
            Action::DeliverLocal { packet, .. } => {
                self.callbacks.on_local_delivery(packet);
            }
            Action::ForwardData {
                interface,
                next_hop,
                packet,
            } => {
                self.callbacks.on_forward_data(interface, next_hop, packet);
            }
        }
    }

    fn check_depletion(&mut self) {
        if !self.depleted && self.energy.is_depleted() {
            self.handle_depletion();
        }
    }

    fn handle_depletion(&mut self) {
        if self.depleted {
            return;
        }
        self.depleted = true;
        log::warn!("energy source depleted");
        for observer in &mut self.depletion_observers {
            observer();
        }
        self.callbacks.on_energy_depleted();
    }

    fn handle_query(&mut self, request: QueryRequest) -> QueryResponse {
        match request {
            QueryRequest::RouteTables => {
                QueryResponse::RouteTables(self.agent.format_tables(time::now()))
            }
            QueryRequest::Summary => QueryResponse::Summary {
                ascending: self.agent.ascending_count(),
                descending: self.agent.descending_count(),
                best_energy: self.agent.best_energy(),
                best_snr: self.agent.best_snr(),
            },
        }
    }
}

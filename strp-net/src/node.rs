//! StrpNode: high-level lifecycle management.
//!
//! Wires together the agent, driver thread, interfaces and periodic cycles.

use std::fmt;
use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;

use strp_core::{AgentConfig, InterfaceId, InterfaceInfo, Role, RoutingAgent};

use crate::config::{ConfigError, NodeConfig, RoleConfig};
use crate::driver::{Callbacks, Driver};
use crate::energy::{DepletionObserver, EnergySource, LinearEnergySource};
use crate::event::{self, Event, EventSender, QueryRequest, QueryResponse};
use crate::interface::udp::{self, UdpConfig};
use crate::timer::{Scheduler, TaskHandle};

/// Errors from node startup.
#[derive(Debug)]
pub enum StartError {
    Config(ConfigError),
    Io(io::Error),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::Config(e) => write!(f, "{}", e),
            StartError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl From<ConfigError> for StartError {
    fn from(e: ConfigError) -> Self {
        StartError::Config(e)
    }
}

impl From<io::Error> for StartError {
    fn from(e: io::Error) -> Self {
        StartError::Io(e)
    }
}

/// A running STRP node.
pub struct StrpNode {
    tx: EventSender,
    scheduler: Scheduler,
    driver_thread: Option<JoinHandle<()>>,
    hello_task: Option<TaskHandle>,
    advertise_task: Option<TaskHandle>,
    hello_interval: f64,
    advertise_interval: f64,
    is_server: bool,
    interfaces: Vec<(InterfaceId, String)>,
}

impl fmt::Debug for StrpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrpNode")
            .field("is_server", &self.is_server)
            .field("hello_interval", &self.hello_interval)
            .field("advertise_interval", &self.advertise_interval)
            .field("interfaces", &self.interfaces)
            .finish()
    }
}

impl StrpNode {
    /// Start a node: spawn the driver thread, bring up the configured
    /// interfaces, and arm the periodic cycles.
    pub fn start(
        config: NodeConfig,
        callbacks: Box<dyn Callbacks>,
        depletion_observers: Vec<DepletionObserver>,
    ) -> Result<StrpNode, StartError> {
        // Interface ids are assigned in config order; id 0 is the loopback
        // pseudo-interface inside the agent.
        let ids: Vec<(InterfaceId, String)> = config
            .interfaces
            .iter()
            .enumerate()
            .map(|(i, ifc)| (InterfaceId(i as u64 + 1), ifc.device.clone()))
            .collect();

        let role = match &config.role {
            RoleConfig::Server => Role::Server,
            RoleConfig::Plain => Role::Plain,
            RoleConfig::Sink {
                uplink_device,
                gateway,
            } => {
                let uplink = ids
                    .iter()
                    .find(|(_, dev)| dev == uplink_device)
                    .map(|(id, _)| *id)
                    .ok_or_else(|| {
                        ConfigError::Missing(format!("interface for uplink_device {}", uplink_device))
                    })?;
                Role::Sink {
                    uplink,
                    gateway: *gateway,
                }
            }
        };

        let agent = RoutingAgent::new(AgentConfig {
            role,
            server_addr: config.server_addr,
            policy: config.policy,
            active_route_timeout: config.active_route_timeout,
            hello_interval: config.hello_interval,
            advertise_interval: config.advertise_interval,
            max_hello_hops: config.max_hello_hops,
            max_advertise_hops: config.max_advertise_hops,
            enable_broadcast: config.enable_broadcast,
        });

        let energy: Box<dyn EnergySource> = Box::new(LinearEnergySource::new(
            config.initial_energy,
            config.energy_drain,
        ));

        let (tx, rx) = event::channel();
        let scheduler = Scheduler::new(tx.clone());

        let driver_scheduler = scheduler.clone();
        let driver_thread = thread::Builder::new().name("strp-driver".into()).spawn(
            move || {
                let mut driver = Driver::new(
                    agent,
                    driver_scheduler,
                    rx,
                    callbacks,
                    energy,
                    depletion_observers,
                );
                driver.run();
            },
        )?;

        for (ifc, (id, _)) in config.interfaces.iter().zip(ids.iter()) {
            let writer = udp::start(
                UdpConfig {
                    name: ifc.name.clone(),
                    interface_id: *id,
                    bind_addr: ifc.address,
                    port: ifc.port,
                },
                tx.clone(),
            )?;
            let _ = tx.send(Event::InterfaceUp {
                info: InterfaceInfo {
                    id: *id,
                    name: ifc.name.clone(),
                    addr: ifc.address,
                    netmask: ifc.netmask,
                    forwarding: ifc.forwarding,
                },
                writer,
            });
        }

        let mut node = StrpNode {
            tx,
            scheduler,
            driver_thread: Some(driver_thread),
            hello_task: None,
            advertise_task: None,
            hello_interval: config.hello_interval,
            advertise_interval: config.advertise_interval,
            is_server: matches!(config.role, RoleConfig::Server),
            interfaces: ids,
        };
        node.arm_cycles();
        Ok(node)
    }

    /// Schedule both periodic cycles with fresh random phases. The server
    /// runs no cycles.
    fn arm_cycles(&mut self) {
        if self.is_server || self.interfaces.is_empty() {
            return;
        }
        let mut rng = rand::thread_rng();
        let hello_phase = rng.gen_range(0.0..self.hello_interval.max(f64::MIN_POSITIVE));
        let advertise_phase = rng.gen_range(0.0..self.advertise_interval.max(f64::MIN_POSITIVE));
        self.hello_task = Some(self.scheduler.schedule_periodic(
            Duration::from_secs_f64(hello_phase),
            Duration::from_secs_f64(self.hello_interval),
            || Event::BeaconTick,
        ));
        self.advertise_task = Some(self.scheduler.schedule_periodic(
            Duration::from_secs_f64(advertise_phase),
            Duration::from_secs_f64(self.advertise_interval),
            || Event::AdvertiseTick,
        ));
    }

    fn cancel_cycles(&mut self) {
        if let Some(task) = self.hello_task.take() {
            task.cancel();
        }
        if let Some(task) = self.advertise_task.take() {
            task.cancel();
        }
    }

    /// Administratively take an interface down. Cancels the periodic cycles
    /// and re-arms them only when interfaces remain.
    pub fn interface_down(&mut self, device: &str) {
        let id = match self.interfaces.iter().position(|(_, dev)| dev == device) {
            Some(pos) => self.interfaces.remove(pos).0,
            None => return,
        };
        let _ = self.tx.send(Event::InterfaceDown(id));
        self.cancel_cycles();
        self.arm_cycles();
    }

    /// Issue a diagnostic query to the driver.
    pub fn query(&self, request: QueryRequest) -> Option<QueryResponse> {
        let (tx, rx) = mpsc::channel();
        self.tx.send(Event::Query(request, tx)).ok()?;
        rx.recv_timeout(Duration::from_secs(2)).ok()
    }

    /// Human-readable dump of both route tables.
    pub fn dump_routes(&self) -> Option<String> {
        match self.query(QueryRequest::RouteTables)? {
            QueryResponse::RouteTables(dump) => Some(dump),
            _ => None,
        }
    }

    /// Stop the node: cancel cycles, stop the driver, join its thread.
    pub fn shutdown(mut self) {
        self.cancel_cycles();
        let _ = self.tx.send(Event::Shutdown);
        if let Some(handle) = self.driver_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InterfaceConfig;
    use std::net::Ipv4Addr;

    struct NullCallbacks;
    impl Callbacks for NullCallbacks {}

    #[test]
    fn test_node_smoke_start_query_shutdown() {
        let config = NodeConfig {
            interfaces: vec![InterfaceConfig {
                name: "lo-test".into(),
                device: "lo".into(),
                address: Ipv4Addr::LOCALHOST,
                netmask: Ipv4Addr::new(255, 0, 0, 0),
                // Ephemeral port; this test never transmits.
                port: 0,
                forwarding: true,
            }],
            ..NodeConfig::default()
        };
        let node = StrpNode::start(config, Box::new(NullCallbacks), Vec::new()).unwrap();

        let dump = node.dump_routes().unwrap();
        assert!(dump.contains("Ascending routes"));
        assert!(dump.contains("Descending routes"));
        // Loopback and subnet-broadcast entries are permanent.
        assert!(dump.contains("127.0.0.1"));

        node.shutdown();
    }

    #[test]
    fn test_sink_role_requires_known_uplink_device() {
        let config = NodeConfig {
            role: RoleConfig::Sink {
                uplink_device: "eth9".into(),
                gateway: Ipv4Addr::new(10, 2, 0, 1),
            },
            ..NodeConfig::default()
        };
        let err = StrpNode::start(config, Box::new(NullCallbacks), Vec::new()).unwrap_err();
        assert!(matches!(err, StartError::Config(ConfigError::Missing(_))));
    }
}

//! strpd - STRP routing daemon
//!
//! Starts an STRP node from a config file and runs until SIGINT/SIGTERM.

use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Mutex;

use strp_cli::args::Args;
use strp_net::{Callbacks, DataPacket, InterfaceId, StrpNode};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_CONFIG: &str = "/etc/strpd.conf";

struct DaemonCallbacks;

impl Callbacks for DaemonCallbacks {
    fn on_route_updated(&mut self, destination: Ipv4Addr, next_hop: Ipv4Addr, hop_count: u16) {
        log::info!(
            "route to {} via {} ({} hops)",
            destination,
            next_hop,
            hop_count
        );
    }

    fn on_local_delivery(&mut self, packet: DataPacket) {
        log::debug!("local delivery from {}", packet.header.src);
    }

    fn on_interface_up(&mut self, id: InterfaceId) {
        log::info!("interface {} up", id.0);
    }

    fn on_interface_down(&mut self, id: InterfaceId) {
        log::info!("interface {} down", id.0);
    }

    fn on_energy_depleted(&mut self) {
        log::warn!("energy depleted, node going dark");
    }
}

static STOP_TX: Mutex<Option<mpsc::Sender<()>>> = Mutex::new(None);

extern "C" fn signal_handler(_sig: libc::c_int) {
    if let Ok(guard) = STOP_TX.lock() {
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(());
        }
    }
}

fn print_usage() {
    println!("Usage: strpd [options]");
    println!();
    println!("  --config <path>   config file (default {})", DEFAULT_CONFIG);
    println!("  --dump            print route tables on shutdown");
    println!("  -v / -q           more / less logging");
    println!("  --version         print version and exit");
    println!("  --help            this text");
}

fn main() {
    let args = Args::parse();

    if args.has("version") {
        println!("strpd {}", VERSION);
        return;
    }
    if args.has("help") {
        print_usage();
        return;
    }

    let log_level = if args.quiet > 0 {
        match args.quiet {
            1 => log::LevelFilter::Warn,
            _ => log::LevelFilter::Error,
        }
    } else {
        match args.verbosity {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_secs()
        .init();

    let config_path = args.config_path().unwrap_or(DEFAULT_CONFIG).to_string();

    log::info!("Starting strpd {}", VERSION);

    let config = match strp_net::config::parse_file(Path::new(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            log::error!("Failed to load {}: {}", config_path, e);
            std::process::exit(1);
        }
    };

    let node = match StrpNode::start(config, Box::new(DaemonCallbacks), Vec::new()) {
        Ok(n) => n,
        Err(e) => {
            log::error!("Failed to start: {}", e);
            std::process::exit(1);
        }
    };

    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    if let Ok(mut guard) = STOP_TX.lock() {
        guard.replace(stop_tx);
    }
    unsafe {
        libc::signal(libc::SIGINT, signal_handler as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, signal_handler as *const () as libc::sighandler_t);
    }

    log::info!("strpd started");

    // Block until a signal arrives.
    let _ = stop_rx.recv();

    if args.has("dump") {
        if let Some(dump) = node.dump_routes() {
            println!("{}", dump);
        }
    }

    log::info!("strpd stopping");
    node.shutdown();
}

//! framenet Echo Server
//!
//! Accepts TCP connections (and optionally UDP packets) and sends every
//! datagram back to where it came from.

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use framenet::{
    Connection, ConnectionWriter, HeaderWidth, NetConfig, QueuedConnectionListener,
    QueuedConnectionManager, QueuedConnectionReader, Transport,
};
use tracing_subscriber::{fmt, EnvFilter};

/// framenet Echo Server
#[derive(Parser, Debug)]
#[command(name = "framenet-echo")]
#[command(about = "Echo server for framed TCP and UDP datagrams")]
#[command(version)]
struct Args {
    /// TCP port to listen on
    #[arg(short, long, default_value = "4400")]
    port: u16,

    /// Also echo UDP packets received on this port
    #[arg(short, long)]
    udp_port: Option<u16>,

    /// Reader/listener/writer worker threads (0 for polling mode)
    #[arg(short, long, default_value = "2")]
    threads: usize,

    /// TCP length header width in bytes (0, 2 or 4)
    #[arg(long, default_value = "2")]
    header_size: usize,

    /// Listen backlog
    #[arg(short, long, default_value = "16")]
    backlog: u32,

    /// Stop after this many seconds (runs forever if omitted)
    #[arg(long)]
    run_for: Option<u64>,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,framenet=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("framenet echo server v{}", framenet::VERSION);

    if let Err(e) = run(&args) {
        tracing::error!("Echo server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Echo server stopped");
}

fn run(args: &Args) -> framenet::Result<()> {
    let config = NetConfig::builder()
        .tcp_header_size(HeaderWidth::from_bytes(args.header_size)?)
        .build();

    let manager = QueuedConnectionManager::with_config(config);
    let rendezvous = manager.open_tcp_server_rendezvous(args.port, args.backlog)?;
    let udp = match args.udp_port {
        Some(port) => Some(manager.open_udp(port)?),
        None => None,
    };

    // Threaded engines must be shut down before they are dropped
    let listener = QueuedConnectionListener::new(manager.manager(), args.threads)?;
    let reader = match QueuedConnectionReader::new(manager.manager(), args.threads) {
        Ok(reader) => reader,
        Err(e) => {
            listener.shutdown();
            return Err(e);
        }
    };
    let writer = match ConnectionWriter::new(manager.manager(), args.threads) {
        Ok(writer) => writer,
        Err(e) => {
            listener.shutdown();
            reader.shutdown();
            return Err(e);
        }
    };

    listener.add_connection(&rendezvous);
    tracing::info!("Listening on TCP port {}", local_port(&rendezvous));
    if let Some(udp) = &udp {
        reader.add_connection(udp);
        tracing::info!("Echoing UDP on port {}", local_port(udp));
    }

    let deadline = args.run_for.map(|secs| Instant::now() + Duration::from_secs(secs));
    while deadline.map_or(true, |d| Instant::now() < d) {
        let mut idle = true;

        while listener.new_connection_available() {
            if let Some(new) = listener.get_new_connection() {
                tracing::info!("Client {} connected from {}", new.connection.id(), new.address);
                reader.add_connection(&new.connection);
                idle = false;
            }
        }

        while reader.data_available() {
            let Some(datagram) = reader.get_data() else {
                break;
            };
            idle = false;

            let Some(connection) = datagram.connection() else {
                continue;
            };
            let sent = match connection.transport() {
                Transport::Udp => writer.send_to(&datagram, connection, datagram.address()),
                _ => writer.send(&datagram, connection),
            };
            if let Err(e) = sent {
                tracing::warn!("Echo on connection {} failed: {}", connection.id(), e);
            }
        }

        while manager.reset_connection_available() {
            if let Some(connection) = manager.get_reset_connection() {
                tracing::info!("Client {} disconnected", connection.id());
                manager.close_connection(&connection);
                idle = false;
            }
        }

        if idle {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    listener.shutdown();
    reader.shutdown();
    writer.shutdown();
    Ok(())
}

fn local_port(connection: &Arc<Connection>) -> u16 {
    connection.get_address().map(|a| a.port()).unwrap_or(0)
}

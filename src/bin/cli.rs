//! framenet CLI Client
//!
//! Sends datagrams to a framenet peer and prints whatever comes back.

use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use framenet::{
    ConnectionWriter, Datagram, HeaderWidth, NetAddress, NetConfig, QueuedConnectionManager,
    QueuedConnectionReader,
};
use tracing_subscriber::{fmt, EnvFilter};

/// framenet CLI
#[derive(Parser, Debug)]
#[command(name = "framenet-cli")]
#[command(about = "CLI for exchanging framed datagrams with a framenet peer")]
struct Args {
    /// Peer host
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Peer port
    #[arg(short, long, default_value = "4400")]
    port: u16,

    /// TCP length header width in bytes (0, 2 or 4)
    #[arg(long, default_value = "2")]
    header_size: usize,

    /// How long to wait for replies, in milliseconds
    #[arg(short, long, default_value = "1000")]
    wait_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send each message as one datagram over TCP
    Tcp {
        /// Messages to send
        messages: Vec<String>,
    },

    /// Send each message as one UDP packet
    Udp {
        /// Messages to send
        messages: Vec<String>,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> framenet::Result<()> {
    let config = NetConfig::builder()
        .tcp_header_size(HeaderWidth::from_bytes(args.header_size)?)
        .build();
    let connect_timeout = config.connect_timeout;

    let manager = QueuedConnectionManager::with_config(config);
    // Polling reader and immediate writer: everything runs on this thread
    let reader = QueuedConnectionReader::new(manager.manager(), 0)?;
    let writer = ConnectionWriter::new(manager.manager(), 0)?;

    let expected = match &args.command {
        Commands::Tcp { messages } => {
            let connection = manager.open_tcp_client_host(&args.host, args.port, connect_timeout)?;
            reader.add_connection(&connection);
            for message in messages {
                writer.send(&Datagram::from_slice(message.as_bytes()), &connection)?;
            }
            messages.len()
        }
        Commands::Udp { messages } => {
            let peer = NetAddress::resolve(&args.host, args.port)?;
            let connection = manager.open_udp(0)?;
            reader.add_connection(&connection);
            for message in messages {
                writer.send_to(&Datagram::from_slice(message.as_bytes()), &connection, &peer)?;
            }
            messages.len()
        }
    };

    let deadline = Instant::now() + Duration::from_millis(args.wait_ms);
    let mut received = 0;
    while received < expected && Instant::now() < deadline {
        if reader.data_available() {
            if let Some(reply) = reader.get_data() {
                println!("{}: {}", reply.address(), String::from_utf8_lossy(reply.data()));
                received += 1;
            }
            continue;
        }
        if manager.reset_connection_available() {
            println!("Connection closed by peer");
            break;
        }
        std::thread::sleep(Duration::from_millis(1));
    }

    if received < expected {
        println!("Received {} of {} replies", received, expected);
    }
    Ok(())
}

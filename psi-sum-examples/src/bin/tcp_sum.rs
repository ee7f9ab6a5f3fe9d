//! TCP-based PSI-Sum example.
//!
//! The server holds a tagged dictionary and answers one client; the client
//! learns the intersection size and tag sum. Each round message is one
//! JSON line on the socket.
//!
//! Run server:
//! ```bash
//! cargo run --bin tcp_sum -- server [address]
//! ```
//!
//! Run client (in another terminal):
//! ```bash
//! cargo run --bin tcp_sum -- client [address]
//! ```
//!
//! The channel here is plain TCP. A deployment must run it over TLS.

use psi_sum_protocol::{run_as_client, run_as_server, JsonLinesTransport, ProtocolConfig};
use rand::rngs::OsRng;
use std::env;
use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use tracing::info;

const DEFAULT_ADDRESS: &str = "127.0.0.1:7878";

/// Run the server (party 2)
fn run_server(address: &str, config: &ProtocolConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== PSI-Sum TCP Server ===");
    let listener = TcpListener::bind(address)?;
    info!(%address, "listening");

    let (stream, peer) = listener.accept()?;
    info!(%peer, "client connected");

    // Server's private dictionary: identifier -> tag
    let dictionary = vec![
        ("shared_item_1", 120u64),
        ("server_secret_1", 7),
        ("shared_item_2", 30),
        ("server_secret_2", 99),
    ];
    println!("Server holds {} tagged entries", dictionary.len());

    let mut transport = JsonLinesTransport::new(BufReader::new(stream.try_clone()?), stream);
    let responded = run_as_server(dictionary, &mut transport, config, &mut OsRng)?;

    println!(
        "Answered {} blinded identifiers with {} tagged ciphertexts",
        responded.points_received(),
        responded.entries_answered()
    );
    println!("\n✓ Server protocol completed! (the server never sees the result)");
    Ok(())
}

/// Run the client (party 1)
fn run_client(address: &str, config: &ProtocolConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== PSI-Sum TCP Client ===");
    let stream = TcpStream::connect(address)?;
    info!(%address, "connected to server");

    // Client's private identifier set
    let identifiers = vec![
        "client_secret_1",
        "shared_item_1",
        "client_secret_2",
        "shared_item_2",
    ];
    println!("Client holds {} identifiers", identifiers.len());

    let mut transport = JsonLinesTransport::new(BufReader::new(stream.try_clone()?), stream);
    let result = run_as_client(identifiers, &mut transport, config, &mut OsRng)?;

    println!("\n=== Results ===");
    println!("Intersection size: {}", result.intersection_size);
    println!("Tag sum over intersection: {}", result.tag_sum);
    println!("\n✓ Client protocol completed!");
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <server|client> [address]", args[0]);
        eprintln!("\nRun server first: {} server", args[0]);
        eprintln!("Then run client: {} client", args[0]);
        std::process::exit(1);
    }
    let address = args.get(2).map(String::as_str).unwrap_or(DEFAULT_ADDRESS);
    let config = ProtocolConfig::default();
    config.validate()?;

    match args[1].as_str() {
        "server" => run_server(address, &config),
        "client" => run_client(address, &config),
        _ => {
            eprintln!("Unknown mode: {}", args[1]);
            eprintln!("Usage: {} <server|client> [address]", args[0]);
            std::process::exit(1);
        }
    }
}

//! In-memory example of a PSI-Sum run.
//!
//! Both roles run in one process; round messages are handed over directly
//! instead of crossing a network.
//!
//! Run with:
//! ```bash
//! cargo run --bin in_memory
//! ```

use num_bigint::BigUint;
use psi_sum_protocol::{Client, ProtocolConfig, PsiSumResult, Server};
use rand::rngs::OsRng;
use tracing::info;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== PSI-Sum In-Memory Example ===\n");

    // Client's private identifier set
    let client_ids = vec![
        "alice@example.com",
        "bob@example.com",
        "carol@example.com",
    ];

    // Server's private dictionary: identifier -> tag
    let server_dict = vec![
        ("carol@example.com", 10u64),
        ("bob@example.com", 6),
        ("dave@example.com", 1),
    ];

    println!("Client holds {} identifiers", client_ids.len());
    println!("Server holds {} tagged entries", server_dict.len());

    let config = ProtocolConfig::default();
    let mut rng = OsRng;

    // === Round 1: client blinds its set ===
    println!("\n--- Round 1: Client -> Server ---");
    let client = Client::new(client_ids.clone());
    let (client, round1) = client.first_round(&config, &mut rng)?;
    println!(
        "Client sent {} blinded identifiers and a {}-bit Paillier key",
        round1.len(),
        round1.public_key.bits()
    );

    // === Round 2: server re-blinds and encrypts tags ===
    println!("\n--- Round 2: Server -> Client ---");
    let server = Server::new(server_dict.clone());
    let (responded, round2) = server.second_round(round1, &config, &mut rng)?;
    println!(
        "Server re-blinded {} points and sent {} tagged ciphertexts",
        responded.points_received(),
        responded.entries_answered()
    );

    // === Round 3: client matches and decrypts the sum ===
    println!("\n--- Round 3: Client computes result ---");
    let result: PsiSumResult = client.third_round(round2, &mut rng)?;

    println!("\n=== Results ===");
    println!("|V ∩ W| = {}", result.intersection_size);
    println!("Σ tags over intersection = {}", result.tag_sum);

    // Plaintext check, possible only because this demo holds both sides
    let shared: Vec<u64> = server_dict
        .iter()
        .filter(|(id, _)| client_ids.contains(id))
        .map(|(_, tag)| *tag)
        .collect();
    let expected_sum: u64 = shared.iter().sum();
    let verified = result.intersection_size == shared.len()
        && result.tag_sum == BigUint::from(expected_sum);
    info!(verified, "plaintext cross-check");
    println!(
        "\n✓ Verification: {}",
        if verified { "PASSED" } else { "FAILED" }
    );

    Ok(())
}

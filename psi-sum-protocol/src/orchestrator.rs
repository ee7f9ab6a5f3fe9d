//! Sequencing of the three rounds.
//!
//! No cryptography lives here: each function drives the role objects
//! through their states exactly once and hands messages to a transport.

use crate::config::ProtocolConfig;
use crate::error::Result;
use crate::messages::PsiSumResult;
use crate::state::{Client, RespondedServer, Server};
use crate::transport::{ClientTransport, ServerTransport};
use num_bigint::BigInt;
use rand::{CryptoRng, RngCore};
use tracing::info;

/// Run the client role against a remote server.
///
/// # Returns
/// The intersection size and tag sum
///
/// # Errors
/// Any round or transport error; no partial result is returned.
pub fn run_as_client<I, S, T, R>(
    identifiers: I,
    transport: &mut T,
    config: &ProtocolConfig,
    rng: &mut R,
) -> Result<PsiSumResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    T: ClientTransport,
    R: RngCore + CryptoRng,
{
    let client = Client::new(identifiers);
    info!(identifiers = client.len(), "starting PSI-Sum as client");
    let (client, round1) = client.first_round(config, rng)?;
    let round2 = transport.exchange(round1)?;
    client.third_round(round2, rng)
}

/// Run the server role for one client.
///
/// # Returns
/// The server's bookkeeping; the server never learns the result
pub fn run_as_server<I, K, V, T, R>(
    dictionary: I,
    transport: &mut T,
    config: &ProtocolConfig,
    rng: &mut R,
) -> Result<RespondedServer>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<BigInt>,
    T: ServerTransport,
    R: RngCore + CryptoRng,
{
    let server = Server::new(dictionary);
    info!(entries = server.len(), "starting PSI-Sum as server");
    let round1 = transport.receive_round1()?;
    let (responded, round2) = server.second_round(round1, config, rng)?;
    transport.send_round2(round2)?;
    Ok(responded)
}

/// Run both roles in-process.
///
/// Messages are passed directly from one round to the next. Fresh scalars
/// and keys are drawn from `rng` on every call.
pub fn run_protocol<I, S, D, K, V, R>(
    identifiers: I,
    dictionary: D,
    config: &ProtocolConfig,
    rng: &mut R,
) -> Result<PsiSumResult>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
    D: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<BigInt>,
    R: RngCore + CryptoRng,
{
    let client = Client::new(identifiers);
    let server = Server::new(dictionary);

    let (client, round1) = client.first_round(config, rng)?;
    let (_, round2) = server.second_round(round1, config, rng)?;
    client.third_round(round2, rng)
}

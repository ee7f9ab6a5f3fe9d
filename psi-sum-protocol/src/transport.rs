//! Transport seams between the two roles.
//!
//! The protocol never does I/O itself. A deployment supplies an
//! authenticated, confidential channel behind these traits; this module
//! ships an in-process loopback and a newline-delimited JSON framing that
//! works over any `BufRead`/`Write` pair, such as a TCP stream.

use crate::config::ProtocolConfig;
use crate::error::{PsiSumError, Result};
use crate::messages::{Round1Message, Round2Message};
use crate::state::{RespondedServer, Server};
use rand::{CryptoRng, RngCore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{BufRead, Write};
use tracing::debug;

/// Client side of the channel: deliver round 1, await round 2.
pub trait ClientTransport {
    /// Send the round-1 message and block until the round-2 reply arrives.
    fn exchange(&mut self, round1: Round1Message) -> Result<Round2Message>;
}

/// Server side of the channel.
pub trait ServerTransport {
    /// Block until the client's round-1 message arrives.
    fn receive_round1(&mut self) -> Result<Round1Message>;

    /// Deliver the round-2 reply.
    fn send_round2(&mut self, round2: Round2Message) -> Result<()>;
}

/// Runs the server role in-process, in place of a network peer.
///
/// Answers exactly one exchange; the server is consumed by it.
pub struct LoopbackServer<R> {
    server: Option<Server>,
    config: ProtocolConfig,
    rng: R,
    responded: Option<RespondedServer>,
}

impl<R: RngCore + CryptoRng> LoopbackServer<R> {
    /// Wrap a server with its own parameters and randomness.
    pub fn new(server: Server, config: ProtocolConfig, rng: R) -> Self {
        Self {
            server: Some(server),
            config,
            rng,
            responded: None,
        }
    }

    /// The server's bookkeeping once it has answered.
    pub fn responded(&self) -> Option<&RespondedServer> {
        self.responded.as_ref()
    }
}

impl<R: RngCore + CryptoRng> ClientTransport for LoopbackServer<R> {
    fn exchange(&mut self, round1: Round1Message) -> Result<Round2Message> {
        let server = self.server.take().ok_or_else(|| {
            PsiSumError::Transport("loopback server has already answered".to_string())
        })?;
        let (responded, round2) = server.second_round(round1, &self.config, &mut self.rng)?;
        self.responded = Some(responded);
        Ok(round2)
    }
}

/// One JSON document per line over a reader/writer pair.
pub struct JsonLinesTransport<Rd, Wr> {
    reader: Rd,
    writer: Wr,
}

impl<Rd: BufRead, Wr: Write> JsonLinesTransport<Rd, Wr> {
    /// Frame messages over `reader` and `writer`.
    pub fn new(reader: Rd, writer: Wr) -> Self {
        Self { reader, writer }
    }

    /// Give back the underlying reader and writer.
    pub fn into_inner(self) -> (Rd, Wr) {
        (self.reader, self.writer)
    }

    fn send<T: Serialize>(&mut self, message: &T) -> Result<()> {
        let mut line = serde_json::to_string(message)
            .map_err(|e| PsiSumError::Transport(format!("failed to encode message: {}", e)))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| PsiSumError::Transport(format!("failed to write message: {}", e)))?;
        debug!(bytes = line.len(), "sent message");
        Ok(())
    }

    fn receive<T: DeserializeOwned>(&mut self) -> Result<T> {
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| PsiSumError::Transport(format!("failed to read message: {}", e)))?;
        if read == 0 {
            return Err(PsiSumError::Transport(
                "connection closed before message arrived".to_string(),
            ));
        }
        debug!(bytes = read, "received message");
        serde_json::from_str(line.trim_end())
            .map_err(|e| PsiSumError::InvalidMessage(format!("failed to decode message: {}", e)))
    }
}

impl<Rd: BufRead, Wr: Write> ClientTransport for JsonLinesTransport<Rd, Wr> {
    fn exchange(&mut self, round1: Round1Message) -> Result<Round2Message> {
        self.send(&round1)?;
        self.receive()
    }
}

impl<Rd: BufRead, Wr: Write> ServerTransport for JsonLinesTransport<Rd, Wr> {
    fn receive_round1(&mut self) -> Result<Round1Message> {
        self.receive()
    }

    fn send_round2(&mut self, round2: Round2Message) -> Result<()> {
        self.send(&round2)
    }
}

//! High-level TFTP client.
//!
//! Wraps the transfer engine and the async driver into two calls:
//! [`TftpClient::get`] to read a file from a server and
//! [`TftpClient::put`] to write one. Each call runs one transfer on its
//! own ephemeral socket and returns the number of payload bytes moved.

use std::io::{Read, Write};
use std::net::SocketAddr;

use crate::core::TftpError;
use crate::options::OptionSet;
use crate::transfer::{Transfer, TransferConfig};
use crate::transport::{TftpSocket, drive};
use crate::wire::TransferMode;

/// A TFTP client bound to one server address.
///
/// Cheap to clone per request; every transfer gets a fresh ephemeral
/// socket, so concurrent transfers from one client do not interfere.
#[derive(Debug, Clone)]
pub struct TftpClient {
    server: SocketAddr,
    config: TransferConfig,
    options: Vec<(String, String)>,
    mode: TransferMode,
}

impl TftpClient {
    /// Create a client for the given server address.
    pub fn new(server: SocketAddr) -> Self {
        Self {
            server,
            config: TransferConfig::default(),
            options: Vec::new(),
            mode: TransferMode::Octet,
        }
    }

    /// Override timing and retry parameters.
    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    /// Propose an option on every request, e.g. `("blksize", "1432")`.
    ///
    /// Servers that do not negotiate simply ignore it and the transfer
    /// falls back to protocol defaults.
    pub fn with_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((name.into(), value.into()));
        self
    }

    /// Use a transfer mode other than the default `octet`.
    pub fn with_mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    /// Read `filename` from the server into `sink`.
    ///
    /// Returns the number of payload bytes received.
    pub async fn get(
        &self,
        filename: &str,
        sink: impl Write + Send + 'static,
    ) -> Result<u64, TftpError> {
        let transfer = Transfer::read_request(
            filename,
            self.mode,
            self.propose(),
            sink,
            self.config.clone(),
        );
        self.run(filename, transfer).await
    }

    /// Write `source` to the server as `filename`.
    ///
    /// Returns the number of payload bytes sent.
    pub async fn put(
        &self,
        filename: &str,
        source: impl Read + Send + 'static,
    ) -> Result<u64, TftpError> {
        let transfer = Transfer::write_request(
            filename,
            self.mode,
            self.propose(),
            source,
            self.config.clone(),
        );
        self.run(filename, transfer).await
    }

    fn propose(&self) -> OptionSet {
        OptionSet::propose(self.options.iter().cloned())
    }

    async fn run(&self, filename: &str, transfer: Transfer) -> Result<u64, TftpError> {
        let mut socket = TftpSocket::ephemeral_for(self.server).await?;
        tracing::info!(server = %self.server, filename, "starting transfer");
        let outcome = drive(transfer, &mut socket, self.server).await?;
        outcome.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_accumulates_options() {
        let client = TftpClient::new("127.0.0.1:69".parse().unwrap())
            .with_option("blksize", "1432")
            .with_option("tsize", "0")
            .with_mode(TransferMode::Netascii);

        let proposed = client.propose();
        assert_eq!(proposed.len(), 2);
        assert_eq!(proposed.get("blksize").unwrap().value(), "1432");
        assert_eq!(client.mode, TransferMode::Netascii);
    }
}

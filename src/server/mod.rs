//! TFTP server: request acceptor and per-session transfers.
//!
//! The main socket only ever sees requests. Each accepted RRQ or WRQ gets
//! its own tokio task and its own ephemeral socket (the transfer
//! identifier on the wire), so sessions share no state and a misbehaving
//! peer can only hurt its own transfer.
//!
//! File access goes through the [`RequestHandler`] seam; the bundled
//! [`DirectoryHandler`] serves a single directory and refuses paths that
//! escape it.

use std::fs::File;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::core::{
    ERR_ACCESS_VIOLATION, ERR_FILE_EXISTS, ERR_FILE_NOT_FOUND, ERR_ILLEGAL_OPERATION,
    ERR_UNDEFINED, TftpError,
};
use crate::transfer::{Transfer, TransferConfig};
use crate::transport::{TftpSocket, drive};
use crate::wire::{Packet, Request};

/// Opens the byte streams behind inbound requests.
///
/// Implementations decide what a filename means; the server never touches
/// the filesystem itself. Returned errors are relayed to the peer as TFTP
/// error packets with a code derived from the error kind.
pub trait RequestHandler: Send + Sync + 'static {
    /// Open `filename` for an outgoing transfer.
    ///
    /// The size, when known, answers the peer's `tsize` probe.
    fn open_read(&self, filename: &str) -> io::Result<(Box<dyn Read + Send>, Option<u64>)>;

    /// Open `filename` for an incoming transfer.
    fn open_write(&self, filename: &str) -> io::Result<Box<dyn Write + Send>>;
}

/// Serves one directory tree, read and write.
///
/// Requested paths are canonicalized and checked against the root, so
/// `../` tricks cannot escape it. Incoming transfers refuse to overwrite
/// existing files.
#[derive(Debug)]
pub struct DirectoryHandler {
    root: PathBuf,
}

impl DirectoryHandler {
    /// Serve files under `root`, which must exist.
    pub fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self {
            root: root.as_ref().canonicalize()?,
        })
    }

    fn resolve_existing(&self, filename: &str) -> io::Result<PathBuf> {
        let path = self.root.join(filename).canonicalize()?;
        if !path.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "path escapes served directory",
            ));
        }
        Ok(path)
    }

    fn resolve_new(&self, filename: &str) -> io::Result<PathBuf> {
        let requested = self.root.join(filename);
        let name = requested.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "filename has no final component")
        })?;
        // The file does not exist yet; canonicalize its parent instead.
        let parent = requested
            .parent()
            .unwrap_or(self.root.as_path())
            .canonicalize()?;
        if !parent.starts_with(&self.root) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "path escapes served directory",
            ));
        }
        Ok(parent.join(name))
    }
}

impl RequestHandler for DirectoryHandler {
    fn open_read(&self, filename: &str) -> io::Result<(Box<dyn Read + Send>, Option<u64>)> {
        let path = self.resolve_existing(filename)?;
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok((Box::new(file), Some(size)))
    }

    fn open_write(&self, filename: &str) -> io::Result<Box<dyn Write + Send>> {
        let path = self.resolve_new(filename)?;
        Ok(Box::new(File::create_new(path)?))
    }
}

/// A TFTP server bound to one request socket.
pub struct TftpServer<H: RequestHandler> {
    socket: TftpSocket,
    handler: Arc<H>,
    config: TransferConfig,
}

impl<H: RequestHandler> TftpServer<H> {
    /// Bind the request socket (conventionally port 69).
    pub async fn bind(addr: SocketAddr, handler: H) -> io::Result<Self> {
        Ok(Self {
            socket: TftpSocket::bind(addr).await?,
            handler: Arc::new(handler),
            config: TransferConfig::default(),
        })
    }

    /// Override timing and retry parameters for all sessions.
    pub fn with_config(mut self, config: TransferConfig) -> Self {
        self.config = config;
        self
    }

    /// The bound request socket address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Accept requests forever, one spawned session per transfer.
    pub async fn serve(mut self) -> io::Result<()> {
        tracing::info!(addr = %self.socket.local_addr()?, "serving");
        loop {
            let (raw, client) = self.socket.recv_from().await?;
            match Packet::decode(raw) {
                Ok(Packet::ReadRequest(request)) => {
                    tracing::info!(%client, filename = %request.filename, "read request");
                    let handler = Arc::clone(&self.handler);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_read(handler, request, client, config).await {
                            tracing::warn!(%client, error = %e, "read session failed");
                        }
                    });
                }
                Ok(Packet::WriteRequest(request)) => {
                    tracing::info!(%client, filename = %request.filename, "write request");
                    let handler = Arc::clone(&self.handler);
                    let config = self.config.clone();
                    tokio::spawn(async move {
                        if let Err(e) = serve_write(handler, request, client, config).await {
                            tracing::warn!(%client, error = %e, "write session failed");
                        }
                    });
                }
                Ok(other) => {
                    tracing::warn!(%client, packet = other.name(), "non-request on request socket");
                    self.refuse(client, "Illegal TFTP operation").await?;
                }
                Err(e) => {
                    tracing::warn!(%client, error = %e, "malformed datagram on request socket");
                    self.refuse(client, "Malformed packet").await?;
                }
            }
        }
    }

    async fn refuse(&self, client: SocketAddr, message: &str) -> io::Result<()> {
        let reply = Packet::Error {
            code: ERR_ILLEGAL_OPERATION,
            message: message.to_string(),
        };
        self.socket.send_to(&reply.encode(), client).await?;
        Ok(())
    }
}

async fn serve_read<H: RequestHandler>(
    handler: Arc<H>,
    request: Request,
    client: SocketAddr,
    config: TransferConfig,
) -> Result<(), TftpError> {
    let mut socket = TftpSocket::ephemeral_for(client).await?;
    let (source, size) = match handler.open_read(&request.filename) {
        Ok(opened) => opened,
        Err(e) => return relay_open_failure(&socket, client, e).await,
    };

    let transfer = Transfer::answer_read_request(&request, source, size, config);
    let outcome = drive(transfer, &mut socket, client).await?;
    let bytes = outcome.into_result()?;
    tracing::info!(%client, filename = %request.filename, bytes, "sent");
    Ok(())
}

async fn serve_write<H: RequestHandler>(
    handler: Arc<H>,
    request: Request,
    client: SocketAddr,
    config: TransferConfig,
) -> Result<(), TftpError> {
    let mut socket = TftpSocket::ephemeral_for(client).await?;
    let sink = match handler.open_write(&request.filename) {
        Ok(opened) => opened,
        Err(e) => return relay_open_failure(&socket, client, e).await,
    };

    let transfer = Transfer::answer_write_request(&request, sink, config);
    let outcome = drive(transfer, &mut socket, client).await?;
    let bytes = outcome.into_result()?;
    tracing::info!(%client, filename = %request.filename, bytes, "received");
    Ok(())
}

/// Tell the peer why its request was refused, then surface the failure.
async fn relay_open_failure(
    socket: &TftpSocket,
    client: SocketAddr,
    error: io::Error,
) -> Result<(), TftpError> {
    let reply = Packet::Error {
        code: error_code_for(error.kind()),
        message: error.to_string(),
    };
    socket.send_to(&reply.encode(), client).await?;
    Err(error.into())
}

fn error_code_for(kind: io::ErrorKind) -> u16 {
    match kind {
        io::ErrorKind::NotFound => ERR_FILE_NOT_FOUND,
        io::ErrorKind::PermissionDenied => ERR_ACCESS_VIOLATION,
        io::ErrorKind::AlreadyExists => ERR_FILE_EXISTS,
        _ => ERR_UNDEFINED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::tempdir;

    #[test]
    fn test_directory_handler_rejects_traversal() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), b"test content").unwrap();
        let handler = DirectoryHandler::new(dir.path()).unwrap();

        assert!(handler.open_read("test.txt").is_ok());
        assert!(handler.open_read("../../../etc/passwd").is_err());
        assert!(handler.open_write("../escape.txt").is_err());
    }

    #[test]
    fn test_directory_handler_reports_size() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sized.bin"), vec![0u8; 777]).unwrap();
        let handler = DirectoryHandler::new(dir.path()).unwrap();

        let (_, size) = handler.open_read("sized.bin").unwrap();
        assert_eq!(size, Some(777));
    }

    #[test]
    fn test_directory_handler_refuses_overwrite() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("taken.bin"), b"old").unwrap();
        let handler = DirectoryHandler::new(dir.path()).unwrap();

        let err = handler.open_write("taken.bin").err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(error_code_for(err.kind()), ERR_FILE_EXISTS);
    }
}

#[cfg(all(test, feature = "client"))]
mod e2e_tests {
    use super::*;

    use std::io::Cursor;
    use std::time::Duration;

    use tempfile::tempdir;

    use crate::client::TftpClient;

    async fn spawn_server(root: &Path) -> SocketAddr {
        let server = TftpServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            DirectoryHandler::new(root).unwrap(),
        )
        .await
        .unwrap()
        .with_config(TransferConfig {
            timeout: Duration::from_millis(100),
            max_retries: 3,
        });
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.serve());
        addr
    }

    fn client_for(addr: SocketAddr) -> TftpClient {
        TftpClient::new(addr).with_config(TransferConfig {
            timeout: Duration::from_millis(100),
            max_retries: 3,
        })
    }

    #[tokio::test]
    async fn test_get_round_trip() {
        let dir = tempdir().unwrap();
        let payload: Vec<u8> = (0..1500u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(dir.path().join("hello.bin"), &payload).unwrap();
        let addr = spawn_server(dir.path()).await;

        let target = dir.path().join("fetched.bin");
        let bytes = client_for(addr)
            .get("hello.bin", File::create(&target).unwrap())
            .await
            .unwrap();

        assert_eq!(bytes, 1500);
        assert_eq!(std::fs::read(target).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_put_round_trip() {
        let dir = tempdir().unwrap();
        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 13) as u8).collect();
        let addr = spawn_server(dir.path()).await;

        let bytes = client_for(addr)
            .put("uploaded.bin", Cursor::new(payload.clone()))
            .await
            .unwrap();

        assert_eq!(bytes, 2000);
        assert_eq!(std::fs::read(dir.path().join("uploaded.bin")).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_get_with_negotiated_block_size() {
        let dir = tempdir().unwrap();
        let payload = vec![7u8; 3000];
        std::fs::write(dir.path().join("big.bin"), &payload).unwrap();
        let addr = spawn_server(dir.path()).await;

        let target = dir.path().join("fetched.bin");
        let bytes = client_for(addr)
            .with_option("blksize", "1024")
            .with_option("tsize", "0")
            .get("big.bin", File::create(&target).unwrap())
            .await
            .unwrap();

        assert_eq!(bytes, 3000);
        assert_eq!(std::fs::read(target).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_missing_file_surfaces_peer_error() {
        let dir = tempdir().unwrap();
        let addr = spawn_server(dir.path()).await;

        let err = client_for(addr)
            .get("no-such-file", Vec::<u8>::new())
            .await
            .unwrap_err();

        let TftpError::Peer { code, .. } = err else {
            panic!("expected peer error, got {err}");
        };
        assert_eq!(code, ERR_FILE_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_non_request_gets_illegal_operation_error() {
        let dir = tempdir().unwrap();
        let addr = spawn_server(dir.path()).await;

        let mut probe = TftpSocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        probe
            .send_to(&Packet::Ack { block: 3 }.encode(), addr)
            .await
            .unwrap();

        let (raw, _) = probe.recv_from().await.unwrap();
        let Packet::Error { code, .. } = Packet::decode(raw).unwrap() else {
            panic!("expected error reply");
        };
        assert_eq!(code, ERR_ILLEGAL_OPERATION);
    }
}

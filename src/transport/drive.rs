//! The transfer driver: the event dispatcher the state machine assumes.
//!
//! One driver per transfer. It owns the socket and the timer, serializes
//! events (at most one command, tick or cancellation is processed at a
//! time), drains queued transmissions after every event and returns the
//! transfer's terminal outcome.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, interval_at};

use crate::core::TftpError;
use crate::transfer::{Transfer, TransferOutcome};

use super::socket::TftpSocket;

/// Drive `transfer` to completion against `peer`.
///
/// The peer's transfer identifier is latched from the first reply: a
/// request is sent to the server's well-known port, but the session
/// continues against the ephemeral port the reply comes from. Datagrams
/// from any other source are dropped.
pub async fn drive(
    transfer: Transfer,
    socket: &mut TftpSocket,
    peer: SocketAddr,
) -> Result<TransferOutcome, TftpError> {
    drive_with_cancel(transfer, socket, peer, Arc::new(Notify::new())).await
}

/// Like [`drive`], aborting the transfer when `cancel` is notified.
///
/// Cancellation is processed with priority over a pending timer tick.
pub async fn drive_with_cancel(
    mut transfer: Transfer,
    socket: &mut TftpSocket,
    mut peer: SocketAddr,
    cancel: Arc<Notify>,
) -> Result<TransferOutcome, TftpError> {
    transfer.start();
    flush(&mut transfer, socket, peer).await?;

    let mut tick_every = transfer.tick_interval();
    let mut ticker = new_ticker(tick_every);
    let mut latched = false;

    loop {
        if let Some(outcome) = transfer.outcome() {
            tracing::debug!(?outcome, "transfer closed");
            return Ok(outcome.clone());
        }

        tokio::select! {
            biased;

            _ = cancel.notified() => {
                transfer.cancel();
            }
            received = socket.recv_from() => {
                let (data, src) = received?;
                let data = data.to_vec();
                if src == peer || (!latched && src.ip() == peer.ip()) {
                    peer = src;
                    latched = true;
                    transfer.on_command_received(&data);
                } else {
                    tracing::debug!(%src, "ignoring datagram from unknown transfer id");
                }
            }
            _ = ticker.tick() => {
                transfer.on_timer_tick();
            }
        }

        flush(&mut transfer, socket, peer).await?;

        // Option negotiation may have changed the agreed timeout.
        let negotiated = transfer.tick_interval();
        if negotiated != tick_every {
            tick_every = negotiated;
            ticker = new_ticker(tick_every);
        }
    }
}

fn new_ticker(period: Duration) -> tokio::time::Interval {
    // interval() fires immediately; the first tick belongs one period out.
    interval_at(Instant::now() + period, period)
}

async fn flush(
    transfer: &mut Transfer,
    socket: &TftpSocket,
    peer: SocketAddr,
) -> Result<(), TftpError> {
    while let Some(datagram) = transfer.poll_transmit() {
        socket.send_to(&datagram, peer).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use crate::options::OptionSet;
    use crate::transfer::TransferConfig;
    use crate::wire::{Packet, TransferMode};

    fn fast_config() -> TransferConfig {
        TransferConfig {
            timeout: Duration::from_millis(20),
            max_retries: 2,
        }
    }

    async fn pair() -> (TftpSocket, TftpSocket, SocketAddr, SocketAddr) {
        let a = TftpSocket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = TftpSocket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        (a, b, a_addr, b_addr)
    }

    #[tokio::test]
    async fn test_drive_times_out_without_peer() {
        let (mut socket, _peer_socket, _, peer_addr) = pair().await;
        let transfer = Transfer::write_request(
            "f",
            TransferMode::Octet,
            OptionSet::new(),
            Cursor::new(vec![0u8; 10]),
            fast_config(),
        );

        let outcome = drive(transfer, &mut socket, peer_addr).await.unwrap();
        assert_eq!(outcome, TransferOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_drive_latches_ephemeral_transfer_id() {
        let (mut socket, mut server_main, _, server_main_addr) = pair().await;

        // A scripted "server": sees the WRQ on the main socket, answers
        // from a fresh ephemeral socket, then acks the data block there.
        let server = tokio::spawn(async move {
            let (raw, client_addr) = server_main.recv_from().await.unwrap();
            assert!(matches!(
                Packet::decode(raw).unwrap(),
                Packet::WriteRequest(_)
            ));

            let mut session = TftpSocket::ephemeral_for(client_addr).await.unwrap();
            session
                .send_to(&Packet::Ack { block: 0 }.encode(), client_addr)
                .await
                .unwrap();

            let (raw, _) = session.recv_from().await.unwrap();
            let Packet::Data { block: 1, data } = Packet::decode(raw).unwrap() else {
                panic!("expected first data block");
            };
            assert_eq!(data, b"payload");
            session
                .send_to(&Packet::Ack { block: 1 }.encode(), client_addr)
                .await
                .unwrap();
        });

        let transfer = Transfer::write_request(
            "f",
            TransferMode::Octet,
            OptionSet::new(),
            Cursor::new(b"payload".to_vec()),
            fast_config(),
        );
        let outcome = drive(transfer, &mut socket, server_main_addr).await.unwrap();

        assert_eq!(outcome, TransferOutcome::Completed { bytes: 7 });
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_drive_with_cancel_notifies_peer() {
        let (mut socket, mut peer_socket, _, peer_addr) = pair().await;
        let cancel = Arc::new(Notify::new());

        // Long timeout: the only packets on the wire are the request and
        // the cancellation error, in that order.
        let transfer = Transfer::write_request(
            "f",
            TransferMode::Octet,
            OptionSet::new(),
            Cursor::new(vec![0u8; 10]),
            TransferConfig {
                timeout: Duration::from_secs(30),
                max_retries: 2,
            },
        );

        let canceller = Arc::clone(&cancel);
        let driver = tokio::spawn(async move {
            drive_with_cancel(transfer, &mut socket, peer_addr, canceller).await
        });

        // The request arrives, then the transfer is cancelled.
        let (raw, client_addr) = peer_socket.recv_from().await.unwrap();
        assert!(matches!(
            Packet::decode(raw).unwrap(),
            Packet::WriteRequest(_)
        ));
        cancel.notify_one();

        let outcome = driver.await.unwrap().unwrap();
        assert_eq!(outcome, TransferOutcome::Cancelled);

        // The peer is told with a single error command.
        let (raw, src) = peer_socket.recv_from().await.unwrap();
        assert_eq!(src, client_addr);
        assert!(matches!(Packet::decode(raw).unwrap(), Packet::Error { .. }));
    }
}

//! The transfer engine: one state machine per file transfer.
//!
//! Implements:
//! - The five-state transfer lifecycle over lockstep DATA/ACK exchange
//! - RFC 2347 option negotiation on both the requesting and answering side
//! - Timeout-driven verbatim retransmission with a bounded retry budget
//! - Unconditional cancellation from any non-terminal state
//!
//! The engine is sans-IO: events come in through [`Transfer::start`],
//! [`Transfer::on_command_received`], [`Transfer::on_timer_tick`] and
//! [`Transfer::cancel`]; outbound datagrams are drained with
//! [`Transfer::poll_transmit`]; the terminal result is read with
//! [`Transfer::outcome`]. The surrounding driver owns the socket and the
//! timer and guarantees that events for one transfer never interleave.

mod retry;
mod state;

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::time::Duration;

use crate::core::{
    BlockSink, BlockSource, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, ERR_ACCESS_VIOLATION,
    ERR_DISK_FULL, ERR_ILLEGAL_OPERATION, ERR_UNDEFINED, ProtocolViolation, TftpError,
};
use crate::options::{OptionSet, accept_request_options};
use crate::wire::{Packet, Request, TransferMode};

pub use retry::RetryCounter;
pub use state::TransferState;

/// Timing and retry parameters for one transfer.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Interval between timer ticks; also the retransmission timeout.
    pub timeout: Duration,
    /// Retransmissions attempted before giving up.
    pub max_retries: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Terminal result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// All data moved and the final block was acknowledged.
    Completed {
        /// Total payload bytes transferred.
        bytes: u64,
    },
    /// The peer terminated the transfer with an error command.
    PeerError {
        /// TFTP error code from the wire.
        code: u16,
        /// Error message from the wire.
        message: String,
    },
    /// The retry budget ran out with no reply.
    TimedOut,
    /// The transfer was cancelled locally.
    Cancelled,
    /// The peer violated the protocol.
    Protocol(ProtocolViolation),
    /// The local byte stream failed.
    Io(io::ErrorKind),
}

impl TransferOutcome {
    /// Whether the transfer finished successfully.
    pub fn is_success(&self) -> bool {
        matches!(self, TransferOutcome::Completed { .. })
    }

    /// Convert into a `Result` carrying the transferred byte count.
    pub fn into_result(self) -> Result<u64, TftpError> {
        match self {
            TransferOutcome::Completed { bytes } => Ok(bytes),
            TransferOutcome::PeerError { code, message } => Err(TftpError::Peer { code, message }),
            TransferOutcome::TimedOut => Err(TftpError::TimedOut),
            TransferOutcome::Cancelled => Err(TftpError::Cancelled),
            TransferOutcome::Protocol(violation) => Err(TftpError::Protocol(violation)),
            TransferOutcome::Io(kind) => Err(TftpError::Io(kind.into())),
        }
    }
}

/// The byte stream behind the transfer: drained when sending, filled when
/// receiving.
enum Stream {
    Source(Box<dyn BlockSource + Send>),
    Sink(Box<dyn BlockSink + Send>),
}

/// The action performed when the transfer starts.
enum Opening {
    /// Client side: send the recorded RRQ or WRQ.
    Request(Packet),
    /// Answering side, options granted: send an OACK.
    OptionAck(Vec<(String, String)>),
    /// Answering a WRQ without options: send ACK of block 0.
    AckZero,
    /// Answering an RRQ without options: send the first data block.
    FirstData,
}

/// The mutable context for one transfer.
///
/// Owns the current state (exactly one, replaced wholesale on transition),
/// the option set, the retry budget, the byte stream and the raw bytes of
/// the last outbound packet. One instance per transfer; instances share
/// nothing.
pub struct Transfer {
    state: TransferState,
    config: TransferConfig,
    options: OptionSet,
    retries: RetryCounter,
    stream: Stream,
    opening: Option<Opening>,

    /// Sending: number of the in-flight data block (0 while the request or
    /// OACK is in flight). Receiving: last block acknowledged.
    block: u16,
    /// Payload length of the in-flight data block, when one is in flight.
    in_flight: Option<usize>,
    /// Raw bytes of the last outbound packet. Timeout retransmission
    /// replays these verbatim; it never re-encodes.
    last_sent: Option<Vec<u8>>,

    outbound: VecDeque<Vec<u8>>,
    outcome: Option<TransferOutcome>,
    bytes_transferred: u64,
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("state", &self.state)
            .field("block", &self.block)
            .field("bytes_transferred", &self.bytes_transferred)
            .field("retries", &self.retries.attempts())
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl Transfer {
    fn new(state: TransferState, stream: Stream, options: OptionSet, config: TransferConfig) -> Self {
        let retries = RetryCounter::new(config.max_retries);
        Self {
            state,
            config,
            options,
            retries,
            stream,
            opening: None,
            block: 0,
            in_flight: None,
            last_sent: None,
            outbound: VecDeque::new(),
            outcome: None,
            bytes_transferred: 0,
        }
    }

    // =========================================================================
    // Constructors
    // =========================================================================

    /// Client side: read `filename` from the peer into `sink`.
    pub fn read_request(
        filename: impl Into<String>,
        mode: TransferMode,
        options: OptionSet,
        sink: impl BlockSink + Send + 'static,
        config: TransferConfig,
    ) -> Self {
        let mut request = Request::new(filename, mode);
        request.options = options.to_wire_pairs();
        let mut transfer = Self::new(
            TransferState::SendReadRequest,
            Stream::Sink(Box::new(sink)),
            options,
            config,
        );
        transfer.opening = Some(Opening::Request(Packet::ReadRequest(request)));
        transfer
    }

    /// Client side: write `source` to the peer as `filename`.
    pub fn write_request(
        filename: impl Into<String>,
        mode: TransferMode,
        options: OptionSet,
        source: impl BlockSource + Send + 'static,
        config: TransferConfig,
    ) -> Self {
        let mut request = Request::new(filename, mode);
        request.options = options.to_wire_pairs();
        let mut transfer = Self::new(
            TransferState::SendWriteRequest,
            Stream::Source(Box::new(source)),
            options,
            config,
        );
        transfer.opening = Some(Opening::Request(Packet::WriteRequest(request)));
        transfer
    }

    /// Answering side: serve an inbound read request from `source`.
    ///
    /// `known_size` fills the peer's `tsize` probe when the real size is
    /// available. When any requested option is granted, the opening packet
    /// is an OACK and the peer's ACK of block 0 triggers the first data
    /// block; otherwise data starts immediately.
    pub fn answer_read_request(
        request: &Request,
        source: impl BlockSource + Send + 'static,
        known_size: Option<u64>,
        config: TransferConfig,
    ) -> Self {
        let accepted = accept_request_options(&request.options, known_size);
        let mut transfer = Self::new(
            TransferState::Sending,
            Stream::Source(Box::new(source)),
            accepted,
            config,
        );
        transfer.opening = Some(if transfer.options.is_empty() {
            Opening::FirstData
        } else {
            Opening::OptionAck(transfer.options.to_wire_pairs())
        });
        transfer
    }

    /// Answering side: accept an inbound write request into `sink`.
    pub fn answer_write_request(
        request: &Request,
        sink: impl BlockSink + Send + 'static,
        config: TransferConfig,
    ) -> Self {
        let accepted = accept_request_options(&request.options, None);
        let mut transfer = Self::new(
            TransferState::Receiving,
            Stream::Sink(Box::new(sink)),
            accepted,
            config,
        );
        transfer.opening = Some(if transfer.options.is_empty() {
            Opening::AckZero
        } else {
            Opening::OptionAck(transfer.options.to_wire_pairs())
        });
        transfer
    }

    // =========================================================================
    // External interface
    // =========================================================================

    /// Begin the transfer by performing the initial state's entry action.
    ///
    /// Calling `start` more than once is a no-op.
    pub fn start(&mut self) {
        let Some(opening) = self.opening.take() else {
            return;
        };
        self.retries.reset();
        match opening {
            Opening::Request(packet) => self.send_packet(&packet),
            Opening::OptionAck(options) => self.send_packet(&Packet::OptionAck { options }),
            Opening::AckZero => self.send_packet(&Packet::Ack { block: 0 }),
            Opening::FirstData => self.send_next_block(),
        }
    }

    /// Feed one raw datagram addressed to this transfer.
    ///
    /// Decode failures are protocol errors: the transfer answers with an
    /// error command and closes.
    pub fn on_command_received(&mut self, raw: &[u8]) {
        if self.state == TransferState::Closed {
            return;
        }
        match Packet::decode(raw) {
            Ok(packet) => self.on_packet(packet),
            Err(e) => {
                tracing::warn!(error = %e, "dropping transfer on malformed packet");
                self.protocol_failure(ProtocolViolation::Decode(e));
            }
        }
    }

    /// Feed one already-decoded packet addressed to this transfer.
    pub fn on_packet(&mut self, packet: Packet) {
        if self.state == TransferState::Closed {
            return;
        }
        tracing::debug!(packet = packet.name(), state = self.state.name(), "rx");
        self.dispatch(packet);
    }

    /// Periodic timer tick at the configured interval.
    ///
    /// Drives retransmission and the give-up-after-N-retries policy. Ticks
    /// after the transfer closed are no-ops.
    pub fn on_timer_tick(&mut self) {
        match self.state {
            TransferState::Closed => {}
            TransferState::Receiving => {
                // The peer owns retransmission of data; a tick here only
                // enforces the overall no-activity timeout.
                if !self.retries.begin_retry() {
                    tracing::debug!("no activity, giving up");
                    self.close_with(TransferOutcome::TimedOut);
                }
            }
            _ => {
                if self.retries.begin_retry() {
                    self.resend_last();
                } else {
                    tracing::debug!("retry budget exhausted, giving up");
                    self.close_with(TransferOutcome::TimedOut);
                }
            }
        }
    }

    /// Abort the transfer.
    ///
    /// Always honored from any non-terminal state: the peer is notified
    /// with a single error command and the transfer closes immediately.
    pub fn cancel(&mut self) {
        if self.state == TransferState::Closed {
            return;
        }
        self.send_packet(&Packet::Error {
            code: ERR_UNDEFINED,
            message: "Transfer cancelled".to_string(),
        });
        self.close_with(TransferOutcome::Cancelled);
    }

    /// Drain the next outbound datagram for the wire, if any.
    pub fn poll_transmit(&mut self) -> Option<Vec<u8>> {
        self.outbound.pop_front()
    }

    /// Terminal result, once the transfer reaches `Closed`.
    pub fn outcome(&self) -> Option<&TransferOutcome> {
        self.outcome.as_ref()
    }

    /// Current state of the transfer.
    pub fn state(&self) -> TransferState {
        self.state
    }

    /// Whether the transfer reached its terminal state.
    pub fn is_closed(&self) -> bool {
        self.state == TransferState::Closed
    }

    /// The active option set.
    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Payload bytes moved so far.
    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    /// Interval the driver should tick at: the negotiated `timeout` option
    /// when one was acknowledged, the configured timeout otherwise.
    pub fn tick_interval(&self) -> Duration {
        self.options.timeout().unwrap_or(self.config.timeout)
    }

    // =========================================================================
    // Actions shared by the states
    // =========================================================================

    /// Encode, queue for the wire and record for verbatim retransmission.
    fn send_packet(&mut self, packet: &Packet) {
        tracing::debug!(packet = packet.name(), "tx");
        let raw = packet.encode();
        self.outbound.push_back(raw.clone());
        self.last_sent = Some(raw);
    }

    /// Queue the last outbound packet again, bit-identical.
    fn resend_last(&mut self) {
        if let Some(raw) = &self.last_sent {
            tracing::debug!(attempt = self.retries.attempts(), "retransmit");
            self.outbound.push_back(raw.clone());
        }
    }

    /// Enter `Sending` and put the next data block on the wire.
    fn enter_sending(&mut self) {
        self.state = TransferState::Sending;
        self.retries.reset();
        self.send_next_block();
    }

    /// Enter `Receiving`, waiting for the block after `last_acked`.
    fn enter_receiving(&mut self, last_acked: u16) {
        self.state = TransferState::Receiving;
        self.block = last_acked;
        self.retries.reset();
    }

    /// Read the next block from the source and send it.
    ///
    /// A short (or empty) block marks the end of the transfer; completion
    /// is declared when the peer acknowledges it.
    fn send_next_block(&mut self) {
        let block_size = self.options.block_size();
        let mut payload = vec![0u8; block_size];
        let Stream::Source(source) = &mut self.stream else {
            unreachable!("sending states always hold a source");
        };
        match source.read_block(&mut payload) {
            Ok(n) => {
                payload.truncate(n);
                self.block = self.block.wrapping_add(1);
                self.in_flight = Some(n);
                self.send_packet(&Packet::Data {
                    block: self.block,
                    data: payload,
                });
            }
            Err(e) => self.io_failure(ERR_ACCESS_VIOLATION, e),
        }
    }

    /// Append a received payload to the sink and acknowledge it.
    fn deliver_block(&mut self, block: u16, data: &[u8]) {
        let Stream::Sink(sink) = &mut self.stream else {
            unreachable!("receiving states always hold a sink");
        };
        if let Err(e) = sink.write_block(data) {
            self.io_failure(ERR_DISK_FULL, e);
            return;
        }
        self.bytes_transferred += data.len() as u64;
        self.send_packet(&Packet::Ack { block });
        if data.len() < self.options.block_size() {
            self.complete();
        } else {
            self.enter_receiving(block);
        }
    }

    /// Close after a peer-reported error. Never answered, never retried.
    fn peer_failure(&mut self, code: u16, message: String) {
        tracing::debug!(code, %message, "peer reported error");
        self.close_with(TransferOutcome::PeerError { code, message });
    }

    /// Close after a protocol violation, notifying the peer.
    fn protocol_failure(&mut self, violation: ProtocolViolation) {
        self.send_packet(&Packet::Error {
            code: ERR_ILLEGAL_OPERATION,
            message: violation.to_string(),
        });
        self.close_with(TransferOutcome::Protocol(violation));
    }

    /// Close after a local stream failure, notifying the peer.
    fn io_failure(&mut self, code: u16, error: io::Error) {
        tracing::warn!(error = %error, "local stream failure");
        self.send_packet(&Packet::Error {
            code,
            message: error.to_string(),
        });
        self.close_with(TransferOutcome::Io(error.kind()));
    }

    /// Close successfully, recording the final byte count.
    fn complete(&mut self) {
        self.close_with(TransferOutcome::Completed {
            bytes: self.bytes_transferred,
        });
    }

    /// Transition into the terminal state.
    fn close_with(&mut self, outcome: TransferOutcome) {
        self.state = TransferState::Closed;
        self.outcome = Some(outcome);
    }
}

//! Per-state event handling for the transfer state machine.
//!
//! Every inbound packet is dispatched against the current
//! [`TransferState`]; the handler mutates the shared [`Transfer`] context,
//! queues outbound packets and requests at most one transition. The enum
//! is closed, so the dispatch match proves every packet kind is considered
//! in every state.

use crate::core::ProtocolViolation;
use crate::wire::Packet;

use super::Transfer;

/// The closed set of states one transfer moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferState {
    /// Client write: WRQ sent, waiting for ACK of block 0 or an OACK.
    SendWriteRequest,
    /// Client read: RRQ sent, waiting for the first data block or an OACK.
    SendReadRequest,
    /// Streaming data blocks to the peer, exactly one in flight.
    Sending,
    /// Waiting for data blocks from the peer, acknowledging each.
    Receiving,
    /// Terminal. All further commands and timer ticks are no-ops.
    Closed,
}

impl TransferState {
    /// Human-readable state name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TransferState::SendWriteRequest => "SendWriteRequest",
            TransferState::SendReadRequest => "SendReadRequest",
            TransferState::Sending => "Sending",
            TransferState::Receiving => "Receiving",
            TransferState::Closed => "Closed",
        }
    }
}

impl Transfer {
    /// Route a decoded packet to the current state's handler.
    pub(super) fn dispatch(&mut self, packet: Packet) {
        match self.state {
            TransferState::SendWriteRequest => self.write_request_packet(packet),
            TransferState::SendReadRequest => self.read_request_packet(packet),
            TransferState::Sending => self.sending_packet(packet),
            TransferState::Receiving => self.receiving_packet(packet),
            TransferState::Closed => {}
        }
    }

    /// WRQ is in flight; the reply decides how negotiation went.
    fn write_request_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Ack { block: 0 } => {
                // A bare ack after a request carrying options means the
                // peer does not do option negotiation at all: every
                // proposed option is dropped, defaults apply.
                self.options.reconcile_none();
                self.enter_sending();
            }
            Packet::OptionAck { options } => {
                self.options.reconcile_option_ack(&options);
                self.enter_sending();
            }
            Packet::Error { code, message } => self.peer_failure(code, message),
            other => self.ignore_packet(&other),
        }
    }

    /// RRQ is in flight; the peer answers with an OACK or with data.
    fn read_request_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Data { block: 1, data } => {
                // Data instead of an OACK: the peer ignored negotiation,
                // nothing proposed survives.
                self.options.reconcile_none();
                self.deliver_block(1, &data);
            }
            Packet::OptionAck { options } => {
                self.options.reconcile_option_ack(&options);
                self.send_packet(&Packet::Ack { block: 0 });
                self.enter_receiving(0);
            }
            Packet::Error { code, message } => self.peer_failure(code, message),
            other => self.ignore_packet(&other),
        }
    }

    /// One data block (or the opening OACK) is in flight.
    fn sending_packet(&mut self, packet: Packet) {
        match packet {
            Packet::Ack { block } if block == self.block => {
                if let Some(len) = self.in_flight.take() {
                    self.bytes_transferred += len as u64;
                    if len < self.options.block_size() {
                        // Short block acknowledged: that was the last one.
                        self.complete();
                        return;
                    }
                }
                self.enter_sending();
            }
            Packet::Error { code, message } => self.peer_failure(code, message),
            other => self.ignore_packet(&other),
        }
    }

    /// Waiting for the block after the last one acknowledged.
    fn receiving_packet(&mut self, packet: Packet) {
        let expected = self.block.wrapping_add(1);
        match packet {
            Packet::Data { block, data } if block == expected => {
                self.deliver_block(block, &data);
            }
            Packet::Data { block, .. } if block == self.block => {
                // The peer retransmitted a block we already stored, so our
                // ack was lost. Repeat the ack, append nothing.
                self.resend_last();
            }
            Packet::Data { block, .. } => {
                self.protocol_failure(ProtocolViolation::UnexpectedBlock {
                    expected,
                    actual: block,
                });
            }
            Packet::Error { code, message } => self.peer_failure(code, message),
            other => self.ignore_packet(&other),
        }
    }

    /// Duplicate and stray packets are dropped without a state change.
    fn ignore_packet(&self, packet: &Packet) {
        tracing::debug!(
            packet = packet.name(),
            state = self.state.name(),
            "ignoring unexpected packet"
        );
    }
}

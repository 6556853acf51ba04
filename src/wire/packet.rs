//! TFTP packet encoding and decoding.
//!
//! Wire format (RFC 1350, RFC 2347):
//!
//! ```text
//! RRQ/WRQ:  | opcode (2, BE) | filename | 0 | mode | 0 | {name | 0 | value | 0}* |
//! DATA:     | opcode (2, BE) | block (2, BE) | payload (0..=blksize) |
//! ACK:      | opcode (2, BE) | block (2, BE) |
//! ERROR:    | opcode (2, BE) | code (2, BE) | message | 0 |
//! OACK:     | opcode (2, BE) | {name | 0 | value | 0}* |
//! ```
//!
//! Encoding never fails; decoding is total over well-formed input and
//! returns a [`DecodeError`] for anything else.

use crate::core::{
    DecodeError, OPCODE_ACK, OPCODE_DATA, OPCODE_ERROR, OPCODE_OPTION_ACK, OPCODE_READ_REQUEST,
    OPCODE_WRITE_REQUEST,
};

use super::mode::TransferMode;

/// Filename, mode and requested options carried by an RRQ or WRQ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// File name, relative to the server's root.
    pub filename: String,
    /// Requested transfer mode.
    pub mode: TransferMode,
    /// Requested options as name/value pairs, in wire order.
    pub options: Vec<(String, String)>,
}

impl Request {
    /// Create a request without options.
    pub fn new(filename: impl Into<String>, mode: TransferMode) -> Self {
        Self {
            filename: filename.into(),
            mode,
            options: Vec::new(),
        }
    }
}

/// One TFTP packet, decoded into its wire-visible fields.
///
/// Immutable once decoded; retransmission reuses recorded datagram bytes
/// rather than re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Read request (opcode 1).
    ReadRequest(Request),
    /// Write request (opcode 2).
    WriteRequest(Request),
    /// One data block (opcode 3). Block numbers start at 1 and wrap.
    Data {
        /// Block number, modulo 65536.
        block: u16,
        /// Payload, at most the negotiated block size.
        data: Vec<u8>,
    },
    /// Acknowledgement of one data block (opcode 4).
    Ack {
        /// Acknowledged block number.
        block: u16,
    },
    /// Terminal error notification (opcode 5).
    Error {
        /// RFC 1350 error code.
        code: u16,
        /// Human-readable message.
        message: String,
    },
    /// Option acknowledgement (opcode 6, RFC 2347).
    OptionAck {
        /// Accepted options as name/value pairs.
        options: Vec<(String, String)>,
    },
}

impl Packet {
    /// Human-readable packet name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::ReadRequest(_) => "RRQ",
            Packet::WriteRequest(_) => "WRQ",
            Packet::Data { .. } => "DATA",
            Packet::Ack { .. } => "ACK",
            Packet::Error { .. } => "ERROR",
            Packet::OptionAck { .. } => "OACK",
        }
    }

    /// Encode to a wire datagram. Never fails.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::ReadRequest(req) => encode_request(OPCODE_READ_REQUEST, req),
            Packet::WriteRequest(req) => encode_request(OPCODE_WRITE_REQUEST, req),
            Packet::Data { block, data } => {
                let mut buf = Vec::with_capacity(4 + data.len());
                buf.extend_from_slice(&OPCODE_DATA.to_be_bytes());
                buf.extend_from_slice(&block.to_be_bytes());
                buf.extend_from_slice(data);
                buf
            }
            Packet::Ack { block } => {
                let mut buf = Vec::with_capacity(4);
                buf.extend_from_slice(&OPCODE_ACK.to_be_bytes());
                buf.extend_from_slice(&block.to_be_bytes());
                buf
            }
            Packet::Error { code, message } => {
                let mut buf = Vec::with_capacity(5 + message.len());
                buf.extend_from_slice(&OPCODE_ERROR.to_be_bytes());
                buf.extend_from_slice(&code.to_be_bytes());
                push_cstr(&mut buf, message);
                buf
            }
            Packet::OptionAck { options } => {
                let mut buf = Vec::with_capacity(2);
                buf.extend_from_slice(&OPCODE_OPTION_ACK.to_be_bytes());
                push_options(&mut buf, options);
                buf
            }
        }
    }

    /// Decode a wire datagram.
    pub fn decode(data: &[u8]) -> Result<Self, DecodeError> {
        if data.len() < 2 {
            return Err(DecodeError::TooShort {
                expected: 2,
                actual: data.len(),
            });
        }

        let opcode = u16::from_be_bytes([data[0], data[1]]);
        let body = &data[2..];

        match opcode {
            OPCODE_READ_REQUEST => Ok(Packet::ReadRequest(decode_request(body)?)),
            OPCODE_WRITE_REQUEST => Ok(Packet::WriteRequest(decode_request(body)?)),
            OPCODE_DATA => {
                let (block, payload) = decode_block(body, data.len())?;
                Ok(Packet::Data {
                    block,
                    data: payload.to_vec(),
                })
            }
            OPCODE_ACK => {
                let (block, _) = decode_block(body, data.len())?;
                Ok(Packet::Ack { block })
            }
            OPCODE_ERROR => {
                let (code, rest) = decode_block(body, data.len())?;
                let (message, _) = take_cstr(rest)?;
                Ok(Packet::Error {
                    code,
                    message: message.to_string(),
                })
            }
            OPCODE_OPTION_ACK => Ok(Packet::OptionAck {
                options: take_options(body)?,
            }),
            other => Err(DecodeError::UnknownOpcode(other)),
        }
    }
}

fn encode_request(opcode: u16, req: &Request) -> Vec<u8> {
    let mut buf = Vec::with_capacity(2 + req.filename.len() + 10);
    buf.extend_from_slice(&opcode.to_be_bytes());
    push_cstr(&mut buf, &req.filename);
    push_cstr(&mut buf, req.mode.as_str());
    push_options(&mut buf, &req.options);
    buf
}

fn decode_request(body: &[u8]) -> Result<Request, DecodeError> {
    let (filename, rest) = take_cstr(body)?;
    let (mode, rest) = take_cstr(rest)?;
    Ok(Request {
        filename: filename.to_string(),
        mode: mode.parse()?,
        options: take_options(rest)?,
    })
}

/// Read the 2-byte big-endian field common to DATA, ACK and ERROR.
fn decode_block(body: &[u8], datagram_len: usize) -> Result<(u16, &[u8]), DecodeError> {
    if body.len() < 2 {
        return Err(DecodeError::TooShort {
            expected: 4,
            actual: datagram_len,
        });
    }
    Ok((u16::from_be_bytes([body[0], body[1]]), &body[2..]))
}

fn push_cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

fn push_options(buf: &mut Vec<u8>, options: &[(String, String)]) {
    for (name, value) in options {
        push_cstr(buf, name);
        push_cstr(buf, value);
    }
}

/// Split one NUL-terminated UTF-8 string off the front of `data`.
fn take_cstr(data: &[u8]) -> Result<(&str, &[u8]), DecodeError> {
    let nul = data
        .iter()
        .position(|&b| b == 0)
        .ok_or(DecodeError::UnterminatedString)?;
    let s = std::str::from_utf8(&data[..nul]).map_err(|_| DecodeError::InvalidString)?;
    Ok((s, &data[nul + 1..]))
}

/// Parse zero or more name/value pairs until the buffer is exhausted.
fn take_options(mut data: &[u8]) -> Result<Vec<(String, String)>, DecodeError> {
    let mut options = Vec::new();
    while !data.is_empty() {
        let (name, rest) = take_cstr(data)?;
        if rest.is_empty() {
            return Err(DecodeError::DanglingOption);
        }
        let (value, rest) = take_cstr(rest)?;
        options.push((name.to_string(), value.to_string()));
        data = rest;
    }
    Ok(options)
}
